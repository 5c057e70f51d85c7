use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs::{read, read_dir, remove_file, write};
use tracing::{debug, instrument, warn};

use common::{config::EvictionPolicy, token::cache_key};

// disk-backed thumbnail cache
//
// entries are content-addressed by the source file's absolute path: one
// file per distinct path, named by the bounded cache key.  there is no
// staleness check against the source mtime; a cached rendition is served
// until the cache is cleared.
//
// concurrent writers of the same key are allowed and last-writer-wins,
// since both produce equivalent bytes for the same source
#[derive(Clone, Debug)]
pub struct ThumbnailCache {
    dir: PathBuf,
    policy: EvictionPolicy,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CacheTotals {
    pub files: u64,
    pub size_bytes: u64,
}

impl ThumbnailCache {
    pub fn new(dir: PathBuf, policy: EvictionPolicy) -> Self {
        ThumbnailCache { dir, policy }
    }

    fn entry_path(&self, path: &Path) -> PathBuf {
        self.dir.join(format!("{}.jpg", cache_key(path)))
    }

    // transient output target for the frame extraction subprocess; kept in
    // the cache dir so it lands on the same filesystem as the final entry
    pub fn scratch_path(&self, path: &Path) -> PathBuf {
        self.dir.join(format!("{}.frame.jpg", cache_key(path)))
    }

    pub async fn lookup(&self, path: &Path) -> Option<Vec<u8>> {
        match read(self.entry_path(path)).await {
            Ok(bytes) => {
                debug!({path = ?path}, "thumbnail cache hit");
                Some(bytes)
            }
            Err(_) => None,
        }
    }

    #[instrument(level = "debug", skip(self, bytes))]
    pub async fn store(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        write(self.entry_path(path), bytes).await?;

        self.apply_policy().await?;

        Ok(())
    }

    pub async fn stats(&self) -> Result<CacheTotals> {
        let mut totals = CacheTotals::default();

        let mut entries = read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;

            if meta.is_file() {
                totals.files += 1;
                totals.size_bytes += meta.len();
            }
        }

        Ok(totals)
    }

    pub async fn clear(&self) -> Result<u64> {
        let mut removed = 0;

        let mut entries = read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.metadata().await?.is_file() {
                remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        debug!({removed = removed}, "cleared thumbnail cache");

        Ok(removed)
    }

    // eviction runs after each store; the default policy is to never evict,
    // matching the unbounded cache of the original server
    async fn apply_policy(&self) -> Result<()> {
        let max_bytes = match self.policy {
            EvictionPolicy::NoEviction => return Ok(()),
            EvictionPolicy::Lru { max_bytes } => max_bytes,
        };

        let mut files = Vec::new();
        let mut total = 0;

        let mut entries = read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;

            if meta.is_file() {
                total += meta.len();
                files.push((entry.path(), meta.len(), meta.modified()?));
            }
        }

        // oldest first
        files.sort_by_key(|(_, _, mtime)| *mtime);

        let mut files = files.into_iter();

        // never evict down to nothing; the entry that was just written stays
        while total > max_bytes && files.len() > 1 {
            let (path, len, _) = match files.next() {
                Some(f) => f,
                None => break,
            };

            match remove_file(&path).await {
                Ok(()) => total -= len,
                Err(err) => warn!({path = ?path, error = %err}, "failed to evict cache entry"),
            }
        }

        Ok(())
    }
}
