use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use api::folder::LinkedFolder;

const LINKED_FOLDERS_FILE: &str = "linked-folders.json";

// persisted linked-folder membership
//
// this records which external directories the user has imported, not their
// contents; those are recomputed by re-scanning on demand.  the backing
// file is a plain json array in the data dir
#[derive(Debug)]
pub struct LinkedFolderStore {
    file: PathBuf,
    folders: RwLock<Vec<LinkedFolder>>,
}

impl LinkedFolderStore {
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let file = data_dir.join(LINKED_FOLDERS_FILE);

        let folders = match tokio::fs::read(&file).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<LinkedFolder>>(&bytes) {
                Ok(folders) => folders,
                Err(err) => {
                    warn!({file = ?file, error = %err}, "could not parse linked folder records, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        debug!({count = folders.len()}, "loaded linked folder records");

        Ok(LinkedFolderStore {
            file,
            folders: RwLock::new(folders),
        })
    }

    pub async fn list(&self) -> Vec<LinkedFolder> {
        self.folders.read().await.clone()
    }

    // re-adding a path replaces the old record, so a fresh scan updates the
    // file count without growing the list
    pub async fn add(&self, folder: LinkedFolder) -> Result<()> {
        let mut folders = self.folders.write().await;

        folders.retain(|f| f.path != folder.path);
        folders.push(folder);

        self.persist(&folders).await
    }

    pub async fn remove(&self, path: &str) -> Result<bool> {
        let mut folders = self.folders.write().await;

        let before = folders.len();
        folders.retain(|f| f.path != path);

        if folders.len() == before {
            return Ok(false);
        }

        self.persist(&folders).await?;

        Ok(true)
    }

    async fn persist(&self, folders: &[LinkedFolder]) -> Result<()> {
        let doc = serde_json::to_vec_pretty(folders)?;

        tokio::fs::write(&self.file, doc).await?;

        Ok(())
    }
}
