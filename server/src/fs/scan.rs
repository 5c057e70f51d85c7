use std::collections::BTreeSet;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{instrument, warn};
use walkdir::WalkDir;

use api::folder::{ScanReport, ScanStats};
use api::media::{MediaDescriptor, MediaKind};
use api::{LINKED_MEDIA_PATH, MEDIA_PATH, THUMBNAIL_PATH};
use common::{media::classify, token::encode_path};

// media indexer
//
// walks a directory tree and turns every admissible file into a descriptor;
// admission is extension-allow-list based and anything else is silently
// skipped.  unreadable subdirectories produce a warning and are skipped
// without aborting the scan.
//
// walkdir keeps an explicit stack internally, so deep or adversarial trees
// cannot blow the call stack

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UrlStyle {
    // files under the primary root are streamed by relative path
    PrimaryRoot,
    // linked files live outside any root and are addressed by token only
    Linked,
}

#[instrument(level = "debug", skip(url_root))]
pub fn scan_media(
    base: &Path,
    max_depth: usize,
    url_root: &str,
    style: UrlStyle,
) -> Vec<MediaDescriptor> {
    let mut out = Vec::new();

    let walker = WalkDir::new(base).max_depth(max_depth).follow_links(false);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!({error = %err}, "skipping unreadable directory entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();

        let Some(kind) = classify(path) else {
            continue;
        };

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(err) => {
                warn!({path = ?path, error = %err}, "skipping file without readable metadata");
                continue;
            }
        };

        let rel = match path.strip_prefix(base) {
            Ok(rel) => rel,
            Err(err) => {
                warn!({path = ?path, error = %err}, "skipping file outside scan base");
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();

        let folder = match rel.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                parent.to_string_lossy().into_owned()
            }
            _ => String::from("."),
        };

        let modified = meta.modified().unwrap_or(UNIX_EPOCH);
        let created = meta.created().unwrap_or(modified);

        let token = encode_path(path);

        let url = match style {
            UrlStyle::PrimaryRoot => {
                format!("{url_root}/{MEDIA_PATH}/{}", encode_segments(rel))
            }
            UrlStyle::Linked => format!("{url_root}/{LINKED_MEDIA_PATH}/{token}"),
        };

        out.push(MediaDescriptor {
            name,
            relative_path: rel.to_string_lossy().into_owned(),
            absolute_path: path.to_string_lossy().into_owned(),
            folder,
            url,
            thumbnail_url: format!("{url_root}/{THUMBNAIL_PATH}/{token}"),
            size: meta.len(),
            kind,
            created_at: to_rfc3339(created),
            modified_at: to_rfc3339(modified),
        });
    }

    out
}

// wraps a linked-folder scan into the shape the browser expects
pub fn scan_report(dir: &Path, max_depth: usize, url_root: &str) -> ScanReport {
    let files = scan_media(dir, max_depth, url_root, UrlStyle::Linked);

    let folders: BTreeSet<String> = files.iter().map(|f| f.folder.clone()).collect();

    let mut stats = ScanStats::default();

    for file in &files {
        match file.kind {
            MediaKind::Image => stats.images += 1,
            MediaKind::Video => stats.videos += 1,
            MediaKind::Audio => stats.audio += 1,
        }
        stats.total_size += file.size;
    }

    ScanReport {
        path: dir.to_string_lossy().into_owned(),
        total_files: files.len() as u64,
        folders: folders.into_iter().collect(),
        files,
        stats,
    }
}

// per-segment percent encoding so relative paths with spaces or unicode
// survive inside a url
fn encode_segments(rel: &Path) -> String {
    rel.components()
        .map(|c| urlencoding::encode(&c.as_os_str().to_string_lossy()).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn to_rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Millis, true)
}
