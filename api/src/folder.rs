use serde::{Deserialize, Serialize};

use crate::media::MediaDescriptor;

// a linked folder records that a directory outside the primary media root
// was imported, not its contents -- those are recomputed by re-scanning
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedFolder {
    pub path: String,
    pub name: String,
    pub file_count: u64,
    pub added_at: String,
}

// scan an arbitrary absolute directory
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanFolderReq {
    pub path: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub images: u64,
    pub videos: u64,
    pub audio: u64,
    pub total_size: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub path: String,
    pub total_files: u64,
    pub folders: Vec<String>,
    pub files: Vec<MediaDescriptor>,
    pub stats: ScanStats,
}

// register a scanned folder as linked
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddLinkedFolderReq {
    pub path: String,
    pub name: Option<String>,
}

// unlink by path; the files themselves are never touched
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoveLinkedFolderReq {
    pub path: String,
}
