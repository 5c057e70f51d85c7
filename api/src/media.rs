use serde::{Deserialize, Serialize};

// structs and types

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    // kind is a pure function of the (lowercased) file extension; anything
    // not in these tables is not media as far as the server is concerned
    pub fn from_extension(ext: &str) -> Option<MediaKind> {
        match ext {
            "jpg" | "jpeg" | "png" | "gif" | "webp" => Some(MediaKind::Image),
            "mp4" | "webm" | "mov" => Some(MediaKind::Video),
            "mp3" | "wav" => Some(MediaKind::Audio),
            _ => None,
        }
    }
}

impl From<MediaKind> for String {
    fn from(kind: MediaKind) -> String {
        match kind {
            MediaKind::Image => String::from("image"),
            MediaKind::Video => String::from("video"),
            MediaKind::Audio => String::from("audio"),
        }
    }
}

// the core media descriptor, recreated on every scan and never persisted
//
// the url fields are deterministic functions of the absolute path, so two
// scans of an unchanged directory produce identical descriptors
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    pub name: String,
    pub relative_path: String,
    pub absolute_path: String,
    // relative parent directory, "." for files at the scan root
    pub folder: String,
    pub url: String,
    pub thumbnail_url: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub created_at: String,
    pub modified_at: String,
}
