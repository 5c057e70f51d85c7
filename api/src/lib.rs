// wire types shared between the server and its clients
//
// everything here is a plain serde struct; the field names use camelCase
// to match the json the browser ui expects

pub mod cache;
pub mod folder;
pub mod media;

// url prefixes used when building descriptor links
pub const MEDIA_PATH: &str = "media";
pub const LINKED_MEDIA_PATH: &str = "linked-media";
pub const THUMBNAIL_PATH: &str = "api/thumbnail";
