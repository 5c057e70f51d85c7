use std::path::Path;

use api::media::MediaKind;

pub mod image;
pub mod video;

// admission and classification are both driven by the extension table in
// api::media; files without a recognized extension are simply not media
pub fn classify(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();

    MediaKind::from_extension(&ext)
}
