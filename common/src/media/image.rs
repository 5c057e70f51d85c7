use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageDecoder, ImageFormat, ImageReader};
use tracing::debug;

// bounded-box jpeg rendition of an image file
//
// this is synchronous (the image crate does blocking io and heavy cpu work),
// so callers on the async side should run it under spawn_blocking
pub fn create_image_thumbnail(original_path: &Path, max_dim: u32) -> anyhow::Result<Vec<u8>> {
    debug!("started creating image thumbnail");

    let mut decoder = ImageReader::open(original_path)?.into_decoder()?;

    // this both solves the crate version collision and corrects the orientation, too
    let orientation = decoder.orientation()?;

    debug!({orientation = ?orientation}, "orientation for image");

    let image = DynamicImage::from_decoder(decoder)?;

    let (width, height) = image.dimensions();

    // bound, never enlarge; small images are re-encoded as-is
    let mut thumbnail = if width > max_dim || height > max_dim {
        image.thumbnail(max_dim, max_dim)
    } else {
        image
    };

    thumbnail.apply_orientation(orientation);

    let mut buf = Vec::new();

    // jpeg has no alpha channel
    DynamicImage::ImageRgb8(thumbnail.into_rgb8())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?;

    debug!("finished creating image thumbnail");

    Ok(buf)
}
