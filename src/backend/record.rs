use image::DynamicImage;
use std::sync::Arc;

/// One fetched image: the decoded bitmap, the bytes it was decoded from and
/// the URL it was finally served from.
///
/// Records are never mutated after a fetch produces them. The cache and the
/// history hand them around as [`SharedRecord`] so either side can drop its
/// copy without affecting the other.
#[derive(Debug)]
pub struct ImageRecord {
    pub image: DynamicImage,
    pub raw_bytes: Vec<u8>,
    pub source_url: String,
}

pub type SharedRecord = Arc<ImageRecord>;

impl ImageRecord {
    pub fn new(image: DynamicImage, raw_bytes: Vec<u8>, source_url: String) -> Self {
        Self {
            image,
            raw_bytes,
            source_url,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}
