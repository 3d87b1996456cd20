use arboard::{Clipboard, ImageData};
use thiserror::Error;

use super::record::ImageRecord;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("no image to copy")]
    NothingToCopy,
    #[error("clipboard unavailable: {0}")]
    Clipboard(#[from] arboard::Error),
}

/// Puts the decoded pixels of `record` on the system clipboard.
pub fn copy_record(record: Option<&ImageRecord>) -> Result<(), CopyError> {
    let record = record.ok_or(CopyError::NothingToCopy)?;

    let rgba = record.image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let image_data = ImageData {
        width: width as usize,
        height: height as usize,
        bytes: rgba.into_raw().into(),
    };

    let mut clipboard = Clipboard::new()?;
    clipboard.set_image(image_data)?;
    log::info!("copied {} ({}x{}) to clipboard", record.source_url, width, height);
    Ok(())
}
