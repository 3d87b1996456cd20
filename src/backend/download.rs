use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::record::ImageRecord;

const KNOWN_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("no image to save")]
    NothingToSave,
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes the original bytes of `record` into `dir` and returns the path
/// written. Existing files are never overwritten.
pub fn save_record(record: Option<&ImageRecord>, dir: &Path) -> Result<PathBuf, SaveError> {
    let record = record.ok_or(SaveError::NothingToSave)?;

    fs::create_dir_all(dir).map_err(|source| SaveError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = unique_path(dir, &file_name_for(record));
    fs::write(&path, &record.raw_bytes).map_err(|source| SaveError::Io {
        path: path.clone(),
        source,
    })?;

    log::info!("saved {} to {}", record.source_url, path.display());
    Ok(path)
}

/// File name taken from the last URL segment, with the extension guessed from
/// the bytes when the URL doesn't carry a known image one.
pub fn file_name_for(record: &ImageRecord) -> String {
    let without_query = record
        .source_url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let segment = without_query.rsplit('/').next().unwrap_or_default();

    let segment_path = Path::new(segment);
    let stem = segment_path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");

    let known = segment_path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| KNOWN_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));

    match known {
        Some(ext) => format!("{}.{}", stem, ext),
        None => format!("{}.{}", stem, guess_extension(&record.raw_bytes)),
    }
}

fn guess_extension(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("jpg")
}

fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let ext = name.extension().and_then(|e| e.to_str()).unwrap_or("jpg");

    (1..)
        .map(|n| dir.join(format!("{}-{}.{}", stem, n, ext)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::png_bytes;
    use image::DynamicImage;

    fn record_with(url: &str, bytes: Vec<u8>) -> ImageRecord {
        ImageRecord::new(DynamicImage::new_rgba8(1, 1), bytes, url.to_string())
    }

    #[test]
    fn test_name_from_url() {
        let record = record_with("https://cdn.example.test/img/abc123.png?sig=xyz", Vec::new());
        assert_eq!(file_name_for(&record), "abc123.png");
    }

    #[test]
    fn test_unknown_extension_guessed_from_bytes() {
        let record = record_with("https://example.test/api/random.php", png_bytes(1, 1));
        assert_eq!(file_name_for(&record), "random.png");
    }

    #[test]
    fn test_unrecognised_bytes_fall_back_to_jpg() {
        let record = record_with("https://example.test/", b"????".to_vec());
        assert_eq!(file_name_for(&record), "image.jpg");
    }

    #[test]
    fn test_extension_case_kept() {
        let record = record_with("https://example.test/PHOTO.JPG", Vec::new());
        assert_eq!(file_name_for(&record), "PHOTO.JPG");
    }

    #[test]
    fn test_save_writes_raw_bytes_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested");
        let record = record_with("https://cdn.example.test/a.png", png_bytes(2, 2));

        let first = save_record(Some(&record), &target).unwrap();
        let second = save_record(Some(&record), &target).unwrap();

        assert_eq!(first, target.join("a.png"));
        assert_eq!(second, target.join("a-1.png"));
        assert_eq!(fs::read(&first).unwrap(), record.raw_bytes);
        assert_eq!(fs::read(&second).unwrap(), record.raw_bytes);
    }

    #[test]
    fn test_save_without_record() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            save_record(None, dir.path()),
            Err(SaveError::NothingToSave)
        ));
    }
}
