//! Product image validation and naming. Writing the bytes somewhere is left to
//! the caller's file storage.
use crate::config::UploadConfig;
use std::path::Path;
use uuid7::uuid7;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("image too large: {size} bytes, maximum is {max}")]
    TooLarge { size: usize, max: usize },
    #[error("invalid file extension {0:?}, allowed: jpg, jpeg, png, gif")]
    Extension(String),
    #[error("file content is not a jpeg, png or gif image")]
    Content,
    #[error("image file is empty")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
}

impl ImageFormat {
    /// Sniff the format from magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// An upload that passed validation, with the name it should be stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedImage {
    pub format: ImageFormat,
    pub stored_name: String,
    pub url: String,
}

impl ImageUpload {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            bytes,
        }
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }

    pub fn validate(&self, config: &UploadConfig) -> Result<ImageFormat, ImageError> {
        if self.bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if self.bytes.len() > config.max_bytes {
            return Err(ImageError::TooLarge {
                size: self.bytes.len(),
                max: config.max_bytes,
            });
        }

        let ext = self.extension().unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ImageError::Extension(ext));
        }

        ImageFormat::detect(&self.bytes).ok_or(ImageError::Content)
    }

    /// Validate and pick a collision-free stored name: `<uuid7>_<stem>.<ext>`.
    pub fn accept(&self, config: &UploadConfig) -> Result<AcceptedImage, ImageError> {
        let format = self.validate(config)?;
        let ext = self.extension().unwrap_or_default();
        let stem: String = Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();

        let stored_name = format!("{}_{stem}.{ext}", uuid7());
        let url = format!("/{}/{stored_name}", config.dir.trim_matches('/'));

        Ok(AcceptedImage {
            format,
            stored_name,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        bytes
    }

    #[test]
    fn accepts_png_with_matching_extension() {
        let upload = ImageUpload::new("fresh tomatoes.PNG", png());
        let accepted = upload.accept(&UploadConfig::default()).unwrap();

        assert_eq!(accepted.format, ImageFormat::Png);
        assert!(accepted.stored_name.ends_with("_fresh_tomatoes.png"));
        assert!(accepted.url.starts_with("/uploads/"));
    }

    #[test]
    fn rejects_oversized_files() {
        let config = UploadConfig {
            max_bytes: 16,
            ..UploadConfig::default()
        };
        let err = ImageUpload::new("a.png", png())
            .validate(&config)
            .unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { max: 16, .. }));
    }

    #[test]
    fn rejects_disallowed_extensions() {
        let err = ImageUpload::new("a.bmp", png())
            .validate(&UploadConfig::default())
            .unwrap_err();
        assert_eq!(err, ImageError::Extension("bmp".into()));
    }

    #[test]
    fn rejects_content_that_is_not_an_image() {
        let err = ImageUpload::new("a.jpg", b"#!/bin/sh\necho hi".to_vec())
            .validate(&UploadConfig::default())
            .unwrap_err();
        assert_eq!(err, ImageError::Content);
    }

    #[test]
    fn stored_names_are_unique() {
        let upload = ImageUpload::new("a.gif", b"GIF89a.......".to_vec());
        let config = UploadConfig::default();
        assert_ne!(
            upload.accept(&config).unwrap().stored_name,
            upload.accept(&config).unwrap().stored_name
        );
    }
}
