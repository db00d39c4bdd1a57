use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("IO error reading image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Image is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: usize },
    #[error("Image is empty")]
    Empty,
    #[error("Unsupported image format")]
    UnsupportedFormat,
    #[error("Invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Reads the file at `path` and returns its contents as standard, padded base64.
pub fn encode_image<P: AsRef<Path>>(path: P) -> Result<String, EncodeError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| EncodeError::Io {
        path: path.display().to_string(),
        source,
    })?;

    Ok(encode_bytes(&bytes))
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decodes base64 text, tolerating surrounding whitespace and a `data:` URL prefix.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, EncodeError> {
    let text = text.trim();
    let payload = match text.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => text,
    };

    Ok(general_purpose::STANDARD.decode(payload)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
}

impl ImageFormat {
    /// Identifies the format from the leading magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.starts_with(b"BM") {
            Some(Self::Bmp)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Webp => "image/webp",
        }
    }
}

/// An image held in memory after size and format checks.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl LoadedImage {
    pub fn read<P: AsRef<Path>>(path: P, max_bytes: usize) -> Result<Self, EncodeError> {
        let path = path.as_ref();
        let io_error = |source| EncodeError::Io {
            path: path.display().to_string(),
            source,
        };

        // Check the size before pulling the whole file into memory.
        let size = fs::metadata(path).map_err(io_error)?.len();
        if size > max_bytes as u64 {
            return Err(EncodeError::TooLarge {
                size,
                limit: max_bytes,
            });
        }

        let bytes = fs::read(path).map_err(io_error)?;
        Self::from_bytes(bytes, max_bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>, max_bytes: usize) -> Result<Self, EncodeError> {
        if bytes.is_empty() {
            return Err(EncodeError::Empty);
        }
        if bytes.len() > max_bytes {
            return Err(EncodeError::TooLarge {
                size: bytes.len() as u64,
                limit: max_bytes,
            });
        }

        let format = ImageFormat::detect(&bytes).ok_or(EncodeError::UnsupportedFormat)?;
        Ok(Self { bytes, format })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        encode_bytes(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime_type(), self.to_base64())
    }
}
