use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Invalid URI format: {0}")]
    InvalidUri(String),
    #[error("Image path escapes the image directory: {0}")]
    OutsideBase(String),
    #[error("Image path is empty")]
    EmptyPath,
}

/// Directory that uploaded and referenced scalp images are read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStore {
    base: PathBuf,
}

impl ImageStore {
    /// Accepts a plain directory path or an absolute `file://` URI.
    pub fn parse(base: &str) -> Result<Self, StorageError> {
        if let Some(path) = base.strip_prefix("file://") {
            if !path.starts_with('/') {
                return Err(StorageError::InvalidUri(format!(
                    "file:// URI must use absolute paths: {base}"
                )));
            }
            return Ok(Self::new(path));
        }

        if let Some((scheme, _)) = base.split_once("://") {
            return Err(StorageError::UnsupportedScheme(scheme.to_string()));
        }

        Ok(Self::new(base))
    }

    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn exists(&self) -> bool {
        self.base.is_dir()
    }

    pub fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::EmptyPath);
        }

        let requested = Path::new(name);
        if requested
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(StorageError::OutsideBase(name.to_string()));
        }

        if requested.is_absolute() {
            if requested.starts_with(&self.base) {
                return Ok(requested.to_path_buf());
            }
            return Err(StorageError::OutsideBase(name.to_string()));
        }

        Ok(self.base.join(requested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_directory() {
        let store = ImageStore::parse("/tmp/scalp").unwrap();
        assert_eq!(store.base(), Path::new("/tmp/scalp"));
    }

    #[test]
    fn test_parse_file_uri() {
        let store = ImageStore::parse("file:///tmp/scalp").unwrap();
        assert_eq!(store.base(), Path::new("/tmp/scalp"));

        let result = ImageStore::parse("file://tmp/scalp");
        assert!(matches!(result.unwrap_err(), StorageError::InvalidUri(_)));
    }

    #[test]
    fn test_parse_unsupported_scheme() {
        let result = ImageStore::parse("s3://bucket/uploads");
        assert!(matches!(
            result.unwrap_err(),
            StorageError::UnsupportedScheme(scheme) if scheme == "s3"
        ));
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let store = ImageStore::new("/srv/images");

        assert_eq!(
            store.resolve("acne.jpg").unwrap(),
            PathBuf::from("/srv/images/acne.jpg")
        );
        assert_eq!(
            store.resolve("/srv/images/2024/crown.png").unwrap(),
            PathBuf::from("/srv/images/2024/crown.png")
        );
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let store = ImageStore::new("/srv/images");

        assert!(matches!(
            store.resolve("../etc/passwd"),
            Err(StorageError::OutsideBase(_))
        ));
        assert!(matches!(
            store.resolve("/etc/passwd"),
            Err(StorageError::OutsideBase(_))
        ));
        assert!(matches!(store.resolve("  "), Err(StorageError::EmptyPath)));
    }
}
