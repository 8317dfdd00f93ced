//! Image types - raw uploads and the encoded avatar stored on profiles
//!
//! An upload arrives as an [`ImageBlob`] (bytes plus declared MIME type).
//! The image pipeline turns it into an [`AvatarImage`], a self-contained
//! data URI that embeds both the format and the bytes.

use std::path::Path;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Raw image upload as handed over by a file picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    /// Declared MIME type, e.g. `image/png`
    pub mime_type: String,
}

impl ImageBlob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Read a file and declare its MIME type from the extension.
    ///
    /// Unknown extensions are declared as `application/octet-stream` so the
    /// type check rejects them before any decoding happens.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(mime_for_extension)
            .unwrap_or("application/octet-stream");
        Ok(Self::new(bytes, mime))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Encoded avatar image in data URI form
///
/// Format: `data:<mime>;base64,<payload>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvatarImage(String);

impl AvatarImage {
    /// Wrap encoded bytes as a data URI
    pub fn from_encoded(mime_type: &str, bytes: &[u8]) -> Self {
        let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self(format!("data:{mime_type};base64,{payload}"))
    }

    /// Accept an existing data URI string. Returns `None` if the string is
    /// not a base64 image data URI.
    pub fn from_data_uri(uri: impl Into<String>) -> Option<Self> {
        let uri = uri.into();
        let (header, payload) = uri.split_once(',')?;
        let valid = header.starts_with("data:image/")
            && header.ends_with(";base64")
            && !payload.is_empty();
        valid.then_some(Self(uri))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Declared MIME type embedded in the URI
    pub fn mime_type(&self) -> &str {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .unwrap_or_default()
    }

    /// Decode the embedded payload
    pub fn decode_bytes(&self) -> Option<Vec<u8>> {
        let (_, payload) = self.0.split_once(',')?;
        base64::engine::general_purpose::STANDARD.decode(payload).ok()
    }

    /// Length of the encoded string, which is what profile storage pays for
    pub fn encoded_len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_roundtrip() {
        let img = AvatarImage::from_encoded("image/jpeg", &[0xff, 0xd8, 0xff]);
        assert!(img.as_str().starts_with("data:image/jpeg;base64,"));
        assert_eq!(img.mime_type(), "image/jpeg");
        assert_eq!(img.decode_bytes().unwrap(), vec![0xff, 0xd8, 0xff]);
    }

    #[test]
    fn test_from_data_uri_rejects_non_images() {
        assert!(AvatarImage::from_data_uri("data:text/plain;base64,aGk=").is_none());
        assert!(AvatarImage::from_data_uri("https://example.com/a.png").is_none());
        assert!(AvatarImage::from_data_uri("data:image/png;base64,").is_none());
        assert!(AvatarImage::from_data_uri("data:image/png;base64,iVBORw0KG").is_some());
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension("JPG"), "image/jpeg");
        assert_eq!(mime_for_extension("webp"), "image/webp");
        assert_eq!(mime_for_extension("bmp"), "application/octet-stream");
    }

    #[test]
    fn test_blob_from_path_declares_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avatar.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let blob = ImageBlob::from_path(&path).unwrap();
        assert_eq!(blob.mime_type, "image/png");
        assert_eq!(blob.len(), 16);
    }
}
