//! Cloud Storage URI parsing and MIME type guessing for ingested assets.

use crate::error::CoreError;
use crate::workflow::batch::STORAGE_URI_SCHEME;

/// Fallback MIME type when the extension is unknown.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

const MIME_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
];

/// A parsed `gs://bucket/object` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject<'a> {
    pub bucket: &'a str,
    pub object: &'a str,
}

impl<'a> StorageObject<'a> {
    /// Final path segment of the object name.
    pub fn file_name(&self) -> &'a str {
        self.object.rsplit('/').next().unwrap_or(self.object)
    }
}

/// Parse a storage URI. Both bucket and object name must be non-empty.
pub fn parse_storage_uri(uri: &str) -> Result<StorageObject<'_>, CoreError> {
    let rest = uri
        .strip_prefix(STORAGE_URI_SCHEME)
        .ok_or_else(|| CoreError::Validation(format!("'{uri}' is not a {STORAGE_URI_SCHEME} URI")))?;
    match rest.split_once('/') {
        Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => {
            Ok(StorageObject { bucket, object })
        }
        _ => Err(CoreError::Validation(format!(
            "'{uri}' must name a bucket and an object"
        ))),
    }
}

/// Guess a MIME type from a file name's extension.
pub fn guess_mime_type(file_name: &str) -> &'static str {
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return DEFAULT_MIME_TYPE;
    };
    let ext = ext.to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}
