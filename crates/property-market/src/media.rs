//! Image acceptance rules and the storage seam that turns uploaded bytes into stable locators.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use base64::Engine;
use serde::{Deserialize, Deserializer};

use crate::config::MediaConfig;

/// Raw upload handed to a [`MediaStore`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageUpload {
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(rename = "data", deserialize_with = "deserialize_base64")]
    pub bytes: Vec<u8>,
}

fn deserialize_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    base64::engine::general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }

    fn from_mime(value: &str) -> Option<Self> {
        let parsed: mime::Mime = value.trim().parse().ok()?;
        if !parsed.type_().as_str().eq_ignore_ascii_case(mime::IMAGE.as_str()) {
            return None;
        }
        match parsed.subtype().as_str().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" | "pjpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename).extension()?.to_str()?;
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("cannot determine image type for '{filename}' (content-type: '{content_type}'); upload a JPEG, PNG, or WebP image")]
    UnsupportedType {
        filename: String,
        content_type: String,
    },
    #[error("image '{filename}' exceeds the {limit_bytes} byte limit")]
    TooLarge { filename: String, limit_bytes: usize },
    #[error("image '{filename}' is empty")]
    Empty { filename: String },
    #[error("media storage failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Validation applied to every upload before it is persisted.
#[derive(Debug, Clone, Copy)]
pub struct ImagePolicy {
    max_bytes: usize,
}

impl ImagePolicy {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Resolve the image format, trusting an explicit image content type first and falling back
    /// to the filename extension (mobile clients often send `application/octet-stream`).
    pub fn admit(&self, upload: &ImageUpload) -> Result<ImageFormat, MediaError> {
        let content_type = upload.content_type.as_deref().unwrap_or_default();
        let format = ImageFormat::from_mime(content_type)
            .or_else(|| ImageFormat::from_filename(&upload.filename))
            .ok_or_else(|| MediaError::UnsupportedType {
                filename: upload.filename.clone(),
                content_type: content_type.to_string(),
            })?;

        if upload.bytes.is_empty() {
            return Err(MediaError::Empty {
                filename: upload.filename.clone(),
            });
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(MediaError::TooLarge {
                filename: upload.filename.clone(),
                limit_bytes: self.max_bytes,
            });
        }

        Ok(format)
    }
}

impl From<&MediaConfig> for ImagePolicy {
    fn from(config: &MediaConfig) -> Self {
        Self::new(config.max_image_bytes)
    }
}

/// Binary storage for listing media.
pub trait MediaStore: Send + Sync {
    /// Persist the image and return its public locator.
    fn store_image(&self, upload: &ImageUpload) -> Result<String, MediaError>;
    fn delete(&self, locator: &str) -> Result<(), MediaError>;
}

/// Process-local media store used by tests and the demo command.
pub struct InMemoryMediaStore {
    policy: ImagePolicy,
    base_url: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryMediaStore {
    pub fn new(policy: ImagePolicy, base_url: impl Into<String>) -> Self {
        Self {
            policy,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.objects
            .lock()
            .expect("media mutex poisoned")
            .contains_key(locator)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().expect("media mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaStore for InMemoryMediaStore {
    fn store_image(&self, upload: &ImageUpload) -> Result<String, MediaError> {
        let format = self.policy.admit(upload)?;
        let locator = format!(
            "{}/media/properties/{}.{}",
            self.base_url,
            uuid::Uuid::new_v4().simple(),
            format.extension()
        );
        self.objects
            .lock()
            .expect("media mutex poisoned")
            .insert(locator.clone(), upload.bytes.clone());
        Ok(locator)
    }

    fn delete(&self, locator: &str) -> Result<(), MediaError> {
        self.objects
            .lock()
            .expect("media mutex poisoned")
            .remove(locator);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, content_type: Option<&str>, size: usize) -> ImageUpload {
        ImageUpload {
            filename: filename.to_string(),
            content_type: content_type.map(str::to_string),
            bytes: vec![0xAB; size],
        }
    }

    #[test]
    fn explicit_image_types_are_trusted() {
        let policy = ImagePolicy::new(1024);
        assert_eq!(
            policy.admit(&upload("photo", Some("image/png"), 10)).unwrap(),
            ImageFormat::Png
        );
        assert_eq!(
            policy.admit(&upload("x.bin", Some("IMAGE/JPEG"), 10)).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn octet_stream_falls_back_to_the_extension() {
        let policy = ImagePolicy::new(1024);
        let admitted = policy
            .admit(&upload("IMG_0042.JPEG", Some("application/octet-stream"), 10))
            .expect("extension fallback");
        assert_eq!(admitted, ImageFormat::Jpeg);
        assert_eq!(admitted.extension(), "jpg");

        match policy.admit(&upload("notes.txt", Some("application/octet-stream"), 10)) {
            Err(MediaError::UnsupportedType { filename, .. }) => assert_eq!(filename, "notes.txt"),
            other => panic!("expected unsupported type, got {other:?}"),
        }
    }

    #[test]
    fn size_limits_are_enforced() {
        let policy = ImagePolicy::new(16);
        assert!(policy.admit(&upload("a.webp", None, 16)).is_ok());
        assert!(matches!(
            policy.admit(&upload("a.webp", None, 17)),
            Err(MediaError::TooLarge { limit_bytes: 16, .. })
        ));
        assert!(matches!(
            policy.admit(&upload("a.webp", None, 0)),
            Err(MediaError::Empty { .. })
        ));
    }

    #[test]
    fn uploads_decode_base64_payloads() {
        let upload: ImageUpload = serde_json::from_str(
            r#"{"filename":"front.png","content_type":"image/png","data":"iVBORw=="}"#,
        )
        .expect("upload decodes");
        assert_eq!(upload.bytes, vec![0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn in_memory_store_issues_locators_under_the_base_url() {
        let store = InMemoryMediaStore::new(ImagePolicy::new(64), "http://cdn.test/");
        let locator = store
            .store_image(&upload("front.png", Some("image/png"), 4))
            .expect("stored");

        assert!(locator.starts_with("http://cdn.test/media/properties/"));
        assert!(locator.ends_with(".png"));
        assert!(store.contains(&locator));

        store.delete(&locator).expect("deleted");
        assert!(store.is_empty());
    }
}
