use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An image file handed over by the controller layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Object storage for listing images
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Store the image and return its public link
    async fn save(&self, image: &ImageUpload) -> Result<String, MediaError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Image upload failed: {0}")]
    UploadFailed(String),
}

/// Returns a deterministic link per file name without storing anything.
pub struct MockImageStorage {
    pub base_url: String,
}

impl Default for MockImageStorage {
    fn default() -> Self {
        Self {
            base_url: "https://media.example.test".to_string(),
        }
    }
}

#[async_trait]
impl ImageStorage for MockImageStorage {
    async fn save(&self, image: &ImageUpload) -> Result<String, MediaError> {
        if image.bytes.is_empty() {
            return Err(MediaError::UploadFailed(format!("{} is empty", image.file_name)));
        }
        Ok(format!("{}/{}", self.base_url, image.file_name))
    }
}
