use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{now_utc_iso, ImageRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionSource {
    Upload,
    Edit { prompt: String },
    Project { project_id: String },
}

/// One immutable state of the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub image: ImageRef,
    pub source: VersionSource,
    pub created_at: String,
}

impl Version {
    pub fn new(image: ImageRef, source: VersionSource, seq: u64) -> Self {
        Self {
            id: short_version_id(&image, seq),
            image,
            source,
            created_at: now_utc_iso(),
        }
    }

    pub fn prompt(&self) -> Option<&str> {
        match &self.source {
            VersionSource::Edit { prompt } => Some(prompt.as_str()),
            _ => None,
        }
    }
}

fn short_version_id(image: &ImageRef, seq: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.as_str().as_bytes());
    hasher.update(seq.to_be_bytes());
    let digest = hasher.finalize();
    format!("v-{}", hex::encode(&digest[..4]))
}
