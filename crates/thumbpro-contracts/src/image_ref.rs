use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::EditorError;

/// Opaque handle to encoded image bytes, kept as a `data:` URI.
///
/// Every constructor, deserialization included, checks the `data:image/*;base64,` shape.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageRef(String);

impl ImageRef {
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
    }

    pub fn from_data_url(raw: impl Into<String>) -> Result<Self, EditorError> {
        let raw = raw.into();
        split_data_url(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> &str {
        split_data_url(&self.0)
            .map(|(mime, _)| mime)
            .unwrap_or("image/png")
    }

    /// The base64 payload with the `data:<mime>;base64,` prefix stripped.
    pub fn base64_payload(&self) -> &str {
        split_data_url(&self.0)
            .map(|(_, payload)| payload)
            .unwrap_or_default()
    }

    pub fn decode(&self) -> Result<Vec<u8>, EditorError> {
        let (_, payload) = split_data_url(&self.0)?;
        BASE64
            .decode(payload.as_bytes())
            .map_err(|err| EditorError::TransformFailed(format!("image payload decode failed: {err}")))
    }
}

impl TryFrom<String> for ImageRef {
    type Error = EditorError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::from_data_url(raw)
    }
}

impl From<ImageRef> for String {
    fn from(image: ImageRef) -> Self {
        image.0
    }
}

impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRef")
            .field("mime", &self.mime_type())
            .field("payload_len", &self.base64_payload().len())
            .finish()
    }
}

fn split_data_url(raw: &str) -> Result<(&str, &str), EditorError> {
    let invalid = || EditorError::TransformFailed("expected a base64 image data URL".to_string());
    let rest = raw.strip_prefix("data:").ok_or_else(invalid)?;
    let (mime, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;
    if !mime.starts_with("image/") {
        return Err(invalid());
    }
    Ok((mime, payload))
}
