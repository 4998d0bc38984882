/// Failures the editor surfaces to the user.
///
/// None of these are fatal to a session: gateway errors leave history untouched,
/// storage corruption degrades to an empty library, and the guard kinds only
/// reject the call that triggered them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditorError {
    #[error("{0}")]
    GenerationFailed(String),

    #[error("Too many requests. Please wait a moment.")]
    RateLimited,

    #[error("Image transform failed: {0}")]
    TransformFailed(String),

    #[error("Stored project data is unreadable: {0}")]
    StorageCorrupt(String),

    #[error("An edit is already in progress.")]
    EditInFlight,

    #[error("Describe a thumbnail or upload an image first.")]
    NothingToEdit,

    #[error("Edit request {0} is not the one in flight.")]
    UnknownRequest(String),
}

impl EditorError {
    pub fn generation_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            return Self::GenerationFailed("Failed to process thumbnail request.".to_string());
        }
        Self::GenerationFailed(message)
    }

    pub fn no_image_returned() -> Self {
        Self::GenerationFailed(
            "The AI did not return a new image. Try a different prompt.".to_string(),
        )
    }

    /// Gateway errors are the ones worth showing in the conversation pane.
    pub fn is_gateway_error(&self) -> bool {
        matches!(self, Self::GenerationFailed(_) | Self::RateLimited)
    }
}

#[cfg(test)]
mod tests {
    use super::EditorError;

    #[test]
    fn blank_generation_message_uses_default_text() {
        assert_eq!(
            EditorError::generation_failed("  ").to_string(),
            "Failed to process thumbnail request."
        );
        assert_eq!(
            EditorError::generation_failed("Gemini request failed (500)").to_string(),
            "Gemini request failed (500)"
        );
    }

    #[test]
    fn rate_limit_message_matches_editor_copy() {
        assert_eq!(
            EditorError::RateLimited.to_string(),
            "Too many requests. Please wait a moment."
        );
        assert!(EditorError::RateLimited.is_gateway_error());
        assert!(!EditorError::EditInFlight.is_gateway_error());
    }
}
