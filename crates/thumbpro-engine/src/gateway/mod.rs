mod dryrun;
mod gemini;

use std::collections::BTreeMap;
use std::sync::Arc;

use thumbpro_contracts::{EditorError, ImageRef};

use crate::config::EditorConfig;

pub use dryrun::DryrunGateway;
pub use gemini::GeminiGateway;

/// Every generated frame is requested at this ratio, whatever the source.
pub const THUMBNAIL_ASPECT_RATIO: &str = "16:9";
pub const DEFAULT_CAPTION: &str = "Thumbnail updated!";
pub const MAX_SUGGESTIONS: usize = 6;
pub const MAX_SUGGESTION_WORDS: usize = 6;

pub const FALLBACK_SUGGESTIONS: &[&str] = &[
    "Add a bold red border",
    "Put subject in space",
    "Add a professional glow",
    "Make the expression shocked",
    "Boost color saturation",
    "Add bold title text",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub prompt: String,
    pub source_image: Option<ImageRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditResult {
    pub image: ImageRef,
    pub caption: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionRequest {
    pub last_prompt: Option<String>,
    pub current_image: Option<ImageRef>,
}

/// The remote generative service boundary.
pub trait EditGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Edits `source_image` (or generates from scratch) into a 16:9 frame.
    fn edit_or_generate(&self, request: &EditRequest) -> Result<EditResult, EditorError>;

    fn suggest_next_edits(&self, request: &SuggestionRequest) -> anyhow::Result<Vec<String>>;
}

#[derive(Default)]
pub struct GatewayRegistry {
    gateways: BTreeMap<String, Arc<dyn EditGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<G: EditGateway + 'static>(&mut self, gateway: G) {
        self.gateways
            .insert(gateway.name().to_string(), Arc::new(gateway));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EditGateway>> {
        self.gateways.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.gateways.keys().cloned().collect()
    }
}

pub fn default_gateway_registry(config: &EditorConfig) -> GatewayRegistry {
    let mut gateways = GatewayRegistry::new();
    gateways.register(DryrunGateway);
    gateways.register(GeminiGateway::new(config));
    gateways
}

/// Suggestions never fail: any gateway error falls back to the built-in list.
pub fn suggest_or_fallback(gateway: &dyn EditGateway, request: &SuggestionRequest) -> Vec<String> {
    match gateway.suggest_next_edits(request) {
        Ok(raw) => normalize_suggestions(raw),
        Err(err) => {
            tracing::warn!(
                gateway = gateway.name(),
                error = %format!("{err:#}"),
                "suggestion fetch failed; using fallback list"
            );
            fallback_suggestions()
        }
    }
}

pub fn fallback_suggestions() -> Vec<String> {
    FALLBACK_SUGGESTIONS
        .iter()
        .map(|value| value.to_string())
        .collect()
}

/// Trims, caps each entry at six words, drops blanks and duplicates, keeps six.
pub fn normalize_suggestions(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in raw {
        let words: Vec<&str> = item
            .split_whitespace()
            .take(MAX_SUGGESTION_WORDS)
            .collect();
        if words.is_empty() {
            continue;
        }
        let text = words.join(" ");
        if out
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(&text))
        {
            continue;
        }
        out.push(text);
        if out.len() == MAX_SUGGESTIONS {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use anyhow::bail;
    use thumbpro_contracts::EditorError;

    use super::{
        default_gateway_registry, normalize_suggestions, suggest_or_fallback, EditGateway,
        EditRequest, EditResult, SuggestionRequest, FALLBACK_SUGGESTIONS,
    };
    use crate::config::EditorConfig;

    struct BrokenSuggester;

    impl EditGateway for BrokenSuggester {
        fn name(&self) -> &str {
            "broken"
        }

        fn edit_or_generate(&self, _request: &EditRequest) -> Result<EditResult, EditorError> {
            Err(EditorError::no_image_returned())
        }

        fn suggest_next_edits(&self, _request: &SuggestionRequest) -> anyhow::Result<Vec<String>> {
            bail!("upstream exploded")
        }
    }

    #[test]
    fn suggestion_errors_fall_back_to_builtin_list() {
        let suggestions = suggest_or_fallback(&BrokenSuggester, &SuggestionRequest::default());
        assert_eq!(suggestions.len(), FALLBACK_SUGGESTIONS.len());
        assert_eq!(suggestions[0], FALLBACK_SUGGESTIONS[0]);
    }

    #[test]
    fn suggestions_are_capped_in_count_and_length() {
        let raw = vec![
            "  Add   neon rim light  ".to_string(),
            "".to_string(),
            "add neon rim light".to_string(),
            "one two three four five six seven eight".to_string(),
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "d".to_string(),
            "e".to_string(),
        ];
        let normalized = normalize_suggestions(raw);
        assert_eq!(normalized.len(), 6);
        assert_eq!(normalized[0], "Add neon rim light");
        assert_eq!(normalized[1], "one two three four five six");
        assert!(normalize_suggestions(Vec::new()).is_empty());
    }

    #[test]
    fn default_registry_has_dryrun_and_gemini() {
        let config = EditorConfig::from_lookup(|_| None);
        let registry = default_gateway_registry(&config);
        assert_eq!(registry.names(), vec!["dryrun", "gemini"]);
        assert!(registry.get("gemini").is_some());
        assert!(registry.get("openai").is_none());
    }
}
