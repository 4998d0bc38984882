use std::env;
use std::path::PathBuf;

pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Runtime settings, resolved from the environment and then overridden by CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    pub gateway: String,
    pub image_model: String,
    pub text_model: String,
    pub api_base: String,
    pub request_timeout_s: f64,
    pub projects_path: PathBuf,
}

impl EditorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let has_key = non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("GOOGLE_API_KEY"))
            .is_some();
        let gateway = non_empty("THUMBPRO_GATEWAY")
            .map(|value| value.to_ascii_lowercase())
            .unwrap_or_else(|| if has_key { "gemini" } else { "dryrun" }.to_string());
        let request_timeout_s = non_empty("THUMBPRO_REQUEST_TIMEOUT")
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .unwrap_or(90.0)
            .clamp(15.0, 300.0);
        let projects_path = non_empty("THUMBPRO_PROJECTS")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                home_dir(&non_empty)
                    .join(".thumbpro")
                    .join("projects.json")
            });

        Self {
            gateway,
            image_model: non_empty("THUMBPRO_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            text_model: non_empty("THUMBPRO_TEXT_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            api_base: non_empty("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            request_timeout_s,
            projects_path,
        }
    }
}

fn home_dir(non_empty: &impl Fn(&str) -> Option<String>) -> PathBuf {
    non_empty("HOME")
        .or_else(|| non_empty("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn gemini_api_key() -> Option<String> {
    non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
