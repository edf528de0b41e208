//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (`~/.spotter/config.json` by default)
//! and environment. A missing file means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "llama3";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Coach defaults (model selection).
    #[serde(default)]
    pub coach: CoachConfig,

    /// Ollama server settings.
    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachConfig {
    /// Model name exactly as listed by `ollama list` (e.g. "llama3", "qwen3:8b").
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OllamaConfig {
    /// Base URL of the Ollama server (default http://127.0.0.1:11434).
    pub base_url: Option<String>,
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("SPOTTER_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".spotter").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or SPOTTER_CONFIG_PATH). Missing file =>
/// default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Resolve the chat model: env SPOTTER_MODEL overrides config, then the built-in default.
pub fn resolve_model(config: &Config) -> String {
    std::env::var("SPOTTER_MODEL")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config
                .coach
                .model
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!(
            "spotter_config_missing_{}.json",
            std::process::id()
        ));
        let (config, used) = load_config(Some(path.clone())).expect("missing config should default");
        assert!(config.coach.model.is_none());
        assert!(config.ollama.base_url.is_none());
        assert_eq!(used, path);
    }

    #[test]
    fn parses_camel_case_fields() {
        let path = std::env::temp_dir().join(format!(
            "spotter_config_parse_{}.json",
            std::process::id()
        ));
        let data = r#"{"coach":{"model":"qwen3:8b"},"ollama":{"baseUrl":"http://10.0.0.5:11434"}}"#;
        fs::write(&path, data).expect("config fixture should write");

        let (config, _) = load_config(Some(path.clone())).expect("config should load");
        assert_eq!(config.coach.model.as_deref(), Some("qwen3:8b"));
        assert_eq!(
            config.ollama.base_url.as_deref(),
            Some("http://10.0.0.5:11434")
        );

        let _ = fs::remove_file(path);
    }

    #[test]
    fn resolve_model_prefers_config_over_default() {
        let mut config = Config::default();
        assert_eq!(resolve_model(&config), DEFAULT_MODEL);

        config.coach.model = Some("qwen3:8b".to_string());
        assert_eq!(resolve_model(&config), "qwen3:8b");

        config.coach.model = Some("   ".to_string());
        assert_eq!(resolve_model(&config), DEFAULT_MODEL);
    }
}
