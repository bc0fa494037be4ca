//! Application configuration for brainstorm runs.
//!
//! User config lives at `~/.brainstorm/brainstorm.toml`.
//! Model options resolve once per run: explicit value, then environment
//! variable, then config file, then built-in default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BrainstormError, Result};
use crate::types::PersonaConstraints;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "brainstorm.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".brainstorm";

/// Model identifiers the provider is known to serve.
pub const SUPPORTED_MODELS: &[&str] = &["openai/o1-mini", "openai/o1", "openai/gpt-4.1"];

pub const DEFAULT_MODEL: &str = "openai/gpt-4.1";
pub const DEFAULT_TEMPERATURE: f64 = 0.75;
pub const DEFAULT_BASE_URL: &str = "https://api.venice.ai/api/v1";
pub const DEFAULT_TEMPLATE: &str = "startup";
pub const DEFAULT_RESULTS_DIR: &str = "results";
pub const DEFAULT_MAX_RPM: u32 = 20;
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

pub const ENV_API_KEY: &str = "VENICE_API_KEY";
pub const ENV_MODEL: &str = "BRAINSTORM_MODEL";
pub const ENV_TEMPERATURE: &str = "VENICE_TEMPERATURE";
pub const ENV_TOP_P: &str = "VENICE_TOP_P";
pub const ENV_BASE_URL: &str = "VENICE_BASE_URL";

// ---------------------------------------------------------------------------
// Config structs (matching brainstorm.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Model provider settings.
    #[serde(default)]
    pub model: ModelSection,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Topic template used when no explicit topic is given.
    #[serde(default = "default_template")]
    pub template: String,

    /// Directory reports are written to.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,

    /// Per-persona call-rate ceiling (calls per minute).
    #[serde(default = "default_max_rpm")]
    pub max_rpm: u32,

    /// Per-persona reasoning iteration limit.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            results_dir: default_results_dir(),
            max_rpm: default_max_rpm(),
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.into()
}
fn default_results_dir() -> String {
    DEFAULT_RESULTS_DIR.into()
}
fn default_max_rpm() -> u32 {
    DEFAULT_MAX_RPM
}
fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    /// Model identifier; must be one of [`SUPPORTED_MODELS`].
    #[serde(default = "default_model")]
    pub model_id: String,

    /// Sampling temperature, 0.0 to 1.0.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Optional nucleus sampling cutoff, 0.0 to 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    /// OpenAI-compatible API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            model_id: default_model(),
            temperature: default_temperature(),
            top_p: None,
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}
fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_api_key_env() -> String {
    ENV_API_KEY.into()
}

impl From<&AppConfig> for PersonaConstraints {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_iterations: config.defaults.max_iterations,
            max_rpm: config.defaults.max_rpm,
        }
    }
}

// ---------------------------------------------------------------------------
// Model config (runtime, resolved once per run)
// ---------------------------------------------------------------------------

/// Values supplied explicitly by the caller (CLI flags or API arguments).
#[derive(Debug, Clone, Default)]
pub struct ModelOverrides {
    pub api_key: Option<String>,
    pub model_id: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub base_url: Option<String>,
}

/// Fully resolved and validated model configuration.
#[derive(Clone, PartialEq)]
pub struct ModelConfig {
    pub model_id: String,
    pub temperature: f64,
    pub top_p: Option<f64>,
    pub base_url: Url,
    pub api_key: String,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model_id", &self.model_id)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ModelConfig {
    /// Resolve against the process environment.
    pub fn resolve(overrides: &ModelOverrides, config: &AppConfig) -> Result<Self> {
        Self::resolve_with(overrides, config, |name| std::env::var(name).ok())
    }

    /// Resolve each option as explicit > env > config file > default, then validate.
    ///
    /// `env` looks up a variable by name; empty values count as unset.
    pub fn resolve_with<F>(overrides: &ModelOverrides, config: &AppConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());
        let section = &config.model;

        let api_key_env = section.api_key_env.as_str();
        let api_key = overrides
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| env(api_key_env))
            .ok_or_else(|| {
                BrainstormError::config(format!(
                    "API key not provided. Pass it explicitly or set the {api_key_env} environment variable"
                ))
            })?;

        let model_id = overrides
            .model_id
            .clone()
            .or_else(|| env(ENV_MODEL))
            .unwrap_or_else(|| section.model_id.clone());

        let temperature = match overrides.temperature {
            Some(t) => t,
            None => match env(ENV_TEMPERATURE) {
                Some(raw) => parse_unit_float(ENV_TEMPERATURE, &raw)?,
                None => section.temperature,
            },
        };

        let top_p = match overrides.top_p {
            Some(p) => Some(p),
            None => match env(ENV_TOP_P) {
                Some(raw) => Some(parse_unit_float(ENV_TOP_P, &raw)?),
                None => section.top_p,
            },
        };

        let base_url_raw = overrides
            .base_url
            .clone()
            .or_else(|| env(ENV_BASE_URL))
            .unwrap_or_else(|| section.base_url.clone());
        let base_url = parse_base_url(&base_url_raw)?;

        let resolved = Self {
            model_id,
            temperature,
            top_p,
            base_url,
            api_key,
        };
        resolved.validate()?;
        Ok(resolved)
    }

    /// Check every option against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(BrainstormError::config("API key must not be empty"));
        }
        validate_model(&self.model_id)?;
        validate_unit_range("temperature", self.temperature)?;
        if let Some(p) = self.top_p {
            validate_unit_range("top_p", p)?;
        }
        match self.base_url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(BrainstormError::config(format!(
                "base URL must be http or https (got {other})"
            ))),
        }
    }
}

/// Reject model ids outside [`SUPPORTED_MODELS`].
pub fn validate_model(model_id: &str) -> Result<()> {
    if SUPPORTED_MODELS.contains(&model_id) {
        Ok(())
    } else {
        Err(BrainstormError::config(format!(
            "unsupported model: {model_id}. Available models: {}",
            SUPPORTED_MODELS.join(", ")
        )))
    }
}

fn validate_unit_range(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(BrainstormError::config(format!(
            "{name} must be between 0 and 1 (got {value})"
        )))
    }
}

fn parse_unit_float(var: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| BrainstormError::config(format!("{var}={raw:?} is not a number: {e}")))
}

fn parse_base_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| BrainstormError::config(format!("invalid base URL {raw:?}: {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.brainstorm/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BrainstormError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.brainstorm/brainstorm.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BrainstormError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BrainstormError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BrainstormError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BrainstormError::Serialization(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BrainstormError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn with_key() -> ModelOverrides {
        ModelOverrides {
            api_key: Some("sk-test".into()),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("results_dir"));
        assert!(toml_str.contains("VENICE_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.max_rpm, 20);
        assert_eq!(parsed.model.model_id, DEFAULT_MODEL);
        assert!(parsed.model.top_p.is_none());
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let toml_str = r#"
[model]
model_id = "openai/o1"
top_p = 0.9
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.model.model_id, "openai/o1");
        assert_eq!(config.model.top_p, Some(0.9));
        assert_eq!(config.model.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.defaults.template, "startup");
    }

    #[test]
    fn persona_constraints_from_app_config() {
        let mut app = AppConfig::default();
        app.defaults.max_rpm = 50;
        let constraints = PersonaConstraints::from(&app);
        assert_eq!(constraints.max_rpm, 50);
        assert_eq!(constraints.max_iterations, 3);
    }

    #[test]
    fn resolves_builtin_defaults() {
        let config =
            ModelConfig::resolve_with(&with_key(), &AppConfig::default(), env_from(&[])).unwrap();
        assert_eq!(config.model_id, "openai/gpt-4.1");
        assert_eq!(config.temperature, 0.75);
        assert_eq!(config.top_p, None);
        assert_eq!(config.base_url.as_str(), "https://api.venice.ai/api/v1");
        assert_eq!(config.api_key, "sk-test");
    }

    #[test]
    fn explicit_beats_env_beats_file() {
        let mut app = AppConfig::default();
        app.model.model_id = "openai/o1-mini".into();
        app.model.temperature = 0.1;

        let env = env_from(&[(ENV_MODEL, "openai/o1"), (ENV_TEMPERATURE, "0.3")]);
        let config = ModelConfig::resolve_with(&with_key(), &app, &env).unwrap();
        assert_eq!(config.model_id, "openai/o1");
        assert_eq!(config.temperature, 0.3);

        let overrides = ModelOverrides {
            model_id: Some("openai/gpt-4.1".into()),
            temperature: Some(0.9),
            ..with_key()
        };
        let config = ModelConfig::resolve_with(&overrides, &app, &env).unwrap();
        assert_eq!(config.model_id, "openai/gpt-4.1");
        assert_eq!(config.temperature, 0.9);

        let config = ModelConfig::resolve_with(&with_key(), &app, env_from(&[])).unwrap();
        assert_eq!(config.model_id, "openai/o1-mini");
        assert_eq!(config.temperature, 0.1);
    }

    #[test]
    fn explicit_zero_temperature_is_honored() {
        let overrides = ModelOverrides {
            temperature: Some(0.0),
            ..with_key()
        };
        let env = env_from(&[(ENV_TEMPERATURE, "0.8")]);
        let config = ModelConfig::resolve_with(&overrides, &AppConfig::default(), env).unwrap();
        assert_eq!(config.temperature, 0.0);
    }

    #[test]
    fn api_key_comes_from_configured_env_var() {
        let mut app = AppConfig::default();
        app.model.api_key_env = "MY_PROVIDER_KEY".into();
        let env = env_from(&[("MY_PROVIDER_KEY", "sk-env")]);
        let config = ModelConfig::resolve_with(&ModelOverrides::default(), &app, env).unwrap();
        assert_eq!(config.api_key, "sk-env");
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let env = env_from(&[(ENV_API_KEY, "  ")]);
        let err = ModelConfig::resolve_with(&ModelOverrides::default(), &AppConfig::default(), env)
            .unwrap_err();
        assert!(matches!(err, BrainstormError::Config { .. }));
        assert!(err.to_string().contains("VENICE_API_KEY"));
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let overrides = ModelOverrides {
            temperature: Some(1.5),
            ..with_key()
        };
        let err = ModelConfig::resolve_with(&overrides, &AppConfig::default(), env_from(&[]))
            .unwrap_err();
        assert!(err.is_fail_fast());
        assert!(err.to_string().contains("temperature must be between 0 and 1"));
    }

    #[test]
    fn out_of_range_top_p_from_env_is_rejected() {
        let env = env_from(&[(ENV_TOP_P, "1.2")]);
        let err = ModelConfig::resolve_with(&with_key(), &AppConfig::default(), env).unwrap_err();
        assert!(err.to_string().contains("top_p"));
    }

    #[test]
    fn unparseable_env_temperature_is_rejected() {
        let env = env_from(&[(ENV_TEMPERATURE, "warm")]);
        let err = ModelConfig::resolve_with(&with_key(), &AppConfig::default(), env).unwrap_err();
        assert!(err.to_string().contains("VENICE_TEMPERATURE"));
    }

    #[test]
    fn unsupported_model_is_rejected() {
        let overrides = ModelOverrides {
            model_id: Some("llama-3.3-70b".into()),
            ..with_key()
        };
        let err = ModelConfig::resolve_with(&overrides, &AppConfig::default(), env_from(&[]))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported model: llama-3.3-70b"));
        assert!(err.to_string().contains("openai/gpt-4.1"));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let overrides = ModelOverrides {
            base_url: Some("ftp://example.com".into()),
            ..with_key()
        };
        let err = ModelConfig::resolve_with(&overrides, &AppConfig::default(), env_from(&[]))
            .unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn validate_catches_hand_built_config() {
        let mut config =
            ModelConfig::resolve_with(&with_key(), &AppConfig::default(), env_from(&[])).unwrap();
        assert!(config.validate().is_ok());

        config.temperature = 1.5;
        assert!(config.validate().is_err());

        config.temperature = 0.5;
        config.top_p = Some(-0.1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config =
            ModelConfig::resolve_with(&with_key(), &AppConfig::default(), env_from(&[])).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("<redacted>"));
    }
}
