//! Provider configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use quizforge_core::pipeline::QuestionPipeline;
use quizforge_core::remote::{RemoteSource, MAX_ENDPOINTS};
use quizforge_core::traits::{LlmProvider, QuestionSource};

use crate::gemini::{GeminiProvider, DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const CONFIG_FILE_NAME: &str = "quizforge.toml";

/// Configuration for the generation provider.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Gemini {
        #[serde(default)]
        api_key: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_base_url")]
        base_url: String,
        /// Endpoint versions, tried in this order.
        #[serde(default = "default_api_versions")]
        api_versions: Vec<String>,
    },
}

impl ProviderConfig {
    /// Gemini with defaults and the given key.
    pub fn gemini(api_key: &str) -> Self {
        ProviderConfig::Gemini {
            api_key: api_key.to_string(),
            model: default_model(),
            base_url: default_base_url(),
            api_versions: default_api_versions(),
        }
    }

    pub fn has_credential(&self) -> bool {
        match self {
            ProviderConfig::Gemini { api_key, .. } => !api_key.trim().is_empty(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Gemini {
                api_key: _,
                model,
                base_url,
                api_versions,
            } => f
                .debug_struct("Gemini")
                .field("api_key", &"***")
                .field("model", model)
                .field("base_url", base_url)
                .field("api_versions", api_versions)
                .finish(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_api_versions() -> Vec<String> {
    vec!["v1".to_string(), "v1beta".to_string()]
}
fn default_endpoint_timeout() -> u64 {
    8
}
fn default_temperature() -> f64 {
    0.4
}
fn default_language() -> String {
    "ru".to_string()
}

/// Top-level quizforge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizforgeConfig {
    /// Generation provider; absent means the deterministic generator only.
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    /// Timeout for each endpoint attempt, in seconds.
    #[serde(default = "default_endpoint_timeout")]
    pub endpoint_timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Language tag used when a request does not name one.
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl QuizforgeConfig {
    /// Reject settings the generation chain cannot honour.
    pub fn validate(&self) -> Result<()> {
        if let Some(ProviderConfig::Gemini { api_versions, .. }) = &self.provider {
            if api_versions.is_empty() {
                anyhow::bail!("provider.api_versions must name at least one version");
            }
            if api_versions.len() > MAX_ENDPOINTS {
                anyhow::bail!(
                    "provider.api_versions allows a primary and one fallback version, got {}",
                    api_versions.len()
                );
            }
        }
        Ok(())
    }
}

impl Default for QuizforgeConfig {
    fn default() -> Self {
        Self {
            provider: None,
            endpoint_timeout_secs: default_endpoint_timeout(),
            temperature: default_temperature(),
            default_language: default_language(),
        }
    }
}

/// Expand `${NAME}` references from the environment.
///
/// Single left-to-right pass: substituted values are never re-expanded, so a
/// variable whose value is itself a `${...}` reference cannot loop. An
/// unterminated `${` is kept as literal text.
fn resolve_env_vars(input: &str) -> String {
    expand_vars(input, |name| std::env::var(name).ok())
}

fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find("${") {
        let Some(close) = rest[open + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = &rest[open + 2..open + 2 + close];
        out.push_str(&lookup(name).unwrap_or_default());
        rest = &rest[open + 2 + close + 1..];
    }
    out.push_str(rest);
    out
}

fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::Gemini {
            api_key,
            model,
            base_url,
            api_versions,
        } => ProviderConfig::Gemini {
            api_key: resolve_env_vars(api_key),
            model: resolve_env_vars(model),
            base_url: resolve_env_vars(base_url),
            api_versions: api_versions.clone(),
        },
    }
}

/// Apply key/model overrides; the first variable of each pair that is set wins.
fn apply_env_overrides(config: &mut QuizforgeConfig, lookup: impl Fn(&str) -> Option<String>) {
    let first_set = |names: &[&str]| names.iter().find_map(|name| lookup(name));

    let key = first_set(&["QUIZFORGE_GEMINI_KEY", "GEMINI_API_KEY"]);
    let model_override = first_set(&["QUIZFORGE_GEMINI_MODEL", "GEMINI_MODEL"]);

    if key.is_none() && model_override.is_none() {
        return;
    }
    let ProviderConfig::Gemini { api_key, model, .. } =
        config.provider.get_or_insert_with(|| ProviderConfig::gemini(""));
    if let Some(key) = key {
        *api_key = key;
    }
    if let Some(name) = model_override.filter(|m| !m.trim().is_empty()) {
        *model = name;
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizforge.toml` in the current directory
/// 2. `~/.config/quizforge/config.toml`
///
/// Environment variable overrides: `QUIZFORGE_GEMINI_KEY` / `GEMINI_API_KEY`
/// and `QUIZFORGE_GEMINI_MODEL` / `GEMINI_MODEL`.
pub fn load_config() -> Result<QuizforgeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizforgeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<QuizforgeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => QuizforgeConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config.provider = config.provider.as_ref().map(resolve_provider_config);
    config.validate()?;

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizforge"))
}

/// Build the ordered endpoint chain for the configured provider.
///
/// Returns an empty chain when no provider credential is configured.
pub fn create_provider_chain(config: &QuizforgeConfig) -> Vec<Arc<dyn LlmProvider>> {
    match &config.provider {
        Some(provider) if provider.has_credential() => match provider {
            ProviderConfig::Gemini {
                api_key,
                model,
                base_url,
                api_versions,
            } => api_versions
                .iter()
                .take(MAX_ENDPOINTS)
                .map(|version| {
                    Arc::new(GeminiProvider::new(
                        api_key,
                        model,
                        Some(base_url.clone()),
                        version,
                    )) as Arc<dyn LlmProvider>
                })
                .collect(),
        },
        _ => Vec::new(),
    }
}

/// Build the question pipeline: the remote source when endpoints are
/// configured, always terminated by the deterministic generator.
pub fn create_pipeline(config: &QuizforgeConfig) -> QuestionPipeline {
    let endpoints = create_provider_chain(config);
    if endpoints.is_empty() {
        info!("no provider credential configured; using deterministic generator only");
        return QuestionPipeline::fallback_only();
    }

    let remote = RemoteSource::new(endpoints)
        .with_timeout(Duration::from_secs(config.endpoint_timeout_secs.max(1)))
        .with_temperature(config.temperature);
    info!(endpoints = remote.endpoint_count(), "remote question source enabled");
    let sources: Vec<Arc<dyn QuestionSource>> = vec![Arc::new(remote)];
    QuestionPipeline::new(sources)
}
