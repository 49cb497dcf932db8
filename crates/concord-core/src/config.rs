//! TOML configuration
//!
//! ```toml
//! [budget]
//! overall_ceiling_ms = 25000
//!
//! [multi]
//! fan_out_ceiling_ms = 15000
//! perspective_order = ["anthropic", "openai", "google"]
//!
//! [providers.openai]
//! api_key = "${OPENAI_API_KEY}"
//! timeout_ms = 12000
//!
//! [providers.local]
//! dialect = "openai-compatible"
//! base_url = "http://localhost:11434"
//! default_model = "llama3.2"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::budget::{MIN_FALLBACK_BUDGET, PRIMARY_SHARE};
use crate::executor::ExecutorConfig;
use crate::orchestrator::MultiConfig;
use crate::registry::{
    Credentials, Dialect, PERSPECTIVE_ORDER, ProviderConfig, SPEED_ORDER, builtin_credential_keys,
    builtin_providers,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcordConfig {
    #[serde(default)]
    pub budget: BudgetSettings,
    #[serde(default)]
    pub multi: MultiSettings,
    /// Per-provider overrides and additional providers, keyed by id
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSettings {
    #[serde(default = "default_overall_ceiling_ms")]
    pub overall_ceiling_ms: u64,
    #[serde(default = "default_min_fallback_budget_ms")]
    pub min_fallback_budget_ms: u64,
    #[serde(default = "default_primary_share")]
    pub primary_share: f64,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            overall_ceiling_ms: default_overall_ceiling_ms(),
            min_fallback_budget_ms: default_min_fallback_budget_ms(),
            primary_share: default_primary_share(),
        }
    }
}

fn default_overall_ceiling_ms() -> u64 {
    25_000
}
fn default_min_fallback_budget_ms() -> u64 {
    MIN_FALLBACK_BUDGET.as_millis() as u64
}
fn default_primary_share() -> f64 {
    PRIMARY_SHARE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSettings {
    #[serde(default = "default_fan_out_ceiling_ms")]
    pub fan_out_ceiling_ms: u64,
    #[serde(default = "default_speed_ceiling_ms")]
    pub speed_ceiling_ms: u64,
    #[serde(default = "default_max_perspectives")]
    pub max_perspectives: usize,
    #[serde(default = "default_min_perspectives")]
    pub min_perspectives: usize,
    #[serde(default = "default_perspective_max_tokens")]
    pub perspective_max_tokens: u32,
    #[serde(default = "default_synthesis_max_tokens")]
    pub synthesis_max_tokens: u32,
    #[serde(default = "default_perspective_word_cap")]
    pub perspective_word_cap: u32,
    #[serde(default = "default_perspective_order")]
    pub perspective_order: Vec<String>,
    #[serde(default = "default_speed_order")]
    pub speed_order: Vec<String>,
}

impl Default for MultiSettings {
    fn default() -> Self {
        Self {
            fan_out_ceiling_ms: default_fan_out_ceiling_ms(),
            speed_ceiling_ms: default_speed_ceiling_ms(),
            max_perspectives: default_max_perspectives(),
            min_perspectives: default_min_perspectives(),
            perspective_max_tokens: default_perspective_max_tokens(),
            synthesis_max_tokens: default_synthesis_max_tokens(),
            perspective_word_cap: default_perspective_word_cap(),
            perspective_order: default_perspective_order(),
            speed_order: default_speed_order(),
        }
    }
}

fn default_fan_out_ceiling_ms() -> u64 {
    15_000
}
fn default_speed_ceiling_ms() -> u64 {
    8_000
}
fn default_max_perspectives() -> usize {
    3
}
fn default_min_perspectives() -> usize {
    2
}
fn default_perspective_max_tokens() -> u32 {
    600
}
fn default_synthesis_max_tokens() -> u32 {
    1200
}
fn default_perspective_word_cap() -> u32 {
    200
}
fn default_perspective_order() -> Vec<String> {
    PERSPECTIVE_ORDER.iter().map(|s| s.to_string()).collect()
}
fn default_speed_order() -> Vec<String> {
    SPEED_ORDER.iter().map(|s| s.to_string()).collect()
}

/// Field overrides for one provider.
///
/// For a built-in id every field is optional. A new id needs at least
/// `dialect`, `base_url` and `default_model`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderOverride {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub dialect: Option<Dialect>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub chat_path: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub fallback_model: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub credential_key: Option<String>,
    /// Inline key; prefer `${VAR}` expansion over a literal value
    #[serde(default)]
    pub api_key: Option<String>,
    /// Drop this provider from the registry entirely
    #[serde(default)]
    pub disabled: bool,
}

impl std::fmt::Debug for ProviderOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOverride")
            .field("display_name", &self.display_name)
            .field("dialect", &self.dialect)
            .field("base_url", &self.base_url)
            .field("chat_path", &self.chat_path)
            .field("default_model", &self.default_model)
            .field("fallback_model", &self.fallback_model)
            .field("timeout_ms", &self.timeout_ms)
            .field("credential_key", &self.credential_key)
            .field("api_key", &self.api_key.as_deref().map(redact_key))
            .field("disabled", &self.disabled)
            .finish()
    }
}

impl ProviderOverride {
    fn apply(&self, mut provider: ProviderConfig) -> ProviderConfig {
        if let Some(name) = &self.display_name {
            provider.display_name = name.clone();
        }
        if let Some(dialect) = self.dialect {
            if dialect != provider.dialect && self.chat_path.is_none() {
                provider.chat_path = dialect.default_chat_path().to_string();
            }
            provider.dialect = dialect;
        }
        if let Some(url) = &self.base_url {
            provider.base_url = url.clone();
        }
        if let Some(path) = &self.chat_path {
            provider.chat_path = path.clone();
        }
        if let Some(model) = &self.default_model {
            provider.default_model = model.clone();
        }
        if let Some(model) = &self.fallback_model {
            provider.fallback_model = model.clone();
        }
        if let Some(ms) = self.timeout_ms {
            provider.timeout = Duration::from_millis(ms);
        }
        if let Some(key) = &self.credential_key {
            provider.credential_key = key.clone();
        }
        provider
    }
}

/// Show only the last four characters of a key, enough to tell keys apart
fn redact_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 8 {
        return format!("<{} chars>", count);
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("****{}", tail)
}

/// Refuse a config file that group or other can read, since it may hold keys
#[cfg(unix)]
fn ensure_private(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let Ok(metadata) = std::fs::metadata(path) else {
        return Ok(());
    };
    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        bail!(
            "Refusing to load {}: mode {:o} lets other users read provider keys (run chmod 600)",
            path.display(),
            mode
        );
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_private(_path: &Path) -> Result<()> {
    Ok(())
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".concord")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

impl ConcordConfig {
    /// Load from `path`, or `~/.concord/config.toml` when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

        ensure_private(&path)?;

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file means built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let exists = match path {
            Some(p) => p.exists(),
            None => default_config_path().exists(),
        };
        if exists {
            Self::load(path)
        } else {
            debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse TOML text, expanding allowlisted `${VAR}` references first
    pub fn from_toml_str(content: &str) -> Result<Self> {
        warn_hardcoded_keys(content);
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded).context("Invalid config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let budget = &self.budget;
        if budget.overall_ceiling_ms == 0 {
            bail!("budget.overall_ceiling_ms must be greater than zero");
        }
        if !(budget.primary_share > 0.0 && budget.primary_share <= 1.0) {
            bail!(
                "budget.primary_share must be in (0, 1], got {}",
                budget.primary_share
            );
        }

        let multi = &self.multi;
        if multi.min_perspectives == 0 {
            bail!("multi.min_perspectives must be at least 1");
        }
        if multi.max_perspectives < multi.min_perspectives {
            bail!(
                "multi.max_perspectives ({}) is below multi.min_perspectives ({})",
                multi.max_perspectives,
                multi.min_perspectives
            );
        }
        if multi.fan_out_ceiling_ms == 0 || multi.speed_ceiling_ms == 0 {
            bail!("multi ceilings must be greater than zero");
        }
        Ok(())
    }

    pub fn to_executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            overall_ceiling: Duration::from_millis(self.budget.overall_ceiling_ms),
            min_fallback_budget: Duration::from_millis(self.budget.min_fallback_budget_ms),
            primary_share: self.budget.primary_share,
        }
    }

    pub fn to_multi_config(&self) -> MultiConfig {
        let multi = &self.multi;
        MultiConfig {
            perspective_order: multi.perspective_order.clone(),
            speed_order: multi.speed_order.clone(),
            max_perspectives: multi.max_perspectives,
            min_perspectives: multi.min_perspectives,
            fan_out_ceiling: Duration::from_millis(multi.fan_out_ceiling_ms),
            speed_ceiling: Duration::from_millis(multi.speed_ceiling_ms),
            perspective_max_tokens: multi.perspective_max_tokens,
            synthesis_max_tokens: multi.synthesis_max_tokens,
            perspective_word_cap: multi.perspective_word_cap,
        }
    }

    /// Built-in catalog with overrides applied, plus any new providers
    pub fn provider_configs(&self) -> Result<Vec<ProviderConfig>> {
        let mut providers = builtin_providers();

        for (id, over) in &self.providers {
            if let Some(index) = providers.iter().position(|p| p.id == *id) {
                if over.disabled {
                    debug!("Provider {} disabled by config", id);
                    providers.remove(index);
                } else {
                    let current = providers.remove(index);
                    providers.insert(index, over.apply(current));
                }
                continue;
            }
            if over.disabled {
                continue;
            }

            let dialect = over
                .dialect
                .ok_or_else(|| anyhow!("Provider {} is not built in and needs a dialect", id))?;
            let base_url = over
                .base_url
                .clone()
                .ok_or_else(|| anyhow!("Provider {} is not built in and needs a base_url", id))?;
            let default_model = over.default_model.clone().ok_or_else(|| {
                anyhow!("Provider {} is not built in and needs a default_model", id)
            })?;
            providers.push(over.apply(ProviderConfig::new(
                id.clone(),
                dialect,
                base_url,
                default_model,
            )));
        }

        Ok(providers)
    }

    /// Environment snapshot for every provider's key, with inline
    /// `api_key` values layered on top.
    pub fn credentials(&self, providers: &[ProviderConfig]) -> Credentials {
        let mut credentials =
            Credentials::from_env(providers.iter().map(|p| p.credential_key.as_str()));
        for provider in providers {
            let inline = self
                .providers
                .get(&provider.id)
                .and_then(|o| o.api_key.as_deref())
                .filter(|key| !key.contains("${"));
            if let Some(key) = inline {
                credentials = credentials.with(provider.credential_key.clone(), key);
            }
        }
        credentials
    }
}

fn warn_hardcoded_keys(content: &str) {
    let Ok(table) = toml::from_str::<toml::Table>(content) else {
        return;
    };
    let Some(providers) = table.get("providers").and_then(|v| v.as_table()) else {
        return;
    };
    for (id, section) in providers {
        let hardcoded = section
            .get("api_key")
            .and_then(|v| v.as_str())
            .is_some_and(|key| !key.is_empty() && !key.contains("${"));
        if hardcoded {
            warn!(
                "API key for provider {} is hardcoded in config file. For security, use environment variables: api_key = \"${{{}_API_KEY}}\"",
                id,
                id.to_uppercase().replace('-', "_")
            );
        }
    }
}

/// Environment variables that may be expanded in config files.
/// Anything else is left as a literal `${VAR}`.
fn allowed_env_vars() -> impl Iterator<Item = &'static str> {
    builtin_credential_keys().chain(["HOME", "USER"])
}

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !allowed_env_vars().any(|v| v == var_name) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(&var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}
