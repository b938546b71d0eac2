//! Provider configuration for the generative-text gateway.
//!
//! All configuration is loaded from environment variables. The gateway needs
//! to know which provider to call (with its URL, API key, and model), how
//! long to wait, and how many attempts to make before falling back.

use std::time::Duration;

use crate::error::GatewayError;

/// Environment prefix for the primary provider.
pub const PRIMARY_PREFIX: &str = "CHRONICLE_LLM";

/// Environment prefix for the optional fallback provider.
pub const FALLBACK_PREFIX: &str = "CHRONICLE_LLM_FALLBACK";

/// Complete gateway configuration: a primary provider plus fallbacks tried
/// in order.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Provider tried first.
    pub primary: ProviderConfig,
    /// Providers tried, in order, when the primary fails.
    pub fallbacks: Vec<ProviderConfig>,
}

/// Configuration for a single provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Which API family and defaults to use.
    pub kind: ProviderKind,
    /// Base API URL without a trailing slash (e.g. `https://openrouter.ai/api/v1`).
    pub base_url: String,
    /// API key, when the provider needs one.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Total attempts against this provider before moving on (at least 1).
    pub max_retries: u32,
}

/// Supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// `OpenRouter` (OpenAI-compatible).
    OpenRouter,
    /// `OpenAI` or any other hosted OpenAI-compatible API.
    OpenAi,
    /// LM Studio local server (OpenAI-compatible, no key).
    LmStudio,
    /// Ollama local server (OpenAI-compatible, no key).
    Ollama,
    /// Anthropic Messages API.
    Anthropic,
}

impl ProviderKind {
    /// Parse a provider name as written in `CHRONICLE_LLM_PROVIDER`.
    pub fn parse(name: &str) -> Result<Self, GatewayError> {
        match name.trim().to_lowercase().as_str() {
            "openrouter" => Ok(Self::OpenRouter),
            "openai" | "openai-compatible" | "deepseek" => Ok(Self::OpenAi),
            "lmstudio" | "lm_studio" => Ok(Self::LmStudio),
            "ollama" | "lm_proxy" => Ok(Self::Ollama),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(GatewayError::Config(format!("unknown provider: {other}"))),
        }
    }

    /// Label used in logs and replies.
    pub const fn label(self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::OpenAi => "openai",
            Self::LmStudio => "lmstudio",
            Self::Ollama => "ollama",
            Self::Anthropic => "anthropic",
        }
    }

    /// Base URL used when none is configured.
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::LmStudio => "http://localhost:1234/v1",
            Self::Ollama => "http://localhost:11434/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Model used when none is configured.
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter/gpt-4.1-mini",
            Self::OpenAi => "gpt-4.1-mini",
            Self::LmStudio | Self::Ollama => "local-model",
            Self::Anthropic => "claude-haiku-4-5",
        }
    }

    /// Whether the provider speaks the OpenAI chat completions protocol.
    pub const fn is_openai_compatible(self) -> bool {
        !matches!(self, Self::Anthropic)
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when the gateway is disabled: either
    /// `CHRONICLE_LLM_ENABLED=false`, or neither an API key nor a base URL
    /// is set for the primary provider.
    ///
    /// Variables (primary uses `CHRONICLE_LLM_`, fallback
    /// `CHRONICLE_LLM_FALLBACK_`):
    /// - `*_PROVIDER` -- provider name (primary default `openrouter`)
    /// - `*_MODEL` -- model identifier (provider default when unset)
    /// - `*_BASE_URL` -- API base URL (provider default when unset)
    /// - `*_API_KEY` -- API key
    /// - `*_TIMEOUT` -- request timeout in seconds (default 30)
    /// - `*_MAX_RETRIES` -- attempts per provider (default 3)
    pub fn from_env() -> Result<Option<Self>, GatewayError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, GatewayError> {
        if let Some(enabled) = lookup("CHRONICLE_LLM_ENABLED") {
            let enabled: bool = enabled.trim().parse().map_err(|e| {
                GatewayError::Config(format!("invalid CHRONICLE_LLM_ENABLED: {e}"))
            })?;
            if !enabled {
                return Ok(None);
            }
        }

        let Some(primary) = load_provider(PRIMARY_PREFIX, Some("openrouter"), &lookup)? else {
            return Ok(None);
        };
        let fallbacks = load_provider(FALLBACK_PREFIX, None, &lookup)?
            .into_iter()
            .collect();

        Ok(Some(Self { primary, fallbacks }))
    }

    /// Every provider in the order they are tried.
    pub fn providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        core::iter::once(&self.primary).chain(self.fallbacks.iter())
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Load one provider from a set of prefixed variables.
///
/// Returns `Ok(None)` when the provider is not configured: no provider name
/// and no default, or neither a key nor a base URL.
fn load_provider(
    prefix: &str,
    default_provider: Option<&str>,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<ProviderConfig>, GatewayError> {
    let Some(name) = non_empty(lookup, &format!("{prefix}_PROVIDER"))
        .or_else(|| default_provider.map(ToOwned::to_owned))
    else {
        return Ok(None);
    };
    let kind = ProviderKind::parse(&name)?;

    let api_key = non_empty(lookup, &format!("{prefix}_API_KEY"));
    let explicit_url = non_empty(lookup, &format!("{prefix}_BASE_URL"));
    if api_key.is_none() && explicit_url.is_none() {
        return Ok(None);
    }

    let base_url = explicit_url
        .unwrap_or_else(|| kind.default_base_url().to_owned())
        .trim_end_matches('/')
        .to_owned();
    let model = non_empty(lookup, &format!("{prefix}_MODEL"))
        .unwrap_or_else(|| kind.default_model().to_owned());

    let timeout_var = format!("{prefix}_TIMEOUT");
    let timeout_secs: u64 = non_empty(lookup, &timeout_var)
        .unwrap_or_else(|| "30".to_owned())
        .parse()
        .map_err(|e| GatewayError::Config(format!("invalid {timeout_var}: {e}")))?;

    let retries_var = format!("{prefix}_MAX_RETRIES");
    let max_retries: u32 = non_empty(lookup, &retries_var)
        .unwrap_or_else(|| "3".to_owned())
        .parse()
        .map_err(|e| GatewayError::Config(format!("invalid {retries_var}: {e}")))?;

    Ok(Some(ProviderConfig {
        kind,
        base_url,
        api_key,
        model,
        timeout: Duration::from_secs(timeout_secs),
        max_retries: max_retries.max(1),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn disabled_without_key_or_url() {
        let config = GatewayConfig::from_lookup(lookup_from(&[])).ok().flatten();
        assert!(config.is_none());
    }

    #[test]
    fn disabled_by_flag() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("CHRONICLE_LLM_API_KEY", "sk-test"),
            ("CHRONICLE_LLM_ENABLED", "false"),
        ]))
        .ok()
        .flatten();
        assert!(config.is_none());
    }

    #[test]
    fn primary_defaults_to_openrouter() {
        let config =
            GatewayConfig::from_lookup(lookup_from(&[("CHRONICLE_LLM_API_KEY", "sk-test")]))
                .unwrap()
                .unwrap();
        assert_eq!(config.primary.kind, ProviderKind::OpenRouter);
        assert_eq!(config.primary.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.primary.timeout, Duration::from_secs(30));
        assert_eq!(config.primary.max_retries, 3);
        assert!(config.fallbacks.is_empty());
    }

    #[test]
    fn local_provider_with_base_url_and_fallback() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("CHRONICLE_LLM_PROVIDER", "lmstudio"),
            ("CHRONICLE_LLM_BASE_URL", "http://localhost:1234/v1/"),
            ("CHRONICLE_LLM_MAX_RETRIES", "0"),
            ("CHRONICLE_LLM_FALLBACK_PROVIDER", "anthropic"),
            ("CHRONICLE_LLM_FALLBACK_API_KEY", "ak-test"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(config.primary.kind, ProviderKind::LmStudio);
        assert_eq!(config.primary.base_url, "http://localhost:1234/v1");
        assert!(config.primary.api_key.is_none());
        assert_eq!(config.primary.max_retries, 1);

        let names: Vec<&str> = config.providers().map(|p| p.kind.label()).collect();
        assert_eq!(names, vec!["lmstudio", "anthropic"]);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let result = GatewayConfig::from_lookup(lookup_from(&[
            ("CHRONICLE_LLM_API_KEY", "sk-test"),
            ("CHRONICLE_LLM_TIMEOUT", "soon"),
        ]));
        assert!(matches!(result, Err(GatewayError::Config(_))));

        let result = GatewayConfig::from_lookup(lookup_from(&[
            ("CHRONICLE_LLM_PROVIDER", "mystery"),
            ("CHRONICLE_LLM_API_KEY", "sk-test"),
        ]));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }
}
