use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Completion endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (the `/chat/completions` suffix is appended).
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_llm_auth")]
    pub auth: AuthConfig,
    #[serde(default = "d_60000u")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            model: d_model(),
            auth: d_llm_auth(),
            timeout_ms: 60_000,
            temperature: None,
        }
    }
}

/// How to obtain a credential. Resolution order: `key`, keychain
/// (`service` + `account`), `env`, then `{SERVICE}_{ACCOUNT}` env var.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Header name (e.g. "Authorization", "apikey").
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix (e.g. "Bearer ").
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env or keychain).
    #[serde(default)]
    pub key: Option<String>,
    /// Keychain service name (e.g., "pm-agent").
    #[serde(default)]
    pub service: Option<String>,
    /// Keychain account name (e.g., "openai-api-key").
    #[serde(default)]
    pub account: Option<String>,
}

impl AuthConfig {
    pub fn from_env(var: &str) -> Self {
        Self {
            env: Some(var.into()),
            ..Self::default()
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_model() -> String {
    "gpt-4o".into()
}
fn d_llm_auth() -> AuthConfig {
    AuthConfig::from_env("OPENAI_API_KEY")
}
fn d_60000u() -> u64 {
    60_000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reads_openai_key_from_env() {
        let cfg = LlmConfig::default();
        assert_eq!(cfg.auth.env.as_deref(), Some("OPENAI_API_KEY"));
        assert_eq!(cfg.model, "gpt-4o");
    }

    #[test]
    fn auth_keychain_fields_parse() {
        let toml_str = r#"
            model = "gpt-4o-mini"
            [auth]
            service = "pm-agent"
            account = "openai"
        "#;
        let cfg: LlmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.auth.service.as_deref(), Some("pm-agent"));
        assert!(cfg.auth.env.is_none());
    }
}
