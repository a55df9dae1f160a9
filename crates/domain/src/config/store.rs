use serde::{Deserialize, Serialize};

use super::AuthConfig;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ticket store (PostgREST endpoint)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Project URL, e.g. `https://abc.supabase.co`. `None` disables
    /// every store-backed tool.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "d_store_auth")]
    pub auth: AuthConfig,
    #[serde(default = "d_table")]
    pub table: String,
    #[serde(default = "d_10000u")]
    pub timeout_ms: u64,
    /// Retries for transient (5xx / timeout) failures.
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth: d_store_auth(),
            table: d_table(),
            timeout_ms: 10_000,
            max_retries: 2,
        }
    }
}

fn d_store_auth() -> AuthConfig {
    AuthConfig::from_env("SUPABASE_ANON_KEY")
}
fn d_table() -> String {
    "tickets".into()
}
fn d_10000u() -> u64 {
    10_000
}
fn d_2() -> u32 {
    2
}
