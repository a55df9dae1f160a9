//! Credential resolution and HTTP error mapping shared by every client
//! (completion endpoint, ticket store, GitHub).

use pm_domain::config::AuthConfig;
use pm_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve a secret from an [`AuthConfig`].
///
/// Precedence: plaintext `key` (warns), OS keychain (`service` +
/// `account`), `env`, then the `{SERVICE}_{ACCOUNT}` env var.
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if let Some(key) = &auth.key {
        tracing::warn!("credential loaded from plaintext config field 'key'; prefer 'env' or keychain");
        return Ok(key.clone());
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        match resolve_from_keychain(service, account) {
            Ok(secret) => return Ok(secret),
            Err(e) => tracing::debug!(
                service = %service,
                account = %account,
                error = %e,
                "keychain lookup failed, trying env"
            ),
        }
    }

    if let Some(var) = &auth.env {
        match std::env::var(var) {
            Ok(val) if !val.trim().is_empty() => return Ok(val),
            _ if auth.service.is_none() => {
                return Err(Error::Auth(format!("environment variable '{var}' is not set")));
            }
            _ => {}
        }
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        let fallback = keychain_fallback_env_name(service, account);
        if let Ok(val) = std::env::var(&fallback) {
            tracing::debug!(env_var = %fallback, "credential resolved from keychain fallback env var");
            return Ok(val);
        }
    }

    Err(Error::Auth(
        "no credential configured: set 'key', 'env', or keychain 'service'+'account'".into(),
    ))
}

/// Read a secret from the platform credential store.
pub fn resolve_from_keychain(service: &str, account: &str) -> Result<String> {
    let entry = keyring::Entry::new(service, account)
        .map_err(|e| Error::Auth(format!("keyring entry creation failed: {e}")))?;
    entry
        .get_password()
        .map_err(|e| Error::Auth(format!("keyring lookup failed: {e}")))
}

/// `("pm-agent", "openai-key")` → `"PM_AGENT_OPENAI_KEY"`.
pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!(
        "{}_{}",
        service.to_uppercase().replace('-', "_"),
        account.to_uppercase().replace('-', "_"),
    )
}
