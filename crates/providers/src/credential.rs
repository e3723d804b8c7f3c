//! LLM provider credential resolution (ambient stack — not spec-bearing
//! itself, but every `LlmOracle` adapter needs an API key from somewhere).
//!
//! Precedence: plaintext `key` > OS keychain (`service`+`account`) > env var
//! > keychain headless fallback (`{SERVICE}_{ACCOUNT}` uppercased) > error.

pub use agentd_domain::config::ProviderAuthConfig;
use agentd_domain::error::{Error, Result};

pub fn resolve_api_key(auth: &ProviderAuthConfig) -> Result<String> {
    if let Some(key) = &auth.key {
        tracing::warn!("API key loaded from plaintext config field 'key' — prefer 'env' or keychain mode instead");
        return Ok(key.clone());
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        match resolve_from_keychain(service, account) {
            Ok(secret) => return Ok(secret),
            Err(e) => {
                tracing::warn!(service = %service, account = %account, error = %e, "keychain lookup failed, falling through to env");
            }
        }
    }

    if let Some(env_var) = &auth.env {
        return std::env::var(env_var)
            .map_err(|_| Error::Config(format!("environment variable '{env_var}' not set or not valid UTF-8")));
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        let fallback_var = keychain_fallback_env_name(service, account);
        if let Ok(val) = std::env::var(&fallback_var) {
            tracing::info!(env_var = %fallback_var, "API key resolved from keychain headless fallback env var");
            return Ok(val);
        }
    }

    Err(Error::Config(
        "no API key configured: set 'key', 'env', or keychain 'service'+'account'".into(),
    ))
}

pub fn resolve_from_keychain(service: &str, account: &str) -> Result<String> {
    let entry = keyring::Entry::new(service, account)
        .map_err(|e| Error::Config(format!("keyring entry creation failed: {e}")))?;
    entry
        .get_password()
        .map_err(|e| Error::Config(format!("keyring get_password failed: {e}")))
}

pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!(
        "{}_{}",
        service.to_uppercase().replace('-', "_"),
        account.to_uppercase().replace('-', "_"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_env_name_basic() {
        assert_eq!(keychain_fallback_env_name("agentd", "venice-api-key"), "AGENTD_VENICE_API_KEY");
    }

    #[test]
    fn resolve_api_key_plaintext() {
        let auth = ProviderAuthConfig { key: Some("sk-test-123".into()), ..Default::default() };
        assert_eq!(resolve_api_key(&auth).unwrap(), "sk-test-123");
    }

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "AGENTD_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let auth = ProviderAuthConfig { env: Some(var_name.into()), ..Default::default() };
        assert_eq!(resolve_api_key(&auth).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_env_var_missing() {
        let auth = ProviderAuthConfig { env: Some("AGENTD_TEST_NONEXISTENT_VAR_8888".into()), ..Default::default() };
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(err.to_string().contains("AGENTD_TEST_NONEXISTENT_VAR_8888"));
    }

    #[test]
    fn resolve_api_key_no_config() {
        let err = resolve_api_key(&ProviderAuthConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }

    #[test]
    fn resolve_api_key_plaintext_takes_precedence_over_env() {
        let auth = ProviderAuthConfig {
            key: Some("plaintext-wins".into()),
            env: Some("AGENTD_TEST_SHOULD_NOT_BE_READ".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "plaintext-wins");
    }

    #[test]
    fn resolve_api_key_keychain_fallback_env() {
        let fallback_var = "AGENTD_MY_PROVIDER";
        std::env::set_var(fallback_var, "fallback-secret");
        let auth = ProviderAuthConfig {
            service: Some("agentd".into()),
            account: Some("my-provider".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "fallback-secret");
        std::env::remove_var(fallback_var);
    }
}
