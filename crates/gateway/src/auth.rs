//! Auth filter (§4.2 part 2): bearer-token verification against a symmetric
//! HS256 secret, with a bounded TTL cache of successful verifications.

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use agentd_domain::config::AuthConfig;
use agentd_domain::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub exp: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub user_name: String,
}

pub struct Authenticator {
    secret: Vec<u8>,
    cache: Cache<String, Identity>,
    enabled: bool,
    skip_methods: std::collections::HashSet<String>,
}

impl Authenticator {
    pub fn new(cfg: &AuthConfig, secret: String) -> Self {
        let cache = Cache::builder()
            .max_capacity(cfg.token_cache_capacity)
            .time_to_live(std::time::Duration::from_secs(cfg.token_cache_ttl_secs))
            .build();
        Self {
            secret: secret.into_bytes(),
            cache,
            enabled: cfg.enabled,
            skip_methods: cfg.skip_methods.iter().cloned().collect(),
        }
    }

    pub fn is_exempt(&self, method: &str) -> bool {
        !self.enabled || self.skip_methods.contains(method)
    }

    /// Verify a raw `authorization` metadata value (`"Bearer <token>"`,
    /// case-insensitive scheme). Successful verifications are cached by the
    /// raw token string for the configured TTL.
    pub fn verify(&self, header_value: &str) -> Result<Identity> {
        let token = strip_bearer_prefix(header_value)
            .ok_or_else(|| Error::Unauthenticated("missing bearer token".to_string()))?;

        if let Some(identity) = self.cache.get(token) {
            return Ok(identity);
        }

        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = true;
        let key = jsonwebtoken::DecodingKey::from_secret(&self.secret);

        let claims = jsonwebtoken::decode::<Claims>(token, &key, &validation)
            .map_err(|e| Error::Unauthenticated(e.to_string()))?
            .claims;

        let identity = Identity { user_id: claims.user_id, user_name: claims.user_name };
        self.cache.insert(token.to_string(), identity.clone());
        Ok(identity)
    }
}

fn strip_bearer_prefix(header_value: &str) -> Option<&str> {
    let header_value = header_value.trim();
    if header_value.len() < 7 {
        return None;
    }
    let (scheme, rest) = header_value.split_at(7);
    if scheme.eq_ignore_ascii_case("bearer ") {
        Some(rest.trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn make_token(secret: &str, user_id: &str) -> String {
        let claims = Claims { user_id: user_id.to_string(), user_name: "alice".to_string(), exp: Some(9_999_999_999) };
        encode(&Header::new(jsonwebtoken::Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_is_accepted_and_cached() {
        let cfg = AuthConfig::default();
        let auth = Authenticator::new(&cfg, "topsecret".to_string());
        let token = make_token("topsecret", "u1");
        let header = format!("Bearer {token}");

        let identity = auth.verify(&header).unwrap();
        assert_eq!(identity.user_id, "u1");

        // Second call hits the cache path; still returns the same identity.
        let identity2 = auth.verify(&header).unwrap();
        assert_eq!(identity2.user_id, "u1");
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let cfg = AuthConfig::default();
        let auth = Authenticator::new(&cfg, "topsecret".to_string());
        let token = make_token("topsecret", "u1");
        let header = format!("bearer {token}");
        assert!(auth.verify(&header).is_ok());
    }

    #[test]
    fn missing_token_is_unauthenticated() {
        let cfg = AuthConfig::default();
        let auth = Authenticator::new(&cfg, "topsecret".to_string());
        let err = auth.verify("").unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let cfg = AuthConfig::default();
        let auth = Authenticator::new(&cfg, "topsecret".to_string());
        let token = make_token("wrongsecret", "u1");
        let header = format!("Bearer {token}");
        assert!(auth.verify(&header).is_err());
    }

    #[test]
    fn skip_methods_are_exempt_and_disabling_auth_exempts_everything() {
        let mut cfg = AuthConfig::default();
        cfg.skip_methods = vec!["agentd.agent.v1.AgentService/GetServerInfo".to_string()];
        let auth = Authenticator::new(&cfg, "s".to_string());
        assert!(auth.is_exempt("agentd.agent.v1.AgentService/GetServerInfo"));
        assert!(!auth.is_exempt("agentd.agent.v1.AgentService/Chat"));

        cfg.enabled = false;
        let auth = Authenticator::new(&cfg, "s".to_string());
        assert!(auth.is_exempt("agentd.agent.v1.AgentService/Chat"));
    }
}
