use crate::pac::{Credentials, EvalBudget};
use crate::resolver::DEFAULT_FETCH_TIMEOUT;
use std::env;
use std::time::Duration;
use tracing::{info, warn};

/// Inputs for building a [`ProxyResolver`](crate::ProxyResolver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub pac_url: Option<String>,
    pub credentials: Credentials,
    pub fetch_timeout: Duration,
    pub budget: EvalBudget,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            pac_url: None,
            credentials: Credentials::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            budget: EvalBudget::default(),
        }
    }
}

impl ResolverConfig {
    /// Reads the process environment:
    /// - `PAC_URL`
    /// - `PROXY_USER` / `PROXY_PASSWORD`, or `PROXY_AUTH=user:password`
    /// - `PAC_FETCH_TIMEOUT_MS`, `PAC_EVAL_TIMEOUT_MS`
    ///
    /// Lower-case names win over upper-case ones.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .or_else(|| lookup(&name.to_uppercase()))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let millis = |name: &str| {
            let raw = var(name)?;
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
                _ => {
                    warn!("ignoring {}={:?}: expected a positive number of milliseconds", name, raw);
                    None
                }
            }
        };

        let mut config = Self::default();
        config.pac_url = var("pac_url");

        if let Some(auth) = var("proxy_auth") {
            match Credentials::from_auth_str(&auth) {
                Some(credentials) => config.credentials = credentials,
                None => warn!("ignoring proxy_auth: expected user:password"),
            }
        }
        if let Some(user) = var("proxy_user") {
            config.credentials.user = user;
        }
        if let Some(password) = var("proxy_password") {
            config.credentials.password = password;
        }

        if let Some(timeout) = millis("pac_fetch_timeout_ms") {
            config.fetch_timeout = timeout;
        }
        if let Some(timeout) = millis("pac_eval_timeout_ms") {
            config.budget.timeout = timeout;
        }

        if let Some(url) = &config.pac_url {
            info!("PAC URL from environment: {}", url);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = ResolverConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ResolverConfig::default());
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_both_cases_preferring_lower() {
        let config = ResolverConfig::from_lookup(lookup(&[
            ("pac_url", "http://wpad/wpad.dat"),
            ("PAC_URL", "http://other/proxy.pac"),
            ("PROXY_USER", "bob"),
            ("PROXY_PASSWORD", "pw"),
        ]));
        assert_eq!(config.pac_url.as_deref(), Some("http://wpad/wpad.dat"));
        assert_eq!(config.credentials, Credentials::new("bob", "pw"));
    }

    #[test]
    fn auth_pair_is_overridden_by_explicit_fields() {
        let config = ResolverConfig::from_lookup(lookup(&[
            ("PROXY_AUTH", "carol:one"),
            ("PROXY_PASSWORD", "two"),
        ]));
        assert_eq!(config.credentials, Credentials::new("carol", "two"));
    }

    #[test]
    fn timeouts_parse_and_bad_values_are_ignored() {
        let config = ResolverConfig::from_lookup(lookup(&[
            ("PAC_FETCH_TIMEOUT_MS", "2500"),
            ("PAC_EVAL_TIMEOUT_MS", "soon"),
        ]));
        assert_eq!(config.fetch_timeout, Duration::from_millis(2500));
        assert_eq!(config.budget.timeout, EvalBudget::default().timeout);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = ResolverConfig::from_lookup(lookup(&[("PAC_URL", "   ")]));
        assert_eq!(config.pac_url, None);
    }
}
