//! The per-request proxy decision point.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::ResolverConfig;
use crate::error::{PacError, Result};
use crate::pac::{
    parse_directives, Credentials, EvalBudget, HostNetwork, HttpFetcher, PolicyScript,
    ProxyDescriptor, RoutingQuery, ScriptFetcher, SystemNetwork,
};

/// Default download timeout for PAC scripts.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Picks the ordered proxy list for each request.
///
/// Starts unconfigured, answering `DIRECT` for everything, and switches to
/// script-driven answers after the first successful configuration. Later
/// configurations replace the script wholesale; a failed one leaves the
/// current script in place.
///
/// All methods take `&self`, so a resolver can be shared behind an `Arc`.
pub struct ProxyResolver {
    script: RwLock<Option<Arc<PolicyScript>>>,
    credentials: RwLock<Credentials>,
    network: Arc<dyn HostNetwork>,
    fetcher: Arc<dyn ScriptFetcher>,
    budget: EvalBudget,
    fetch_timeout: Duration,
}

impl Default for ProxyResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyResolver {
    /// A resolver using the system resolver and HTTP fetching.
    pub fn new() -> Self {
        Self::with_collaborators(Arc::new(SystemNetwork), Arc::new(HttpFetcher))
    }

    pub fn with_collaborators(
        network: Arc<dyn HostNetwork>,
        fetcher: Arc<dyn ScriptFetcher>,
    ) -> Self {
        Self {
            script: RwLock::new(None),
            credentials: RwLock::new(Credentials::default()),
            network,
            fetcher,
            budget: EvalBudget::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Applies to scripts configured after this call.
    pub fn with_budget(mut self, budget: EvalBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Builds a resolver from `config`, fetching its PAC URL if one is set.
    ///
    /// A PAC URL that cannot be loaded is logged and leaves the resolver
    /// unconfigured.
    pub fn from_config(config: &ResolverConfig) -> Self {
        let resolver = Self::new()
            .with_budget(config.budget)
            .with_fetch_timeout(config.fetch_timeout);
        resolver.set_credentials(&config.credentials.user, &config.credentials.password);
        if let Some(pac_url) = &config.pac_url {
            if let Err(e) = resolver.configure_from_url(pac_url) {
                warn!("PAC configuration from {} failed: {}", pac_url, e);
            }
        }
        resolver
    }

    /// Credentials injected into every `PROXY`/`SOCKS` descriptor from now on.
    pub fn set_credentials(&self, user: &str, password: &str) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Credentials::new(user, password);
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_configured(&self) -> bool {
        self.current_script().is_some()
    }

    /// Generation of the live script, if any.
    pub fn generation(&self) -> Option<u64> {
        self.current_script().map(|script| script.generation())
    }

    /// Compiles `body` and makes it the live script, returning its
    /// generation. On error the previous script stays active.
    pub fn configure_from_script(&self, body: &str) -> Result<u64> {
        let compiled = PolicyScript::compile(body, Arc::clone(&self.network), self.budget)
            .inspect_err(|e| warn!("rejecting PAC script: {}", e))?;
        let generation = compiled.generation();

        let previous = self
            .script
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(compiled));

        info!(
            generation,
            replaced = previous.as_ref().map(|old| old.generation()),
            "PAC script configured"
        );
        Ok(generation)
    }

    /// Fetches the script at `url` and configures it.
    ///
    /// An unreachable URL or empty response is a [`PacError::Fetch`] and keeps
    /// the current script.
    pub fn configure_from_url(&self, url: &str) -> Result<u64> {
        let body = self
            .fetcher
            .fetch(url, self.fetch_timeout)
            .inspect_err(|e| warn!("{}", e))?;
        if body.trim().is_empty() {
            warn!("PAC script at {} is empty, keeping current configuration", url);
            return Err(PacError::fetch(url, "empty response body"));
        }
        self.configure_from_script(&body)
    }

    /// Proxies to try for `query`, in order. Never empty.
    pub fn resolve(&self, query: &RoutingQuery) -> Vec<ProxyDescriptor> {
        // Hold the script, not the lock, for the duration of the evaluation.
        let Some(script) = self.current_script() else {
            return vec![ProxyDescriptor::direct()];
        };
        let credentials = self.credentials();
        let raw = script.evaluate(query);
        let proxies = parse_directives(&raw, &credentials);
        debug!(
            generation = script.generation(),
            url = %query.url,
            "resolved {} proxy option(s)",
            proxies.len()
        );
        proxies
    }

    /// [`resolve`](Self::resolve) with the target host taken from `url`.
    ///
    /// A URL without a host resolves to `DIRECT`.
    pub fn resolve_url(&self, url: &str) -> Vec<ProxyDescriptor> {
        match target_host(url) {
            Ok(host) => self.resolve(&RoutingQuery::new(url, host)),
            Err(e) => {
                debug!("{}", e);
                vec![ProxyDescriptor::direct()]
            }
        }
    }

    fn current_script(&self) -> Option<Arc<PolicyScript>> {
        self.script
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn target_host(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| PacError::InvalidUrl(format!("{url}: {e}")))?;
    parsed
        .host_str()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_string())
        .ok_or_else(|| PacError::InvalidUrl(format!("{url}: URL has no host")))
}
