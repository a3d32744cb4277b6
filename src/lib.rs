// src/lib.rs
//! Proxy auto-config (PAC) evaluation.
//!
//! A [`ProxyResolver`] holds at most one PAC script. For each request it runs
//! `FindProxyForURL(url, host)` with the standard PAC host functions bound
//! (`isInNet`, `dnsResolve`, `shExpMatch`, ...) and turns the result into an
//! ordered list of [`ProxyDescriptor`]s for the network layer to try.
//!
//! ```no_run
//! use pacproxy::{ProxyResolver, RoutingQuery};
//!
//! let resolver = ProxyResolver::new();
//! resolver.configure_from_url("http://wpad.corp/wpad.dat")?;
//! resolver.set_credentials("alice", "s3cret");
//! for proxy in resolver.resolve(&RoutingQuery::new("https://example.com/", "example.com")) {
//!     println!("{proxy}");
//! }
//! # Ok::<(), pacproxy::PacError>(())
//! ```
pub mod config;
pub mod error;
pub mod log;
pub mod pac;
pub mod resolver;

pub use config::ResolverConfig;
pub use error::{PacError, Result};
pub use pac::{Credentials, EvalBudget, ProxyDescriptor, ProxyKind, RoutingQuery};
pub use resolver::ProxyResolver;

/// Resolves `url` once using settings from the environment.
///
/// Order of precedence:
///
/// 1. The PAC script named by `PAC_URL`, if it loads
/// 2. DIRECT (no proxy)
///
/// Builds and discards a resolver, so the script is fetched on every call.
/// Keep a [`ProxyResolver`] around for repeated lookups.
pub fn find_proxy_for_url(url: &str) -> Vec<ProxyDescriptor> {
    ProxyResolver::from_config(&ResolverConfig::from_env()).resolve_url(url)
}
