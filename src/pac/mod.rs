// src/pac/mod.rs
//! PAC script evaluation: host functions, the script host, and the parser
//! for its `DIRECT; PROXY host:port; SOCKS host:port` results.

pub mod directive;
pub mod downloader;
pub mod engine;
pub mod functions;
pub mod network;

pub use directive::{parse_directives, Credentials, ProxyDescriptor, ProxyKind, DEFAULT_PROXY_PORT};
pub use downloader::{HttpFetcher, ScriptFetcher};
pub use engine::{EvalBudget, PolicyScript, RoutingQuery};
pub use network::{HostNetwork, StaticNetwork, SystemNetwork};
