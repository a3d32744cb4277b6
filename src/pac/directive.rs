// src/pac/directive.rs
//! Turns the string returned by `FindProxyForURL` into proxy descriptors.

use std::fmt;
use tracing::debug;

/// Port used when a directive names a host without one.
pub const DEFAULT_PROXY_PORT: u16 = 8080;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Direct,
    Http,
    Socks,
}

/// Proxy account applied to every `PROXY`/`SOCKS` directive.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Parses `user:password`, splitting at the last colon.
    ///
    /// Returns `None` when there is no colon or the user part would be empty.
    pub fn from_auth_str(value: &str) -> Option<Self> {
        let idx = value.rfind(':').filter(|idx| *idx > 0)?;
        let user = value[..idx].trim();
        let password = value[idx + 1..].trim();
        Some(Self::new(user, password))
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .finish()
    }
}

/// One routable option, in the order the script listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDescriptor {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl ProxyDescriptor {
    pub fn direct() -> Self {
        Self {
            kind: ProxyKind::Direct,
            host: String::new(),
            port: 0,
            user: String::new(),
            password: String::new(),
        }
    }

    pub fn proxy(kind: ProxyKind, host: &str, port: u16, credentials: &Credentials) -> Self {
        Self {
            kind,
            host: host.to_string(),
            port,
            user: credentials.user.clone(),
            password: credentials.password.clone(),
        }
    }

    pub fn is_direct(&self) -> bool {
        self.kind == ProxyKind::Direct
    }

    /// `http://host:port` or `socks5://host:port`; `None` for `DIRECT`.
    pub fn proxy_url(&self) -> Option<String> {
        let scheme = match self.kind {
            ProxyKind::Direct => return None,
            ProxyKind::Http => "http",
            ProxyKind::Socks => "socks5",
        };
        Some(format!("{}://{}:{}", scheme, self.host, self.port))
    }
}

impl fmt::Display for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ProxyKind::Direct => f.write_str("DIRECT"),
            ProxyKind::Http => write!(f, "PROXY {}:{}", self.host, self.port),
            ProxyKind::Socks => write!(f, "SOCKS {}:{}", self.host, self.port),
        }
    }
}

/// Parses a PAC result such as `"PROXY a:3128; SOCKS b; DIRECT"`.
///
/// Unknown or malformed directives are skipped. The result is never empty:
/// if nothing usable remains, it is a single `DIRECT`.
pub fn parse_directives(raw: &str, credentials: &Credentials) -> Vec<ProxyDescriptor> {
    let mut proxies: Vec<ProxyDescriptor> = raw
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| parse_directive(part, credentials))
        .collect();

    if proxies.is_empty() {
        debug!("PAC result {:?} had no usable directive, using DIRECT", raw);
        proxies.push(ProxyDescriptor::direct());
    }
    proxies
}

fn parse_directive(part: &str, credentials: &Credentials) -> Option<ProxyDescriptor> {
    if part == "DIRECT" {
        return Some(ProxyDescriptor::direct());
    }
    let (kind, target) = if let Some(rest) = part.strip_prefix("PROXY ") {
        (ProxyKind::Http, rest)
    } else if let Some(rest) = part.strip_prefix("SOCKS ") {
        (ProxyKind::Socks, rest)
    } else {
        debug!("ignoring unrecognized PAC directive {:?}", part);
        return None;
    };

    match split_host_port(target.trim()) {
        Some((host, port)) => Some(ProxyDescriptor::proxy(kind, host, port, credentials)),
        None => {
            debug!("dropping malformed PAC directive {:?}", part);
            None
        }
    }
}

/// Splits at the first colon. A missing port means [`DEFAULT_PROXY_PORT`];
/// an unparseable or zero port rejects the target.
fn split_host_port(target: &str) -> Option<(&str, u16)> {
    let (host, port) = match target.split_once(':') {
        None => (target, DEFAULT_PROXY_PORT),
        Some((host, port)) => (host.trim(), port.trim().parse::<u16>().unwrap_or(0)),
    };
    if host.is_empty() || port == 0 {
        return None;
    }
    Some((host, port))
}
