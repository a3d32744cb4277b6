// src/pac/network.rs
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};

/// Name resolution and interface enumeration used by the PAC host functions.
///
/// Implementations must be callable from any thread; each evaluation runs
/// on its own worker thread.
pub trait HostNetwork: Send + Sync {
    /// Forward lookup. An empty list is treated the same as an error.
    fn lookup_host(&self, host: &str) -> io::Result<Vec<IpAddr>>;

    /// Every address bound to a local interface, in enumeration order.
    fn local_addresses(&self) -> io::Result<Vec<IpAddr>>;
}

/// The operating system resolver and interface table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNetwork;

impl HostNetwork for SystemNetwork {
    fn lookup_host(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        if host.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty host name"));
        }
        let addrs = (host, 0).to_socket_addrs()?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }

    fn local_addresses(&self) -> io::Result<Vec<IpAddr>> {
        let interfaces = if_addrs::get_if_addrs()?;
        Ok(interfaces.iter().map(|iface| iface.ip()).collect())
    }
}

/// Fixed host table, for offline evaluation and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticNetwork {
    hosts: HashMap<String, Vec<IpAddr>>,
    local: Vec<IpAddr>,
}

impl StaticNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, addrs: &[IpAddr]) -> Self {
        self.hosts.insert(host.to_string(), addrs.to_vec());
        self
    }

    pub fn with_local_addresses(mut self, addrs: &[IpAddr]) -> Self {
        self.local = addrs.to_vec();
        self
    }
}

impl HostNetwork for StaticNetwork {
    fn lookup_host(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        self.hosts
            .get(host)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown host {host}")))
    }

    fn local_addresses(&self) -> io::Result<Vec<IpAddr>> {
        Ok(self.local.clone())
    }
}
