// src/pac/functions.rs
//! Native implementations of the PAC host functions.
//!
//! None of these fail: an unresolvable host or a malformed argument yields
//! `false`, `None` or an empty string, so a script never aborts because of
//! the network.

use super::network::HostNetwork;
use chrono::Weekday;
use ipnet::IpNet;
use regex::Regex;
use std::net::IpAddr;
use tracing::debug;

/// `isPlainHostName(host)`
pub fn is_plain_host_name(host: &str) -> bool {
    !host.contains('.')
}

/// `dnsResolve(host)`: first address of a forward lookup.
pub fn dns_resolve(network: &dyn HostNetwork, host: &str) -> Option<String> {
    first_address(network, host).map(|ip| ip.to_string())
}

/// `isResolvable(host)`
pub fn is_resolvable(network: &dyn HostNetwork, host: &str) -> bool {
    dns_resolve(network, host).is_some()
}

/// `myIpAddress()`: first interface address that is routable from elsewhere.
pub fn my_ip_address(network: &dyn HostNetwork) -> Option<String> {
    let addrs = match network.local_addresses() {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!("local address enumeration failed: {}", e);
            return None;
        }
    };
    addrs
        .into_iter()
        .find(|ip| !ip.is_loopback() && !ip.is_unspecified() && !is_broadcast(ip))
        .map(|ip| ip.to_string())
}

fn is_broadcast(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_broadcast(),
        IpAddr::V6(_) => false,
    }
}

/// `dnsDomainIs(host, domain)`: plain suffix test, no label boundary check.
pub fn dns_domain_is(host: &str, domain: &str) -> bool {
    host.ends_with(domain)
}

/// `localHostOrDomainIs(host, hostdom)`
pub fn local_host_or_domain_is(host: &str, hostdom: &str) -> bool {
    if host == hostdom {
        return true;
    }
    hostdom
        .strip_prefix(host)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// `shExpMatch(str, shexp)`: case-sensitive whole-string glob match.
pub fn sh_exp_match(text: &str, pattern: &str) -> bool {
    match glob_to_regex(pattern) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            debug!("shExpMatch pattern {:?} rejected: {}", pattern, e);
            false
        }
    }
}

fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() * 2 + 8);
    expr.push_str("^(?s:");
    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    expr.push_str(")$");
    Regex::new(&expr)
}

/// `isInNet(host, pattern, mask)`
///
/// `host` is resolved unless it already is an address literal. `mask` is a
/// dotted netmask or a prefix length.
pub fn is_in_net(network: &dyn HostNetwork, host: &str, pattern: &str, mask: &str) -> bool {
    let Some(addr) = first_address(network, host) else {
        return false;
    };
    match parse_subnet(pattern, mask) {
        Some(net) => net.contains(&addr),
        None => {
            debug!("isInNet: invalid subnet {}/{}", pattern, mask);
            false
        }
    }
}

fn parse_subnet(pattern: &str, mask: &str) -> Option<IpNet> {
    let base: IpAddr = pattern.trim().parse().ok()?;
    let mask = mask.trim();
    let prefix = match mask.parse::<IpAddr>() {
        Ok(IpAddr::V4(m)) if base.is_ipv4() => ipnet::ipv4_mask_to_prefix(m).ok()?,
        Ok(IpAddr::V6(m)) if base.is_ipv6() => ipnet::ipv6_mask_to_prefix(m).ok()?,
        Ok(_) => return None,
        Err(_) => mask.parse::<u8>().ok()?,
    };
    IpNet::new(base, prefix).ok()
}

fn first_address(network: &dyn HostNetwork, host: &str) -> Option<IpAddr> {
    if host.is_empty() {
        return None;
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    match network.lookup_host(host) {
        Ok(addrs) => addrs.into_iter().next(),
        Err(e) => {
            debug!("lookup of {} failed: {}", host, e);
            None
        }
    }
}

/// `dnsDomainLevels(host)`
pub fn dns_domain_levels(host: &str) -> usize {
    host.matches('.').count()
}

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

fn weekday_index(wd: Weekday) -> usize {
    wd.num_days_from_sunday() as usize
}

/// Strips a trailing `"GMT"` argument, reporting whether it was present.
fn split_gmt(args: &[String]) -> (&[String], bool) {
    match args.split_last() {
        Some((last, rest)) if last.eq_ignore_ascii_case("GMT") => (rest, true),
        _ => (args, false),
    }
}

/// `weekdayRange(wd1[, wd2][, "GMT"])`, inclusive and wrapping past Saturday.
pub fn weekday_range(args: &[String], local: Weekday, utc: Weekday) -> bool {
    let (days, gmt) = split_gmt(args);
    let today = weekday_index(if gmt { utc } else { local });
    let position = |name: &String| {
        WEEKDAYS
            .iter()
            .position(|d| d.eq_ignore_ascii_case(name.trim()))
    };
    match days {
        [one] => position(one) == Some(today),
        [first, last] => match (position(first), position(last)) {
            (Some(start), Some(end)) => in_wrapping_range(today, start, end, true),
            _ => false,
        },
        _ => false,
    }
}

/// `timeRange(h1[, h2][, "GMT"])`. Only the hour forms are supported; the
/// end hour is exclusive.
pub fn time_range(args: &[String], local_hour: u32, utc_hour: u32) -> bool {
    let (hours, gmt) = split_gmt(args);
    let now = (if gmt { utc_hour } else { local_hour }) as usize;
    let hour = |s: &String| s.trim().parse::<usize>().ok().filter(|h| *h <= 23);
    match hours {
        [one] => hour(one) == Some(now),
        [first, last] => match (hour(first), hour(last)) {
            (Some(start), Some(end)) if start == end => now == start,
            (Some(start), Some(end)) => in_wrapping_range(now, start, end, false),
            _ => false,
        },
        _ => false,
    }
}

fn in_wrapping_range(value: usize, start: usize, end: usize, inclusive_end: bool) -> bool {
    let before_end = if inclusive_end { value <= end } else { value < end };
    if start <= end {
        value >= start && before_end
    } else {
        value >= start || before_end
    }
}
