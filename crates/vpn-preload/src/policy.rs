//! Remoteness classification and host derivation.
//!
//! Both decisions sit behind [`RemotePolicy`] so address-based resolution can
//! replace the configured-host placeholder without touching the dispatcher or
//! the tables.

use libc::{sa_family_t, sockaddr, sockaddr_in, sockaddr_in6, socklen_t};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use vpn_config::RemoteConfig;

/// Destination of a `connect`, decoded from the caller's `sockaddr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Inet(SocketAddr),
    Unix,
    Other(sa_family_t),
    /// Null pointer or a length too short for the family
    Invalid,
}

impl Destination {
    pub unsafe fn from_raw(addr: *const sockaddr, len: socklen_t) -> Self {
        let len = len as usize;
        if addr.is_null() || len < std::mem::size_of::<sa_family_t>() {
            return Destination::Invalid;
        }

        match (*addr).sa_family as libc::c_int {
            libc::AF_INET => {
                if len < std::mem::size_of::<sockaddr_in>() {
                    return Destination::Invalid;
                }
                let sin = &*(addr as *const sockaddr_in);
                let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
                Destination::Inet(SocketAddr::V4(SocketAddrV4::new(
                    ip,
                    u16::from_be(sin.sin_port),
                )))
            }
            libc::AF_INET6 => {
                if len < std::mem::size_of::<sockaddr_in6>() {
                    return Destination::Invalid;
                }
                let sin6 = &*(addr as *const sockaddr_in6);
                let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
                Destination::Inet(SocketAddr::V6(SocketAddrV6::new(
                    ip,
                    u16::from_be(sin6.sin6_port),
                    sin6.sin6_flowinfo,
                    sin6.sin6_scope_id,
                )))
            }
            libc::AF_UNIX => Destination::Unix,
            family => Destination::Other(family as sa_family_t),
        }
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            Destination::Inet(addr) => Some(*addr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    Local,
    Remote,
}

pub trait RemotePolicy: Send + Sync {
    fn classify(&self, dest: &Destination) -> Locality;

    /// Host identifier of the endpoint serving `dest`
    fn derive_host(&self, dest: &Destination) -> Option<String>;
}

/// An IP network written as `addr` or `addr/prefix`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    addr: IpAddr,
    prefix: u8,
}

impl Network {
    pub fn parse(s: &str) -> Option<Self> {
        let (addr, prefix) = match s.split_once('/') {
            Some((a, p)) => (a.trim().parse::<IpAddr>().ok()?, Some(p.trim().parse::<u8>().ok()?)),
            None => (s.trim().parse::<IpAddr>().ok()?, None),
        };
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = prefix.unwrap_or(max);
        if prefix > max {
            return None;
        }
        Some(Self { addr, prefix })
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - self.prefix as u32).unwrap_or(0);
                u32::from(net) & mask == u32::from(*ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - self.prefix as u32).unwrap_or(0);
                u128::from(net) & mask == u128::from(*ip) & mask
            }
            _ => false,
        }
    }
}

/// Routes inet destinations to the one configured host.
///
/// Without a configured host nothing is remote. With `networks` set, only
/// destinations inside one of them are.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredPolicy {
    host: Option<String>,
    networks: Vec<Network>,
}

impl ConfiguredPolicy {
    pub fn new(host: Option<String>, networks: Vec<Network>) -> Self {
        Self { host, networks }
    }

    pub fn from_config(remote: &RemoteConfig) -> Self {
        let networks = remote
            .networks
            .iter()
            .filter_map(|s| {
                let net = Network::parse(s);
                if net.is_none() {
                    vpn_config::log_preload_warn!("ignoring malformed network", pattern = s.as_str());
                }
                net
            })
            .collect();
        Self::new(remote.host.clone(), networks)
    }
}

impl RemotePolicy for ConfiguredPolicy {
    fn classify(&self, dest: &Destination) -> Locality {
        let Destination::Inet(addr) = dest else {
            return Locality::Local;
        };
        if self.host.is_none() {
            return Locality::Local;
        }
        if self.networks.is_empty() || self.networks.iter().any(|n| n.contains(&addr.ip())) {
            Locality::Remote
        } else {
            Locality::Local
        }
    }

    fn derive_host(&self, _dest: &Destination) -> Option<String> {
        self.host.clone()
    }
}
