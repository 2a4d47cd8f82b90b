//! CIDR arithmetic for pool utilization.
//!
//! Host enumeration, the gateway reservation rule, and the free/used split
//! that every pool statistic is derived from. All address lists produced here
//! are in numeric order.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use ipnet::{Ipv4AddrRange, Ipv4Net};
use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

/// Parse a configured network, truncating any host bits (`10.0.0.5/24` is
/// read as `10.0.0.0/24`).
pub fn parse_network(cidr: &str) -> Result<Ipv4Net, ReconcileError> {
    cidr.trim()
        .parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|e| ReconcileError::InvalidNetwork {
            cidr: cidr.to_string(),
            reason: e.to_string(),
        })
}

/// Decides which host addresses of a network are withheld as infrastructure
pub trait ReservationPolicy {
    fn reserved(&self, net: &Ipv4Net) -> Vec<Ipv4Addr>;
}

/// The configurable reservation rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPolicy {
    /// First host is the gateway, except on /31 and /32 networks
    #[default]
    FirstHost,
    /// Nothing is reserved
    None,
}

impl ReservationPolicy for GatewayPolicy {
    fn reserved(&self, net: &Ipv4Net) -> Vec<Ipv4Addr> {
        match self {
            GatewayPolicy::FirstHost if net.prefix_len() < 31 => vec![first_host(net)],
            _ => Vec::new(),
        }
    }
}

fn first_host(net: &Ipv4Net) -> Ipv4Addr {
    if net.prefix_len() >= 31 {
        net.network()
    } else {
        Ipv4Addr::from(u32::from(net.network()) + 1)
    }
}

fn last_host(net: &Ipv4Net) -> Ipv4Addr {
    if net.prefix_len() >= 31 {
        net.broadcast()
    } else {
        Ipv4Addr::from(u32::from(net.broadcast()) - 1)
    }
}

/// Number of host addresses, before reservation
pub fn host_count(net: &Ipv4Net) -> u64 {
    let size = 1u64 << (32 - u32::from(net.prefix_len()));
    if net.prefix_len() >= 31 {
        size
    } else {
        size - 2
    }
}

/// Result of splitting a network into free and used addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeUsed {
    /// Free usable addresses, ascending
    pub free: Vec<Ipv4Addr>,
    /// Used addresses that fall inside the usable range, ascending
    pub used: Vec<Ipv4Addr>,
    /// Count of usable addresses
    pub total: usize,
}

impl FreeUsed {
    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

/// Address arithmetic bound to one reservation rule
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressMath<P = GatewayPolicy> {
    policy: P,
}

impl<P: ReservationPolicy> AddressMath<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    /// Every host address, excluding network and broadcast where they exist
    pub fn hosts_in(&self, net: &Ipv4Net) -> Ipv4AddrRange {
        Ipv4AddrRange::new(first_host(net), last_host(net))
    }

    pub fn reserved(&self, net: &Ipv4Net) -> Vec<Ipv4Addr> {
        self.policy.reserved(net)
    }

    /// Host addresses minus the reserved ones
    pub fn usable(&self, net: &Ipv4Net) -> Vec<Ipv4Addr> {
        let reserved = self.reserved(net);
        self.hosts_in(net).filter(|ip| !reserved.contains(ip)).collect()
    }

    pub fn usable_count(&self, net: &Ipv4Net) -> usize {
        let reserved = self
            .reserved(net)
            .into_iter()
            .filter(|ip| self.is_host(net, ip))
            .collect::<BTreeSet<_>>()
            .len() as u64;
        (host_count(net) - reserved) as usize
    }

    pub fn is_usable(&self, net: &Ipv4Net, ip: &Ipv4Addr) -> bool {
        self.is_host(net, ip) && !self.reserved(net).contains(ip)
    }

    /// Number of addresses usable in at least one of `networks`.
    ///
    /// Works on merged host ranges, so wide networks are never enumerated.
    pub fn distinct_usable_count(&self, networks: &[Ipv4Net]) -> usize {
        let mut ranges: Vec<(u32, u32)> = networks
            .iter()
            .map(|net| (u32::from(first_host(net)), u32::from(last_host(net))))
            .collect();
        ranges.sort_unstable();

        let mut hosts: u64 = 0;
        let mut current: Option<(u32, u32)> = None;
        for (start, end) in ranges {
            current = match current {
                Some((s, e)) if u64::from(start) <= u64::from(e) + 1 => Some((s, e.max(end))),
                Some((s, e)) => {
                    hosts += u64::from(e - s) + 1;
                    Some((start, end))
                }
                None => Some((start, end)),
            };
        }
        if let Some((s, e)) = current {
            hosts += u64::from(e - s) + 1;
        }

        // a reserved address still counts when another network offers it
        let withheld = networks
            .iter()
            .flat_map(|net| self.reserved(net))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|ip| networks.iter().any(|net| self.is_host(net, ip)))
            .filter(|ip| !networks.iter().any(|net| self.is_usable(net, ip)))
            .count() as u64;

        (hosts - withheld) as usize
    }

    fn is_host(&self, net: &Ipv4Net, ip: &Ipv4Addr) -> bool {
        *ip >= first_host(net) && *ip <= last_host(net)
    }

    /// Split the usable range of `net` into free and used addresses.
    ///
    /// Addresses in `used_ips` outside the usable range are ignored, so a
    /// union spanning several networks can be passed unfiltered.
    pub fn free_used<'a, I>(&self, net: &Ipv4Net, used_ips: I) -> FreeUsed
    where
        I: IntoIterator<Item = &'a Ipv4Addr>,
    {
        let reserved = self.reserved(net);
        let used: BTreeSet<Ipv4Addr> = used_ips
            .into_iter()
            .filter(|ip| self.is_host(net, ip) && !reserved.contains(ip))
            .copied()
            .collect();

        let free: Vec<Ipv4Addr> = self
            .hosts_in(net)
            .filter(|ip| !reserved.contains(ip) && !used.contains(ip))
            .collect();

        let used: Vec<Ipv4Addr> = used.into_iter().collect();
        FreeUsed {
            total: used.len() + free.len(),
            free,
            used,
        }
    }
}

/// Descriptive facts about a network, as shown on a pool's detail view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub network: Ipv4Net,
    pub netmask: Ipv4Addr,
    pub broadcast: Ipv4Addr,
    pub first_host: Ipv4Addr,
    pub last_host: Ipv4Addr,
    pub total_hosts: u64,
}

pub fn network_info(net: &Ipv4Net) -> NetworkInfo {
    NetworkInfo {
        network: *net,
        netmask: net.netmask(),
        broadcast: net.broadcast(),
        first_host: first_host(net),
        last_host: last_host(net),
        total_hosts: host_count(net),
    }
}

/// Whether two networks share at least one address
pub fn overlaps(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(b) || b.contains(a)
}
