//! Effective usage per pool.
//!
//! A pool outside every overlap group counts only its own allocations. A pool
//! inside a group counts every allocation made in any member pool of the
//! group, limited to its own network, so a shared subnet shows every cloud's
//! claim on it.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use crate::ip::grouping::{GroupId, OverlapGroups};
use crate::ip::math::{AddressMath, FreeUsed, ReservationPolicy};
use crate::ip::registry::{PoolIndex, PoolRegistry};

use super::types::{sort_allocations, AddressAllocation};

/// Usage of one pool
#[derive(Debug, Clone)]
pub struct PoolUsage {
    pub index: PoolIndex,
    pub usage: FreeUsed,
    /// Allocations recorded against this exact cloud/pool, sorted
    pub own: Vec<AddressAllocation>,
}

/// Distinct usage across all networks of one overlap group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupUsage {
    pub id: GroupId,
    pub total: usize,
    pub used: usize,
}

impl GroupUsage {
    pub fn free(&self) -> usize {
        self.total - self.used
    }
}

#[derive(Debug, Clone, Default)]
pub struct UsageAggregate {
    /// Indexed by [`PoolIndex`]
    pub pools: Vec<PoolUsage>,
    /// Indexed by [`GroupId`]
    pub groups: Vec<GroupUsage>,
    /// Allocations that matched no configured pool
    pub untracked: usize,
}

pub struct UsageAggregator<'a, P> {
    math: &'a AddressMath<P>,
    registry: &'a PoolRegistry,
    groups: &'a OverlapGroups,
}

impl<'a, P: ReservationPolicy> UsageAggregator<'a, P> {
    pub fn new(
        math: &'a AddressMath<P>,
        registry: &'a PoolRegistry,
        groups: &'a OverlapGroups,
    ) -> Self {
        Self {
            math,
            registry,
            groups,
        }
    }

    pub fn aggregate<'r, I>(&self, allocations: I) -> UsageAggregate
    where
        I: IntoIterator<Item = &'r AddressAllocation>,
    {
        let mut own: Vec<Vec<AddressAllocation>> = vec![Vec::new(); self.registry.len()];
        let mut untracked = 0;
        for allocation in allocations {
            match self.registry.position(&allocation.cloud, &allocation.pool) {
                Some(index) => own[index].push(allocation.clone()),
                None => {
                    untracked += 1;
                    log::debug!(
                        "Allocation {} in {}/{} matches no configured pool",
                        allocation.ip,
                        allocation.cloud,
                        allocation.pool
                    );
                }
            }
        }

        // Union of member allocations per group, limited to the group's networks
        let unions: Vec<BTreeSet<Ipv4Addr>> = self
            .groups
            .groups()
            .iter()
            .map(|group| {
                group
                    .members
                    .iter()
                    .flat_map(|member| own[*member].iter())
                    .map(|a| a.ip)
                    .filter(|ip| group.covers(ip))
                    .collect()
            })
            .collect();

        let pools: Vec<PoolUsage> = own
            .into_iter()
            .enumerate()
            .map(|(index, mut records)| {
                let pool = self.registry.pool(index);
                let usage = match self.groups.group_of(index) {
                    Some(group) => self.math.free_used(&pool.cidr, &unions[group.id]),
                    None => self.math.free_used(&pool.cidr, records.iter().map(|a| &a.ip)),
                };
                sort_allocations(&mut records);
                PoolUsage {
                    index,
                    usage,
                    own: records,
                }
            })
            .collect();

        let groups = self
            .groups
            .groups()
            .iter()
            .map(|group| {
                let used = unions[group.id]
                    .iter()
                    .filter(|&ip| group.networks.iter().any(|net| self.math.is_usable(net, ip)))
                    .count();
                GroupUsage {
                    id: group.id,
                    total: self.math.distinct_usable_count(&group.networks),
                    used,
                }
            })
            .collect();

        if untracked > 0 {
            log::info!("{} allocations fall outside every configured pool", untracked);
        }

        UsageAggregate {
            pools,
            groups,
            untracked,
        }
    }
}
