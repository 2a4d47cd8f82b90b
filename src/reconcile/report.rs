//! Pool, cloud and global rollups.
//!
//! Cloud totals are plain sums over the cloud's pools. The global total counts
//! every overlap group once: the first member met in cloud order contributes
//! the group's distinct totals and the other members are skipped.

use std::collections::BTreeSet;

use crate::collector::Collection;
use crate::error::ReportWarning;
use crate::ip::grouping::OverlapGroups;
use crate::ip::math::network_info;
use crate::ip::registry::PoolRegistry;

use super::types::{
    sort_allocations, usage_pct, AddressAllocation, CloudReport, ConflictKind, ConflictMap,
    DuplicateSummary, GroupReport, PoolReport, UtilizationReport,
};
use super::usage::{PoolUsage, UsageAggregate};

pub struct ReportBuilder<'a> {
    registry: &'a PoolRegistry,
    groups: &'a OverlapGroups,
    free_sample_limit: usize,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(registry: &'a PoolRegistry, groups: &'a OverlapGroups, free_sample_limit: usize) -> Self {
        Self {
            registry,
            groups,
            free_sample_limit,
        }
    }

    pub fn build(
        &self,
        collection: &Collection,
        usage: &UsageAggregate,
        conflicts: ConflictMap,
    ) -> UtilizationReport {
        let mut counted = vec![false; self.groups.groups().len()];
        let (mut total, mut used, mut free) = (0, 0, 0);
        let mut clouds = Vec::with_capacity(self.registry.clouds().len());

        for cloud in self.registry.clouds() {
            let mut pools = Vec::new();
            for (index, _) in self.registry.pools_for(cloud) {
                let pool_usage = &usage.pools[index];

                match self.groups.group_of(index) {
                    Some(group) if !counted[group.id] => {
                        let group_usage = &usage.groups[group.id];
                        total += group_usage.total;
                        used += group_usage.used;
                        free += group_usage.free();
                        counted[group.id] = true;
                    }
                    Some(_) => {}
                    None => {
                        total += pool_usage.usage.total;
                        used += pool_usage.usage.used_count();
                        free += pool_usage.usage.free_count();
                    }
                }

                pools.push(self.pool_report(pool_usage, &conflicts));
            }
            clouds.push(cloud_report(cloud, collection, pools));
        }

        let mut allocations: Vec<AddressAllocation> = collection.allocations().cloned().collect();
        sort_allocations(&mut allocations);
        let duplicate_summary = DuplicateSummary {
            total_unique_ips: allocations
                .iter()
                .map(|a| a.ip)
                .collect::<BTreeSet<_>>()
                .len(),
            conflicting_ips: conflicts.len(),
        };

        let mut warnings: Vec<ReportWarning> = self.registry.warnings().to_vec();
        warnings.extend(collection.warnings());
        warnings.sort();

        log::info!(
            "Report: {} clouds, {} usable addresses, {} used, {} conflicting addresses, {} warnings",
            clouds.len(),
            total,
            used,
            conflicts.len(),
            warnings.len()
        );

        UtilizationReport {
            total_clouds: clouds.len(),
            total,
            used,
            free,
            usage_pct: usage_pct(used, total),
            clouds,
            groups: self.group_reports(usage),
            conflicts,
            duplicate_summary,
            allocations,
            warnings,
        }
    }

    fn pool_report(&self, pool_usage: &PoolUsage, conflicts: &ConflictMap) -> PoolReport {
        let pool = self.registry.pool(pool_usage.index);
        let group = self.groups.group_of(pool_usage.index);
        let usage = &pool_usage.usage;

        let overlapping_clouds: Vec<String> = group
            .map(|g| {
                g.members
                    .iter()
                    .map(|i| self.registry.pool(*i).cloud.clone())
                    .filter(|c| *c != pool.cloud)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default();

        // Only pools holding one of the colliding records are involved; `own`
        // is sorted by address
        let pool_conflicts: Vec<_> = conflicts
            .range(pool.cidr.network()..=pool.cidr.broadcast())
            .filter(|&(ip, _)| pool_usage.own.binary_search_by(|a| a.ip.cmp(ip)).is_ok())
            .flat_map(|(_, list)| list.iter())
            .filter(|c| match c.kind {
                ConflictKind::DuplicateInCloud => c.clouds.contains(&pool.cloud),
                ConflictKind::CrossCloudConflict => {
                    c.group.is_some() && c.group == group.map(|g| g.key)
                }
            })
            .cloned()
            .collect();

        PoolReport {
            cloud: pool.cloud.clone(),
            name: pool.name.clone(),
            network: pool.cidr,
            kind: pool.kind,
            total: usage.total,
            used: usage.used_count(),
            free: usage.free_count(),
            usage_pct: usage_pct(usage.used_count(), usage.total),
            free_sample: usage.free.iter().take(self.free_sample_limit).copied().collect(),
            used_addresses: pool_usage.own.clone(),
            group: group.map(|g| g.key),
            canonical: group.map_or(false, |g| g.canonical == pool_usage.index),
            has_overlaps: !overlapping_clouds.is_empty(),
            overlapping_clouds,
            network_info: network_info(&pool.cidr),
            conflicts: if pool_conflicts.is_empty() {
                None
            } else {
                Some(pool_conflicts)
            },
        }
    }

    fn group_reports(&self, usage: &UsageAggregate) -> Vec<GroupReport> {
        self.groups
            .groups()
            .iter()
            .map(|group| {
                let group_usage = &usage.groups[group.id];
                GroupReport {
                    key: group.key,
                    canonical: self.registry.pool(group.canonical).key(),
                    members: group.members.iter().map(|i| self.registry.pool(*i).key()).collect(),
                    networks: group.networks.clone(),
                    total: group_usage.total,
                    used: group_usage.used,
                    free: group_usage.free(),
                    usage_pct: usage_pct(group_usage.used, group_usage.total),
                }
            })
            .collect()
    }
}

fn cloud_report(cloud: &str, collection: &Collection, pools: Vec<PoolReport>) -> CloudReport {
    let total = pools.iter().map(|p| p.total).sum();
    let used = pools.iter().map(|p| p.used).sum();
    let free = pools.iter().map(|p| p.free).sum();
    CloudReport {
        cloud: cloud.to_string(),
        status: collection.status(cloud),
        total_pools: pools.len(),
        total,
        used,
        free,
        usage_pct: usage_pct(used, total),
        pools,
    }
}
