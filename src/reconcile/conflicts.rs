//! Duplicate and cross-cloud conflict detection.
//!
//! Two independent passes over the allocation snapshot:
//!
//! 1. Within one cloud, an address handed to more than one distinct
//!    organization/entity pair is a [`ConflictKind::DuplicateInCloud`].
//! 2. Within one overlap group, an address claimed from more than one cloud is
//!    a [`ConflictKind::CrossCloudConflict`]. Only allocations of member pools
//!    whose address falls inside a group network take part.
//!
//! An address can appear in both passes; the map keeps every conflict.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use crate::ip::grouping::OverlapGroups;
use crate::ip::registry::PoolRegistry;

use super::types::{AddressAllocation, Conflict, ConflictKind, ConflictMap};

pub struct ConflictDetector<'a> {
    registry: &'a PoolRegistry,
    groups: &'a OverlapGroups,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(registry: &'a PoolRegistry, groups: &'a OverlapGroups) -> Self {
        Self { registry, groups }
    }

    pub fn detect(&self, allocations: &[&AddressAllocation]) -> ConflictMap {
        let mut conflicts = ConflictMap::new();

        for conflict in duplicates_in_cloud(allocations) {
            conflicts.entry(conflict.ip).or_default().push(conflict);
        }
        for conflict in self.cross_cloud(allocations) {
            conflicts.entry(conflict.ip).or_default().push(conflict);
        }

        if !conflicts.is_empty() {
            log::warn!("Detected conflicts on {} addresses", conflicts.len());
        }
        conflicts
    }

    fn cross_cloud(&self, allocations: &[&AddressAllocation]) -> Vec<Conflict> {
        let mut by_group: Vec<BTreeMap<Ipv4Addr, Vec<&AddressAllocation>>> =
            vec![BTreeMap::new(); self.groups.groups().len()];

        for &allocation in allocations {
            let Some(index) = self.registry.position(&allocation.cloud, &allocation.pool) else {
                continue;
            };
            let Some(group) = self.groups.group_of(index) else {
                continue;
            };
            if group.covers(&allocation.ip) {
                by_group[group.id].entry(allocation.ip).or_default().push(allocation);
            }
        }

        let mut conflicts = Vec::new();
        for (group, claims) in self.groups.groups().iter().zip(by_group) {
            for (ip, records) in claims {
                let clouds: BTreeSet<&str> = records.iter().map(|a| a.cloud.as_str()).collect();
                if clouds.len() < 2 {
                    continue;
                }
                log::debug!("Cross-cloud conflict on {} in group {}: {:?}", ip, group.key, clouds);
                conflicts.push(Conflict {
                    ip,
                    clouds: clouds.into_iter().map(str::to_string).collect(),
                    pools: records.iter().map(|a| a.pool.clone()).collect(),
                    organizations: records.iter().map(|a| a.organization.clone()).collect(),
                    kind: ConflictKind::CrossCloudConflict,
                    group: Some(group.key),
                });
            }
        }
        conflicts
    }
}

fn duplicates_in_cloud(allocations: &[&AddressAllocation]) -> Vec<Conflict> {
    let mut by_cloud: BTreeMap<(&str, Ipv4Addr), Vec<&AddressAllocation>> = BTreeMap::new();
    for &allocation in allocations {
        by_cloud
            .entry((allocation.cloud.as_str(), allocation.ip))
            .or_default()
            .push(allocation);
    }

    by_cloud
        .into_iter()
        .filter_map(|((cloud, ip), records)| {
            let holders: BTreeSet<(&str, Option<&str>)> = records
                .iter()
                .map(|a| (a.organization.as_str(), a.entity.as_deref()))
                .collect();
            if holders.len() < 2 {
                return None;
            }
            log::debug!("Duplicate allocation of {} in {}: {:?}", ip, cloud, holders);
            Some(Conflict {
                ip,
                clouds: vec![cloud.to_string()],
                pools: records.iter().map(|a| a.pool.clone()).collect(),
                organizations: records.iter().map(|a| a.organization.clone()).collect(),
                kind: ConflictKind::DuplicateInCloud,
                group: None,
            })
        })
        .collect()
}
