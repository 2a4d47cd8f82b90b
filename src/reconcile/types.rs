//! Data types shared by the reconciliation pipeline and its reports.
//!
//! Every map in here is ordered so that serializing the same report twice
//! yields identical output.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::config::PoolKind;
use crate::error::ReportWarning;
use crate::ip::math::NetworkInfo;

/// One address currently assigned in some cloud/pool, as reported by a collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressAllocation {
    #[serde(alias = "ip_address")]
    pub ip: Ipv4Addr,
    #[serde(default, alias = "cloud_name")]
    pub cloud: String,
    #[serde(alias = "pool_name")]
    pub pool: String,
    #[serde(alias = "org_name")]
    pub organization: String,
    #[serde(default, alias = "entity_name", skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(alias = "allocation_type")]
    pub allocation_kind: String,
    #[serde(default, alias = "allocation_date", skip_serializing_if = "Option::is_none")]
    pub allocated_at: Option<DateTime<Utc>>,
}

impl AddressAllocation {
    pub fn new(ip: Ipv4Addr, cloud: &str, pool: &str, organization: &str) -> Self {
        AddressAllocation {
            ip,
            cloud: cloud.to_string(),
            pool: pool.to_string(),
            organization: organization.to_string(),
            entity: None,
            allocation_kind: "FLOATING_IP".to_string(),
            allocated_at: None,
        }
    }

    pub fn with_entity(mut self, entity: &str) -> Self {
        self.entity = Some(entity.to_string());
        self
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.allocation_kind = kind.to_string();
        self
    }

    /// Ordering used whenever allocation lists are emitted
    pub fn sort_key(&self) -> (Ipv4Addr, &str, &str, &str, Option<&str>, &str) {
        (
            self.ip,
            &self.cloud,
            &self.pool,
            &self.organization,
            self.entity.as_deref(),
            &self.allocation_kind,
        )
    }
}

/// Sort allocations by address, then cloud, pool, organization and entity
pub fn sort_allocations(allocations: &mut [AddressAllocation]) {
    allocations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// One cloud hands the same address to more than one organization or entity
    DuplicateInCloud,
    /// Several clouds claim the same address inside one overlap group
    CrossCloudConflict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub ip: Ipv4Addr,
    /// Sorted, without duplicates
    pub clouds: Vec<String>,
    pub pools: BTreeSet<String>,
    pub organizations: BTreeSet<String>,
    pub kind: ConflictKind,
    /// Overlap group key, for cross-cloud conflicts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Ipv4Net>,
}

/// Every conflict for an address; one address may carry both kinds
pub type ConflictMap = BTreeMap<Ipv4Addr, Vec<Conflict>>;

/// How fresh a cloud's allocation data is for this report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    /// Collected for this report
    Fresh,
    /// Collection failed; data comes from a previous snapshot
    Stale,
    /// Collection failed and nothing was cached
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolReport {
    pub cloud: String,
    pub name: String,
    pub network: Ipv4Net,
    pub kind: PoolKind,
    pub total: usize,
    pub used: usize,
    pub free: usize,
    pub usage_pct: f64,
    /// Leading free addresses in numeric order, bounded
    pub free_sample: Vec<Ipv4Addr>,
    /// This pool's own allocation records
    pub used_addresses: Vec<AddressAllocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Ipv4Net>,
    #[serde(default)]
    pub canonical: bool,
    #[serde(default)]
    pub has_overlaps: bool,
    #[serde(default)]
    pub overlapping_clouds: Vec<String>,
    pub network_info: NetworkInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<Conflict>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudReport {
    pub cloud: String,
    pub status: CollectionStatus,
    pub total_pools: usize,
    pub total: usize,
    pub used: usize,
    pub free: usize,
    pub usage_pct: f64,
    pub pools: Vec<PoolReport>,
}

/// Distinct totals of one overlap group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    pub key: Ipv4Net,
    /// `cloud/pool` of the member counted globally
    pub canonical: String,
    pub members: Vec<String>,
    pub networks: Vec<Ipv4Net>,
    pub total: usize,
    pub used: usize,
    pub free: usize,
    pub usage_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateSummary {
    pub total_unique_ips: usize,
    pub conflicting_ips: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationReport {
    pub total_clouds: usize,
    pub total: usize,
    pub used: usize,
    pub free: usize,
    pub usage_pct: f64,
    pub clouds: Vec<CloudReport>,
    pub groups: Vec<GroupReport>,
    pub conflicts: ConflictMap,
    pub duplicate_summary: DuplicateSummary,
    pub allocations: Vec<AddressAllocation>,
    pub warnings: Vec<ReportWarning>,
}

impl UtilizationReport {
    pub fn cloud(&self, cloud: &str) -> Option<&CloudReport> {
        self.clouds.iter().find(|c| c.cloud == cloud)
    }

    pub fn pool(&self, cloud: &str, name: &str) -> Option<&PoolReport> {
        self.cloud(cloud)?.pools.iter().find(|p| p.name == name)
    }

    /// Every allocation record for `ip` across all clouds
    pub fn find_address(&self, ip: Ipv4Addr) -> Vec<&AddressAllocation> {
        // allocations are sorted by address first
        let start = self.allocations.partition_point(|a| a.ip < ip);
        self.allocations[start..]
            .iter()
            .take_while(|a| a.ip == ip)
            .collect()
    }
}

/// `used / total` as a percentage rounded to two decimals; zero for an empty total
pub fn usage_pct(used: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 10000.0).round() / 100.0
}
