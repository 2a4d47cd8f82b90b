//! File-backed collector.
//!
//! Reads `<dir>/<cloud>.json`, a JSON array of allocation records written by
//! whatever talks to the platform API. Records with an address that is not
//! IPv4 are skipped; a missing or malformed file fails that cloud only.

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::AllocationCollector;
use crate::error::ReconcileError;
use crate::ip::registry::NetworkPool;
use crate::reconcile::types::AddressAllocation;

#[derive(Debug, Clone)]
pub struct SnapshotCollector {
    dir: PathBuf,
}

/// Allocation record as written to disk, before address validation
#[derive(Debug, Deserialize)]
struct RawAllocation {
    #[serde(alias = "ip_address")]
    ip: String,
    #[serde(default, alias = "pool_name")]
    pool: String,
    #[serde(default = "unknown_org", alias = "org_name")]
    organization: String,
    #[serde(default, alias = "entity_name")]
    entity: Option<String>,
    #[serde(default, alias = "allocation_type")]
    allocation_kind: String,
    #[serde(default, alias = "allocation_date")]
    allocated_at: Option<DateTime<Utc>>,
}

fn unknown_org() -> String {
    "unknown".to_string()
}

impl SnapshotCollector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, cloud: &str) -> PathBuf {
        self.dir.join(format!("{}.json", cloud))
    }

    fn read(&self, cloud: &str, path: &Path) -> Result<Vec<RawAllocation>, ReconcileError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReconcileError::collection(cloud, format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ReconcileError::collection(cloud, format!("cannot parse {}: {}", path.display(), e))
        })
    }
}

impl AllocationCollector for SnapshotCollector {
    fn collect(
        &self,
        cloud: &str,
        pools: &[NetworkPool],
    ) -> Result<Vec<AddressAllocation>, ReconcileError> {
        let path = self.path_for(cloud);
        log::debug!("Reading {} snapshot for {} pools from {}", cloud, pools.len(), path.display());

        let mut allocations = Vec::new();
        for raw in self.read(cloud, &path)? {
            let ip = match raw.ip.trim().parse::<Ipv4Addr>() {
                Ok(ip) => ip,
                Err(e) => {
                    let err = ReconcileError::InvalidAddress {
                        value: raw.ip.clone(),
                        reason: e.to_string(),
                    };
                    log::warn!("Skipping record in {} (pool '{}'): {}", path.display(), raw.pool, err);
                    continue;
                }
            };
            allocations.push(AddressAllocation {
                ip,
                cloud: cloud.to_string(),
                pool: raw.pool,
                organization: raw.organization,
                entity: raw.entity,
                allocation_kind: raw.allocation_kind,
                allocated_at: raw.allocated_at,
            });
        }
        Ok(allocations)
    }
}
