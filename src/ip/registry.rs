//! Pool registry.
//!
//! The in-memory, read-only model of every configured pool across all clouds.
//! Pools whose network does not parse, or whose name is empty or already
//! taken in their cloud, are left out here and reported as
//! warnings, so nothing downstream ever sees an invalid network.

use std::collections::{BTreeSet, HashMap};

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::config::{Config, PoolKind};
use crate::error::{ReconcileError, ReportWarning};
use super::math::parse_network;

/// Position of a pool inside its [`PoolRegistry`]
pub type PoolIndex = usize;

/// A configured pool with a parsed network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPool {
    pub cloud: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub cidr: Ipv4Net,
    pub kind: PoolKind,
    #[serde(default)]
    pub shared_with: BTreeSet<String>,
}

impl NetworkPool {
    pub fn new(cloud: &str, name: &str, cidr: Ipv4Net, kind: PoolKind) -> Self {
        NetworkPool {
            cloud: cloud.to_string(),
            id: String::new(),
            name: name.to_string(),
            cidr,
            kind,
            shared_with: BTreeSet::new(),
        }
    }

    pub fn shared_with<I, S>(mut self, clouds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared_with.extend(clouds.into_iter().map(Into::into));
        self
    }

    /// `cloud/name`, the key used for pool-addressed lookups
    pub fn key(&self) -> String {
        format!("{}/{}", self.cloud, self.name)
    }
}

/// All valid pools, in deterministic order: clouds sorted by id, pools in
/// configuration order within a cloud
#[derive(Debug, Clone, Default)]
pub struct PoolRegistry {
    clouds: Vec<String>,
    pools: Vec<NetworkPool>,
    by_key: HashMap<(String, String), PoolIndex>,
    warnings: Vec<ReportWarning>,
}

impl PoolRegistry {
    /// Build the registry from configuration, dropping misnamed pools and pools
    /// with invalid networks
    pub fn from_config(config: &Config) -> Self {
        let mut registry = PoolRegistry {
            clouds: config.cloud_ids().map(str::to_string).collect(),
            ..Default::default()
        };

        for (cloud_id, cloud) in &config.clouds {
            for pool in &cloud.pools {
                if pool.name.trim().is_empty() {
                    let err = ReconcileError::InvalidPool {
                        reason: format!("pool '{}' has an empty name", pool.id),
                    };
                    log::warn!("Excluding pool in {}: {}", cloud_id, err);
                    registry
                        .warnings
                        .push(ReportWarning::for_pool(cloud_id, &pool.name, &err));
                    continue;
                }

                let cidr = match parse_network(&pool.network) {
                    Ok(cidr) => cidr,
                    Err(e) => {
                        log::warn!("Excluding pool {}/{}: {}", cloud_id, pool.name, e);
                        registry
                            .warnings
                            .push(ReportWarning::for_pool(cloud_id, &pool.name, &e));
                        continue;
                    }
                };

                let shared_with = pool
                    .shared_with
                    .iter()
                    .filter(|peer| *peer != cloud_id && config.clouds.contains_key(*peer))
                    .cloned()
                    .collect();

                let inserted = registry.insert(NetworkPool {
                    cloud: cloud_id.clone(),
                    id: pool.id.clone(),
                    name: pool.name.clone(),
                    cidr,
                    kind: pool.kind,
                    shared_with,
                });
                if let Err(e) = inserted {
                    log::warn!("Excluding pool {}/{}: {}", cloud_id, pool.name, e);
                    registry
                        .warnings
                        .push(ReportWarning::for_pool(cloud_id, &pool.name, &e));
                }
            }
        }

        log::debug!(
            "Pool registry holds {} valid pools across {} clouds ({} excluded)",
            registry.pools.len(),
            registry.clouds.len(),
            registry.warnings.len()
        );
        registry
    }

    /// Build a registry directly from parsed pools
    pub fn from_pools(pools: impl IntoIterator<Item = NetworkPool>) -> Self {
        let mut pools: Vec<NetworkPool> = pools.into_iter().collect();
        // stable: keeps the given order of pools within one cloud
        pools.sort_by(|a, b| a.cloud.cmp(&b.cloud));

        let mut registry = PoolRegistry::default();
        for pool in pools {
            if registry.clouds.last() != Some(&pool.cloud) {
                registry.clouds.push(pool.cloud.clone());
            }
            if let Err(e) = registry.insert(pool) {
                log::warn!("Ignoring pool: {}", e);
            }
        }
        registry
    }

    /// Add a pool; the first pool to take a name within a cloud keeps it
    fn insert(&mut self, pool: NetworkPool) -> Result<(), ReconcileError> {
        let key = (pool.cloud.clone(), pool.name.clone());
        if self.by_key.contains_key(&key) {
            return Err(ReconcileError::InvalidPool {
                reason: format!("duplicate pool name '{}' in cloud {}", pool.name, pool.cloud),
            });
        }
        self.by_key.insert(key, self.pools.len());
        self.pools.push(pool);
        Ok(())
    }

    pub fn clouds(&self) -> &[String] {
        &self.clouds
    }

    pub fn pools(&self) -> &[NetworkPool] {
        &self.pools
    }

    pub fn pool(&self, index: PoolIndex) -> &NetworkPool {
        &self.pools[index]
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Index of the pool named `name` in `cloud`
    pub fn position(&self, cloud: &str, name: &str) -> Option<PoolIndex> {
        self.by_key
            .get(&(cloud.to_string(), name.to_string()))
            .copied()
    }

    pub fn get(&self, cloud: &str, name: &str) -> Option<&NetworkPool> {
        self.position(cloud, name).map(|i| &self.pools[i])
    }

    /// Pools of one cloud with their indices, in configuration order
    pub fn pools_for<'a>(
        &'a self,
        cloud: &'a str,
    ) -> impl Iterator<Item = (PoolIndex, &'a NetworkPool)> + 'a {
        self.pools
            .iter()
            .enumerate()
            .filter(move |(_, pool)| pool.cloud == cloud)
    }

    /// Warnings for pools excluded while loading
    pub fn warnings(&self) -> &[ReportWarning] {
        &self.warnings
    }
}
