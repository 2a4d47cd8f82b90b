//! Allocation collection.
//!
//! Fetching allocations is the only I/O in a report cycle. The pipeline takes
//! an [`AllocationCollector`] at call time, fans out one call per cloud, and
//! waits for every cloud to finish or fail before anything is computed. A
//! failing cloud never affects the others.

pub mod snapshot;

use rayon::prelude::*;

use crate::error::{ReconcileError, ReportWarning};
use crate::ip::registry::{NetworkPool, PoolRegistry};
use crate::reconcile::types::{AddressAllocation, CollectionStatus};

pub use snapshot::SnapshotCollector;

/// Source of current allocations for one cloud
pub trait AllocationCollector: Sync {
    fn collect(
        &self,
        cloud: &str,
        pools: &[NetworkPool],
    ) -> Result<Vec<AddressAllocation>, ReconcileError>;
}

impl<F> AllocationCollector for F
where
    F: Fn(&str, &[NetworkPool]) -> Result<Vec<AddressAllocation>, ReconcileError> + Sync,
{
    fn collect(
        &self,
        cloud: &str,
        pools: &[NetworkPool],
    ) -> Result<Vec<AddressAllocation>, ReconcileError> {
        self(cloud, pools)
    }
}

/// Outcome of collecting one cloud
#[derive(Debug, Clone)]
pub struct CloudCollection {
    pub cloud: String,
    pub status: CollectionStatus,
    pub allocations: Vec<AddressAllocation>,
    pub error: Option<ReconcileError>,
}

/// Gathered results for every configured cloud, in cloud order
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub clouds: Vec<CloudCollection>,
}

impl Collection {
    /// Build a collection from data already in hand, every cloud marked fresh
    pub fn from_allocations(
        registry: &PoolRegistry,
        allocations: impl IntoIterator<Item = AddressAllocation>,
    ) -> Self {
        let mut clouds: Vec<CloudCollection> = registry
            .clouds()
            .iter()
            .map(|cloud| CloudCollection {
                cloud: cloud.clone(),
                status: CollectionStatus::Fresh,
                allocations: Vec::new(),
                error: None,
            })
            .collect();

        for allocation in allocations {
            match clouds.iter_mut().find(|c| c.cloud == allocation.cloud) {
                Some(entry) => entry.allocations.push(allocation),
                None => log::debug!(
                    "Dropping allocation {} for unconfigured cloud {}",
                    allocation.ip,
                    allocation.cloud
                ),
            }
        }
        Collection { clouds }
    }

    pub fn allocations(&self) -> impl Iterator<Item = &AddressAllocation> {
        self.clouds.iter().flat_map(|c| c.allocations.iter())
    }

    pub fn status(&self, cloud: &str) -> CollectionStatus {
        self.clouds
            .iter()
            .find(|c| c.cloud == cloud)
            .map(|c| c.status)
            .unwrap_or(CollectionStatus::Missing)
    }

    /// One warning per cloud whose data is not fresh
    pub fn warnings(&self) -> Vec<ReportWarning> {
        self.clouds
            .iter()
            .filter_map(|c| c.error.as_ref().map(ReportWarning::from))
            .collect()
    }
}

/// Collect allocations for every cloud in parallel.
///
/// Returns only once every cloud has either answered or failed. A failed cloud
/// falls back to its records in `previous`, when given.
pub fn collect_all<C>(
    registry: &PoolRegistry,
    collector: &C,
    previous: Option<&[AddressAllocation]>,
) -> Collection
where
    C: AllocationCollector + ?Sized,
{
    log::info!("Collecting allocations for {} clouds", registry.clouds().len());

    let clouds: Vec<CloudCollection> = registry
        .clouds()
        .par_iter()
        .map(|cloud| {
            let pools: Vec<NetworkPool> =
                registry.pools_for(cloud).map(|(_, p)| p.clone()).collect();

            match collector.collect(cloud, &pools) {
                Ok(mut allocations) => {
                    for allocation in &mut allocations {
                        if allocation.cloud != *cloud {
                            allocation.cloud = cloud.clone();
                        }
                    }
                    log::debug!("Collected {} allocations for {}", allocations.len(), cloud);
                    CloudCollection {
                        cloud: cloud.clone(),
                        status: CollectionStatus::Fresh,
                        allocations,
                        error: None,
                    }
                }
                Err(e) => {
                    let cached: Option<Vec<AddressAllocation>> = previous.map(|prev| {
                        prev.iter().filter(|a| a.cloud == *cloud).cloned().collect()
                    });
                    let status = if cached.is_some() {
                        CollectionStatus::Stale
                    } else {
                        CollectionStatus::Missing
                    };
                    log::warn!("{}; reporting {} as {:?}", e, cloud, status);
                    CloudCollection {
                        cloud: cloud.clone(),
                        status,
                        allocations: cached.unwrap_or_default(),
                        error: Some(e),
                    }
                }
            }
        })
        .collect();

    Collection { clouds }
}
