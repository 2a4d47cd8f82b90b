//! Address-space reconciliation.
//!
//! Turns a pool configuration and an allocation snapshot into a utilization
//! report and a conflict map. The pipeline is a pure function of its inputs:
//! overlap groups are derived once from the registry, collection gathers every
//! cloud before anything is computed, then usage, conflicts and rollups are
//! produced in a single pass.

pub mod conflicts;
pub mod report;
pub mod types;
pub mod usage;

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::collector::{collect_all, AllocationCollector, Collection};
use crate::config::Config;
use crate::ip::grouping::OverlapGroups;
use crate::ip::math::{AddressMath, GatewayPolicy, ReservationPolicy};
use crate::ip::registry::PoolRegistry;

pub use conflicts::ConflictDetector;
pub use report::ReportBuilder;
pub use types::*;
pub use usage::{UsageAggregate, UsageAggregator};

/// Registry, overlap groups and report settings for one loaded configuration
#[derive(Debug, Clone)]
pub struct Reconciler<P = GatewayPolicy> {
    registry: PoolRegistry,
    groups: OverlapGroups,
    math: AddressMath<P>,
    free_sample_limit: usize,
}

impl Reconciler<GatewayPolicy> {
    pub fn from_config(config: &Config) -> Self {
        Reconciler::new(
            PoolRegistry::from_config(config),
            AddressMath::new(config.report.gateway_policy),
            config.report.free_sample_limit,
        )
    }
}

impl<P: ReservationPolicy> Reconciler<P> {
    pub fn new(registry: PoolRegistry, math: AddressMath<P>, free_sample_limit: usize) -> Self {
        let groups = OverlapGroups::build(&registry);
        Self {
            registry,
            groups,
            math,
            free_sample_limit,
        }
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    pub fn groups(&self) -> &OverlapGroups {
        &self.groups
    }

    /// Gather allocations from every cloud; see [`collect_all`]
    pub fn collect<C>(&self, collector: &C, previous: Option<&[AddressAllocation]>) -> Collection
    where
        C: AllocationCollector + ?Sized,
    {
        collect_all(&self.registry, collector, previous)
    }

    /// Compute the report for a gathered collection
    pub fn report(&self, collection: &Collection) -> UtilizationReport {
        let allocations: Vec<&AddressAllocation> = collection.allocations().collect();

        let usage = UsageAggregator::new(&self.math, &self.registry, &self.groups)
            .aggregate(allocations.iter().copied());
        let conflicts = ConflictDetector::new(&self.registry, &self.groups).detect(&allocations);

        ReportBuilder::new(&self.registry, &self.groups, self.free_sample_limit)
            .build(collection, &usage, conflicts)
    }

    /// Collect, then report
    pub fn run<C>(&self, collector: &C, previous: Option<&[AddressAllocation]>) -> UtilizationReport
    where
        C: AllocationCollector + ?Sized,
    {
        let collection = self.collect(collector, previous);
        self.report(&collection)
    }

    /// Complete free lists keyed by `cloud/pool`, unbounded by the report's sample limit
    pub fn free_by_pool(&self, collection: &Collection) -> BTreeMap<String, Vec<Ipv4Addr>> {
        let usage = UsageAggregator::new(&self.math, &self.registry, &self.groups)
            .aggregate(collection.allocations());
        usage
            .pools
            .into_iter()
            .map(|p| (self.registry.pool(p.index).key(), p.usage.free))
            .collect()
    }
}
