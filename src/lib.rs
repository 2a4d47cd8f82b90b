//! # ipreconcile - Address-space reconciliation for multi-cloud IP pools
//!
//! This library computes address utilization across several virtualization
//! tenancies ("clouds"), each exposing a set of IP pools, without counting
//! shared or overlapping address space twice, and classifies allocation
//! conflicts.
//!
//! ## Overview
//!
//! Pools are declared independently per cloud but may describe the same
//! physical subnet, either explicitly (`shared_with`) or by accident
//! (overlapping CIDRs). The reconciliation core groups such pools into
//! overlap groups, computes each pool's effective usage from the union of
//! allocations across its group, and rolls totals up per cloud and globally,
//! counting every group once.
//!
//! ## Architecture
//!
//! - `config`: Type-safe configuration structures and YAML parsing
//! - `config_loader`: Configuration file loading
//! - `error`: Error taxonomy and report warnings
//! - `ip`: CIDR arithmetic, the pool registry, and overlap grouping
//! - `collector`: Allocation collection capability and parallel scatter-gather
//! - `reconcile`: Usage aggregation, conflict detection, and report building
//! - `output`: JSON and text report writers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use ipreconcile::{collector::SnapshotCollector, config_loader, reconcile::Reconciler};
//!
//! let config = config_loader::load_config(Path::new("clouds.yaml"))?;
//! let reconciler = Reconciler::from_config(&config);
//!
//! // One <cloud>.json allocation snapshot per cloud
//! let collector = SnapshotCollector::new("snapshots");
//! let report = reconciler.run(&collector, None);
//!
//! println!("{} of {} addresses used", report.used, report.total);
//! for (ip, conflicts) in &report.conflicts {
//!     println!("{}: {} conflicts", ip, conflicts.len());
//! }
//! # Ok::<(), color_eyre::Report>(())
//! ```
//!
//! ## Error Handling
//!
//! Nothing in the core is fatal to a report. An unparseable pool network or a
//! cloud whose collection fails is logged and recorded in the report's
//! `warnings`; the report is built from whatever data is available.
//! Configuration loading and file output use `color_eyre` for context-rich
//! errors.

pub mod config;
pub mod config_loader;
pub mod error;

pub mod collector;
pub mod ip;
pub mod output;
pub mod reconcile;
