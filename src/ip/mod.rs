//! IP pool model and address arithmetic.
//!
//! This module holds the configured pools of every cloud, the CIDR math used
//! to count usable, used and free addresses, and the grouping of pools that
//! describe the same address space.

pub mod grouping;
pub mod math;
pub mod registry;

// Re-export commonly used types
pub use grouping::{GroupId, OverlapGroup, OverlapGroups};
pub use math::{AddressMath, FreeUsed, GatewayPolicy, ReservationPolicy};
pub use registry::{NetworkPool, PoolIndex, PoolRegistry};
