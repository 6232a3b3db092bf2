//! Table routes: the persisted data model, its keys, partition rules and the
//! manager that serves Create/Route/Delete over them.

pub mod keys;
pub mod manager;
pub mod merge;
pub mod model;
pub mod partition;

pub use keys::{TableIdKey, TableRouteKey};
pub use manager::RouteTableManager;
pub use merge::RouteResponseBuilder;
pub use model::{Partition, Region, RegionRoute, Table, TableRoute, TableRouteValue};
pub use partition::{partition_index_for, validate_partitions};
