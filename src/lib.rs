// ============================================================================
// routemeta library
// ============================================================================

//! Region-routing metadata: which peers serve which regions of which table.
//!
//! The [`RouteTableManager`] keeps one [`TableRouteValue`] per table in a
//! pluggable key-value store and serves the three routing calls (Create,
//! Route, Delete). [`MetaRouter`] wires a manager from a [`RouterConfig`].

pub mod config;
pub mod core;
pub mod facade;
pub mod placement;
pub mod route;
pub mod rpc;
pub mod sequence;
pub mod storage;

/// Protocol version stamped into request headers built by this crate.
pub const PROTOCOL_VERSION: u64 = 1;

pub use config::RouterConfig;
pub use core::{
    HeaderError, MetaError, Peer, RequestHeader, ResponseHeader, Result, StatusCode, TableId,
    TableName,
};
pub use facade::MetaRouter;
pub use placement::{
    LeastLoadedPolicy, PeerAssignment, PeerProvider, PlacementContext, PlacementKind,
    PlacementPolicy, RegionPlacement, RoundRobinPolicy, StaticPeerProvider,
};
pub use route::{
    Partition, Region, RegionRoute, RouteTableManager, Table, TableRoute, TableRouteValue,
};
pub use rpc::{CreateRequest, DeleteRequest, RouteRequest, RouteResponse, Router};
pub use storage::{DurabilityMode, FileKvBackend, KvBackend, KvBackendRef, MemoryKvBackend};
