//! The routing RPC surface: three unary methods over the route table.
//!
//! Transport is out of scope; anything that can move [`CreateRequest`],
//! [`RouteRequest`], [`DeleteRequest`] and [`RouteResponse`] (encoded with
//! [`codec`]) can front a [`Router`].

pub mod codec;
pub mod messages;

pub use messages::{CreateRequest, DeleteRequest, RouteRequest, RouteResponse};

use async_trait::async_trait;

/// Service contract for the routing protocol.
///
/// Failures travel in `RouteResponse::header.error` rather than as `Err`, the
/// way they would on the wire. Use [`RouteResponse::into_result`] to get a
/// `Result` back.
#[async_trait]
pub trait Router: Send + Sync {
    async fn create(&self, req: CreateRequest) -> RouteResponse;

    async fn route(&self, req: RouteRequest) -> RouteResponse;

    async fn delete(&self, req: DeleteRequest) -> RouteResponse;
}
