use super::{PeerAssignment, PlacementContext, PlacementPolicy, RegionPlacement};
use crate::core::{MetaError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Rotates region leaders over the healthy peers.
///
/// Region `i` of a call gets leader `(cursor + i) % n` and the next
/// `replicas - 1` peers as followers. The cursor persists across calls so
/// consecutive tables start on different peers.
pub struct RoundRobinPolicy {
    replicas: usize,
    cursor: AtomicUsize,
}

impl RoundRobinPolicy {
    /// `replicas` counts the leader; it is clamped to the number of healthy peers.
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas: replicas.max(1),
            cursor: AtomicUsize::new(0),
        }
    }
}

impl PlacementPolicy for RoundRobinPolicy {
    fn name(&self) -> &str {
        "round_robin"
    }

    fn choose_peers(
        &self,
        ctx: &PlacementContext,
        region_count: usize,
    ) -> Result<PeerAssignment> {
        let peer_count = ctx.healthy_peers.len();
        if peer_count == 0 {
            return Err(MetaError::Unavailable(format!(
                "no healthy peers to place table {}",
                ctx.table_name
            )));
        }
        let replicas = self.replicas.min(peer_count);
        let start = self.cursor.fetch_add(region_count, Ordering::Relaxed);

        let regions = (0..region_count)
            .map(|region| {
                let leader = (start + region) % peer_count;
                let followers = (1..replicas)
                    .map(|offset| (leader + offset) % peer_count)
                    .collect();
                RegionPlacement::new(leader, followers)
            })
            .collect();

        Ok(PeerAssignment {
            peers: ctx.healthy_peers.clone(),
            regions,
        })
    }
}
