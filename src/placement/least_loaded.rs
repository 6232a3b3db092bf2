use super::{PeerAssignment, PlacementContext, PlacementPolicy, RegionPlacement};
use crate::core::{MetaError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Places each replica on the peer carrying the fewest regions.
///
/// Load is the externally reported region count per peer (see
/// [`LeastLoadedPolicy::report_load`]) plus whatever this call has already
/// assigned. Ties go to the lower peer id.
pub struct LeastLoadedPolicy {
    replicas: usize,
    reported: RwLock<HashMap<u64, u64>>,
}

impl LeastLoadedPolicy {
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas: replicas.max(1),
            reported: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the load snapshot (regions hosted per peer id).
    pub fn report_load(&self, load: HashMap<u64, u64>) -> Result<()> {
        *self.reported.write()? = load;
        Ok(())
    }
}

impl PlacementPolicy for LeastLoadedPolicy {
    fn name(&self) -> &str {
        "least_loaded"
    }

    fn choose_peers(
        &self,
        ctx: &PlacementContext,
        region_count: usize,
    ) -> Result<PeerAssignment> {
        let peers = &ctx.healthy_peers;
        if peers.is_empty() {
            return Err(MetaError::Unavailable(format!(
                "no healthy peers to place table {}",
                ctx.table_name
            )));
        }
        let replicas = self.replicas.min(peers.len());

        let mut load: Vec<u64> = {
            let reported = self.reported.read()?;
            peers
                .iter()
                .map(|p| reported.get(&p.id).copied().unwrap_or(0))
                .collect()
        };

        let mut regions = Vec::with_capacity(region_count);
        for _ in 0..region_count {
            let mut order: Vec<usize> = (0..peers.len()).collect();
            order.sort_by_key(|&idx| (load[idx], peers[idx].id));
            let chosen = &order[..replicas];
            for &idx in chosen {
                load[idx] += 1;
            }
            regions.push(RegionPlacement::new(chosen[0], chosen[1..].to_vec()));
        }

        Ok(PeerAssignment {
            peers: peers.clone(),
            regions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Peer, TableName};

    fn ctx() -> PlacementContext {
        PlacementContext {
            table_name: TableName::new("greptime", "public", "t"),
            healthy_peers: vec![
                Peer::new(1, "a:4001"),
                Peer::new(2, "b:4001"),
                Peer::new(3, "c:4001"),
            ],
        }
    }

    #[test]
    fn prefers_unloaded_peers() {
        let policy = LeastLoadedPolicy::new(1);
        policy
            .report_load(HashMap::from([(1, 10), (2, 0), (3, 5)]))
            .unwrap();
        let assignment = policy.choose_peers(&ctx(), 2).unwrap();
        // peer 2 takes the first region, then has load 1 < 5
        assert_eq!(assignment.regions[0].leader, 1);
        assert_eq!(assignment.regions[1].leader, 1);
    }

    #[test]
    fn spreads_regions_evenly_without_reports() {
        let policy = LeastLoadedPolicy::new(2);
        let assignment = policy.choose_peers(&ctx(), 3).unwrap();
        assignment.validate(3).unwrap();
        let mut per_peer = [0; 3];
        for region in &assignment.regions {
            per_peer[region.leader] += 1;
            for f in &region.followers {
                per_peer[*f] += 1;
            }
        }
        assert_eq!(per_peer, [2, 2, 2]);
    }
}
