use crate::core::{MetaError, Peer, Result};
use std::collections::{HashMap, HashSet};

/// Leader and followers of one region, as indexes into `PeerAssignment::peers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPlacement {
    pub leader: usize,
    pub followers: Vec<usize>,
}

impl RegionPlacement {
    pub fn new(leader: usize, followers: Vec<usize>) -> Self {
        Self { leader, followers }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerAssignment {
    pub peers: Vec<Peer>,
    pub regions: Vec<RegionPlacement>,
}

impl PeerAssignment {
    /// Rejects assignments that would break the record invariants.
    pub fn validate(&self, region_count: usize) -> Result<()> {
        if self.regions.len() != region_count {
            return Err(MetaError::Internal(format!(
                "placement returned {} regions, expected {}",
                self.regions.len(),
                region_count
            )));
        }

        let mut ids = HashSet::new();
        for peer in &self.peers {
            if !ids.insert(peer.id) {
                return Err(MetaError::Internal(format!(
                    "placement listed peer {} more than once",
                    peer.id
                )));
            }
        }

        for (region, placement) in self.regions.iter().enumerate() {
            if placement.leader >= self.peers.len() {
                return Err(MetaError::Internal(format!(
                    "placement for region {} has leader index {} out of range",
                    region, placement.leader
                )));
            }
            let mut used = HashSet::new();
            used.insert(placement.leader);
            for follower in &placement.followers {
                if *follower >= self.peers.len() || !used.insert(*follower) {
                    return Err(MetaError::Internal(format!(
                        "placement for region {} has invalid follower index {}",
                        region, follower
                    )));
                }
            }
        }
        Ok(())
    }

    /// Drops peers no region references and renumbers indexes accordingly,
    /// keeping the first-referenced order.
    pub fn compact(self) -> Self {
        let mut remap: HashMap<usize, usize> = HashMap::new();
        let mut peers = Vec::new();
        let mut index_of = |old: usize, peers: &mut Vec<Peer>| -> usize {
            *remap.entry(old).or_insert_with(|| {
                peers.push(self.peers[old].clone());
                peers.len() - 1
            })
        };

        let mut regions = Vec::with_capacity(self.regions.len());
        for placement in &self.regions {
            let leader = index_of(placement.leader, &mut peers);
            let followers = placement
                .followers
                .iter()
                .map(|f| index_of(*f, &mut peers))
                .collect();
            regions.push(RegionPlacement::new(leader, followers));
        }
        Self { peers, regions }
    }
}
