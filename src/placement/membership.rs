use super::PeerProvider;
use crate::core::{MetaError, Peer, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Maintains a fixed set of healthy peers, keyed by peer id.
///
/// Stands in for an external failure detector: whoever owns liveness calls
/// `add_peer`/`remove_peer` and the router only ever reads snapshots.
#[derive(Debug, Default)]
pub struct StaticPeerProvider {
    peers: RwLock<BTreeMap<u64, Peer>>,
}

impl StaticPeerProvider {
    /// Creates a provider from a list of peers.
    pub fn new(peers: Vec<Peer>) -> Result<Self> {
        let provider = Self::default();
        for peer in peers {
            provider.add_peer(peer)?;
        }
        Ok(provider)
    }

    /// Adds a peer. Fails if the address is empty or the id is already taken by
    /// a different address.
    pub fn add_peer(&self, peer: Peer) -> Result<()> {
        if peer.addr.trim().is_empty() {
            return Err(MetaError::InvalidArgument(format!(
                "peer {} must have an address",
                peer.id
            )));
        }
        let mut peers = self.peers.write()?;
        if let Some(existing) = peers.get(&peer.id) {
            if existing.addr != peer.addr {
                return Err(MetaError::InvalidArgument(format!(
                    "peer id {} already registered at {}",
                    peer.id, existing.addr
                )));
            }
            return Ok(());
        }
        peers.insert(peer.id, peer);
        Ok(())
    }

    /// Removes a peer.
    ///
    /// Returns true if the peer was present.
    pub fn remove_peer(&self, peer_id: u64) -> Result<bool> {
        Ok(self.peers.write()?.remove(&peer_id).is_some())
    }

    pub fn contains(&self, peer_id: u64) -> Result<bool> {
        Ok(self.peers.read()?.contains_key(&peer_id))
    }

    /// Returns all peers sorted by id.
    pub fn all_peers(&self) -> Result<Vec<Peer>> {
        Ok(self.peers.read()?.values().cloned().collect())
    }
}

#[async_trait]
impl PeerProvider for StaticPeerProvider {
    async fn healthy_peers(&self) -> Result<Vec<Peer>> {
        self.all_peers()
    }
}
