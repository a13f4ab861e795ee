/// Source of the peer count reported over HTTP.
pub trait PeerDirectory: Send + Sync {
    fn peers_count(&self) -> usize;
}

/// Fixed peer list from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticPeers {
    peers: Vec<String>,
}

impl StaticPeers {
    #[must_use]
    pub fn new(peers: Vec<String>) -> Self {
        let mut peers: Vec<_> = peers
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        peers.sort();
        peers.dedup();
        Self { peers }
    }

    #[must_use]
    pub fn peers(&self) -> &[String] {
        &self.peers
    }
}

impl PeerDirectory for StaticPeers {
    fn peers_count(&self) -> usize {
        self.peers.len()
    }
}
