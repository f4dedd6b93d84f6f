use crate::{
    Error, Result,
    ingestor::history::summarize_events,
    types::{Channel, ForwardingEvent, ForwardingHistory, Peer, PeerFees},
};
use chrono::{DateTime, Utc};
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Everything read from the node for one pass
#[derive(Debug, Clone, Default)]
pub struct NodeView {
    pub peers: Vec<Peer>,
    pub channels: Vec<Channel>,
    pub history: ForwardingHistory,
    pub fees: Vec<PeerFees>,
}

/// Read contract of the node daemon. Every call returns fully materialised,
/// freshly fetched data.
#[automock]
pub trait NodeSource {
    fn list_peers(&self) -> Result<Vec<Peer>>;
    fn list_channels(&self) -> Result<Vec<Channel>>;
    /// Per-peer forwarded volume over the trailing `days`
    fn forwarding_history(&self, days: u64) -> Result<ForwardingHistory>;
    fn list_fees(&self) -> Result<Vec<PeerFees>>;

    /// All four reads for one pass. Sources that can serve them from a
    /// single read override this so the parts agree with each other.
    fn node_view(&self, days: u64) -> Result<NodeView> {
        Ok(NodeView {
            peers: self.list_peers()?,
            channels: self.list_channels()?,
            history: self.forwarding_history(days)?,
            fees: self.list_fees()?,
        })
    }
}

/// Captured node state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub peers: Vec<Peer>,
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub forwards: Vec<ForwardingEvent>,
    #[serde(default)]
    pub fees: Vec<PeerFees>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Source(format!("failed to read snapshot {}: {e}", path.display()))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        debug!(
            path = %path.display(),
            peers = snapshot.peers.len(),
            channels = snapshot.channels.len(),
            forwards = snapshot.forwards.len(),
            "loaded node snapshot"
        );
        Ok(snapshot)
    }

    /// Split into a [`NodeView`], summarizing forwards over the trailing
    /// `days` before `now`.
    pub fn into_view(self, days: u64, now: DateTime<Utc>) -> NodeView {
        let history = summarize_events(&self.forwards, &self.channels, days, now);
        NodeView {
            peers: self.peers,
            channels: self.channels,
            history,
            fees: self.fees,
        }
    }
}

/// [`NodeSource`] backed by a JSON snapshot file, re-read on every call.
/// [`NodeSource::node_view`] parses it once for all four parts.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> Result<Snapshot> {
        Snapshot::load(&self.path)
    }
}

impl NodeSource for SnapshotSource {
    fn list_peers(&self) -> Result<Vec<Peer>> {
        Ok(self.load()?.peers)
    }

    fn list_channels(&self) -> Result<Vec<Channel>> {
        Ok(self.load()?.channels)
    }

    fn forwarding_history(&self, days: u64) -> Result<ForwardingHistory> {
        let snapshot = self.load()?;
        Ok(summarize_events(
            &snapshot.forwards,
            &snapshot.channels,
            days,
            Utc::now(),
        ))
    }

    fn list_fees(&self) -> Result<Vec<PeerFees>> {
        Ok(self.load()?.fees)
    }

    fn node_view(&self, days: u64) -> Result<NodeView> {
        Ok(self.load()?.into_view(days, Utc::now()))
    }
}
