use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque node identifier (the peer's public key).
pub type PeerId = String;
pub type ChannelId = String;

/// A counterparty node as reported by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub name: String,
    pub active: bool,
    /// Sum of remote balances over all channels with this peer (sat)
    #[serde(default)]
    pub inbound_liquidity_sat: u64,
    /// Sum of local balances over all channels with this peer (sat)
    #[serde(default)]
    pub outbound_liquidity_sat: u64,
}

/// A funded channel to a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub remote_peer: PeerId,
    pub capacity_sat: u64,
    /// Age of the channel in seconds
    pub lifetime_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// Forwarded volume for one peer in one direction over the history window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingRecord {
    pub peer_id: PeerId,
    pub direction: Direction,
    pub sum_sat: u64,
    /// Start of the relationship with the peer
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingHistory {
    pub inbound: Vec<ForwardingRecord>,
    pub outbound: Vec<ForwardingRecord>,
}

/// A single settled forward: `amount_sat` entered from `incoming_peer` and
/// left through `outgoing_peer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingEvent {
    pub timestamp: DateTime<Utc>,
    pub incoming_peer: PeerId,
    pub outgoing_peer: PeerId,
    pub amount_sat: u64,
}

/// Resolved peer identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerRef {
    pub id: PeerId,
    pub name: String,
}

impl From<&Peer> for PeerRef {
    fn from(peer: &Peer) -> Self {
        Self {
            id: peer.id.clone(),
            name: peer.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTerms {
    pub base_msat: i64,
    pub rate_ppm: i64,
}

/// Fee policy on both ends of the channel(s) with a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerFees {
    pub peer_id: PeerId,
    pub local: FeeTerms,
    pub remote: FeeTerms,
}
