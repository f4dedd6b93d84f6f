use crate::{
    Error,
    types::{Peer, PeerId, PeerRef},
};
use std::collections::BTreeMap;

/// Memorable tag -> peer id lookup
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    by_tag: BTreeMap<String, PeerId>,
    by_id: BTreeMap<PeerId, String>,
}

impl TagTable {
    pub fn new(tags: &BTreeMap<String, String>) -> Self {
        let mut by_id = BTreeMap::new();
        for (tag, id) in tags {
            // First tag wins when several map to one id
            by_id.entry(id.clone()).or_insert_with(|| tag.clone());
        }
        Self {
            by_tag: tags.clone(),
            by_id,
        }
    }

    pub fn peer_id(&self, tag: &str) -> Option<&str> {
        self.by_tag.get(tag).map(String::as_str)
    }

    pub fn tag_for(&self, peer_id: &str) -> Option<&str> {
        self.by_id.get(peer_id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

/// Outcome of resolving a free-text peer reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    None,
    One(PeerRef),
    Many(Vec<PeerRef>),
}

impl Resolution {
    pub fn matches(&self) -> &[PeerRef] {
        match self {
            Self::None => &[],
            Self::One(peer) => std::slice::from_ref(peer),
            Self::Many(peers) => peers,
        }
    }

    /// Collapse to a single peer, treating zero or several matches as an error.
    pub fn into_unique(self, token: &str) -> crate::Result<PeerRef> {
        match self {
            Self::One(peer) => Ok(peer),
            Self::None => Err(Error::Unresolved(token.to_string())),
            Self::Many(peers) => Err(Error::Ambiguous {
                token: token.to_string(),
                candidates: peers.into_iter().map(|p| p.name).collect(),
            }),
        }
    }
}

/// Resolve `token` against the peer list.
///
/// Precedence: exact peer id, then tag, then case-insensitive substring of
/// the display name. Every peer whose name contains the token matches, so a
/// short token can come back as [`Resolution::Many`].
pub fn resolve(token: &str, peers: &[Peer], tags: &TagTable) -> Resolution {
    let token = token.trim();
    if token.is_empty() {
        return Resolution::None;
    }

    if let Some(peer) = peers.iter().find(|p| p.id == token) {
        return Resolution::One(peer.into());
    }

    if let Some(id) = tags.peer_id(token) {
        if let Some(peer) = peers.iter().find(|p| p.id == id) {
            return Resolution::One(peer.into());
        }
    }

    let needle = token.to_lowercase();
    let mut matches: Vec<PeerRef> = peers
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .map(PeerRef::from)
        .collect();

    match matches.len() {
        0 => Resolution::None,
        1 => Resolution::One(matches.remove(0)),
        _ => Resolution::Many(matches),
    }
}
