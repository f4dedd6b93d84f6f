use crate::{
    processor::aggregate::{FlowShares, Share, aggregate},
    settings::ClassifierSettings,
    types::{Channel, ChannelId, ForwardingHistory, Peer, PeerId},
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    fmt,
};
use tabled::Tabled;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowClass {
    Inbound,
    Outbound,
    Balanced,
    Skipped,
}

impl FlowClass {
    pub const ALL: [FlowClass; 4] = [
        FlowClass::Inbound,
        FlowClass::Outbound,
        FlowClass::Balanced,
        FlowClass::Skipped,
    ];
}

impl fmt::Display for FlowClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
            Self::Balanced => write!(f, "balanced"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// One channel placed in a bucket
#[derive(Debug, Clone, PartialEq, Eq, Tabled, Serialize, Deserialize)]
pub struct ClassifiedChannel {
    #[tabled(rename = "channel")]
    pub channel_id: ChannelId,
    #[tabled(skip)]
    pub peer_id: PeerId,
    pub name: String,
    #[tabled(rename = "age(d)", display = "display_secs_as_days")]
    pub age_secs: u64,
    #[tabled(rename = "p(%)", display = "display_percentage")]
    pub percentage: Option<u32>,
}

fn display_secs_as_days(secs: &u64) -> String {
    format!("{:.1}", *secs as f64 / 86_400.0)
}

fn display_percentage(p: &Option<u32>) -> String {
    p.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Four-way partition of the node's channels. Every input channel id is in
/// exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Sorted by percentage, highest first
    pub inbound: Vec<ClassifiedChannel>,
    /// Sorted by percentage, highest first
    pub outbound: Vec<ClassifiedChannel>,
    pub balanced: Vec<ClassifiedChannel>,
    pub skipped: Vec<ClassifiedChannel>,
}

impl Classification {
    pub fn bucket(&self, class: FlowClass) -> &[ClassifiedChannel] {
        match class {
            FlowClass::Inbound => &self.inbound,
            FlowClass::Outbound => &self.outbound,
            FlowClass::Balanced => &self.balanced,
            FlowClass::Skipped => &self.skipped,
        }
    }

    fn bucket_mut(&mut self, class: FlowClass) -> &mut Vec<ClassifiedChannel> {
        match class {
            FlowClass::Inbound => &mut self.inbound,
            FlowClass::Outbound => &mut self.outbound,
            FlowClass::Balanced => &mut self.balanced,
            FlowClass::Skipped => &mut self.skipped,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlowClass, &ClassifiedChannel)> {
        FlowClass::ALL
            .into_iter()
            .flat_map(move |class| self.bucket(class).iter().map(move |c| (class, c)))
    }

    pub fn class_of(&self, channel_id: &str) -> Option<FlowClass> {
        self.iter()
            .find(|(_, c)| c.channel_id == channel_id)
            .map(|(class, _)| class)
    }

    pub fn len(&self) -> usize {
        self.inbound.len() + self.outbound.len() + self.balanced.len() + self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Peers kept out of the young-relationship grace and forced to outbound
/// when they have no qualifying history.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    name_patterns: Vec<String>,
    peer_ids: BTreeSet<PeerId>,
}

impl ExclusionPolicy {
    pub fn new(name_patterns: Vec<String>, peer_ids: impl IntoIterator<Item = PeerId>) -> Self {
        Self {
            name_patterns,
            peer_ids: peer_ids.into_iter().collect(),
        }
    }

    pub fn is_excluded(&self, peer_id: &str, name: &str) -> bool {
        self.peer_ids.contains(peer_id) || self.name_patterns.iter().any(|p| name.contains(p))
    }
}

// Step 1 verdict for a peer; holds the share that decided it
#[derive(Debug, Clone, Copy)]
enum Tentative<'a> {
    Inbound(&'a Share),
    Outbound(&'a Share),
    Balanced(&'a Share),
}

#[derive(Debug, Clone)]
pub struct Classifier {
    threshold_pct: u32,
    young_window: TimeDelta,
    min_capacity_sat: u64,
    exclusions: ExclusionPolicy,
}

impl Classifier {
    pub fn new(
        threshold_pct: u32,
        young_window: TimeDelta,
        min_capacity_sat: u64,
        exclusions: ExclusionPolicy,
    ) -> Self {
        Self {
            threshold_pct,
            young_window,
            min_capacity_sat,
            exclusions,
        }
    }

    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        let young_window = i64::try_from(settings.young_relationship_days)
            .ok()
            .and_then(TimeDelta::try_days)
            .unwrap_or(TimeDelta::MAX);

        Self::new(
            settings.share_threshold_pct,
            young_window,
            settings.min_capacity_sat,
            ExclusionPolicy::new(
                settings.excluded_name_patterns.clone(),
                settings.excluded_peer_ids.iter().cloned(),
            ),
        )
    }

    /// Classify against the current wall-clock time.
    pub fn classify(
        &self,
        history: &ForwardingHistory,
        channels: &[Channel],
        peers: &[Peer],
    ) -> Classification {
        self.classify_at(history, channels, peers, Utc::now())
    }

    /// Classify with the young-relationship grace measured from `now`.
    pub fn classify_at(
        &self,
        history: &ForwardingHistory,
        channels: &[Channel],
        peers: &[Peer],
        now: DateTime<Utc>,
    ) -> Classification {
        let shares = aggregate(history, peers);
        self.classify_shares_at(&shares, channels, peers, now)
    }

    pub fn classify_shares_at(
        &self,
        shares: &FlowShares,
        channels: &[Channel],
        peers: &[Peer],
        now: DateTime<Utc>,
    ) -> Classification {
        let tentative = self.classify_peers(shares, now);
        debug!(
            classified_peers = tentative.len(),
            "peer-level classification from history"
        );

        let peer_names: HashMap<&str, &str> = peers
            .iter()
            .map(|p| (p.id.as_str(), p.name.as_str()))
            .collect();

        let mut result = Classification::default();
        let mut seen: HashSet<&str> = HashSet::with_capacity(channels.len());

        for channel in channels {
            if !seen.insert(channel.id.as_str()) {
                warn!(channel = %channel.id, "duplicate channel id in channel list, ignoring");
                continue;
            }

            let peer_id = channel.remote_peer.as_str();
            let (class, percentage) = match tentative.get(peer_id) {
                Some(Tentative::Inbound(share)) => (FlowClass::Inbound, Some(share.percentage)),
                Some(Tentative::Outbound(share)) => (FlowClass::Outbound, Some(share.percentage)),
                Some(Tentative::Balanced(share)) => (FlowClass::Balanced, Some(share.percentage)),
                None => self.backfill(channel, peer_names.get(peer_id).copied()),
            };

            let name = peer_names
                .get(peer_id)
                .copied()
                .unwrap_or(peer_id)
                .to_string();

            result.bucket_mut(class).push(ClassifiedChannel {
                channel_id: channel.id.clone(),
                peer_id: channel.remote_peer.clone(),
                name,
                age_secs: channel.lifetime_secs,
                percentage,
            });
        }

        result
            .inbound
            .sort_by(|a, b| b.percentage.cmp(&a.percentage));
        result
            .outbound
            .sort_by(|a, b| b.percentage.cmp(&a.percentage));

        info!(
            inbound = result.inbound.len(),
            outbound = result.outbound.len(),
            balanced = result.balanced.len(),
            skipped = result.skipped.len(),
            "classified channels"
        );

        result
    }

    fn classify_peers<'a>(
        &self,
        shares: &'a FlowShares,
        now: DateTime<Utc>,
    ) -> BTreeMap<&'a str, Tentative<'a>> {
        let mut tentative: BTreeMap<&str, Tentative> = BTreeMap::new();

        for share in shares.inbound.values() {
            if share.percentage >= self.threshold_pct {
                tentative.insert(&share.peer_id, Tentative::Inbound(share));
            } else if self.in_grace(share, now) {
                tentative.insert(&share.peer_id, Tentative::Balanced(share));
            }
        }

        for share in shares.outbound.values() {
            let current = tentative.get(share.peer_id.as_str()).copied();
            if share.percentage >= self.threshold_pct {
                match current {
                    Some(Tentative::Inbound(inbound)) if share.sum_sat <= inbound.sum_sat => {
                        debug!(
                            peer = %share.name,
                            inbound_sat = inbound.sum_sat,
                            outbound_sat = share.sum_sat,
                            "peer qualifies both ways, inbound volume wins"
                        );
                    }
                    _ => {
                        tentative.insert(&share.peer_id, Tentative::Outbound(share));
                    }
                }
            } else if self.in_grace(share, now) {
                match current {
                    Some(Tentative::Inbound(_)) | Some(Tentative::Outbound(_)) => {}
                    _ => {
                        tentative.insert(&share.peer_id, Tentative::Balanced(share));
                    }
                }
            }
        }

        tentative
    }

    // Below threshold but too young to judge, and not a known outlier
    fn in_grace(&self, share: &Share, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(share.since) < self.young_window
            && !self.exclusions.is_excluded(&share.peer_id, &share.name)
    }

    fn backfill(&self, channel: &Channel, name: Option<&str>) -> (FlowClass, Option<u32>) {
        let name = name.unwrap_or(channel.remote_peer.as_str());
        if self.exclusions.is_excluded(&channel.remote_peer, name) {
            (FlowClass::Outbound, Some(0))
        } else if channel.capacity_sat < self.min_capacity_sat {
            (FlowClass::Skipped, None)
        } else {
            (FlowClass::Balanced, None)
        }
    }
}
