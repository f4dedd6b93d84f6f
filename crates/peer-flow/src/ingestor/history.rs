use crate::types::{
    Channel, Direction, ForwardingEvent, ForwardingHistory, ForwardingRecord, PeerId,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Fold raw forwarding events from the trailing `window_days` into one
/// record per peer and direction.
///
/// A record's `since` is the open time of the oldest channel with the peer,
/// or `now` when no channel with the peer remains.
pub fn summarize_events(
    events: &[ForwardingEvent],
    channels: &[Channel],
    window_days: u64,
    now: DateTime<Utc>,
) -> ForwardingHistory {
    let window = i64::try_from(window_days)
        .ok()
        .and_then(TimeDelta::try_days)
        .unwrap_or(TimeDelta::MAX);
    let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut oldest: HashMap<&str, u64> = HashMap::new();
    for channel in channels {
        let age = oldest.entry(channel.remote_peer.as_str()).or_default();
        *age = (*age).max(channel.lifetime_secs);
    }

    let mut inbound: BTreeMap<&str, u64> = BTreeMap::new();
    let mut outbound: BTreeMap<&str, u64> = BTreeMap::new();
    let mut in_window = 0usize;

    for event in events.iter().filter(|e| e.timestamp >= cutoff) {
        in_window += 1;
        let sum = inbound.entry(event.incoming_peer.as_str()).or_default();
        *sum = sum.saturating_add(event.amount_sat);
        let sum = outbound.entry(event.outgoing_peer.as_str()).or_default();
        *sum = sum.saturating_add(event.amount_sat);
    }

    debug!(
        total = events.len(),
        in_window, window_days, "summarized forwarding events"
    );

    let since = |peer: &str| -> DateTime<Utc> {
        oldest
            .get(peer)
            .and_then(|secs| i64::try_from(*secs).ok())
            .and_then(TimeDelta::try_seconds)
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(now)
    };

    let records = |sums: BTreeMap<&str, u64>, direction: Direction| -> Vec<ForwardingRecord> {
        sums.into_iter()
            .map(|(peer, sum_sat)| ForwardingRecord {
                peer_id: PeerId::from(peer),
                direction,
                sum_sat,
                since: since(peer),
            })
            .collect()
    };

    ForwardingHistory {
        inbound: records(inbound, Direction::Inbound),
        outbound: records(outbound, Direction::Outbound),
    }
}
