use crate::types::{Direction, ForwardingHistory, ForwardingRecord, Peer, PeerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

// key: peer id
pub type ShareMap = BTreeMap<PeerId, Share>;

/// A peer's slice of the forwarded volume in one direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub peer_id: PeerId,
    pub name: String,
    pub direction: Direction,
    pub sum_sat: u64,
    /// round(100 * sum / direction total); 0 when the total is 0
    pub percentage: u32,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowShares {
    pub inbound: ShareMap,
    pub outbound: ShareMap,
    pub total_inbound_sat: u64,
    pub total_outbound_sat: u64,
}

impl FlowShares {
    pub fn get(&self, direction: Direction, peer_id: &str) -> Option<&Share> {
        match direction {
            Direction::Inbound => self.inbound.get(peer_id),
            Direction::Outbound => self.outbound.get(peer_id),
        }
    }
}

/// Compute per-peer percentage shares of inbound and outbound volume.
///
/// Repeated records for one peer and direction are merged (volumes summed,
/// earliest start kept). Names come from `peers`, falling back to the id.
pub fn aggregate(history: &ForwardingHistory, peers: &[Peer]) -> FlowShares {
    let names: HashMap<&str, &str> = peers
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str()))
        .collect();

    let (inbound, total_inbound_sat) = shares_for(Direction::Inbound, &history.inbound, &names);
    let (outbound, total_outbound_sat) =
        shares_for(Direction::Outbound, &history.outbound, &names);

    debug!(
        inbound_peers = inbound.len(),
        outbound_peers = outbound.len(),
        total_inbound_sat,
        total_outbound_sat,
        "aggregated forwarding shares"
    );

    FlowShares {
        inbound,
        outbound,
        total_inbound_sat,
        total_outbound_sat,
    }
}

fn shares_for(
    direction: Direction,
    records: &[ForwardingRecord],
    names: &HashMap<&str, &str>,
) -> (ShareMap, u64) {
    let mut merged: BTreeMap<&str, (u64, DateTime<Utc>)> = BTreeMap::new();
    for record in records {
        merged
            .entry(record.peer_id.as_str())
            .and_modify(|(sum, since)| {
                *sum = sum.saturating_add(record.sum_sat);
                *since = (*since).min(record.since);
            })
            .or_insert((record.sum_sat, record.since));
    }

    let total = merged
        .values()
        .fold(0u64, |acc, (sum, _)| acc.saturating_add(*sum));

    let shares = merged
        .into_iter()
        .map(|(peer_id, (sum_sat, since))| {
            let share = Share {
                peer_id: peer_id.to_string(),
                name: names.get(peer_id).unwrap_or(&peer_id).to_string(),
                direction,
                sum_sat,
                percentage: percentage_of(sum_sat, total),
                since,
            };
            (peer_id.to_string(), share)
        })
        .collect();

    (shares, total)
}

/// round(100 * part / total), halves rounded up; 0 for an empty total.
pub fn percentage_of(part: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    let part = u128::from(part);
    let total = u128::from(total);
    ((200 * part + total) / (2 * total)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn record(peer: &str, direction: Direction, sum: u64, since: i64) -> ForwardingRecord {
        ForwardingRecord {
            peer_id: peer.to_string(),
            direction,
            sum_sat: sum,
            since: at(since),
        }
    }

    fn peer(id: &str, name: &str) -> Peer {
        Peer {
            id: id.to_string(),
            name: name.to_string(),
            active: true,
            inbound_liquidity_sat: 0,
            outbound_liquidity_sat: 0,
        }
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage_of(1, 3), 33);
        assert_eq!(percentage_of(2, 3), 67);
        assert_eq!(percentage_of(1, 200), 1); // 0.5 rounds up
        assert_eq!(percentage_of(1, 201), 0);
        assert_eq!(percentage_of(10, 10), 100);
        assert_eq!(percentage_of(5, 0), 0);
    }

    #[test]
    fn test_shares_per_direction() {
        let history = ForwardingHistory {
            inbound: vec![
                record("a", Direction::Inbound, 750, 10),
                record("b", Direction::Inbound, 250, 10),
            ],
            outbound: vec![record("a", Direction::Outbound, 40, 10)],
        };
        let shares = aggregate(&history, &[peer("a", "alice")]);

        assert_eq!(shares.total_inbound_sat, 1000);
        assert_eq!(shares.inbound["a"].percentage, 75);
        assert_eq!(shares.inbound["a"].name, "alice");
        assert_eq!(shares.inbound["b"].percentage, 25);
        assert_eq!(shares.inbound["b"].name, "b");
        assert_eq!(shares.outbound["a"].percentage, 100);
        assert_eq!(shares.outbound["a"].direction, Direction::Outbound);
    }

    #[test]
    fn test_zero_total_direction() {
        let history = ForwardingHistory {
            inbound: vec![record("a", Direction::Inbound, 0, 10)],
            outbound: vec![],
        };
        let shares = aggregate(&history, &[]);
        assert_eq!(shares.inbound["a"].percentage, 0);
        assert!(shares.outbound.is_empty());
    }

    #[test]
    fn test_duplicate_records_merge() {
        let history = ForwardingHistory {
            inbound: vec![
                record("a", Direction::Inbound, 100, 50),
                record("a", Direction::Inbound, 100, 20),
                record("b", Direction::Inbound, 200, 10),
            ],
            outbound: vec![],
        };
        let shares = aggregate(&history, &[]);
        assert_eq!(shares.inbound.len(), 2);
        assert_eq!(shares.inbound["a"].sum_sat, 200);
        assert_eq!(shares.inbound["a"].since, at(20));
        assert_eq!(shares.inbound["a"].percentage, 50);
    }

    #[test]
    fn test_aggregation_is_repeatable() {
        let history = ForwardingHistory {
            inbound: vec![
                record("c", Direction::Inbound, 3, 1),
                record("a", Direction::Inbound, 7, 1),
            ],
            outbound: vec![record("b", Direction::Outbound, 9, 1)],
        };
        let peers = vec![peer("a", "alice"), peer("b", "bob")];
        let first = serde_json::to_vec(&aggregate(&history, &peers)).unwrap();
        let second = serde_json::to_vec(&aggregate(&history, &peers)).unwrap();
        assert_eq!(first, second);
    }
}
