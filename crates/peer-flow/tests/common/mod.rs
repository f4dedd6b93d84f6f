#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use peer_flow::{
    processor::classify::{Classifier, ExclusionPolicy},
    settings::Settings,
    types::{Channel, Direction, ForwardingHistory, ForwardingRecord, Peer},
};

pub const DAY: u64 = 86_400;

/// Fixed reference time for classification tests
pub fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_750_000_000, 0).unwrap()
}

pub fn peer(id: &str, name: &str) -> Peer {
    Peer {
        id: id.to_string(),
        name: name.to_string(),
        active: true,
        inbound_liquidity_sat: 0,
        outbound_liquidity_sat: 0,
    }
}

pub fn channel(id: &str, peer: &str, capacity_sat: u64, age_days: u64) -> Channel {
    Channel {
        id: id.to_string(),
        remote_peer: peer.to_string(),
        capacity_sat,
        lifetime_secs: age_days * DAY,
    }
}

/// Builder for forwarding history, one record per call
#[derive(Default)]
pub struct HistoryBuilder {
    history: ForwardingHistory,
}

impl HistoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inbound(mut self, peer: &str, sum_sat: u64, age_days: i64) -> Self {
        self.history
            .inbound
            .push(record(peer, Direction::Inbound, sum_sat, age_days));
        self
    }

    pub fn outbound(mut self, peer: &str, sum_sat: u64, age_days: i64) -> Self {
        self.history
            .outbound
            .push(record(peer, Direction::Outbound, sum_sat, age_days));
        self
    }

    pub fn build(self) -> ForwardingHistory {
        self.history
    }
}

fn record(peer: &str, direction: Direction, sum_sat: u64, age_days: i64) -> ForwardingRecord {
    ForwardingRecord {
        peer_id: peer.to_string(),
        direction,
        sum_sat,
        since: now() - TimeDelta::days(age_days),
    }
}

/// Classifier with the default thresholds
pub fn default_classifier() -> Classifier {
    Classifier::new(
        2,
        TimeDelta::days(7),
        1_000_000,
        ExclusionPolicy::new(vec!["LNBIG.com".to_string()], Vec::<String>::new()),
    )
}

pub fn create_test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.log_level = "debug".to_string();
    settings.tags.insert("acinq".to_string(), "03cc".to_string());
    settings
}
