use crate::{
    processor::{
        classify::{Classification, FlowClass},
        fees::rebalance_margin,
    },
    types::{Peer, PeerFees},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tabled::{Table, Tabled, settings::Style};

const INACTIVE_MARK: &str = "💀 ";

/// Peer-level view of one classification bucket
#[derive(Debug, Clone, PartialEq, Eq, Tabled, Serialize, Deserialize)]
pub struct PeerRow {
    pub name: String,
    #[tabled(rename = "in", display = "display_sat")]
    pub inbound_sat: u64,
    #[tabled(rename = "out", display = "display_sat")]
    pub outbound_sat: u64,
    #[tabled(rename = "p(%)", display = "display_optional")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u32>,
    #[tabled(display = "display_optional")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ppm: Option<i64>,
    #[tabled(display = "display_optional")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerReport {
    /// Every peer, least inbound liquidity first
    pub all: Vec<PeerRow>,
    /// Highest inbound share first, with local fee rate
    pub inbound: Vec<PeerRow>,
    /// Highest outbound share first, with local fee rate and rebalance margin
    pub outbound: Vec<PeerRow>,
    /// Least outbound liquidity first, with local fee rate
    pub balanced: Vec<PeerRow>,
    /// Least outbound liquidity first
    pub skipped: Vec<PeerRow>,
}

fn display_sat(sat: &u64) -> String {
    with_commas(*sat)
}

fn display_optional<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default()
}

pub fn with_commas(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Render rows the way every CLI table is rendered
pub fn print_table<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    Table::new(rows)
        .with(Style::psql().remove_horizontals())
        .to_string()
}

/// Group a channel classification by peer and attach fee data.
///
/// A peer shows up in every bucket that holds one of its channels. Peers
/// without a fee entry get no ppm or margin.
pub fn build_report(classification: &Classification, peers: &[Peer], fees: &[PeerFees]) -> PeerReport {
    let fee_map: HashMap<&str, &PeerFees> = fees.iter().map(|f| (f.peer_id.as_str(), f)).collect();

    let bucket_rows = |class: FlowClass| -> Vec<PeerRow> {
        let mut percentages: HashMap<&str, Option<u32>> = HashMap::new();
        for channel in classification.bucket(class) {
            percentages
                .entry(channel.peer_id.as_str())
                .or_insert(channel.percentage);
        }

        peers
            .iter()
            .filter_map(|peer| {
                let percentage = *percentages.get(peer.id.as_str())?;
                let fee = fee_map.get(peer.id.as_str());
                let mut row = row_for(peer);
                match class {
                    FlowClass::Inbound => {
                        row.percentage = Some(percentage.unwrap_or(0));
                        row.ppm = fee.map(|f| f.local.rate_ppm);
                    }
                    FlowClass::Outbound => {
                        row.percentage = Some(percentage.unwrap_or(0));
                        row.ppm = fee.map(|f| f.local.rate_ppm);
                        row.margin = fee.map(|f| rebalance_margin(&f.local, &f.remote));
                    }
                    FlowClass::Balanced => {
                        row.ppm = fee.map(|f| f.local.rate_ppm);
                    }
                    FlowClass::Skipped => {}
                }
                Some(row)
            })
            .collect()
    };

    let mut all: Vec<PeerRow> = peers.iter().map(row_for).collect();
    all.sort_by_key(|r| r.inbound_sat);

    let mut inbound = bucket_rows(FlowClass::Inbound);
    inbound.sort_by(|a, b| b.percentage.cmp(&a.percentage));

    let mut outbound = bucket_rows(FlowClass::Outbound);
    outbound.sort_by(|a, b| b.percentage.cmp(&a.percentage));

    let mut balanced = bucket_rows(FlowClass::Balanced);
    balanced.sort_by_key(|r| r.outbound_sat);

    let mut skipped = bucket_rows(FlowClass::Skipped);
    skipped.sort_by_key(|r| r.outbound_sat);

    PeerReport {
        all,
        inbound,
        outbound,
        balanced,
        skipped,
    }
}

fn row_for(peer: &Peer) -> PeerRow {
    let name = if peer.active {
        peer.name.clone()
    } else {
        format!("{INACTIVE_MARK}{}", peer.name)
    };
    PeerRow {
        name,
        inbound_sat: peer.inbound_liquidity_sat,
        outbound_sat: peer.outbound_liquidity_sat,
        percentage: None,
        ppm: None,
        margin: None,
    }
}
