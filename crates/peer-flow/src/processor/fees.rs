use crate::types::FeeTerms;

/// Margin (ppm) left for a circular rebalance into a peer's channel. A
/// rebalance pays for itself as long as its fee rate stays below the margin;
/// a margin <= 0 means it never does at current fees.
///
/// round(local.base/1000 + local.rate - (remote.base/1000 + remote.rate)),
/// halves rounded up.
pub fn rebalance_margin(local: &FeeTerms, remote: &FeeTerms) -> i64 {
    let local = local.base_msat as f64 / 1000.0 + local.rate_ppm as f64;
    let remote = remote.base_msat as f64 / 1000.0 + remote.rate_ppm as f64;
    (local - remote + 0.5).floor() as i64
}

pub fn is_self_profitable(local: &FeeTerms, remote: &FeeTerms) -> bool {
    rebalance_margin(local, remote) > 0
}
