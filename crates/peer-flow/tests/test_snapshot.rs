mod common;

use chrono::{TimeDelta, Utc};
use common::{DAY, create_test_settings, peer};
use peer_flow::{
    ingestor::{
        process_table::FileProcessTable,
        source::{Snapshot, SnapshotSource},
    },
    monitor::Monitor,
    processor::classify::FlowClass,
    resolver::Resolution,
    types::{Channel, FeeTerms, ForwardingEvent, PeerFees},
};
use std::fs;
use tempfile::TempDir;

fn forward(hours_ago: i64, from: &str, to: &str, amount_sat: u64) -> ForwardingEvent {
    ForwardingEvent {
        timestamp: Utc::now() - TimeDelta::hours(hours_ago),
        incoming_peer: from.to_string(),
        outgoing_peer: to.to_string(),
        amount_sat,
    }
}

fn write_snapshot(dir: &TempDir) -> std::path::PathBuf {
    let mut kraken = peer("02aa", "Kraken 1");
    kraken.inbound_liquidity_sat = 4_000_000;
    kraken.outbound_liquidity_sat = 1_000_000;
    let mut dead = peer("02ee", "gone");
    dead.active = false;

    let snapshot = Snapshot {
        peers: vec![kraken, peer("02bb", "Kraken 2"), peer("03cc", "ACINQ"), dead],
        channels: vec![
            Channel {
                id: "800000x1x0".to_string(),
                remote_peer: "02aa".to_string(),
                capacity_sat: 5_000_000,
                lifetime_secs: 120 * DAY,
            },
            Channel {
                id: "800000x2x0".to_string(),
                remote_peer: "02bb".to_string(),
                capacity_sat: 5_000_000,
                lifetime_secs: 120 * DAY,
            },
            Channel {
                id: "800000x3x0".to_string(),
                remote_peer: "03cc".to_string(),
                capacity_sat: 10_000_000,
                lifetime_secs: 120 * DAY,
            },
            Channel {
                id: "800000x4x0".to_string(),
                remote_peer: "02ee".to_string(),
                capacity_sat: 200_000,
                lifetime_secs: 120 * DAY,
            },
        ],
        forwards: vec![
            forward(2, "02aa", "03cc", 400_000),
            forward(5, "02aa", "02bb", 100_000),
            // Outside the 7 day window
            forward(24 * 30, "03cc", "02aa", 9_000_000),
        ],
        fees: vec![PeerFees {
            peer_id: "03cc".to_string(),
            local: FeeTerms {
                base_msat: 1_000,
                rate_ppm: 100,
            },
            remote: FeeTerms {
                base_msat: 0,
                rate_ppm: 150,
            },
        }],
    };

    let path = dir.path().join("snapshot.json");
    fs::write(&path, serde_json::to_string_pretty(&snapshot).unwrap()).unwrap();
    path
}

fn monitor(path: &std::path::Path) -> Monitor<SnapshotSource> {
    let mut settings = create_test_settings();
    settings.source.snapshot_path = path.to_path_buf();
    Monitor::new(settings, SnapshotSource::new(path))
}

#[test]
fn test_classify_from_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_snapshot(&dir);

    let classification = monitor(&path).classify().unwrap();

    assert_eq!(classification.len(), 4);
    assert_eq!(classification.class_of("800000x1x0"), Some(FlowClass::Inbound));
    assert_eq!(classification.class_of("800000x3x0"), Some(FlowClass::Outbound));
    assert_eq!(classification.class_of("800000x2x0"), Some(FlowClass::Outbound));
    assert_eq!(classification.class_of("800000x4x0"), Some(FlowClass::Skipped));
    assert_eq!(classification.outbound[0].percentage, Some(80));
}

#[test]
fn test_peer_report_from_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_snapshot(&dir);

    let report = monitor(&path).peer_report().unwrap();

    assert_eq!(report.all.len(), 4);
    assert_eq!(report.all.last().unwrap().name, "Kraken 1");
    assert!(report.skipped.iter().any(|r| r.name == "💀 gone"));

    let acinq = report.outbound.iter().find(|r| r.name == "ACINQ").unwrap();
    assert_eq!(acinq.percentage, Some(80));
    assert_eq!(acinq.ppm, Some(100));
    assert_eq!(acinq.margin, Some(-49));
}

#[test]
fn test_resolve_and_jobs_from_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_snapshot(&dir);
    let monitor = monitor(&path);

    assert!(matches!(monitor.resolve("kraken").unwrap(), Resolution::Many(_)));
    assert!(matches!(monitor.resolve("acinq").unwrap(), Resolution::One(_)));

    let ps_path = dir.path().join("ps.txt");
    fs::write(
        &ps_path,
        "u 1 0 node /bos rebalance --out 02aa --in acinq --amount 50000 --max-fee-rate 250 --minutes 5\n",
    )
    .unwrap();

    let jobs = monitor.active_jobs(&FileProcessTable::new(&ps_path)).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].from.name, "Kraken 1");
    assert_eq!(jobs[0].to.name, "ACINQ");

    let missing = monitor
        .active_jobs(&FileProcessTable::new(dir.path().join("missing.txt")))
        .unwrap();
    assert!(missing.is_empty());
}

#[test]
fn test_jobs_carry_last_log_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_snapshot(&dir);

    let mut settings = create_test_settings();
    settings.source.snapshot_path = path.clone();
    settings.jobs.log_dir = dir.path().to_path_buf();
    let monitor = Monitor::new(settings, SnapshotSource::new(&path));

    fs::write(
        dir.path().join("rebalance_acinq_Kraken2.log"),
        "probing 02bb\nrebalanced 80000 at 310 ppm\n\n",
    )
    .unwrap();

    let ps_path = dir.path().join("ps.txt");
    fs::write(
        &ps_path,
        "u 1 0 node /bos rebalance --out acinq --in 02bb --amount 80000 --max-fee-rate 0 --minutes 5\n\
         u 2 0 node /bos rebalance --out acinq --in 02aa --amount 10000 --max-fee-rate 100 --minutes 5\n",
    )
    .unwrap();

    let jobs = monitor.active_jobs(&FileProcessTable::new(&ps_path)).unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].max_fee_rate_ppm, 0);
    assert_eq!(
        jobs[0].last_log_line.as_deref(),
        Some("rebalanced 80000 at 310 ppm")
    );
    // No log written yet for the second job
    assert_eq!(jobs[1].last_log_line, None);
}
