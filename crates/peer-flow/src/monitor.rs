use crate::{
    Result,
    ingestor::{
        logs::{FsLogReader, LogReader},
        process_table::ProcessTable,
        source::{NodeSource, NodeView},
    },
    processor::{
        classify::{Classification, Classifier},
        fees::rebalance_margin,
        jobs::{ActiveJob, JobScan, scan_active_jobs},
    },
    report::{PeerReport, build_report},
    resolver::{Resolution, TagTable, resolve},
    settings::Settings,
    types::{Peer, PeerFees},
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

pub const MARGIN_CATEGORY: &str = "margin";
pub const JOBS_CATEGORY: &str = "jobs";

/// Message the watch loop should deliver, throttled by `category`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub category: String,
    pub message: String,
}

pub struct Monitor<S> {
    settings: Settings,
    source: S,
    classifier: Classifier,
    tags: TagTable,
    logs: Box<dyn LogReader + Send + Sync>,
}

impl<S: NodeSource> Monitor<S> {
    pub fn new(settings: Settings, source: S) -> Self {
        let classifier = Classifier::from_settings(&settings.classifier);
        let tags = TagTable::new(&settings.tags);
        Self {
            settings,
            source,
            classifier,
            tags,
            logs: Box::new(FsLogReader),
        }
    }

    /// Replace the reader used to fill in each job's last log line
    pub fn with_log_reader<L>(mut self, logs: L) -> Self
    where
        L: LogReader + Send + Sync + 'static,
    {
        self.logs = Box::new(logs);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    pub fn load_view(&self) -> Result<NodeView> {
        let view = self
            .source
            .node_view(self.settings.classifier.history_days)?;
        debug!(
            peers = view.peers.len(),
            channels = view.channels.len(),
            inbound_records = view.history.inbound.len(),
            outbound_records = view.history.outbound.len(),
            "loaded node view"
        );
        Ok(view)
    }

    pub fn classify(&self) -> Result<Classification> {
        let view = self.load_view()?;
        Ok(self.classify_view(&view))
    }

    pub fn classify_view(&self, view: &NodeView) -> Classification {
        self.classifier
            .classify(&view.history, &view.channels, &view.peers)
    }

    pub fn peer_report(&self) -> Result<PeerReport> {
        let view = self.load_view()?;
        let classification = self.classify_view(&view);
        Ok(build_report(&classification, &view.peers, &view.fees))
    }

    /// Running rebalances, each with the last line of its log, plus the
    /// lines that could not be parsed. An unreadable process table is
    /// logged and yields an empty scan.
    pub fn scan_jobs(&self, table: &dyn ProcessTable) -> Result<JobScan> {
        let peers = self.source.list_peers()?;
        let mut scan = self.scan_jobs_with(table, &peers);
        for job in &mut scan.jobs {
            job.last_log_line = match self.logs.last_line(&job.log_path) {
                Ok(line) => line,
                Err(e) => {
                    warn!(path = %job.log_path.display(), "Failed to read rebalance log: {}", e);
                    None
                }
            };
        }
        Ok(scan)
    }

    pub fn active_jobs(&self, table: &dyn ProcessTable) -> Result<Vec<ActiveJob>> {
        Ok(self.scan_jobs(table)?.jobs)
    }

    fn scan_jobs_with(&self, table: &dyn ProcessTable, peers: &[Peer]) -> JobScan {
        match table.snapshot() {
            Ok(text) => scan_active_jobs(&text, peers, &self.tags, &self.settings.jobs),
            Err(e) => {
                warn!("Process table unavailable, reporting no jobs: {}", e);
                JobScan::default()
            }
        }
    }

    pub fn resolve(&self, token: &str) -> Result<Resolution> {
        let peers = self.source.list_peers()?;
        Ok(resolve(token, &peers, &self.tags))
    }

    /// One watch pass: alerts for outbound peers that can't be rebalanced
    /// profitably and for unparseable rebalance lines.
    pub fn check(&self, table: &dyn ProcessTable) -> Result<Vec<Alert>> {
        let view = self.load_view()?;
        let classification = self.classify_view(&view);
        let scan = self.scan_jobs_with(table, &view.peers);

        let mut alerts = unprofitable_outbound(&classification, &view.fees);
        if !scan.rejected.is_empty() {
            let lines: Vec<String> = scan
                .rejected
                .iter()
                .map(|r| format!("{} ({})", r.line, r.reason))
                .collect();
            alerts.push(Alert {
                category: JOBS_CATEGORY.to_string(),
                message: format!(
                    "{} rebalance line(s) could not be parsed:\n{}",
                    lines.len(),
                    lines.join("\n")
                ),
            });
        }

        info!(
            channels = classification.len(),
            jobs = scan.jobs.len(),
            alerts = alerts.len(),
            "watch pass complete"
        );
        Ok(alerts)
    }
}

fn unprofitable_outbound(classification: &Classification, fees: &[PeerFees]) -> Vec<Alert> {
    let fee_map: HashMap<&str, &PeerFees> = fees.iter().map(|f| (f.peer_id.as_str(), f)).collect();
    let mut seen = HashSet::new();

    classification
        .outbound
        .iter()
        .filter(|c| seen.insert(c.peer_id.as_str()))
        .filter_map(|c| {
            let fee = fee_map.get(c.peer_id.as_str())?;
            let margin = rebalance_margin(&fee.local, &fee.remote);
            (margin <= 0).then(|| Alert {
                category: format!("{MARGIN_CATEGORY}:{}", c.peer_id),
                message: format!(
                    "Outbound peer {} has rebalance margin {} ppm (local {} ppm, remote {} ppm)",
                    c.name, margin, fee.local.rate_ppm, fee.remote.rate_ppm
                ),
            })
        })
        .collect()
}
