pub mod validation;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};
use validation::validate_config;

const ENV_PREFIX: &str = "PEER_FLOW";

/// Main settings configuration for peer-flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level for application logging (e.g., "info", "debug", "warn", "error")
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Flow classification thresholds and exceptions
    #[serde(default)]
    pub classifier: ClassifierSettings,
    /// Active rebalance job reconstruction
    #[serde(default)]
    pub jobs: JobSettings,
    /// Throttled notification delivery
    #[serde(default)]
    pub notifier: NotifierSettings,
    /// Where node data is read from
    #[serde(default)]
    pub source: SourceSettings,
    /// Memorable tag -> peer id, consulted before name matching
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Flow classification parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Minimum share of a direction's volume (percent) for a peer to count
    /// as a flow peer in that direction
    pub share_threshold_pct: u32,
    /// Peers younger than this are treated as balanced when below threshold
    pub young_relationship_days: u64,
    /// Trailing forwarding-history window
    pub history_days: u64,
    /// Channels smaller than this are skipped unless history says otherwise
    pub min_capacity_sat: u64,
    /// Display-name substrings marking known large liquidity providers
    pub excluded_name_patterns: Vec<String>,
    /// Peer ids treated the same as an excluded name
    pub excluded_peer_ids: Vec<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            share_threshold_pct: 2,
            young_relationship_days: 7,
            history_days: 7,
            min_capacity_sat: 1_000_000,
            excluded_name_patterns: vec!["LNBIG.com".to_string()],
            excluded_peer_ids: vec![],
        }
    }
}

/// Process-table parsing of running rebalances
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Substring identifying a rebalance invocation in the process table
    pub marker: String,
    /// Directory holding per-job rebalance logs
    pub log_dir: PathBuf,
    /// Maximum length of each endpoint label in a log file name
    pub log_name_max_len: usize,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            marker: "/bos rebalance".to_string(),
            log_dir: PathBuf::from("/tmp"),
            log_name_max_len: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierSettings {
    /// File holding the last-sent timestamp per category
    pub state_file: PathBuf,
    /// Minimum seconds between two messages of the same category
    pub interval_seconds: u64,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("/var/lib/peer-flow/notifier.json"),
            interval_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// JSON snapshot of peers, channels, forwards and fees
    pub snapshot_path: PathBuf,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("snapshot.json"),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            classifier: ClassifierSettings::default(),
            jobs: JobSettings::default(),
            notifier: NotifierSettings::default(),
            source: SourceSettings::default(),
            tags: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from a specific config file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Env vars take priority over the file
        let settings = ConfigBuilder::builder()
            .add_source(File::with_name(&path.as_ref().to_string_lossy()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        validate_config(&settings)?;

        Ok(settings)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // NOTE: It's ok if this fails (file might not exist)
        let _ = dotenvy::dotenv();

        let settings: Settings = ConfigBuilder::builder()
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        validate_config(&settings)?;

        Ok(settings)
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings {{\n\
             \tLog Level: {}\n\
             \tShare Threshold: {}%\n\
             \tYoung Relationship: {} days\n\
             \tHistory Window: {} days\n\
             \tMin Capacity: {} sat\n\
             \tExcluded Names: {:?}\n\
             \tJob Marker: {}\n\
             \tSnapshot: {}\n\
             \tTags: {}\n\
             }}",
            self.log_level,
            self.classifier.share_threshold_pct,
            self.classifier.young_relationship_days,
            self.classifier.history_days,
            self.classifier.min_capacity_sat,
            self.classifier.excluded_name_patterns,
            self.jobs.marker,
            self.source.snapshot_path.display(),
            self.tags.len(),
        )
    }
}
