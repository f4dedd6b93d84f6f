use crate::{
    resolver::{Resolution, TagTable, resolve},
    settings::JobSettings,
    types::{Peer, PeerRef},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tabled::Tabled;
use thiserror::Error;
use tracing::{debug, warn};

pub const FROM_FLAG: &str = "--out";
pub const TO_FLAG: &str = "--in";
pub const AMOUNT_FLAG: &str = "--amount";
pub const FEE_RATE_FLAG: &str = "--max-fee-rate";
pub const MINUTES_FLAG: &str = "--minutes";

/// A rebalance currently running on the node
#[derive(Debug, Clone, PartialEq, Eq, Tabled, Serialize, Deserialize)]
pub struct ActiveJob {
    #[tabled(display = "display_peer")]
    pub from: PeerRef,
    #[tabled(display = "display_peer")]
    pub to: PeerRef,
    #[tabled(rename = "amount(sat)")]
    pub amount_sat: u64,
    #[tabled(rename = "max_fee(ppm)")]
    pub max_fee_rate_ppm: u64,
    #[tabled(rename = "mins")]
    pub minutes: u64,
    #[tabled(rename = "log", display = "display_path")]
    pub log_path: PathBuf,
    /// Last non-empty line of the job's log, filled in after the scan
    #[tabled(rename = "last log", display = "display_log_line")]
    #[serde(default)]
    pub last_log_line: Option<String>,
}

fn display_peer(peer: &PeerRef) -> String {
    peer.name.clone()
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

fn display_log_line(line: &Option<String>) -> String {
    line.as_deref().unwrap_or("-").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobLineError {
    #[error("missing {0}")]
    MissingFlag(&'static str),
    #[error("couldn't resolve {flag} '{token}' into a peer")]
    Unresolved { flag: &'static str, token: String },
    #[error("{flag} '{token}' matches several peers: {}", candidates.join(", "))]
    Ambiguous {
        flag: &'static str,
        token: String,
        candidates: Vec<String>,
    },
    #[error("{flag} '{value}' is not an integer")]
    InvalidNumber { flag: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    pub line: String,
    pub reason: JobLineError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobScan {
    pub jobs: Vec<ActiveJob>,
    pub rejected: Vec<RejectedLine>,
}

/// Rebuild the running rebalances from process-table text.
pub fn reconstruct_active_jobs(
    process_table: &str,
    peers: &[Peer],
    tags: &TagTable,
    settings: &JobSettings,
) -> Vec<ActiveJob> {
    scan_active_jobs(process_table, peers, tags, settings).jobs
}

/// Like [`reconstruct_active_jobs`], also returning the lines that looked
/// like rebalances but could not be parsed. Each rejection is logged.
pub fn scan_active_jobs(
    process_table: &str,
    peers: &[Peer],
    tags: &TagTable,
    settings: &JobSettings,
) -> JobScan {
    let mut scan = JobScan::default();

    for line in process_table
        .lines()
        .map(str::trim)
        .filter(|l| is_invocation(l, &settings.marker))
    {
        match parse_job(line, peers, tags, settings) {
            Ok(job) => {
                debug!(from = %job.from.name, to = %job.to.name, amount = job.amount_sat, "found active rebalance");
                scan.jobs.push(job);
            }
            Err(reason) => {
                warn!(%reason, line, "skipping rebalance process line");
                scan.rejected.push(RejectedLine {
                    line: line.to_string(),
                    reason,
                });
            }
        }
    }

    scan
}

fn is_invocation(line: &str, marker: &str) -> bool {
    // Drop the search command itself, e.g. `grep /bos rebalance`
    line.contains(marker)
        && !line
            .split_whitespace()
            .any(|token| token == "grep" || token.ends_with("/grep"))
}

fn parse_job(
    line: &str,
    peers: &[Peer],
    tags: &TagTable,
    settings: &JobSettings,
) -> Result<ActiveJob, JobLineError> {
    let from = parse_peer(line, FROM_FLAG, peers, tags)?;
    let to = parse_peer(line, TO_FLAG, peers, tags)?;
    let amount_sat = parse_count(line, AMOUNT_FLAG)?;
    let max_fee_rate_ppm = parse_count(line, FEE_RATE_FLAG)?;
    let minutes = parse_count(line, MINUTES_FLAG)?;

    let log_path = log_path_for(&from, &to, tags, settings);

    Ok(ActiveJob {
        from,
        to,
        amount_sat,
        max_fee_rate_ppm,
        minutes,
        log_path,
        last_log_line: None,
    })
}

fn parse_peer(
    line: &str,
    flag: &'static str,
    peers: &[Peer],
    tags: &TagTable,
) -> Result<PeerRef, JobLineError> {
    let token = flag_value(line, flag).ok_or(JobLineError::MissingFlag(flag))?;
    match resolve(token, peers, tags) {
        Resolution::One(peer) => Ok(peer),
        Resolution::None => Err(JobLineError::Unresolved {
            flag,
            token: token.to_string(),
        }),
        Resolution::Many(candidates) => Err(JobLineError::Ambiguous {
            flag,
            token: token.to_string(),
            candidates: candidates.into_iter().map(|p| p.name).collect(),
        }),
    }
}

fn parse_count(line: &str, flag: &'static str) -> Result<u64, JobLineError> {
    let value = flag_value(line, flag).ok_or(JobLineError::MissingFlag(flag))?;
    value.parse::<u64>().map_err(|_| JobLineError::InvalidNumber {
        flag,
        value: value.to_string(),
    })
}

/// Text following `flag` up to the next flag token or end of line.
///
/// `flag` must be a whole whitespace-delimited token (`--in` does not match
/// `--invoice`) and may carry its value as `--flag=value`.
pub fn flag_value<'l>(line: &'l str, flag: &str) -> Option<&'l str> {
    let mut from = 0;
    while let Some(pos) = line[from..].find(flag) {
        let start = from + pos;
        let end = start + flag.len();
        from = end;

        if start == 0 || !line[..start].ends_with(char::is_whitespace) {
            continue;
        }

        let rest = &line[end..];
        let rest = match rest.strip_prefix('=') {
            Some(value) => value,
            None if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest,
            None => continue,
        };

        let cut = rest
            .match_indices("--")
            .map(|(i, _)| i)
            .find(|&i| i > 0 && rest[..i].ends_with(char::is_whitespace))
            .unwrap_or(rest.len());

        let value = rest[..cut]
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim();
        return (!value.is_empty()).then_some(value);
    }
    None
}

fn log_path_for(from: &PeerRef, to: &PeerRef, tags: &TagTable, settings: &JobSettings) -> PathBuf {
    let from = log_label(from, tags, settings.log_name_max_len);
    let to = log_label(to, tags, settings.log_name_max_len);
    settings.log_dir.join(format!("rebalance_{from}_{to}.log"))
}

// Tag if the peer has one, else its name; identifier chars only
fn log_label(peer: &PeerRef, tags: &TagTable, max_len: usize) -> String {
    let label = sanitize(tags.tag_for(&peer.id).unwrap_or(&peer.name), max_len);
    if label.is_empty() {
        sanitize(&peer.id, max_len)
    } else {
        label
    }
}

fn sanitize(s: &str, max_len: usize) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(max_len)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn peer(id: &str, name: &str) -> Peer {
        Peer {
            id: id.to_string(),
            name: name.to_string(),
            active: true,
            inbound_liquidity_sat: 0,
            outbound_liquidity_sat: 0,
        }
    }

    fn peers() -> Vec<Peer> {
        vec![
            peer("02aa", "Kraken 1"),
            peer("02bb", "Kraken 2"),
            peer("03cc", "ACINQ"),
            peer("03dd", "⚡ WalletOfSatoshi.com ⚡"),
        ]
    }

    fn tags() -> TagTable {
        let mut map = BTreeMap::new();
        map.insert("wos".to_string(), "03dd".to_string());
        TagTable::new(&map)
    }

    const GOOD: &str = "umbrel 4242 1 0 10:01 ? 00:00:03 node /home/umbrel/.npm-global/bin/bos rebalance --out acinq --in wos --amount 500000 --max-fee-rate 250 --minutes 30";

    #[test]
    fn test_flag_value_extraction() {
        assert_eq!(flag_value(GOOD, "--out"), Some("acinq"));
        assert_eq!(flag_value(GOOD, "--in"), Some("wos"));
        assert_eq!(flag_value(GOOD, "--minutes"), Some("30"));
        assert_eq!(flag_value(GOOD, "--avoid"), None);
    }

    #[test]
    fn test_flag_value_multi_word_and_equals() {
        let line = "x bos rebalance --out Kraken 1 --in=wos --amount 10";
        assert_eq!(flag_value(line, "--out"), Some("Kraken 1"));
        assert_eq!(flag_value(line, "--in"), Some("wos"));
    }

    #[test]
    fn test_flag_value_whole_tokens_only() {
        let line = "x bos rebalance --invoice abc --in wos";
        assert_eq!(flag_value(line, "--in"), Some("wos"));
        assert_eq!(flag_value("--in wos", "--in"), None);
        assert_eq!(flag_value("x --in --amount 5", "--in"), None);
    }

    #[test]
    fn test_flag_value_keeps_inner_dashes() {
        let line = "x bos rebalance --out node--one --in wos";
        assert_eq!(flag_value(line, "--out"), Some("node--one"));
    }

    #[test]
    fn test_reconstructs_job() {
        let jobs = reconstruct_active_jobs(GOOD, &peers(), &tags(), &JobSettings::default());
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.from.id, "03cc");
        assert_eq!(job.to.id, "03dd");
        assert_eq!(job.amount_sat, 500_000);
        assert_eq!(job.max_fee_rate_ppm, 250);
        assert_eq!(job.minutes, 30);
        assert_eq!(job.log_path, PathBuf::from("/tmp/rebalance_ACINQ_wos.log"));
        assert_eq!(job.last_log_line, None);
    }

    #[test]
    fn test_zero_values_are_kept() {
        let line = "node /bin/bos rebalance --out acinq --in wos --amount 50000 --max-fee-rate 0 --minutes 0";
        let scan = scan_active_jobs(line, &peers(), &tags(), &JobSettings::default());
        assert!(scan.rejected.is_empty());
        assert_eq!(scan.jobs.len(), 1);
        assert_eq!(scan.jobs[0].max_fee_rate_ppm, 0);
        assert_eq!(scan.jobs[0].minutes, 0);
    }

    #[test]
    fn test_skips_grep_reflection_and_unrelated_lines() {
        let table = format!(
            "UID PID PPID C STIME TTY TIME CMD\n\
             umbrel 999 1 0 10:00 pts/0 00:00:00 grep /bos rebalance\n\
             umbrel 1 0 0 09:00 ? 00:00:10 /sbin/init\n\
             {GOOD}\n"
        );
        let scan = scan_active_jobs(&table, &peers(), &tags(), &JobSettings::default());
        assert_eq!(scan.jobs.len(), 1);
        assert!(scan.rejected.is_empty());
    }

    #[test]
    fn test_rejections() {
        let settings = JobSettings::default();
        let cases = [
            (
                "bos rebalance --out kraken --in wos --amount 1 --max-fee-rate 1 --minutes 1",
                JobLineError::Ambiguous {
                    flag: FROM_FLAG,
                    token: "kraken".to_string(),
                    candidates: vec!["Kraken 1".to_string(), "Kraken 2".to_string()],
                },
            ),
            (
                "bos rebalance --out acinq --in bitfinex --amount 1 --max-fee-rate 1 --minutes 1",
                JobLineError::Unresolved {
                    flag: TO_FLAG,
                    token: "bitfinex".to_string(),
                },
            ),
            (
                "bos rebalance --out acinq --in wos --amount lots --max-fee-rate 1 --minutes 1",
                JobLineError::InvalidNumber {
                    flag: AMOUNT_FLAG,
                    value: "lots".to_string(),
                },
            ),
            (
                "bos rebalance --out acinq --in wos --amount 5 --max-fee-rate -1 --minutes 1",
                JobLineError::InvalidNumber {
                    flag: FEE_RATE_FLAG,
                    value: "-1".to_string(),
                },
            ),
            (
                "bos rebalance --out acinq --in wos --amount 5 --max-fee-rate 5",
                JobLineError::MissingFlag(MINUTES_FLAG),
            ),
        ];

        for (line, expected) in cases {
            let text = format!("node /bin/{line}");
            let scan = scan_active_jobs(&text, &peers(), &tags(), &settings);
            assert!(scan.jobs.is_empty(), "{line}");
            assert_eq!(scan.rejected.len(), 1, "{line}");
            assert_eq!(scan.rejected[0].reason, expected, "{line}");
        }
    }

    #[test]
    fn test_log_label_fallbacks() {
        let emoji_only = PeerRef {
            id: "02abcdef0123456789abcdef".to_string(),
            name: "⚡⚡⚡".to_string(),
        };
        assert_eq!(log_label(&emoji_only, &tags(), 15), "02abcdef0123456");

        let wos = PeerRef {
            id: "03dd".to_string(),
            name: "⚡ WalletOfSatoshi.com ⚡".to_string(),
        };
        assert_eq!(log_label(&wos, &TagTable::default(), 15), "WalletOfSatoshi");
        assert_eq!(log_label(&wos, &tags(), 15), "wos");
    }

    #[test]
    fn test_empty_table() {
        let scan = scan_active_jobs("", &peers(), &tags(), &JobSettings::default());
        assert_eq!(scan, JobScan::default());
    }
}
