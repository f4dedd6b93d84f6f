use crate::cli::common::{Exportable, OutputFormat, export_sections};
use anyhow::{Context, Result};
use clap::Subcommand;
use peer_flow::{
    ingestor::{
        process_table::{FileProcessTable, ProcessTable, PsProcessTable},
        source::NodeSource,
    },
    monitor::Monitor,
    processor::{
        fees::{is_self_profitable, rebalance_margin},
        jobs::ActiveJob,
    },
    types::FeeTerms,
};
use std::path::PathBuf;
use tracing::info;

/// Lookups against the live node
#[derive(Subcommand, Debug)]
pub enum LookupCommands {
    #[command(
        about = "List the rebalances currently running on this host",
        after_help = r#"Examples:
    # Read the live process table
    peer-flow jobs

    # Replay a captured `ps -ef` listing
    peer-flow jobs --process-table ps.txt --format json"#
    )]
    Jobs {
        /// Read the process listing from a file instead of running `ps -ef`
        #[arg(long, value_name = "FILE")]
        process_table: Option<PathBuf>,

        #[arg(short = 'f', long, default_value = "table")]
        format: OutputFormat,
    },

    #[command(
        about = "Resolve a peer id, tag or partial name to a single peer",
        after_help = r#"Examples:
    peer-flow resolve acinq
    peer-flow resolve 03864ef025fde8fb587d989186ce6a4a186895ee44a926bfc370e2c366597a3f8f"#
    )]
    Resolve {
        /// Peer id, configured tag or case-insensitive part of the name
        token: String,
    },

    #[command(
        about = "Compute the circular rebalance margin for a fee pair",
        after_help = r#"Examples:
    # Local 100 ppm, remote 150 ppm: margin -50
    peer-flow margin --local-rate 100 --remote-rate 150"#
    )]
    Margin {
        /// Local base fee (msat)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        local_base: i64,
        /// Local fee rate (ppm)
        #[arg(long, allow_negative_numbers = true)]
        local_rate: i64,
        /// Remote base fee (msat)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        remote_base: i64,
        /// Remote fee rate (ppm)
        #[arg(long, allow_negative_numbers = true)]
        remote_rate: i64,
    },
}

impl Exportable for Vec<ActiveJob> {
    fn export(&self, format: OutputFormat) -> Result<String> {
        export_sections(self, &[("active rebalances", self.as_slice())], format)
    }
}

pub fn handle<S: NodeSource>(monitor: &Monitor<S>, cmd: LookupCommands) -> Result<()> {
    match cmd {
        LookupCommands::Jobs {
            process_table,
            format,
        } => {
            let table: Box<dyn ProcessTable> = match process_table {
                Some(path) => Box::new(FileProcessTable::new(path)),
                None => Box::new(PsProcessTable),
            };
            let scan = monitor.scan_jobs(table.as_ref())?;
            if !scan.rejected.is_empty() {
                info!(rejected = scan.rejected.len(), "some rebalance lines were skipped");
            }
            println!("{}", scan.jobs.export(format)?);
        }
        LookupCommands::Resolve { token } => {
            let peer = monitor
                .resolve(&token)?
                .into_unique(&token)
                .with_context(|| format!("Failed to resolve '{token}'"))?;
            println!("{}\t{}", peer.name, peer.id);
        }
        LookupCommands::Margin {
            local_base,
            local_rate,
            remote_base,
            remote_rate,
        } => {
            let local = FeeTerms {
                base_msat: local_base,
                rate_ppm: local_rate,
            };
            let remote = FeeTerms {
                base_msat: remote_base,
                rate_ppm: remote_rate,
            };
            let margin = rebalance_margin(&local, &remote);
            let verdict = if is_self_profitable(&local, &remote) {
                "rebalances below this fee rate pay for themselves"
            } else {
                "no rebalance into this peer pays for itself"
            };
            println!("margin: {margin} ppm ({verdict})");
        }
    }
    Ok(())
}
