use crate::cli::common::{Exportable, OutputFormat, export_sections};
use anyhow::Result;
use clap::Subcommand;
use peer_flow::{
    ingestor::source::NodeSource, monitor::Monitor, processor::classify::Classification,
    report::PeerReport,
};

/// Flow classification views
#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    #[command(
        about = "Classify every channel as inbound, outbound, balanced or skipped",
        after_help = r#"Examples:
    # Tables per bucket
    peer-flow classify

    # Machine-readable
    peer-flow classify --format json-pretty"#
    )]
    Classify {
        #[arg(short = 'f', long, default_value = "table")]
        format: OutputFormat,
    },

    #[command(
        about = "Per-peer liquidity, fee rate and rebalance margin by bucket",
        after_help = r#"Examples:
    peer-flow peers
    peer-flow peers --format json"#
    )]
    Peers {
        #[arg(short = 'f', long, default_value = "table")]
        format: OutputFormat,
    },
}

impl Exportable for Classification {
    fn export(&self, format: OutputFormat) -> Result<String> {
        export_sections(
            self,
            &[
                ("inbound", self.inbound.as_slice()),
                ("outbound", self.outbound.as_slice()),
                ("balanced", self.balanced.as_slice()),
                ("skipped", self.skipped.as_slice()),
            ],
            format,
        )
    }
}

impl Exportable for PeerReport {
    fn export(&self, format: OutputFormat) -> Result<String> {
        export_sections(
            self,
            &[
                ("all peers", self.all.as_slice()),
                ("inbound", self.inbound.as_slice()),
                ("outbound", self.outbound.as_slice()),
                ("balanced", self.balanced.as_slice()),
                ("skipped", self.skipped.as_slice()),
            ],
            format,
        )
    }
}

pub fn handle<S: NodeSource>(monitor: &Monitor<S>, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Classify { format } => {
            let classification = monitor.classify()?;
            println!("{}", classification.export(format)?);
        }
        ReportCommands::Peers { format } => {
            let report = monitor.peer_report()?;
            println!("{}", report.export(format)?);
        }
    }
    Ok(())
}
