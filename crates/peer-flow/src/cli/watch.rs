use anyhow::{Result, anyhow};
use clap::Args;
use peer_flow::{
    ingestor::{
        process_table::{FileProcessTable, ProcessTable, PsProcessTable},
        source::NodeSource,
    },
    monitor::Monitor,
    notifier::{
        LogSink, MessageSink, ThrottledNotifier,
        store::{JsonFileStore, PropertyStore},
    },
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

const MAX_INTERVAL: Duration = Duration::from_secs(24 * 3600);

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Pass interval (e.g. "30s", "5m", "2h"). Without it a single pass runs.
    #[arg(long, value_parser = parse_interval)]
    pub interval: Option<Duration>,

    /// Read the process listing from a file instead of running `ps -ef`
    #[arg(long, value_name = "FILE")]
    pub process_table: Option<PathBuf>,
}

/// Parse "5s", "10m", "2h" or plain seconds. Zero and anything of a day or
/// more are rejected.
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();
    let (digits, unit) = if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else {
        (s.as_str(), 1)
    };

    let count: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid interval '{s}', expected e.g. 30s, 5m or 2h"))?;
    let duration = Duration::from_secs(count.saturating_mul(unit));

    if duration.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    if duration >= MAX_INTERVAL {
        return Err(format!(
            "interval '{s}' is too long, maximum is less than 24 hours"
        ));
    }
    Ok(duration)
}

/// One pass: collect alerts and deliver the ones not sent within the
/// notifier interval. A failed delivery is logged and the remaining alerts
/// still go out. Returns how many went out.
pub fn run_pass<S, P, M>(
    monitor: &Monitor<S>,
    table: &dyn ProcessTable,
    notifier: &ThrottledNotifier<P, M>,
) -> Result<usize>
where
    S: NodeSource,
    P: PropertyStore,
    M: MessageSink,
{
    let throttle = Duration::from_secs(monitor.settings().notifier.interval_seconds);
    let mut sent = 0;
    for alert in monitor.check(table)? {
        match notifier.send_timed(&alert.message, &alert.category, throttle) {
            Ok(true) => sent += 1,
            Ok(false) => {}
            Err(e) => error!(category = %alert.category, "Failed to deliver alert: {}", e),
        }
    }
    Ok(sent)
}

pub async fn handle<S>(monitor: Monitor<S>, args: WatchArgs) -> Result<()>
where
    S: NodeSource + Send + Sync + 'static,
{
    let table: Arc<dyn ProcessTable + Send + Sync> = match &args.process_table {
        Some(path) => Arc::new(FileProcessTable::new(path)),
        None => Arc::new(PsProcessTable),
    };
    let notifier = Arc::new(ThrottledNotifier::new(
        JsonFileStore::new(&monitor.settings().notifier.state_file),
        LogSink,
    ));
    let monitor = Arc::new(monitor);

    let Some(period) = args.interval else {
        let sent = run_pass(&*monitor, table.as_ref(), &*notifier)?;
        info!(sent, "watch pass complete, exiting");
        return Ok(());
    };

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Watching every {:?}. Press Ctrl+C to stop...", period);

    loop {
        tokio::select! {
            biased;
            res = &mut shutdown => {
                res?;
                info!("Shutting down...");
                break;
            }
            _ = ticker.tick() => {
                let monitor = monitor.clone();
                let table = table.clone();
                let notifier = notifier.clone();
                let pass = tokio::task::spawn_blocking(move || {
                    run_pass(&*monitor, table.as_ref(), &*notifier)
                })
                .await
                .map_err(|e| anyhow!("watch pass panicked: {e}"))?;

                match pass {
                    Ok(sent) => info!(sent, "notifications delivered"),
                    Err(e) => error!("Watch pass failed: {e:#}"),
                }
            }
        }
    }

    Ok(())
}
