//! The `watch` subcommand: fetches on an interval, tracks today's usage and
//! optionally publishes sensor states to Home Assistant.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use antel_consumo_lib::{BaselineStore, ConsumptionFetcher, Credentials, FetchSettings};
use clap::Args;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::output::{print_snapshot, OutputFormat};
use crate::publish::{StatePublisher, DEFAULT_SUPERVISOR_URL};

#[derive(Args)]
pub struct WatchArgs {
    /// Minutes between fetches
    #[arg(long, env = "ANTEL_SCAN_INTERVAL", default_value = "60")]
    pub interval_minutes: u64,

    /// Publish sensor states to Home Assistant
    #[arg(long)]
    pub publish: bool,

    /// Home Assistant API base URL
    #[arg(long, default_value = DEFAULT_SUPERVISOR_URL)]
    pub supervisor_url: String,

    /// Bearer token for the Home Assistant API
    #[arg(long, env = "SUPERVISOR_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// SQLite file holding the per-day usage baseline
    #[arg(long, env = "ANTEL_STATE_DB", default_value = "antel_consumo.db")]
    pub state_db: PathBuf,
}

pub async fn run(
    args: &WatchArgs,
    credentials: Credentials,
    settings: FetchSettings,
    format: OutputFormat,
) -> Result<()> {
    let baseline = BaselineStore::open(&args.state_db)
        .with_context(|| format!("opening {}", args.state_db.display()))?;

    let publisher = if args.publish {
        let token = args
            .token
            .clone()
            .context("--publish needs a token (--token or SUPERVISOR_TOKEN)")?;
        Some(StatePublisher::with_base_url(&args.supervisor_url, token)?)
    } else {
        None
    };

    let period = Duration::from_secs(args.interval_minutes.max(1) * 60);
    info!(
        "Watching consumption every {} minute(s)",
        period.as_secs() / 60
    );

    let fetcher = ConsumptionFetcher::new(credentials, settings);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
            _ = async {
                ticker.tick().await;
                cycle(&fetcher, &baseline, publisher.as_ref(), format).await;
            } => {}
        }
    }

    fetcher.close().await;
    Ok(())
}

async fn cycle(
    fetcher: &ConsumptionFetcher,
    baseline: &BaselineStore,
    publisher: Option<&StatePublisher>,
    format: OutputFormat,
) {
    let snapshot = match fetcher.fetch().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Fetch failed ({}): {}", e.kind(), e);
            return;
        }
    };

    let today = fetcher.settings().today();
    let daily = match snapshot.used_data_gb() {
        Some(used) => match baseline.daily_usage(today, used) {
            Ok(gb) => Some(gb),
            Err(e) => {
                warn!("Daily baseline unavailable: {}", e);
                None
            }
        },
        None => None,
    };

    print_snapshot(&snapshot, daily, format);

    if let Some(publisher) = publisher {
        let published = publisher
            .publish(&snapshot, daily.map(|gb| (gb, today)))
            .await;
        info!("Published {} sensor state(s)", published);
    }
}
