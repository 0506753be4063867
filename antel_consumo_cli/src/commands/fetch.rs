//! The `fetch` subcommand: one consumption fetch, printed and exited.

use anyhow::Result;
use antel_consumo_lib::{ConsumptionFetcher, Credentials, FetchSettings};
use clap::Args;

use crate::output::{print_snapshot, OutputFormat};

#[derive(Args)]
pub struct FetchArgs {
    /// Fail when any snapshot field is missing
    #[arg(long)]
    pub strict: bool,
}

pub async fn run(
    args: &FetchArgs,
    credentials: Credentials,
    settings: FetchSettings,
    format: OutputFormat,
) -> Result<()> {
    let fetcher = ConsumptionFetcher::new(credentials, settings);
    let outcome = fetcher.fetch().await;
    fetcher.close().await;

    let snapshot = outcome?;
    if args.strict {
        snapshot.check_complete()?;
    }
    print_snapshot(&snapshot, None, format);
    Ok(())
}
