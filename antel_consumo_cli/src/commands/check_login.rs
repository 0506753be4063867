//! The `check-login` subcommand: verifies credentials without fetching.

use anyhow::{bail, Result};
use antel_consumo_lib::{ConsumptionFetcher, Credentials, FetchSettings};

pub async fn run(credentials: Credentials, settings: FetchSettings) -> Result<()> {
    let username = credentials.username().to_string();
    let fetcher = ConsumptionFetcher::new(credentials, settings);
    let outcome = fetcher.validate_credentials().await;
    fetcher.close().await;

    if outcome? {
        println!("Login OK for {}", username);
        Ok(())
    } else {
        bail!("portal rejected the credentials for {}", username)
    }
}
