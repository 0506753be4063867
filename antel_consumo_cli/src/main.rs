mod commands;
mod output;
mod publish;

use anyhow::Result;
use antel_consumo_lib::FetchSettings;
use clap::{Parser, Subcommand};

use crate::commands::AccountArgs;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "antel-consumo")]
#[command(about = "Read internet data consumption from the Antel self-service portal")]
struct Cli {
    /// Output format: table, markdown or json
    #[arg(long, default_value = "table", global = true)]
    output: String,

    #[command(flatten)]
    account: AccountArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the current consumption once
    Fetch(commands::fetch::FetchArgs),
    /// Check that the portal accepts the credentials
    CheckLogin,
    /// Fetch on an interval, optionally publishing to Home Assistant
    Watch(commands::watch::WatchArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("antel_consumo=info".parse()?)
                .add_directive("antel_consumo_lib=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.output);
    let credentials = cli.account.credentials()?;
    let settings = FetchSettings::from_env();

    match &cli.command {
        Commands::Fetch(args) => commands::fetch::run(args, credentials, settings, format).await?,
        Commands::CheckLogin => commands::check_login::run(credentials, settings).await?,
        Commands::Watch(args) => commands::watch::run(args, credentials, settings, format).await?,
    }

    Ok(())
}
