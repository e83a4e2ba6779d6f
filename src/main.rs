use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod adapter;
mod cli;
mod commands;
mod config;
mod error;
mod eth;
mod gallery;
mod panel;
mod path;
mod transport;

use cli::{Cli, Command};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	let config = Config::load()?;
	init_logging(&config.log.filter);

	match &cli.command {
		Command::Gallery { fetch } => commands::gallery::run(&cli, &config, fetch).await,
		Command::Check { transport } => commands::gallery::check(&cli, &config, *transport).await,
		Command::Account {
			transport,
			display,
			chain_code,
			json,
		} => commands::account::run(&cli, &config, *transport, *display, *chain_code, *json).await,
		Command::AppConfig { transport } => {
			commands::account::app_config(&cli, &config, *transport).await
		}
		Command::Interactive => commands::interactive::run(&cli, &config).await,
		Command::Config { command } => commands::config::run(command),
	}
}

/// Log to stderr so rendered panels on stdout stay clean. `RUST_LOG` wins
/// over the configured filter.
fn init_logging(filter: &str) {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(filter))
		.unwrap_or_else(|_| EnvFilter::new("info"));
	let subscriber = FmtSubscriber::builder()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.finish();
	if tracing::subscriber::set_global_default(subscriber).is_err() {
		tracing::debug!("logging already initialized");
	}
}
