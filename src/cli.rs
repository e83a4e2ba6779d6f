use clap::{Parser, Subcommand};

use crate::transport::TransportKind;

#[derive(Parser)]
#[command(
	name = "ledger-transports",
	about = "Check Ledger transports and fetch an Ethereum account over each of them.",
	version
)]
pub struct Cli {
	/// Override the derivation path (default from config: 44'/60'/0'/0/0).
	#[arg(long, global = true)]
	pub path: Option<String>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
	/// Show every transport panel, optionally fetching accounts.
	Gallery {
		/// Press "Get Account" on these transports after probing.
		#[arg(long, value_enum)]
		fetch: Vec<TransportKind>,
	},

	/// Check support for a single transport.
	Check {
		#[arg(value_enum)]
		transport: TransportKind,
	},

	/// Fetch the account address over one transport.
	Account {
		#[arg(value_enum)]
		transport: TransportKind,

		/// Ask the device to display the address for confirmation.
		#[arg(long)]
		display: bool,

		/// Also return the BIP32 chain code.
		#[arg(long)]
		chain_code: bool,

		/// Print the result as JSON.
		#[arg(long)]
		json: bool,
	},

	/// Show the Ethereum app configuration over one transport.
	AppConfig {
		#[arg(value_enum)]
		transport: TransportKind,
	},

	/// Check every transport, then read commands from stdin.
	Interactive,

	/// Inspect or edit the configuration file.
	Config {
		#[command(subcommand)]
		command: ConfigCommand,
	},
}

#[derive(Subcommand)]
pub enum ConfigCommand {
	/// Print the effective configuration.
	Show,

	/// Set the default derivation path.
	SetPath {
		/// BIP32 path such as 44'/60'/0'/0/0.
		path: String,
	},
}
