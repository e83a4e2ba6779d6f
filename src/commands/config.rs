use anyhow::Result;

use crate::cli::ConfigCommand;
use crate::config::Config;

pub fn run(cmd: &ConfigCommand) -> Result<()> {
	match cmd {
		ConfigCommand::Show => show(),
		ConfigCommand::SetPath { path } => set_path(path),
	}
}

fn show() -> Result<()> {
	let config = Config::load()?;
	println!("# {}", Config::path()?.display());
	print!("{}", toml::to_string_pretty(&config)?);
	Ok(())
}

fn set_path(path: &str) -> Result<()> {
	let parsed = crate::path::parse(path)?;

	let mut config = Config::load()?;
	config.account.path = parsed.to_string();
	config.save()?;
	println!("Derivation path set to: {parsed}");
	Ok(())
}
