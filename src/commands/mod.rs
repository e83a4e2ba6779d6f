pub mod account;
pub mod config;
pub mod gallery;
pub mod interactive;

use anyhow::Result;

use crate::adapter::AccountRequest;
use crate::cli::Cli;
use crate::config::Config;

/// Build the account request from config, letting `--path` override it.
pub fn resolve_request(cli: &Cli, config: &Config) -> Result<AccountRequest> {
	let mut request = AccountRequest::from_config(config)?;
	if let Some(path) = &cli.path {
		request.path = crate::path::parse(path)?;
	}
	Ok(request)
}
