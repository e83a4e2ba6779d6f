use anyhow::Result;

use crate::adapter::TransportAdapter;
use crate::cli::Cli;
use crate::commands::resolve_request;
use crate::config::Config;
use crate::transport::TransportKind;

pub async fn run(
	cli: &Cli,
	config: &Config,
	kind: TransportKind,
	display: bool,
	chain_code: bool,
	json: bool,
) -> Result<()> {
	let mut request = resolve_request(cli, config)?;
	request.display |= display;
	request.chain_code |= chain_code;

	if request.display {
		println!("Confirm the address on your device...");
	}

	let adapter = TransportAdapter::new(kind, kind.factory(config), request);
	let info = adapter.get_account_info().await?;

	if json {
		println!("{}", serde_json::to_string_pretty(&info)?);
		return Ok(());
	}

	println!("Transport:  {kind}");
	println!("Path:       {}", adapter.request().path);
	println!("Address:    {}", info.address);
	println!("Public key: {}", info.public_key);
	if let Some(cc) = &info.chain_code {
		println!("Chain code: {cc}");
	}
	Ok(())
}

pub async fn app_config(cli: &Cli, config: &Config, kind: TransportKind) -> Result<()> {
	let request = resolve_request(cli, config)?;
	let adapter = TransportAdapter::new(kind, kind.factory(config), request);
	let cfg = adapter.get_app_configuration().await?;

	println!("Ethereum app {}", cfg.version);
	println!("  Arbitrary data:       {}", cfg.arbitrary_data_enabled);
	println!("  ERC-20 provisioning:  {}", cfg.erc20_provisioning_necessary);
	println!("  Stark:                {}", cfg.stark_enabled);
	println!("  Stark v2:             {}", cfg.stark_v2_supported);
	Ok(())
}
