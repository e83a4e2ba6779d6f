use anyhow::Result;

use crate::adapter::TransportAdapter;
use crate::cli::Cli;
use crate::commands::resolve_request;
use crate::config::Config;
use crate::gallery::Gallery;
use crate::panel::Panel;
use crate::transport::TransportKind;

/// Mount every panel, press "Get Account" on the requested ones, print.
pub async fn run(cli: &Cli, config: &Config, fetch: &[TransportKind]) -> Result<()> {
	let request = resolve_request(cli, config)?;
	let mut gallery = Gallery::new(TransportAdapter::registry(config, &request));
	gallery.mount().await;

	for kind in fetch {
		if let Some(panel) = gallery.panel_mut(kind.label()) {
			panel.get_account().await;
		}
	}

	print!("{gallery}");
	Ok(())
}

/// Mount a single panel and print it.
pub async fn check(cli: &Cli, config: &Config, kind: TransportKind) -> Result<()> {
	let request = resolve_request(cli, config)?;
	let adapter = TransportAdapter::new(kind, kind.factory(config), request);
	let mut panel = Panel::new(adapter.into());
	panel.mount().await;
	print!("{panel}");
	Ok(())
}
