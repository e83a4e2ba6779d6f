use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::adapter::TransportAdapter;
use crate::cli::Cli;
use crate::commands::resolve_request;
use crate::config::Config;
use crate::gallery::Gallery;
use crate::transport::TransportKind;

const HELP: &str = "Commands: fetch <transport>, check <transport>, show, help, quit";

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
	Fetch(&'a str),
	Check(&'a str),
	Show,
	Help,
	Quit,
	Unknown,
}

impl<'a> Input<'a> {
	pub fn parse(line: &'a str) -> Self {
		let mut words = line.split_whitespace();
		match (words.next(), words.next(), words.next()) {
			(Some("fetch"), Some(label), None) => Self::Fetch(label),
			(Some("check"), Some(label), None) => Self::Check(label),
			(Some("show"), None, _) => Self::Show,
			(Some("help"), None, _) => Self::Help,
			(Some("quit" | "exit"), None, _) => Self::Quit,
			_ => Self::Unknown,
		}
	}
}

pub async fn run(cli: &Cli, config: &Config) -> Result<()> {
	let request = resolve_request(cli, config)?;
	let mut gallery = Gallery::new(TransportAdapter::registry(config, &request));
	gallery.mount().await;
	println!("{gallery}");
	println!("{HELP}");

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	while let Some(line) = lines.next_line().await? {
		match Input::parse(&line) {
			Input::Fetch(label) => match gallery.panel_mut(label) {
				Some(panel) => {
					panel.get_account().await;
					println!("{panel}");
				}
				None => println!("No transport named {label:?}."),
			},
			// A fresh adapter, so the panel sees a new identity and checks again.
			Input::Check(label) => match TransportKind::from_label(label) {
				Some(kind) => {
					let adapter = TransportAdapter::new(kind, kind.factory(config), request.clone());
					if let Some(panel) = gallery.replace_adapter(Arc::new(adapter)).await {
						println!("{panel}");
					}
				}
				None => println!("No transport named {label:?}."),
			},
			Input::Show => println!("{gallery}"),
			Input::Help => println!("{HELP}"),
			Input::Quit => break,
			Input::Unknown => {
				if !line.trim().is_empty() {
					println!("{HELP}");
				}
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_commands() {
		assert_eq!(Input::parse("fetch WebHID"), Input::Fetch("WebHID"));
		assert_eq!(Input::parse("  check   u2f "), Input::Check("u2f"));
		assert_eq!(Input::parse("show"), Input::Show);
		assert_eq!(Input::parse("exit"), Input::Quit);
		assert_eq!(Input::parse("fetch"), Input::Unknown);
		assert_eq!(Input::parse("fetch a b"), Input::Unknown);
		assert_eq!(Input::parse(""), Input::Unknown);
	}
}
