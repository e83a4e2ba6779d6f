use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::path::DEFAULT_PATH;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	pub account: AccountConfig,
	pub hid: HidConfig,
	pub u2f: U2fConfig,
	pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
	pub path: String,
	pub display: bool,
	pub chain_code: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HidConfig {
	pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct U2fConfig {
	pub app_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
	pub filter: String,
}

impl Default for AccountConfig {
	fn default() -> Self {
		Self {
			path: DEFAULT_PATH.into(),
			display: false,
			chain_code: false,
		}
	}
}

impl Default for HidConfig {
	fn default() -> Self {
		Self {
			read_timeout_ms: 30_000,
		}
	}
}

impl Default for U2fConfig {
	fn default() -> Self {
		Self {
			app_id: "https://ledger-transports.local".into(),
		}
	}
}

impl Default for LogConfig {
	fn default() -> Self {
		Self {
			filter: "info".into(),
		}
	}
}

impl Config {
	/// Directory where CLI state is stored (~/.ledger-transports/).
	pub fn dir() -> anyhow::Result<PathBuf> {
		let home = dirs::home_dir()
			.ok_or_else(|| anyhow::anyhow!("could not determine home directory"))?;
		Ok(home.join(".ledger-transports"))
	}

	/// Path to the config file.
	pub fn path() -> anyhow::Result<PathBuf> {
		Ok(Self::dir()?.join("config.toml"))
	}

	/// Load config from disk, falling back to defaults if no file exists.
	pub fn load() -> anyhow::Result<Self> {
		Self::load_from(&Self::path()?)
	}

	pub fn load_from(path: &Path) -> anyhow::Result<Self> {
		if path.exists() {
			let content = std::fs::read_to_string(path)?;
			Ok(toml::from_str(&content)?)
		} else {
			Ok(Self::default())
		}
	}

	/// Persist the current config to disk, creating the directory if needed.
	pub fn save(&self) -> anyhow::Result<()> {
		self.save_to(&Self::path()?)
	}

	pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, toml::to_string_pretty(self)?)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_sensible() {
		let c = Config::default();
		assert_eq!(c.account.path, "44'/60'/0'/0/0");
		assert!(!c.account.display);
		assert!(!c.account.chain_code);
		assert_eq!(c.hid.read_timeout_ms, 30_000);
		assert_eq!(c.log.filter, "info");
	}

	#[test]
	fn toml_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("config.toml");

		let mut c = Config::default();
		c.account.path = "44'/60'/1'/0/0".into();
		c.account.chain_code = true;
		c.save_to(&path).unwrap();

		let parsed = Config::load_from(&path).unwrap();
		assert_eq!(parsed.account.path, "44'/60'/1'/0/0");
		assert!(parsed.account.chain_code);
		assert_eq!(parsed.u2f.app_id, c.u2f.app_id);
	}

	#[test]
	fn missing_file_and_sections_use_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let c = Config::load_from(&dir.path().join("absent.toml")).unwrap();
		assert_eq!(c.hid.read_timeout_ms, 30_000);

		let partial: Config = toml::from_str("[hid]\nread_timeout_ms = 500\n").unwrap();
		assert_eq!(partial.hid.read_timeout_ms, 500);
		assert_eq!(partial.account.path, "44'/60'/0'/0/0");
	}
}
