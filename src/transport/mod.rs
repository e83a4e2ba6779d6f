pub mod browser;
pub mod hid;
pub mod u2f;

use std::ffi::CStr;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::TransportError;

/// Ledger's USB vendor id.
pub const LEDGER_VENDOR_ID: u16 = 0x2c97;

/// Pick the one device behind the matching interfaces. Some platforms
/// list the same interface once per usage, so repeated paths count once.
pub(crate) fn unique_device<'a>(paths: impl IntoIterator<Item = &'a CStr>) -> Result<&'a CStr, TransportError> {
	let mut found = None;
	for path in paths {
		match found {
			Some(prev) if prev == path => continue,
			Some(_) => return Err(TransportError::DeviceNotUnique),
			None => found = Some(path),
		}
	}
	found.ok_or(TransportError::NoDevice)
}

/// hidapi read timeout in milliseconds, saturating instead of wrapping
/// into hidapi's negative "block forever" range.
pub(crate) fn read_timeout_ms(timeout: Duration) -> i32 {
	i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX)
}

/// A way of reaching a Ledger device.  Implementations do not hold an
/// open device; they only know how to check for and open one.
#[async_trait::async_trait]
pub trait TransportFactory: Send + Sync {
	/// Whether this transport can be used in the current environment.
	async fn is_supported(&self) -> Result<bool, TransportError>;

	/// Open a connection to the device.
	async fn create(&self) -> Result<Box<dyn Connection>, TransportError>;
}

/// An open channel to a device.  Must be closed explicitly.
#[async_trait::async_trait]
pub trait Connection: Send {
	/// Send one raw APDU and return the raw reply, trailing status word
	/// included.
	async fn exchange(&mut self, apdu: &[u8]) -> Result<Vec<u8>, TransportError>;

	/// Key that app clients register for transports that obfuscate APDUs.
	fn set_scramble_key(&mut self, _key: &str) {}

	/// Release the device.
	fn close(&mut self);
}

/// The fixed set of transports the gallery shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum TransportKind {
	#[value(name = "u2f")]
	U2f,
	#[value(name = "webusb")]
	WebUsb,
	#[value(name = "webhid")]
	WebHid,
	Bluetooth,
}

impl TransportKind {
	pub const ALL: [TransportKind; 4] = [Self::U2f, Self::WebUsb, Self::WebHid, Self::Bluetooth];

	pub fn label(&self) -> &'static str {
		match self {
			Self::U2f => "U2F",
			Self::WebUsb => "WebUSB",
			Self::WebHid => "WebHID",
			Self::Bluetooth => "Bluetooth",
		}
	}

	/// Case-insensitive lookup by display label.
	pub fn from_label(label: &str) -> Option<Self> {
		Self::ALL
			.into_iter()
			.find(|k| k.label().eq_ignore_ascii_case(label))
	}

	/// Build the native factory backing this kind.
	pub fn factory(&self, config: &Config) -> Arc<dyn TransportFactory> {
		match self {
			Self::U2f => Arc::new(u2f::U2fTransport::new(
				config.u2f.app_id.clone(),
				config.hid.read_timeout_ms,
			)),
			Self::WebUsb => Arc::new(browser::BrowserOnly::new("WebUSB")),
			Self::WebHid => Arc::new(hid::HidTransport::new(config.hid.read_timeout_ms)),
			Self::Bluetooth => Arc::new(browser::BrowserOnly::new("Web Bluetooth")),
		}
	}
}

impl fmt::Display for TransportKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn labels_are_fixed_and_ordered() {
		let labels: Vec<_> = TransportKind::ALL.iter().map(|k| k.label()).collect();
		assert_eq!(labels, ["U2F", "WebUSB", "WebHID", "Bluetooth"]);
	}

	#[test]
	fn label_lookup_ignores_case() {
		assert_eq!(TransportKind::from_label("webhid"), Some(TransportKind::WebHid));
		assert_eq!(TransportKind::from_label("BLUETOOTH"), Some(TransportKind::Bluetooth));
		assert_eq!(TransportKind::from_label("serial"), None);
	}

	#[test]
	fn two_devices_are_refused() {
		let a = CStr::from_bytes_with_nul(b"/dev/hidraw0\0").unwrap();
		let b = CStr::from_bytes_with_nul(b"/dev/hidraw3\0").unwrap();
		assert_eq!(unique_device([a, a]).unwrap(), a);
		assert!(matches!(unique_device([a, b]), Err(TransportError::DeviceNotUnique)));
		assert!(matches!(unique_device(Vec::<&CStr>::new()), Err(TransportError::NoDevice)));
	}

	#[test]
	fn huge_timeouts_saturate() {
		assert_eq!(read_timeout_ms(Duration::from_millis(30_000)), 30_000);
		assert_eq!(read_timeout_ms(Duration::from_millis(4_294_967_296)), i32::MAX);
		assert_eq!(read_timeout_ms(Duration::from_millis(u64::MAX)), i32::MAX);
	}
}
