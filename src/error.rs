use thiserror::Error;

/// Everything that can go wrong between opening a transport and decoding
/// the device's reply.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("no device")]
	NoDevice,
	#[error("more than one Ledger device detected")]
	DeviceNotUnique,
	#[error("{0} is not supported in this environment")]
	Unsupported(&'static str),
	#[error("hid: {0}")]
	Hid(#[from] hidapi::HidError),
	#[error("incorrect channel in reply (expected {expected:#06x}, found {found:#06x})")]
	WrongChannel { expected: u32, found: u32 },
	#[error("incorrect tag in reply (expected {expected:#04x}, found {found:#04x})")]
	WrongTag { expected: u8, found: u8 },
	#[error("incorrect sequence number in reply (expected {expected}, found {found})")]
	WrongSequence { expected: u16, found: u16 },
	#[error("U2F device error {0:#04x}")]
	U2fDevice(u8),
	#[error("Ledger device: {description} (0x{code:04x})")]
	Status { code: u16, description: &'static str },
	#[error("invalid derivation path {path:?}: {reason}")]
	InvalidPath { path: String, reason: String },
	#[error("APDU of {0} bytes is too long for this transport")]
	ApduTooLong(usize),
	#[error("malformed response: {0}")]
	MalformedResponse(&'static str),
	#[error("device did not answer in time")]
	Timeout,
	#[error("connection already closed")]
	Closed,
	#[error("device I/O task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}

/// The two ways a panel can fail. Each wraps the transport failure that
/// caused it and renders with the label shown under the panel.
#[derive(Debug, Error)]
pub enum PanelError {
	#[error("Supported Error: {0}")]
	SupportCheck(#[source] TransportError),
	#[error("Account Error: {0}")]
	AccountFetch(#[source] TransportError),
}

/// Human readable meaning of the status words the Ethereum app and the
/// dashboard return most often.
pub fn status_description(code: u16) -> &'static str {
	match code {
		0x5515 | 0x6b0c => "device is locked",
		0x6511 | 0x6d00 | 0x6e00 | 0x6e01 => "Ethereum app is not open",
		0x6700 => "incorrect length",
		0x6982 => "security status not satisfied",
		0x6985 => "denied by the user",
		0x6a80 => "invalid data",
		0x6a82 => "file not found",
		0x6b00 => "incorrect parameters",
		0x6f00 => "technical problem",
		_ => "unknown status",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn panel_error_prefixes() {
		let e = PanelError::AccountFetch(TransportError::NoDevice);
		assert_eq!(e.to_string(), "Account Error: no device");
		let e = PanelError::SupportCheck(TransportError::Unsupported("WebUSB"));
		assert_eq!(
			e.to_string(),
			"Supported Error: WebUSB is not supported in this environment"
		);
	}

	#[test]
	fn status_error_message() {
		let e = TransportError::Status {
			code: 0x6985,
			description: status_description(0x6985),
		};
		assert_eq!(e.to_string(), "Ledger device: denied by the user (0x6985)");
		assert_eq!(status_description(0x1234), "unknown status");
	}
}
