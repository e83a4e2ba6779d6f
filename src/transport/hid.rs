//! Ledger's native HID transport.
//!
//! APDUs are cut into 64-byte frames. Every frame starts with the channel
//! id, the APDU tag and a big-endian sequence number; the first frame also
//! carries the total length of the message.

use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use tracing::{debug, info};

use super::{read_timeout_ms, unique_device, Connection, TransportFactory, LEDGER_VENDOR_ID};
use crate::error::TransportError;

pub const PACKET_SIZE: usize = 64;
const CHANNEL: u16 = 0x0101;
const TAG_APDU: u8 = 0x05;
const LEDGER_USAGE_PAGE: u16 = 0xffa0;

pub struct HidTransport {
	read_timeout: Duration,
}

impl HidTransport {
	pub fn new(read_timeout_ms: u64) -> Self {
		Self {
			read_timeout: Duration::from_millis(read_timeout_ms),
		}
	}
}

#[async_trait::async_trait]
impl TransportFactory for HidTransport {
	async fn is_supported(&self) -> Result<bool, TransportError> {
		let supported = tokio::task::spawn_blocking(|| match HidApi::new() {
			Ok(_) => true,
			Err(e) => {
				debug!("hidapi unavailable: {e}");
				false
			}
		})
		.await?;
		Ok(supported)
	}

	async fn create(&self) -> Result<Box<dyn Connection>, TransportError> {
		let device = tokio::task::spawn_blocking(open_ledger).await??;
		info!("opened Ledger HID device");
		Ok(Box::new(HidConnection {
			device: Some(device),
			read_timeout: self.read_timeout,
		}))
	}
}

/// Open the single Ledger device exposing its APDU interface.
fn open_ledger() -> Result<HidDevice, TransportError> {
	let api = HidApi::new()?;
	let path = unique_device(
		api.device_list()
			.filter(|d| d.vendor_id() == LEDGER_VENDOR_ID)
			.filter(|d| d.interface_number() == 0 || d.usage_page() == LEDGER_USAGE_PAGE)
			.map(|d| d.path()),
	)?;
	Ok(api.open_path(path)?)
}

pub struct HidConnection {
	device: Option<HidDevice>,
	read_timeout: Duration,
}

#[async_trait::async_trait]
impl Connection for HidConnection {
	async fn exchange(&mut self, apdu: &[u8]) -> Result<Vec<u8>, TransportError> {
		let frames = encode_frames(apdu)?;
		let device = self.device.take().ok_or(TransportError::Closed)?;
		let timeout = self.read_timeout;
		debug!(apdu = %hex::encode(apdu), "hid =>");

		let (device, reply) = tokio::task::spawn_blocking(move || {
			let reply = exchange_blocking(&device, &frames, timeout);
			(device, reply)
		})
		.await?;
		self.device = Some(device);

		let reply = reply?;
		debug!(reply = %hex::encode(&reply), "hid <=");
		Ok(reply)
	}

	fn close(&mut self) {
		if self.device.take().is_some() {
			debug!("closed Ledger HID device");
		}
	}
}

fn exchange_blocking(
	device: &HidDevice,
	frames: &[[u8; PACKET_SIZE]],
	timeout: Duration,
) -> Result<Vec<u8>, TransportError> {
	for frame in frames {
		// hidapi expects the report id in front of the payload.
		let mut report = [0u8; PACKET_SIZE + 1];
		report[1..].copy_from_slice(frame);
		device.write(&report)?;
	}

	let mut reader = FrameReader::default();
	loop {
		let mut frame = [0u8; PACKET_SIZE];
		let n = device.read_timeout(&mut frame, read_timeout_ms(timeout))?;
		if n == 0 {
			return Err(TransportError::Timeout);
		}
		if let Some(reply) = reader.push(&frame[..n])? {
			return Ok(reply);
		}
	}
}

/// Split an APDU into HID frames.
pub fn encode_frames(apdu: &[u8]) -> Result<Vec<[u8; PACKET_SIZE]>, TransportError> {
	let total = u16::try_from(apdu.len()).map_err(|_| TransportError::ApduTooLong(apdu.len()))?;

	let mut frames = Vec::new();
	let mut data = apdu;
	let mut sequence = 0u16;
	loop {
		let mut frame = [0u8; PACKET_SIZE];
		frame[0..2].copy_from_slice(&CHANNEL.to_be_bytes());
		frame[2] = TAG_APDU;
		frame[3..5].copy_from_slice(&sequence.to_be_bytes());
		let header_len = if sequence == 0 {
			frame[5..7].copy_from_slice(&total.to_be_bytes());
			7
		} else {
			5
		};

		let take = data.len().min(PACKET_SIZE - header_len);
		frame[header_len..header_len + take].copy_from_slice(&data[..take]);
		data = &data[take..];
		frames.push(frame);

		if data.is_empty() {
			return Ok(frames);
		}
		sequence += 1;
	}
}

/// Reassembles a reply from consecutive HID frames.
#[derive(Debug, Default)]
pub struct FrameReader {
	sequence: u16,
	remaining: usize,
	buf: Vec<u8>,
}

impl FrameReader {
	/// Feed one frame. Returns the full reply once the last frame arrives.
	pub fn push(&mut self, frame: &[u8]) -> Result<Option<Vec<u8>>, TransportError> {
		if frame.len() < 5 {
			return Err(TransportError::MalformedResponse("short HID frame"));
		}
		let channel = u16::from_be_bytes([frame[0], frame[1]]);
		if channel != CHANNEL {
			return Err(TransportError::WrongChannel {
				expected: CHANNEL.into(),
				found: channel.into(),
			});
		}
		if frame[2] != TAG_APDU {
			return Err(TransportError::WrongTag {
				expected: TAG_APDU,
				found: frame[2],
			});
		}
		let sequence = u16::from_be_bytes([frame[3], frame[4]]);
		if sequence != self.sequence {
			return Err(TransportError::WrongSequence {
				expected: self.sequence,
				found: sequence,
			});
		}

		let payload = if sequence == 0 {
			if frame.len() < 7 {
				return Err(TransportError::MalformedResponse("short HID frame"));
			}
			self.remaining = usize::from(u16::from_be_bytes([frame[5], frame[6]]));
			self.buf = Vec::with_capacity(self.remaining);
			&frame[7..]
		} else {
			&frame[5..]
		};

		let take = payload.len().min(self.remaining);
		self.buf.extend_from_slice(&payload[..take]);
		self.remaining -= take;
		self.sequence = self.sequence.wrapping_add(1);

		if self.remaining == 0 {
			Ok(Some(std::mem::take(&mut self.buf)))
		} else {
			Ok(None)
		}
	}
}
