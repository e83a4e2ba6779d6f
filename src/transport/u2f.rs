//! Legacy U2F transport.
//!
//! The Ledger dashboard tunnels app APDUs through the FIDO interface: each
//! APDU is XORed with the app's scramble key, passed as the key handle of a
//! U2F AUTHENTICATE request, and the app's reply comes back in place of the
//! signature. The request travels over CTAPHID framing.

use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{read_timeout_ms, unique_device, Connection, TransportFactory, LEDGER_VENDOR_ID};
use crate::error::{status_description, TransportError};

pub const PACKET_SIZE: usize = 64;
const FIDO_USAGE_PAGE: u16 = 0xf1d0;
const BROADCAST_CID: u32 = 0xffff_ffff;

const CMD_MSG: u8 = 0x83;
const CMD_INIT: u8 = 0x86;
const CMD_KEEPALIVE: u8 = 0xbb;
const CMD_ERROR: u8 = 0xbf;

const INIT_DATA: usize = PACKET_SIZE - 7;
const CONT_DATA: usize = PACKET_SIZE - 5;
const MAX_MESSAGE: usize = INIT_DATA + 128 * CONT_DATA;

const SW_OK: u16 = 0x9000;

pub struct U2fTransport {
	app_param: [u8; 32],
	read_timeout: Duration,
}

impl U2fTransport {
	pub fn new(app_id: String, read_timeout_ms: u64) -> Self {
		Self {
			app_param: Sha256::digest(app_id.as_bytes()).into(),
			read_timeout: Duration::from_millis(read_timeout_ms),
		}
	}
}

#[async_trait::async_trait]
impl TransportFactory for U2fTransport {
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
		let timeout = self.read_timeout;
		let (device, cid) = tokio::task::spawn_blocking(move || {
			let device = open_fido()?;
			let cid = allocate_channel(&device, timeout)?;
			Ok::<_, TransportError>((device, cid))
		})
		.await??;
		info!(cid = %format!("{cid:#010x}"), "opened Ledger U2F channel");

		Ok(Box::new(U2fConnection {
			device: Some(device),
			cid,
			scramble_key: Vec::new(),
			app_param: self.app_param,
			read_timeout: timeout,
		}))
	}
}

/// Open the single Ledger device exposing its FIDO interface.
fn open_fido() -> Result<HidDevice, TransportError> {
	let api = HidApi::new()?;
	let path = unique_device(
		api.device_list()
			.filter(|d| d.vendor_id() == LEDGER_VENDOR_ID && d.usage_page() == FIDO_USAGE_PAGE)
			.map(|d| d.path()),
	)?;
	Ok(api.open_path(path)?)
}

/// Ask the device for a private CTAPHID channel.
fn allocate_channel(device: &HidDevice, timeout: Duration) -> Result<u32, TransportError> {
	let nonce: [u8; 8] = rand::random();
	let reply = transact(device, BROADCAST_CID, CMD_INIT, &nonce, timeout)?;
	if reply.len() < 12 || reply[..8] != nonce {
		return Err(TransportError::MalformedResponse("CTAPHID INIT reply"));
	}
	Ok(u32::from_be_bytes([reply[8], reply[9], reply[10], reply[11]]))
}

pub struct U2fConnection {
	device: Option<HidDevice>,
	cid: u32,
	scramble_key: Vec<u8>,
	app_param: [u8; 32],
	read_timeout: Duration,
}

#[async_trait::async_trait]
impl Connection for U2fConnection {
	async fn exchange(&mut self, apdu: &[u8]) -> Result<Vec<u8>, TransportError> {
		let key_handle = wrap_apdu(apdu, &self.scramble_key);
		let request = authenticate_request(&self.app_param, &key_handle)?;
		let device = self.device.take().ok_or(TransportError::Closed)?;
		let (cid, timeout) = (self.cid, self.read_timeout);
		debug!(apdu = %hex::encode(apdu), "u2f =>");

		let (device, reply) = tokio::task::spawn_blocking(move || {
			let reply = transact(&device, cid, CMD_MSG, &request, timeout);
			(device, reply)
		})
		.await?;
		self.device = Some(device);

		let reply = unwrap_authenticate_reply(reply?)?;
		debug!(reply = %hex::encode(&reply), "u2f <=");
		Ok(reply)
	}

	fn set_scramble_key(&mut self, key: &str) {
		self.scramble_key = key.as_bytes().to_vec();
	}

	fn close(&mut self) {
		if self.device.take().is_some() {
			debug!("closed Ledger U2F channel");
		}
	}
}

/// XOR the APDU with the repeating scramble key.
pub fn wrap_apdu(apdu: &[u8], key: &[u8]) -> Vec<u8> {
	if key.is_empty() {
		return apdu.to_vec();
	}
	apdu.iter()
		.zip(key.iter().cycle())
		.map(|(b, k)| b ^ k)
		.collect()
}

/// U2F AUTHENTICATE (check-only off, enforce presence) in extended-length
/// form, with an all-zero challenge.
pub fn authenticate_request(app_param: &[u8; 32], key_handle: &[u8]) -> Result<Vec<u8>, TransportError> {
	let kh_len = u8::try_from(key_handle.len()).map_err(|_| TransportError::ApduTooLong(key_handle.len()))?;
	let body_len = 32 + 32 + 1 + key_handle.len();

	let mut out = Vec::with_capacity(7 + body_len + 2);
	out.extend_from_slice(&[0x00, 0x02, 0x03, 0x00, 0x00]);
	out.extend_from_slice(&(body_len as u16).to_be_bytes());
	out.extend_from_slice(&[0u8; 32]);
	out.extend_from_slice(app_param);
	out.push(kh_len);
	out.extend_from_slice(key_handle);
	out.extend_from_slice(&[0x00, 0x00]);
	Ok(out)
}

/// Strip the U2F status word and the presence/counter prefix, leaving the
/// app's own reply.
pub fn unwrap_authenticate_reply(mut reply: Vec<u8>) -> Result<Vec<u8>, TransportError> {
	if reply.len() < 2 {
		return Err(TransportError::MalformedResponse("U2F reply without status word"));
	}
	let sw = u16::from_be_bytes([reply[reply.len() - 2], reply[reply.len() - 1]]);
	if sw != SW_OK {
		return Err(TransportError::Status {
			code: sw,
			description: status_description(sw),
		});
	}
	reply.truncate(reply.len() - 2);
	if reply.len() < 5 {
		return Err(TransportError::MalformedResponse("U2F reply too short"));
	}
	Ok(reply.split_off(5))
}

fn transact(
	device: &HidDevice,
	cid: u32,
	cmd: u8,
	data: &[u8],
	timeout: Duration,
) -> Result<Vec<u8>, TransportError> {
	for frame in encode_message(cid, cmd, data)? {
		let mut report = [0u8; PACKET_SIZE + 1];
		report[1..].copy_from_slice(&frame);
		device.write(&report)?;
	}

	let mut reader = MessageReader::new(cid);
	loop {
		let mut frame = [0u8; PACKET_SIZE];
		let n = device.read_timeout(&mut frame, read_timeout_ms(timeout))?;
		if n == 0 {
			return Err(TransportError::Timeout);
		}
		let Some((reply_cmd, payload)) = reader.push(&frame[..n])? else {
			continue;
		};
		match reply_cmd {
			CMD_KEEPALIVE => reader = MessageReader::new(cid),
			CMD_ERROR => return Err(TransportError::U2fDevice(payload.first().copied().unwrap_or(0))),
			c if c == cmd => return Ok(payload),
			_ => return Err(TransportError::MalformedResponse("unexpected CTAPHID command")),
		}
	}
}

/// Split a CTAPHID message into an init frame and continuation frames.
pub fn encode_message(cid: u32, cmd: u8, data: &[u8]) -> Result<Vec<[u8; PACKET_SIZE]>, TransportError> {
	if data.len() > MAX_MESSAGE {
		return Err(TransportError::ApduTooLong(data.len()));
	}

	let mut frame = [0u8; PACKET_SIZE];
	frame[0..4].copy_from_slice(&cid.to_be_bytes());
	frame[4] = cmd;
	frame[5..7].copy_from_slice(&(data.len() as u16).to_be_bytes());
	let take = data.len().min(INIT_DATA);
	frame[7..7 + take].copy_from_slice(&data[..take]);

	let mut frames = vec![frame];
	for (seq, chunk) in data[take..].chunks(CONT_DATA).enumerate() {
		let mut frame = [0u8; PACKET_SIZE];
		frame[0..4].copy_from_slice(&cid.to_be_bytes());
		frame[4] = seq as u8;
		frame[5..5 + chunk.len()].copy_from_slice(chunk);
		frames.push(frame);
	}
	Ok(frames)
}

/// Reassembles a CTAPHID message addressed to one channel.
#[derive(Debug)]
pub struct MessageReader {
	cid: u32,
	cmd: Option<u8>,
	sequence: u8,
	remaining: usize,
	buf: Vec<u8>,
}

impl MessageReader {
	pub fn new(cid: u32) -> Self {
		Self {
			cid,
			cmd: None,
			sequence: 0,
			remaining: 0,
			buf: Vec::new(),
		}
	}

	/// Feed one frame. Frames for other channels are skipped.
	pub fn push(&mut self, frame: &[u8]) -> Result<Option<(u8, Vec<u8>)>, TransportError> {
		if frame.len() < 5 {
			return Err(TransportError::MalformedResponse("short CTAPHID frame"));
		}
		let cid = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
		if cid != self.cid {
			return Ok(None);
		}

		let payload = match self.cmd {
			None => {
				if frame[4] & 0x80 == 0 || frame.len() < 7 {
					return Err(TransportError::MalformedResponse("expected CTAPHID init frame"));
				}
				let len = usize::from(u16::from_be_bytes([frame[5], frame[6]]));
				if len > MAX_MESSAGE {
					return Err(TransportError::ApduTooLong(len));
				}
				self.cmd = Some(frame[4]);
				self.remaining = len;
				self.buf = Vec::with_capacity(len);
				&frame[7..]
			}
			Some(_) => {
				// Continuation sequence numbers live in 0..=0x7f.
				if frame[4] & 0x80 != 0 {
					return Err(TransportError::MalformedResponse("expected CTAPHID continuation frame"));
				}
				if frame[4] != self.sequence {
					return Err(TransportError::WrongSequence {
						expected: self.sequence.into(),
						found: frame[4].into(),
					});
				}
				self.sequence += 1;
				&frame[5..]
			}
		};

		let take = payload.len().min(self.remaining);
		self.buf.extend_from_slice(&payload[..take]);
		self.remaining -= take;

		match (self.remaining, self.cmd) {
			(0, Some(cmd)) => Ok(Some((cmd, std::mem::take(&mut self.buf)))),
			_ => Ok(None),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn scramble_key_repeats() {
		let wrapped = wrap_apdu(&[0xe0, 0x02, 0x00, 0x00, 0x00], b"w0w");
		assert_eq!(wrapped, vec![0xe0 ^ b'w', 0x02 ^ b'0', 0x00 ^ b'w', b'w', b'0']);
		assert_eq!(wrap_apdu(&wrapped, b"w0w"), vec![0xe0, 0x02, 0, 0, 0]);
		assert_eq!(wrap_apdu(&[1, 2, 3], b""), vec![1, 2, 3]);
	}

	#[test]
	fn authenticate_request_layout() {
		let app = [0xaa; 32];
		let req = authenticate_request(&app, &[1, 2, 3]).unwrap();
		assert_eq!(&req[..7], &[0x00, 0x02, 0x03, 0x00, 0x00, 0x00, 68]);
		assert!(req[7..39].iter().all(|b| *b == 0));
		assert_eq!(&req[39..71], &app);
		assert_eq!(&req[71..75], &[3, 1, 2, 3]);
		assert_eq!(&req[75..], &[0, 0]);
	}

	#[test]
	fn authenticate_reply_unwrapping() {
		let reply = vec![0x01, 0, 0, 0, 9, 0xca, 0xfe, 0x90, 0x00, 0x90, 0x00];
		assert_eq!(unwrap_authenticate_reply(reply).unwrap(), vec![0xca, 0xfe, 0x90, 0x00]);

		let denied = vec![0x69, 0x85];
		assert!(matches!(
			unwrap_authenticate_reply(denied),
			Err(TransportError::Status { code: 0x6985, .. })
		));
	}

	#[test]
	fn message_framing_roundtrip() {
		let data: Vec<u8> = (0..200u8).collect();
		let frames = encode_message(0x0102_0304, CMD_MSG, &data).unwrap();
		// 57 + 59 + 59 + 25
		assert_eq!(frames.len(), 4);
		assert_eq!(&frames[0][..7], &[1, 2, 3, 4, CMD_MSG, 0, 200]);
		assert_eq!(frames[3][4], 2);

		let mut reader = MessageReader::new(0x0102_0304);
		let mut out = None;
		for f in &frames {
			out = reader.push(f).unwrap();
		}
		assert_eq!(out, Some((CMD_MSG, data)));
	}

	#[test]
	fn reader_skips_foreign_channels() {
		let frames = encode_message(0xdead_beef, CMD_MSG, &[1]).unwrap();
		let mut reader = MessageReader::new(0x0102_0304);
		assert_eq!(reader.push(&frames[0]).unwrap(), None);
	}

	#[test]
	fn declared_length_is_capped() {
		let mut frame = encode_message(0x0102_0304, CMD_MSG, &[1]).unwrap()[0];
		frame[5..7].copy_from_slice(&0xffffu16.to_be_bytes());
		let mut reader = MessageReader::new(0x0102_0304);
		assert!(matches!(reader.push(&frame), Err(TransportError::ApduTooLong(0xffff))));

		let frames = encode_message(0x0102_0304, CMD_MSG, &vec![7; MAX_MESSAGE]).unwrap();
		assert_eq!(frames.len(), 129);
		let mut reader = MessageReader::new(0x0102_0304);
		let mut out = None;
		for f in &frames {
			out = reader.push(f).unwrap();
		}
		assert_eq!(out.map(|(_, data)| data.len()), Some(MAX_MESSAGE));
	}

	#[test]
	fn continuation_sequence_stays_below_0x80() {
		let frames = encode_message(0x0102_0304, CMD_MSG, &[0; 200]).unwrap();
		let mut reader = MessageReader::new(0x0102_0304);
		assert!(reader.push(&frames[0]).unwrap().is_none());

		let mut bad = frames[1];
		bad[4] = 0x80;
		assert!(matches!(reader.push(&bad), Err(TransportError::MalformedResponse(_))));
		assert!(matches!(
			reader.push(&frames[2]),
			Err(TransportError::WrongSequence { expected: 0, found: 1 })
		));
	}
}
