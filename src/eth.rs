use bitcoin::bip32::DerivationPath;
use serde::Serialize;
use tracing::debug;

use crate::error::{status_description, TransportError};
use crate::path::to_apdu_bytes;
use crate::transport::Connection;

const CLA: u8 = 0xe0;
const INS_GET_PUBLIC_KEY: u8 = 0x02;
const INS_GET_APP_CONFIGURATION: u8 = 0x06;
const SW_OK: u16 = 0x9000;

/// Scramble key the Ethereum app registers with obfuscating transports.
pub const SCRAMBLE_KEY: &str = "w0w";

/// Address returned by the device for one derivation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressInfo {
	pub public_key: String,
	pub address: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub chain_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppConfiguration {
	pub arbitrary_data_enabled: bool,
	pub erc20_provisioning_necessary: bool,
	pub stark_enabled: bool,
	pub stark_v2_supported: bool,
	pub version: String,
}

/// Client for the Ethereum app, borrowing an open connection.
pub struct EthApp<'a> {
	conn: &'a mut dyn Connection,
}

impl<'a> EthApp<'a> {
	pub fn new(conn: &'a mut dyn Connection) -> Self {
		Self::with_scramble_key(conn, SCRAMBLE_KEY)
	}

	pub fn with_scramble_key(conn: &'a mut dyn Connection, key: &str) -> Self {
		conn.set_scramble_key(key);
		Self { conn }
	}

	/// Ask the device for the address at `path`.  With `display` set the
	/// device shows the address and waits for the user to approve it.
	pub async fn get_address(
		&mut self,
		path: &DerivationPath,
		display: bool,
		chain_code: bool,
	) -> Result<AddressInfo, TransportError> {
		let display_flag = display;
		debug!(%path, display = display_flag, chain_code, "requesting address");
		let data = to_apdu_bytes(path)?;
		let reply = self
			.send(INS_GET_PUBLIC_KEY, display as u8, chain_code as u8, &data)
			.await?;
		parse_address(&reply, chain_code)
	}

	pub async fn get_app_configuration(&mut self) -> Result<AppConfiguration, TransportError> {
		let reply = self.send(INS_GET_APP_CONFIGURATION, 0, 0, &[]).await?;
		if reply.len() < 4 {
			return Err(TransportError::MalformedResponse("app configuration too short"));
		}
		let flags = reply[0];
		Ok(AppConfiguration {
			arbitrary_data_enabled: flags & 0x01 != 0,
			erc20_provisioning_necessary: flags & 0x02 != 0,
			stark_enabled: flags & 0x04 != 0,
			stark_v2_supported: flags & 0x08 != 0,
			version: format!("{}.{}.{}", reply[1], reply[2], reply[3]),
		})
	}

	/// Send one APDU and check the status word, returning the payload.
	async fn send(&mut self, ins: u8, p1: u8, p2: u8, data: &[u8]) -> Result<Vec<u8>, TransportError> {
		let lc = u8::try_from(data.len()).map_err(|_| TransportError::ApduTooLong(data.len()))?;
		let mut apdu = Vec::with_capacity(5 + data.len());
		apdu.extend_from_slice(&[CLA, ins, p1, p2, lc]);
		apdu.extend_from_slice(data);

		let mut reply = self.conn.exchange(&apdu).await?;
		if reply.len() < 2 {
			return Err(TransportError::MalformedResponse("reply without status word"));
		}
		let sw = u16::from_be_bytes([reply[reply.len() - 2], reply[reply.len() - 1]]);
		if sw != SW_OK {
			return Err(TransportError::Status {
				code: sw,
				description: status_description(sw),
			});
		}
		reply.truncate(reply.len() - 2);
		Ok(reply)
	}
}

/// Reply layout: `pk_len | pk | addr_len | addr (ascii hex) | chain_code?`.
fn parse_address(reply: &[u8], chain_code: bool) -> Result<AddressInfo, TransportError> {
	let short = || TransportError::MalformedResponse("address reply too short");

	let pk_len = usize::from(*reply.first().ok_or_else(short)?);
	let pk = reply.get(1..1 + pk_len).ok_or_else(short)?;
	let addr_len = usize::from(*reply.get(1 + pk_len).ok_or_else(short)?);
	let addr_start = 2 + pk_len;
	let addr = reply.get(addr_start..addr_start + addr_len).ok_or_else(short)?;
	let addr = std::str::from_utf8(addr)
		.map_err(|_| TransportError::MalformedResponse("address is not ASCII"))?;

	let chain_code = if chain_code {
		let start = addr_start + addr_len;
		let cc = reply.get(start..start + 32).ok_or_else(short)?;
		Some(hex::encode(cc))
	} else {
		None
	};

	Ok(AddressInfo {
		public_key: hex::encode(pk),
		address: format!("0x{addr}"),
		chain_code,
	})
}
