use std::sync::Arc;

use bitcoin::bip32::DerivationPath;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::TransportError;
use crate::eth::{AddressInfo, AppConfiguration, EthApp};
use crate::path;
use crate::transport::{Connection, TransportFactory, TransportKind};

/// What to ask the device for when fetching an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRequest {
	pub path: DerivationPath,
	pub display: bool,
	pub chain_code: bool,
}

impl Default for AccountRequest {
	fn default() -> Self {
		Self {
			path: path::default_path(),
			display: false,
			chain_code: false,
		}
	}
}

impl AccountRequest {
	pub fn from_config(config: &Config) -> Result<Self, TransportError> {
		Ok(Self {
			path: path::parse(&config.account.path)?,
			display: config.account.display,
			chain_code: config.account.chain_code,
		})
	}
}

/// Binds one transport kind to the support check and the account fetch.
///
/// Adapters are built once and shared behind an `Arc`; panels compare
/// them by identity to decide whether the support check must run again.
pub struct TransportAdapter {
	kind: TransportKind,
	factory: Arc<dyn TransportFactory>,
	request: AccountRequest,
}

impl TransportAdapter {
	pub fn new(kind: TransportKind, factory: Arc<dyn TransportFactory>, request: AccountRequest) -> Self {
		Self {
			kind,
			factory,
			request,
		}
	}

	/// One adapter per kind, in gallery order, backed by the native
	/// factories.
	pub fn registry(config: &Config, request: &AccountRequest) -> Vec<Arc<Self>> {
		TransportKind::ALL
			.into_iter()
			.map(|kind| Arc::new(Self::new(kind, kind.factory(config), request.clone())))
			.collect()
	}

	pub fn kind(&self) -> TransportKind {
		self.kind
	}

	pub fn request(&self) -> &AccountRequest {
		&self.request
	}

	pub async fn check_support(&self) -> Result<bool, TransportError> {
		self.factory.is_supported().await
	}

	/// Open, query, close. The connection is closed exactly once whether
	/// or not the request succeeds.
	pub async fn get_account_info(&self) -> Result<AddressInfo, TransportError> {
		self.fetch_address()
			.await
			.inspect_err(|e| error!(transport = %self.kind, "error getting account: {e}"))
	}

	/// Same as [`Self::get_account_info`], keeping only the address.
	pub async fn get_account(&self) -> Result<String, TransportError> {
		Ok(self.get_account_info().await?.address)
	}

	pub async fn get_app_configuration(&self) -> Result<AppConfiguration, TransportError> {
		let mut conn = self.open().await?;
		let result = EthApp::new(conn.as_mut()).get_app_configuration().await;
		self.release(conn);
		result
	}

	async fn fetch_address(&self) -> Result<AddressInfo, TransportError> {
		let req = &self.request;
		let mut conn = self.open().await?;
		let result = EthApp::new(conn.as_mut())
			.get_address(&req.path, req.display, req.chain_code)
			.await;
		self.release(conn);
		result
	}

	async fn open(&self) -> Result<Box<dyn Connection>, TransportError> {
		let conn = self.factory.create().await?;
		debug!(transport = %self.kind, "connection open");
		Ok(conn)
	}

	fn release(&self, mut conn: Box<dyn Connection>) {
		conn.close();
		debug!(transport = %self.kind, "connection closed");
	}
}
