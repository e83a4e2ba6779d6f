use tracing::debug;

use super::{Connection, TransportFactory};
use crate::error::TransportError;

/// A transport that only exists inside a web browser (WebUSB, Web
/// Bluetooth).  A native process never has it, so the support check answers
/// `false` and opening fails the same way an unsupported browser would.
pub struct BrowserOnly {
	api: &'static str,
}

impl BrowserOnly {
	pub fn new(api: &'static str) -> Self {
		Self { api }
	}
}

#[async_trait::async_trait]
impl TransportFactory for BrowserOnly {
	async fn is_supported(&self) -> Result<bool, TransportError> {
		debug!(api = self.api, "browser API not available in a native process");
		Ok(false)
	}

	async fn create(&self) -> Result<Box<dyn Connection>, TransportError> {
		Err(TransportError::Unsupported(self.api))
	}
}
