use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::adapter::TransportAdapter;
use crate::error::{PanelError, TransportError};

/// Result of the support check.
#[derive(Debug, Default)]
pub enum SupportState {
	#[default]
	Unknown,
	Checking,
	Supported(bool),
	Failed(PanelError),
}

impl SupportState {
	/// `true`, `false`, or `?` while unknown or failed.
	pub fn text(&self) -> String {
		match self {
			Self::Supported(ok) => ok.to_string(),
			_ => "?".into(),
		}
	}

	pub fn error(&self) -> Option<&PanelError> {
		match self {
			Self::Failed(e) => Some(e),
			_ => None,
		}
	}
}

/// Result of the last account fetch.
#[derive(Debug, Default)]
pub enum AccountState {
	#[default]
	Idle,
	Fetching,
	Fetched(String),
	Failed(PanelError),
}

impl AccountState {
	/// The fetched address, empty unless the last fetch succeeded.
	pub fn address(&self) -> &str {
		match self {
			Self::Fetched(a) => a,
			_ => "",
		}
	}

	pub fn error(&self) -> Option<&PanelError> {
		match self {
			Self::Failed(e) => Some(e),
			_ => None,
		}
	}
}

#[derive(Debug)]
pub enum PanelEvent {
	CheckStarted,
	CheckFinished(Result<bool, TransportError>),
	FetchStarted,
	FetchFinished(Result<String, TransportError>),
}

/// One transport's display unit: support status, a fetch trigger, and the
/// address or error it produced.
pub struct Panel {
	adapter: Arc<TransportAdapter>,
	support: SupportState,
	account: AccountState,
	check_pending: bool,
}

impl Panel {
	pub fn new(adapter: Arc<TransportAdapter>) -> Self {
		Self {
			adapter,
			support: SupportState::Unknown,
			account: AccountState::Idle,
			check_pending: true,
		}
	}

	pub fn label(&self) -> &'static str {
		self.adapter.kind().label()
	}

	pub fn adapter(&self) -> &Arc<TransportAdapter> {
		&self.adapter
	}

	pub fn support(&self) -> &SupportState {
		&self.support
	}

	pub fn account(&self) -> &AccountState {
		&self.account
	}

	/// Whether the support check still has to run for the current adapter.
	pub fn check_pending(&self) -> bool {
		self.check_pending
	}

	/// Swap the adapter. The support check is scheduled again only when the new
	/// adapter is a different instance.
	pub fn set_adapter(&mut self, adapter: Arc<TransportAdapter>) {
		if Arc::ptr_eq(&self.adapter, &adapter) {
			return;
		}
		self.adapter = adapter;
		self.support = SupportState::Unknown;
		self.check_pending = true;
	}

	/// Apply one state transition. Returns `false` when the event is
	/// ignored in the current state.
	pub fn apply(&mut self, event: PanelEvent) -> bool {
		match event {
			PanelEvent::CheckStarted => {
				self.check_pending = false;
				self.support = SupportState::Checking;
			}
			PanelEvent::CheckFinished(result) => {
				if !matches!(self.support, SupportState::Checking) {
					return false;
				}
				self.support = match result {
					Ok(ok) => SupportState::Supported(ok),
					Err(e) => SupportState::Failed(PanelError::SupportCheck(e)),
				};
			}
			PanelEvent::FetchStarted => {
				if matches!(self.account, AccountState::Fetching) {
					debug!(transport = self.label(), "fetch already in flight, ignoring trigger");
					return false;
				}
				self.account = AccountState::Fetching;
			}
			PanelEvent::FetchFinished(result) => {
				if !matches!(self.account, AccountState::Fetching) {
					return false;
				}
				self.account = match result {
					Ok(address) => AccountState::Fetched(address),
					Err(e) => AccountState::Failed(PanelError::AccountFetch(e)),
				};
			}
		}
		true
	}

	/// Run the support check if the panel was just mounted or its adapter
	/// changed.
	pub async fn mount(&mut self) {
		if self.check_pending {
			self.check_support().await;
		}
	}

	pub async fn check_support(&mut self) {
		self.apply(PanelEvent::CheckStarted);
		let adapter = Arc::clone(&self.adapter);
		let result = adapter.check_support().await;
		self.apply(PanelEvent::CheckFinished(result));
	}

	/// The "Get Account" button.
	pub async fn get_account(&mut self) {
		if !self.apply(PanelEvent::FetchStarted) {
			return;
		}
		let adapter = Arc::clone(&self.adapter);
		let result = adapter.get_account().await;
		self.apply(PanelEvent::FetchFinished(result));
	}
}

impl fmt::Display for Panel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{} Transport", self.label())?;
		writeln!(f, "IS SUPPORTED {}", self.support.text())?;
		if let Some(e) = self.support.error() {
			writeln!(f, "{e}")?;
		}
		writeln!(f, "Account: {}", self.account.address())?;
		if let Some(e) = self.account.error() {
			writeln!(f, "{e}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::adapter::AccountRequest;
	use crate::transport::browser::BrowserOnly;
	use crate::transport::TransportKind;

	fn panel() -> Panel {
		Panel::new(Arc::new(TransportAdapter::new(
			TransportKind::WebUsb,
			Arc::new(BrowserOnly::new("WebUSB")),
			AccountRequest::default(),
		)))
	}

	#[test]
	fn support_check_transitions() {
		let mut p = panel();
		assert!(p.check_pending());
		assert_eq!(p.support().text(), "?");

		assert!(p.apply(PanelEvent::CheckStarted));
		assert!(!p.check_pending());
		assert!(p.apply(PanelEvent::CheckFinished(Err(TransportError::NoDevice))));
		assert_eq!(p.support().text(), "?");
		assert_eq!(p.support().error().unwrap().to_string(), "Supported Error: no device");

		// A completion without a matching start is dropped.
		assert!(!p.apply(PanelEvent::CheckFinished(Ok(true))));
		assert_eq!(p.support().text(), "?");
	}

	#[test]
	fn duplicate_fetch_trigger_is_ignored() {
		let mut p = panel();
		assert!(p.apply(PanelEvent::FetchStarted));
		assert!(!p.apply(PanelEvent::FetchStarted));
		assert!(p.apply(PanelEvent::FetchFinished(Ok("0xabc".into()))));
		assert_eq!(p.account().address(), "0xabc");

		// A new attempt hides the previous address while in flight.
		assert!(p.apply(PanelEvent::FetchStarted));
		assert_eq!(p.account().address(), "");
		assert!(p.account().error().is_none());
	}

	#[test]
	fn same_adapter_does_not_reschedule_check() {
		let mut p = panel();
		p.apply(PanelEvent::CheckStarted);
		p.apply(PanelEvent::CheckFinished(Ok(false)));

		let same = Arc::clone(p.adapter());
		p.set_adapter(same);
		assert!(!p.check_pending());
		assert_eq!(p.support().text(), "false");

		p.set_adapter(panel().adapter().clone());
		assert!(p.check_pending());
		assert_eq!(p.support().text(), "?");
	}

	#[tokio::test]
	async fn renders_browser_only_panel() {
		let mut p = panel();
		p.mount().await;
		p.get_account().await;
		assert_eq!(
			p.to_string(),
			"WebUSB Transport\n\
			 IS SUPPORTED false\n\
			 Account: \n\
			 Account Error: WebUSB is not supported in this environment\n"
		);
	}
}
