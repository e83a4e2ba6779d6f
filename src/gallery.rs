use std::fmt;
use std::sync::Arc;

use futures::future::join_all;

use crate::adapter::TransportAdapter;
use crate::panel::Panel;
use crate::transport::TransportKind;

/// One panel per transport kind, in registry order.
pub struct Gallery {
	panels: Vec<Panel>,
}

impl Gallery {
	pub fn new(adapters: Vec<Arc<TransportAdapter>>) -> Self {
		Self {
			panels: adapters.into_iter().map(Panel::new).collect(),
		}
	}

	pub fn panels(&self) -> &[Panel] {
		&self.panels
	}

	/// Case-insensitive lookup by label.
	pub fn panel_mut(&mut self, label: &str) -> Option<&mut Panel> {
		let kind = TransportKind::from_label(label)?;
		self.panels.iter_mut().find(|p| p.adapter().kind() == kind)
	}

	/// Hand the panel of the adapter's kind a new adapter and mount it
	/// again. The support check reruns only if the adapter is a different
	/// one.
	pub async fn replace_adapter(&mut self, adapter: Arc<TransportAdapter>) -> Option<&Panel> {
		let panel = self.panels.iter_mut().find(|p| p.adapter().kind() == adapter.kind())?;
		panel.set_adapter(adapter);
		panel.mount().await;
		Some(&*panel)
	}

	/// Check support on every panel that has not been checked yet, all at once.
	pub async fn mount(&mut self) {
		join_all(self.panels.iter_mut().map(|p| p.mount())).await;
	}
}

impl fmt::Display for Gallery {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, panel) in self.panels.iter().enumerate() {
			if i > 0 {
				writeln!(f)?;
			}
			write!(f, "{panel}")?;
		}
		Ok(())
	}
}
