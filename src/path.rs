use bitcoin::bip32::{ChildNumber, DerivationPath};

use crate::error::TransportError;

/// The Ethereum app refuses paths deeper than this.
pub const MAX_DEPTH: usize = 10;

/// First Ethereum account on the standard BIP44 branch.
pub const DEFAULT_PATH: &str = "44'/60'/0'/0/0";

/// `m/44'/60'/0'/0/0`
pub fn default_path() -> DerivationPath {
	DerivationPath::from(vec![
		ChildNumber::Hardened { index: 44 },
		ChildNumber::Hardened { index: 60 },
		ChildNumber::Hardened { index: 0 },
		ChildNumber::Normal { index: 0 },
		ChildNumber::Normal { index: 0 },
	])
}

/// Parse a path with or without the leading `m/`. Hardened components
/// take a `'` or `h` suffix.
pub fn parse(s: &str) -> Result<DerivationPath, TransportError> {
	let invalid = |reason: String| TransportError::InvalidPath {
		path: s.to_owned(),
		reason,
	};

	let full = if s == "m" || s.starts_with("m/") {
		s.to_owned()
	} else {
		format!("m/{s}")
	};
	let path: DerivationPath = full.parse().map_err(|e: bitcoin::bip32::Error| invalid(e.to_string()))?;
	if path.is_empty() {
		return Err(invalid("empty path".into()));
	}
	if path.len() > MAX_DEPTH {
		return Err(invalid(format!("more than {MAX_DEPTH} components")));
	}
	Ok(path)
}

/// Serialize as the app expects it: component count, then each component
/// as a big-endian u32.
pub fn to_apdu_bytes<P: AsRef<[ChildNumber]>>(path: &P) -> Result<Vec<u8>, TransportError> {
	let children = path.as_ref();
	if children.len() > MAX_DEPTH {
		return Err(TransportError::InvalidPath {
			path: DerivationPath::from(children).to_string(),
			reason: format!("more than {MAX_DEPTH} components"),
		});
	}

	let mut out = Vec::with_capacity(1 + 4 * children.len());
	out.push(children.len() as u8);
	for child in children {
		out.extend_from_slice(&u32::from(*child).to_be_bytes());
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_is_first_ethereum_account() {
		assert_eq!(parse(DEFAULT_PATH).unwrap(), default_path());
		assert_eq!(parse(&default_path().to_string()).unwrap(), default_path());
	}

	#[test]
	fn accepts_prefix_and_h_marker() {
		let a = parse("m/44h/60h/1h/0/7").unwrap();
		let b = parse("44'/60'/1'/0/7").unwrap();
		assert_eq!(a, b);
		let children: &[ChildNumber] = a.as_ref();
		assert_eq!(children[2], ChildNumber::Hardened { index: 1 });
		assert_eq!(children[4], ChildNumber::Normal { index: 7 });
	}

	#[test]
	fn apdu_layout() {
		let bytes = to_apdu_bytes(&default_path()).unwrap();
		assert_eq!(
			hex::encode(bytes),
			"058000002c8000003c800000000000000000000000"
		);
	}

	#[test]
	fn rejects_garbage() {
		assert!(parse("").is_err());
		assert!(parse("m").is_err());
		assert!(parse("m/").is_err());
		assert!(parse("44'/x/0").is_err());
		assert!(parse("44''/60").is_err());
		assert!(parse("2147483648").is_err());
		assert!(parse("0/0/0/0/0/0/0/0/0/0/0").is_err());
		assert!(parse("0/0/0/0/0/0/0/0/0/0").is_ok());
	}

	#[test]
	fn deep_paths_never_reach_the_device() {
		let deep = DerivationPath::from(vec![ChildNumber::Normal { index: 0 }; MAX_DEPTH + 1]);
		assert!(matches!(
			to_apdu_bytes(&deep),
			Err(TransportError::InvalidPath { .. })
		));
	}
}
