use std::sync::{Arc, RwLock};

use bytes::Bytes;

/// Shared set of subscription prefixes.
///
/// An empty prefix matches every message; an empty set matches nothing.
#[derive(Debug, Default, Clone)]
pub(crate) struct Filters {
	prefixes: Arc<RwLock<Vec<Bytes>>>,
}

impl Filters {
	pub fn add(&self, prefix: &[u8]) {
		if let Ok(mut guard) = self.prefixes.write()
			&& !guard.iter().any(|p| p.as_ref() == prefix)
		{
			guard.push(Bytes::copy_from_slice(prefix));
		}
	}

	pub fn remove(&self, prefix: &[u8]) {
		if let Ok(mut guard) = self.prefixes.write() {
			guard.retain(|p| p.as_ref() != prefix);
		}
	}

	pub fn matches(&self, msg: &[u8]) -> bool {
		let Ok(guard) = self.prefixes.read() else {
			return false;
		};
		guard.iter().any(|p| msg.starts_with(p))
	}
}

#[cfg(test)]
mod tests {
	use super::Filters;

	#[test]
	fn prefix_matching() {
		let filters = Filters::default();
		assert!(!filters.matches(b"/rep/echo/:x"));

		filters.add(b"/rep/echo/");
		assert!(filters.matches(b"/rep/echo/:x"));
		assert!(!filters.matches(b"/rep/echo2/:x"));
		assert!(!filters.matches(b"/req/echo/:x"));

		filters.remove(b"/rep/echo/");
		assert!(!filters.matches(b"/rep/echo/:x"));

		filters.add(b"");
		assert!(filters.matches(b"anything"));
	}
}
