use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A registered method body: request payload in, reply payload out.
pub type Handler = Arc<dyn Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static>;

/// Method name to handler mapping.
///
/// Mutated only while the owning server is stopped; the receive loop reads a
/// shared snapshot without locking.
#[derive(Clone, Default)]
pub(crate) struct MethodRegistry {
	handlers: BTreeMap<String, Handler>,
}

impl MethodRegistry {
	/// Inserts or replaces a handler, returning true if one was replaced.
	pub fn insert(&mut self, method: String, handler: Handler) -> bool {
		self.handlers.insert(method, handler).is_some()
	}

	pub fn get(&self, method: &str) -> Option<&Handler> {
		self.handlers.get(method)
	}

	pub fn methods(&self) -> impl Iterator<Item = &str> {
		self.handlers.keys().map(String::as_str)
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.is_empty()
	}
}

impl fmt::Debug for MethodRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.handlers.keys()).finish()
	}
}
