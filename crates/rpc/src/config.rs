//! Endpoint and option configuration.
//!
//! A messaging domain is identified by its two socket paths. Every [`Bus`],
//! [`Client`] and [`Server`] of one deployment must be handed the same
//! [`Endpoints`]; independent domains (for example one per test) simply use
//! different paths.
//!
//! [`Bus`]: crate::Bus
//! [`Client`]: crate::Client
//! [`Server`]: crate::Server

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout of [`Client::request`](crate::Client::request).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default per-receive timeout of [`Client::survey`](crate::Client::survey).
pub const DEFAULT_SURVEY_TIMEOUT: Duration = Duration::from_millis(500);

/// Environment variable overriding the broadcast socket path.
pub const BROADCAST_SOCKET_ENV: &str = "BUSRPC_BROADCAST_SOCKET";

/// Environment variable overriding the subscribe socket path.
pub const SUBSCRIBE_SOCKET_ENV: &str = "BUSRPC_SUBSCRIBE_SOCKET";

/// The two socket paths of one messaging domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
	/// Bound by the bus for fan-out; clients and servers subscribe here.
	pub broadcast: PathBuf,
	/// Bound by the bus for intake; clients and servers publish here.
	pub subscribe: PathBuf,
}

impl Endpoints {
	/// Creates endpoints from explicit paths.
	pub fn new(broadcast: impl Into<PathBuf>, subscribe: impl Into<PathBuf>) -> Self {
		Self {
			broadcast: broadcast.into(),
			subscribe: subscribe.into(),
		}
	}

	/// Places both sockets inside `dir`.
	pub fn in_dir(dir: impl AsRef<Path>) -> Self {
		let dir = dir.as_ref();
		Self::new(dir.join("broadcast.sock"), dir.join("subscribe.sock"))
	}

	/// Resolves the default endpoints.
	///
	/// # Resolution Order
	///
	/// 1. `BUSRPC_BROADCAST_SOCKET` / `BUSRPC_SUBSCRIBE_SOCKET`, each independently.
	/// 2. System runtime directory (e.g. `$XDG_RUNTIME_DIR`) if it is writable.
	/// 3. System temp directory.
	///
	/// The default file names are `busrpc-broadcast.sock` and `busrpc-subscribe.sock`.
	#[must_use]
	pub fn from_env() -> Self {
		let dir = dirs::runtime_dir()
			.filter(|p| std::fs::create_dir_all(p).is_ok())
			.unwrap_or_else(std::env::temp_dir);
		let resolve = |var: &str, file: &str| std::env::var_os(var).map(PathBuf::from).unwrap_or_else(|| dir.join(file));
		Self::new(
			resolve(BROADCAST_SOCKET_ENV, "busrpc-broadcast.sock"),
			resolve(SUBSCRIBE_SOCKET_ENV, "busrpc-subscribe.sock"),
		)
	}
}

impl Default for Endpoints {
	fn default() -> Self {
		Self::from_env()
	}
}

/// Server tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
	/// Maximum number of handler invocations running at once.
	pub workers: usize,
}

impl Default for ServerOptions {
	fn default() -> Self {
		Self {
			workers: busrpc_worker::DEFAULT_POOL_SIZE,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn in_dir_uses_fixed_file_names() {
		let endpoints = Endpoints::in_dir("/run/bus");
		assert_eq!(endpoints.broadcast, PathBuf::from("/run/bus/broadcast.sock"));
		assert_eq!(endpoints.subscribe, PathBuf::from("/run/bus/subscribe.sock"));
	}

	#[test]
	fn default_paths_are_distinct() {
		let endpoints = Endpoints::from_env();
		assert_ne!(endpoints.broadcast, endpoints.subscribe);
	}

	#[test]
	fn server_defaults_to_four_workers() {
		assert_eq!(ServerOptions::default().workers, 4);
	}
}
