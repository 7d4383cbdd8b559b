//! Message-oriented publish/subscribe sockets for local interprocess buses.
//!
//! Two socket roles exist, each of which can either bind a Unix domain socket
//! path or connect to one:
//!
//! * [`PubSocket`]: sends messages. Bound, it fans every message out to all
//!   accepted subscribers; connected, it delivers to one bound [`SubSocket`].
//! * [`SubSocket`]: receives messages matching its prefix subscriptions.
//!
//! [`relay`] pumps a bound subscriber into a bound publisher, which is all a
//! broadcast bus needs.

#![warn(missing_docs)]

pub mod frame;
mod filter;
mod publisher;
mod relay;
mod subscriber;

pub use frame::{MAX_FRAME_LEN, read_frame, write_frame};
pub use publisher::PubSocket;
pub use relay::relay;
pub use subscriber::SubSocket;

/// Removes a stale socket file left behind by a previous binder.
async fn remove_stale_socket(path: &std::path::Path) -> std::io::Result<()> {
	match tokio::fs::remove_file(path).await {
		Ok(()) => {
			tracing::debug!(path = %path.display(), "removed stale socket file");
			Ok(())
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(e),
	}
}
