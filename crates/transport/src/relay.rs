use tokio_util::sync::CancellationToken;

use crate::{PubSocket, SubSocket};

/// Forwards every message received on `sub` to `publisher`.
///
/// Runs until `shutdown` is cancelled (returning `Ok`) or either side fails.
pub async fn relay(sub: &mut SubSocket, publisher: &PubSocket, shutdown: &CancellationToken) -> std::io::Result<()> {
	loop {
		let msg = tokio::select! {
			_ = shutdown.cancelled() => return Ok(()),
			msg = sub.recv() => msg?,
		};
		tracing::trace!(len = msg.len(), "relaying message");
		publisher.send(msg).await?;
	}
}
