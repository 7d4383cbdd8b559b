use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use busrpc_worker::TaskClass;
use bytes::Bytes;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::frame::write_frame;

/// Outbound queue depth per subscriber of a bound publisher.
const PEER_QUEUE: usize = 1024;

/// Publishing socket.
///
/// Sending never waits for subscribers to consume messages: a bound publisher
/// drops messages for subscribers whose queue is full, exactly like a
/// broadcast medium that cannot hold state for slow listeners.
#[derive(Debug)]
pub struct PubSocket {
	mode: Mode,
}

#[derive(Debug)]
enum Mode {
	Connected {
		path: PathBuf,
		stream: Mutex<Option<UnixStream>>,
	},
	Bound {
		path: PathBuf,
		peers: Arc<StdMutex<Vec<mpsc::Sender<Bytes>>>>,
		shutdown: CancellationToken,
	},
}

impl PubSocket {
	/// Connects to a bound [`SubSocket`](crate::SubSocket).
	///
	/// A failed send drops the connection; the next send reconnects.
	pub async fn connect(path: impl AsRef<Path>) -> std::io::Result<Self> {
		let path = path.as_ref().to_path_buf();
		let stream = UnixStream::connect(&path).await?;
		tracing::debug!(path = %path.display(), "publisher connected");
		Ok(Self {
			mode: Mode::Connected {
				path,
				stream: Mutex::new(Some(stream)),
			},
		})
	}

	/// Binds `path` and fans every sent message out to all subscribers that
	/// connect to it.
	pub async fn bind(path: impl AsRef<Path>) -> std::io::Result<Self> {
		let path = path.as_ref().to_path_buf();
		crate::remove_stale_socket(&path).await?;
		let listener = UnixListener::bind(&path)?;
		tracing::info!(path = %path.display(), "publisher bound");

		let peers = Arc::new(StdMutex::new(Vec::new()));
		let shutdown = CancellationToken::new();
		busrpc_worker::spawn(TaskClass::Io, accept_subscribers(listener, Arc::clone(&peers), shutdown.clone()));

		Ok(Self {
			mode: Mode::Bound { path, peers, shutdown },
		})
	}

	/// Publishes one message.
	pub async fn send(&self, msg: Bytes) -> std::io::Result<()> {
		match &self.mode {
			Mode::Connected { path, stream } => {
				let mut guard = stream.lock().await;
				let mut conn = match guard.take() {
					Some(conn) => conn,
					None => {
						tracing::debug!(path = %path.display(), "publisher reconnecting");
						UnixStream::connect(path).await?
					}
				};
				write_frame(&mut conn, &msg).await?;
				*guard = Some(conn);
				Ok(())
			}
			Mode::Bound { peers, .. } => {
				let Ok(mut guard) = peers.lock() else {
					return Ok(());
				};
				guard.retain(|peer| match peer.try_send(msg.clone()) {
					Ok(()) => true,
					Err(mpsc::error::TrySendError::Full(_)) => {
						tracing::debug!("subscriber queue full, message dropped");
						true
					}
					Err(mpsc::error::TrySendError::Closed(_)) => false,
				});
				Ok(())
			}
		}
	}

	/// Returns the number of subscribers attached to a bound publisher.
	///
	/// Always zero for a connected publisher.
	pub fn subscriber_count(&self) -> usize {
		match &self.mode {
			Mode::Connected { .. } => 0,
			Mode::Bound { peers, .. } => peers.lock().map(|p| p.iter().filter(|tx| !tx.is_closed()).count()).unwrap_or(0),
		}
	}
}

impl Drop for PubSocket {
	fn drop(&mut self) {
		if let Mode::Bound { path, shutdown, .. } = &self.mode {
			shutdown.cancel();
			let _ = std::fs::remove_file(path);
		}
	}
}

async fn accept_subscribers(listener: UnixListener, peers: Arc<StdMutex<Vec<mpsc::Sender<Bytes>>>>, shutdown: CancellationToken) {
	loop {
		tokio::select! {
			_ = shutdown.cancelled() => break,
			res = listener.accept() => match res {
				Ok((stream, _addr)) => {
					let (tx, rx) = mpsc::channel(PEER_QUEUE);
					// Register before the ready frame goes out so the subscriber
					// never observes readiness without being in the fan-out set.
					if let Ok(mut guard) = peers.lock() {
						guard.push(tx);
					}
					busrpc_worker::spawn(TaskClass::Io, feed_subscriber(stream, rx, shutdown.child_token()));
				}
				Err(e) => {
					tracing::error!(error = %e, "failed to accept subscriber");
				}
			}
		}
	}
	tracing::debug!("publisher accept loop stopped");
}

async fn feed_subscriber(mut stream: UnixStream, mut rx: mpsc::Receiver<Bytes>, shutdown: CancellationToken) {
	if let Err(e) = write_frame(&mut stream, &[]).await {
		tracing::debug!(error = %e, "subscriber left before ready");
		return;
	}
	loop {
		let msg = tokio::select! {
			_ = shutdown.cancelled() => break,
			msg = rx.recv() => match msg {
				Some(msg) => msg,
				None => break,
			},
		};
		if let Err(e) = write_frame(&mut stream, &msg).await {
			tracing::debug!(error = %e, "subscriber disconnected");
			break;
		}
	}
}
