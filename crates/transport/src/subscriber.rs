use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use busrpc_worker::TaskClass;
use bytes::Bytes;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::filter::Filters;
use crate::frame::read_frame;

/// Matching messages buffered ahead of [`SubSocket::recv`].
const INBOX_CAPACITY: usize = 1024;

/// Upper bound on waiting for a bound publisher's ready frame.
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Receiving socket with prefix subscription filters.
///
/// Messages are read by background pumps and filtered before they are
/// queued, so [`recv`](Self::recv) and [`recv_timeout`](Self::recv_timeout)
/// only ever see matching messages and are safe to cancel.
#[derive(Debug)]
pub struct SubSocket {
	inbox: mpsc::Receiver<Bytes>,
	filters: Filters,
	shutdown: CancellationToken,
	bound_path: Option<PathBuf>,
}

impl SubSocket {
	/// Connects to a bound [`PubSocket`](crate::PubSocket).
	///
	/// Returns once the publisher has registered this subscriber, so any
	/// message published afterwards is delivered (subject to the filters).
	pub async fn connect(path: impl AsRef<Path>) -> std::io::Result<Self> {
		let path = path.as_ref();
		let mut stream = UnixStream::connect(path).await?;
		match tokio::time::timeout(READY_TIMEOUT, read_frame(&mut stream)).await {
			Ok(Ok(Some(frame))) if frame.is_empty() => {}
			Ok(Ok(Some(_))) => {
				return Err(IoError::new(ErrorKind::InvalidData, "expected ready frame from publisher"));
			}
			Ok(Ok(None)) => {
				return Err(IoError::new(ErrorKind::ConnectionAborted, "publisher closed before ready"));
			}
			Ok(Err(e)) => return Err(e),
			Err(_) => {
				return Err(IoError::new(ErrorKind::TimedOut, "publisher did not signal ready"));
			}
		}
		tracing::debug!(path = %path.display(), "subscriber connected");

		let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
		let filters = Filters::default();
		let shutdown = CancellationToken::new();
		busrpc_worker::spawn(TaskClass::Io, pump(stream, tx, filters.clone(), shutdown.clone()));

		Ok(Self {
			inbox,
			filters,
			shutdown,
			bound_path: None,
		})
	}

	/// Binds `path` and merges traffic from every publisher that connects.
	pub async fn bind(path: impl AsRef<Path>) -> std::io::Result<Self> {
		let path = path.as_ref().to_path_buf();
		crate::remove_stale_socket(&path).await?;
		let listener = UnixListener::bind(&path)?;
		tracing::info!(path = %path.display(), "subscriber bound");

		let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
		let filters = Filters::default();
		let shutdown = CancellationToken::new();
		busrpc_worker::spawn(TaskClass::Io, accept_publishers(listener, tx, filters.clone(), shutdown.clone()));

		Ok(Self {
			inbox,
			filters,
			shutdown,
			bound_path: Some(path),
		})
	}

	/// Adds a prefix filter. The empty prefix subscribes to everything.
	pub fn subscribe(&self, prefix: impl AsRef<[u8]>) {
		self.filters.add(prefix.as_ref());
	}

	/// Removes a previously added prefix filter.
	pub fn unsubscribe(&self, prefix: impl AsRef<[u8]>) {
		self.filters.remove(prefix.as_ref());
	}

	/// Waits for the next matching message.
	///
	/// Fails with `ConnectionAborted` once every publisher feeding this socket
	/// has gone away.
	pub async fn recv(&mut self) -> std::io::Result<Bytes> {
		self.inbox
			.recv()
			.await
			.ok_or_else(|| IoError::new(ErrorKind::ConnectionAborted, "subscriber disconnected from publisher"))
	}

	/// Waits up to `timeout` for the next matching message.
	///
	/// Returns `Ok(None)` when the timeout elapses first.
	pub async fn recv_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<Bytes>> {
		match tokio::time::timeout(timeout, self.recv()).await {
			Ok(res) => res.map(Some),
			Err(_) => Ok(None),
		}
	}
}

impl Drop for SubSocket {
	fn drop(&mut self) {
		self.shutdown.cancel();
		if let Some(path) = &self.bound_path {
			let _ = std::fs::remove_file(path);
		}
	}
}

async fn accept_publishers(listener: UnixListener, tx: mpsc::Sender<Bytes>, filters: Filters, shutdown: CancellationToken) {
	loop {
		tokio::select! {
			_ = shutdown.cancelled() => break,
			res = listener.accept() => match res {
				Ok((stream, _addr)) => {
					busrpc_worker::spawn(TaskClass::Io, pump(stream, tx.clone(), filters.clone(), shutdown.child_token()));
				}
				Err(e) => {
					tracing::error!(error = %e, "failed to accept publisher");
				}
			}
		}
	}
	tracing::debug!("subscriber accept loop stopped");
}

/// Moves matching frames from one stream into the inbox.
async fn pump(mut stream: UnixStream, tx: mpsc::Sender<Bytes>, filters: Filters, shutdown: CancellationToken) {
	loop {
		let frame = tokio::select! {
			_ = shutdown.cancelled() => break,
			frame = read_frame(&mut stream) => frame,
		};
		match frame {
			Ok(Some(frame)) if frame.is_empty() => {}
			Ok(Some(frame)) => {
				if filters.matches(&frame) && tx.send(frame).await.is_err() {
					break;
				}
			}
			Ok(None) => break,
			Err(e) => {
				tracing::debug!(error = %e, "dropping peer after read error");
				break;
			}
		}
	}
}
