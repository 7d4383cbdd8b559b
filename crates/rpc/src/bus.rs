//! Broadcast relay joining every client and server into one domain.

use busrpc_transport::{PubSocket, SubSocket};
use busrpc_worker::TaskClass;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::config::Endpoints;

/// A running bus.
///
/// The relay task owns both bound sockets; it stops when [`Bus::shutdown`] is
/// called or the `Bus` is dropped, and the socket files are removed with it.
/// A relay failure ends the task for good and is logged at `error`: the whole
/// domain goes silent until a new bus is bound.
#[derive(Debug)]
pub struct Bus {
	endpoints: Endpoints,
	shutdown: CancellationToken,
	relay: Option<JoinHandle<()>>,
}

impl Bus {
	/// Binds both endpoints and starts relaying.
	///
	/// # Errors
	///
	/// Returns an error if either socket cannot be bound. The failure is also
	/// logged, since it takes the whole domain down.
	pub async fn bind(endpoints: Endpoints) -> Result<Self> {
		let (sub, publisher) = bind_endpoints(&endpoints).await.inspect_err(|e| {
			tracing::error!(
				error = %e,
				broadcast = %endpoints.broadcast.display(),
				subscribe = %endpoints.subscribe.display(),
				"bus failed to bind"
			);
		})?;
		let shutdown = CancellationToken::new();
		let relay = busrpc_worker::spawn(TaskClass::Io, run_relay(sub, publisher, shutdown.clone()));
		Ok(Self {
			endpoints,
			shutdown,
			relay: Some(relay),
		})
	}

	/// Returns the endpoints this bus serves.
	pub fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	/// Returns false once the relay task has exited.
	pub fn is_running(&self) -> bool {
		self.relay.as_ref().is_some_and(|relay| !relay.is_finished())
	}

	/// Stops relaying and waits for the relay task to exit.
	pub async fn shutdown(mut self) {
		self.shutdown.cancel();
		if let Some(relay) = self.relay.take()
			&& let Err(e) = relay.await
		{
			tracing::error!(error = %e, "bus relay task failed to join");
		}
	}
}

impl Drop for Bus {
	fn drop(&mut self) {
		self.shutdown.cancel();
	}
}

/// Runs a bus in the calling task until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if binding fails or the relay breaks down.
pub async fn serve(endpoints: &Endpoints, shutdown: CancellationToken) -> Result<()> {
	let (mut sub, publisher) = bind_endpoints(endpoints).await?;
	tracing::info!("bus relay running");
	busrpc_transport::relay(&mut sub, &publisher, &shutdown).await?;
	tracing::info!("bus relay stopped");
	Ok(())
}

async fn bind_endpoints(endpoints: &Endpoints) -> std::io::Result<(SubSocket, PubSocket)> {
	let sub = SubSocket::bind(&endpoints.subscribe).await?;
	sub.subscribe("");
	let publisher = PubSocket::bind(&endpoints.broadcast).await?;
	Ok((sub, publisher))
}

async fn run_relay(mut sub: SubSocket, publisher: PubSocket, shutdown: CancellationToken) {
	tracing::info!("bus relay running");
	match busrpc_transport::relay(&mut sub, &publisher, &shutdown).await {
		Ok(()) => tracing::info!("bus relay stopped"),
		Err(e) => tracing::error!(error = %e, "bus relay failed; messaging domain is down"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn shutdown_removes_socket_files() -> Result<()> {
		let tmp = tempfile::tempdir()?;
		let endpoints = Endpoints::in_dir(tmp.path());
		let bus = Bus::bind(endpoints.clone()).await?;
		assert!(bus.is_running());
		assert!(endpoints.broadcast.exists());
		assert!(endpoints.subscribe.exists());

		bus.shutdown().await;
		assert!(!endpoints.broadcast.exists());
		assert!(!endpoints.subscribe.exists());
		Ok(())
	}

	#[tokio::test]
	async fn bind_into_missing_directory_fails() {
		let tmp = tempfile::tempdir().expect("tempdir");
		let endpoints = Endpoints::in_dir(tmp.path().join("does/not/exist"));
		assert!(matches!(Bus::bind(endpoints).await, Err(crate::Error::Io(_))));
	}

	#[tokio::test]
	async fn serve_stops_on_cancel() -> Result<()> {
		let tmp = tempfile::tempdir()?;
		let endpoints = Endpoints::in_dir(tmp.path());
		let shutdown = CancellationToken::new();
		let task = tokio::spawn({
			let endpoints = endpoints.clone();
			let shutdown = shutdown.clone();
			async move { serve(&endpoints, shutdown).await }
		});

		let mut attempts = 0;
		while !endpoints.broadcast.exists() && attempts < 100 {
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;
			attempts += 1;
		}
		shutdown.cancel();
		task.await.expect("serve panicked")
	}
}
