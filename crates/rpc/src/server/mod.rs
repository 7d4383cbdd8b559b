//! Serving side: method registration and concurrent dispatch.

mod dispatch;
mod registry;

use std::sync::Arc;

use busrpc_transport::{PubSocket, SubSocket};
use busrpc_worker::{TaskClass, WorkerPool};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use self::dispatch::Dispatcher;
use self::registry::MethodRegistry;
pub use self::registry::Handler;
use crate::config::{Endpoints, ServerOptions};
use crate::envelope::{Direction, ensure_method, topic_prefix};
use crate::{Error, Result};

/// Server lifecycle.
///
/// `Created → Registering → Running → Stopping → Stopped`, and from
/// `Stopped` back to `Registering` or `Running` for a stop/restart cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
	/// Nothing registered yet.
	Created,
	/// Methods registered, not receiving.
	Registering,
	/// Receive loop active; registration is rejected.
	Running,
	/// Receive loop asked to exit; waiting for it and for in-flight handlers.
	Stopping,
	/// Fully stopped; registration is allowed again.
	Stopped,
}

/// Exposes registered methods as bus-addressable RPC targets.
///
/// Requests are received on one task and each becomes an independent unit of
/// work on a bounded [`WorkerPool`]; replies carry no ordering guarantee.
#[derive(Debug)]
pub struct Server {
	endpoints: Endpoints,
	publisher: Arc<PubSocket>,
	registry: Arc<MethodRegistry>,
	pool: WorkerPool,
	state: ServerState,
	receiver: Option<Receiver>,
}

#[derive(Debug)]
struct Receiver {
	shutdown: CancellationToken,
	task: JoinHandle<()>,
}

impl Server {
	/// Connects the reply publish socket to the bus.
	///
	/// # Errors
	///
	/// [`Error::InvalidOptions`] if `options.workers` is zero, or an I/O error
	/// if the bus is unreachable.
	pub async fn connect(endpoints: Endpoints, options: ServerOptions) -> Result<Self> {
		if options.workers == 0 {
			return Err(Error::InvalidOptions("workers must be at least 1"));
		}
		let publisher = PubSocket::connect(&endpoints.subscribe).await?;
		Ok(Self {
			endpoints,
			publisher: Arc::new(publisher),
			registry: Arc::default(),
			pool: WorkerPool::new("busrpc-server", options.workers),
			state: ServerState::Created,
			receiver: None,
		})
	}

	/// Returns the current lifecycle state.
	pub fn state(&self) -> ServerState {
		self.state
	}

	/// Returns the registered method names in sorted order.
	pub fn methods(&self) -> Vec<String> {
		self.registry.methods().map(str::to_owned).collect()
	}

	/// Returns the endpoints this server talks to.
	pub fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	/// Registers `handler` for `method`, replacing any previous handler.
	///
	/// Only allowed while the server is not running: the live subscription set
	/// cannot be extended, so the call is rejected with a warning and nothing
	/// changes. Stop, register, then start again.
	///
	/// # Errors
	///
	/// [`Error::ServerRunning`] while running, [`Error::InvalidMethod`] for an
	/// unaddressable name.
	pub fn register<F>(&mut self, method: impl Into<String>, handler: F) -> Result<()>
	where
		F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
	{
		let method = method.into();
		if matches!(self.state, ServerState::Running | ServerState::Stopping) {
			tracing::warn!(method = %method, "server is running; stop it before registering new methods");
			return Err(Error::ServerRunning);
		}
		ensure_method(&method)?;

		if Arc::make_mut(&mut self.registry).insert(method.clone(), Arc::new(handler)) {
			tracing::debug!(method = %method, "replaced method handler");
		} else {
			tracing::debug!(method = %method, "registered method");
		}
		self.state = ServerState::Registering;
		Ok(())
	}

	/// Subscribes to every registered method and starts the receive loop.
	///
	/// Starting a running server only logs a warning.
	///
	/// # Errors
	///
	/// Returns an error, also logged, if the bus cannot be reached.
	pub async fn start(&mut self) -> Result<()> {
		if self.state == ServerState::Running {
			tracing::warn!("server already running");
			return Ok(());
		}
		let sub = self.subscribe().await.inspect_err(|e| {
			tracing::error!(error = %e, broadcast = %self.endpoints.broadcast.display(), "server failed to start");
		})?;

		let dispatcher = Dispatcher {
			registry: Arc::clone(&self.registry),
			publisher: Arc::clone(&self.publisher),
			pool: self.pool.clone(),
		};
		let shutdown = CancellationToken::new();
		let task = busrpc_worker::spawn(TaskClass::Io, dispatcher.receive_loop(sub, shutdown.clone()));
		self.receiver = Some(Receiver { shutdown, task });
		self.state = ServerState::Running;
		tracing::info!(methods = ?self.registry, workers = self.pool.size(), "server started");
		Ok(())
	}

	async fn subscribe(&self) -> std::io::Result<SubSocket> {
		if self.registry.is_empty() {
			tracing::warn!("starting server with no registered methods");
		}
		let sub = SubSocket::connect(&self.endpoints.broadcast).await?;
		for method in self.registry.methods() {
			let prefix = topic_prefix(Direction::Request, method);
			tracing::debug!(prefix = %prefix, "subscribing");
			sub.subscribe(prefix);
		}
		Ok(sub)
	}

	/// Stops receiving, then waits for in-flight handlers to publish their
	/// replies.
	///
	/// # Errors
	///
	/// [`Error::NotRunning`] if the server was never started or is already
	/// stopped.
	pub async fn stop(&mut self) -> Result<()> {
		let Some(receiver) = self.receiver.take() else {
			return Err(Error::NotRunning);
		};
		self.state = ServerState::Stopping;
		receiver.shutdown.cancel();
		if let Err(e) = receiver.task.await {
			tracing::error!(error = %e, "server receiver failed to join");
		}
		self.pool.wait_idle().await;
		self.state = ServerState::Stopped;
		tracing::info!("server stopped");
		Ok(())
	}
}

impl Drop for Server {
	fn drop(&mut self) {
		if let Some(receiver) = &self.receiver {
			receiver.shutdown.cancel();
		}
	}
}
