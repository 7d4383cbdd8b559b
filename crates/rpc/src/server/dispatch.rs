use std::sync::Arc;

use busrpc_transport::{PubSocket, SubSocket};
use busrpc_worker::{TaskClass, WorkerPool, join_error_panic_message};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use super::registry::{Handler, MethodRegistry};
use crate::envelope::{Direction, Envelope};

/// Everything the receive loop needs to turn a request into a unit of work.
#[derive(Debug, Clone)]
pub(super) struct Dispatcher {
	pub registry: Arc<MethodRegistry>,
	pub publisher: Arc<PubSocket>,
	pub pool: WorkerPool,
}

impl Dispatcher {
	/// Receives until `shutdown` fires or the bus connection is lost.
	pub async fn receive_loop(self, mut sub: SubSocket, shutdown: CancellationToken) {
		tracing::debug!(methods = ?self.registry, "server receiver running");
		loop {
			let frame = tokio::select! {
				_ = shutdown.cancelled() => break,
				frame = sub.recv() => frame,
			};
			match frame {
				Ok(frame) => self.accept(&frame),
				Err(e) => {
					tracing::error!(error = %e, "server lost its bus connection");
					break;
				}
			}
		}
		tracing::debug!("server receiver stopped");
	}

	/// Decodes one frame and submits it to the pool.
	///
	/// The envelope is decoded into owned strings here, so the submitted work
	/// never borrows from the receive buffer.
	fn accept(&self, frame: &Bytes) {
		let request = match Envelope::decode(frame) {
			Ok(env) if env.direction == Direction::Request => env,
			Ok(env) => {
				tracing::debug!(method = %env.method, direction = env.direction.tag(), "ignoring non-request envelope");
				return;
			}
			Err(e) => {
				tracing::warn!(error = %e, len = frame.len(), "dropping malformed envelope");
				return;
			}
		};
		let Some(handler) = self.registry.get(&request.method) else {
			tracing::warn!(method = %request.method, "dropping request for unregistered method");
			return;
		};
		tracing::debug!(
			method = %request.method,
			correlation = request.correlation.as_deref().unwrap_or(""),
			"dispatching request"
		);
		self.pool.submit(invoke(Arc::clone(handler), request, Arc::clone(&self.publisher)));
	}
}

/// Runs the handler and publishes its reply, or a fault if it failed.
async fn invoke(handler: Handler, mut request: Envelope, publisher: Arc<PubSocket>) {
	let data = std::mem::take(&mut request.payload);
	let outcome = busrpc_worker::spawn_blocking(TaskClass::Blocking, move || handler(&data)).await;

	let answer = match outcome {
		Ok(Ok(result)) => request.to_reply(result),
		Ok(Err(e)) => {
			let message = format!("{e:#}");
			tracing::warn!(method = %request.method, error = %message, "handler failed");
			request.to_fault(message)
		}
		Err(join) => {
			let message = match join_error_panic_message(join) {
				Some(panic) => format!("handler panicked: {panic}"),
				None => "handler was cancelled".to_owned(),
			};
			tracing::error!(method = %request.method, error = %message, "handler aborted");
			request.to_fault(message)
		}
	};

	if let Err(e) = publisher.send(answer.to_bytes()).await {
		tracing::warn!(method = %request.method, error = %e, "failed to publish reply");
	}
}
