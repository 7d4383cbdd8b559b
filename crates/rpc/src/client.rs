//! Calling side: request, survey and singleshot.

use std::sync::Arc;
use std::time::Duration;

use busrpc_transport::{PubSocket, SubSocket};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_SURVEY_TIMEOUT, Endpoints};
use crate::envelope::{Direction, Envelope, call_prefix, ensure_method};
use crate::{Error, Result};

/// Issues calls against a bus.
///
/// Cloning is cheap and shares the publish connection; every call opens its
/// own subscriber, so clones can call concurrently without coordination.
#[derive(Debug, Clone)]
pub struct Client {
	endpoints: Endpoints,
	publisher: Arc<PubSocket>,
}

impl Client {
	/// Connects the long-lived publish socket to the bus.
	pub async fn connect(endpoints: Endpoints) -> Result<Self> {
		let publisher = PubSocket::connect(&endpoints.subscribe).await?;
		Ok(Self {
			endpoints,
			publisher: Arc::new(publisher),
		})
	}

	/// Returns the endpoints this client talks to.
	pub fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	/// Calls `method` and waits up to [`DEFAULT_REQUEST_TIMEOUT`] for one reply.
	pub async fn request(&self, method: &str, payload: &str) -> Result<String> {
		self.request_timeout(method, payload, DEFAULT_REQUEST_TIMEOUT).await
	}

	/// Calls `method` and waits up to `timeout` for one reply.
	///
	/// # Errors
	///
	/// [`Error::Timeout`] if nothing answered in time, [`Error::Remote`] if the
	/// handler failed. An empty reply is `Ok(String::new())`.
	pub async fn request_timeout(&self, method: &str, payload: &str, timeout: Duration) -> Result<String> {
		ensure_method(method)?;
		let mut call = PendingCall::open(&self.endpoints, method).await?;
		self.publish(&call.request(payload)).await?;

		let deadline = Instant::now() + timeout;
		loop {
			let remaining = deadline.saturating_duration_since(Instant::now());
			let Some(raw) = call.sub.recv_timeout(remaining).await? else {
				tracing::debug!(method, correlation = %call.id, "request timed out");
				return Err(Error::Timeout {
					method: method.to_owned(),
					after: timeout,
				});
			};
			if let Some(outcome) = settle(Envelope::decode(&raw)?) {
				return outcome;
			}
		}
	}

	/// Calls `method` on every responder, collecting replies until
	/// [`DEFAULT_SURVEY_TIMEOUT`] passes without a new one.
	pub async fn survey(&self, method: &str, payload: &str) -> Result<Vec<String>> {
		self.survey_timeout(method, payload, DEFAULT_SURVEY_TIMEOUT).await
	}

	/// Calls `method` on every responder, collecting replies in arrival order
	/// until `timeout` passes without a new one.
	///
	/// Faulted responders are logged and left out. No responders at all is an
	/// empty result, not an error.
	pub async fn survey_timeout(&self, method: &str, payload: &str, timeout: Duration) -> Result<Vec<String>> {
		ensure_method(method)?;
		let mut call = PendingCall::open(&self.endpoints, method).await?;
		self.publish(&call.request(payload)).await?;

		let mut replies = Vec::new();
		while let Some(raw) = call.sub.recv_timeout(timeout).await? {
			match Envelope::decode(&raw) {
				Ok(answer) => match settle(answer) {
					Some(Ok(payload)) => replies.push(payload),
					Some(Err(e)) => tracing::warn!(method, error = %e, "survey responder failed"),
					None => {}
				},
				Err(e) => {
					tracing::warn!(method, error = %e, "dropping malformed survey reply");
				}
			}
		}
		tracing::debug!(method, correlation = %call.id, replies = replies.len(), "survey closed");
		Ok(replies)
	}

	/// Publishes a request without waiting for, or expecting, any reply.
	pub async fn singleshot(&self, method: &str, payload: &str) -> Result<()> {
		ensure_method(method)?;
		self.publish(&Envelope::request(method, payload)).await
	}

	async fn publish(&self, envelope: &Envelope) -> Result<()> {
		tracing::debug!(
			method = %envelope.method,
			correlation = envelope.correlation.as_deref().unwrap_or(""),
			"publishing request"
		);
		self.publisher.send(envelope.to_bytes()).await?;
		Ok(())
	}
}

/// Turns the answer to a request into its outcome; `None` for anything that
/// is neither a reply nor a fault.
fn settle(answer: Envelope) -> Option<Result<String>> {
	match answer.direction {
		Direction::Reply => Some(Ok(answer.payload)),
		Direction::Fault => Some(Err(Error::Remote {
			method: answer.method,
			message: answer.payload,
		})),
		Direction::Request => {
			tracing::warn!(method = %answer.method, "ignoring request seen on a reply subscription");
			None
		}
	}
}

/// Call-scoped subscriber listening for the answers to one request.
///
/// Dropped, on every exit path, when the call returns.
struct PendingCall {
	id: String,
	method: String,
	sub: SubSocket,
}

impl PendingCall {
	async fn open(endpoints: &Endpoints, method: &str) -> Result<Self> {
		let id = Uuid::new_v4().simple().to_string();
		let sub = SubSocket::connect(&endpoints.broadcast).await?;
		sub.subscribe(call_prefix(Direction::Reply, method, &id));
		sub.subscribe(call_prefix(Direction::Fault, method, &id));
		Ok(Self {
			id,
			method: method.to_owned(),
			sub,
		})
	}

	fn request(&self, payload: &str) -> Envelope {
		Envelope::request(self.method.as_str(), payload).with_correlation(self.id.as_str())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn settle_maps_replies_and_faults() {
		let request = Envelope::request("sum", "1 2").with_correlation("c1");
		assert_eq!(settle(request.to_reply("3")).unwrap().unwrap(), "3");
		match settle(request.to_fault("overflow")) {
			Some(Err(Error::Remote { method, message })) => {
				assert_eq!(method, "sum");
				assert_eq!(message, "overflow");
			}
			other => panic!("expected a remote fault, got {other:?}"),
		}
	}

	#[test]
	fn settle_skips_requests() {
		assert!(settle(Envelope::request("sum", "1 2").with_correlation("c1")).is_none());
	}
}
