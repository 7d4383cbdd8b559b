//! Error types for bus calls and server lifecycle.

use std::time::Duration;

use thiserror::Error;

use crate::envelope::EnvelopeError;

/// Errors surfaced by [`Client`](crate::Client), [`Server`](crate::Server) and [`Bus`](crate::Bus).
#[derive(Debug, Error)]
pub enum Error {
	/// Socket setup or send failed.
	#[error("transport error: {0}")]
	Io(#[from] std::io::Error),

	/// A method name is empty or contains `/`, `:`, whitespace or NUL.
	#[error("invalid method name {0:?}")]
	InvalidMethod(String),

	/// No reply arrived within the call's timeout window.
	#[error("no reply for {method:?} within {after:?}")]
	Timeout {
		/// Method that was called.
		method: String,
		/// Timeout that elapsed.
		after: Duration,
	},

	/// The responding handler failed and published a fault.
	#[error("{method:?} failed remotely: {message}")]
	Remote {
		/// Method that was called.
		method: String,
		/// Failure description published by the server.
		message: String,
	},

	/// Server options are unusable, such as a zero-sized worker pool.
	#[error("invalid server options: {0}")]
	InvalidOptions(&'static str),

	/// A reply could not be decoded.
	#[error("malformed envelope: {0}")]
	Envelope(#[from] EnvelopeError),

	/// The server is running; methods can only be registered while stopped.
	#[error("server is running; stop it before registering methods")]
	ServerRunning,

	/// The server is not running.
	#[error("server is not running")]
	NotRunning,
}

impl Error {
	/// Returns true if this error is a call timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, Error>;
