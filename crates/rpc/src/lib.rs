//! Lightweight RPC over a local publish/subscribe bus.
//!
//! Callers invoke named methods without knowing which process answers:
//! * [`Bus`]: relays every published message to every subscriber
//! * [`Client`]: `request` (one reply), `survey` (all replies), `singleshot` (none)
//! * [`Server`]: registers handlers and dispatches requests to a worker pool
//!
//! All three are configured with the same [`Endpoints`].

#![warn(missing_docs)]

pub mod bus;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod server;

pub use bus::Bus;
pub use client::Client;
pub use config::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_SURVEY_TIMEOUT, Endpoints, ServerOptions};
pub use envelope::{Direction, Envelope, EnvelopeError};
pub use error::{Error, Result};
pub use server::{Handler, Server, ServerState};
