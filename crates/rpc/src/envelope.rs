//! Wire envelopes and topic addressing.
//!
//! Every message on the bus is an ASCII envelope:
//!
//! ```text
//! /<tag>/<method>/<correlation>:<payload>
//! ```
//!
//! `tag` is `req`, `rep` or `err`. The correlation slot is empty for calls
//! that expect no reply and for peers that never fill it, which yields the
//! bare `/req/<method>/:<payload>` form. Subscribers filter on byte prefixes
//! of this encoding, see [`topic_prefix`] and [`call_prefix`].

use bytes::Bytes;
use thiserror::Error;

/// Flow direction of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
	/// Client to server.
	Request,
	/// Server to client, carrying a handler result.
	Reply,
	/// Server to client, carrying a handler failure.
	Fault,
}

impl Direction {
	/// Returns the wire tag.
	pub const fn tag(self) -> &'static str {
		match self {
			Self::Request => "req",
			Self::Reply => "rep",
			Self::Fault => "err",
		}
	}

	/// Parses a wire tag.
	pub fn from_tag(tag: &str) -> Option<Self> {
		match tag {
			"req" => Some(Self::Request),
			"rep" => Some(Self::Reply),
			"err" => Some(Self::Fault),
			_ => None,
		}
	}
}

/// Reasons an envelope fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
	/// The raw message is not UTF-8.
	#[error("envelope is not valid UTF-8")]
	NotUtf8,
	/// No `:` separates head and payload.
	#[error("envelope has no ':' separator")]
	MissingSeparator,
	/// The head does not start with a known `/<tag>/`.
	#[error("unknown direction in envelope head {0:?}")]
	UnknownDirection(String),
	/// The method segment is not a valid method name.
	#[error("invalid method {0:?} in envelope")]
	InvalidMethod(String),
}

/// The unit exchanged over the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
	/// Request, reply or fault.
	pub direction: Direction,
	/// Addressed method; never contains `/`, `:`, whitespace or NUL.
	pub method: String,
	/// Per-call identifier echoed by servers; `None` when the slot is empty.
	pub correlation: Option<String>,
	/// Opaque content after the first `:`.
	pub payload: String,
}

impl Envelope {
	/// Creates a request without a correlation id.
	pub fn request(method: impl Into<String>, payload: impl Into<String>) -> Self {
		Self {
			direction: Direction::Request,
			method: method.into(),
			correlation: None,
			payload: payload.into(),
		}
	}

	/// Sets the correlation id.
	#[must_use]
	pub fn with_correlation(mut self, id: impl Into<String>) -> Self {
		self.correlation = Some(id.into());
		self
	}

	/// Builds the reply to this request, keeping method and correlation.
	pub fn to_reply(&self, payload: impl Into<String>) -> Self {
		self.answer(Direction::Reply, payload.into())
	}

	/// Builds the fault answer to this request, keeping method and correlation.
	pub fn to_fault(&self, message: impl Into<String>) -> Self {
		self.answer(Direction::Fault, message.into())
	}

	fn answer(&self, direction: Direction, payload: String) -> Self {
		Self {
			direction,
			method: self.method.clone(),
			correlation: self.correlation.clone(),
			payload,
		}
	}

	/// Encodes to the wire form.
	pub fn encode(&self) -> String {
		format!(
			"/{}/{}/{}:{}",
			self.direction.tag(),
			self.method,
			self.correlation.as_deref().unwrap_or(""),
			self.payload
		)
	}

	/// Encodes to a transport message.
	pub fn to_bytes(&self) -> Bytes {
		Bytes::from(self.encode().into_bytes())
	}

	/// Decodes a raw message.
	///
	/// The head is everything before the first `:`. A missing trailing `/`
	/// after the method and a single trailing NUL are both tolerated.
	pub fn decode(raw: &[u8]) -> Result<Self, EnvelopeError> {
		let text = std::str::from_utf8(raw).map_err(|_| EnvelopeError::NotUtf8)?;
		let text = text.strip_suffix('\0').unwrap_or(text);
		let (head, payload) = text.split_once(':').ok_or(EnvelopeError::MissingSeparator)?;

		let unknown = || EnvelopeError::UnknownDirection(head.to_owned());
		let (tag, rest) = head.strip_prefix('/').and_then(|h| h.split_once('/')).ok_or_else(unknown)?;
		let direction = Direction::from_tag(tag).ok_or_else(unknown)?;

		let (method, correlation) = rest.split_once('/').unwrap_or((rest, ""));
		if !is_valid_method(method) {
			return Err(EnvelopeError::InvalidMethod(method.to_owned()));
		}

		Ok(Self {
			direction,
			method: method.to_owned(),
			correlation: (!correlation.is_empty()).then(|| correlation.to_owned()),
			payload: payload.to_owned(),
		})
	}
}

/// Returns true if `method` can be addressed on the bus.
pub fn is_valid_method(method: &str) -> bool {
	!method.is_empty() && !method.chars().any(|c| c == '/' || c == ':' || c == '\0' || c.is_whitespace())
}

pub(crate) fn ensure_method(method: &str) -> crate::Result<()> {
	if is_valid_method(method) {
		Ok(())
	} else {
		Err(crate::Error::InvalidMethod(method.to_owned()))
	}
}

/// Subscription prefix for every envelope of `direction` on `method`.
pub fn topic_prefix(direction: Direction, method: &str) -> String {
	format!("/{}/{}/", direction.tag(), method)
}

/// Subscription prefix for envelopes of one call.
pub fn call_prefix(direction: Direction, method: &str, correlation: &str) -> String {
	format!("/{}/{}/{}:", direction.tag(), method, correlation)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn bare_request_matches_wire_format() {
		let env = Envelope::request("echo", "hi");
		assert_eq!(env.encode(), "/req/echo/:hi");
		assert_eq!(Envelope::decode(b"/req/echo/:hi"), Ok(env));
	}

	#[test]
	fn reply_keeps_method_and_correlation() {
		let req = Envelope::request("sum", "1 2").with_correlation("c0ffee");
		let rep = req.to_reply("3");
		assert_eq!(rep.encode(), "/rep/sum/c0ffee:3");

		let fault = req.to_fault("boom");
		assert_eq!(fault.encode(), "/err/sum/c0ffee:boom");
		assert_eq!(Envelope::decode(fault.encode().as_bytes()).map(|e| e.direction), Ok(Direction::Fault));
	}

	#[test]
	fn payload_may_contain_separators() {
		let env = Envelope::decode(b"/rep/kv/:a:b/c").expect("decodes");
		assert_eq!(env.method, "kv");
		assert_eq!(env.correlation, None);
		assert_eq!(env.payload, "a:b/c");
	}

	#[test]
	fn tolerates_trailing_nul_and_missing_slash() {
		let env = Envelope::decode(b"/req/ping:data\0").expect("decodes");
		assert_eq!(env, Envelope::request("ping", "data"));
	}

	#[test]
	fn rejects_malformed_envelopes() {
		assert_eq!(Envelope::decode(b"/req/echo/"), Err(EnvelopeError::MissingSeparator));
		assert_eq!(Envelope::decode(b"/foo/echo/:x"), Err(EnvelopeError::UnknownDirection("/foo/echo/".into())));
		assert_eq!(Envelope::decode(b"req/echo/:x"), Err(EnvelopeError::UnknownDirection("req/echo/".into())));
		assert_eq!(Envelope::decode(b"/req//:x"), Err(EnvelopeError::InvalidMethod(String::new())));
		assert_eq!(Envelope::decode(&[b'/', 0xff, b':']), Err(EnvelopeError::NotUtf8));
	}

	#[test]
	fn method_validation() {
		assert!(is_valid_method("echo"));
		assert!(is_valid_method("sensor.read-temp_2"));
		for bad in ["", "a/b", "a:b", "a b", "tab\t", "nul\0"] {
			assert!(!is_valid_method(bad), "{bad:?} should be rejected");
		}
	}

	#[test]
	fn prefixes_do_not_overlap_similar_methods() {
		let prefix = topic_prefix(Direction::Request, "echo");
		assert_eq!(prefix, "/req/echo/");
		assert!(Envelope::request("echo", "").encode().starts_with(&prefix));
		assert!(!Envelope::request("echo2", "").encode().starts_with(&prefix));

		let call = call_prefix(Direction::Reply, "echo", "id1");
		assert!(Envelope::request("echo", "x").with_correlation("id1").to_reply("y").encode().starts_with(&call));
		assert!(!Envelope::request("echo", "x").with_correlation("id10").to_reply("y").encode().starts_with(&call));
	}

	proptest! {
		#[test]
		fn decode_inverts_encode(
			method in "[^/:\\s\\x00]{1,24}",
			payload in "[^\\x00]{0,64}",
			correlation in proptest::option::of("[0-9a-f]{1,32}"),
			direction in prop_oneof![Just(Direction::Request), Just(Direction::Reply), Just(Direction::Fault)],
		) {
			let env = Envelope { direction, method, correlation, payload };
			prop_assert_eq!(Envelope::decode(env.encode().as_bytes()), Ok(env));
		}
	}
}
