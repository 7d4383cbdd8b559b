//! Length-prefixed message framing.
//!
//! Every message is a `u32` little-endian length followed by that many bytes.
//! Zero-length frames never carry application data; publishers use them as a
//! readiness marker towards freshly connected subscribers.

use std::io::{Error as IoError, ErrorKind};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted message body.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

fn too_large(len: usize) -> IoError {
	IoError::new(ErrorKind::InvalidData, format!("frame of {len} bytes exceeds limit of {MAX_FRAME_LEN}"))
}

/// Writes one frame and flushes it.
pub async fn write_frame(output: &mut (impl AsyncWrite + Unpin), body: &[u8]) -> std::io::Result<()> {
	if body.len() > MAX_FRAME_LEN {
		return Err(too_large(body.len()));
	}
	output.write_u32_le(body.len() as u32).await?;
	output.write_all(body).await?;
	output.flush().await
}

/// Reads one frame.
///
/// Returns `Ok(None)` when the peer closed the stream at a frame boundary.
pub async fn read_frame(input: &mut (impl AsyncRead + Unpin)) -> std::io::Result<Option<Bytes>> {
	let len = match input.read_u32_le().await {
		Ok(len) => len as usize,
		Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
		Err(e) => return Err(e),
	};
	if len > MAX_FRAME_LEN {
		return Err(too_large(len));
	}
	let mut buf = vec![0u8; len];
	input.read_exact(&mut buf).await?;
	Ok(Some(Bytes::from(buf)))
}
