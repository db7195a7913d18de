//! Stream decoder for fixed-length or connection-terminated bodies (spec
//! §4.9) — the `identity` transfer encoding, which is just "copy bytes",
//! but in two distinct end-of-body conditions the channel must tell apart.

use crate::error::{Error, Result};
use crate::transport::{IoOutcome, Transport};

pub enum IdentityReadOutcome {
	Read(usize),
	WouldBlock,
	Eof,
}

/// Whether the channel should force the connection closed once this body
/// finishes, regardless of what `Connection:`/keep-alive policy said (spec
/// §4.9: length-unknown bodies are only safe to read until the transport's
/// own EOF, so the connection cannot be reused afterward).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
	LengthKnown,
	LengthUnknown,
}

pub struct IdentityBodyReader {
	mode: IdentityMode,
	remaining: Option<u64>,
	done: bool,
	pending: Vec<u8>,
}

impl IdentityBodyReader {
	pub fn length_known(content_length: u64) -> IdentityBodyReader {
		IdentityBodyReader { mode: IdentityMode::LengthKnown, remaining: Some(content_length), done: content_length == 0, pending: Vec::new() }
	}

	pub fn length_unknown() -> IdentityBodyReader {
		IdentityBodyReader { mode: IdentityMode::LengthUnknown, remaining: None, done: false, pending: Vec::new() }
	}

	/// Seeds this reader with bytes already pulled off the transport
	/// before it existed (the header reader's socket read commonly
	/// overshoots into the start of the body). Must be called before the
	/// first `read`.
	pub fn prefill(&mut self, bytes: &[u8]) {
		self.pending.extend_from_slice(bytes);
	}

	pub fn mode(&self) -> IdentityMode {
		self.mode
	}

	pub fn is_done(&self) -> bool {
		self.done
	}

	pub fn read(&mut self, transport: &mut dyn Transport, out: &mut [u8]) -> Result<IdentityReadOutcome> {
		if !self.pending.is_empty() {
			let want = match self.mode {
				IdentityMode::LengthKnown => (self.remaining.unwrap_or(0) as usize).min(self.pending.len()).min(out.len()),
				IdentityMode::LengthUnknown => self.pending.len().min(out.len()),
			};
			out[..want].copy_from_slice(&self.pending[..want]);
			self.pending.drain(..want);
			if let IdentityMode::LengthKnown = self.mode {
				let remaining = self.remaining.unwrap_or(0) - want as u64;
				self.remaining = Some(remaining);
				if remaining == 0 {
					self.done = true;
				}
			}
			return Ok(IdentityReadOutcome::Read(want));
		}

		if self.done {
			return Ok(IdentityReadOutcome::Eof);
		}

		match self.mode {
			IdentityMode::LengthKnown => {
				let remaining = self.remaining.unwrap_or(0);
				let want = remaining.min(out.len() as u64) as usize;
				match transport.read_some(&mut out[..want])? {
					IoOutcome::Ready(n) => {
						let remaining = remaining - n as u64;
						self.remaining = Some(remaining);
						if remaining == 0 {
							self.done = true;
						}
						Ok(IdentityReadOutcome::Read(n))
					}
					IoOutcome::WouldBlock => Ok(IdentityReadOutcome::WouldBlock),
					IoOutcome::Eof => Err(Error::LostConnection("connection closed before Content-Length bytes were read".into()).into()),
				}
			}
			IdentityMode::LengthUnknown => match transport.read_some(out)? {
				IoOutcome::Ready(n) => Ok(IdentityReadOutcome::Read(n)),
				IoOutcome::WouldBlock => Ok(IdentityReadOutcome::WouldBlock),
				IoOutcome::Eof => {
					self.done = true;
					Ok(IdentityReadOutcome::Eof)
				}
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	struct CursorTransport(Cursor<Vec<u8>>);

	impl Transport for CursorTransport {
		fn read_some(&mut self, buf: &mut [u8]) -> Result<IoOutcome> {
			use std::io::Read;
			let n = self.0.read(buf).unwrap();
			if n == 0 {
				Ok(IoOutcome::Eof)
			} else {
				Ok(IoOutcome::Ready(n))
			}
		}
		fn write_some(&mut self, _buf: &[u8]) -> Result<IoOutcome> {
			unreachable!()
		}
		fn close(&mut self) {}
	}

	#[test]
	fn length_known_stops_exactly_at_content_length() {
		let mut transport = CursorTransport(Cursor::new(b"Hello World, trailing garbage".to_vec()));
		let mut reader = IdentityBodyReader::length_known(11);
		let mut out = Vec::new();
		let mut buf = [0u8; 4];
		loop {
			match reader.read(&mut transport, &mut buf).unwrap() {
				IdentityReadOutcome::Read(n) => out.extend_from_slice(&buf[..n]),
				IdentityReadOutcome::WouldBlock => panic!("fixture is fully buffered"),
				IdentityReadOutcome::Eof => break,
			}
		}
		assert_eq!(out, b"Hello World");
	}

	/// Scenario S1-style overread: the header reader's socket read pulled
	/// part of the body in along with the headers before the decoder
	/// existed; that leftover has to be drained before the transport.
	#[test]
	fn length_known_drains_prefill_before_transport() {
		let mut transport = CursorTransport(Cursor::new(b"World".to_vec()));
		let mut reader = IdentityBodyReader::length_known(11);
		reader.prefill(b"Hello ");
		let mut out = Vec::new();
		let mut buf = [0u8; 4];
		loop {
			match reader.read(&mut transport, &mut buf).unwrap() {
				IdentityReadOutcome::Read(n) => out.extend_from_slice(&buf[..n]),
				IdentityReadOutcome::WouldBlock => panic!("fixture is fully buffered"),
				IdentityReadOutcome::Eof => break,
			}
		}
		assert_eq!(out, b"Hello World");
	}

	#[test]
	fn length_unknown_reads_until_transport_eof() {
		let mut transport = CursorTransport(Cursor::new(b"all of it".to_vec()));
		let mut reader = IdentityBodyReader::length_unknown();
		let mut out = Vec::new();
		let mut buf = [0u8; 4];
		loop {
			match reader.read(&mut transport, &mut buf).unwrap() {
				IdentityReadOutcome::Read(n) => out.extend_from_slice(&buf[..n]),
				IdentityReadOutcome::WouldBlock => panic!("fixture is fully buffered"),
				IdentityReadOutcome::Eof => break,
			}
		}
		assert_eq!(out, b"all of it");
	}

	#[test]
	fn zero_length_is_immediately_done() {
		let mut reader = IdentityBodyReader::length_known(0);
		assert!(reader.is_done());
	}
}
