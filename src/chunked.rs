//! Stream decoder for `Transfer-Encoding: chunked` (spec §4.8).
//!
//! Mirrors the `Start`/`Data`/`End`/`Trailer`/`Done` state shape used by the
//! teacher's own chunked body reader, re-expressed as a synchronous,
//! poll-style decoder driven by [`Channel::run`](crate::channel::Channel::run)
//! instead of an `async fn read_cycle`.

use crate::error::{Error, Result};
use crate::transport::{IoOutcome, Transport};

#[derive(Debug, Clone, Copy)]
enum ChunkState {
	/// Waiting on the `hex-length[; extension]CRLF` line that starts a chunk.
	Size,
	/// Copying `remaining` bytes of chunk payload into the caller's buffer.
	Data(usize),
	/// The chunk payload has been fully copied; waiting on the trailing CRLF.
	DataCrlf,
	/// The terminal zero-length chunk was seen; draining trailer header
	/// lines until the blank line that ends them.
	Trailer,
	Done,
}

/// Outcome of one [`ChunkedBodyReader::read`] call.
pub enum ChunkedReadOutcome {
	Read(usize),
	WouldBlock,
	/// The zero-length chunk and any trailer have been fully consumed.
	Eof,
}

/// Decodes a `Transfer-Encoding: chunked` body read from an arbitrary
/// [`Transport`]. Bytes read from the transport ahead of where the caller's
/// buffer could absorb them are held in `pending` until the next call.
pub struct ChunkedBodyReader {
	state: ChunkState,
	pending: Vec<u8>,
	file_size: u64,
}

impl ChunkedBodyReader {
	pub fn new() -> ChunkedBodyReader {
		ChunkedBodyReader { state: ChunkState::Size, pending: Vec::new(), file_size: 0 }
	}

	/// Seeds `pending` with bytes already pulled off the transport before
	/// this decoder existed (the header reader's socket read commonly
	/// overshoots into the start of the body). Must be called before the
	/// first `read`.
	pub fn prefill(&mut self, bytes: &[u8]) {
		self.pending.extend_from_slice(bytes);
	}

	/// Sum of every chunk length seen so far (spec §4.8: "add this chunk
	/// length to the declared `file_size`").
	pub fn file_size(&self) -> u64 {
		self.file_size
	}

	pub fn is_done(&self) -> bool {
		matches!(self.state, ChunkState::Done)
	}

	pub fn read(&mut self, transport: &mut dyn Transport, out: &mut [u8]) -> Result<ChunkedReadOutcome> {
		loop {
			match self.state {
				ChunkState::Done => return Ok(ChunkedReadOutcome::Eof),

				ChunkState::Size => match take_line(&mut self.pending) {
					Some(line) => {
						let size = parse_chunk_size(&line)?;
						if size == 0 {
							self.state = ChunkState::Trailer;
						} else {
							self.file_size += size as u64;
							self.state = ChunkState::Data(size);
						}
					}
					None => {
						if !fill(transport, &mut self.pending)? {
							return Ok(ChunkedReadOutcome::WouldBlock);
						}
					}
				},

				ChunkState::Data(remaining) => {
					if remaining == 0 {
						self.state = ChunkState::DataCrlf;
						continue;
					}
					if !self.pending.is_empty() {
						let n = remaining.min(self.pending.len()).min(out.len());
						out[..n].copy_from_slice(&self.pending[..n]);
						self.pending.drain(..n);
						self.state = ChunkState::Data(remaining - n);
						return Ok(ChunkedReadOutcome::Read(n));
					}
					let want = remaining.min(out.len());
					if want == 0 {
						return Ok(ChunkedReadOutcome::Read(0));
					}
					match transport.read_some(&mut out[..want])? {
						IoOutcome::Ready(n) => {
							self.state = ChunkState::Data(remaining - n);
							return Ok(ChunkedReadOutcome::Read(n));
						}
						IoOutcome::WouldBlock => return Ok(ChunkedReadOutcome::WouldBlock),
						IoOutcome::Eof => return Err(Error::LostConnection("connection closed mid-chunk".into()).into()),
					}
				}

				ChunkState::DataCrlf => {
					if self.pending.len() < 2 {
						if !fill(transport, &mut self.pending)? {
							return Ok(ChunkedReadOutcome::WouldBlock);
						}
						continue;
					}
					let crlf: Vec<u8> = self.pending.drain(..2).collect();
					if crlf != b"\r\n" {
						return Err(Error::InvalidHttp("expected CRLF after chunk data".into()).into());
					}
					self.state = ChunkState::Size;
				}

				ChunkState::Trailer => match take_line(&mut self.pending) {
					Some(line) if line.is_empty() => {
						self.state = ChunkState::Done;
						return Ok(ChunkedReadOutcome::Eof);
					}
					Some(_) => {
						// Trailer header discarded; this core has no caller-facing
						// trailer surface, matching spec §4.10's ReadTrailer.
					}
					None => {
						if !fill(transport, &mut self.pending)? {
							return Ok(ChunkedReadOutcome::WouldBlock);
						}
					}
				},
			}
		}
	}
}

impl Default for ChunkedBodyReader {
	fn default() -> Self {
		ChunkedBodyReader::new()
	}
}

/// Parses a chunk-size line: leading hex digits, a trailing `; extension`
/// ignored, a trailing CR already stripped by [`take_line`].
fn parse_chunk_size(line: &[u8]) -> Result<usize> {
	let end = line.iter().position(|&b| b == b';').unwrap_or(line.len());
	let digits = std::str::from_utf8(&line[..end])
		.map_err(|_| Error::InvalidHttp("non-UTF8 chunk size line".into()))?
		.trim();
	usize::from_str_radix(digits, 16).map_err(|_| Error::InvalidHttp(format!("invalid chunk size {:?}", digits)).into())
}

/// Pulls a CRLF- or LF-terminated line (CR stripped) out of `pending` if one
/// is fully buffered, leaving any bytes after it in place.
fn take_line(pending: &mut Vec<u8>) -> Option<Vec<u8>> {
	let pos = pending.iter().position(|&b| b == b'\n')?;
	let mut line: Vec<u8> = pending.drain(..=pos).collect();
	line.pop(); // '\n'
	if line.last() == Some(&b'\r') {
		line.pop();
	}
	Some(line)
}

/// Reads whatever is immediately available from `transport` into `pending`.
/// Returns `true` if at least one byte was appended.
fn fill(transport: &mut dyn Transport, pending: &mut Vec<u8>) -> Result<bool> {
	let mut buf = [0u8; 4096];
	match transport.read_some(&mut buf)? {
		IoOutcome::Ready(n) => {
			pending.extend_from_slice(&buf[..n]);
			Ok(true)
		}
		IoOutcome::WouldBlock => Ok(false),
		IoOutcome::Eof => Err(Error::LostConnection("connection closed while reading chunked body".into()).into()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	/// A fixed in-memory `Transport` test double, mirroring the teacher's use
	/// of a `std::io::Cursor` to exercise `chunked.rs`'s reader state machine.
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

	const TEST_BODY: &[u8] = b"5\r\nHello\r\n6\r\n World\r\n0\r\n\r\n";

	#[test]
	fn decodes_concatenated_chunks() {
		let mut transport = CursorTransport(Cursor::new(TEST_BODY.to_vec()));
		let mut reader = ChunkedBodyReader::new();
		let mut out = Vec::new();
		let mut buf = [0u8; 3];
		loop {
			match reader.read(&mut transport, &mut buf).unwrap() {
				ChunkedReadOutcome::Read(0) => {}
				ChunkedReadOutcome::Read(n) => out.extend_from_slice(&buf[..n]),
				ChunkedReadOutcome::WouldBlock => panic!("fixture is fully buffered"),
				ChunkedReadOutcome::Eof => break,
			}
		}
		assert_eq!(out, b"Hello World");
		assert_eq!(reader.file_size(), 11);
	}

	/// Scenario S1: the header reader's socket read overshoots past the
	/// blank line into the whole chunked body, so the transport itself has
	/// nothing left to give — the decoder must be seeded from `prefill`,
	/// not the transport, or the body is lost.
	#[test]
	fn decodes_fully_from_prefill_with_empty_transport() {
		let mut transport = CursorTransport(Cursor::new(Vec::new()));
		let mut reader = ChunkedBodyReader::new();
		reader.prefill(TEST_BODY);
		let mut out = Vec::new();
		let mut buf = [0u8; 3];
		loop {
			match reader.read(&mut transport, &mut buf).unwrap() {
				ChunkedReadOutcome::Read(0) => {}
				ChunkedReadOutcome::Read(n) => out.extend_from_slice(&buf[..n]),
				ChunkedReadOutcome::WouldBlock => panic!("prefilled fixture should never touch the transport"),
				ChunkedReadOutcome::Eof => break,
			}
		}
		assert_eq!(out, b"Hello World");
		assert_eq!(reader.file_size(), 11);
	}

	#[test]
	fn rejects_malformed_chunk_size() {
		let mut transport = CursorTransport(Cursor::new(b"zz\r\n".to_vec()));
		let mut reader = ChunkedBodyReader::new();
		let mut buf = [0u8; 16];
		assert!(reader.read(&mut transport, &mut buf).is_err());
	}

	#[test]
	fn ignores_chunk_extension() {
		let mut transport = CursorTransport(Cursor::new(b"3;foo=bar\r\nabc\r\n0\r\n\r\n".to_vec()));
		let mut reader = ChunkedBodyReader::new();
		let mut out = Vec::new();
		let mut buf = [0u8; 16];
		loop {
			match reader.read(&mut transport, &mut buf).unwrap() {
				ChunkedReadOutcome::Read(n) => out.extend_from_slice(&buf[..n]),
				ChunkedReadOutcome::WouldBlock => panic!("fixture is fully buffered"),
				ChunkedReadOutcome::Eof => break,
			}
		}
		assert_eq!(out, b"abc");
	}
}
