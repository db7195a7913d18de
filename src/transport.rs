//! Byte-level connection abstraction (spec §4.7): a plain TCP socket or a
//! TLS layer on top of one, both driven non-blocking so the Channel's
//! `run()` loop never stalls on I/O.

use crate::error::{Error, Result};
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, CertificateError, RootCertStore, ServerName};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

/// Outcome of one `read_some`/`write_some` call.
#[derive(Debug)]
pub enum IoOutcome {
	Ready(usize),
	WouldBlock,
	Eof,
}

/// Outcome of one `connect_step`/`handshake_step` call.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
	Connected,
	Pending,
}

/// TLS certificate verification policy (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
	NoVerify,
	NoDateCheck,
	Normal,
}

/// A set of `type=value` attributes (`CN`, `O`, `OU` recognized) that a TLS
/// peer's subject must be a superset of to be accepted. Pins a server
/// independently of (and in addition to) the `VerifyMode` policy.
#[derive(Debug, Clone, Default)]
pub struct ExpectedServer {
	attributes: Vec<(String, String)>,
}

impl ExpectedServer {
	/// Parses `O=Example Inc/OU=Widgets/CN=www.example.com`.
	pub fn parse(pattern: &str) -> ExpectedServer {
		let attributes = pattern
			.split('/')
			.filter_map(|part| {
				let part = part.trim();
				if part.is_empty() {
					return None;
				}
				let (k, v) = part.split_once('=')?;
				Some((k.trim().to_ascii_uppercase(), v.trim().to_string()))
			})
			.collect();
		ExpectedServer { attributes }
	}

	fn matches(&self, subject: &SubjectAttributes) -> bool {
		self.attributes.iter().all(|(k, v)| subject.get(k).map(|actual| actual == v).unwrap_or(false))
	}
}

struct SubjectAttributes {
	values: Vec<(String, String)>,
}

impl SubjectAttributes {
	fn get(&self, key: &str) -> Option<&str> {
		self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	fn from_der(der: &[u8]) -> Option<SubjectAttributes> {
		let (_, cert) = x509_parser::certificate::X509Certificate::from_der(der).ok()?;
		let subject = cert.subject();
		let mut values = Vec::new();
		for cn in subject.iter_common_name() {
			if let Ok(s) = cn.as_str() {
				values.push(("CN".to_string(), s.to_string()));
			}
		}
		for o in subject.iter_organization() {
			if let Ok(s) = o.as_str() {
				values.push(("O".to_string(), s.to_string()));
			}
		}
		for ou in subject.iter_organizational_unit() {
			if let Ok(s) = ou.as_str() {
				values.push(("OU".to_string(), s.to_string()));
			}
		}
		Some(SubjectAttributes { values })
	}
}

struct PanhttpVerifier {
	mode: VerifyMode,
	roots: RootCertStore,
	expected_servers: Vec<ExpectedServer>,
}

impl ServerCertVerifier for PanhttpVerifier {
	fn verify_server_cert(
		&self,
		end_entity: &Certificate,
		intermediates: &[Certificate],
		server_name: &ServerName,
		scts: &mut dyn Iterator<Item = &[u8]>,
		ocsp_response: &[u8],
		now: SystemTime,
	) -> std::result::Result<ServerCertVerified, rustls::Error> {
		if !self.expected_servers.is_empty() {
			let subject = SubjectAttributes::from_der(&end_entity.0)
				.ok_or_else(|| rustls::Error::General("could not parse peer certificate subject".into()))?;
			if !self.expected_servers.iter().any(|pattern| pattern.matches(&subject)) {
				return Err(rustls::Error::General("peer certificate does not match any expected server".into()));
			}
		}

		if self.mode == VerifyMode::NoVerify {
			return Ok(ServerCertVerified::assertion());
		}

		let webpki = rustls::client::WebPkiVerifier::new(self.roots.clone(), None);
		match webpki.verify_server_cert(end_entity, intermediates, server_name, scts, ocsp_response, now) {
			Ok(v) => Ok(v),
			Err(rustls::Error::InvalidCertificate(CertificateError::Expired))
			| Err(rustls::Error::InvalidCertificate(CertificateError::NotValidYet))
				if self.mode == VerifyMode::NoDateCheck =>
			{
				Ok(ServerCertVerified::assertion())
			}
			Err(e) => Err(e),
		}
	}
}

/// Builds a `rustls::ClientConfig` honoring the verification policy and
/// expected-server pins, with trust roots loaded from PEM bundles.
pub fn build_tls_config(roots: RootCertStore, mode: VerifyMode, expected_servers: Vec<ExpectedServer>) -> Arc<rustls::ClientConfig> {
	let verifier = PanhttpVerifier { mode, roots, expected_servers };
	let mut config = rustls::ClientConfig::builder()
		.with_safe_defaults()
		.with_custom_certificate_verifier(Arc::new(verifier))
		.with_no_client_auth();
	config.enable_sni = true;
	Arc::new(config)
}

pub trait Transport {
	fn read_some(&mut self, buf: &mut [u8]) -> Result<IoOutcome>;
	fn write_some(&mut self, buf: &[u8]) -> Result<IoOutcome>;
	fn close(&mut self);
}

#[cfg(unix)]
fn is_connect_in_progress(err: &io::Error) -> bool {
	err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc_einprogress())
}

#[cfg(unix)]
fn libc_einprogress() -> i32 {
	115
}

#[cfg(not(unix))]
fn is_connect_in_progress(err: &io::Error) -> bool {
	err.kind() == io::ErrorKind::WouldBlock
}

/// A plain, non-blocking TCP connection.
pub struct TcpTransport {
	socket: Socket,
	connecting: bool,
}

impl TcpTransport {
	pub fn connect(addr: SocketAddr) -> Result<TcpTransport> {
		let domain = Domain::for_address(addr);
		let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(|e| Error::NoConnection(e.to_string()))?;
		socket.set_nonblocking(true).map_err(|e| Error::NoConnection(e.to_string()))?;

		let connecting = match socket.connect(&addr.into()) {
			Ok(()) => false,
			Err(e) if is_connect_in_progress(&e) => true,
			Err(e) => return Err(Error::NoConnection(e.to_string()).into()),
		};

		Ok(TcpTransport { socket, connecting })
	}

	/// Drives the asynchronous connect. `should_retry` callers use this to
	/// avoid assuming completion before the peer has responded — without a
	/// reactor in this dependency set, completion is detected by probing
	/// `peer_addr()` rather than waiting on a writability notification.
	pub fn connect_step(&mut self) -> Result<ConnectOutcome> {
		if !self.connecting {
			return Ok(ConnectOutcome::Connected);
		}
		match self.socket.peer_addr() {
			Ok(_) => {
				self.connecting = false;
				Ok(ConnectOutcome::Connected)
			}
			Err(e) if is_connect_in_progress(&e) || e.kind() == io::ErrorKind::NotConnected => Ok(ConnectOutcome::Pending),
			Err(e) => Err(Error::NoConnection(e.to_string()).into()),
		}
	}

	#[cfg(unix)]
	pub fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
		use std::os::unix::io::AsRawFd;
		self.socket.as_raw_fd()
	}
}

impl Transport for TcpTransport {
	fn read_some(&mut self, buf: &mut [u8]) -> Result<IoOutcome> {
		match self.socket.read(buf) {
			Ok(0) => Ok(IoOutcome::Eof),
			Ok(n) => Ok(IoOutcome::Ready(n)),
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(IoOutcome::WouldBlock),
			Err(e) => Err(Error::LostConnection(e.to_string()).into()),
		}
	}

	fn write_some(&mut self, buf: &[u8]) -> Result<IoOutcome> {
		match self.socket.write(buf) {
			Ok(n) => Ok(IoOutcome::Ready(n)),
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(IoOutcome::WouldBlock),
			Err(e) => Err(Error::LostConnection(e.to_string()).into()),
		}
	}

	fn close(&mut self) {
		let _ = self.socket.shutdown(std::net::Shutdown::Both);
	}
}

impl Read for TcpTransport {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.socket.read(buf)
	}
}

impl Write for TcpTransport {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.socket.write(buf)
	}
	fn flush(&mut self) -> io::Result<()> {
		self.socket.flush()
	}
}

/// TLS layered over an already-connected `TcpTransport` (spec S5: the
/// handshake happens on the same transport a CONNECT tunnel was built on).
pub struct TlsTransport {
	conn: rustls::ClientConnection,
	tcp: TcpTransport,
}

impl TlsTransport {
	pub fn new(tcp: TcpTransport, config: Arc<rustls::ClientConfig>, server_name: ServerName) -> Result<TlsTransport> {
		let conn = rustls::ClientConnection::new(config, server_name).map_err(|e| Error::Tls(e.to_string()))?;
		Ok(TlsTransport { conn, tcp })
	}

	/// Pumps ciphertext in both directions without blocking, then reports
	/// whether the handshake has completed.
	pub fn handshake_step(&mut self) -> Result<ConnectOutcome> {
		self.pump_io()?;
		if self.conn.is_handshaking() {
			Ok(ConnectOutcome::Pending)
		} else {
			Ok(ConnectOutcome::Connected)
		}
	}

	fn pump_io(&mut self) -> Result<()> {
		if self.conn.wants_write() {
			match self.conn.write_tls(&mut self.tcp) {
				Ok(_) => {}
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
				Err(e) => return Err(Error::Tls(e.to_string()).into()),
			}
		}

		if self.conn.wants_read() {
			match self.conn.read_tls(&mut self.tcp) {
				Ok(0) => {}
				Ok(_) => {
					self.conn.process_new_packets().map_err(|e| Error::Tls(e.to_string()))?;
				}
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
				Err(e) => return Err(Error::Tls(e.to_string()).into()),
			}
		}

		Ok(())
	}
}

impl Transport for TlsTransport {
	fn read_some(&mut self, buf: &mut [u8]) -> Result<IoOutcome> {
		self.pump_io()?;
		match self.conn.reader().read(buf) {
			Ok(0) => Ok(IoOutcome::Eof),
			Ok(n) => Ok(IoOutcome::Ready(n)),
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(IoOutcome::WouldBlock),
			Err(e) => Err(Error::LostConnection(e.to_string()).into()),
		}
	}

	fn write_some(&mut self, buf: &[u8]) -> Result<IoOutcome> {
		let n = self.conn.writer().write(buf).map_err(|e| Error::LostConnection(e.to_string()))?;
		self.pump_io()?;
		Ok(IoOutcome::Ready(n))
	}

	fn close(&mut self) {
		self.conn.send_close_notify();
		let _ = self.pump_io();
		self.tcp.close();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn expected_server_parses_attribute_list() {
		let pattern = ExpectedServer::parse("O=Example Inc/OU=Widgets/CN=www.example.com");
		assert_eq!(pattern.attributes.len(), 3);
		assert_eq!(pattern.attributes[0], ("O".to_string(), "Example Inc".to_string()));
	}

	#[test]
	fn expected_server_matching_is_superset() {
		let pattern = ExpectedServer::parse("CN=www.example.com");
		let subject = SubjectAttributes {
			values: vec![("CN".to_string(), "www.example.com".to_string()), ("O".to_string(), "Example Inc".to_string())],
		};
		assert!(pattern.matches(&subject));

		let mismatched = ExpectedServer::parse("CN=other.example.com");
		assert!(!mismatched.matches(&subject));
	}
}
