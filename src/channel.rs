//! The request state machine (spec §4.10) — the heart of this crate.
//!
//! A [`Channel`] drives one HTTP request/response exchange over a
//! (possibly reused) [`Transport`]. Its `run()` makes at most one unit of
//! progress per call and never blocks; a caller that wants blocking
//! semantics simply loops `run()` until it returns [`RunOutcome::Done`] or
//! an error, per the design note in spec §9 ("do not attempt two code
//! paths").

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::net::ToSocketAddrs;
use std::rc::{Rc, Weak};
use std::time::Instant;

use crate::chunked::{ChunkedBodyReader, ChunkedReadOutcome};
use crate::client::{ClientShared, HttpVersion, ThrottleOptions};
use crate::date::HttpDate;
use crate::document_spec::DocumentSpec;
use crate::error::{Error, Result};
use crate::identity::{IdentityBodyReader, IdentityReadOutcome};
use crate::method::Method;
use crate::status_code::StatusCode;
use crate::transport::{ConnectOutcome, IoOutcome, TcpTransport, TlsTransport, Transport};
use crate::url::Url;

/// Keys the client's idle-connection pool by `(scheme, host, port, proxy)`
/// (spec §4.11).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
	scheme: String,
	host: String,
	port: u32,
	proxy: Option<(String, u32)>,
}

impl PoolKey {
	pub fn for_url(url: &Url, proxy: Option<&Url>) -> PoolKey {
		PoolKey {
			scheme: url.scheme().to_string(),
			host: url.server().to_string(),
			port: url.port_or_default(),
			proxy: proxy.map(|p| (p.server().to_string(), p.port_or_default())),
		}
	}

	pub fn describe(&self) -> String {
		match &self.proxy {
			Some((host, port)) => format!("{}://{}:{} (via proxy {}:{})", self.scheme, self.host, self.port, host, port),
			None => format!("{}://{}:{}", self.scheme, self.host, self.port),
		}
	}
}

/// Knobs a [`Channel`] is born with, snapshotted from [`crate::client::ClientOptions`]
/// at the moment the `Client` vends it (spec §4.11's "current proxy
/// (snapshot of client's)").
#[derive(Clone)]
pub struct ChannelConfig {
	pub proxy: Option<Url>,
	pub http_version: HttpVersion,
	pub persistent_connections: bool,
	pub tls_config: std::sync::Arc<rustls::ClientConfig>,
	pub throttle: Option<ThrottleOptions>,
}

/// One non-blocking step's worth of progress (spec §4.10 "Non-blocking
/// contract").
#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
	/// No terminal state yet; call `run()` again once I/O can progress.
	Pending,
	/// Headers are fully read and parsed; the caller may inspect them,
	/// open a [`BodyStream`], or attach a download destination.
	HeaderReady,
	/// A download destination attached via `download_to_*` has fully
	/// drained the body; the channel has returned to `Ready`/the pool (or
	/// closed, if the connection could not be reused).
	Done,
}

enum TransportHandle {
	Plain(TcpTransport),
	Tls(TlsTransport),
}

impl Transport for TransportHandle {
	fn read_some(&mut self, buf: &mut [u8]) -> Result<IoOutcome> {
		match self {
			TransportHandle::Plain(t) => t.read_some(buf),
			TransportHandle::Tls(t) => t.read_some(buf),
		}
	}
	fn write_some(&mut self, buf: &[u8]) -> Result<IoOutcome> {
		match self {
			TransportHandle::Plain(t) => t.write_some(buf),
			TransportHandle::Tls(t) => t.write_some(buf),
		}
	}
	fn close(&mut self) {
		match self {
			TransportHandle::Plain(t) => t.close(),
			TransportHandle::Tls(t) => t.close(),
		}
	}
}

/// Where a completed body is being written (spec §3 "destination
/// specifier").
enum Destination {
	None,
	File(File),
	Buffer(Vec<u8>),
	Writer(Box<dyn Write>),
}

enum BodyDecoder {
	Chunked(ChunkedBodyReader),
	Identity(IdentityBodyReader),
}

impl BodyDecoder {
	fn is_done(&self) -> bool {
		match self {
			BodyDecoder::Chunked(d) => d.is_done(),
			BodyDecoder::Identity(d) => d.is_done(),
		}
	}
}

/// Whether body bytes, once `BeginBody` is reached, are pumped
/// automatically by `run()` into an attached [`Destination`], or pulled
/// one read at a time by a caller-held [`BodyStream`].
#[derive(PartialEq, Eq)]
enum BodyMode {
	Undecided,
	Auto,
	Manual,
}

/// Tagged state-machine variants (spec §4.10, §9: "illegal states
/// unrepresentable"). Per-state data (pending output bytes, the
/// accumulating input line) is carried in the variant instead of as
/// channel-wide fields.
enum State {
	New,
	Connecting,
	ProxyReady,
	ProxyRequestSent { sent: usize },
	ProxyReadingHeader { buf: Vec<u8> },
	SetupSsl,
	SslHandshake,
	Ready,
	RequestSent { sent: usize },
	ReadingHeader { buf: Vec<u8>, status_line: Option<(u16, String)>, last_key: Option<String> },
	/// The observable stopping point of spec §4.10 ("caller may inspect
	/// headers, consume the body directly, or initiate a download").
	HeaderReady,
	ReadingBody,
	/// Reading and discarding a 401/407 challenge response's body before
	/// reissuing the request on the same persistent connection — mirrors
	/// the redirect branch's "reconnect if not reusable" check, but for
	/// the case where the connection can be reused and the leftover body
	/// bytes just need to be read past first (otherwise they are parsed
	/// as the status line of the retried request).
	DrainingChallengeBody { resume: ChallengeResume },
	Failure(String),
}

/// Which retried request to resume once a challenge response's body has
/// been drained.
#[derive(Debug, Clone, Copy)]
enum ChallengeResume {
	Origin,
	Proxy,
}

/// Everything a [`Channel`] owns: target, in-flight request, accumulated
/// response, and the transport. Pooled connections keep this alive between
/// requests (spec §3 "Lifecycle & ownership").
pub struct Inner {
	client: Weak<ClientShared>,
	config: ChannelConfig,

	/// Bumped on every reset (new request, redirect, auth retry) so a live
	/// [`BodyStream`] can detect it has outlived its generation (spec §9).
	generation: u64,
	state: State,
	transport: Option<TransportHandle>,
	pool_key: Option<PoolKey>,

	target: Url,
	method: Method,
	request_headers: Vec<(String, String)>,
	request_body: Vec<u8>,
	first_byte: u64,
	last_byte: u64,
	redirect_trail: std::collections::HashSet<String>,
	tried_proxy_auth: bool,
	tried_origin_auth: bool,
	pending_challenge_header: Option<String>,

	response_headers: HashMap<String, String>,
	status_code: i32,
	reason: String,
	http_response_version: HttpVersion,
	keep_alive: bool,

	first_byte_delivered: Option<u64>,
	last_byte_delivered: Option<u64>,
	file_size: u64,
	bytes_downloaded: u64,
	download_complete: bool,
	read_successful: bool,

	body_decoder: Option<BodyDecoder>,
	body_mode: BodyMode,
	destination: Destination,
	throttle_last_tick: Option<Instant>,

	/// Bytes already pulled off the transport past the header block's
	/// terminating blank line (the header reader's socket read commonly
	/// overshoots into the start of the body, or into a challenge
	/// response's error-page body) — handed to whichever body decoder
	/// gets constructed next instead of being dropped on the floor.
	pending_body_bytes: Vec<u8>,
}

impl Inner {
	fn reset_for_new_request(&mut self, target: Url, method: Method) {
		self.generation += 1;
		self.target = target;
		self.method = method;
		self.request_headers.clear();
		self.request_body.clear();
		self.first_byte = 0;
		self.last_byte = 0;
		self.tried_proxy_auth = false;
		self.tried_origin_auth = false;
		self.pending_challenge_header = None;
		self.response_headers.clear();
		self.status_code = 0;
		self.reason.clear();
		self.first_byte_delivered = None;
		self.last_byte_delivered = None;
		self.file_size = 0;
		self.bytes_downloaded = 0;
		self.download_complete = false;
		self.read_successful = true;
		self.body_decoder = None;
		self.body_mode = BodyMode::Undecided;
		self.destination = Destination::None;
		self.throttle_last_tick = None;
		self.pending_body_bytes.clear();
		if self.transport.is_some() {
			self.state = State::Ready;
		} else {
			self.state = State::New;
		}
	}

	fn is_https(&self) -> bool {
		self.target.is_ssl()
	}

	fn has_proxy(&self) -> bool {
		self.config.proxy.is_some()
	}

	/// A non-tunneling proxy is one fronting a plain-HTTP request; HTTPS
	/// always tunnels via `CONNECT` (spec §4.10 "For HTTPS-over-proxy,
	/// target the proxy").
	fn proxy_is_tunnel(&self) -> bool {
		self.has_proxy() && self.is_https()
	}

	fn connect_target(&self) -> &Url {
		self.config.proxy.as_ref().unwrap_or(&self.target)
	}

	fn with_client<R>(&self, f: impl FnOnce(&ClientShared) -> R) -> Option<R> {
		self.client.upgrade().map(|c| f(&c))
	}

	fn host_header_value(&self) -> String {
		if self.target.is_default_port() {
			self.target.server().to_string()
		} else {
			self.target.server_and_port()
		}
	}

	fn request_path(&self) -> String {
		self.target.path_and_query()
	}

	/// Builds the request-line + headers (+ body) text for the current
	/// request (spec §4.10 "Request-text construction").
	fn build_request_text(&self) -> Vec<u8> {
		let mut out = Vec::new();
		let use_absolute_form = self.has_proxy() && !self.proxy_is_tunnel();
		let request_target = if use_absolute_form {
			let mut absolute = self.target.clone();
			absolute.set_username("");
			absolute.as_str().to_string()
		} else {
			self.request_path()
		};

		out.extend_from_slice(format!("{} {} {}\r\n", self.method.as_str(), request_target, self.config.http_version.as_str()).as_bytes());

		if matches!(self.config.http_version, HttpVersion::Http11 | HttpVersion::Other) {
			out.extend_from_slice(format!("Host: {}\r\n", self.host_header_value()).as_bytes());
		}
		if !self.config.persistent_connections {
			out.extend_from_slice(b"Connection: close\r\n");
		}
		if self.last_byte > 0 || self.first_byte > 0 {
			if self.last_byte > 0 {
				out.extend_from_slice(format!("Range: bytes={}-{}\r\n", self.first_byte, self.last_byte).as_bytes());
			} else {
				out.extend_from_slice(format!("Range: bytes={}-\r\n", self.first_byte).as_bytes());
			}
		}
		if !self.request_body.is_empty() {
			out.extend_from_slice(b"Content-Type: application/x-www-form-urlencoded\r\n");
			out.extend_from_slice(format!("Content-Length: {}\r\n", self.request_body.len()).as_bytes());
		}

		if let Some(cookie_header) = self.with_client(|c| c.cookie_header(&self.target, HttpDate::now())).flatten() {
			out.extend_from_slice(format!("Cookie: {}\r\n", cookie_header).as_bytes());
		}

		if self.has_proxy() && !self.proxy_is_tunnel() {
			if let Some(proxy_auth) = self
				.with_client(|c| c.preemptive_authorization(self.config.proxy.as_ref().unwrap().server(), true, self.method, &self.request_path(), &self.request_body))
				.flatten()
			{
				out.extend_from_slice(format!("Proxy-Authorization: {}\r\n", proxy_auth).as_bytes());
			}
		}

		if let Some(challenge) = &self.pending_challenge_header {
			out.extend_from_slice(format!("Authorization: {}\r\n", challenge).as_bytes());
		}

		for (k, v) in &self.request_headers {
			out.extend_from_slice(format!("{}: {}\r\n", k, v).as_bytes());
		}

		out.extend_from_slice(b"\r\n");
		if !self.request_body.is_empty() {
			out.extend_from_slice(&self.request_body);
		}
		out
	}

	fn build_connect_text(&self) -> Vec<u8> {
		let authority = self.target.server_and_port();
		let mut out = format!("CONNECT {} {}\r\nHost: {}\r\n", authority, self.config.http_version.as_str(), authority).into_bytes();
		if let Some(challenge) = &self.pending_challenge_header {
			out.extend_from_slice(format!("Proxy-Authorization: {}\r\n", challenge).as_bytes());
		}
		out.extend_from_slice(b"\r\n");
		out
	}

	fn connection_header_says_close(&self) -> bool {
		match self.response_headers.get("connection") {
			Some(v) => v.to_ascii_lowercase().contains("close"),
			None => !matches!(self.http_response_version, HttpVersion::Http11 | HttpVersion::Other),
		}
	}

	fn is_reusable(&self) -> bool {
		self.config.persistent_connections
			&& matches!(self.http_response_version, HttpVersion::Http11 | HttpVersion::Other)
			&& !self.connection_header_says_close()
	}

	/// Parses one accumulated header-block line (`key: value`) into
	/// `response_headers` (case-folded key, repeats joined with `", "`).
	/// Returns the lowercased key so the caller can track it for LWS
	/// continuation lines.
	fn ingest_header_line(&mut self, line: &str) -> Result<String> {
		let (key, value) = line.split_once(':').ok_or_else(|| Error::InvalidHttp(format!("malformed header line: {}", line)))?;
		let key = key.trim().to_ascii_lowercase();
		let value = value.trim().to_string();
		self.response_headers
			.entry(key.clone())
			.and_modify(|existing| {
				existing.push_str(", ");
				existing.push_str(&value);
			})
			.or_insert(value);
		Ok(key)
	}

	fn status_u16(&self) -> u16 {
		self.status_code.max(0) as u16
	}

	fn may_have_body(&self) -> bool {
		self.method.response_may_have_body() && !matches!(self.status_code, 100..=199 | 204 | 304)
	}

	fn select_body_decoder(&mut self) {
		let overread = std::mem::take(&mut self.pending_body_bytes);

		let transfer_encoding = self.response_headers.get("transfer-encoding").map(|v| v.to_ascii_lowercase());
		if transfer_encoding.as_deref().map(|v| v.contains("chunked")).unwrap_or(false) {
			let mut reader = ChunkedBodyReader::new();
			reader.prefill(&overread);
			self.body_decoder = Some(BodyDecoder::Chunked(reader));
			return;
		}

		if let Some(range) = self.response_headers.get("content-range").cloned() {
			if let Some((first, last, total)) = parse_content_range(&range) {
				self.first_byte_delivered = Some(first);
				self.last_byte_delivered = Some(last);
				if let Some(total) = total {
					self.file_size = total;
				} else if self.response_headers.get("content-length").is_none() {
					self.file_size = last - first + 1;
				}
			}
		}

		if let Some(len) = self.response_headers.get("content-length").and_then(|v| v.trim().parse::<u64>().ok()) {
			self.file_size = self.file_size.max(len);
			let mut reader = IdentityBodyReader::length_known(len);
			reader.prefill(&overread);
			self.body_decoder = Some(BodyDecoder::Identity(reader));
		} else {
			let mut reader = IdentityBodyReader::length_unknown();
			reader.prefill(&overread);
			self.body_decoder = Some(BodyDecoder::Identity(reader));
		}
	}

	/// One decode step into `out`: drives the selected decoder against the
	/// transport. Returns `Ok(None)` on `WouldBlock`.
	fn body_read_step(&mut self, out: &mut [u8]) -> Result<Option<usize>> {
		let transport = self.transport.as_mut().ok_or_else(|| Error::LostConnection("no transport".into()))?;
		let decoder = self.body_decoder.as_mut().expect("body decoder selected before BeginBody");

		let outcome = match decoder {
			BodyDecoder::Chunked(d) => match d.read(transport, out) {
				Ok(ChunkedReadOutcome::Read(n)) => Some(n),
				Ok(ChunkedReadOutcome::WouldBlock) => None,
				Ok(ChunkedReadOutcome::Eof) => Some(0),
				Err(e) => return Err(e),
			},
			BodyDecoder::Identity(d) => match d.read(transport, out) {
				Ok(IdentityReadOutcome::Read(n)) => Some(n),
				Ok(IdentityReadOutcome::WouldBlock) => None,
				Ok(IdentityReadOutcome::Eof) => Some(0),
				Err(e) => return Err(e),
			},
		};

		if let Some(n) = outcome {
			self.file_size = self.file_size.max(match decoder {
				BodyDecoder::Chunked(d) => d.file_size(),
				BodyDecoder::Identity(_) => self.file_size,
			});
			if n > 0 {
				self.bytes_downloaded += n as u64;
			}
		}
		Ok(outcome)
	}

	/// Per spec §4.8/§4.9: "publish completion to the owning channel ...
	/// iff the stream's generation matches the channel's current
	/// generation". Advances `ReadingBody -> Ready`/`ProxyReady`, or closes
	/// the transport if the connection cannot be reused.
	fn finish_body(&mut self, generation: u64) {
		if generation != self.generation {
			return;
		}
		self.download_complete = true;
		let unknown_length_body = matches!(self.body_decoder, Some(BodyDecoder::Identity(ref d)) if d.mode() == crate::identity::IdentityMode::LengthUnknown);

		if unknown_length_body || !self.is_reusable() {
			if let Some(t) = self.transport.as_mut() {
				t.close();
			}
			self.transport = None;
			self.state = State::New;
		} else if self.proxy_is_tunnel() {
			self.state = State::Ready;
		} else if self.has_proxy() {
			self.state = State::ProxyReady;
		} else {
			self.state = State::Ready;
		}
	}

	/// Called when a live [`BodyStream`] is dropped without reaching EOF:
	/// the remaining bytes were never drained, so the connection cannot be
	/// reused (spec §3 "a Channel outlives any body stream it produces").
	fn abandon_body(&mut self, generation: u64) {
		if generation != self.generation {
			return;
		}
		self.read_successful = false;
		if let Some(t) = self.transport.as_mut() {
			t.close();
		}
		self.transport = None;
		self.state = State::New;
	}
}

fn parse_content_range(value: &str) -> Option<(u64, u64, Option<u64>)> {
	let rest = value.trim().strip_prefix("bytes ")?;
	let (range, total) = rest.split_once('/')?;
	let (first, last) = range.split_once('-')?;
	let first: u64 = first.trim().parse().ok()?;
	let last: u64 = last.trim().parse().ok()?;
	let total = if total.trim() == "*" { None } else { total.trim().parse().ok() };
	Some((first, last, total))
}

/// A single thread of HTTP request/response activity over one (possibly
/// reused) transport (spec GLOSSARY).
pub struct Channel {
	inner: Rc<RefCell<Inner>>,
}

impl Channel {
	pub(crate) fn new(client: Weak<ClientShared>, config: ChannelConfig) -> Channel {
		Channel {
			inner: Rc::new(RefCell::new(Inner {
				client,
				config,
				generation: 0,
				state: State::New,
				transport: None,
				pool_key: None,
				target: Url::parse("", false),
				method: Method::Get,
				request_headers: Vec::new(),
				request_body: Vec::new(),
				first_byte: 0,
				last_byte: 0,
				redirect_trail: std::collections::HashSet::new(),
				tried_proxy_auth: false,
				tried_origin_auth: false,
				pending_challenge_header: None,
				response_headers: HashMap::new(),
				status_code: 0,
				reason: String::new(),
				http_response_version: HttpVersion::Http11,
				keep_alive: true,
				first_byte_delivered: None,
				last_byte_delivered: None,
				file_size: 0,
				bytes_downloaded: 0,
				download_complete: false,
				read_successful: true,
				body_decoder: None,
				body_mode: BodyMode::Undecided,
				destination: Destination::None,
				throttle_last_tick: None,
				pending_body_bytes: Vec::new(),
			})),
		}
	}

	pub(crate) fn from_pooled(inner: Rc<RefCell<Inner>>) -> Channel {
		Channel { inner }
	}

	fn start_request(&self, url: Url, method: Method, tag_header: Option<(&'static str, String)>, body: Vec<u8>, first_byte: u64, last_byte: u64) {
		let mut inner = self.inner.borrow_mut();
		let key = PoolKey::for_url(&url, inner.config.proxy.as_ref());
		inner.pool_key = Some(key);
		inner.redirect_trail.clear();
		inner.redirect_trail.insert(url.as_str().to_string());
		inner.reset_for_new_request(url, method);
		inner.request_body = body;
		inner.first_byte = first_byte;
		inner.last_byte = last_byte;
		if let Some((name, value)) = tag_header {
			inner.request_headers.push((name.to_string(), value));
		}
	}

	/// `GET` on `spec.url`, adding `If-None-Match`/`If-Modified-Since`
	/// per the caller's `DocumentSpec` (spec §3, §4.4).
	pub fn get_document(&self, spec: &DocumentSpec) {
		let header = conditional_header(spec);
		self.start_request(spec.url.clone(), Method::Get, header, Vec::new(), 0, 0);
	}

	/// `HEAD` on `spec.url` — headers only, never a body.
	pub fn get_header(&self, spec: &DocumentSpec) {
		let header = conditional_header(spec);
		self.start_request(spec.url.clone(), Method::Head, header, Vec::new(), 0, 0);
	}

	/// A byte-range `GET`, used to resume an interrupted download (spec
	/// §4.10 BeginBody, S2).
	pub fn get_subdocument(&self, url: &Url, first_byte: u64, last_byte: u64) {
		self.start_request(url.clone(), Method::Get, None, Vec::new(), first_byte, last_byte);
	}

	/// `POST` with an `application/x-www-form-urlencoded` body built from
	/// `fields`.
	pub fn post_form(&self, url: &Url, fields: &[(String, String)]) {
		let body = fields
			.iter()
			.map(|(k, v)| format!("{}={}", Url::quote_plus(k, ""), Url::quote_plus(v, "")))
			.collect::<Vec<_>>()
			.join("&")
			.into_bytes();
		self.start_request(url.clone(), Method::Post, None, body, 0, 0);
	}

	pub fn status_code(&self) -> i32 {
		self.inner.borrow().status_code
	}

	/// The validated [`StatusCode`], if the status line parsed to a value
	/// in `100..600`. `None` before a response has arrived, since
	/// `status_code()` is `0`/negative in that state (spec §7: "a status
	/// code <= 0 distinguishable from HTTP codes").
	pub fn status(&self) -> Option<StatusCode> {
		StatusCode::from_u16(self.inner.borrow().status_code.max(0) as u16)
	}

	pub fn reason(&self) -> String {
		self.inner.borrow().reason.clone()
	}

	pub fn header(&self, name: &str) -> Option<String> {
		self.inner.borrow().response_headers.get(&name.to_ascii_lowercase()).cloned()
	}

	/// Converts a >= 400 status into `Err(Error::Http { .. })`, verbatim
	/// (spec §7's HTTP-error taxonomy entry). A no-op on anything below
	/// 400 — the channel itself never treats 4xx/5xx as a `run()` failure,
	/// since a caller may want the headers regardless, so this is the
	/// opt-in checkpoint for callers who just want `?` to work.
	pub fn error_for_status(&self) -> Result<()> {
		let inner = self.inner.borrow();
		if inner.status_code >= 400 {
			Err(Error::Http { code: inner.status_code as u16, reason: inner.reason.clone() }.into())
		} else {
			Ok(())
		}
	}

	pub fn file_size(&self) -> u64 {
		self.inner.borrow().file_size
	}

	pub fn bytes_downloaded(&self) -> u64 {
		self.inner.borrow().bytes_downloaded
	}

	pub fn is_download_complete(&self) -> bool {
		self.inner.borrow().download_complete
	}

	pub fn was_read_successful(&self) -> bool {
		self.inner.borrow().read_successful
	}

	/// Makes one unit of non-blocking progress. Never blocks: every
	/// operation that would stall the transport returns
	/// [`RunOutcome::Pending`] and leaves the channel's state unchanged.
	pub fn run(&self) -> Result<RunOutcome> {
		let mut inner = self.inner.borrow_mut();
		step(&mut inner)
	}

	/// Loops [`Channel::run`] until headers are ready or the request
	/// fails — the blocking-mode entry point spec §9 calls for instead of
	/// a second async code path.
	pub fn run_until_header(&self) -> Result<()> {
		loop {
			match self.run()? {
				RunOutcome::HeaderReady | RunOutcome::Done => return Ok(()),
				RunOutcome::Pending => continue,
			}
		}
	}

	/// Returns a caller-driven decoder for the response body (spec §2:
	/// "the caller may obtain a body stream"). Must be called only once
	/// `run()` has reported [`RunOutcome::HeaderReady`].
	pub fn body_stream(&self) -> BodyStream {
		let mut inner = self.inner.borrow_mut();
		inner.body_mode = BodyMode::Manual;
		if inner.body_decoder.is_none() {
			if inner.may_have_body() {
				inner.select_body_decoder();
				inner.state = State::ReadingBody;
			} else {
				let generation = inner.generation;
				inner.finish_body(generation);
			}
		}
		BodyStream { inner: Rc::downgrade(&self.inner), generation: inner.generation }
	}

	fn begin_auto_body(&self, destination: Destination) {
		let mut inner = self.inner.borrow_mut();
		inner.body_mode = BodyMode::Auto;
		inner.destination = destination;
		if inner.body_decoder.is_none() {
			if inner.may_have_body() {
				inner.select_body_decoder();
				inner.state = State::ReadingBody;
			} else {
				let generation = inner.generation;
				inner.finish_body(generation);
			}
		}
	}

	/// Streams the body into `path`, truncating unless `resume_offset` is
	/// non-zero (spec §6 "Persistence": seek to resume a partial
	/// download).
	pub fn download_to_file(&self, path: &std::path::Path, resume_offset: u64) -> Result<()> {
		let mut options = OpenOptions::new();
		options.write(true).create(true);
		if resume_offset == 0 {
			options.truncate(true);
		}
		let mut file = options.open(path).map_err(|e| Error::DownloadOpenError(e.to_string()))?;
		if resume_offset > 0 {
			file.seek(SeekFrom::Start(resume_offset)).map_err(|e| Error::DownloadInvalidRange(e.to_string()))?;
		}
		self.begin_auto_body(Destination::File(file));
		Ok(())
	}

	pub fn download_to_buffer(&self) {
		self.begin_auto_body(Destination::Buffer(Vec::new()));
	}

	pub fn download_to_writer(&self, writer: Box<dyn Write>) {
		self.begin_auto_body(Destination::Writer(writer));
	}

	/// Takes the in-memory buffer written by [`Channel::download_to_buffer`]
	/// once the download has completed.
	pub fn take_buffer(&self) -> Option<Vec<u8>> {
		let mut inner = self.inner.borrow_mut();
		match std::mem::replace(&mut inner.destination, Destination::None) {
			Destination::Buffer(buf) => Some(buf),
			other => {
				inner.destination = other;
				None
			}
		}
	}
}

impl Drop for Channel {
	fn drop(&mut self) {
		if Rc::strong_count(&self.inner) != 1 {
			return;
		}
		let mut inner = self.inner.borrow_mut();
		let reusable = matches!(inner.state, State::Ready | State::ProxyReady) && inner.transport.is_some();
		if !reusable {
			return;
		}
		let key = match inner.pool_key.clone() {
			Some(k) => k,
			None => return,
		};
		if inner.client.upgrade().is_none() {
			return;
		}
		drop(inner);
		// Route through `ClientShared::pool` directly: `Channel` only ever
		// holds a `Weak<ClientShared>`, never a `Client`.
		if let Some(shared) = self.inner.borrow().client.upgrade() {
			shared.pool.borrow_mut().entry(key).or_default().push(self.inner.clone());
		}
	}
}

/// A caller-driven decoder for a response body. Weakly references the
/// [`Channel`] that produced it and remembers the generation it was born
/// under (spec §9): once the channel resets, further reads report
/// [`BodyStreamOutcome::Eof`] without touching any later request's state.
pub struct BodyStream {
	inner: Weak<RefCell<Inner>>,
	generation: u64,
}

#[derive(Debug)]
pub enum BodyStreamOutcome {
	Read(usize),
	WouldBlock,
	Eof,
}

impl BodyStream {
	pub fn read(&self, out: &mut [u8]) -> Result<BodyStreamOutcome> {
		let rc = match self.inner.upgrade() {
			Some(rc) => rc,
			None => return Ok(BodyStreamOutcome::Eof),
		};
		let mut inner = rc.borrow_mut();
		if inner.generation != self.generation {
			return Ok(BodyStreamOutcome::Eof);
		}
		match inner.body_read_step(out)? {
			None => Ok(BodyStreamOutcome::WouldBlock),
			Some(0) => {
				inner.finish_body(self.generation);
				Ok(BodyStreamOutcome::Eof)
			}
			Some(n) => Ok(BodyStreamOutcome::Read(n)),
		}
	}

	/// Reads to completion, spinning on `WouldBlock` — the blocking-mode
	/// convenience spec §9 calls for.
	pub fn read_to_end(&self) -> Result<Vec<u8>> {
		let mut out = Vec::new();
		let mut buf = [0u8; 8192];
		loop {
			match self.read(&mut buf)? {
				BodyStreamOutcome::Read(n) => out.extend_from_slice(&buf[..n]),
				BodyStreamOutcome::Eof => return Ok(out),
				BodyStreamOutcome::WouldBlock => continue,
			}
		}
	}
}

impl Drop for BodyStream {
	fn drop(&mut self) {
		if let Some(rc) = self.inner.upgrade() {
			let mut inner = rc.borrow_mut();
			if inner.generation == self.generation && !inner.download_complete {
				inner.abandon_body(self.generation);
			}
		}
	}
}

fn conditional_header(spec: &DocumentSpec) -> Option<(&'static str, String)> {
	if let Some(tag) = &spec.tag {
		return Some(("If-None-Match", tag.format()));
	}
	if let Some(date) = &spec.date {
		return Some(("If-Modified-Since", date.to_rfc1123()));
	}
	None
}

/// One step of the state machine. Mutates `inner` in place and returns the
/// outcome of this step; callers loop this via [`Channel::run`].
fn step(inner: &mut Inner) -> Result<RunOutcome> {
	match &inner.state {
		State::New => {
			let target = inner.connect_target().clone();
			let addr = (target.server(), target.port_or_default() as u16)
				.to_socket_addrs()
				.map_err(|e| Error::NoConnection(e.to_string()))?
				.next()
				.ok_or_else(|| Error::NoConnection(format!("no address for {}", target.server())))?;
			let tcp = TcpTransport::connect(addr)?;
			inner.transport = Some(TransportHandle::Plain(tcp));
			inner.state = State::Connecting;
			Ok(RunOutcome::Pending)
		}

		State::Connecting => {
			let outcome = match inner.transport.as_mut() {
				Some(TransportHandle::Plain(tcp)) => tcp.connect_step()?,
				_ => return Err(Error::NoConnection("transport missing while connecting".into()).into()),
			};
			if outcome == ConnectOutcome::Pending {
				return Ok(RunOutcome::Pending);
			}
			log::debug!("connected to {}", inner.connect_target().server_and_port());
			if inner.has_proxy() {
				inner.state = State::ProxyReady;
			} else if inner.is_https() {
				inner.state = State::SetupSsl;
			} else {
				inner.state = State::Ready;
			}
			Ok(RunOutcome::Pending)
		}

		State::ProxyReady => {
			if inner.proxy_is_tunnel() {
				inner.state = State::ProxyRequestSent { sent: 0 };
			} else {
				inner.state = State::Ready;
			}
			Ok(RunOutcome::Pending)
		}

		State::ProxyRequestSent { sent } => {
			let sent = *sent;
			let text = inner.build_connect_text();
			let remaining = &text[sent..];
			let transport = inner.transport.as_mut().ok_or_else(|| Error::LostConnection("no transport".into()))?;
			match transport.write_some(remaining)? {
				IoOutcome::Ready(n) => {
					let new_sent = sent + n;
					if new_sent >= text.len() {
						inner.state = State::ProxyReadingHeader { buf: Vec::new() };
					} else {
						inner.state = State::ProxyRequestSent { sent: new_sent };
					}
					Ok(RunOutcome::Pending)
				}
				IoOutcome::WouldBlock => Ok(RunOutcome::Pending),
				IoOutcome::Eof => Err(Error::LostConnection("proxy closed connection while sending CONNECT".into()).into()),
			}
		}

		State::ProxyReadingHeader { .. } => {
			let mut buf = match std::mem::replace(&mut inner.state, State::Ready) {
				State::ProxyReadingHeader { buf } => buf,
				other => {
					inner.state = other;
					unreachable!()
				}
			};
			let transport = inner.transport.as_mut().ok_or_else(|| Error::LostConnection("no transport".into()))?;
			if let Some(line_end) = find_blank_line(&buf) {
				let header_block = String::from_utf8_lossy(&buf[..line_end]).into_owned();
				let mut lines = header_block.split("\r\n");
				let status_line = lines.next().unwrap_or("");
				let mut parts = status_line.splitn(3, ' ');
				let _version = parts.next();
				let code: i32 = parts.next().and_then(|c| c.parse().ok()).unwrap_or(0);

				if (200..300).contains(&code) {
					inner.state = State::SetupSsl;
				} else if code == 407 && !inner.tried_proxy_auth {
					inner.tried_proxy_auth = true;
					let proxy_authenticate = extract_header(&header_block, "proxy-authenticate");
					let proxy_url = inner.config.proxy.clone().unwrap();
					let challenge = proxy_authenticate.and_then(|h| {
						inner.with_client(|c| c.answer_challenge(&h, &proxy_url, true, None, Method::Connect, &inner.target.server_and_port(), &[])).flatten()
					});
					if let Some(challenge) = challenge {
						inner.pending_challenge_header = Some(challenge);
						inner.generation += 1;
						// As with the origin 401 case: a 407's error-page
						// body (commonly with Content-Length) is still
						// sitting unread on the wire and would otherwise be
						// parsed as the retried CONNECT's status line.
						let overread = buf[line_end..].to_vec();
						match extract_header(&header_block, "content-length").and_then(|v| v.trim().parse::<u64>().ok()) {
							Some(len) => {
								let mut reader = IdentityBodyReader::length_known(len);
								reader.prefill(&overread);
								inner.body_decoder = Some(BodyDecoder::Identity(reader));
								inner.state = State::DrainingChallengeBody { resume: ChallengeResume::Proxy };
							}
							None => {
								if let Some(t) = inner.transport.as_mut() {
									t.close();
								}
								inner.transport = None;
								inner.state = State::New;
							}
						}
					} else {
						inner.state = State::Failure(format!("proxy authentication required ({})", code));
					}
				} else {
					inner.state = State::Failure(format!("proxy CONNECT failed with status {}", code));
				}
				return Ok(RunOutcome::Pending);
			}

			let mut chunk = [0u8; 1024];
			match transport.read_some(&mut chunk)? {
				IoOutcome::Ready(n) => {
					buf.extend_from_slice(&chunk[..n]);
					inner.state = State::ProxyReadingHeader { buf };
					Ok(RunOutcome::Pending)
				}
				IoOutcome::WouldBlock => {
					inner.state = State::ProxyReadingHeader { buf };
					Ok(RunOutcome::Pending)
				}
				IoOutcome::Eof => Err(Error::LostConnection("proxy closed connection before responding to CONNECT".into()).into()),
			}
		}

		State::SetupSsl => {
			let plain = match inner.transport.take() {
				Some(TransportHandle::Plain(tcp)) => tcp,
				other => {
					inner.transport = other;
					return Err(Error::Tls("SSL setup requires a plain transport".into()).into());
				}
			};
			let host = inner.target.server().to_string();
			let server_name = rustls::ServerName::try_from(host.as_str()).map_err(|e| Error::Tls(e.to_string()))?;
			let tls = TlsTransport::new(plain, inner.config.tls_config.clone(), server_name)?;
			inner.transport = Some(TransportHandle::Tls(tls));
			inner.state = State::SslHandshake;
			Ok(RunOutcome::Pending)
		}

		State::SslHandshake => {
			let outcome = match inner.transport.as_mut() {
				Some(TransportHandle::Tls(tls)) => tls.handshake_step()?,
				_ => return Err(Error::Tls("transport missing during handshake".into()).into()),
			};
			if outcome == ConnectOutcome::Pending {
				return Ok(RunOutcome::Pending);
			}
			log::debug!("TLS handshake complete with {}", inner.target.server());
			inner.state = State::Ready;
			Ok(RunOutcome::Pending)
		}

		State::Ready => {
			inner.state = State::RequestSent { sent: 0 };
			Ok(RunOutcome::Pending)
		}

		State::RequestSent { sent } => {
			let sent = *sent;
			let text = inner.build_request_text();
			let remaining = &text[sent..];
			let transport = inner.transport.as_mut().ok_or_else(|| Error::LostConnection("no transport".into()))?;
			match transport.write_some(remaining)? {
				IoOutcome::Ready(n) => {
					let new_sent = sent + n;
					if new_sent >= text.len() {
						inner.state = State::ReadingHeader { buf: Vec::new(), status_line: None, last_key: None };
					} else {
						inner.state = State::RequestSent { sent: new_sent };
					}
					Ok(RunOutcome::Pending)
				}
				IoOutcome::WouldBlock => Ok(RunOutcome::Pending),
				IoOutcome::Eof => Err(Error::LostConnection("connection closed while sending request".into()).into()),
			}
		}

		State::ReadingHeader { .. } => read_header_step(inner),

		State::HeaderReady => match inner.body_mode {
			BodyMode::Auto => pump_auto_body(inner),
			BodyMode::Manual | BodyMode::Undecided => Ok(RunOutcome::HeaderReady),
		},

		State::ReadingBody => match inner.body_mode {
			BodyMode::Auto => pump_auto_body(inner),
			_ => Ok(RunOutcome::HeaderReady),
		},

		State::DrainingChallengeBody { resume } => {
			let resume = *resume;
			drain_challenge_body_step(inner, resume)
		}

		State::Failure(message) => Err(Error::InvalidHttp(message.clone()).into()),
	}
}

fn pump_auto_body(inner: &mut Inner) -> Result<RunOutcome> {
	if let Some(throttle) = inner.config.throttle.clone() {
		let now = Instant::now();
		if let Some(last) = inner.throttle_last_tick {
			if now.duration_since(last).as_secs_f64() < throttle.seconds_per_update {
				return Ok(RunOutcome::Pending);
			}
		}
		inner.throttle_last_tick = Some(now);
		let cap = throttle.bytes_per_update.max(1);
		let mut buf = vec![0u8; cap];
		match inner.body_read_step(&mut buf)? {
			None => Ok(RunOutcome::Pending),
			Some(0) => {
				let generation = inner.generation;
				inner.finish_body(generation);
				Ok(RunOutcome::Done)
			}
			Some(n) => {
				write_to_destination(inner, &buf[..n])?;
				Ok(RunOutcome::Pending)
			}
		}
	} else {
		let mut buf = [0u8; 8192];
		match inner.body_read_step(&mut buf)? {
			None => Ok(RunOutcome::Pending),
			Some(0) => {
				let generation = inner.generation;
				inner.finish_body(generation);
				Ok(RunOutcome::Done)
			}
			Some(n) => {
				write_to_destination(inner, &buf[..n])?;
				Ok(RunOutcome::Pending)
			}
		}
	}
}

/// Reads and discards the challenge response's body (§4.10: a 401/407 on a
/// persistent connection must be read past before the retried request is
/// written, or its bytes get parsed as the retry's status line). Resumes
/// `RequestSent`/`ProxyRequestSent` once the decoder reports EOF.
fn drain_challenge_body_step(inner: &mut Inner, resume: ChallengeResume) -> Result<RunOutcome> {
	let mut buf = [0u8; 8192];
	loop {
		match inner.body_read_step(&mut buf)? {
			None => return Ok(RunOutcome::Pending),
			Some(0) => {
				inner.body_decoder = None;
				inner.state = match resume {
					ChallengeResume::Origin => State::RequestSent { sent: 0 },
					ChallengeResume::Proxy => State::ProxyRequestSent { sent: 0 },
				};
				return Ok(RunOutcome::Pending);
			}
			Some(_) => continue,
		}
	}
}

fn write_to_destination(inner: &mut Inner, bytes: &[u8]) -> Result<()> {
	match &mut inner.destination {
		Destination::None => Ok(()),
		Destination::Buffer(buf) => {
			buf.extend_from_slice(bytes);
			Ok(())
		}
		Destination::File(file) => file.write_all(bytes).map_err(|e| Error::DownloadWriteError(e.to_string()).into()),
		Destination::Writer(writer) => writer.write_all(bytes).map_err(|e| Error::DownloadWriteError(e.to_string()).into()),
	}
}

fn read_header_step(inner: &mut Inner) -> Result<RunOutcome> {
	let (mut buf, mut status_line, mut last_key) = match std::mem::replace(&mut inner.state, State::Ready) {
		State::ReadingHeader { buf, status_line, last_key } => (buf, status_line, last_key),
		other => {
			inner.state = other;
			unreachable!()
		}
	};

	loop {
		if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
			let mut line: Vec<u8> = buf.drain(..=pos).collect();
			line.pop();
			if line.last() == Some(&b'\r') {
				line.pop();
			}
			let line_str = String::from_utf8_lossy(&line).into_owned();

			if status_line.is_none() {
				let mut parts = line_str.splitn(3, ' ');
				let version = parts.next().unwrap_or("");
				let code_str = parts.next().unwrap_or("");
				let reason = parts.next().unwrap_or("").trim().to_string();
				let code: u16 = code_str.parse().map_err(|_| Error::NonHttpResponse(format!("bad status line: {}", line_str)))?;
				inner.http_response_version = HttpVersion::parse(version);
				inner.status_code = code as i32;
				// Some servers (and all CONNECT-tunnel peers speaking
				// minimal HTTP/1.0) omit the reason phrase; fall back to
				// the registered default for the status code rather than
				// surfacing an empty string.
				inner.reason = if reason.is_empty() {
					StatusCode::from_u16(code).map(|c| c.default_reason().to_string()).unwrap_or_default()
				} else {
					reason
				};
				status_line = Some((code, inner.reason.clone()));
				continue;
			}

			if line_str.is_empty() {
				// Whatever is left in `buf` was already pulled off the
				// transport past the terminating blank line — commonly the
				// start of the body, read in the same `read_some` call as
				// the header block (scenario S1). Hand it to the body
				// decoder instead of dropping it with `buf`.
				inner.pending_body_bytes = std::mem::take(&mut buf);
				return finish_header_block(inner);
			}

			if line_str.starts_with(' ') || line_str.starts_with('\t') {
				// Header continuation line (LWS-prefixed, spec §6): fold
				// into whichever header was inserted most recently.
				if let Some(key) = &last_key {
					if let Some(existing) = inner.response_headers.get_mut(key) {
						existing.push(' ');
						existing.push_str(line_str.trim());
					}
				}
				continue;
			}

			last_key = Some(inner.ingest_header_line(&line_str)?);
			continue;
		}

		let transport = inner.transport.as_mut().ok_or_else(|| Error::LostConnection("no transport".into()))?;
		let mut chunk = [0u8; 1024];
		match transport.read_some(&mut chunk)? {
			IoOutcome::Ready(0) | IoOutcome::WouldBlock => {
				inner.state = State::ReadingHeader { buf, status_line, last_key };
				return Ok(RunOutcome::Pending);
			}
			IoOutcome::Ready(n) => {
				buf.extend_from_slice(&chunk[..n]);
			}
			IoOutcome::Eof => return Err(Error::LostConnection("connection closed while reading response headers".into()).into()),
		}
	}
}

/// The header block is complete. Runs the §4.10 `ReadHeader` automatic
/// behaviors (proxy auth, origin auth, redirect) in priority order before
/// publishing the stopping point to the caller.
fn finish_header_block(inner: &mut Inner) -> Result<RunOutcome> {
	if let Some(set_cookie) = inner.response_headers.get("set-cookie").cloned() {
		let target = inner.target.clone();
		inner.with_client(|c| c.store_set_cookie(&set_cookie, &target));
	}

	let status = inner.status_u16();

	if status == 401 && !inner.tried_origin_auth {
		if let Some(www_authenticate) = inner.response_headers.get("www-authenticate").cloned() {
			inner.tried_origin_auth = true;
			let target = inner.target.clone();
			let username = if target.has_username() { Some(target.username().to_string()) } else { None };
			let request_path = inner.request_path();
			let challenge = inner
				.with_client(|c| c.answer_challenge(&www_authenticate, &target, false, username.as_deref(), inner.method, &request_path, &inner.request_body))
				.flatten();
			if let Some(challenge) = challenge {
				log::info!("retrying {} with Authorization after 401", target.as_str());
				inner.pending_challenge_header = Some(challenge);
				inner.generation += 1;
				// The 401's own body (an error page, commonly with
				// Content-Length) is still sitting unread on the wire. If
				// the connection can't be reused anyway, just reconnect
				// like the redirect branch below does; otherwise it has to
				// be read past before the retried request is written, or
				// its bytes get parsed as the retry's status line.
				if !inner.is_reusable() {
					if let Some(t) = inner.transport.as_mut() {
						t.close();
					}
					inner.transport = None;
					inner.response_headers.clear();
					inner.state = State::New;
				} else if inner.may_have_body() {
					inner.select_body_decoder();
					inner.response_headers.clear();
					inner.state = State::DrainingChallengeBody { resume: ChallengeResume::Origin };
				} else {
					inner.response_headers.clear();
					inner.state = State::RequestSent { sent: 0 };
				}
				return Ok(RunOutcome::Pending);
			}
		}
	}

	if (300..400).contains(&status) && status != 305 && matches!(inner.method, Method::Get | Method::Head) {
		if let Some(location) = inner.response_headers.get("location").cloned() {
			let mut next = inner.target.resolve(&location);
			if inner.target.has_username() && !next.has_username() {
				next.set_username(inner.target.username());
			}
			let already_visited = inner.redirect_trail.contains(next.as_str());
			if !already_visited {
				log::info!("following redirect {} -> {}", inner.target.as_str(), next.as_str());
				inner.redirect_trail.insert(next.as_str().to_string());
				inner.target = next;
				inner.pending_challenge_header = None;
				inner.tried_origin_auth = false;
				inner.tried_proxy_auth = false;
				inner.generation += 1;
				inner.response_headers.clear();
				let reconnect = !inner.is_reusable();
				if reconnect {
					if let Some(t) = inner.transport.as_mut() {
						t.close();
					}
					inner.transport = None;
					inner.state = State::New;
				} else {
					inner.state = State::RequestSent { sent: 0 };
				}
				return Ok(RunOutcome::Pending);
			}
			log::warn!("redirect cycle detected at {}, stopping", next.as_str());
		}
	}

	inner.pending_challenge_header = None;
	inner.state = State::HeaderReady;
	Ok(RunOutcome::HeaderReady)
}

fn extract_header(header_block: &str, name: &str) -> Option<String> {
	for line in header_block.split("\r\n").skip(1) {
		if let Some((k, v)) = line.split_once(':') {
			if k.trim().eq_ignore_ascii_case(name) {
				return Some(v.trim().to_string());
			}
		}
	}
	None
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
	buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pool_key_distinguishes_proxy() {
		let url = Url::parse("http://example.com/", false);
		let proxy = Url::parse("http://proxy.local:8080/", false);
		let direct = PoolKey::for_url(&url, None);
		let via_proxy = PoolKey::for_url(&url, Some(&proxy));
		assert_ne!(direct, via_proxy);
	}

	#[test]
	fn parses_content_range_with_known_total() {
		let (first, last, total) = parse_content_range("bytes 512-1023/1024").unwrap();
		assert_eq!((first, last, total), (512, 1023, Some(1024)));
	}

	#[test]
	fn parses_content_range_with_unknown_total() {
		let (first, last, total) = parse_content_range("bytes 512-1023/*").unwrap();
		assert_eq!((first, last, total), (512, 1023, None));
		assert!(total.is_none());
	}

	#[test]
	fn conditional_header_prefers_etag_over_date() {
		use crate::entity_tag::EntityTag;
		let mut spec = DocumentSpec::new(Url::parse("http://example.com/", false));
		spec.tag = Some(EntityTag::new("abc", false));
		spec.date = Some(HttpDate::now());
		let (name, value) = conditional_header(&spec).unwrap();
		assert_eq!(name, "If-None-Match");
		assert_eq!(value, "\"abc\"");
	}

	fn test_channel() -> Channel {
		use crate::transport::{build_tls_config, VerifyMode};
		let config = ChannelConfig {
			proxy: None,
			http_version: HttpVersion::Http11,
			persistent_connections: true,
			tls_config: build_tls_config(rustls::RootCertStore::empty(), VerifyMode::Normal, Vec::new()),
			throttle: None,
		};
		Channel::new(Weak::new(), config)
	}

	#[test]
	fn error_for_status_is_ok_below_400() {
		let channel = test_channel();
		channel.inner.borrow_mut().status_code = 304;
		assert!(channel.error_for_status().is_ok());
	}

	#[test]
	fn error_for_status_surfaces_4xx_verbatim() {
		let channel = test_channel();
		{
			let mut inner = channel.inner.borrow_mut();
			inner.status_code = 404;
			inner.reason = "Not Found".to_string();
		}
		match channel.error_for_status().unwrap_err().downcast::<Error>().unwrap() {
			Error::Http { code, reason } => {
				assert_eq!(code, 404);
				assert_eq!(reason, "Not Found");
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}
}
