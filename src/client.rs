//! Owns trust roots, pooled channels, the username table, and the cookie
//! jar for a group of [`Channel`]s (spec §4.11).

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use rustls::RootCertStore;

use crate::auth::{parse_authentication_schemes, Authorization, BasicAuthorization, DigestAuthorization};
use crate::channel::{Channel, ChannelConfig, Inner, PoolKey};
use crate::cookie::{Cookie, CookieJar};
use crate::date::HttpDate;
use crate::error::{Error, Result};
use crate::method::Method;
use crate::transport::{build_tls_config, ExpectedServer, VerifyMode};
use crate::url::Url;

/// HTTP version a channel clamps its requests to (spec §6 `http_version`,
/// §9's `HV_other` open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
	Http10,
	Http11,
	/// Anything the wire parser saw that was neither `HTTP/1.0` nor
	/// `HTTP/1.1`. Preserved verbatim per spec §9: always negotiated *as*
	/// 1.1 when a channel emits its own request line from this value,
	/// flagged here (not fixed) because the source's intent for this corner
	/// is ambiguous.
	Other,
}

impl HttpVersion {
	pub fn parse(token: &str) -> HttpVersion {
		match token {
			"HTTP/1.0" => HttpVersion::Http10,
			"HTTP/1.1" => HttpVersion::Http11,
			_ => HttpVersion::Other,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			HttpVersion::Http10 => "HTTP/1.0",
			HttpVersion::Http11 | HttpVersion::Other => "HTTP/1.1",
		}
	}

	pub fn supports_persistent_connections(self) -> bool {
		!matches!(self, HttpVersion::Http10)
	}
}

/// Download throttle knobs (spec §4.10 "Non-blocking contract"): `run()`
/// copies at most `bytes_per_update` bytes per tick, and refuses to make a
/// tick happen more often than every `seconds_per_update`.
#[derive(Debug, Clone)]
pub struct ThrottleOptions {
	pub bytes_per_update: usize,
	pub seconds_per_update: f64,
}

/// Where to load a PEM trust bundle from (spec §6 `ssl_certificates`).
pub enum CertSource {
	File(std::path::PathBuf),
	Memory(Vec<u8>),
}

/// One `set_username`-equivalent table entry: `server`/`realm` of `None`
/// mean "matches anything", mirroring the original's empty-string wildcard.
#[derive(Debug, Clone)]
struct UsernameEntry {
	server: Option<String>,
	realm: Option<String>,
	credential: String,
}

impl UsernameEntry {
	/// Parses `[server:][realm:]user:pass`, mirroring the original
	/// `HTTPClient::add_http_username`'s positional-colon-count dispatch
	/// exactly (spec §6, §B): one colon is `user:pass`, two is
	/// `realm:user:pass`, three is `server:realm:user:pass`, anything else
	/// is rejected.
	fn parse(s: &str) -> Option<UsernameEntry> {
		let idx: Vec<usize> = s.match_indices(':').map(|(i, _)| i).collect();
		match idx.len() {
			1 => Some(UsernameEntry { server: None, realm: None, credential: s.to_string() }),
			2 => {
				let c1 = idx[0];
				Some(UsernameEntry { server: None, realm: Some(s[..c1].to_string()), credential: s[c1 + 1..].to_string() })
			}
			3 => {
				let (c1, c2) = (idx[0], idx[1]);
				Some(UsernameEntry {
					server: Some(s[..c1].to_string()),
					realm: Some(s[c1 + 1..c2].to_string()),
					credential: s[c2 + 1..].to_string(),
				})
			}
			_ => None,
		}
	}

	/// Specificity score if this entry answers a lookup for
	/// `(effective_server, realm)`, or `None` if it doesn't match at all.
	/// Mirrors the priority order of §4.11's lookup list: specific server
	/// beats wildcard server, specific realm beats wildcard realm.
	fn score(&self, effective_server: &str, realm: &str) -> Option<u8> {
		let server_ok = self.server.as_deref().map(|s| s == effective_server).unwrap_or(true);
		let realm_ok = self.realm.as_deref().map(|r| r == realm).unwrap_or(true);
		if !server_ok || !realm_ok {
			return None;
		}
		Some((self.server.is_some() as u8) * 2 + (self.realm.is_some() as u8))
	}
}

/// Abstract configuration consumed once at [`Client::new`] (spec §6,
/// expanded at SPEC_FULL §A.3). Mirrors `DirectClientOptions` in shape: a
/// plain `Clone` struct of knobs with a doc comment on every field.
#[derive(Clone)]
pub struct ClientOptions {
	/// TLS certificate verification policy.
	pub verify_ssl: VerifyMode,
	/// Clamp outgoing requests to this HTTP version.
	pub http_version: HttpVersion,
	/// Passed through to the TLS layer if set; `None` keeps rustls's
	/// built-in default suite selection.
	pub cipher_suites: Option<Vec<rustls::SupportedCipherSuite>>,
	/// Default proxy for every channel vended by this client.
	pub proxy: Option<Url>,
	/// TLS peer certificate subject pins, checked in addition to
	/// `verify_ssl`.
	pub expected_servers: Vec<ExpectedServer>,
	/// `[server:][realm:]user:pass` entries prefilling the credential
	/// table.
	pub http_usernames: Vec<String>,
	/// PEM trust bundles to load; if empty, falls back to the
	/// `webpki-roots` Mozilla bundle baked into this crate.
	pub ssl_certificates: Vec<CertSource>,
	/// Whether connections may be reused across requests (HTTP/1.1 only).
	pub persistent_connections: bool,
	/// Caps download throughput when streaming a body into a sink.
	pub download_throttle: Option<ThrottleOptions>,
}

impl Default for ClientOptions {
	fn default() -> ClientOptions {
		ClientOptions {
			verify_ssl: VerifyMode::Normal,
			http_version: HttpVersion::Http11,
			cipher_suites: None,
			proxy: None,
			expected_servers: Vec::new(),
			http_usernames: Vec::new(),
			ssl_certificates: Vec::new(),
			persistent_connections: true,
			download_throttle: None,
		}
	}
}

type AuthKey = (String, String);

/// State shared by a `Client` and every `Channel` it vends. Channels hold a
/// [`Weak`] handle to this (spec §9's "per-Client" trust store, generalized
/// to the whole of the client's shared state) so a pooled `Inner` sitting in
/// `pool` below never forms a reference cycle with its own host.
pub(crate) struct ClientShared {
	pub(crate) options: ClientOptions,
	pub(crate) tls_config: Arc<rustls::ClientConfig>,
	cookie_jar: RefCell<CookieJar>,
	usernames: RefCell<Vec<UsernameEntry>>,
	auth_cache: RefCell<HashMap<AuthKey, Box<dyn Authorization>>>,
	pub(crate) pool: RefCell<HashMap<PoolKey, Vec<Rc<RefCell<Inner>>>>>,
}

/// Vends [`Channel`]s that share this client's trust store, cookie jar, and
/// credential tables (spec §4.11).
#[derive(Clone)]
pub struct Client {
	shared: Rc<ClientShared>,
}

impl Client {
	pub fn new(options: ClientOptions) -> Result<Client> {
		let mut roots = RootCertStore::empty();
		if options.ssl_certificates.is_empty() {
			roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
				rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(ta.subject, ta.spki, ta.name_constraints)
			}));
		} else {
			for source in &options.ssl_certificates {
				load_pem_bundle(source, &mut roots)?;
			}
		}

		let tls_config = build_tls_config(roots, options.verify_ssl, options.expected_servers.clone());

		let mut usernames = Vec::new();
		for raw in &options.http_usernames {
			match UsernameEntry::parse(raw) {
				Some(entry) => usernames.push(entry),
				None => return Err(Error::InvalidHttp(format!("invalid http_username entry: {}", raw)).into()),
			}
		}

		Ok(Client {
			shared: Rc::new(ClientShared {
				options,
				tls_config,
				cookie_jar: RefCell::new(CookieJar::new()),
				usernames: RefCell::new(usernames),
				auth_cache: RefCell::new(HashMap::new()),
				pool: RefCell::new(HashMap::new()),
			}),
		})
	}

	/// Builds a fresh (or reused-from-pool) [`Channel`] targeting `url`.
	pub fn make_channel(&self, url: &Url) -> Channel {
		let key = PoolKey::for_url(url, self.shared.options.proxy.as_ref());
		if let Some(inner) = self.shared.pool.borrow_mut().get_mut(&key).and_then(|v| v.pop()) {
			log::debug!("reusing pooled connection for {}", key.describe());
			return Channel::from_pooled(inner);
		}

		let config = ChannelConfig {
			proxy: self.shared.options.proxy.clone(),
			http_version: self.shared.options.http_version,
			persistent_connections: self.shared.options.persistent_connections,
			tls_config: self.shared.tls_config.clone(),
			throttle: self.shared.options.download_throttle.clone(),
		};
		Channel::new(Rc::downgrade(&self.shared), config)
	}

	pub fn cookie_header(&self, url: &Url, now: HttpDate) -> Option<String> {
		self.shared.cookie_jar.borrow().cookie_header(url, now)
	}

	pub fn store_set_cookie(&self, header_value: &str, url: &Url) {
		self.shared.cookie_jar.borrow_mut().store_set_cookie(header_value, url);
	}

	pub fn store_cookie(&self, cookie: Cookie) {
		self.shared.cookie_jar.borrow_mut().store(cookie);
	}

	/// Prefills one `[server:][realm:]user:pass` credential at runtime, the
	/// programmatic equivalent of the `http_username` config entry.
	pub fn set_username(&self, server: &str, realm: &str, credential: &str) {
		let server = if server.is_empty() { None } else { Some(server.to_string()) };
		let realm = if realm.is_empty() { None } else { Some(realm.to_string()) };
		self.shared.usernames.borrow_mut().push(UsernameEntry { server, realm, credential: credential.to_string() });
	}

}

/// The half of [`ClientShared`] a [`Channel`] actually needs: username
/// lookup, cookie access, and the per-realm authorization cache. Exposed as
/// inherent methods on `ClientShared` and reached through the `Weak` handle
/// `Channel` holds — see `channel.rs`'s `Inner::host`.
impl ClientShared {
	pub(crate) fn lookup_username(&self, server: &str, realm: &str, is_proxy: bool, url_username: Option<&str>) -> Option<String> {
		if !is_proxy {
			if let Some(u) = url_username {
				if !u.is_empty() {
					return Some(u.to_string());
				}
			}
		}
		let effective_server = if is_proxy { "*proxy" } else { server };
		self.usernames
			.borrow()
			.iter()
			.filter_map(|e| e.score(effective_server, realm).map(|score| (score, e.credential.clone())))
			.max_by_key(|(score, _)| *score)
			.map(|(_, credential)| credential)
	}

	pub(crate) fn cookie_header(&self, url: &Url, now: HttpDate) -> Option<String> {
		self.cookie_jar.borrow().cookie_header(url, now)
	}

	pub(crate) fn store_set_cookie(&self, header_value: &str, url: &Url) {
		self.cookie_jar.borrow_mut().store_set_cookie(header_value, url);
	}

	/// Answers a freshly received `WWW-Authenticate`/`Proxy-Authenticate`
	/// challenge: picks digest over basic (spec §4.6), looks up a username,
	/// generates the credential header value, and remembers the
	/// authorization object so later requests to the same realm can send it
	/// preemptively (SPEC_FULL §B).
	pub(crate) fn answer_challenge(
		&self,
		header_value: &str,
		url: &Url,
		is_proxy: bool,
		url_username: Option<&str>,
		method: Method,
		request_path: &str,
		body: &[u8],
	) -> Option<String> {
		let schemes = parse_authentication_schemes(header_value);
		let effective_server = if is_proxy { "*proxy".to_string() } else { url.server().to_string() };

		let mut chosen: Option<Box<dyn Authorization>> = None;
		if let Some(tokens) = schemes.get("digest") {
			let digest = DigestAuthorization::new(tokens, url, is_proxy);
			if digest.is_valid() {
				chosen = Some(Box::new(digest));
			}
		}
		if chosen.is_none() {
			if let Some(tokens) = schemes.get("basic") {
				chosen = Some(Box::new(BasicAuthorization::new(tokens, url, is_proxy)));
			}
		}
		let mut auth = chosen?;

		let realm = auth.realm().to_string();
		let username = self.lookup_username(url.server(), &realm, is_proxy, url_username)?;
		let value = auth.generate(method, request_path, &username, body);
		self.auth_cache.borrow_mut().insert((effective_server, realm), auth);
		Some(value)
	}

	/// Reuses a cached authorization for `server`/`is_proxy` without waiting
	/// for a fresh challenge (SPEC_FULL §B). Picks any realm cached for this
	/// server — a simplification of the original's longest-domain-prefix
	/// scan (documented in DESIGN.md).
	pub(crate) fn preemptive_authorization(&self, server: &str, is_proxy: bool, method: Method, request_path: &str, body: &[u8]) -> Option<String> {
		let effective_server = if is_proxy { "*proxy" } else { server };
		let mut cache = self.auth_cache.borrow_mut();
		let key = cache.keys().find(|(s, _)| s == effective_server)?.clone();
		let username = self.lookup_username(server, &key.1, is_proxy, None)?;
		let auth = cache.get_mut(&key)?;
		Some(auth.generate(method, request_path, &username, body))
	}
}

fn load_pem_bundle(source: &CertSource, roots: &mut RootCertStore) -> Result<()> {
	let bytes = match source {
		CertSource::Memory(bytes) => bytes.clone(),
		CertSource::File(path) => {
			let mut buf = Vec::new();
			std::fs::File::open(path)
				.and_then(|mut f| f.read_to_end(&mut buf))
				.map_err(|e| Error::NoConnection(format!("reading cert bundle {}: {}", path.display(), e)))?;
			buf
		}
	};

	let mut cursor = std::io::Cursor::new(bytes);
	let der_certs = rustls_pemfile::certs(&mut cursor).map_err(|e| Error::Tls(format!("invalid PEM bundle: {}", e)))?;
	for der in der_certs {
		roots.add(&rustls::Certificate(der)).map_err(|e| Error::Tls(format!("invalid certificate: {}", e)))?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn username_entry_parses_by_colon_count() {
		let one = UsernameEntry::parse("alice:s3cret").unwrap();
		assert_eq!(one.server, None);
		assert_eq!(one.realm, None);
		assert_eq!(one.credential, "alice:s3cret");

		let two = UsernameEntry::parse("realmX:alice:s3cret").unwrap();
		assert_eq!(two.realm.as_deref(), Some("realmX"));
		assert_eq!(two.credential, "alice:s3cret");

		let three = UsernameEntry::parse("example.com:realmX:alice:s3cret").unwrap();
		assert_eq!(three.server.as_deref(), Some("example.com"));
		assert_eq!(three.realm.as_deref(), Some("realmX"));
		assert_eq!(three.credential, "alice:s3cret");

		assert!(UsernameEntry::parse("nodot").is_none());
		assert!(UsernameEntry::parse("a:b:c:d:e").is_none());
	}

	#[test]
	fn lookup_prefers_specific_server_and_realm() {
		let mut usernames = Vec::new();
		usernames.push(UsernameEntry { server: None, realm: None, credential: "general:pw".into() });
		usernames.push(UsernameEntry { server: Some("example.com".into()), realm: None, credential: "server-only:pw".into() });
		usernames.push(UsernameEntry {
			server: Some("example.com".into()),
			realm: Some("x".into()),
			credential: "exact:pw".into(),
		});

		let best = usernames.iter().filter_map(|e| e.score("example.com", "x").map(|s| (s, e.credential.clone()))).max_by_key(|(s, _)| *s);
		assert_eq!(best.unwrap().1, "exact:pw");
	}
}
