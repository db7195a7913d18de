use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::{resolve_domain, Authorization, Tokens};
use crate::method::Method;
use crate::url::Url;
use md5::{Digest, Md5};

const Q_AUTH: u8 = 0x1;
const Q_AUTH_INT: u8 = 0x2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
	Md5,
	Md5Sess,
	Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChosenQop {
	Unused,
	Auth,
	AuthInt,
}

impl ChosenQop {
	fn as_str(self) -> &'static str {
		match self {
			ChosenQop::Unused => "unused",
			ChosenQop::Auth => "auth",
			ChosenQop::AuthInt => "auth-int",
		}
	}
}

/// RFC 2617 "Digest" authorization. Unlike Basic, the password is never
/// sent: the client proves knowledge of it by hashing it together with a
/// server-chosen nonce and (for `qop=auth-int`) the request body.
#[derive(Debug, Clone)]
pub struct DigestAuthorization {
	realm: String,
	domain: Vec<String>,

	nonce: String,
	nonce_count: u32,
	opaque: String,
	algorithm: Algorithm,
	/// Cached per RFC 2617's md5-sess rule: A1 is computed once per
	/// challenge and reused for every subsequent request against it, even
	/// though the server may be expecting a stale-nonce invalidation. This
	/// mirrors the source this was distilled from rather than fixing it.
	a1: Option<String>,
	cnonce: String,
	qop_mask: u8,
	chosen_qop: ChosenQop,
}

impl DigestAuthorization {
	pub fn new(tokens: &Tokens, url: &Url, is_proxy: bool) -> DigestAuthorization {
		let algorithm = match tokens.get("algorithm").map(|s| s.to_ascii_lowercase()) {
			None => Algorithm::Md5,
			Some(ref s) if s == "md5" => Algorithm::Md5,
			Some(ref s) if s == "md5-sess" => Algorithm::Md5Sess,
			Some(_) => Algorithm::Unknown,
		};

		let mut qop_mask = 0u8;
		if let Some(qop) = tokens.get("qop") {
			for token in qop.to_ascii_lowercase().split(',') {
				match token.trim() {
					"auth" => qop_mask |= Q_AUTH,
					"auth-int" => qop_mask |= Q_AUTH_INT,
					_ => {}
				}
			}
		}

		// spec §4.6: cnonce is derived from (current time, monotonic clock,
		// URL, a fixed literal) hashed with MD5 — folding in both clocks
		// keeps it unpredictable per-request rather than fixed per-URL.
		let now_secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
		let cnonce_source = format!("{}:{}:{}:panhttp", now_secs, monotonic_ticks(), url.as_str());
		let cnonce = calc_md5(cnonce_source.as_bytes());

		DigestAuthorization {
			realm: tokens.get("realm").cloned().unwrap_or_default(),
			domain: resolve_domain(tokens, url, is_proxy),
			nonce: tokens.get("nonce").cloned().unwrap_or_default(),
			nonce_count: 0,
			opaque: tokens.get("opaque").cloned().unwrap_or_default(),
			algorithm,
			a1: None,
			cnonce,
			qop_mask,
			chosen_qop: ChosenQop::Unused,
		}
	}

	fn calc_h(&self, data: &str) -> String {
		match self.algorithm {
			Algorithm::Unknown | Algorithm::Md5 | Algorithm::Md5Sess => calc_md5(data.as_bytes()),
		}
	}

	fn calc_kd(&self, secret: &str, data: &str) -> String {
		self.calc_h(&format!("{}:{}", secret, data))
	}

	fn get_a1(&mut self, username: &str, password: &str) -> String {
		match self.algorithm {
			Algorithm::Unknown | Algorithm::Md5 => format!("{}:{}:{}", username, self.realm, password),
			Algorithm::Md5Sess => {
				if self.a1.is_none() {
					let inner = self.calc_h(&format!("{}:{}:{}", username, self.realm, password));
					self.a1 = Some(format!("{}:{}:{}", inner, self.nonce, self.cnonce));
				}
				self.a1.clone().unwrap()
			}
		}
	}

	fn get_a2(&mut self, method: Method, request_path: &str, body: &[u8]) -> String {
		if self.qop_mask & Q_AUTH_INT != 0 && !body.is_empty() {
			self.chosen_qop = ChosenQop::AuthInt;
			format!("{}:{}:{}", method.as_str(), request_path, calc_md5(body))
		} else {
			self.chosen_qop = ChosenQop::Auth;
			format!("{}:{}", method.as_str(), request_path)
		}
	}

	fn calc_request_digest(&mut self, username: &str, password: &str, method: Method, request_path: &str, body: &[u8]) -> String {
		self.chosen_qop = ChosenQop::Unused;
		let h_a1 = self.calc_h(&self.get_a1(username, password));
		let h_a2 = self.calc_h(&self.get_a2(method, request_path, body));

		let data = if self.qop_mask == 0 {
			self.chosen_qop = ChosenQop::Unused;
			format!("{}:{}", self.nonce, h_a2)
		} else {
			format!(
				"{}:{}:{}:{}:{}",
				self.nonce,
				self.hex_nonce_count(),
				self.cnonce,
				self.chosen_qop.as_str(),
				h_a2
			)
		};

		self.calc_kd(&h_a1, &data)
	}

	fn hex_nonce_count(&self) -> String {
		format!("{:08x}", self.nonce_count)
	}
}

impl Authorization for DigestAuthorization {
	fn mechanism(&self) -> &'static str {
		"digest"
	}

	fn is_valid(&self) -> bool {
		self.algorithm != Algorithm::Unknown
	}

	fn realm(&self) -> &str {
		&self.realm
	}

	fn domain(&self) -> &[String] {
		&self.domain
	}

	fn generate(&mut self, method: Method, request_path: &str, username: &str, body: &[u8]) -> String {
		self.nonce_count += 1;

		let colon = username.find(':').unwrap_or(username.len());
		let (user, rest) = username.split_at(colon);
		let password = rest.strip_prefix(':').unwrap_or("");

		let digest = self.calc_request_digest(user, password, method, request_path, body);
		let algorithm_str = match self.algorithm {
			Algorithm::Md5 => "MD5",
			Algorithm::Md5Sess => "MD5-sess",
			Algorithm::Unknown => "unknown",
		};

		let mut out = format!(
			"Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri={}, response=\"{}\", algorithm={}",
			user, self.realm, self.nonce, request_path, digest, algorithm_str
		);

		if !self.opaque.is_empty() {
			out.push_str(&format!(", opaque=\"{}\"", self.opaque));
		}

		if self.chosen_qop != ChosenQop::Unused {
			out.push_str(&format!(", qop={}, cnonce=\"{}\", nc={}", self.chosen_qop.as_str(), self.cnonce, self.hex_nonce_count()));
		}

		out
	}
}

fn calc_md5(data: &[u8]) -> String {
	let mut hasher = Md5::new();
	hasher.update(data);
	let digest = hasher.finalize();
	digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Nanoseconds since this process's first call here — the "monotonic
/// clock" input to the cnonce derivation (spec §4.6), standing in for the
/// original's `clock()` reading.
fn monotonic_ticks() -> u128 {
	static START: OnceLock<Instant> = OnceLock::new();
	let start = *START.get_or_init(Instant::now);
	start.elapsed().as_nanos()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn challenge(extra: &[(&str, &str)]) -> Tokens {
		let mut tokens: Tokens = [
			("realm".to_string(), "testrealm@host.com".to_string()),
			("nonce".to_string(), "dcd98b7102dd2f0e8b11d0f600bfb0c093".to_string()),
		]
		.into_iter()
		.collect();
		for (k, v) in extra {
			tokens.insert(k.to_string(), v.to_string());
		}
		tokens
	}

	#[test]
	fn md5_without_qop_matches_rfc2069_style() {
		let url = Url::parse("http://www.example.com/dir/index.html", false);
		let tokens = challenge(&[]);
		let mut auth = DigestAuthorization::new(&tokens, &url, false);
		let header = auth.generate(Method::Get, "/dir/index.html", "Mufasa:CircleOfLife", b"");
		assert!(header.contains("response=\""));
		assert!(!header.contains("qop="));
	}

	#[test]
	fn qop_auth_includes_cnonce_and_nc() {
		let url = Url::parse("http://www.example.com/dir/index.html", false);
		let tokens = challenge(&[("qop", "auth")]);
		let mut auth = DigestAuthorization::new(&tokens, &url, false);
		let header = auth.generate(Method::Get, "/dir/index.html", "Mufasa:CircleOfLife", b"");
		assert!(header.contains("qop=auth"));
		assert!(header.contains("nc=00000001"));

		let header2 = auth.generate(Method::Get, "/dir/index.html", "Mufasa:CircleOfLife", b"");
		assert!(header2.contains("nc=00000002"));
	}

	#[test]
	fn unknown_algorithm_is_invalid() {
		let url = Url::parse("http://example.com/", false);
		let tokens = challenge(&[("algorithm", "sha-256")]);
		let auth = DigestAuthorization::new(&tokens, &url, false);
		assert!(!auth.is_valid());
	}

	#[test]
	fn md5_sess_caches_a1_across_calls() {
		let url = Url::parse("http://example.com/", false);
		let tokens = challenge(&[("algorithm", "md5-sess"), ("qop", "auth")]);
		let mut auth = DigestAuthorization::new(&tokens, &url, false);
		let first = auth.get_a1("user", "pass");
		let second = auth.get_a1("user", "pass");
		assert_eq!(first, second);
	}
}
