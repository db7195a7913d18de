//! Server authorization challenges and the client-side state built up to
//! answer them (spec §4.6): scheme negotiation, the per-realm domain scope,
//! and the Basic/Digest mechanisms themselves.

mod basic;
mod digest;

pub use basic::BasicAuthorization;
pub use digest::DigestAuthorization;

use crate::method::Method;
use crate::url::Url;
use std::collections::HashMap;

pub type Tokens = HashMap<String, String>;
/// scheme name (lowercase) -> its challenge tokens, in the order
/// `parse_authentication_schemes` encountered them on the wire.
pub type AuthenticationSchemes = HashMap<String, Tokens>;

/// One mechanism's worth of state built from a `WWW-Authenticate` or
/// `Proxy-Authenticate` challenge, able to generate an `Authorization`
/// header value for subsequent requests to URLs within its domain scope.
pub trait Authorization {
	fn mechanism(&self) -> &'static str;

	/// False if the challenge asked for an algorithm/qop this
	/// implementation cannot meet.
	fn is_valid(&self) -> bool {
		true
	}

	fn realm(&self) -> &str;
	fn domain(&self) -> &[String];

	fn generate(&mut self, method: Method, request_path: &str, username: &str, body: &[u8]) -> String;
}

/// Parses the text following a `WWW-Authenticate:`/`Proxy-Authenticate:`
/// header value. The grammar is one or more records of `scheme
/// token=value[,token=value[,...]]`, possibly several comma-delimited
/// records back to back, which makes this a little tricky to scan: an
/// unrecognized `token` (one without a following `=`) is actually the
/// start of the next scheme.
pub fn parse_authentication_schemes(field_value: &str) -> AuthenticationSchemes {
	let mut schemes = AuthenticationSchemes::new();
	let bytes: Vec<char> = field_value.chars().collect();
	let len = bytes.len();

	let mut p = 0usize;
	while p < len && bytes[p].is_whitespace() {
		p += 1;
	}
	if p >= len {
		return schemes;
	}

	let mut q = p;
	while q < len && !bytes[q].is_whitespace() {
		q += 1;
	}
	let mut scheme: String = bytes[p..q].iter().collect::<String>().to_ascii_lowercase();
	schemes.entry(scheme.clone()).or_insert_with(Tokens::new);

	p = q + 1;
	while p < len {
		q = p;
		while q < len && bytes[q] != '=' && bytes[q] != ',' && !bytes[q].is_whitespace() {
			q += 1;
		}
		if q < len && bytes[q] == '=' {
			let token: String = bytes[p..q].iter().collect::<String>().to_ascii_lowercase();
			let (value, next) = scan_quoted_or_unquoted_string(&bytes, q + 1);
			schemes.entry(scheme.clone()).or_insert_with(Tokens::new).insert(token, value);
			p = next;
			while p < len && (bytes[p] == ',' || bytes[p].is_whitespace()) {
				p += 1;
			}
		} else {
			scheme = bytes[p..q].iter().collect::<String>().to_ascii_lowercase();
			schemes.entry(scheme.clone()).or_insert_with(Tokens::new);
			p = q + 1;
		}
	}

	schemes
}

fn scan_quoted_or_unquoted_string(chars: &[char], start: usize) -> (String, usize) {
	let len = chars.len();
	if start >= len {
		return (String::new(), start);
	}

	if chars[start] == '"' {
		let mut result = String::new();
		let mut p = start + 1;
		while p < len && chars[p] != '"' {
			if chars[p] == '\\' {
				p += 1;
				if p < len {
					result.push(chars[p]);
					p += 1;
				}
			} else {
				result.push(chars[p]);
				p += 1;
			}
		}
		if p < len {
			p += 1;
		}
		return (result, p);
	}

	let mut result = String::new();
	let mut p = start;
	while p < len && chars[p] != ',' && !chars[p].is_whitespace() {
		result.push(chars[p]);
		p += 1;
	}
	(result, p)
}

/// The URL with an explicit scheme, no username, an explicit port, and a
/// non-empty path — the form the domain scope is expressed relative to.
pub fn canonical_url(url: &Url) -> Url {
	let mut canon = url.clone();
	let scheme = canon.scheme().to_string();
	canon.set_scheme(&scheme);
	canon.set_username("");
	let port = canon.port_or_default();
	canon.set_port(Some(port));
	let path = canon.path().to_string();
	canon.set_path(&path);
	canon
}

/// Resolves the challenge's `domain` token (a space-separated list of URL
/// prefixes, absolute or relative to the canonical challenge URL) into the
/// list of URL prefixes this authorization applies to. Proxy challenges
/// never carry a domain restriction — they apply to the whole proxy.
pub fn resolve_domain(tokens: &Tokens, url: &Url, is_proxy: bool) -> Vec<String> {
	let canon = canonical_url(url);

	if !is_proxy {
		if let Some(domain) = tokens.get("domain") {
			let mut result = Vec::new();
			for piece in domain.split_whitespace() {
				let domain_url = Url::parse(piece, false);
				if domain_url.has_server() {
					result.push(canonical_url(&domain_url).as_str().to_string());
				} else {
					let mut rel = canon.clone();
					rel.set_path(piece);
					result.push(rel.as_str().to_string());
				}
			}
			if !result.is_empty() {
				return result;
			}
		}
	}

	let canon_str = canon.as_str();
	let cut = canon_str.rfind('/').map(|i| i + 1).unwrap_or(canon_str.len());
	vec![canon_str[..cut].to_string()]
}

pub(crate) fn base64_encode(bytes: &[u8]) -> String {
	base64::encode(bytes)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_single_scheme() {
		let schemes = parse_authentication_schemes(r#"Basic realm="test""#);
		let tokens = schemes.get("basic").unwrap();
		assert_eq!(tokens.get("realm").unwrap(), "test");
	}

	#[test]
	fn parses_multiple_schemes() {
		let schemes = parse_authentication_schemes(
			r#"Digest realm="a", nonce="n1" Basic realm="b""#,
		);
		assert_eq!(schemes.get("digest").unwrap().get("realm").unwrap(), "a");
		assert_eq!(schemes.get("basic").unwrap().get("realm").unwrap(), "b");
	}

	#[test]
	fn domain_defaults_to_path_up_to_rightmost_slash() {
		let url = Url::parse("http://example.com/a/b/c", false);
		let tokens = Tokens::new();
		let domain = resolve_domain(&tokens, &url, false);
		assert_eq!(domain, vec!["http://example.com:80/a/b/".to_string()]);
	}
}
