use super::{resolve_domain, Authorization, Tokens};
use crate::method::Method;
use crate::url::Url;

/// RFC 2617 "Basic" authorization: username and password sent in cleartext,
/// base64-encoded. No cryptographic strength at all, but universally
/// supported and trivial to implement.
#[derive(Debug, Clone)]
pub struct BasicAuthorization {
	realm: String,
	domain: Vec<String>,
}

impl BasicAuthorization {
	pub fn new(tokens: &Tokens, url: &Url, is_proxy: bool) -> BasicAuthorization {
		BasicAuthorization {
			realm: tokens.get("realm").cloned().unwrap_or_default(),
			domain: resolve_domain(tokens, url, is_proxy),
		}
	}
}

impl Authorization for BasicAuthorization {
	fn mechanism(&self) -> &'static str {
		"basic"
	}

	fn realm(&self) -> &str {
		&self.realm
	}

	fn domain(&self) -> &[String] {
		&self.domain
	}

	fn generate(&mut self, _method: Method, _request_path: &str, username: &str, _body: &[u8]) -> String {
		format!("Basic {}", super::base64_encode(username.as_bytes()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encodes_username_password() {
		let url = Url::parse("http://example.com/private/", false);
		let tokens: Tokens = [("realm".to_string(), "Private Area".to_string())].into_iter().collect();
		let mut auth = BasicAuthorization::new(&tokens, &url, false);
		let header = auth.generate(Method::Get, "/private/doc", "alice:hunter2", b"");
		assert_eq!(header, "Basic YWxpY2U6aHVudGVyMg==");
		assert_eq!(auth.realm(), "Private Area");
	}
}
