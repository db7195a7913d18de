use crate::date::HttpDate;
use crate::url::Url;

/// A single `Set-Cookie` value: name/value plus scoping attributes.
#[derive(Debug, Clone)]
pub struct Cookie {
	name: String,
	value: String,
	domain: String,
	path: String,
	expires: Option<HttpDate>,
	secure: bool,
}

impl Cookie {
	pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>, path: impl Into<String>) -> Cookie {
		Cookie {
			name: name.into(),
			value: value.into(),
			domain: domain.into(),
			path: path.into(),
			expires: None,
			secure: false,
		}
	}

	pub fn name(&self) -> &str { &self.name }
	pub fn value(&self) -> &str { &self.value }
	pub fn domain(&self) -> &str { &self.domain }
	pub fn path(&self) -> &str { &self.path }
	pub fn expires(&self) -> Option<HttpDate> { self.expires }
	pub fn is_secure(&self) -> bool { self.secure }

	pub fn is_expired(&self, now: HttpDate) -> bool {
		match self.expires {
			Some(e) => e.is_valid() && now.is_valid() && now.seconds() > e.seconds(),
			None => false,
		}
	}

	/// Parses a `Set-Cookie:` header value against the URL it was received
	/// for (used to default `domain`/`path` when absent). The first `k=v`
	/// pair is the name/value; subsequent `;`-delimited pairs are
	/// attributes recognized case-insensitively.
	pub fn parse_set_cookie(format: &str, url: &Url) -> Option<Cookie> {
		let mut cookie = Cookie {
			name: String::new(),
			value: String::new(),
			domain: url.server().to_string(),
			path: url.path().to_string(),
			expires: None,
			secure: false,
		};

		let mut ok = true;
		let mut first = true;
		for part in format.split(';') {
			if !parse_cookie_param(&mut cookie, part.trim(), first) {
				ok = false;
			}
			first = false;
		}

		if !ok { return None; }
		Some(cookie)
	}

	/// Preconditioned on `self`/`other` being equal under the cookie
	/// ordering relation (same domain/path/name); copies value, expiry, and
	/// secure flag without changing where `self` sorts in a jar.
	pub fn update_from(&mut self, other: &Cookie) {
		debug_assert!(self.sort_key() == other.sort_key());
		self.value = other.value.clone();
		self.expires = other.expires;
		self.secure = other.secure;
	}

	fn sort_key(&self) -> (&str, &str, &str) {
		(&self.domain, &self.path, &self.name)
	}

	/// Whether this cookie should be sent with a request to `url`: the
	/// URL's server must equal the cookie domain (or end with it on a dot
	/// boundary, or match with a leading dot prepended), the URL's path
	/// must begin with the cookie path, and `secure` requires TLS.
	pub fn matches_url(&self, url: &Url) -> bool {
		if self.domain.is_empty() {
			return false;
		}
		let server = url.server();
		let domain_matches = server == self.domain
			|| format!(".{}", server) == self.domain
			|| (server.len() > self.domain.len()
				&& server.ends_with(self.domain.as_str())
				&& (self.domain.starts_with('.')
					|| server.as_bytes()[server.len() - self.domain.len() - 1] == b'.'));

		if !domain_matches {
			return false;
		}

		let path = url.path();
		if !(path.len() >= self.path.len() && path.starts_with(self.path.as_str())) {
			return false;
		}

		if self.secure && !url.is_ssl() {
			return false;
		}

		true
	}
}

fn parse_cookie_param(cookie: &mut Cookie, param: &str, first: bool) -> bool {
	let (key, value) = match param.find('=') {
		Some(i) => (&param[..i], &param[i + 1..]),
		None => (param, ""),
	};

	if first {
		cookie.name = key.to_string();
		cookie.value = value.to_string();
		return true;
	}

	match key.to_ascii_lowercase().as_str() {
		"expires" => {
			let date = HttpDate::parse(value);
			if !date.is_valid() {
				return false;
			}
			cookie.expires = Some(date);
		}
		"path" => cookie.path = value.to_string(),
		"domain" => {
			let mut d = value.to_ascii_lowercase();
			if !d.is_empty() && !d.starts_with('.') {
				d = format!(".{}", d);
			}
			cookie.domain = d;
		}
		"secure" => cookie.secure = true,
		_ => return false,
	}
	true
}

impl std::fmt::Display for Cookie {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}={}; path={}; domain={}", self.name, self.value, self.path, self.domain)?;
		if let Some(e) = self.expires {
			write!(f, "; expires={}", e)?;
		}
		if self.secure {
			write!(f, "; secure")?;
		}
		Ok(())
	}
}

/// Total order on `(domain ascending, path descending, name ascending)` —
/// longer paths sort first so they are preferred when sending.
impl PartialEq for Cookie {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == std::cmp::Ordering::Equal
	}
}
impl Eq for Cookie {}

impl PartialOrd for Cookie {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Cookie {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		use std::cmp::Ordering;
		match self.domain.cmp(&other.domain) {
			Ordering::Equal => {}
			o => return o,
		}
		match other.path.cmp(&self.path) {
			Ordering::Equal => {}
			o => return o,
		}
		self.name.cmp(&other.name)
	}
}

/// A per-client jar keeping cookies sorted per the matching order above.
#[derive(Debug, Default)]
pub struct CookieJar {
	cookies: Vec<Cookie>,
}

impl CookieJar {
	pub fn new() -> CookieJar {
		CookieJar { cookies: Vec::new() }
	}

	/// Inserts (or replaces-in-place via `update_from`) a cookie, keeping
	/// the jar sorted.
	pub fn store(&mut self, cookie: Cookie) {
		match self.cookies.binary_search(&cookie) {
			Ok(i) => self.cookies[i].update_from(&cookie),
			Err(i) => self.cookies.insert(i, cookie),
		}
	}

	pub fn store_set_cookie(&mut self, header_value: &str, url: &Url) {
		if let Some(c) = Cookie::parse_set_cookie(header_value, url) {
			self.store(c);
		}
	}

	/// Cookies matching `url`, unexpired, in jar (sort) order — which is
	/// also the order they should be sent in the `Cookie:` header.
	pub fn matching(&self, url: &Url, now: HttpDate) -> Vec<&Cookie> {
		self.cookies
			.iter()
			.filter(|c| c.matches_url(url) && !c.is_expired(now))
			.collect()
	}

	pub fn cookie_header(&self, url: &Url, now: HttpDate) -> Option<String> {
		let matching = self.matching(url, now);
		if matching.is_empty() {
			return None;
		}
		Some(
			matching
				.iter()
				.map(|c| format!("{}={}", c.name(), c.value()))
				.collect::<Vec<_>>()
				.join("; "),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn domain_matching() {
		let url_exact = Url::parse("http://example.com/", false);
		let url_sub = Url::parse("http://www.example.com/", false);
		let url_other = Url::parse("http://other.com/", false);

		let cookie = Cookie::new("n", "v", ".example.com", "/");
		assert!(cookie.matches_url(&url_exact));
		assert!(cookie.matches_url(&url_sub));
		assert!(!cookie.matches_url(&url_other));
	}

	#[test]
	fn path_prefix_matching() {
		let url = Url::parse("http://example.com/a/b", false);
		let cookie_a = Cookie::new("n", "v", ".example.com", "/a");
		let cookie_ab = Cookie::new("n", "v", ".example.com", "/a/b/c");
		assert!(cookie_a.matches_url(&url));
		assert!(!cookie_ab.matches_url(&url));
	}

	#[test]
	fn secure_requires_tls() {
		let mut cookie = Cookie::new("n", "v", ".example.com", "/");
		cookie.secure = true;
		let http_url = Url::parse("http://example.com/", false);
		let https_url = Url::parse("https://example.com/", false);
		assert!(!cookie.matches_url(&http_url));
		assert!(cookie.matches_url(&https_url));
	}

	#[test]
	fn ordering_prefers_longer_path_first() {
		let a = Cookie::new("A", "1", "example.com", "/a/b");
		let b = Cookie::new("B", "2", "example.com", "/a");
		assert!(a < b);
	}

	#[test]
	fn jar_sends_longer_path_cookie_first() {
		let mut jar = CookieJar::new();
		jar.store(Cookie::new("B", "2", "example.com", "/a"));
		jar.store(Cookie::new("A", "1", "example.com", "/a/b"));

		let url = Url::parse("http://example.com/a/b/c", false);
		let header = jar.cookie_header(&url, HttpDate::now()).unwrap();
		assert_eq!(header, "A=1; B=2");
	}

	#[test]
	fn parse_set_cookie_defaults_domain_and_path() {
		let url = Url::parse("http://example.com/a/b", false);
		let cookie = Cookie::parse_set_cookie("session=xyz; Secure", &url).unwrap();
		assert_eq!(cookie.name(), "session");
		assert_eq!(cookie.value(), "xyz");
		assert_eq!(cookie.domain(), "example.com");
		assert_eq!(cookie.path(), "/a/b");
		assert!(cookie.is_secure());
	}

	#[test]
	fn parse_set_cookie_adds_leading_dot_to_domain() {
		let url = Url::parse("http://example.com/", false);
		let cookie = Cookie::parse_set_cookie("n=v; domain=example.com", &url).unwrap();
		assert_eq!(cookie.domain(), ".example.com");
	}

	#[test]
	fn update_from_preserves_ordering_key() {
		let mut a = Cookie::new("n", "old", "example.com", "/");
		let b = Cookie::new("n", "new", "example.com", "/");
		a.update_from(&b);
		assert_eq!(a.value(), "new");
	}
}
