use crate::error::{Error, Result};

const F_HAS_SCHEME: u32 = 1 << 0;
const F_HAS_AUTHORITY: u32 = 1 << 1;
const F_HAS_USERNAME: u32 = 1 << 2;
const F_HAS_SERVER: u32 = 1 << 3;
const F_HAS_PORT: u32 = 1 << 4;
const F_HAS_PATH: u32 = 1 << 5;
const F_HAS_QUERY: u32 = 1 << 6;

/// A lazily-decomposed URL. The textual form is kept as a single `String`;
/// component getters slice into it via stored byte offsets, and setters
/// splice the string and shift the offsets of every following component.
///
/// Invariant: `self.text` always round-trips through the component
/// accessors — i.e. re-parsing `self.text` yields a value that compares
/// equal on every getter to `self`.
#[derive(Debug, Clone)]
pub struct Url {
	text: String,
	flags: u32,
	scheme_end: usize,
	username_start: usize,
	username_end: usize,
	server_start: usize,
	server_end: usize,
	port_start: usize,
	port_end: usize,
	path_start: usize,
	path_end: usize,
	query_start: usize,
	port: u32,
}

impl Url {
	/// Parses `text` into a `Url`. `server_name_hint` mirrors the original's
	/// `server_name_expected`: a hint that an undecorated string like
	/// `example.com` is a server name, not a local path.
	pub fn parse(text: &str, server_name_hint: bool) -> Url {
		let mut url = Url {
			text: String::new(),
			flags: 0,
			scheme_end: 0,
			username_start: 0,
			username_end: 0,
			server_start: 0,
			server_end: 0,
			port_start: 0,
			port_end: 0,
			path_start: 0,
			path_end: 0,
			query_start: 0,
			port: 0,
		};
		url.set_url(text, server_name_hint);
		url
	}

	/// Completely replaces the URL with `text`.
	pub fn set_url(&mut self, text: &str, mut server_name_hint: bool) {
		let trimmed = text.trim();
		let mut chars: Vec<char> = trimmed.chars().collect();

		if trimmed.is_empty() {
			server_name_hint = false;
		}

		// Replace backslashes with forward slashes, but only up to the
		// first `?` (params after it belong to the host verbatim).
		for c in chars.iter_mut() {
			if *c == '?' {
				break;
			}
			if *c == '\\' {
				*c = '/';
			}
		}

		self.flags = 0;
		self.port = 0;

		let mut start: usize = 0;

		// Scheme: a `:/` before the first `/` makes everything before the
		// colon the (lowercased) scheme.
		self.scheme_end = start;
		if let Some(colon) = find_colon_before_slash(&chars) {
			self.flags |= F_HAS_SCHEME;
			self.scheme_end = colon;
			for c in chars[0..colon].iter_mut() {
				*c = c.to_ascii_lowercase();
			}
			start = colon + 1;
		}

		self.username_start = start;
		self.username_end = start;
		self.server_start = start;
		self.server_end = start;
		self.port_start = start;
		self.port_end = start;

		let has_scheme = self.flags & F_HAS_SCHEME != 0;
		let leading_slashes = start + 1 < chars.len() && chars[start] == '/' && chars[start + 1] == '/';
		let mut has_authority = has_scheme || server_name_hint || leading_slashes;

		if has_authority {
			if !leading_slashes {
				if start < chars.len() && chars[start] == '/' {
					chars.insert(start + 1, '/');
				} else {
					chars.insert(start, '/');
					chars.insert(start, '/');
				}
			}

			start += 2;
			self.flags |= F_HAS_AUTHORITY;
			self.username_start = start;
			self.port_end = chars[start..]
				.iter()
				.position(|&c| c == '/' || c == '?')
				.map(|p| start + p)
				.unwrap_or(chars.len());
			self.text = chars.iter().collect();
			self.parse_authority_in(&mut chars);
			start = self.port_end;
		} else {
			has_authority = false;
		}
		let _ = has_authority;

		self.path_start = start;
		self.path_end = start;
		if start < chars.len() && chars[start] != '?' {
			self.flags |= F_HAS_PATH;
			self.path_start = start;
			self.path_end = chars[start..]
				.iter()
				.position(|&c| c == '?')
				.map(|p| start + p)
				.unwrap_or(chars.len());
			start = self.path_end;
		}

		self.query_start = start;
		if start < chars.len() {
			debug_assert_eq!(chars[start], '?');
			self.flags |= F_HAS_QUERY;
			self.query_start += 1;
		}

		self.text = chars.iter().collect();
	}

	/// Re-splits `[username_start, port_end)` of `chars` as
	/// `[username@]host[:port]`, lowercasing the host and stripping one
	/// trailing dot. Mutates `chars` in place (the dot-stripping shrinks it)
	/// and updates `self.text` and every offset from `server_end` onward.
	fn parse_authority_in(&mut self, chars: &mut Vec<char>) {
		self.flags &= !(F_HAS_USERNAME | F_HAS_SERVER | F_HAS_PORT);

		if self.flags & F_HAS_AUTHORITY == 0 {
			return;
		}

		self.username_end = self.username_start;
		self.port_start = self.port_end;
		self.flags |= F_HAS_SERVER;
		self.server_start = self.username_start;
		self.server_end = self.port_end;

		if let Some(at) = chars[self.username_start..self.port_end]
			.iter()
			.position(|&c| c == '@')
			.map(|p| self.username_start + p)
		{
			self.flags |= F_HAS_USERNAME;
			self.username_end = at;
			self.server_start = at + 1;
		}

		if let Some(colon) = chars[self.server_start..self.port_end]
			.iter()
			.position(|&c| c == ':')
			.map(|p| self.server_start + p)
		{
			self.flags |= F_HAS_PORT;
			self.server_end = colon;
			self.port_start = colon + 1;

			let port_str: String = chars[self.port_start..self.port_end].iter().collect();
			self.port = port_str.parse().unwrap_or(0);
		}

		for c in chars[self.server_start..self.server_end].iter_mut() {
			*c = c.to_ascii_lowercase();
		}

		if self.server_end > self.server_start && chars[self.server_end - 1] == '.' {
			chars.remove(self.server_end - 1);
			self.server_end -= 1;
			self.port_start -= 1;
			self.port_end -= 1;
		}

		self.text = chars.iter().collect();
	}

	fn reparse_authority(&mut self) {
		let mut chars: Vec<char> = self.text.chars().collect();
		self.parse_authority_in(&mut chars);
	}

	// -- presence predicates --

	pub fn has_scheme(&self) -> bool { self.flags & F_HAS_SCHEME != 0 }
	pub fn has_authority(&self) -> bool { self.flags & F_HAS_AUTHORITY != 0 }
	pub fn has_username(&self) -> bool { self.flags & F_HAS_USERNAME != 0 }
	pub fn has_server(&self) -> bool { self.flags & F_HAS_SERVER != 0 }
	pub fn has_port(&self) -> bool { self.flags & F_HAS_PORT != 0 }
	pub fn has_path(&self) -> bool { self.flags & F_HAS_PATH != 0 }
	pub fn has_query(&self) -> bool { self.flags & F_HAS_QUERY != 0 }

	// -- getters --

	pub fn as_str(&self) -> &str { &self.text }

	pub fn scheme(&self) -> &str {
		if self.has_scheme() { &self.text[0..self.scheme_end] } else { "" }
	}

	pub fn username(&self) -> &str {
		if self.has_username() { &self.text[self.username_start..self.username_end] } else { "" }
	}

	pub fn server(&self) -> &str {
		if self.has_server() { &self.text[self.server_start..self.server_end] } else { "" }
	}

	pub fn port(&self) -> Option<u32> {
		if self.has_port() { Some(self.port) } else { None }
	}

	pub fn default_port_for_scheme(scheme: &str) -> u32 {
		match scheme {
			"http" | "" => 80,
			"https" => 443,
			"socks" => 1080,
			_ => 0,
		}
	}

	pub fn port_or_default(&self) -> u32 {
		self.port().unwrap_or_else(|| Url::default_port_for_scheme(self.scheme()))
	}

	pub fn is_default_port(&self) -> bool {
		!self.has_port() || self.port == Url::default_port_for_scheme(self.scheme())
	}

	pub fn is_ssl(&self) -> bool {
		self.scheme().eq_ignore_ascii_case("https")
	}

	pub fn server_and_port(&self) -> String {
		if self.has_port() {
			self.text[self.server_start..self.port_end].to_string()
		} else {
			format!("{}:{}", self.server(), self.port_or_default())
		}
	}

	pub fn path(&self) -> &str {
		if self.has_path() { &self.text[self.path_start..self.path_end] } else { "/" }
	}

	pub fn query(&self) -> Option<&str> {
		if self.has_query() { Some(&self.text[self.query_start..]) } else { None }
	}

	pub fn path_and_query(&self) -> String {
		if self.has_path() {
			self.text[self.path_start..].to_string()
		} else if let Some(q) = self.query() {
			format!("/?{}", q)
		} else {
			"/".to_string()
		}
	}

	// -- setters (offset-preserving splices) --

	pub fn set_scheme(&mut self, scheme: &str) {
		let lc_scheme = scheme.to_ascii_lowercase();
		let length_adjust: i64;

		if lc_scheme.is_empty() {
			// Remove the scheme specification.
			if !self.has_scheme() { return; }
			self.scheme_end += 1; // step over the trailing colon too
			length_adjust = -(self.scheme_end as i64);
			self.text = self.text[self.scheme_end..].to_string();
			self.flags &= !F_HAS_SCHEME;
		} else if !self.has_scheme() {
			// Insert a new scheme specification.
			let trimmed = lc_scheme.strip_suffix(':').unwrap_or(&lc_scheme);
			length_adjust = trimmed.len() as i64 + 1;
			self.text = format!("{}:{}", trimmed, self.text);
			self.scheme_end = trimmed.len();
			self.flags |= F_HAS_SCHEME;
		} else {
			// Replace the existing scheme specification.
			let trimmed = lc_scheme.strip_suffix(':').unwrap_or(&lc_scheme);
			let old_len = self.scheme_end as i64;
			length_adjust = trimmed.len() as i64 - old_len;
			self.text = format!("{}{}", trimmed, &self.text[self.scheme_end..]);
			self.scheme_end = trimmed.len();
			// scheme_end already final; avoid double-adjusting below.
			self.offset_from(0, length_adjust);
			return;
		}

		self.offset_from(0, length_adjust);
	}

	/// Shifts every offset at or after `scheme_end` forward (offsets before
	/// `scheme_end` are the scheme itself and were already fixed up by the
	/// caller).
	fn offset_from(&mut self, _unused: usize, delta: i64) {
		let shift = |v: &mut usize| { *v = (*v as i64 + delta) as usize; };
		shift(&mut self.username_start);
		shift(&mut self.username_end);
		shift(&mut self.server_start);
		shift(&mut self.server_end);
		shift(&mut self.port_start);
		shift(&mut self.port_end);
		shift(&mut self.path_start);
		shift(&mut self.path_end);
		shift(&mut self.query_start);
	}

	/// Replaces `[username_start, port_end)` with a new authority string
	/// (`[username@]server[:port]`).
	pub fn set_authority(&mut self, authority: &str) {
		let mut extra_slash_adjust: i64 = 0;
		let length_adjust: i64;

		if authority.is_empty() {
			if !self.has_authority() { return; }
			let new_username_start = self.username_start - 2;
			length_adjust = -((self.port_end as i64) - (new_username_start as i64));
			self.text = format!("{}{}", &self.text[..new_username_start], &self.text[self.port_end..]);
			self.flags &= !(F_HAS_AUTHORITY | F_HAS_USERNAME | F_HAS_SERVER | F_HAS_PORT);
			self.username_start = new_username_start;
			self.username_end = new_username_start;
			self.server_start = new_username_start;
			self.server_end = new_username_start;
			self.port_start = new_username_start;
		} else if !self.has_authority() {
			length_adjust = authority.len() as i64 + 2;
			let mut extra_slash = "";
			if self.has_path() && !self.text[self.path_start..].starts_with('/') {
				extra_slash = "/";
				extra_slash_adjust = 1;
			}
			self.text = format!(
				"{}//{}{}{}",
				&self.text[..self.username_start],
				authority,
				extra_slash,
				&self.text[self.port_end..]
			);
			self.flags |= F_HAS_AUTHORITY;
			self.username_start += 2;
		} else {
			let old_len = self.port_end as i64 - self.username_start as i64;
			length_adjust = authority.len() as i64 - old_len;
			self.text = format!(
				"{}{}{}",
				&self.text[..self.username_start],
				authority,
				&self.text[self.port_end..]
			);
		}

		self.port_end = (self.port_end as i64 + length_adjust) as usize;
		self.path_start = (self.path_start as i64 + length_adjust) as usize;
		self.path_end = (self.path_end as i64 + length_adjust + extra_slash_adjust) as usize;
		self.query_start = (self.query_start as i64 + length_adjust + extra_slash_adjust) as usize;

		self.reparse_authority();
	}

	pub fn set_username(&mut self, username: &str) {
		if username.is_empty() && !self.has_authority() { return; }
		let mut authority = String::new();
		if !username.is_empty() {
			authority.push_str(username);
			authority.push('@');
		}
		authority.push_str(self.server());
		if let Some(p) = self.port() {
			authority.push(':');
			authority.push_str(&p.to_string());
		}
		self.set_authority(&authority);
	}

	pub fn set_server(&mut self, server: &str) {
		if server.is_empty() && !self.has_authority() { return; }
		let mut authority = String::new();
		if self.has_username() {
			authority.push_str(self.username());
			authority.push('@');
		}
		authority.push_str(server);
		if let Some(p) = self.port() {
			authority.push(':');
			authority.push_str(&p.to_string());
		}
		self.set_authority(&authority);
	}

	pub fn set_port(&mut self, port: Option<u32>) {
		if port.is_none() && !self.has_authority() { return; }
		let mut authority = String::new();
		if self.has_username() {
			authority.push_str(self.username());
			authority.push('@');
		}
		authority.push_str(self.server());
		if let Some(p) = port {
			authority.push(':');
			authority.push_str(&p.to_string());
		}
		self.set_authority(&authority);
	}

	pub fn set_path(&mut self, path: &str) {
		let length_adjust: i64;
		if path.is_empty() {
			if !self.has_path() { return; }
			length_adjust = -((self.path_end as i64) - (self.path_start as i64));
			self.text = format!("{}{}", &self.text[..self.path_start], &self.text[self.path_end..]);
			self.flags &= !F_HAS_PATH;
		} else {
			let cpath = if path.starts_with('/') { path.to_string() } else { format!("/{}", path) };
			if !self.has_path() {
				length_adjust = cpath.len() as i64;
				self.text = format!("{}{}{}", &self.text[..self.path_start], cpath, &self.text[self.path_end..]);
				self.flags |= F_HAS_PATH;
			} else {
				let old_len = self.path_end as i64 - self.path_start as i64;
				length_adjust = cpath.len() as i64 - old_len;
				self.text = format!("{}{}{}", &self.text[..self.path_start], cpath, &self.text[self.path_end..]);
			}
		}
		self.path_end = (self.path_end as i64 + length_adjust) as usize;
		self.query_start = (self.query_start as i64 + length_adjust) as usize;
	}

	pub fn set_query(&mut self, query: Option<&str>) {
		match query {
			None => {
				if !self.has_query() { return; }
				self.query_start -= 1;
				self.text.truncate(self.query_start);
				self.flags &= !F_HAS_QUERY;
			}
			Some(q) if !self.has_query() => {
				self.text = format!("{}?{}", &self.text[..self.query_start], q);
				self.flags |= F_HAS_QUERY;
				self.query_start += 1;
			}
			Some(q) => {
				self.text = format!("{}{}", &self.text[..self.query_start], q);
			}
		}
	}

	/// Resolves a `Location:` header's value, possibly relative, against
	/// `self` (used for redirect following, spec §4.10).
	pub fn resolve(&self, location: &str) -> Url {
		if location.contains("://") || location.starts_with("//") {
			return Url::parse(location, true);
		}
		if location.starts_with('/') {
			let mut u = self.clone();
			u.set_path(location);
			u.set_query(None);
			if let Some(q) = location.find('?') {
				let (p, qq) = location.split_at(q);
				u.set_path(p);
				u.set_query(Some(&qq[1..]));
			}
			return u;
		}
		// Relative to the current path's directory.
		let base_dir = match self.path().rfind('/') {
			Some(i) => &self.path()[..=i],
			None => "/",
		};
		let mut u = self.clone();
		u.set_path(&format!("{}{}", base_dir, location));
		u
	}

	/// Percent-encodes `s`, preserving alphanumerics, `_,.-`, and any byte
	/// in `safe`.
	pub fn quote(s: &str, safe: &str) -> String {
		let mut out = String::with_capacity(s.len());
		for &b in s.as_bytes() {
			push_quoted_byte(&mut out, b, safe, false);
		}
		out
	}

	pub fn quote_plus(s: &str, safe: &str) -> String {
		let mut out = String::with_capacity(s.len());
		for &b in s.as_bytes() {
			if b == b' ' {
				out.push('+');
			} else {
				push_quoted_byte(&mut out, b, safe, true);
			}
		}
		out
	}

	pub fn unquote(s: &str) -> String {
		unquote_impl(s, false)
	}

	pub fn unquote_plus(s: &str) -> String {
		unquote_impl(s, true)
	}
}

fn push_quoted_byte(out: &mut String, b: u8, safe: &str, _plus_mode: bool) {
	let c = b as char;
	if b.is_ascii_alphanumeric() || matches!(b, b'_' | b',' | b'.' | b'-') || safe.as_bytes().contains(&b) {
		out.push(c);
	} else {
		out.push_str(&format!("%{:02x}", b));
	}
}

fn unquote_impl(s: &str, plus_mode: bool) -> String {
	let bytes = s.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut p = 0;
	while p < bytes.len() {
		if bytes[p] == b'%' && p + 2 < bytes.len() {
			let hi = hex_val(bytes[p + 1]);
			let lo = hex_val(bytes[p + 2]);
			if let (Some(hi), Some(lo)) = (hi, lo) {
				out.push((hi << 4) | lo);
				p += 3;
				continue;
			}
			out.push(bytes[p]);
			p += 1;
		} else if plus_mode && bytes[p] == b'+' {
			out.push(b' ');
			p += 1;
		} else {
			out.push(bytes[p]);
			p += 1;
		}
	}
	String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(c: u8) -> Option<u8> {
	match c {
		b'0'..=b'9' => Some(c - b'0'),
		b'a'..=b'f' => Some(c - b'a' + 10),
		b'A'..=b'F' => Some(c - b'A' + 10),
		_ => None,
	}
}

/// Finds the index of the `:` in a `:/` sequence that precedes the first
/// `/`, if any (the scheme/authority boundary rule from §4.1).
fn find_colon_before_slash(chars: &[char]) -> Option<usize> {
	for (i, &c) in chars.iter().enumerate() {
		if c == ':' {
			if i + 1 < chars.len() && chars[i + 1] == '/' {
				return Some(i);
			}
			return None;
		}
		if c == '/' {
			return None;
		}
	}
	None
}

impl std::str::FromStr for Url {
	type Err = Error;
	fn from_str(s: &str) -> Result<Self> {
		Ok(Url::parse(s, true))
	}
}

impl std::fmt::Display for Url {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.text)
	}
}

impl PartialEq for Url {
	fn eq(&self, other: &Self) -> bool {
		self.scheme() == other.scheme()
			&& self.username() == other.username()
			&& self.server() == other.server()
			&& self.port_or_default() == other.port_or_default()
			&& self.path() == other.path()
			&& self.query() == other.query()
	}
}
impl Eq for Url {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_full_url() {
		let u = Url::parse("http://user@example.com:8080/a/b?x=1", false);
		assert_eq!(u.scheme(), "http");
		assert_eq!(u.username(), "user");
		assert_eq!(u.server(), "example.com");
		assert_eq!(u.port(), Some(8080));
		assert_eq!(u.path(), "/a/b");
		assert_eq!(u.query(), Some("x=1"));
	}

	#[test]
	fn defaults_path_to_root() {
		let u = Url::parse("http://example.com", false);
		assert_eq!(u.path(), "/");
		assert!(!u.has_path());
	}

	#[test]
	fn lowercases_scheme_and_server_strips_trailing_dot() {
		let u = Url::parse("HTTP://Example.COM./x", false);
		assert_eq!(u.scheme(), "http");
		assert_eq!(u.server(), "example.com");
	}

	#[test]
	fn default_ports() {
		assert_eq!(Url::default_port_for_scheme("http"), 80);
		assert_eq!(Url::default_port_for_scheme("https"), 443);
		assert_eq!(Url::default_port_for_scheme("socks"), 1080);
		let u = Url::parse("https://example.com/", false);
		assert_eq!(u.port_or_default(), 443);
		assert!(u.is_default_port());
	}

	#[test]
	fn server_name_hint_without_scheme() {
		let u = Url::parse("example.com/path", true);
		assert_eq!(u.server(), "example.com");
		assert_eq!(u.path(), "/path");
	}

	#[test]
	fn round_trip_through_accessors() {
		let u = Url::parse("https://user@host.example:9/p/q?z=1", false);
		let reparsed = Url::parse(u.as_str(), false);
		assert_eq!(u, reparsed);
	}

	#[test]
	fn setters_preserve_sibling_offsets() {
		let mut u = Url::parse("http://example.com/path?q=1", false);
		u.set_scheme("https");
		assert_eq!(u.scheme(), "https");
		assert_eq!(u.server(), "example.com");
		assert_eq!(u.path(), "/path");
		assert_eq!(u.query(), Some("q=1"));

		u.set_path("/other");
		assert_eq!(u.path(), "/other");
		assert_eq!(u.query(), Some("q=1"));

		u.set_query(Some("y=2"));
		assert_eq!(u.query(), Some("y=2"));
		assert_eq!(u.path(), "/other");
	}

	#[test]
	fn set_authority_on_relative_path_inserts_leading_slash() {
		let mut u = Url::parse("relativepath", false);
		u.set_authority("example.com");
		assert_eq!(u.server(), "example.com");
	}

	#[test]
	fn quote_unquote_inverse() {
		for s in ["hello world", "a/b?c=d&e=f", "100% done!", "", "unicode: héllo"] {
			assert_eq!(Url::unquote(&Url::quote(s, "")), s);
			assert_eq!(Url::unquote_plus(&Url::quote_plus(s, "")), s);
		}
	}

	#[test]
	fn quote_plus_encodes_space_as_plus() {
		assert_eq!(Url::quote_plus("a b", ""), "a+b");
	}
}
