use crate::date::HttpDate;
use crate::entity_tag::EntityTag;
use crate::url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RequestMode {
	Any,
	Equal,
	Newer,
	EqualOrNewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CacheControl {
	AllowCache,
	Revalidate,
	NoCache,
}

/// A `(URL, optional ETag, optional Date, RequestMode, CacheControl)`
/// tuple. Equality/ordering only ever considers URL/ETag/Date; the
/// request/cache fields are presentation-only (spec §3).
#[derive(Debug, Clone)]
pub struct DocumentSpec {
	pub url: Url,
	pub tag: Option<EntityTag>,
	pub date: Option<HttpDate>,
	pub request_mode: RequestMode,
	pub cache_control: CacheControl,
}

impl DocumentSpec {
	pub fn new(url: Url) -> DocumentSpec {
		DocumentSpec {
			url,
			tag: None,
			date: None,
			request_mode: RequestMode::Any,
			cache_control: CacheControl::AllowCache,
		}
	}

	/// Ordering used by `Ord`/`PartialOrd`: compare a flags bitmask (which
	/// of tag/date are present) first, then URL, then (if present) ETag,
	/// then (if present) Date.
	fn flags(&self) -> u8 {
		(self.tag.is_some() as u8) | ((self.date.is_some() as u8) << 1)
	}

	/// Parses the textual form `"[ URL (tag) date ]"`, where each of the
	/// two inner components is optional.
	pub fn parse(s: &str) -> Option<DocumentSpec> {
		let s = s.trim();
		let inner = s.strip_prefix('[')?.strip_suffix(']')?.trim();

		let (url_part, rest) = match inner.find(|c| c == '(' || c == '"') {
			Some(i) => (inner[..i].trim(), &inner[i..]),
			None => (inner, ""),
		};
		if url_part.is_empty() {
			return None;
		}
		let url = Url::parse(url_part, true);

		let mut tag = None;
		let mut rest = rest.trim_start();
		if let Some(stripped) = rest.strip_prefix('(') {
			let close = stripped.find(')')?;
			tag = EntityTag::parse(stripped[..close].trim());
			rest = stripped[close + 1..].trim_start();
		}

		let mut date = None;
		if !rest.is_empty() {
			date = HttpDate::parse_quoted(rest);
		}

		let mut spec = DocumentSpec::new(url);
		spec.tag = tag;
		spec.date = date;
		Some(spec)
	}
}

impl std::fmt::Display for DocumentSpec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "[ {}", self.url)?;
		if let Some(tag) = &self.tag {
			write!(f, " ({})", tag.format())?;
		}
		if let Some(date) = &self.date {
			write!(f, " {}", date.to_quoted_string())?;
		}
		write!(f, " ]")
	}
}

impl PartialEq for DocumentSpec {
	fn eq(&self, other: &Self) -> bool {
		self.url == other.url && self.tag == other.tag && self.date == other.date
	}
}
impl Eq for DocumentSpec {}

impl PartialOrd for DocumentSpec {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for DocumentSpec {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		use std::cmp::Ordering;
		match self.flags().cmp(&other.flags()) {
			Ordering::Equal => {}
			o => return o,
		}
		match self.url.as_str().cmp(other.url.as_str()) {
			Ordering::Equal => {}
			o => return o,
		}
		match (&self.tag, &other.tag) {
			(Some(a), Some(b)) => match a.opaque().cmp(b.opaque()) {
				Ordering::Equal => {}
				o => return o,
			},
			_ => {}
		}
		match (&self.date, &other.date) {
			(Some(a), Some(b)) => return a.cmp(b),
			_ => {}
		}
		Ordering::Equal
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_bare_url() {
		let spec = DocumentSpec::parse("[ http://example.com/doc ]").unwrap();
		assert_eq!(spec.url.as_str(), "http://example.com/doc");
		assert!(spec.tag.is_none());
		assert!(spec.date.is_none());
	}

	#[test]
	fn parses_tag_and_date() {
		let spec = DocumentSpec::parse(
			"[ http://example.com/doc (\"abc\") \"Sun, 06 Nov 1994 08:49:37 GMT\" ]",
		)
		.unwrap();
		assert_eq!(spec.tag.unwrap().opaque(), "abc");
		assert!(spec.date.unwrap().is_valid());
	}

	#[test]
	fn equality_ignores_request_and_cache_fields() {
		let mut a = DocumentSpec::new(Url::parse("http://example.com/", false));
		let mut b = a.clone();
		a.request_mode = RequestMode::Newer;
		b.request_mode = RequestMode::Any;
		a.cache_control = CacheControl::NoCache;
		b.cache_control = CacheControl::AllowCache;
		assert_eq!(a, b);
	}
}
