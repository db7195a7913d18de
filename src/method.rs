/// Request method tokens recognized on the wire (spec §6). The core's own
/// request path only ever emits `GET`, `HEAD`, `POST`, and `CONNECT` (the
/// last only for HTTPS-via-proxy tunneling), but the full token set is
/// recognized so a caller-supplied method round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Get,
	Head,
	Post,
	Put,
	Delete,
	Trace,
	Connect,
	Options,
}

impl Method {
	pub fn as_str(&self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Head => "HEAD",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Delete => "DELETE",
			Method::Trace => "TRACE",
			Method::Connect => "CONNECT",
			Method::Options => "OPTIONS",
		}
	}

	/// Whether a response to this method can ever carry a body (spec §4.10
	/// BeginBody: HEAD responses never have a body regardless of status).
	pub fn response_may_have_body(&self) -> bool {
		!matches!(self, Method::Head)
	}
}

impl std::fmt::Display for Method {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
