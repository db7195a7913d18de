// https://www.iana.org/assignments/http-status-codes/http-status-codes.xhtml

/// A validated HTTP status code in `100..=599`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(u16);

impl StatusCode {
	pub fn from_u16(v: u16) -> Option<Self> {
		if v < 100 || v >= 600 {
			None
		} else {
			Some(StatusCode(v))
		}
	}

	pub fn as_u16(&self) -> u16 { self.0 }

	pub fn is_informational(&self) -> bool { self.0 >= 100 && self.0 < 200 }
	pub fn is_success(&self) -> bool { self.0 >= 200 && self.0 < 300 }
	pub fn is_redirect(&self) -> bool { self.0 >= 300 && self.0 < 400 }
	pub fn is_client_error(&self) -> bool { self.0 >= 400 && self.0 < 500 }
	pub fn is_error(&self) -> bool { self.0 >= 400 }

	pub fn default_reason(&self) -> &'static str {
		match self.0 {
			100	=> "Continue",
			101	=> "Switching Protocols",
			200	=> "OK",
			201	=> "Created",
			202	=> "Accepted",
			204	=> "No Content",
			206	=> "Partial Content",
			300	=> "Multiple Choices",
			301	=> "Moved Permanently",
			302	=> "Found",
			303	=> "See Other",
			304	=> "Not Modified",
			305	=> "Use Proxy",
			307	=> "Temporary Redirect",
			308	=> "Permanent Redirect",
			400	=> "Bad Request",
			401	=> "Unauthorized",
			402	=> "Payment Required",
			403	=> "Forbidden",
			404	=> "Not Found",
			405	=> "Method Not Allowed",
			407	=> "Proxy Authentication Required",
			408	=> "Request Timeout",
			409	=> "Conflict",
			410	=> "Gone",
			416	=> "Range Not Satisfiable",
			500	=> "Internal Server Error",
			501	=> "Not Implemented",
			502	=> "Bad Gateway",
			503	=> "Service Unavailable",
			504	=> "Gateway Timeout",
			_ => "Unknown",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_out_of_range() {
		assert!(StatusCode::from_u16(99).is_none());
		assert!(StatusCode::from_u16(600).is_none());
		assert!(StatusCode::from_u16(100).is_some());
		assert!(StatusCode::from_u16(599).is_some());
	}

	#[test]
	fn classifies() {
		let c = StatusCode::from_u16(206).unwrap();
		assert!(c.is_success());
		assert!(!c.is_error());
	}
}
