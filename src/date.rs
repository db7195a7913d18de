use chrono::{Datelike, NaiveDate, TimeZone, Timelike, Utc};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
	"Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Seconds-since-epoch in UTC, plus a validity flag (an invalid `HttpDate`
/// is the result of failing to parse a date string, mirroring
/// `HTTPDate::is_valid()` in the source this was distilled from).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HttpDate {
	seconds: Option<i64>,
}

impl HttpDate {
	pub fn invalid() -> HttpDate {
		HttpDate { seconds: None }
	}

	pub fn from_seconds(seconds: i64) -> HttpDate {
		HttpDate { seconds: Some(seconds) }
	}

	pub fn is_valid(&self) -> bool {
		self.seconds.is_some()
	}

	pub fn seconds(&self) -> Option<i64> {
		self.seconds
	}

	pub fn now() -> HttpDate {
		HttpDate::from_seconds(Utc::now().timestamp())
	}

	/// Parses any of the three RFC 2616 date formats (RFC 1123, RFC 850,
	/// asctime). Tokenizes on whitespace, `,`, `:`, `-`, `/` the same way
	/// the original `get_token` does, assigning numeric tokens to fields in
	/// positional order with the `hh:` / `mm:` and `mm/` / `dd/` lookahead
	/// rules described in spec §4.2.
	pub fn parse(s: &str) -> HttpDate {
		let mut pos = 0usize;
		let chars: Vec<char> = s.chars().collect();

		let mut got_month = false;
		let mut got_day = false;
		let mut got_year = false;
		let mut got_hour = false;
		let mut got_minute = false;
		let mut got_second = false;
		let mut got_weekday = false;

		let mut month: i32 = 0;
		let mut day: i32 = 0;
		let mut year: i32 = 0;
		let mut hour: i32 = 0;
		let mut minute: i32 = 0;
		let mut second: i32 = 0;

		#[derive(Clone, Copy, PartialEq)]
		enum Expect { None, Second, Year }
		let mut expect_next = Expect::None;

		loop {
			let (token, trailing, is_digits) = match next_token(&chars, &mut pos) {
				Some(t) => t,
				None => break,
			};
			let expected = expect_next;
			expect_next = Expect::None;

			if is_digits {
				let value: i32 = token.parse().unwrap_or(0);
				if trailing == Some(':') {
					if !got_hour {
						hour = value;
						got_hour = true;
					} else if !got_minute {
						minute = value;
						got_minute = true;
						expect_next = Expect::Second;
					} else {
						return HttpDate::invalid();
					}
				} else if trailing == Some('/') {
					if !got_month {
						month = value - 1;
						got_month = true;
					} else if !got_day {
						day = value;
						got_day = true;
						expect_next = Expect::Year;
					} else {
						return HttpDate::invalid();
					}
				} else if expected == Expect::Second {
					second = value;
					got_second = true;
				} else if expected == Expect::Year {
					year = value;
					got_year = true;
				} else if !got_day {
					day = value;
					got_day = true;
				} else if !got_year {
					year = value;
					got_year = true;
				} else if !got_hour {
					hour = value;
					got_hour = true;
				} else if !got_minute {
					minute = value;
					got_minute = true;
				} else if !got_second {
					second = value;
					got_second = true;
				} else {
					return HttpDate::invalid();
				}
			} else {
				let mut matched = false;
				if let Some(i) = WEEKDAYS.iter().position(|&w| w == token) {
					if got_weekday {
						return HttpDate::invalid();
					}
					got_weekday = true;
					matched = true;
					let _ = i;
				}
				if !matched {
					if let Some(i) = MONTHS.iter().position(|&m| m == token) {
						if got_month {
							return HttpDate::invalid();
						}
						got_month = true;
						month = i as i32;
						matched = true;
					}
				}
				if !matched && token == "Gmt" {
					matched = true;
				}
				if !matched {
					return HttpDate::invalid();
				}
			}
		}

		if !(got_month && got_day && got_year && got_hour && got_minute) {
			return HttpDate::invalid();
		}

		if year < 100 {
			// Two-digit year: assume the same century as now, unless that
			// assumption puts it more than 50 years in the future.
			let now_year = Utc::now().year();
			let century = 100 * (now_year / 100);
			year += century;
			if year - now_year > 50 {
				year -= 100;
			}
		} else if year < 1900 {
			// Invalid three-digit year (spec §4.2: "rejected if 100..1899").
			return HttpDate::invalid();
		}

		if !(0..12).contains(&month)
			|| !(1..=31).contains(&day)
			|| !(0..60).contains(&hour)
			|| !(0..60).contains(&minute)
			|| !(0..62).contains(&second)
		{
			return HttpDate::invalid();
		}

		let date = match NaiveDate::from_ymd_opt(year, (month + 1) as u32, day as u32) {
			Some(d) => d,
			None => return HttpDate::invalid(),
		};
		let time = match date.and_hms_opt(hour as u32, minute as u32, (second % 60) as u32) {
			Some(t) => t,
			None => return HttpDate::invalid(),
		};

		HttpDate::from_seconds(Utc.from_utc_datetime(&time).timestamp())
	}

	/// Always encodes in RFC 1123 canonical form:
	/// `"Day, DD Mon YYYY HH:MM:SS GMT"`.
	pub fn to_rfc1123(&self) -> String {
		match self.seconds {
			None => "Invalid Date".to_string(),
			Some(secs) => {
				let dt = Utc.timestamp_opt(secs, 0).single().unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());
				format!(
					"{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
					WEEKDAYS[dt.weekday().num_days_from_sunday() as usize],
					dt.day(),
					MONTHS[dt.month0() as usize],
					dt.year(),
					dt.hour(),
					dt.minute(),
					dt.second(),
				)
			}
		}
	}

	/// The quoted textual form used inside composite serializations such as
	/// `DocumentSpec`'s own textual form (§4.4) — wraps the RFC 1123 string
	/// in literal double quotes so the end of the date is unambiguous.
	pub fn to_quoted_string(&self) -> String {
		format!("\"{}\"", self.to_rfc1123())
	}

	pub fn parse_quoted(s: &str) -> Option<HttpDate> {
		let s = s.trim();
		if !(s.starts_with('"') && s.ends_with('"') && s.len() >= 2) {
			return None;
		}
		let inner = &s[1..s.len() - 1];
		let date = HttpDate::parse(inner);
		if date.is_valid() { Some(date) } else { None }
	}
}

impl std::fmt::Display for HttpDate {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.to_rfc1123())
	}
}

impl std::ops::Add<i64> for HttpDate {
	type Output = HttpDate;
	fn add(self, rhs: i64) -> HttpDate {
		HttpDate { seconds: self.seconds.map(|s| s + rhs) }
	}
}

impl std::ops::Sub<i64> for HttpDate {
	type Output = HttpDate;
	fn sub(self, rhs: i64) -> HttpDate {
		HttpDate { seconds: self.seconds.map(|s| s - rhs) }
	}
}

/// Difference in seconds between two dates.
impl std::ops::Sub<HttpDate> for HttpDate {
	type Output = i64;
	fn sub(self, rhs: HttpDate) -> i64 {
		self.seconds.unwrap_or(0) - rhs.seconds.unwrap_or(0)
	}
}

/// Extracts the next alphanumeric token starting at `pos`, matching
/// `HTTPDate::get_token`: a run of letters is truncated to 3 chars and
/// title-cased; a run of digits also consumes (and reports) one trailing
/// non-alpha character so `hh:`/`mm/` lookahead works.
fn next_token(chars: &[char], pos: &mut usize) -> Option<(String, Option<char>, bool)> {
	let mut start = *pos;
	while start < chars.len() && !chars[start].is_alphanumeric() {
		start += 1;
	}
	if start >= chars.len() {
		*pos = chars.len();
		return None;
	}

	if chars[start].is_alphabetic() {
		let mut token = String::new();
		token.push(chars[start].to_ascii_uppercase());
		let mut p = start + 1;
		while p < chars.len() && chars[p].is_alphabetic() {
			if token.len() < 3 {
				token.push(chars[p].to_ascii_lowercase());
			}
			p += 1;
		}
		*pos = p;
		Some((token, None, false))
	} else {
		let mut p = start + 1;
		while p < chars.len() && chars[p].is_ascii_digit() {
			p += 1;
		}
		let mut trailing = None;
		if p < chars.len() && !chars[p].is_alphabetic() {
			trailing = Some(chars[p]);
			p += 1;
		}
		let token: String = chars[start..p]
			.iter()
			.take_while(|c| c.is_ascii_digit())
			.collect();
		*pos = p;
		Some((token, trailing, true))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_rfc1123() {
		let d = HttpDate::parse("Sun, 06 Nov 1994 08:49:37 GMT");
		assert!(d.is_valid());
		assert_eq!(d.to_rfc1123(), "Sun, 06 Nov 1994 08:49:37 GMT");
	}

	#[test]
	fn parses_rfc850() {
		let d = HttpDate::parse("Sunday, 06-Nov-94 08:49:37 GMT");
		assert!(d.is_valid());
		assert_eq!(d.to_rfc1123(), "Sun, 06 Nov 1994 08:49:37 GMT");
	}

	#[test]
	fn parses_asctime() {
		let d = HttpDate::parse("Sun Nov  6 08:49:37 1994");
		assert!(d.is_valid());
		assert_eq!(d.to_rfc1123(), "Sun, 06 Nov 1994 08:49:37 GMT");
	}

	#[test]
	fn rejects_garbage() {
		assert!(!HttpDate::parse("not a date").is_valid());
		assert!(!HttpDate::parse("").is_valid());
	}

	#[test]
	fn rejects_three_digit_year() {
		assert!(!HttpDate::parse("Sun, 06 Nov 994 08:49:37 GMT").is_valid());
	}

	#[test]
	fn canonicalization_is_a_fixed_point() {
		let d = HttpDate::parse("Sunday, 06-Nov-94 08:49:37 GMT");
		let round_tripped = HttpDate::parse(&d.to_rfc1123());
		assert!(round_tripped.is_valid());
		assert_eq!(round_tripped.to_rfc1123(), d.to_rfc1123());
	}

	#[test]
	fn ordering_uses_seconds() {
		let a = HttpDate::parse("Sun, 06 Nov 1994 08:49:37 GMT");
		let b = HttpDate::parse("Mon, 07 Nov 1994 08:49:37 GMT");
		assert!(a < b);
		assert_eq!(b - a, 86400);
	}

	#[test]
	fn arithmetic() {
		let a = HttpDate::parse("Sun, 06 Nov 1994 08:49:37 GMT");
		let b = a + 3600;
		assert_eq!(b - a, 3600);
	}
}
