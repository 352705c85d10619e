use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use url::{ParseError, Url};

// nginx `ui_short` log format:
// $remote_addr  $remote_user $http_x_real_ip [$time_local] "$request"
// $status $body_bytes_sent "$http_referer" "$http_user_agent"
// "$http_x_forwarded_for" "$http_X_REQUEST_ID" "$http_X_RB_USER" $request_time
lazy_static! {
    static ref LOG_RECORD: Regex = Regex::new(concat!(
        r"^(?P<remote_addr>[\d.]{7,15}) (?P<remote_user>\S+)  (?P<http_x_real_ip>[\d.-]+) ",
        r#"\[(?P<time_local>[^\]]*)\] "(?P<request>.+)" (?P<status>\d{3}) (?P<body_bytes_sent>[-\d]+) "#,
        r#""(?P<http_referer>\S+)" "(?P<http_user_agent>.+)" "(?P<http_x_forwarded_for>\S+)" "#,
        r#""(?P<http_x_request_id>\S+)" "(?P<http_x_rb_user>\S+)" (?P<request_time>\d+(?:\.\d+)?)"#,
    ))
    .unwrap();
}

/// URL path and request time extracted from one log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Path component of the request URL, without query or fragment
    pub url: String,
    /// `$request_time` in seconds
    pub request_time: Decimal,
}

pub struct RecordParser;

impl RecordParser {
    /// Parse one raw log line.
    ///
    /// Returns `None` unless both the URL path and the request time can be
    /// extracted.
    pub fn parse(line: &str) -> Option<ParsedRecord> {
        let captures = LOG_RECORD.captures(line)?;

        let request = captures.name("request")?.as_str();
        let target = request.split_whitespace().nth(1)?;
        let url = Self::url_path(target)?;

        let request_time = Decimal::from_str(captures.name("request_time")?.as_str()).ok()?;

        Some(ParsedRecord { url, request_time })
    }

    /// Path of a request target, which is usually origin-form (`/path?query`).
    ///
    /// Only absolute-form targets go through URL parsing. Anything else is
    /// kept as logged, up to the query or fragment.
    fn url_path(target: &str) -> Option<String> {
        let path = match Url::parse(target) {
            Ok(url) => url.path().to_string(),
            Err(ParseError::RelativeUrlWithoutBase) => target
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
            Err(_) => return None,
        };

        (!path.is_empty()).then_some(path)
    }
}
