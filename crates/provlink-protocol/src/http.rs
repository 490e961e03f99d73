//! Minimal HTTP/1.1 wire handling for the provisioning server.
//!
//! Only what a captive portal needs: request-line and header parsing,
//! URL-encoded form bodies, and raw response building. Connections are
//! never reused, so responses carry `Connection: close` and the transport
//! closes after writing.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Errors from request parsing. A parse error aborts the offending
/// connection silently; it is never surfaced to the client.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The request line was empty or did not contain a method and path.
    #[error("empty or malformed request line")]
    BadRequestLine,
}

/// HTTP request method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    /// Any other method; matched literally in the route table.
    Other(String),
}

impl Method {
    /// Parse a method token from the request line.
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Other(other) => write!(f, "{}", other),
        }
    }
}

/// A parsed request. Lifetime = one connection.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    /// Header mapping; keys are case-folded to lower case.
    pub headers: HashMap<String, String>,
    /// Raw body text (empty unless a POST carried content-length > 0).
    pub body: String,
    /// Flat parameter mapping decoded from a URL-encoded form body.
    pub params: HashMap<String, String>,
}

/// Parse the request line (`METHOD PATH VERSION`).
pub fn parse_request_line(line: &str) -> Result<(Method, String), ParseError> {
    let mut parts = line.trim().splitn(3, ' ');
    let method = parts.next().filter(|m| !m.is_empty());
    let path = parts.next();
    match (method, path) {
        (Some(method), Some(path)) => Ok((Method::parse(method), path.to_string())),
        _ => Err(ParseError::BadRequestLine),
    }
}

/// Parse one header line into a lower-cased key and trimmed value.
///
/// Lines without a colon are ignored (returns `None`).
pub fn parse_header_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.trim_end_matches(['\r', '\n']).split_once(':')?;
    Some((
        key.trim().to_ascii_lowercase(),
        value.trim().to_string(),
    ))
}

/// Parse a URL-encoded form body into a flat string→string mapping.
///
/// Pairs are split on `&`, then on the first `=`; pairs without `=` are
/// skipped. Values are URL-decoded; keys are taken literally.
pub fn parse_form(body: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in body.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            params.insert(key.to_string(), url_decode(value));
        }
    }
    params
}

/// Decode a URL-encoded form value.
///
/// Literal `+` decodes to a space; `%XX` escapes decode to the
/// corresponding byte. The plus rule applies before percent decoding, so
/// `%2B` yields a literal `+`. Malformed escapes pass through unchanged.
pub fn url_decode(value: &str) -> String {
    let value = value.replace('+', " ");
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Some(byte) = hex_pair(bytes[i + 1], bytes[i + 2]) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Build a full raw HTTP/1.1 HTML response.
pub fn html_response(status: u16, reason: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

/// Build a minimal raw HTTP/1.1 plain-text response (used for errors).
pub fn text_response(status: u16, reason: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_request_line() {
        let (method, path) = parse_request_line("GET /generate_204 HTTP/1.1\r\n").unwrap();
        assert_eq!(method, Method::Get);
        assert_eq!(path, "/generate_204");

        let (method, path) = parse_request_line("POST /configure HTTP/1.1").unwrap();
        assert_eq!(method, Method::Post);
        assert_eq!(path, "/configure");
    }

    #[test]
    fn test_malformed_request_line() {
        assert!(parse_request_line("").is_err());
        assert!(parse_request_line("\r\n").is_err());
        assert!(parse_request_line("GET").is_err());
    }

    #[test]
    fn test_unknown_method_matched_literally() {
        let (method, _) = parse_request_line("DELETE /x HTTP/1.1").unwrap();
        assert_eq!(method, Method::Other("DELETE".to_string()));
        assert_eq!(method.to_string(), "DELETE");
    }

    #[test]
    fn test_header_keys_are_case_folded() {
        let (key, value) = parse_header_line("Content-Length: 42\r\n").unwrap();
        assert_eq!(key, "content-length");
        assert_eq!(value, "42");

        // Values keep their case; only keys fold.
        let (key, value) = parse_header_line("Host: Portal.Local").unwrap();
        assert_eq!(key, "host");
        assert_eq!(value, "Portal.Local");

        assert_eq!(parse_header_line("no colon here"), None);
    }

    #[test]
    fn test_parse_form_basic() {
        let params = parse_form("ssid=MyNet&password=secret");
        assert_eq!(params["ssid"], "MyNet");
        assert_eq!(params["password"], "secret");
    }

    #[test]
    fn test_parse_form_skips_pairs_without_equals() {
        let params = parse_form("ssid=MyNet&junk&password=");
        assert_eq!(params.len(), 2);
        assert_eq!(params["ssid"], "MyNet");
        assert_eq!(params["password"], "");
    }

    #[test]
    fn test_url_decode_plus_and_percent() {
        // Space from %20, then a literal + from %2B: the plus-as-space
        // rule applies only to literal + characters.
        assert_eq!(url_decode("A%20B%2Bc"), "A B+c");
        assert_eq!(url_decode("a+b"), "a b");
        assert_eq!(url_decode("caf%C3%A9"), "café");
    }

    #[test]
    fn test_url_decode_malformed_escapes_pass_through() {
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("%2"), "%2");
    }

    #[test]
    fn test_html_response_is_raw_http() {
        let response = String::from_utf8(html_response(200, "OK", "<p>hi</p>")).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/html\r\n"));
        assert!(response.ends_with("\r\n\r\n<p>hi</p>"));
    }

    #[test]
    fn test_text_response_status_line() {
        let response = String::from_utf8(text_response(400, "Bad Request", "Missing SSID")).unwrap();
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.ends_with("Missing SSID"));
    }
}
