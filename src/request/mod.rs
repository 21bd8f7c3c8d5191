//! Inbound request parsing
//!
//! Reads one HTTP/1.x request from a blocking reader: request line,
//! headers, then exactly `Content-Length` body bytes. The path is split
//! into kind, version, device type, device number and command.

pub mod params;

use std::io::{BufRead, Read};
use std::net::SocketAddr;

pub use params::Params;

use crate::protocol::Verb;
use crate::{Error, Result};

/// Longest accepted request line or header line
const MAX_LINE: usize = 4096;

/// Most header lines accepted before giving up
const MAX_HEADERS: usize = 64;

/// Largest accepted request body
pub const MAX_BODY: usize = 64 * 1024;

/// First path segment of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Api,
    Management,
    Setup,
    Other,
}

impl RequestKind {
    fn from_segment(segment: &str) -> Self {
        match segment.to_ascii_lowercase().as_str() {
            "api" => Self::Api,
            "management" => Self::Management,
            "setup" => Self::Setup,
            _ => Self::Other,
        }
    }
}

/// A parsed Alpaca request
#[derive(Debug, Clone)]
pub struct Request {
    pub peer: SocketAddr,
    pub kind: RequestKind,
    pub version: String,
    pub device_type: String,
    /// Raw device number segment, kept for error messages
    pub device_number: String,
    pub verb: Verb,
    pub command: String,
    pub params: Params,
    pub client_id: u32,
    pub client_transaction_id: u32,
    pub user_agent: Option<String>,
    pub content_length: usize,
}

impl Request {
    /// Read and parse one request
    ///
    /// # Errors
    ///
    /// Returns `Error::BadRequest` for malformed or oversized requests and
    /// `Error::Io` when the socket fails
    pub fn read_from<R: BufRead>(reader: &mut R, peer: SocketAddr) -> Result<Self> {
        let line = read_line(reader)?;
        let mut parts = line.split_whitespace();
        let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
            return Err(Error::BadRequest("malformed request line".to_string()));
        };
        let verb = match method {
            "GET" => Verb::Get,
            "PUT" => Verb::Put,
            other => return Err(Error::BadRequest(format!("unsupported method {other}"))),
        };

        let mut content_length = 0;
        let mut user_agent = None;
        let mut headers = 0;
        loop {
            let header = read_line(reader)?;
            if header.is_empty() {
                break;
            }
            headers += 1;
            if headers > MAX_HEADERS {
                return Err(Error::BadRequest("too many headers".to_string()));
            }
            let Some((name, value)) = header.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value
                    .parse()
                    .map_err(|_| Error::BadRequest(format!("bad Content-Length {value}")))?;
            } else if name.eq_ignore_ascii_case("user-agent") {
                user_agent = Some(value.to_string());
            }
        }

        if content_length > MAX_BODY {
            return Err(Error::BadRequest(format!(
                "body of {content_length} bytes exceeds {MAX_BODY}"
            )));
        }
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body)?;
        let body = String::from_utf8_lossy(&body);

        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let params = match verb {
            Verb::Get => Params::parse(query),
            Verb::Put => Params::parse(&body),
        };

        let mut request = Self::from_path(peer, verb, path, params);
        request.user_agent = user_agent;
        request.content_length = content_length;
        Ok(request)
    }

    /// Build a request from an already split path and parameters
    #[must_use]
    pub fn from_path(peer: SocketAddr, verb: Verb, path: &str, params: Params) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let segment = |i: usize| segments.get(i).copied().unwrap_or_default();

        let kind = RequestKind::from_segment(segment(0));
        let (version, device_type, device_number, command) = match kind {
            RequestKind::Management if !is_version(segment(1)) => {
                (String::new(), String::new(), String::new(), segment(1))
            }
            RequestKind::Management => (
                segment(1).to_string(),
                String::new(),
                String::new(),
                segment(2),
            ),
            _ => (
                segment(1).to_string(),
                segment(2).to_string(),
                segment(3).to_string(),
                segment(4),
            ),
        };
        let command = command
            .split(['?', '&'])
            .next()
            .unwrap_or_default()
            .to_string();

        let client_id = params.u32_or_zero("ClientID");
        let client_transaction_id = params.u32_or_zero("ClientTransactionID");

        Self {
            peer,
            kind,
            version,
            device_type,
            device_number,
            verb,
            command,
            params,
            client_id,
            client_transaction_id,
            user_agent: None,
            content_length: 0,
        }
    }

    /// Parsed device number, if the segment is numeric
    #[must_use]
    pub fn number(&self) -> Option<u32> {
        self.device_number.parse().ok()
    }
}

fn is_version(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with(['v', 'V'])
        && segment[1..].bytes().all(|b| b.is_ascii_digit())
}

/// Read one CRLF or LF terminated line, bounded by `MAX_LINE`
fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut raw = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE as u64 + 1)
        .read_until(b'\n', &mut raw)?;
    if read == 0 {
        return Err(Error::BadRequest("connection closed before request".to_string()));
    }
    if !raw.ends_with(b"\n") {
        return Err(Error::BadRequest("request line too long".to_string()));
    }
    let line = String::from_utf8(raw)
        .map_err(|_| Error::BadRequest("request is not valid UTF-8".to_string()))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn parse(raw: &str) -> Result<Request> {
        Request::read_from(&mut raw.as_bytes(), peer())
    }

    #[test]
    fn parses_get_with_query() {
        let req = parse(
            "GET /api/v1/dome/0/canfindhome?ClientID=2&ClientTransactionID=5 HTTP/1.1\r\n\
             Host: localhost\r\nUser-Agent: ConformU/3.0\r\n\r\n",
        )
        .unwrap();
        assert_eq!(req.kind, RequestKind::Api);
        assert_eq!(req.version, "v1");
        assert_eq!(req.device_type, "dome");
        assert_eq!(req.number(), Some(0));
        assert_eq!(req.command, "canfindhome");
        assert_eq!(req.verb, Verb::Get);
        assert_eq!(req.client_id, 2);
        assert_eq!(req.client_transaction_id, 5);
        assert_eq!(req.user_agent.as_deref(), Some("ConformU/3.0"));
    }

    #[test]
    fn put_parameters_come_from_body() {
        let body = "Azimuth=90&ClientTransactionID=11";
        let raw = format!(
            "PUT /api/v1/dome/0/slewtoazimuth?Azimuth=1 HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let req = parse(&raw).unwrap();
        assert_eq!(req.verb, Verb::Put);
        assert_eq!(req.params.get("azimuth"), Some("90"));
        assert_eq!(req.client_transaction_id, 11);
        assert_eq!(req.content_length, body.len());
    }

    #[test]
    fn management_command_follows_version() {
        let req = parse("GET /management/v1/configureddevices HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.kind, RequestKind::Management);
        assert_eq!(req.command, "configureddevices");

        let req = parse("GET /management/apiversions HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.command, "apiversions");
    }

    #[test]
    fn command_is_cut_at_ampersand() {
        let req = Request::from_path(
            peer(),
            Verb::Get,
            "/api/v1/camera/0/imageready&junk",
            Params::default(),
        );
        assert_eq!(req.command, "imageready");
    }

    #[test]
    fn malformed_requests_are_rejected() {
        assert!(matches!(parse("garbage\r\n\r\n"), Err(Error::BadRequest(_))));
        assert!(matches!(
            parse("DELETE /api/v1/dome/0/park HTTP/1.1\r\n\r\n"),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(parse(""), Err(Error::BadRequest(_))));
        let long = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(MAX_LINE + 10));
        assert!(matches!(parse(&long), Err(Error::BadRequest(_))));
    }

    #[test]
    fn oversized_body_is_rejected() {
        let raw = format!(
            "PUT /api/v1/dome/0/park HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_BODY + 1
        );
        assert!(matches!(parse(&raw), Err(Error::BadRequest(_))));
    }

    #[test]
    fn non_numeric_device_number() {
        let req = parse("GET /api/v1/dome/x/azimuth HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.number(), None);
        assert_eq!(req.device_number, "x");
    }
}
