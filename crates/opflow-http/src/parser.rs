//! Streaming HTTP/1.1 request parser
//!
//! Push-driven state machine: request line, header lines, body, done.
//! `feed` accepts whatever bytes the transport produced; packet
//! boundaries may fall anywhere, including inside the CRLF line
//! terminator. The parser yields at most one request and then stays
//! terminal; pipelining is handled one connection level up by closing
//! after the response.

use crate::request::{Header, Method, Request};
use opflow_core::error::{OpError, OpResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    FirstLine,
    HeaderLines,
    Body,
    Done,
}

/// Incremental parser for one HTTP/1.1 request
pub struct RequestParser {
    state: ParseState,
    line: Vec<u8>,
    method: Method,
    uri: String,
    headers: Vec<Header>,
    body: Vec<u8>,
    body_remaining: usize,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> RequestParser {
        RequestParser {
            state: ParseState::FirstLine,
            line: Vec::new(),
            method: Method::Get,
            uri: String::new(),
            headers: Vec::new(),
            body: Vec::new(),
            body_remaining: 0,
        }
    }

    /// True once a request has been yielded
    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    /// Consume the next packet of input
    ///
    /// Returns `Ok(Some(request))` when the request completes with this
    /// packet, `Ok(None)` while more input is needed (and always after
    /// completion), `Err(BadRequest)` on malformed input.
    pub fn feed(&mut self, mut data: &[u8]) -> OpResult<Option<Request>> {
        if self.state == ParseState::Done {
            return Ok(None);
        }

        // Everything before the body is parsed line by line
        while matches!(self.state, ParseState::FirstLine | ParseState::HeaderLines) {
            match self.take_line(data) {
                Some(consumed) => {
                    self.interpret_line()?;
                    self.line.clear();
                    data = &data[consumed..];
                }
                // Partial line; everything was buffered
                None => return Ok(None),
            }
        }

        // Body bytes, up to Content-Length; surplus input is ignored
        let take = self.body_remaining.min(data.len());
        self.body.extend_from_slice(&data[..take]);
        self.body_remaining -= take;

        if self.body_remaining == 0 {
            self.state = ParseState::Done;
            return Ok(Some(Request {
                method: self.method,
                uri: std::mem::take(&mut self.uri),
                headers: std::mem::take(&mut self.headers),
                body: std::mem::take(&mut self.body),
            }));
        }
        Ok(None)
    }

    /// Accumulate bytes until a CRLF completes the current line
    ///
    /// Returns how many input bytes were consumed when a full line is
    /// now in `self.line` (CRLF stripped), or `None` if all of `data`
    /// was buffered without completing one.
    fn take_line(&mut self, data: &[u8]) -> Option<usize> {
        for (i, &byte) in data.iter().enumerate() {
            self.line.push(byte);
            if byte == b'\n' && self.line.ends_with(b"\r\n") {
                self.line.truncate(self.line.len() - 2);
                return Some(i + 1);
            }
        }
        None
    }

    fn interpret_line(&mut self) -> OpResult<()> {
        match self.state {
            ParseState::FirstLine => self.interpret_request_line(),
            ParseState::HeaderLines => self.interpret_header_line(),
            _ => Ok(()),
        }
    }

    fn interpret_request_line(&mut self) -> OpResult<()> {
        let line = &self.line;
        let sp = line
            .iter()
            .position(|&b| b == b' ')
            .unwrap_or(line.len());
        let method = Method::from_bytes(&line[..sp]).ok_or(OpError::BadRequest)?;

        let uri_start = (sp + 1).min(line.len());
        let uri_end = find_subslice(line, b" HTTP/", uri_start).unwrap_or(line.len());
        self.method = method;
        self.uri = String::from_utf8_lossy(&line[uri_start..uri_end]).into_owned();
        self.state = ParseState::HeaderLines;
        Ok(())
    }

    fn interpret_header_line(&mut self) -> OpResult<()> {
        if self.line.is_empty() {
            // Blank line: headers are over
            self.state = ParseState::Body;
            return Ok(());
        }

        let line = &self.line;
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(OpError::BadRequest)?;
        let name = &line[..colon];
        let mut value = &line[colon + 1..];
        while value.first() == Some(&b' ') {
            value = &value[1..];
        }
        if name.is_empty() || value.is_empty() {
            return Err(OpError::BadRequest);
        }

        let mut name = String::from_utf8_lossy(name).into_owned();
        name.make_ascii_lowercase();
        let value = String::from_utf8_lossy(value).into_owned();

        if name == "content-length" {
            if !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(OpError::BadRequest);
            }
            self.body_remaining = value.parse().map_err(|_| OpError::BadRequest)?;
            self.body.reserve(self.body_remaining);
        }

        self.headers.push(Header { name, value });
        Ok(())
    }
}

/// Find `needle` in `hay` starting at `from`
fn find_subslice(hay: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > hay.len() {
        return None;
    }
    hay[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_GET: &[u8] = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
    const POST_WITH_BODY: &[u8] =
        b"POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello";

    fn parse_whole(input: &[u8]) -> OpResult<Option<Request>> {
        RequestParser::new().feed(input)
    }

    #[test]
    fn test_simple_get() {
        let req = parse_whole(SIMPLE_GET).unwrap().unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.uri, "/index.html");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("host"), Some("example.com"));
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_post_with_body() {
        let req = parse_whole(POST_WITH_BODY).unwrap().unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.uri, "/echo");
        assert_eq!(req.body, b"hello");
    }

    #[test]
    fn test_body_split_mid_packet() {
        // Mid-body packet boundary
        let mut parser = RequestParser::new();
        let (head, tail) = POST_WITH_BODY.split_at(POST_WITH_BODY.len() - 2);
        assert!(parser.feed(head).unwrap().is_none());
        let req = parser.feed(tail).unwrap().unwrap();
        assert_eq!(req.body, b"hello");
    }

    #[test]
    fn test_any_chunk_split_yields_same_request() {
        // Every split point, including inside CRLF pairs
        let reference = parse_whole(POST_WITH_BODY).unwrap().unwrap();
        for split in 1..POST_WITH_BODY.len() {
            let mut parser = RequestParser::new();
            let first = parser.feed(&POST_WITH_BODY[..split]).unwrap();
            let req = match first {
                Some(req) => req,
                None => parser.feed(&POST_WITH_BODY[split..]).unwrap().expect("request completes"),
            };
            assert_eq!(req, reference, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut parser = RequestParser::new();
        let mut result = None;
        for &b in POST_WITH_BODY {
            if let Some(req) = parser.feed(&[b]).unwrap() {
                result = Some(req);
            }
        }
        let req = result.expect("request completes");
        assert_eq!(req.uri, "/echo");
        assert_eq!(req.body, b"hello");
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert_eq!(parse_whole(b"FOO / HTTP/1.1\r\n\r\n"), Err(OpError::BadRequest));
    }

    #[test]
    fn test_header_without_colon_rejected() {
        assert_eq!(
            parse_whole(b"GET / HTTP/1.1\r\nbogus-line\r\n\r\n"),
            Err(OpError::BadRequest)
        );
    }

    #[test]
    fn test_empty_header_value_rejected() {
        assert_eq!(
            parse_whole(b"GET / HTTP/1.1\r\nHost: \r\n\r\n"),
            Err(OpError::BadRequest)
        );
    }

    #[test]
    fn test_non_decimal_content_length_rejected() {
        assert_eq!(
            parse_whole(b"POST / HTTP/1.1\r\nContent-Length: 5x\r\n\r\n"),
            Err(OpError::BadRequest)
        );
        assert_eq!(
            parse_whole(b"POST / HTTP/1.1\r\nContent-Length: +5\r\n\r\n"),
            Err(OpError::BadRequest)
        );
    }

    #[test]
    fn test_header_names_lowercased_values_trimmed() {
        let req = parse_whole(b"GET / HTTP/1.1\r\nX-Thing:   spaced\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(req.headers[0].name, "x-thing");
        assert_eq!(req.headers[0].value, "spaced");
    }

    #[test]
    fn test_absent_content_length_means_empty_body() {
        let req = parse_whole(b"GET /p HTTP/1.1\r\n\r\n").unwrap().unwrap();
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_done_is_terminal() {
        let mut parser = RequestParser::new();
        assert!(parser.feed(SIMPLE_GET).unwrap().is_some());
        assert!(parser.is_done());
        assert!(parser.feed(SIMPLE_GET).unwrap().is_none());
    }

    #[test]
    fn test_surplus_bytes_after_body_ignored() {
        let mut parser = RequestParser::new();
        let mut input = POST_WITH_BODY.to_vec();
        input.extend_from_slice(b"TRAILING");
        let req = parser.feed(&input).unwrap().unwrap();
        assert_eq!(req.body, b"hello");
        assert!(parser.feed(b"more").unwrap().is_none());
    }
}
