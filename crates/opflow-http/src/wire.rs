//! Response wire encoding
//!
//! `to_buffers` emits a gather list of slices borrowing the response;
//! nothing is copied and nothing is allocated past the one reserve on
//! the caller's vector. `serialize` flattens the gather list for
//! transports that want a single contiguous write.

use crate::response::Response;

const CRLF: &[u8] = b"\r\n";
const HEADER_SEPARATOR: &[u8] = b": ";

/// Append the wire form of `resp` to `out` as borrowed slices
///
/// Order: status line, headers (`name ": " value CRLF` each), blank
/// line, then the body if nonempty.
pub fn to_buffers<'a>(resp: &'a Response, out: &mut Vec<&'a [u8]>) {
    out.reserve(2 + resp.headers.len() * 4 + 1);

    out.push(resp.status.status_line().as_bytes());
    for h in &resp.headers {
        out.push(h.name.as_bytes());
        out.push(HEADER_SEPARATOR);
        out.push(h.value.as_bytes());
        out.push(CRLF);
    }
    out.push(CRLF);
    if !resp.body.is_empty() {
        out.push(&resp.body);
    }
}

/// Materialize the full wire form as one owned buffer
pub fn serialize(resp: &Response) -> Vec<u8> {
    let mut buffers = Vec::new();
    to_buffers(resp, &mut buffers);
    let total: usize = buffers.iter().map(|b| b.len()).sum();
    let mut out = Vec::with_capacity(total);
    for buf in buffers {
        out.extend_from_slice(buf);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Header;
    use crate::response::Status;

    #[test]
    fn test_canonical_byte_sequence() {
        let resp = Response {
            status: Status::Ok,
            headers: vec![
                Header::new("Content-type", "text/plain"),
                Header::new("Content-Length", "2"),
            ],
            body: b"hi".to_vec(),
        };
        let mut buffers = Vec::new();
        to_buffers(&resp, &mut buffers);

        let flat: Vec<u8> = buffers.concat();
        assert_eq!(
            flat,
            b"HTTP/1.1 200 OK\r\nContent-type: text/plain\r\nContent-Length: 2\r\n\r\nhi"
        );
        assert_eq!(serialize(&resp), flat);
    }

    #[test]
    fn test_empty_response_has_no_body_slice() {
        let resp = Response::empty(Status::NotFound);
        let mut buffers = Vec::new();
        to_buffers(&resp, &mut buffers);
        assert_eq!(buffers.concat(), b"HTTP/1.1 404 Not Found\r\n\r\n");
        // status line + blank line only
        assert_eq!(buffers.len(), 2);
    }

    #[test]
    fn test_no_allocation_after_reserve() {
        let resp = Response::with_body(Status::Ok, "text/plain", b"abc".to_vec());
        let mut buffers: Vec<&[u8]> = Vec::new();
        to_buffers(&resp, &mut buffers);
        // The single reserve covers the worst case for this shape
        assert!(buffers.capacity() >= buffers.len());
        assert_eq!(buffers.len(), 2 + resp.headers.len() * 4 + 1);
    }

    /// Minimal response-side parse, mirroring the request parser's rules
    fn parse_response(bytes: &[u8]) -> (String, Vec<(String, String)>, Vec<u8>) {
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap().to_string();
        let headers = lines
            .map(|l| {
                let (name, value) = l.split_once(':').unwrap();
                (name.to_lowercase(), value.trim_start_matches(' ').to_string())
            })
            .collect();
        (status_line, headers, body.as_bytes().to_vec())
    }

    #[test]
    fn test_round_trip_fields() {
        let resp = Response::with_body(Status::Accepted, "text/plain", b"payload".to_vec());
        let (status_line, headers, body) = parse_response(&serialize(&resp));

        assert_eq!(format!("{}\r\n", status_line), Status::Accepted.status_line());
        assert_eq!(headers.len(), resp.headers.len());
        for (parsed, original) in headers.iter().zip(&resp.headers) {
            assert_eq!(parsed.0, original.name.to_lowercase());
            assert_eq!(parsed.1, original.value);
        }
        assert_eq!(body, resp.body);
    }

    #[test]
    fn test_headers_serialized_verbatim() {
        // No auto-computed Content-Length: what the caller set is what goes out
        let resp = Response::with_headers(
            Status::MovedPermanently,
            vec![Header::new("Location", "/elsewhere")],
        );
        assert_eq!(
            serialize(&resp),
            b"HTTP/1.1 301 Moved Permanently\r\nLocation: /elsewhere\r\n\r\n"
        );
    }
}
