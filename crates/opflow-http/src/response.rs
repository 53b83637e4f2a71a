//! HTTP response representation

use crate::request::Header;

/// The status codes supported for HTTP responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Created,
    Accepted,
    NoContent,
    MultipleChoices,
    MovedPermanently,
    MovedTemporarily,
    NotModified,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
}

impl Status {
    /// Numeric status code
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Created => 201,
            Status::Accepted => 202,
            Status::NoContent => 204,
            Status::MultipleChoices => 300,
            Status::MovedPermanently => 301,
            Status::MovedTemporarily => 302,
            Status::NotModified => 304,
            Status::BadRequest => 400,
            Status::Unauthorized => 401,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
            Status::NotImplemented => 501,
            Status::BadGateway => 502,
            Status::ServiceUnavailable => 503,
        }
    }

    /// The full status line, ready for the wire
    pub fn status_line(&self) -> &'static str {
        match self {
            Status::Ok => "HTTP/1.1 200 OK\r\n",
            Status::Created => "HTTP/1.1 201 Created\r\n",
            Status::Accepted => "HTTP/1.1 202 Accepted\r\n",
            Status::NoContent => "HTTP/1.1 204 No Content\r\n",
            Status::MultipleChoices => "HTTP/1.1 300 Multiple Choices\r\n",
            Status::MovedPermanently => "HTTP/1.1 301 Moved Permanently\r\n",
            Status::MovedTemporarily => "HTTP/1.1 302 Moved Temporarily\r\n",
            Status::NotModified => "HTTP/1.1 304 Not Modified\r\n",
            Status::BadRequest => "HTTP/1.1 400 Bad Request\r\n",
            Status::Unauthorized => "HTTP/1.1 401 Unauthorized\r\n",
            Status::Forbidden => "HTTP/1.1 403 Forbidden\r\n",
            Status::NotFound => "HTTP/1.1 404 Not Found\r\n",
            Status::InternalServerError => "HTTP/1.1 500 Internal Server Error\r\n",
            Status::NotImplemented => "HTTP/1.1 501 Not Implemented\r\n",
            Status::BadGateway => "HTTP/1.1 502 Bad Gateway\r\n",
            Status::ServiceUnavailable => "HTTP/1.1 503 Service Unavailable\r\n",
        }
    }
}

/// An HTTP response to be sent to a client
///
/// Headers go to the wire verbatim; Content-Length is never computed
/// implicitly during serialization. The body constructors add it
/// explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

impl Response {
    /// A response with no headers and no body
    pub fn empty(status: Status) -> Response {
        Response {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// A response carrying a typed body
    pub fn with_body(status: Status, content_type: &str, body: Vec<u8>) -> Response {
        Response {
            status,
            headers: vec![
                Header::new("Content-type", content_type),
                Header::new("Content-Length", body.len().to_string()),
            ],
            body,
        }
    }

    /// A response with custom headers and no body
    pub fn with_headers(status: Status, headers: Vec<Header>) -> Response {
        Response {
            status,
            headers,
            body: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        assert_eq!(Status::Ok.status_line(), "HTTP/1.1 200 OK\r\n");
        assert_eq!(
            Status::ServiceUnavailable.status_line(),
            "HTTP/1.1 503 Service Unavailable\r\n"
        );
        assert_eq!(Status::NotFound.code(), 404);
    }

    #[test]
    fn test_with_body_headers() {
        let resp = Response::with_body(Status::Ok, "text/plain", b"hello".to_vec());
        assert_eq!(resp.headers[0], Header::new("Content-type", "text/plain"));
        assert_eq!(resp.headers[1], Header::new("Content-Length", "5"));
    }
}
