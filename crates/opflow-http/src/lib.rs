//! # opflow-http — the HTTP/1.1 subset
//!
//! Pure data handling for the server: a streaming request parser that
//! tolerates arbitrary packet boundaries, response types with a closed
//! status-code set, a zero-copy wire serializer and a URI splitter.
//! No I/O happens in this crate.

pub mod parser;
pub mod request;
pub mod response;
pub mod uri;
pub mod wire;

pub use parser::RequestParser;
pub use request::{Header, Method, Request};
pub use response::{Response, Status};
pub use uri::{parse_uri, ParsedUri, UriParam};
