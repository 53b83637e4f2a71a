//! Error types for asynchronous operations

use core::fmt;

/// Result type for operation-producing functions
pub type OpResult<T> = Result<T, OpError>;

/// Errors that can travel through an operation's error channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpError {
    /// A syscall failed with the given errno
    Syscall(i32),

    /// The peer sent a malformed HTTP request
    BadRequest,

    /// Parsing failed outside the HTTP request path
    Parse,

    /// Serialization or encoding failed
    Encode,

    /// Operation was cancelled via a stop token
    Cancelled,

    /// A continuation panicked; the payload is the panic message
    Panic(String),
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpError::Syscall(errno) => write!(f, "syscall failed: errno {}", errno),
            OpError::BadRequest => write!(f, "bad HTTP request"),
            OpError::Parse => write!(f, "parse failure"),
            OpError::Encode => write!(f, "encode failure"),
            OpError::Cancelled => write!(f, "operation cancelled"),
            OpError::Panic(msg) => write!(f, "continuation panicked: {}", msg),
        }
    }
}

impl std::error::Error for OpError {}

impl OpError {
    /// Capture the calling thread's current errno
    pub fn last_os_error() -> Self {
        OpError::Syscall(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", OpError::Cancelled), "operation cancelled");
        assert_eq!(format!("{}", OpError::Syscall(11)), "syscall failed: errno 11");
        assert_eq!(format!("{}", OpError::BadRequest), "bad HTTP request");
    }
}
