//! Owned socket descriptors
//!
//! Unique ownership of a file descriptor; the fd is closed exactly once
//! when the owner drops. Zero is the moved-from sentinel.

use opflow_core::error::{OpError, OpResult};
use std::os::unix::io::RawFd;

/// A connected socket; async reads and writes operate on it
#[derive(Debug)]
pub struct Connection {
    fd: RawFd,
}

impl Connection {
    /// Take ownership of an already-nonblocking descriptor
    pub fn from_fd(fd: RawFd) -> Connection {
        Connection { fd }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Release ownership without closing
    pub fn into_fd(mut self) -> RawFd {
        let fd = self.fd;
        self.fd = 0;
        fd
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.fd > 0 {
            unsafe { libc::close(self.fd) };
            self.fd = 0;
        }
    }
}

/// A bound, listening, nonblocking IPv4 socket
#[derive(Debug)]
pub struct ListeningSocket {
    fd: RawFd,
}

impl ListeningSocket {
    /// Create, configure and bind the listener
    ///
    /// `SO_REUSEADDR` is set and the socket is made nonblocking before
    /// binding; failures here are fatal to server startup and surface
    /// as `Syscall` errors.
    pub fn bind(port: u16) -> OpResult<ListeningSocket> {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
        if fd < 0 {
            return Err(OpError::last_os_error());
        }

        unsafe {
            let opt: libc::c_int = 1;
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &opt as *const libc::c_int as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
            libc::fcntl(fd, libc::F_SETFL, libc::O_NONBLOCK);
        }

        let mut addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        addr.sin_family = libc::AF_INET as libc::sa_family_t;
        addr.sin_addr.s_addr = libc::INADDR_ANY;
        addr.sin_port = port.to_be();

        let rc = unsafe {
            libc::bind(
                fd,
                &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            let err = OpError::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let rc = unsafe { libc::listen(fd, libc::SOMAXCONN) };
        if rc != 0 {
            let err = OpError::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        Ok(ListeningSocket { fd })
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// The actually bound port (useful after binding port 0)
    pub fn local_port(&self) -> OpResult<u16> {
        let mut addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockname(
                self.fd,
                &mut addr as *mut libc::sockaddr_in as *mut libc::sockaddr,
                &mut len,
            )
        };
        if rc != 0 {
            return Err(OpError::last_os_error());
        }
        Ok(u16::from_be(addr.sin_port))
    }
}

impl Drop for ListeningSocket {
    fn drop(&mut self) {
        if self.fd > 0 {
            unsafe { libc::close(self.fd) };
            self.fd = 0;
        }
    }
}
