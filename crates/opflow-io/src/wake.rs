//! Reactor wake primitive
//!
//! Breaks a blocking `poll(2)` from another thread (or a signal
//! handler; `wake` only calls `write(2)`). Linux gets an `eventfd`,
//! other unixes a nonblocking self-pipe.

use opflow_core::error::{OpError, OpResult};
use std::os::unix::io::RawFd;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        /// eventfd-backed wakeup
        pub struct WakeFd {
            fd: RawFd,
        }

        impl WakeFd {
            pub fn new() -> OpResult<WakeFd> {
                let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
                if fd < 0 {
                    return Err(OpError::last_os_error());
                }
                Ok(WakeFd { fd })
            }

            /// The fd to poll for readability
            pub fn fd(&self) -> RawFd {
                self.fd
            }

            pub fn wake(&self) {
                let one: u64 = 1;
                let _ = unsafe {
                    libc::write(self.fd, &one as *const u64 as *const libc::c_void, 8)
                };
            }

            pub fn drain(&self) {
                let mut counter: u64 = 0;
                while unsafe {
                    libc::read(self.fd, &mut counter as *mut u64 as *mut libc::c_void, 8)
                } > 0
                {}
            }
        }

        impl Drop for WakeFd {
            fn drop(&mut self) {
                unsafe { libc::close(self.fd) };
            }
        }
    } else {
        /// self-pipe-backed wakeup
        pub struct WakeFd {
            read_fd: RawFd,
            write_fd: RawFd,
        }

        impl WakeFd {
            pub fn new() -> OpResult<WakeFd> {
                let mut fds = [0 as RawFd; 2];
                if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
                    return Err(OpError::last_os_error());
                }
                for fd in fds {
                    unsafe { libc::fcntl(fd, libc::F_SETFL, libc::O_NONBLOCK) };
                }
                Ok(WakeFd { read_fd: fds[0], write_fd: fds[1] })
            }

            /// The fd to poll for readability
            pub fn fd(&self) -> RawFd {
                self.read_fd
            }

            pub fn wake(&self) {
                let byte: u8 = 1;
                let _ = unsafe {
                    libc::write(self.write_fd, &byte as *const u8 as *const libc::c_void, 1)
                };
            }

            pub fn drain(&self) {
                let mut buf = [0u8; 64];
                while unsafe {
                    libc::read(self.read_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
                } > 0
                {}
            }
        }

        impl Drop for WakeFd {
            fn drop(&mut self) {
                unsafe {
                    libc::close(self.read_fd);
                    libc::close(self.write_fd);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wake_then_drain() {
        let wake = WakeFd::new().unwrap();
        wake.wake();
        wake.wake();

        let mut pfd = libc::pollfd {
            fd: wake.fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
        assert_eq!(rc, 1);

        wake.drain();
        pfd.revents = 0;
        let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
        assert_eq!(rc, 0);
    }
}
