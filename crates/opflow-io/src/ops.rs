//! Asynchronous socket operations
//!
//! Each primitive is a lazy sender. `start` checks the receiver's stop
//! token (a suspension point), then registers an operation body with
//! the reactor for the matching interest. The body retries its syscall
//! on every readiness notification: EAGAIN/EWOULDBLOCK/EINTR (plus
//! EALREADY for sends) keep it registered, success completes the value
//! channel, anything else completes the error channel with the errno.
//!
//! Buffers move through the value channel by ownership: a read returns
//! `(buffer, bytes_read)`, a write returns `(buffer, bytes_written)`.
//! Short writes are not retried here; the caller loops on the rest.

use crate::reactor::{Interest, ReactorShared};
use crate::socket::{Connection, ListeningSocket};
use opflow_core::error::OpError;
use opflow_core::op::{OpState, Receiver, Sender};
use opflow_http::{wire, Request, RequestParser, Response};

use std::os::unix::io::RawFd;
use std::sync::Arc;

/// Scratch size for request reads
const READ_CHUNK: usize = 4096;

fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

fn recv_retryable(errno: i32) -> bool {
    errno == libc::EAGAIN || errno == libc::EWOULDBLOCK || errno == libc::EINTR
}

fn send_retryable(errno: i32) -> bool {
    recv_retryable(errno) || errno == libc::EALREADY
}

// ── async_accept ──

/// Accept one connection from `listener`
///
/// The accepted descriptor is made nonblocking before it is emitted.
pub fn async_accept(reactor: &Arc<ReactorShared>, listener: &Arc<ListeningSocket>) -> AcceptSender {
    AcceptSender {
        reactor: reactor.clone(),
        listener: listener.clone(),
    }
}

pub struct AcceptSender {
    reactor: Arc<ReactorShared>,
    listener: Arc<ListeningSocket>,
}

impl Sender for AcceptSender {
    type Value = Connection;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = Connection>,
    {
        if recv.stop_token().stop_requested() {
            recv.set_stopped();
            return;
        }
        let fd = self.listener.fd();
        self.reactor.submit_io(
            fd,
            Interest::Read,
            Box::new(AcceptOp {
                fd,
                _listener: self.listener,
                recv: Some(recv),
            }),
        );
    }
}

struct AcceptOp<R> {
    fd: RawFd,
    _listener: Arc<ListeningSocket>,
    recv: Option<R>,
}

impl<R> OpState for AcceptOp<R>
where
    R: Receiver<Value = Connection>,
{
    fn try_run(&mut self) -> bool {
        let rc = unsafe { libc::accept(self.fd, std::ptr::null_mut(), std::ptr::null_mut()) };
        if rc >= 0 {
            unsafe { libc::fcntl(rc, libc::F_SETFL, libc::O_NONBLOCK) };
            if let Some(recv) = self.recv.take() {
                recv.set_value(Connection::from_fd(rc));
            }
            return true;
        }
        let errno = last_errno();
        if recv_retryable(errno) {
            return false;
        }
        if let Some(recv) = self.recv.take() {
            recv.set_error(OpError::Syscall(errno));
        }
        true
    }

    fn set_stopped(mut self: Box<Self>) {
        if let Some(recv) = self.recv.take() {
            recv.set_stopped();
        }
    }
}

// ── async_read ──

/// Read once from `conn` into `buf`
///
/// Zero bytes read is a legitimate value: the peer half-closed.
pub fn async_read(
    reactor: &Arc<ReactorShared>,
    conn: &Arc<Connection>,
    buf: Box<[u8]>,
) -> ReadSender {
    ReadSender {
        reactor: reactor.clone(),
        conn: conn.clone(),
        buf,
    }
}

pub struct ReadSender {
    reactor: Arc<ReactorShared>,
    conn: Arc<Connection>,
    buf: Box<[u8]>,
}

impl Sender for ReadSender {
    type Value = (Box<[u8]>, usize);

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = (Box<[u8]>, usize)>,
    {
        if recv.stop_token().stop_requested() {
            recv.set_stopped();
            return;
        }
        let fd = self.conn.fd();
        self.reactor.submit_io(
            fd,
            Interest::Read,
            Box::new(ReadOp {
                fd,
                _conn: self.conn,
                buf: Some(self.buf),
                recv: Some(recv),
            }),
        );
    }
}

struct ReadOp<R> {
    fd: RawFd,
    _conn: Arc<Connection>,
    buf: Option<Box<[u8]>>,
    recv: Option<R>,
}

impl<R> OpState for ReadOp<R>
where
    R: Receiver<Value = (Box<[u8]>, usize)>,
{
    fn try_run(&mut self) -> bool {
        let Some(buf) = self.buf.as_mut() else {
            return true;
        };
        let rc = unsafe {
            libc::recv(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                libc::MSG_DONTWAIT,
            )
        };
        if rc >= 0 {
            let n = rc as usize;
            if let (Some(buf), Some(recv)) = (self.buf.take(), self.recv.take()) {
                recv.set_value((buf, n));
            }
            return true;
        }
        let errno = last_errno();
        if recv_retryable(errno) {
            return false;
        }
        if let Some(recv) = self.recv.take() {
            recv.set_error(OpError::Syscall(errno));
        }
        true
    }

    fn set_stopped(mut self: Box<Self>) {
        if let Some(recv) = self.recv.take() {
            recv.set_stopped();
        }
    }
}

// ── async_write ──

/// Write `data` to `conn` once
///
/// Completes with `(data, bytes_written)`; a short write is not
/// retried here.
pub fn async_write(
    reactor: &Arc<ReactorShared>,
    conn: &Arc<Connection>,
    data: Vec<u8>,
) -> WriteSender {
    WriteSender {
        reactor: reactor.clone(),
        conn: conn.clone(),
        data,
    }
}

pub struct WriteSender {
    reactor: Arc<ReactorShared>,
    conn: Arc<Connection>,
    data: Vec<u8>,
}

impl Sender for WriteSender {
    type Value = (Vec<u8>, usize);

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = (Vec<u8>, usize)>,
    {
        if recv.stop_token().stop_requested() {
            recv.set_stopped();
            return;
        }
        let fd = self.conn.fd();
        self.reactor.submit_io(
            fd,
            Interest::Write,
            Box::new(WriteOp {
                fd,
                _conn: self.conn,
                data: Some(self.data),
                recv: Some(recv),
            }),
        );
    }
}

struct WriteOp<R> {
    fd: RawFd,
    _conn: Arc<Connection>,
    data: Option<Vec<u8>>,
    recv: Option<R>,
}

impl<R> OpState for WriteOp<R>
where
    R: Receiver<Value = (Vec<u8>, usize)>,
{
    fn try_run(&mut self) -> bool {
        let Some(data) = self.data.as_ref() else {
            return true;
        };
        let rc = unsafe {
            libc::send(
                self.fd,
                data.as_ptr() as *const libc::c_void,
                data.len(),
                libc::MSG_DONTWAIT | libc::MSG_NOSIGNAL,
            )
        };
        if rc >= 0 {
            let n = rc as usize;
            if let (Some(data), Some(recv)) = (self.data.take(), self.recv.take()) {
                recv.set_value((data, n));
            }
            return true;
        }
        let errno = last_errno();
        if send_retryable(errno) {
            return false;
        }
        if let Some(recv) = self.recv.take() {
            recv.set_error(OpError::Syscall(errno));
        }
        true
    }

    fn set_stopped(mut self: Box<Self>) {
        if let Some(recv) = self.recv.take() {
            recv.set_stopped();
        }
    }
}

// ── read_request / write_response ──

/// Read a full HTTP request from `conn`
///
/// Reads packets as they arrive and feeds the streaming parser until a
/// request completes. A peer close before completion is a bad request;
/// a malformed request surfaces the parser's error.
pub fn read_request(reactor: &Arc<ReactorShared>, conn: &Arc<Connection>) -> ReadRequestSender {
    ReadRequestSender {
        reactor: reactor.clone(),
        conn: conn.clone(),
    }
}

pub struct ReadRequestSender {
    reactor: Arc<ReactorShared>,
    conn: Arc<Connection>,
}

impl Sender for ReadRequestSender {
    type Value = Request;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = Request>,
    {
        if recv.stop_token().stop_requested() {
            recv.set_stopped();
            return;
        }
        let fd = self.conn.fd();
        self.reactor.submit_io(
            fd,
            Interest::Read,
            Box::new(ReadRequestOp {
                fd,
                _conn: self.conn,
                parser: RequestParser::new(),
                buf: vec![0u8; READ_CHUNK].into_boxed_slice(),
                recv: Some(recv),
            }),
        );
    }
}

struct ReadRequestOp<R> {
    fd: RawFd,
    _conn: Arc<Connection>,
    parser: RequestParser,
    buf: Box<[u8]>,
    recv: Option<R>,
}

impl<R> OpState for ReadRequestOp<R>
where
    R: Receiver<Value = Request>,
{
    fn try_run(&mut self) -> bool {
        loop {
            let rc = unsafe {
                libc::recv(
                    self.fd,
                    self.buf.as_mut_ptr() as *mut libc::c_void,
                    self.buf.len(),
                    libc::MSG_DONTWAIT,
                )
            };
            if rc < 0 {
                let errno = last_errno();
                if recv_retryable(errno) {
                    return false;
                }
                if let Some(recv) = self.recv.take() {
                    recv.set_error(OpError::Syscall(errno));
                }
                return true;
            }
            if rc == 0 {
                // Peer closed before the request completed
                if let Some(recv) = self.recv.take() {
                    recv.set_error(OpError::BadRequest);
                }
                return true;
            }
            match self.parser.feed(&self.buf[..rc as usize]) {
                Ok(Some(request)) => {
                    if let Some(recv) = self.recv.take() {
                        recv.set_value(request);
                    }
                    return true;
                }
                Ok(None) => continue,
                Err(err) => {
                    if let Some(recv) = self.recv.take() {
                        recv.set_error(err);
                    }
                    return true;
                }
            }
        }
    }

    fn set_stopped(mut self: Box<Self>) {
        if let Some(recv) = self.recv.take() {
            recv.set_stopped();
        }
    }
}

/// Serialize `resp` and write all of it to `conn`
///
/// Completes with the number of bytes written once the whole response
/// is on the wire.
pub fn write_response(
    reactor: &Arc<ReactorShared>,
    conn: &Arc<Connection>,
    resp: Response,
) -> WriteResponseSender {
    WriteResponseSender {
        reactor: reactor.clone(),
        conn: conn.clone(),
        resp,
    }
}

pub struct WriteResponseSender {
    reactor: Arc<ReactorShared>,
    conn: Arc<Connection>,
    resp: Response,
}

impl Sender for WriteResponseSender {
    type Value = usize;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = usize>,
    {
        if recv.stop_token().stop_requested() {
            recv.set_stopped();
            return;
        }
        let fd = self.conn.fd();
        let data = wire::serialize(&self.resp);
        self.reactor.submit_io(
            fd,
            Interest::Write,
            Box::new(WriteResponseOp {
                fd,
                _conn: self.conn,
                data,
                written: 0,
                recv: Some(recv),
            }),
        );
    }
}

struct WriteResponseOp<R> {
    fd: RawFd,
    _conn: Arc<Connection>,
    data: Vec<u8>,
    written: usize,
    recv: Option<R>,
}

impl<R> OpState for WriteResponseOp<R>
where
    R: Receiver<Value = usize>,
{
    fn try_run(&mut self) -> bool {
        while self.written < self.data.len() {
            let rest = &self.data[self.written..];
            let rc = unsafe {
                libc::send(
                    self.fd,
                    rest.as_ptr() as *const libc::c_void,
                    rest.len(),
                    libc::MSG_DONTWAIT | libc::MSG_NOSIGNAL,
                )
            };
            if rc < 0 {
                let errno = last_errno();
                if send_retryable(errno) {
                    return false;
                }
                if let Some(recv) = self.recv.take() {
                    recv.set_error(OpError::Syscall(errno));
                }
                return true;
            }
            self.written += rc as usize;
        }
        if let Some(recv) = self.recv.take() {
            recv.set_value(self.written);
        }
        true
    }

    fn set_stopped(mut self: Box<Self>) {
        if let Some(recv) = self.recv.take() {
            recv.set_stopped();
        }
    }
}
