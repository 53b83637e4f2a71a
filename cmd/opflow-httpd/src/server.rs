//! Server assembly: listener, accept loop and per-connection pipelines
//!
//! The reactor runs on the calling thread; every accepted connection
//! gets a detached pipeline that reads the request, hops to the worker
//! pool to handle it, converts failures and cancellation into a 500,
//! and writes the response back. The connection closes when its last
//! owner drops, at the end of the pipeline.

use crate::routes;
use opflow_core::adapt::{let_error, let_stopped, let_value, start_detached, then, transfer};
use opflow_core::env::env_get;
use opflow_core::error::OpResult;
use opflow_core::{just, owarn};
use opflow_http::{Response, Status};
use opflow_io::{async_accept, read_request, write_response};
use opflow_io::{Connection, IoContext, ListeningSocket, ReactorShared};
use opflow_pool::{PoolScheduler, WorkerPool, DEFAULT_POOL_THREADS};

use std::sync::Arc;

/// Compile-time default port, overridable with `OPFLOW_PORT`
pub const DEFAULT_PORT: u16 = 8080;

/// Startup configuration, read once from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub pool_threads: usize,
}

impl ServerConfig {
    /// Environment variables (all optional):
    /// - `OPFLOW_PORT` - listening port
    /// - `OPFLOW_POOL_THREADS` - worker pool size
    pub fn from_env() -> ServerConfig {
        ServerConfig {
            port: env_get("OPFLOW_PORT", DEFAULT_PORT),
            pool_threads: env_get("OPFLOW_POOL_THREADS", DEFAULT_POOL_THREADS),
        }
    }
}

/// Shared handles every pipeline needs
pub struct ServerEnv {
    pub reactor: Arc<ReactorShared>,
    pub pool: PoolScheduler,
    pub listener: Arc<ListeningSocket>,
}

/// A bound server, ready to run
pub struct Server {
    ctx: IoContext,
    pool: WorkerPool,
    env: Arc<ServerEnv>,
}

impl Server {
    /// Bind the listener and spawn the pool; fatal errors surface here
    pub fn bind(cfg: &ServerConfig) -> OpResult<Server> {
        let ctx = IoContext::new()?;
        let pool = WorkerPool::new(cfg.pool_threads.max(1));
        let listener = Arc::new(ListeningSocket::bind(cfg.port)?);
        let env = Arc::new(ServerEnv {
            reactor: ctx.shared(),
            pool: pool.scheduler(),
            listener,
        });
        Ok(Server { ctx, pool, env })
    }

    /// Submission handle of the reactor (stop target)
    pub fn shared(&self) -> Arc<ReactorShared> {
        self.ctx.shared()
    }

    pub fn local_port(&self) -> OpResult<u16> {
        self.env.listener.local_port()
    }

    /// Run until the reactor is stopped; returns completed operations
    pub fn run(mut self) -> usize {
        spawn_accept(self.env.clone());
        let completed = self.ctx.run();
        self.pool.shutdown();
        completed
    }
}

/// Arm one accept; on completion spawn the pipeline and re-arm
fn spawn_accept(env: Arc<ServerEnv>) {
    let accept = async_accept(&env.reactor, &env.listener);

    let on_conn = {
        let env = env.clone();
        then(accept, move |conn| {
            spawn_pipeline(&env, conn);
            spawn_accept(env.clone());
        })
    };
    // Accept errors do not kill the loop; log and re-arm.
    let recover = {
        let env = env.clone();
        let_error(on_conn, move |err| {
            owarn!("opflow-httpd: accept failed: {}", err);
            spawn_accept(env.clone());
            just(())
        })
    };
    // A stopped accept (reactor drain) ends the loop silently.
    start_detached(recover);
}

/// The per-connection pipeline:
/// read, hop to the pool, handle, recover, write, close
fn spawn_pipeline(env: &Arc<ServerEnv>, conn: Connection) {
    let conn = Arc::new(conn);

    let routed = {
        let env = env.clone();
        let_value(
            transfer(read_request(&env.reactor, &conn), env.pool.clone()),
            move |req| routes::route_request(&env, req),
        )
    };
    let recovered = let_stopped(
        let_error(routed, |err| {
            owarn!("opflow-httpd: request failed: {}", err);
            just(Response::empty(Status::InternalServerError))
        }),
        || just(Response::empty(Status::InternalServerError)),
    );
    let written = {
        let reactor = env.reactor.clone();
        let conn = conn.clone();
        let_value(recovered, move |resp| write_response(&reactor, &conn, resp))
    };
    start_detached(written);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::thread;
    use std::time::Duration;

    fn start_server() -> (u16, Arc<ReactorShared>, thread::JoinHandle<usize>) {
        let cfg = ServerConfig {
            port: 0,
            pool_threads: 2,
        };
        let server = Server::bind(&cfg).unwrap();
        let port = server.local_port().unwrap();
        let shared = server.shared();
        let handle = thread::spawn(move || server.run());
        (port, shared, handle)
    }

    fn connect(port: u16) -> TcpStream {
        let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
    }

    fn roundtrip(port: u16, request: &[u8]) -> Vec<u8> {
        let mut stream = connect(port);
        stream.write_all(request).unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).unwrap();
        response
    }

    #[test]
    fn test_unknown_path_is_404_and_closes() {
        let (port, shared, handle) = start_server();

        let response = roundtrip(port, b"GET /unknown HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(response, b"HTTP/1.1 404 Not Found\r\n\r\n");

        shared.stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_malformed_method_is_500() {
        let (port, shared, handle) = start_server();

        let response = roundtrip(port, b"FOO / HTTP/1.1\r\n\r\n");
        assert_eq!(response, b"HTTP/1.1 500 Internal Server Error\r\n\r\n");

        shared.stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_echo_split_mid_body() {
        let (port, shared, handle) = start_server();

        let mut stream = connect(port);
        stream
            .write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel")
            .unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(50));
        stream.write_all(b"lo").unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).unwrap();
        assert_eq!(
            response,
            b"HTTP/1.1 200 OK\r\nContent-type: text/plain\r\nContent-Length: 5\r\n\r\nhello"
                .as_slice()
        );

        shared.stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_concurrent_connections() {
        let (port, shared, handle) = start_server();

        let clients: Vec<_> = (0..20)
            .map(|_| {
                thread::spawn(move || {
                    roundtrip(port, b"GET /nothing HTTP/1.1\r\nHost: x\r\n\r\n")
                })
            })
            .collect();
        for client in clients {
            let response = client.join().unwrap();
            assert_eq!(response, b"HTTP/1.1 404 Not Found\r\n\r\n");
        }

        shared.stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_stop_closes_idle_connections() {
        let (port, shared, handle) = start_server();

        // Connections parked mid-read when the stop arrives
        let mut streams: Vec<_> = (0..3).map(|_| connect(port)).collect();
        thread::sleep(Duration::from_millis(100));

        shared.stop();
        handle.join().unwrap();

        for stream in &mut streams {
            let mut out = Vec::new();
            stream.read_to_end(&mut out).unwrap();
            // Stopped pipelines close cleanly without writing anything
            assert!(out.is_empty());
        }
    }
}
