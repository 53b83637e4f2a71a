//! # opflow HTTP/1.1 server
//!
//! One reactor thread for all socket I/O, a fixed worker pool for the
//! CPU-bound handlers, and an operation pipeline per connection:
//!
//! read request → hop to pool → handle → recover errors → write → close
//!
//! No keep-alive: the connection closes after each response.
//!
//! ## Usage
//!
//!     OPFLOW_PORT=8080 OPFLOW_POOL_THREADS=8 opflow-httpd
//!
//! SIGTERM or SIGINT stops the reactor; pending operations are
//! cancelled and the pool drains before exit. Build with
//! `--features imgproc` to enable the `/transform/*` routes.

mod routes;
mod server;
mod stop;
#[cfg(feature = "imgproc")]
mod transform;

use opflow_core::{oerror, oinfo};
use server::{Server, ServerConfig};

fn main() {
    let cfg = ServerConfig::from_env();
    let server = match Server::bind(&cfg) {
        Ok(server) => server,
        Err(err) => {
            oerror!("opflow-httpd: startup failed: {}", err);
            std::process::exit(1);
        }
    };

    stop::install(&server.shared());
    oinfo!(
        "opflow-httpd: listening on port {} with {} pool workers",
        cfg.port,
        cfg.pool_threads
    );

    let completed = server.run();
    oinfo!("opflow-httpd: stopped after {} completed operations", completed);
}
