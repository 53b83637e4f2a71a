//! Path dispatch
//!
//! `/echo` answers unconditionally; `/transform/...` is live when the
//! binary is built with the `imgproc` feature; everything else is 404.
//! Handler failures become the error channel and surface as 500 one
//! level up in the pipeline.

use crate::server::ServerEnv;
use opflow_core::adapt::{box_sender, BoxSender};
use opflow_core::{just, odebug};
use opflow_http::{parse_uri, Request, Response, Status};
use std::sync::Arc;

enum Route {
    Echo,
    NotFound,
    #[cfg(feature = "imgproc")]
    Transform(crate::transform::Kind, crate::transform::Params),
}

fn resolve(uri: &str) -> Route {
    let parsed = parse_uri(uri);
    if parsed.path == "/echo" {
        return Route::Echo;
    }
    if let Some(name) = parsed.path.strip_prefix("/transform/") {
        #[cfg(feature = "imgproc")]
        if let Some(kind) = crate::transform::Kind::from_name(name) {
            return Route::Transform(kind, crate::transform::Params::from_uri(&parsed));
        }
        #[cfg(not(feature = "imgproc"))]
        let _ = name;
    }
    Route::NotFound
}

/// Build the handler pipeline for one parsed request
#[cfg_attr(not(feature = "imgproc"), allow(unused_variables))]
pub fn route_request(env: &Arc<ServerEnv>, req: Request) -> BoxSender<Response> {
    odebug!("{} {} HTTP/1.1", req.method.as_str(), req.uri);
    match resolve(&req.uri) {
        Route::Echo => box_sender(just(echo_response(req))),
        Route::NotFound => box_sender(just(Response::empty(Status::NotFound))),
        #[cfg(feature = "imgproc")]
        Route::Transform(kind, params) => crate::transform::handle(env, req, kind, params),
    }
}

/// 200 with the request body mirrored back
fn echo_response(req: Request) -> Response {
    Response::with_body(Status::Ok, "text/plain", req.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opflow_core::adapt::sync_wait;
    use opflow_http::Method;
    use opflow_io::IoContext;
    use opflow_pool::WorkerPool;

    fn test_env() -> Arc<ServerEnv> {
        let ctx = IoContext::new().unwrap();
        let pool = WorkerPool::new(1);
        let env = Arc::new(ServerEnv {
            reactor: ctx.shared(),
            pool: pool.scheduler(),
            listener: Arc::new(opflow_io::ListeningSocket::bind(0).unwrap()),
        });
        // Keep the pool alive for the duration of the test process.
        std::mem::forget(pool);
        std::mem::forget(ctx);
        env
    }

    fn request(uri: &str, body: &[u8]) -> Request {
        Request {
            method: Method::Get,
            uri: uri.to_string(),
            headers: Vec::new(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_unknown_path_404() {
        let env = test_env();
        let resp = sync_wait(route_request(&env, request("/nope", b"")))
            .unwrap()
            .unwrap();
        assert_eq!(resp.status, Status::NotFound);
        assert!(resp.body.is_empty());
    }

    #[test]
    fn test_echo_mirrors_body() {
        let env = test_env();
        let resp = sync_wait(route_request(&env, request("/echo", b"payload")))
            .unwrap()
            .unwrap();
        assert_eq!(resp.status, Status::Ok);
        assert_eq!(resp.body, b"payload");
        assert_eq!(resp.headers[0].value, "text/plain");
    }

    #[cfg(not(feature = "imgproc"))]
    #[test]
    fn test_transform_without_imgproc_404() {
        let env = test_env();
        let resp = sync_wait(route_request(&env, request("/transform/blur?size=3", b"")))
            .unwrap()
            .unwrap();
        assert_eq!(resp.status, Status::NotFound);
    }
}
