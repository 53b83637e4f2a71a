//! Request parser benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use opflow_http::RequestParser;

const GET_REQUEST: &[u8] =
    b"GET /transform/blur?size=5 HTTP/1.1\r\nHost: localhost:8080\r\nAccept: */*\r\n\r\n";

fn post_request() -> Vec<u8> {
    let body = vec![0xabu8; 16 * 1024];
    let mut req = format!(
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    req.extend_from_slice(&body);
    req
}

fn bench_parser(c: &mut Criterion) {
    c.bench_function("parse_get_single_packet", |b| {
        b.iter(|| {
            let mut parser = RequestParser::new();
            black_box(parser.feed(black_box(GET_REQUEST)).unwrap())
        })
    });

    let post = post_request();
    c.bench_function("parse_post_16k_body", |b| {
        b.iter(|| {
            let mut parser = RequestParser::new();
            black_box(parser.feed(black_box(&post)).unwrap())
        })
    });

    c.bench_function("parse_get_byte_at_a_time", |b| {
        b.iter(|| {
            let mut parser = RequestParser::new();
            let mut out = None;
            for chunk in GET_REQUEST.chunks(1) {
                if let Some(req) = parser.feed(chunk).unwrap() {
                    out = Some(req);
                }
            }
            black_box(out)
        })
    });
}

criterion_group!(benches, bench_parser);
criterion_main!(benches);
