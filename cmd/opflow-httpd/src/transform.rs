//! Image transformation handlers
//!
//! CPU-bound pixel work, dispatched from the router and executed on
//! the worker pool. The compound transforms (cartoonify, contourpaint)
//! run their two independent passes as a `when_all` join on the pool
//! and combine the results by masking.
//!
//! Decoding accepts whatever the `image` crate recognizes (PNG/JPEG
//! here); every transform answers with a JPEG body.

use crate::server::ServerEnv;
use image::{GrayImage, Rgb, RgbImage};
use opflow_core::adapt::{box_sender, let_value, then, transfer_just, when_all, BoxSender};
use opflow_core::error::{OpError, OpResult};
use opflow_core::{just, just_error};
use opflow_http::{ParsedUri, Request, Response, Status};
use opflow_pool::PoolScheduler;
use std::sync::Arc;

/// The transforms reachable under `/transform/{name}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Blur,
    AdaptThresh,
    ReduceColors,
    Cartoonify,
    OilPainting,
    ContourPaint,
}

impl Kind {
    pub fn from_name(name: &str) -> Option<Kind> {
        match name {
            "blur" => Some(Kind::Blur),
            "adaptthresh" => Some(Kind::AdaptThresh),
            "reducecolors" => Some(Kind::ReduceColors),
            "cartoonify" => Some(Kind::Cartoonify),
            "oilpainting" => Some(Kind::OilPainting),
            "contourpaint" => Some(Kind::ContourPaint),
            _ => None,
        }
    }
}

/// Query parameters shared by the handlers, with their defaults
#[derive(Debug, Clone, Copy)]
pub struct Params {
    pub size: i32,
    pub blur_size: i32,
    pub block_size: i32,
    pub diff: i32,
    pub num_colors: i32,
    pub oil_size: i32,
    pub dyn_ratio: i32,
}

impl Params {
    pub fn from_uri(uri: &ParsedUri<'_>) -> Params {
        Params {
            size: uri.param_int("size", 3),
            blur_size: uri.param_int("blur_size", 3),
            block_size: uri.param_int("block_size", 5),
            diff: uri.param_int("diff", 5),
            num_colors: uri.param_int("num_colors", 5),
            oil_size: uri.param_int("oil_size", 3),
            dyn_ratio: uri.param_int("dyn_ratio", 1),
        }
    }
}

/// Build the handler pipeline for one transform request
pub fn handle(env: &Arc<ServerEnv>, req: Request, kind: Kind, p: Params) -> BoxSender<Response> {
    let pool = env.pool.clone();
    let body = req.body;
    match kind {
        Kind::Blur => unary(body, move |img| encode_jpeg_rgb(&box_blur(&img, p.size))),
        Kind::AdaptThresh => unary(body, move |img| {
            encode_jpeg_gray(&edge_mask(&img, p.blur_size, p.block_size, p.diff))
        }),
        Kind::ReduceColors => unary(body, move |img| {
            encode_jpeg_rgb(&reduce_colors(&img, p.num_colors))
        }),
        Kind::OilPainting => unary(body, move |img| {
            encode_jpeg_rgb(&oil_painting(&img, p.size, p.dyn_ratio))
        }),
        Kind::Cartoonify => masked(
            pool,
            body,
            move |img| edge_mask(img, p.blur_size, p.block_size, p.diff),
            move |img| reduce_colors(img, p.num_colors),
        ),
        Kind::ContourPaint => masked(
            pool,
            body,
            move |img| edge_mask(img, p.blur_size, p.block_size, p.diff),
            move |img| oil_painting(img, p.oil_size, p.dyn_ratio),
        ),
    }
}

/// Decode, run one pass, encode
fn unary(
    body: Vec<u8>,
    pass: impl FnOnce(RgbImage) -> OpResult<Vec<u8>> + Send + 'static,
) -> BoxSender<Response> {
    box_sender(let_value(just(body), move |body: Vec<u8>| {
        match decode(&body).and_then(pass) {
            Ok(bytes) => box_sender(just(jpeg_response(bytes))),
            Err(err) => box_sender(just_error::<Response>(err)),
        }
    }))
}

/// Decode once, run the mask pass and the paint pass concurrently on
/// the pool, join by masking, encode
fn masked(
    pool: PoolScheduler,
    body: Vec<u8>,
    mask_pass: impl FnOnce(&RgbImage) -> GrayImage + Send + 'static,
    paint_pass: impl FnOnce(&RgbImage) -> RgbImage + Send + 'static,
) -> BoxSender<Response> {
    box_sender(let_value(just(body), move |body: Vec<u8>| {
        let img = match decode(&body) {
            Ok(img) => img,
            Err(err) => return box_sender(just_error::<Response>(err)),
        };
        let img2 = img.clone();
        let edges = then(transfer_just(pool.clone(), img), move |img| mask_pass(&img));
        let painted = then(transfer_just(pool, img2), move |img| paint_pass(&img));
        box_sender(let_value(
            when_all(edges, painted),
            move |(mask, painted)| match encode_jpeg_rgb(&apply_mask(&painted, &mask)) {
                Ok(bytes) => box_sender(just(jpeg_response(bytes))),
                Err(err) => box_sender(just_error::<Response>(err)),
            },
        ))
    }))
}

fn decode(body: &[u8]) -> OpResult<RgbImage> {
    image::load_from_memory(body)
        .map(|img| img.to_rgb8())
        .map_err(|_| OpError::Encode)
}

fn jpeg_response(bytes: Vec<u8>) -> Response {
    Response::with_body(Status::Ok, "application/jpeg", bytes)
}

fn encode_jpeg_rgb(img: &RgbImage) -> OpResult<Vec<u8>> {
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut out)
        .encode(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|_| OpError::Encode)?;
    Ok(out)
}

fn encode_jpeg_gray(img: &GrayImage) -> OpResult<Vec<u8>> {
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut out)
        .encode(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .map_err(|_| OpError::Encode)?;
    Ok(out)
}

// ── Pixel passes ──

fn luma(p: &Rgb<u8>) -> u32 {
    (p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000
}

fn to_gray(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        image::Luma([luma(img.get_pixel(x, y)) as u8])
    })
}

/// Box blur with a square kernel of the given size
fn box_blur(img: &RgbImage, size: i32) -> RgbImage {
    let r = (size.max(1) / 2) as i64;
    let (w, h) = img.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let mut sum = [0u32; 3];
        let mut count = 0u32;
        for dy in -r..=r {
            for dx in -r..=r {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx >= 0 && ny >= 0 && (nx as u32) < w && (ny as u32) < h {
                    let p = img.get_pixel(nx as u32, ny as u32);
                    sum[0] += p[0] as u32;
                    sum[1] += p[1] as u32;
                    sum[2] += p[2] as u32;
                    count += 1;
                }
            }
        }
        Rgb([
            (sum[0] / count) as u8,
            (sum[1] / count) as u8,
            (sum[2] / count) as u8,
        ])
    })
}

/// Adaptive threshold: darker than the local mean minus `diff` is edge
fn adapt_thresh(gray: &GrayImage, block_size: i32, diff: i32) -> GrayImage {
    let r = (block_size.max(1) / 2) as i64;
    let (w, h) = gray.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut sum = 0u32;
        let mut count = 0u32;
        for dy in -r..=r {
            for dx in -r..=r {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx >= 0 && ny >= 0 && (nx as u32) < w && (ny as u32) < h {
                    sum += gray.get_pixel(nx as u32, ny as u32)[0] as u32;
                    count += 1;
                }
            }
        }
        let mean = (sum / count) as i32;
        let pixel = gray.get_pixel(x, y)[0] as i32;
        if pixel < mean - diff {
            image::Luma([0])
        } else {
            image::Luma([255])
        }
    })
}

/// blur, grayscale, adaptive threshold
fn edge_mask(img: &RgbImage, blur_size: i32, block_size: i32, diff: i32) -> GrayImage {
    adapt_thresh(&to_gray(&box_blur(img, blur_size)), block_size, diff)
}

/// Quantize each channel to `num_colors` levels
fn reduce_colors(img: &RgbImage, num_colors: i32) -> RgbImage {
    let n = num_colors.clamp(2, 256) as u32;
    let step = 256 / n;
    let quantize = |v: u8| -> u8 { ((v as u32 / step) * step + step / 2).min(255) as u8 };
    let (w, h) = img.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let p = img.get_pixel(x, y);
        Rgb([quantize(p[0]), quantize(p[1]), quantize(p[2])])
    })
}

/// Oil painting: dominant intensity bucket in the neighborhood wins
fn oil_painting(img: &RgbImage, size: i32, dyn_ratio: i32) -> RgbImage {
    let r = size.max(1) as i64;
    let levels = (dyn_ratio.clamp(1, 8) * 8) as usize;
    let (w, h) = img.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let mut counts = vec![0u32; levels];
        let mut sums = vec![[0u32; 3]; levels];
        for dy in -r..=r {
            for dx in -r..=r {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx >= 0 && ny >= 0 && (nx as u32) < w && (ny as u32) < h {
                    let p = img.get_pixel(nx as u32, ny as u32);
                    let bucket = (luma(p) as usize * levels / 256).min(levels - 1);
                    counts[bucket] += 1;
                    sums[bucket][0] += p[0] as u32;
                    sums[bucket][1] += p[1] as u32;
                    sums[bucket][2] += p[2] as u32;
                }
            }
        }
        let best = (0..levels).max_by_key(|&i| counts[i]).unwrap_or(0);
        let n = counts[best].max(1);
        Rgb([
            (sums[best][0] / n) as u8,
            (sums[best][1] / n) as u8,
            (sums[best][2] / n) as u8,
        ])
    })
}

/// Paint mask edges (black mask pixels) onto the image
fn apply_mask(img: &RgbImage, mask: &GrayImage) -> RgbImage {
    let (w, h) = img.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        if mask.get_pixel(x, y)[0] == 0 {
            Rgb([0, 0, 0])
        } else {
            *img.get_pixel(x, y)
        }
    })
}
