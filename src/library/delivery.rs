//! Page rendering and chunked delivery.
//!
//! Pages are served either as stored or re-encoded to JPEG after an optional
//! fit-to-bounds resize. Large payloads leave the library as fixed-size
//! [`Chunk`] frames sent in order over a bounded channel, so a slow receiver
//! back-pressures production and a dropped receiver stops it.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::{Chunk, ImagePayload};
use crate::error::{LibraryError, Result};

/// Content type of every re-encoded page and thumbnail
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Content type of whole-container downloads
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Infer a content type from a file extension; empty when unknown
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "",
    }
}

/// Decode an image, applying its embedded orientation
pub fn decode_oriented(data: &[u8]) -> Result<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_decoder()?;

    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);

    Ok(image)
}

/// Encode as baseline JPEG
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode_image(&image.to_rgb8())?;
    Ok(out)
}

/// Size of `width x height` scaled down to fit the bounds.
///
/// A zero bound leaves that axis unconstrained. Returns `None` when the image
/// already fits.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    let too_wide = max_width > 0 && width > max_width;
    let too_tall = max_height > 0 && height > max_height;
    if !too_wide && !too_tall {
        return None;
    }

    let mut scale = f64::INFINITY;
    if max_width > 0 {
        scale = scale.min(max_width as f64 / width as f64);
    }
    if max_height > 0 {
        scale = scale.min(max_height as f64 / height as f64);
    }

    let scaled_w = ((width as f64 * scale).round() as u32).max(1);
    let scaled_h = ((height as f64 * scale).round() as u32).max(1);
    Some((scaled_w, scaled_h))
}

/// Render a page for delivery.
///
/// With both bounds zero the stored bytes are returned unchanged. Otherwise
/// the page is decoded, shrunk to fit if larger than the bounds, and always
/// re-encoded as JPEG named `<name>.jpeg`.
pub fn render_page(
    data: Vec<u8>,
    name: &str,
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> Result<ImagePayload> {
    if max_width == 0 && max_height == 0 {
        return Ok(ImagePayload {
            content_type: content_type_for(name).to_string(),
            filename: name.to_string(),
            data,
        });
    }

    let image = decode_oriented(&data)?;
    let image = match fit_dimensions(image.width(), image.height(), max_width, max_height) {
        Some((w, h)) => {
            debug!(from = ?(image.width(), image.height()), to = ?(w, h), "Resizing page");
            image.resize_exact(w, h, FilterType::CatmullRom)
        }
        None => image,
    };

    Ok(ImagePayload {
        filename: format!("{}.jpeg", name),
        content_type: JPEG_CONTENT_TYPE.to_string(),
        data: encode_jpeg(&image, quality)?,
    })
}

/// Split a payload into frames of at most `chunk_size` bytes
pub fn chunk_payload<'a>(
    payload: &'a ImagePayload,
    chunk_size: usize,
) -> impl Iterator<Item = Chunk> + 'a {
    payload.data.chunks(chunk_size.max(1)).map(move |part| Chunk {
        filename: payload.filename.clone(),
        content_type: payload.content_type.clone(),
        data: part.to_vec(),
        size: part.len(),
    })
}

/// Send a payload as ordered frames, returning how many were sent.
///
/// Each send waits for channel capacity. A closed receiver aborts the
/// transfer with [`LibraryError::StreamClosed`]; nothing is retried.
pub async fn stream_chunks(
    payload: &ImagePayload,
    chunk_size: usize,
    tx: &mpsc::Sender<Chunk>,
) -> Result<usize> {
    let mut sent = 0;
    for chunk in chunk_payload(payload, chunk_size) {
        tx.send(chunk).await.map_err(|_| LibraryError::StreamClosed)?;
        sent += 1;
    }

    debug!(filename = %payload.filename, chunks = sent, "Stream complete");
    Ok(sent)
}
