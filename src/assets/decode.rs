use std::{
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::foundation::error::AssetLoadError;

/// Tracks the staging handles that decoding hands out.
///
/// Every fetched image body is staged before decoding and the handle is released once the
/// decode settles, successful or not. `live_handles()` is zero whenever no decode is running.
#[derive(Clone, Debug, Default)]
pub struct StagingArea {
    live: Arc<AtomicUsize>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged bodies not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Stage `bytes` for decoding. The handle releases itself on drop.
    pub fn stage<'a>(&self, bytes: &'a [u8]) -> StagedBlob<'a> {
        self.live.fetch_add(1, Ordering::AcqRel);
        StagedBlob {
            bytes,
            live: Arc::clone(&self.live),
        }
    }
}

/// A staged image body, released when dropped.
#[derive(Debug)]
pub struct StagedBlob<'a> {
    bytes: &'a [u8],
    live: Arc<AtomicUsize>,
}

impl StagedBlob<'_> {
    pub fn bytes(&self) -> &[u8] {
        self.bytes
    }
}

impl Drop for StagedBlob<'_> {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Decoded overlay pixels (premultiplied RGBA8, row-major).
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// Outcome of decoding one overlay body.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodeOutcome {
    /// Pixels, when the body decoded fully.
    pub image: Option<DecodedImage>,
    /// Pixel size, from the decoded image or the header alone.
    pub dimensions: Option<(u32, u32)>,
}

/// Decode an overlay body.
///
/// The format is sniffed from the bytes; `content_type` is consulted only when sniffing fails.
/// Bytes whose format cannot be identified either way fail with
/// [`AssetLoadError::Undecodable`]. Bodies of a known format that fail to decode degrade to an
/// outcome without pixels, keeping the header dimensions when they can be read.
pub async fn decode_overlay(
    bytes: &[u8],
    content_type: Option<&str>,
    url: &str,
    staging: &StagingArea,
) -> Result<DecodeOutcome, AssetLoadError> {
    let blob = staging.stage(bytes);
    let Some(format) = identify_format(blob.bytes(), content_type) else {
        return Err(AssetLoadError::Undecodable {
            url: url.to_string(),
        });
    };

    tokio::task::yield_now().await;

    match decode_image(blob.bytes(), format) {
        Ok(img) => Ok(DecodeOutcome {
            dimensions: Some((img.width, img.height)),
            image: Some(img),
        }),
        Err(e) => {
            tracing::warn!(url, error = %e, "overlay decode failed; continuing without pixels");
            Ok(DecodeOutcome {
                image: None,
                dimensions: header_dimensions(blob.bytes(), format),
            })
        }
    }
}

/// Format of `bytes`: sniffed first, then taken from the declared MIME type.
pub fn identify_format(bytes: &[u8], content_type: Option<&str>) -> Option<image::ImageFormat> {
    image::guess_format(bytes).ok().or_else(|| {
        let mime = content_type?.split(';').next()?.trim();
        let format = image::ImageFormat::from_mime_type(mime)?;
        tracing::debug!(mime, ?format, "format taken from content type");
        Some(format)
    })
}

/// Decode an image of `format` into premultiplied RGBA8.
pub fn decode_image(
    bytes: &[u8],
    format: image::ImageFormat,
) -> Result<DecodedImage, image::ImageError> {
    let rgba = image::load_from_memory_with_format(bytes, format)?.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(DecodedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

fn header_dimensions(bytes: &[u8], format: image::ImageFormat) -> Option<(u32, u32)> {
    image::ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .ok()
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
