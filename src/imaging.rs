//! Re-encoding of embedded JPEG images
//!
//! Only plain 8-bit `DeviceRGB` / `DeviceGray` images stored with a single
//! `DCTDecode` filter are touched. Images with masks, decode arrays, decode
//! parameters or other colour spaces are copied unchanged. A re-encoded image replaces the
//! original only when it is smaller.

use crate::optimization::OptimizationSettings;
use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageFormat;
use lopdf::{Document, Object, ObjectId, Stream};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Rgb,
    Gray,
}

/// Outcome of a re-encoding pass over one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecompressStats {
    pub recompressed: usize,
    pub unchanged: usize,
    pub failures: Vec<String>,
}

/// A successfully re-encoded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Scale dimensions so the longest side is at most `max_dimension`,
/// preserving aspect ratio. Never upscales.
pub fn scale_to_fit(width: u32, height: u32, max_dimension: Option<u32>) -> (u32, u32) {
    let Some(max) = max_dimension else {
        return (width, height);
    };
    let longest = width.max(height);
    if longest <= max || longest == 0 {
        return (width, height);
    }
    let scale = max as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Decode, downscale and re-encode one JPEG.
///
/// Returns `Ok(None)` when the settings ask for no re-encoding or the result
/// would not be smaller than the input.
pub fn recompress_jpeg(
    data: &[u8],
    color: ColorModel,
    settings: &OptimizationSettings,
) -> Result<Option<EncodedImage>> {
    let Some(quality) = settings.jpeg_quality else {
        return Ok(None);
    };

    let decoded = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .context("Failed to decode JPEG")?;
    let (width, height) = scale_to_fit(decoded.width(), decoded.height(), settings.image_max_dimension);
    let resized = if (width, height) != (decoded.width(), decoded.height()) {
        decoded.resize_exact(width, height, FilterType::Triangle)
    } else {
        decoded
    };

    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        match color {
            ColorModel::Rgb => encoder.encode_image(&resized.to_rgb8()),
            ColorModel::Gray => encoder.encode_image(&resized.to_luma8()),
        }
        .context("Failed to encode JPEG")?;
    }

    if out.len() >= data.len() {
        return Ok(None);
    }
    Ok(Some(EncodedImage {
        data: out,
        width,
        height,
    }))
}

/// Classify a stream as a re-encodable JPEG image.
pub fn jpeg_candidate(stream: &Stream) -> Option<ColorModel> {
    let dict = &stream.dict;
    let name_is = |key: &[u8], expected: &[u8]| {
        dict.get(key)
            .and_then(Object::as_name)
            .map(|name| name == expected)
            .unwrap_or(false)
    };

    if !name_is(b"Subtype", b"Image") {
        return None;
    }
    let single_dct = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => name.as_slice() == b"DCTDecode",
        Ok(Object::Array(filters)) => {
            filters.len() == 1 && filters[0].as_name().map(|n| n == b"DCTDecode").unwrap_or(false)
        }
        _ => false,
    };
    if !single_dct {
        return None;
    }
    if dict.get(b"BitsPerComponent").and_then(Object::as_i64).ok() != Some(8) {
        return None;
    }
    if [b"SMask".as_slice(), b"Mask", b"Decode", b"DecodeParms"]
        .iter()
        .any(|key| dict.has(*key))
    {
        return None;
    }

    if name_is(b"ColorSpace", b"DeviceRGB") {
        Some(ColorModel::Rgb)
    } else if name_is(b"ColorSpace", b"DeviceGray") {
        Some(ColorModel::Gray)
    } else {
        None
    }
}

/// Re-encode every eligible image of `doc` in place.
///
/// Images are processed in parallel. Failures are collected per image and
/// never abort the pass.
pub fn recompress_images(doc: &mut Document, settings: &OptimizationSettings) -> RecompressStats {
    let mut stats = RecompressStats::default();
    if !settings.recompresses_images() {
        return stats;
    }

    let candidates: Vec<(ObjectId, ColorModel, Vec<u8>)> = doc
        .objects
        .iter()
        .filter_map(|(id, object)| match object {
            Object::Stream(stream) => {
                jpeg_candidate(stream).map(|color| (*id, color, stream.content.clone()))
            }
            _ => None,
        })
        .collect();

    let results: Vec<(ObjectId, Result<Option<EncodedImage>>)> = candidates
        .par_iter()
        .map(|(id, color, data)| (*id, recompress_jpeg(data, *color, settings)))
        .collect();

    for (id, result) in results {
        match result {
            Ok(Some(encoded)) => {
                if let Some(Object::Stream(stream)) = doc.objects.get_mut(&id) {
                    stream.dict.set("Width", encoded.width as i64);
                    stream.dict.set("Height", encoded.height as i64);
                    stream.set_content(encoded.data);
                    stats.recompressed += 1;
                }
            }
            Ok(None) => stats.unchanged += 1,
            Err(e) => {
                log::warn!("image {} {} could not be re-encoded: {:#}", id.0, id.1, e);
                stats.failures.push(format!("image object {} {}: {:#}", id.0, id.1, e));
            }
        }
    }

    log::debug!(
        "re-encoded {} image(s), {} unchanged, {} failed",
        stats.recompressed,
        stats.unchanged,
        stats.failures.len()
    );
    stats
}
