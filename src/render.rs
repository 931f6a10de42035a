//! Page rasterization
//!
//! Rendering is behind the [`PageRenderer`] trait so the rest of the crate
//! does not depend on a native PDF engine. [`BlankRenderer`] draws an empty
//! page of the right size and orientation and works everywhere; with the
//! `pdfium` feature enabled, `PdfiumRenderer` draws the real page content.

use crate::collection::Rotation;
use crate::pdf_ops::SourceDocument;
use anyhow::{bail, Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// US Letter in points, used when a page has no usable media box.
const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Pixels per PDF point
    pub scale: f32,
}

impl RenderSettings {
    pub fn thumbnail() -> Self {
        Self { scale: 0.3 }
    }

    pub fn preview() -> Self {
        Self { scale: 0.5 }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::thumbnail()
    }
}

/// A PNG-encoded raster of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub trait PageRenderer {
    /// Render page `page_index` (0-based) of `source`, turned by `rotation`.
    fn render(
        &self,
        source: &SourceDocument,
        page_index: usize,
        rotation: Rotation,
        settings: &RenderSettings,
    ) -> Result<RenderedPage>;

    /// Render several pages of one source, one result per entry of `pages`.
    ///
    /// Renderers that have to open the document first should override this
    /// and open it once for the whole batch.
    fn render_many(
        &self,
        source: &SourceDocument,
        pages: &[(usize, Rotation)],
        settings: &RenderSettings,
    ) -> Vec<Result<RenderedPage>> {
        pages
            .iter()
            .map(|&(index, rotation)| self.render(source, index, rotation, settings))
            .collect()
    }
}

/// Render several pages of one source. A failing page yields an `Err` in its
/// slot and the rest of the batch still renders.
pub fn render_batch<R: PageRenderer + ?Sized>(
    renderer: &R,
    source: &SourceDocument,
    pages: &[(usize, Rotation)],
    settings: &RenderSettings,
) -> Vec<Result<RenderedPage>> {
    let results = renderer.render_many(source, pages, settings);
    for (&(index, _), result) in pages.iter().zip(&results) {
        if let Err(e) = result {
            log::warn!("failed to render page {} of {}: {:#}", index.saturating_add(1), source.name(), e);
        }
    }
    results
}

/// 1-based page number for a 0-based index, if the page exists.
fn page_number(source: &SourceDocument, page_index: usize) -> Result<u32> {
    let Some(page_number) = u32::try_from(page_index)
        .ok()
        .and_then(|i| i.checked_add(1))
        .filter(|n| *n <= source.page_count())
    else {
        bail!(
            "Page index {} out of range ({} has {} pages)",
            page_index,
            source.name(),
            source.page_count()
        );
    };
    Ok(page_number)
}

/// Encode raw RGBA pixels as PNG.
pub fn encode_png(width: u32, height: u32, rgba: Vec<u8>) -> Result<RenderedPage> {
    let Some(buffer) = RgbaImage::from_raw(width, height, rgba) else {
        bail!("Pixel buffer does not match {}x{}", width, height);
    };
    let mut png = Cursor::new(Vec::new());
    buffer
        .write_to(&mut png, ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(RenderedPage {
        png: png.into_inner(),
        width,
        height,
    })
}

/// Pixel size of a page of `size` points at `scale`, after `rotation`.
pub fn raster_size(size: (f64, f64), rotation: Rotation, scale: f32) -> (u32, u32) {
    let (w, h) = match rotation {
        Rotation::R90 | Rotation::R270 => (size.1, size.0),
        Rotation::R0 | Rotation::R180 => size,
    };
    let scale = scale as f64;
    (
        ((w * scale).round() as u32).max(1),
        ((h * scale).round() as u32).max(1),
    )
}

/// Draws white pages with the page's own size and orientation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankRenderer;

impl PageRenderer for BlankRenderer {
    fn render(
        &self,
        source: &SourceDocument,
        page_index: usize,
        rotation: Rotation,
        settings: &RenderSettings,
    ) -> Result<RenderedPage> {
        let page_number = page_number(source, page_index)?;
        let (size, own_rotation) = source
            .page_geometry(page_number)
            .unwrap_or((DEFAULT_PAGE_SIZE, Rotation::R0));
        let total = Rotation::from_degrees(own_rotation.degrees() as i64 + rotation.degrees() as i64)
            .unwrap_or_default();
        let (width, height) = raster_size(size, total, settings.scale);
        let buffer = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        encode_png(width, height, buffer.into_raw())
    }
}

#[cfg(feature = "pdfium")]
pub use self::pdfium_backend::PdfiumRenderer;

#[cfg(feature = "pdfium")]
mod pdfium_backend {
    use super::{encode_png, page_number, PageRenderer, RenderSettings, RenderedPage};
    use crate::collection::Rotation;
    use crate::pdf_ops::SourceDocument;
    use anyhow::{anyhow, Result};
    use pdfium_render::prelude::*;

    /// Renders pages with the PDFium library.
    pub struct PdfiumRenderer {
        pdfium: Pdfium,
    }

    impl PdfiumRenderer {
        /// Bind to a PDFium library next to the executable, falling back to
        /// the system one.
        pub fn new() -> Result<Self> {
            let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| anyhow!("Failed to load Pdfium library: {}", e))?;
            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }
    }

    impl PdfiumRenderer {
        fn open<'a>(&'a self, source: &'a SourceDocument) -> Result<PdfDocument<'a>> {
            self.pdfium
                .load_pdf_from_byte_slice(source.bytes(), None)
                .map_err(|e| anyhow!("Failed to open {} in Pdfium: {}", source.name(), e))
        }

        fn render_page(
            document: &PdfDocument<'_>,
            source: &SourceDocument,
            page_index: usize,
            rotation: Rotation,
            settings: &RenderSettings,
        ) -> Result<RenderedPage> {
            page_number(source, page_index)?;
            let index = u16::try_from(page_index)?;
            let page = document
                .pages()
                .get(index)
                .map_err(|e| anyhow!("Page {} of {}: {}", page_index + 1, source.name(), e))?;

            let turn = match rotation {
                Rotation::R0 => PdfPageRenderRotation::None,
                Rotation::R90 => PdfPageRenderRotation::Degrees90,
                Rotation::R180 => PdfPageRenderRotation::Degrees180,
                Rotation::R270 => PdfPageRenderRotation::Degrees270,
            };
            let config = PdfRenderConfig::new()
                .scale_page_by_factor(settings.scale)
                .rotate(turn, true);

            let img = page
                .render_with_config(&config)
                .map_err(|e| anyhow!("Failed to render page {}: {}", page_index + 1, e))?
                .as_image()
                .into_rgba8();
            let (width, height) = img.dimensions();
            encode_png(width, height, img.into_raw())
        }
    }

    impl PageRenderer for PdfiumRenderer {
        fn render(
            &self,
            source: &SourceDocument,
            page_index: usize,
            rotation: Rotation,
            settings: &RenderSettings,
        ) -> Result<RenderedPage> {
            let document = self.open(source)?;
            Self::render_page(&document, source, page_index, rotation, settings)
        }

        /// Opens the document once for the whole batch.
        fn render_many(
            &self,
            source: &SourceDocument,
            pages: &[(usize, Rotation)],
            settings: &RenderSettings,
        ) -> Vec<Result<RenderedPage>> {
            let document = match self.open(source) {
                Ok(document) => document,
                Err(e) => {
                    let message = format!("{:#}", e);
                    return pages.iter().map(|_| Err(anyhow!("{}", message))).collect();
                }
            };
            pages
                .iter()
                .map(|&(index, rotation)| Self::render_page(&document, source, index, rotation, settings))
                .collect()
        }
    }
}
