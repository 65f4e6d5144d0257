//! PDF rasterisation for the optical fallback: render every page via pdfium
//! and encode it as PNG.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! [`PageRasterizer::rasterize`] is blocking; the optical fallback moves it
//! onto Tokio's blocking pool so request workers never stall on rendering.
//!
//! ## Why cap pixels as well as DPI?
//!
//! OCR accuracy wants ~300 DPI, but page sizes vary wildly: an A0 poster at
//! 300 DPI would be 10,000 × 14,000 px. `max_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded.

use crate::error::OcrError;
use crate::pipeline::encode::encode_png;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One rendered page, PNG-encoded.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-indexed page number.
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Turns PDF bytes into page images.
pub trait PageRasterizer: Send + Sync {
    /// Render every page in order. Blocking.
    fn rasterize(&self, bytes: &[u8]) -> Result<Vec<RenderedPage>, OcrError>;
}

/// [`PageRasterizer`] backed by the pdfium native library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u32,
    max_pixels: u32,
    lib_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(dpi: u32, max_pixels: u32, lib_path: Option<PathBuf>) -> Self {
        Self {
            dpi,
            max_pixels,
            lib_path,
        }
    }
}

/// Bind to pdfium: an explicit library path if given, else the system library.
fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, OcrError> {
    let bindings = match lib_path {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| OcrError::PdfiumBinding(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(&self, bytes: &[u8]) -> Result<Vec<RenderedPage>, OcrError> {
        let pdfium = bind_pdfium(self.lib_path.as_deref())?;

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| OcrError::Load(format!("{:?}", e)))?;

        let pages = document.pages();
        info!("Rasterising {} pages at {} DPI", pages.len(), self.dpi);

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut results = Vec::with_capacity(pages.len() as usize);

        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                OcrError::Rasterisation {
                    page: page_num,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            let png = encode_png(&image).map_err(|e| OcrError::Encoding {
                page: page_num,
                detail: e.to_string(),
            })?;

            debug!(
                "Rendered page {} → {}x{} px, {} PNG bytes",
                page_num,
                image.width(),
                image.height(),
                png.len()
            );

            results.push(RenderedPage {
                page_num,
                width: image.width(),
                height: image.height(),
                png,
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_path_is_binding_error() {
        let r = PdfiumRasterizer::new(300, 4000, Some(PathBuf::from("/nonexistent/libpdfium.so")));
        match r.rasterize(b"%PDF-1.4") {
            Err(OcrError::PdfiumBinding(_)) => {}
            other => panic!("expected binding error, got {:?}", other.map(|p| p.len())),
        }
    }
}
