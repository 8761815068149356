//! PDF page access via pdfium: embedded text per page and page rasters.
//!
//! ## Why a trait?
//!
//! The acquisition algorithm in [`super::acquire`] only needs two things
//! from a PDF library: per-page text and per-page images. [`PageSource`]
//! is that seam; [`PdfiumPages`] is the production implementation and tests
//! use in-memory fakes, so the fallback logic is testable without a pdfium
//! shared library on the machine.
//!
//! All methods are blocking. Callers run them inside `spawn_blocking`.

use crate::error::BeawareError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Blocking access to the pages of an in-memory PDF.
pub trait PageSource: Send + Sync {
    /// Text layer of every page, in order.
    ///
    /// The outer error means the document could not be opened at all; an
    /// inner error is a single page whose text could not be read.
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<Result<String, BeawareError>>, BeawareError>;

    /// Render every page at `dpi`, with the longest edge capped at `max_pixels`.
    fn rasterize(
        &self,
        pdf: &[u8],
        dpi: u32,
        max_pixels: u32,
    ) -> Result<Vec<DynamicImage>, BeawareError>;
}

/// [`PageSource`] backed by the pdfium shared library.
///
/// The library is bound per call and released when the call returns, so
/// an instance is cheap and holds no native state.
#[derive(Debug, Clone, Default)]
pub struct PdfiumPages {
    lib_path: Option<PathBuf>,
}

impl PdfiumPages {
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }

    fn open(&self) -> Result<Pdfium, BeawareError> {
        bind_pdfium(self.lib_path.as_deref())
    }
}

/// Bind to pdfium: the explicit path first, then the working directory and
/// the usual system library directories, then the loader's search path.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, BeawareError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(p) = lib_path {
        if p.is_file() {
            candidates.push(p.to_path_buf());
        } else {
            candidates.push(Pdfium::pdfium_platform_library_name_at_path(p));
        }
    }
    for dir in ["./", "/usr/lib", "/usr/local/lib"] {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(dir));
    }

    for candidate in &candidates {
        if let Ok(bindings) = Pdfium::bind_to_library(candidate) {
            debug!("Bound pdfium at {}", candidate.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| BeawareError::PdfiumBindingFailed(e.to_string()))?;
    Ok(Pdfium::new(bindings))
}

fn corrupt(e: PdfiumError) -> BeawareError {
    BeawareError::CorruptPdf {
        detail: format!("{:?}", e),
    }
}

impl PageSource for PdfiumPages {
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<Result<String, BeawareError>>, BeawareError> {
        let pdfium = self.open()?;
        let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(corrupt)?;
        let pages = document.pages();
        debug!("Text layer: {} page(s)", pages.len());

        let texts = pages
            .iter()
            .map(|page| {
                page.text()
                    .map(|t| t.all())
                    .map_err(|e| BeawareError::ExtractionFailed {
                        reason: format!("{:?}", e),
                    })
            })
            .collect();
        Ok(texts)
    }

    fn rasterize(
        &self,
        pdf: &[u8],
        dpi: u32,
        max_pixels: u32,
    ) -> Result<Vec<DynamicImage>, BeawareError> {
        let pdfium = self.open()?;
        let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(corrupt)?;
        let pages = document.pages();
        info!("Rasterising {} page(s) at {} DPI", pages.len(), dpi);

        // PDF user space is 72 units per inch.
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / 72.0)
            .set_maximum_width(max_pixels as i32)
            .set_maximum_height(max_pixels as i32);

        let mut images = Vec::new();
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                BeawareError::ExtractionFailed {
                    reason: format!("could not render page {}: {:?}", idx + 1, e),
                }
            })?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }
        Ok(images)
    }
}
