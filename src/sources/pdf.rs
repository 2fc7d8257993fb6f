//! PDF rendering interface. The core never reasons about PDF bytes
//! directly — `expansion::DocumentSource` implementations hand it text.
//! This trait is the seam a real renderer (OCR, PyMuPDF-equivalent page
//! rasterization piped through a vision LLM) plugs into; it is out of
//! scope for the core itself (spec §2 "External collaborators").
use crate::error::Result;

pub trait PdfRenderer: Send + Sync {
    fn render_to_text(&self, pdf_bytes: &[u8]) -> Result<String>;
}

/// A renderer that treats the PDF bytes as already-decoded text. Useful
/// for wiring a source whose upstream search API returns extracted text
/// directly rather than raw PDF bytes, and for tests.
pub struct PassthroughRenderer;

impl PdfRenderer for PassthroughRenderer {
    fn render_to_text(&self, pdf_bytes: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(pdf_bytes).into_owned())
    }
}
