//! Signature stamping for order documents.
//!
//! This crate provides the one PDF mutation the approval workflow needs:
//! placing a captured signature raster and an identity caption onto the
//! first page of an existing document, preserving everything else.

pub mod error;
pub mod stamp;

pub use error::StampError;
pub use stamp::{stamp_signature, StampPlacement, CAPTION_FONT_SIZE, STAMP_HEIGHT, STAMP_WIDTH};

/// Parse PDF bytes and return the page count.
pub fn page_count(bytes: &[u8]) -> Result<u32, StampError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| StampError::MalformedDocument(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rejects_garbage() {
        assert!(matches!(
            page_count(b"definitely not a pdf"),
            Err(StampError::MalformedDocument(_))
        ));
    }
}
