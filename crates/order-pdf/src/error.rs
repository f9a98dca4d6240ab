use thiserror::Error;

#[derive(Error, Debug)]
pub enum StampError {
    #[error("failed to parse PDF: {0}")]
    MalformedDocument(String),

    #[error("signature image could not be decoded: {0}")]
    UnsupportedImage(String),

    #[error("failed to emit stamped PDF: {0}")]
    Emit(String),
}
