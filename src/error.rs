use thiserror::Error;

/// Errors surfaced by key issuance, signing and verification.
///
/// Every variant is terminal for the operation that produced it; nothing in
/// this crate retries internally. A cryptographically invalid or untrusted
/// signature is *not* an error — the verifier reports it as a negative
/// result instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Certificate issuance was requested for a signer without key material.
    #[error("signer has no private key: {0}")]
    MissingKeyMaterial(&'static str),

    /// Signing was requested for a signer missing a key or certificate.
    #[error("signer must have a private key and a certificate")]
    SignerNotReady,

    /// The system RNG or the key generator failed. Not retried.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Key or certificate material could not be parsed.
    #[error("could not load key material: {0}")]
    KeyLoad(String),

    /// The signature object could not be constructed.
    #[error("could not produce signature: {0}")]
    Signing(String),

    /// The input does not carry the PDF magic header.
    #[error("invalid PDF file")]
    InvalidDocumentFormat,

    /// The document or its embedded signature container could not be parsed.
    #[error("document structure error: {0}")]
    VerificationStructural(String),

    /// Passthrough for PDF object manipulation errors.
    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Passthrough for I/O errors produced while serializing a document.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested user does not exist in the record store.
    #[error("user was not found")]
    UserNotFound,

    #[error("{0}")]
    Other(String),
}
