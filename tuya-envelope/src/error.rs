//! Error types for envelope parsing and decryption.

use thiserror::Error;

/// Errors that can occur while splitting or decrypting an envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Envelope is shorter than the header plus one cipher block.
    #[error("envelope too small: expected at least {minimum} bytes, got {actual} bytes")]
    TooSmall { actual: usize, minimum: usize },

    /// First header bytes do not match the expected magic (strict parsing only).
    #[error("envelope header mismatch: expected {expected:02x?}, found {found:02x?}")]
    HeaderMismatch { expected: [u8; 4], found: [u8; 4] },

    /// Key is not 16, 24 or 32 bytes long.
    #[error("invalid AES key length: expected 16, 24 or 32 bytes, got {actual} bytes")]
    InvalidKeyLength { actual: usize },

    /// Ciphertext length is not a multiple of the AES block size.
    #[error("ciphertext length {len} is not a multiple of 16 bytes")]
    CiphertextNotBlockAligned { len: usize },

    /// PKCS#7 padding check failed after decryption.
    #[error("invalid PKCS#7 padding (wrong key, wrong IV offset or corrupted download)")]
    PaddingInvalid,
}

/// Result type for envelope operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;
