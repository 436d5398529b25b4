//! The crate-wide error type.

use std::path::PathBuf;

use thiserror::Error;

/// Represents errors that can occur while issuing or signing certificates.
///
/// Messages name the input or stage that failed. They never contain key material.
#[derive(Debug, Error, Clone)]
pub enum CertMintError {
    /// Error during key generation (entropy source or library failure).
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Malformed PEM or DER input.
    #[error("Failed to decode data: {0}")]
    DecodeError(String),

    /// A file the operation depends on does not exist.
    #[error("File not found: {}", .0.display())]
    StoreNotFoundError(PathBuf),

    /// The private key does not correspond to the certificate's public key.
    #[error("Private key does not match certificate: {0}")]
    KeyMismatchError(String),

    /// A signing request carries a signature that does not verify.
    #[error("Signature verification failed: {0}")]
    SignatureVerificationError(String),

    /// The signing library failed while producing a certificate.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error related to certificate structure or validity.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reading or writing a file or sink failed.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CertMintError>;

impl From<der::Error> for CertMintError {
    /// Converts a `der::Error` into a `CertMintError`.
    fn from(err: der::Error) -> Self {
        CertMintError::DecodeError(err.to_string())
    }
}

impl From<pem::PemError> for CertMintError {
    fn from(err: pem::PemError) -> Self {
        CertMintError::DecodeError(err.to_string())
    }
}
