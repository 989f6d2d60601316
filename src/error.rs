//! use selfcert::error::SelfCertError;

use thiserror::Error;

/// Represents errors that can occur while issuing certificates.
///
/// This enum provides detailed error messages for various failure scenarios.
#[derive(Debug, Error, Clone)]
pub enum SelfCertError {
    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Error related to certificate operations.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Error from RSA operations.
    #[error("RSA error: {0}")]
    RsaError(String),

    /// Error from RSA PKCS1 operations.
    #[error("RSA PKCS1 error: {0}")]
    RsaPkcs1Error(String),

    /// A signature did not verify.
    #[error("Signature verification failed: {0}")]
    InvalidSignature(String),

    /// The private key does not belong to the certificate it was paired with.
    #[error("Private key does not match the certificate public key")]
    KeyMismatch,

    /// Key or algorithm outside what this crate handles (RSA only).
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, SelfCertError>;

impl From<der::Error> for SelfCertError {
    /// Converts a `der::Error` into a `SelfCertError`.
    fn from(err: der::Error) -> Self {
        SelfCertError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for SelfCertError {
    fn from(err: rsa::Error) -> Self {
        SelfCertError::RsaError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for SelfCertError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        SelfCertError::RsaPkcs1Error(err.to_string())
    }
}

impl From<pkcs8::Error> for SelfCertError {
    fn from(err: pkcs8::Error) -> Self {
        SelfCertError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for SelfCertError {
    fn from(err: pkcs8::spki::Error) -> Self {
        SelfCertError::DecodingError(err.to_string())
    }
}

impl From<pem::PemError> for SelfCertError {
    fn from(err: pem::PemError) -> Self {
        SelfCertError::DecodingError(err.to_string())
    }
}
