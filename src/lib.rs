//! # selfcert - Self-Signed CA and Server Certificates in Pure Rust
//!
//! selfcert issues X.509 certificates with the RustCrypto libraries. It
//! creates a self-signed RSA certificate authority, keeps that CA current
//! (serial number and expiry), and signs server certificates with it, either
//! for a freshly generated key pair or for an externally supplied PKCS#10
//! certificate signing request.
//!
//! ## Supported Formats
//!
//! - **Keys**: RSA only. PKCS#1 (`RSA PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`)
//!   are read, PKCS#1 is written.
//! - **Certificates and CSRs**: PEM, or raw DER when a file holds no PEM block.
//!
//! ## Quick Start
//!
//! ### Creating a CA and a Server Certificate
//!
//! ```rust,no_run
//! use selfcert::{
//!     ca::{self, CaParams},
//!     cert::{extensions::SubjectAltName, params::DistinguishedName},
//!     server::{self, ServerParams},
//! };
//!
//! # fn main() -> Result<(), selfcert::error::SelfCertError> {
//! let ca = ca::create(
//!     &CaParams::builder()
//!         .subject(
//!             DistinguishedName::builder()
//!                 .common_name("Example CA".to_string())
//!                 .country(vec!["JP".to_string()])
//!                 .build(),
//!         )
//!         .build(),
//! )?;
//!
//! let server = server::issue_new(
//!     &ca,
//!     &ServerParams::builder()
//!         .serial_number(2)
//!         .subject(
//!             DistinguishedName::builder()
//!                 .common_name("www.example.jp".to_string())
//!                 .build(),
//!         )
//!         .subject_alt_names(SubjectAltName {
//!             dns_names: vec!["www.example.jp".to_string()],
//!             ..Default::default()
//!         })
//!         .build(),
//! )?;
//!
//! println!("{}", server.cert.to_pem()?);
//! println!("{}", server.key.to_pkcs1_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Signing a Certificate Request
//!
//! ```rust,no_run
//! use selfcert::{cert::CertificateWithPrivateKey, csr::CertificateRequest, server};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ca = CertificateWithPrivateKey::load(
//!     &std::fs::read("ca.crt")?,
//!     &std::fs::read_to_string("ca.key")?,
//! )?;
//! let csr = CertificateRequest::from_pem_or_der(&std::fs::read("server.csr")?)?;
//! let cert = server::issue_from_csr(&ca, &csr, &server::CsrParams::builder().build())?;
//! std::fs::write("server.crt", cert.to_pem()?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use selfcert::{error::SelfCertError, key::KeyPair};
//!
//! match KeyPair::import_from_pem("invalid pem data") {
//!     Ok(_) => println!("Key imported successfully"),
//!     Err(SelfCertError::DecodingError(msg)) => println!("Failed to decode key: {}", msg),
//!     Err(SelfCertError::InvalidInput(msg)) => println!("Invalid input: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`ca`]: Creating and updating the self-signed CA
//! - [`server`]: Issuing server certificates from new keys or CSRs
//! - [`csr`]: Certificate signing request decoding, verification and creation
//! - [`key`]: RSA key generation, import/export, signing and verification
//! - [`cert`]: Certificate encoding/decoding, extensions, names and serials
//! - [`issuer`]: The signing step shared by every issuance path
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level certificate structure manipulation
//! - [`pem_utils`]: PEM block helpers

pub mod ca;
pub mod cert;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod pem_utils;
pub mod server;
pub mod tbs_certificate;
