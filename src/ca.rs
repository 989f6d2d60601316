//! Self-signed certificate authority creation and maintenance.

use bon::Builder;

use crate::cert::params::{CertificationRequestInfo, DistinguishedName, Validity};
use crate::cert::{Certificate, CertificateWithPrivateKey, serial};
use crate::error::Result;
use crate::key::{KeyPair, PublicKey};

/// Parameters for a new certificate authority.
#[derive(Clone, Debug, Builder)]
pub struct CaParams {
    #[builder(default = 1)]
    pub serial_number: u64,
    #[builder(default = 2048)]
    pub bits: usize,
    #[builder(default = 365)]
    pub days: u32,
    #[builder(default)]
    pub subject: DistinguishedName,
}

/// Generates a fresh RSA key and a self-signed CA certificate for it.
pub fn create(params: &CaParams) -> Result<CertificateWithPrivateKey> {
    let serial_number = serial::from_u64(params.serial_number)?;
    let validity = Validity::for_days(params.days)?;
    let subject = params.subject.as_x509_name()?;
    let key = KeyPair::generate_rsa(params.bits)?;

    let cert_info = CertificationRequestInfo::builder()
        .subject(subject)
        .subject_public_key(PublicKey::from_key_pair(&key))
        .serial_number(serial_number)
        .is_ca(true)
        .build();

    let cert = Certificate::new_self_signed(&cert_info, &key, validity)?;
    Ok(CertificateWithPrivateKey { cert, key })
}

/// A field of an existing CA certificate that [`update`] can change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaUpdateField {
    /// Increment the serial number by one.
    Serial,
    /// Push `notAfter` later by the configured number of days.
    After,
}

/// Re-signs a CA certificate after applying `fields` in order.
///
/// Everything not named by a field is carried over verbatim, extensions
/// included. With no fields the certificate is simply re-signed.
pub fn update(
    ca: &CertificateWithPrivateKey,
    fields: &[CaUpdateField],
    days: u32,
) -> Result<CertificateWithPrivateKey> {
    let mut tbs = ca.cert.tbs()?;
    for field in fields {
        match field {
            CaUpdateField::Serial => {
                tbs.serial_number = serial::increment(&tbs.serial_number)?;
            }
            CaUpdateField::After => tbs.validity.extend_by_days(days)?,
        }
    }

    let cert = tbs.sign(&ca.key)?;
    tracing::info!(
        subject = %cert.subject(),
        serial = %serial::to_hex(cert.serial_number()),
        not_after = %tbs.validity.not_after,
        ?fields,
        "updated certificate authority"
    );
    Ok(CertificateWithPrivateKey {
        cert,
        key: ca.key.clone(),
    })
}
