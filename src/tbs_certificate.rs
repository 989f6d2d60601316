use der::Encode;
use der::asn1::{BitString, GeneralizedTime, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::{CertificateInner, TbsCertificateInner};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;

use crate::cert::params::{ExtensionParam, Validity};
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::error::{Result, SelfCertError};
use crate::key::{KeyPair, PublicKey};

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
#[derive(Clone, Debug)]
pub struct TbsCertificate {
    /// Certificate serial number
    pub serial_number: SerialNumber,
    /// Certificate signature algorithm
    pub signature_algorithm: SignatureAlgorithm,
    /// Certificate issuer distinguished name
    pub issuer: Name,
    /// Not before / not after
    pub validity: Validity,
    /// Certificate subject distinguished name
    pub subject: Name,
    /// Subject's public key
    pub subject_public_key: PublicKey,
    /// Certificate extensions
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509_extension)
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: self.serial_number.clone(),
            signature: self.signature_algorithm.clone().into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.to_x509spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            // An empty extensions field must be left out entirely.
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Creates a `TbsCertificate` from a `TbsCertificateInner`.
    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self> {
        let extensions = inner
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(ExtensionParam::from_x509_extension)
            .collect::<Vec<_>>();

        Ok(Self {
            serial_number: inner.serial_number.clone(),
            signature_algorithm: SignatureAlgorithm::from_oid(&inner.signature.oid)?,
            issuer: inner.issuer.clone(),
            validity: Validity {
                not_before: from_x509_time(&inner.validity.not_before),
                not_after: from_x509_time(&inner.validity.not_after),
            },
            subject: inner.subject.clone(),
            subject_public_key: PublicKey::from_x509spki(&inner.subject_public_key_info)?,
            extensions,
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }

    /// Signs the DER-encoded TBS with `key` and assembles the certificate.
    pub fn sign(&self, key: &KeyPair) -> Result<Certificate> {
        let tbs_certificate = self.to_tbs_certificate_inner()?;
        let signature = key.sign_data(&tbs_certificate.to_der()?)?;

        let inner = CertificateInner {
            tbs_certificate,
            signature_algorithm: self.signature_algorithm.clone().into(),
            signature: BitString::from_bytes(&signature)
                .map_err(|e| SelfCertError::EncodingError(e.to_string()))?,
        };
        Ok(Certificate { inner })
    }
}

/// Encodes a timestamp as UTCTime through 2049 and GeneralizedTime from 2050 on.
/// Sub-second precision is dropped.
pub fn to_x509_time(at: OffsetDateTime) -> Result<Time> {
    let at = at - time::Duration::nanoseconds(i64::from(at.nanosecond()));
    let system_time = std::time::SystemTime::from(at);
    let encoded = if at.year() < 2050 {
        Time::UtcTime(UtcTime::from_system_time(system_time)?)
    } else {
        Time::GeneralTime(GeneralizedTime::from_system_time(system_time)?)
    };
    Ok(encoded)
}

pub fn from_x509_time(at: &Time) -> OffsetDateTime {
    OffsetDateTime::from(at.to_system_time())
}
