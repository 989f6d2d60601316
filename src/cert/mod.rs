pub mod extensions;
pub mod params;
pub mod serial;

use const_oid::ObjectIdentifier;
use der::asn1::Any;
use der::{Decode, Encode, EncodePem};
use extensions::{SubjectAltName, SubjectKeyIdentifier, ToAndFromX509Extension};
use params::{CertificationRequestInfo, ExtensionParam, Validity};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::error::{Result, SelfCertError};
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils;
use crate::tbs_certificate::TbsCertificate;

const SHA1_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const SHA256_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

/// Represents the supported signature algorithms for certificates.
///
/// Certificates are always signed with SHA-256; the other digests are only
/// accepted when verifying signatures made elsewhere, such as on a CSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-1 with RSA encryption.
    Sha1WithRSA,
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-384 with RSA encryption.
    Sha384WithRSA,
    /// SHA-512 with RSA encryption.
    Sha512WithRSA,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha1WithRSA => SHA1_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithRSA => SHA256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha384WithRSA => SHA384_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha512WithRSA => SHA512_WITH_RSA_ENCRYPTION,
        }
    }

    /// Determines the signature algorithm from its OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Result<Self> {
        match *oid {
            SHA1_WITH_RSA_ENCRYPTION => Ok(Self::Sha1WithRSA),
            SHA256_WITH_RSA_ENCRYPTION => Ok(Self::Sha256WithRSA),
            SHA384_WITH_RSA_ENCRYPTION => Ok(Self::Sha384WithRSA),
            SHA512_WITH_RSA_ENCRYPTION => Ok(Self::Sha512WithRSA),
            _ => Err(SelfCertError::Unsupported(format!(
                "signature algorithm {oid}"
            ))),
        }
    }
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// PKCS#1 v1.5 identifiers carry an explicit NULL parameter (RFC 4055).
    fn from(value: SignatureAlgorithm) -> Self {
        x509_cert::spki::AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters: Some(Any::null()),
        }
    }
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM formats.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| SelfCertError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| SelfCertError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)?;
        Ok(Certificate { inner })
    }

    /// Decodes the first `CERTIFICATE` PEM block of `input`, or `input`
    /// itself as DER when it holds no such block.
    pub fn from_pem_or_der(input: &[u8]) -> Result<Self> {
        let der = pem_utils::first_block_or_der(input, pem_utils::CERTIFICATE_LABEL);
        Self::from_der(&der).map_err(|e| {
            SelfCertError::DecodingError(format!("invalid certificate: {e}"))
        })
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.inner.tbs_certificate.serial_number
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    /// The decoded to-be-signed portion.
    pub fn tbs(&self) -> Result<TbsCertificate> {
        TbsCertificate::from_tbs_certificate_inner(&self.inner.tbs_certificate)
    }

    pub fn validity(&self) -> Validity {
        let validity = &self.inner.tbs_certificate.validity;
        Validity {
            not_before: crate::tbs_certificate::from_x509_time(&validity.not_before),
            not_after: crate::tbs_certificate::from_x509_time(&validity.not_after),
        }
    }

    pub fn subject_public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(ExtensionParam::from_x509_extension)
            .collect()
    }

    /// Decodes the extension of type `E`, if the certificate carries one.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<(bool, E)>> {
        self.extensions()
            .iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.to_extension::<E>().map(|decoded| (ext.critical, decoded)))
            .transpose()
    }

    /// The subject key identifier, if present. A malformed extension is an
    /// error rather than a missing identifier.
    pub fn subject_key_identifier(&self) -> Result<Option<Vec<u8>>> {
        Ok(self
            .extension::<SubjectKeyIdentifier>()?
            .map(|(_, ski)| ski.0))
    }

    pub fn subject_alt_names(&self) -> Result<SubjectAltName> {
        Ok(self
            .extension::<SubjectAltName>()?
            .map(|(_, san)| san)
            .unwrap_or_default())
    }

    /// Checks the certificate signature against `issuer_key`.
    pub fn verify_signature(&self, issuer_key: &PublicKey) -> Result<()> {
        let algorithm = SignatureAlgorithm::from_oid(&self.inner.signature_algorithm.oid)?;
        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            SelfCertError::InvalidSignature("signature has unused bits".to_string())
        })?;
        issuer_key.verify(&algorithm, &tbs, signature)
    }

    /// Creates a new self-signed certificate.
    ///
    /// # Arguments
    /// * `cert_info` - The certification request information.
    /// * `key` - The key pair used to sign the certificate.
    /// * `validity` - The validity period.
    pub fn new_self_signed(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        validity: Validity,
    ) -> Result<Self> {
        if cert_info.subject_public_key != PublicKey::from_key_pair(key) {
            return Err(SelfCertError::KeyMismatch);
        }

        // For self-signed certificates, the issuer is the same as the subject
        let self_issuer = SelfIssuer {
            name: cert_info.subject.clone(),
            key,
        };

        self_issuer.issue(cert_info, validity)
    }
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: Name,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Name {
        self.name.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn key_identifier(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// A certificate together with the private key matching its public key.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl CertificateWithPrivateKey {
    /// Pairs a certificate with a private key, checking that they belong
    /// together.
    pub fn new(cert: Certificate, key: KeyPair) -> Result<Self> {
        if cert.subject_public_key()? != PublicKey::from_key_pair(&key) {
            return Err(SelfCertError::KeyMismatch);
        }
        Ok(Self { cert, key })
    }

    /// Loads a certificate (PEM or DER) and a PEM private key.
    pub fn load(cert_input: &[u8], key_pem: &str) -> Result<Self> {
        let cert = Certificate::from_pem_or_der(cert_input)?;
        let key = KeyPair::import_from_pem(key_pem)?;
        Self::new(cert, key)
    }
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Name {
        // The name of the issuer is the subject of the certificate
        self.cert.subject().clone()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn key_identifier(&self) -> Result<Option<Vec<u8>>> {
        self.cert.subject_key_identifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{BasicConstraints, KeyUsage, KeyUsages};
    use crate::cert::params::DistinguishedName;

    fn self_signed(key: &KeyPair) -> Certificate {
        let cert_info = CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("Test CA".to_string())
                    .build()
                    .as_x509_name()
                    .unwrap(),
            )
            .subject_public_key(PublicKey::from_key_pair(key))
            .serial_number(serial::from_u64(7).unwrap())
            .is_ca(true)
            .build();
        Certificate::new_self_signed(&cert_info, key, Validity::for_days(30).unwrap()).unwrap()
    }

    #[test]
    fn test_self_signed_ca() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let cert = self_signed(&key);

        assert_eq!(cert.subject(), cert.issuer());
        assert_eq!(serial::magnitude(cert.serial_number()), vec![7]);
        cert.verify_signature(&PublicKey::from_key_pair(&key)).unwrap();

        let (critical, bc) = cert.extension::<BasicConstraints>().unwrap().unwrap();
        assert!(critical);
        assert!(bc.is_ca);
        let (critical, ku) = cert.extension::<KeyUsage>().unwrap().unwrap();
        assert!(critical);
        assert_eq!(
            ku.0,
            KeyUsages::DigitalSignature | KeyUsages::KeyCertSign | KeyUsages::CRLSign
        );
        assert_eq!(
            cert.subject_key_identifier().unwrap(),
            Some(PublicKey::from_key_pair(&key).key_identifier().unwrap())
        );
        // Self-signed: no authority key identifier.
        assert!(
            cert.extension::<extensions::AuthorityKeyIdentifier>()
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_pem_round_trip() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let cert = self_signed(&key);
        let pem = cert.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));

        let decoded = Certificate::from_pem_or_der(pem.as_bytes()).unwrap();
        assert_eq!(decoded.to_der().unwrap(), cert.to_der().unwrap());
        let decoded = Certificate::from_pem_or_der(&cert.to_der().unwrap()).unwrap();
        assert_eq!(decoded.to_der().unwrap(), cert.to_der().unwrap());
    }

    #[test]
    fn test_signature_algorithm_has_null_parameters() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let cert = self_signed(&key);
        let algorithm = &cert.inner.signature_algorithm;
        assert_eq!(algorithm.oid, SHA256_WITH_RSA_ENCRYPTION);
        assert_eq!(algorithm.parameters, Some(Any::null()));
        assert_eq!(cert.inner.tbs_certificate.signature, *algorithm);
    }

    #[test]
    fn test_key_mismatch_is_detected() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let other = KeyPair::generate_rsa(1024).unwrap();
        let cert = self_signed(&key);

        assert!(matches!(
            CertificateWithPrivateKey::new(cert.clone(), other.clone()),
            Err(SelfCertError::KeyMismatch)
        ));
        assert!(cert.verify_signature(&PublicKey::from_key_pair(&other)).is_err());

        let pem = other.to_pkcs1_pem().unwrap();
        assert!(matches!(
            CertificateWithPrivateKey::load(cert.to_pem().unwrap().as_bytes(), &pem),
            Err(SelfCertError::KeyMismatch)
        ));
    }

    #[test]
    fn test_garbage_certificate() {
        assert!(matches!(
            Certificate::from_pem_or_der(b"definitely not a certificate"),
            Err(SelfCertError::DecodingError(_))
        ));
    }
}
