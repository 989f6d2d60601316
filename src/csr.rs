//! PKCS#10 certificate signing requests.

use const_oid::AssociatedOid;
use der::asn1::{Any, BitString, SetOfVec};
use der::{Decode, Encode};
use x509_cert::attr::Attribute;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq, Version};

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
use crate::cert::params::ExtensionParam;
use crate::error::{Result, SelfCertError};
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils;

/// A decoded certificate signing request.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub inner: CertReq,
}

impl CertificateRequest {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertReq::from_der(der)?;
        Ok(Self { inner })
    }

    /// Decodes the last `CERTIFICATE REQUEST` PEM block of `input`, or
    /// `input` itself as DER when it holds no such block.
    pub fn from_pem_or_der(input: &[u8]) -> Result<Self> {
        let der = pem_utils::last_block_or_der(input, pem_utils::CERTIFICATE_REQUEST_LABEL);
        Self::from_der(&der).map_err(|e| {
            SelfCertError::DecodingError(format!("invalid certificate request: {e}"))
        })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| SelfCertError::EncodingError(e.to_string()))
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(
            &self.to_der()?,
            pem_utils::CERTIFICATE_REQUEST_LABEL,
        ))
    }

    pub fn subject(&self) -> &Name {
        &self.inner.info.subject
    }

    /// The requested public key. Only RSA keys are supported.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.info.public_key)
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(&self.inner.algorithm.oid)
    }

    /// Checks that the request is signed by the private key matching the
    /// public key it carries.
    pub fn verify_signature(&self) -> Result<()> {
        let algorithm = self.signature_algorithm()?;
        let public_key = self.public_key()?;
        let info = self.inner.info.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            SelfCertError::InvalidSignature("signature has unused bits".to_string())
        })?;
        public_key.verify(&algorithm, &info, signature)?;
        tracing::debug!(subject = %self.subject(), ?algorithm, "certificate request signature verified");
        Ok(())
    }

    /// Extensions requested through the PKCS#9 extensionRequest attribute.
    pub fn requested_extensions(&self) -> Result<Vec<ExtensionParam>> {
        let mut extensions = Vec::new();
        for attribute in self.inner.info.attributes.iter() {
            if attribute.oid != ExtensionReq::OID {
                continue;
            }
            for value in attribute.values.iter() {
                let request = ExtensionReq::from_der(&value.to_der()?)?;
                extensions.extend(request.0.iter().map(ExtensionParam::from_x509_extension));
            }
        }
        Ok(extensions)
    }

    /// Subject alternative names requested by the CSR, empty when it asks for none.
    pub fn requested_subject_alt_names(&self) -> Result<SubjectAltName> {
        match self
            .requested_extensions()?
            .iter()
            .find(|ext| ext.oid == SubjectAltName::OID)
        {
            Some(ext) => ext.to_extension(),
            None => Ok(SubjectAltName::default()),
        }
    }

    /// Builds a request for `subject` and signs it with `key`
    /// (sha256WithRSAEncryption). Non-empty `alt_names` are requested
    /// through an extensionRequest attribute.
    pub fn new_signed(subject: Name, key: &KeyPair, alt_names: &SubjectAltName) -> Result<Self> {
        let mut attributes = Vec::new();
        if !alt_names.is_empty() {
            let san = ExtensionParam::from_extension(alt_names.clone(), false)?;
            let request = ExtensionReq(vec![san.to_x509_extension()?]);
            attributes.push(Attribute {
                oid: ExtensionReq::OID,
                values: SetOfVec::try_from(vec![Any::encode_from(&request)?])?,
            });
        }

        let info = CertReqInfo {
            version: Version::V1,
            subject,
            public_key: key.as_spki()?,
            attributes: SetOfVec::try_from(attributes)?,
        };
        let signature = key.sign_data(&info.to_der()?)?;

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: SignatureAlgorithm::Sha256WithRSA.into(),
                signature: BitString::from_bytes(&signature)
                    .map_err(|e| SelfCertError::EncodingError(e.to_string()))?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::DistinguishedName;

    fn subject() -> Name {
        DistinguishedName::builder()
            .common_name("csr.example.jp".to_string())
            .country(vec!["JP".to_string()])
            .build()
            .as_x509_name()
            .unwrap()
    }

    #[test]
    fn test_signed_request_verifies() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let csr = CertificateRequest::new_signed(subject(), &key, &SubjectAltName::default())
            .unwrap();

        csr.verify_signature().unwrap();
        assert_eq!(csr.public_key().unwrap(), PublicKey::from_key_pair(&key));
        assert_eq!(csr.subject(), &subject());
        assert!(csr.requested_extensions().unwrap().is_empty());
    }

    #[test]
    fn test_tampered_request_is_rejected() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let mut csr = CertificateRequest::new_signed(subject(), &key, &SubjectAltName::default())
            .unwrap();
        csr.inner.info.subject = Name::default();

        assert!(matches!(
            csr.verify_signature(),
            Err(SelfCertError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_requested_alt_names() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let alt_names = SubjectAltName {
            dns_names: vec!["www.example.jp".to_string()],
            ip_addresses: vec!["192.0.2.10".parse().unwrap()],
            ..Default::default()
        };
        let csr = CertificateRequest::new_signed(subject(), &key, &alt_names).unwrap();
        csr.verify_signature().unwrap();
        assert_eq!(csr.requested_subject_alt_names().unwrap(), alt_names);
    }

    #[test]
    fn test_pem_picks_last_request_block() {
        let first_key = KeyPair::generate_rsa(1024).unwrap();
        let second_key = KeyPair::generate_rsa(1024).unwrap();
        let first = CertificateRequest::new_signed(subject(), &first_key, &SubjectAltName::default())
            .unwrap();
        let second =
            CertificateRequest::new_signed(subject(), &second_key, &SubjectAltName::default())
                .unwrap();

        let bundle = format!("{}{}", first.to_pem().unwrap(), second.to_pem().unwrap());
        let decoded = CertificateRequest::from_pem_or_der(bundle.as_bytes()).unwrap();
        assert_eq!(decoded.public_key().unwrap(), PublicKey::from_key_pair(&second_key));

        let decoded = CertificateRequest::from_pem_or_der(&first.to_der().unwrap()).unwrap();
        assert_eq!(decoded.public_key().unwrap(), PublicKey::from_key_pair(&first_key));
    }

    #[test]
    fn test_unknown_signature_algorithm() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let mut csr = CertificateRequest::new_signed(subject(), &key, &SubjectAltName::default())
            .unwrap();
        // ecdsa-with-SHA256
        csr.inner.algorithm.oid = const_oid::ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
        assert!(matches!(
            csr.verify_signature(),
            Err(SelfCertError::Unsupported(_))
        ));
    }
}
