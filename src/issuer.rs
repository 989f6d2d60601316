use der::flagset::FlagSet;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::AuthorityKeyIdentifier;
use crate::cert::extensions::BasicConstraints;
use crate::cert::extensions::ExtendedKeyUsage;
use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::cert::extensions::KeyUsage;
use crate::cert::extensions::KeyUsages;
use crate::cert::extensions::SubjectKeyIdentifier;
use crate::cert::params::Validity;
use crate::cert::params::{CertificationRequestInfo, ExtensionParam};
use crate::cert::serial;
use crate::error::Result;
use crate::key::KeyPair;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the issuer's subject key identifier, if it has one.
    fn key_identifier(&self) -> Result<Option<Vec<u8>>>;

    /// Issues a certificate based on the provided certification request information.
    ///
    /// # Arguments
    /// * `cert_request` - The certification request information containing details about the certificate to be issued.
    /// * `validity` - The validity period of the issued certificate.
    ///
    /// # Returns
    /// A `Certificate` signed with sha256WithRSAEncryption by the issuer's key.
    fn issue(
        &self,
        cert_request: &CertificationRequestInfo,
        validity: Validity,
    ) -> Result<Certificate> {
        let issuer_dn = self.issuer_name();
        let mut extensions: Vec<ExtensionParam> = Vec::new();

        let mut key_usage_flags: FlagSet<KeyUsages> = FlagSet::default();

        if cert_request.is_ca {
            key_usage_flags |= KeyUsages::DigitalSignature;
            key_usage_flags |= KeyUsages::KeyCertSign;
            key_usage_flags |= KeyUsages::CRLSign;
        }

        for usage in &cert_request.usages {
            match usage {
                ExtendedKeyUsageOption::ServerAuth | ExtendedKeyUsageOption::ClientAuth => {
                    key_usage_flags |= KeyUsages::DigitalSignature;
                }
            }
        }

        if !key_usage_flags.is_empty() {
            extensions.push(ExtensionParam::from_extension(
                KeyUsage(key_usage_flags),
                true,
            )?);
        }

        if !cert_request.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: cert_request.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
        }

        if cert_request.is_ca {
            let basic_constraints = BasicConstraints {
                is_ca: true,
                max_path_length: None,
            };
            extensions.push(ExtensionParam::from_extension(basic_constraints, true)?);

            let subject_key_id = cert_request.subject_public_key.key_identifier()?;
            extensions.push(ExtensionParam::from_extension(
                SubjectKeyIdentifier(subject_key_id),
                false,
            )?);
        }

        if cert_request.subject != issuer_dn {
            if let Some(key_identifier) = self.key_identifier()? {
                extensions.push(ExtensionParam::from_extension(
                    AuthorityKeyIdentifier { key_identifier },
                    false,
                )?);
            }
        }

        if !cert_request.subject_alt_names.is_empty() {
            // With an empty subject the SAN carries the identity and must be critical.
            let critical = cert_request.subject.0.is_empty();
            extensions.push(ExtensionParam::from_extension(
                cert_request.subject_alt_names.clone(),
                critical,
            )?);
        }

        extensions.extend(cert_request.extensions.iter().cloned());

        let tbs_cert = TbsCertificate {
            serial_number: cert_request.serial_number.clone(),
            signature_algorithm: SignatureAlgorithm::Sha256WithRSA,
            issuer: issuer_dn,
            validity,
            subject: cert_request.subject.clone(),
            subject_public_key: cert_request.subject_public_key.clone(),
            extensions,
        };
        tracing::debug!(
            subject = %tbs_cert.subject,
            issuer = %tbs_cert.issuer,
            extensions = tbs_cert.extensions.len(),
            "signing certificate"
        );

        let certificate = tbs_cert.sign(self.signing_key())?;
        tracing::info!(
            subject = %certificate.subject(),
            serial = %serial::to_hex(certificate.serial_number()),
            not_after = %tbs_cert.validity.not_after,
            "issued certificate"
        );
        Ok(certificate)
    }
}
