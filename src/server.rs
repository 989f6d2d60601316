//! Server certificates issued by a CA, either for a fresh key pair or for
//! the key carried by a certificate signing request.

use bon::Builder;

use crate::cert::extensions::{ExtendedKeyUsageOption, SubjectAltName};
use crate::cert::params::{CertificationRequestInfo, DistinguishedName, Validity};
use crate::cert::{Certificate, CertificateWithPrivateKey, serial};
use crate::csr::CertificateRequest;
use crate::error::Result;
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};

/// Parameters for a server certificate with a freshly generated key.
#[derive(Clone, Debug, Builder)]
pub struct ServerParams {
    #[builder(default = 1)]
    pub serial_number: u64,
    #[builder(default = 2048)]
    pub bits: usize,
    #[builder(default = 365)]
    pub days: u32,
    #[builder(default)]
    pub subject: DistinguishedName,
    #[builder(default)]
    pub subject_alt_names: SubjectAltName,
}

/// Parameters for a server certificate issued from a CSR.
#[derive(Clone, Debug, Builder)]
pub struct CsrParams {
    #[builder(default = 1)]
    pub serial_number: u64,
    #[builder(default = 365)]
    pub days: u32,
    /// Overrides the names requested by the CSR when non-empty.
    #[builder(default)]
    pub subject_alt_names: SubjectAltName,
}

/// Generates a key pair and issues a serverAuth certificate for it.
pub fn issue_new(
    ca: &CertificateWithPrivateKey,
    params: &ServerParams,
) -> Result<CertificateWithPrivateKey> {
    let serial_number = serial::from_u64(params.serial_number)?;
    let validity = Validity::for_days(params.days)?;
    let subject = params.subject.as_x509_name()?;
    let key = KeyPair::generate_rsa(params.bits)?;

    let request = CertificationRequestInfo::builder()
        .subject(subject)
        .subject_public_key(PublicKey::from_key_pair(&key))
        .serial_number(serial_number)
        .usages(vec![ExtendedKeyUsageOption::ServerAuth])
        .subject_alt_names(params.subject_alt_names.clone())
        .build();

    let cert = ca.issue(&request, validity)?;
    Ok(CertificateWithPrivateKey { cert, key })
}

/// Issues a serverAuth certificate for the subject and public key of `csr`.
///
/// The CSR signature is checked first. When `params` names no alternative
/// names, the ones requested in the CSR are used.
pub fn issue_from_csr(
    ca: &CertificateWithPrivateKey,
    csr: &CertificateRequest,
    params: &CsrParams,
) -> Result<Certificate> {
    csr.verify_signature()?;
    let serial_number = serial::from_u64(params.serial_number)?;
    let validity = Validity::for_days(params.days)?;

    let subject_alt_names = if params.subject_alt_names.is_empty() {
        csr.requested_subject_alt_names()?
    } else {
        params.subject_alt_names.clone()
    };

    let request = CertificationRequestInfo::builder()
        .subject(csr.subject().clone())
        .subject_public_key(csr.public_key()?)
        .serial_number(serial_number)
        .usages(vec![ExtendedKeyUsageOption::ServerAuth])
        .subject_alt_names(subject_alt_names)
        .build();

    ca.issue(&request, validity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::{self, CaParams};
    use crate::cert::extensions::{
        AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, FlagSet, KeyUsage, KeyUsages,
    };
    use crate::error::SelfCertError;

    fn ca() -> CertificateWithPrivateKey {
        ca::create(
            &CaParams::builder()
                .bits(1024)
                .subject(
                    DistinguishedName::builder()
                        .common_name("Server Test CA".to_string())
                        .build(),
                )
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_new() {
        let ca = ca();
        let params = ServerParams::builder()
            .serial_number(2)
            .bits(1024)
            .days(7)
            .subject(
                DistinguishedName::builder()
                    .common_name("www.example.jp".to_string())
                    .build(),
            )
            .subject_alt_names(SubjectAltName {
                dns_names: vec!["www.example.jp".to_string()],
                email_addresses: vec!["admin@example.jp".to_string()],
                uris: vec!["https://www.example.jp/".to_string()],
                ..Default::default()
            })
            .build();

        let server = issue_new(&ca, &params).unwrap();
        let cert = &server.cert;
        cert.verify_signature(&PublicKey::from_key_pair(&ca.key)).unwrap();
        assert_eq!(cert.subject_public_key().unwrap(), PublicKey::from_key_pair(&server.key));
        assert_eq!(cert.issuer(), ca.cert.subject());
        assert_eq!(cert.subject_alt_names().unwrap(), params.subject_alt_names);

        let (_, ku) = cert.extension::<KeyUsage>().unwrap().unwrap();
        assert_eq!(ku.0, FlagSet::from(KeyUsages::DigitalSignature));
        let (_, eku) = cert.extension::<ExtendedKeyUsage>().unwrap().unwrap();
        assert_eq!(eku.usage, vec![ExtendedKeyUsageOption::ServerAuth]);
        let (_, aki) = cert.extension::<AuthorityKeyIdentifier>().unwrap().unwrap();
        assert_eq!(Some(aki.key_identifier), ca.cert.subject_key_identifier().unwrap());
        assert!(cert.extension::<BasicConstraints>().unwrap().is_none());
    }

    #[test]
    fn test_issue_from_csr_uses_requested_names() {
        let ca = ca();
        let key = KeyPair::generate_rsa(1024).unwrap();
        let subject = DistinguishedName::builder()
            .common_name("api.example.jp".to_string())
            .organization(vec!["Example".to_string()])
            .build()
            .as_x509_name()
            .unwrap();
        let requested = SubjectAltName {
            dns_names: vec!["api.example.jp".to_string()],
            ..Default::default()
        };
        let csr = CertificateRequest::new_signed(subject.clone(), &key, &requested).unwrap();

        let cert = issue_from_csr(&ca, &csr, &CsrParams::builder().serial_number(3).build())
            .unwrap();
        assert_eq!(cert.subject(), &subject);
        assert_eq!(cert.subject_public_key().unwrap(), PublicKey::from_key_pair(&key));
        assert_eq!(cert.subject_alt_names().unwrap(), requested);

        let explicit = SubjectAltName {
            ip_addresses: vec!["2001:db8::1".parse().unwrap()],
            ..Default::default()
        };
        let cert = issue_from_csr(
            &ca,
            &csr,
            &CsrParams::builder()
                .subject_alt_names(explicit.clone())
                .build(),
        )
        .unwrap();
        assert_eq!(cert.subject_alt_names().unwrap(), explicit);
    }

    #[test]
    fn test_issue_from_csr_checks_signature() {
        let ca = ca();
        let key = KeyPair::generate_rsa(1024).unwrap();
        let mut csr =
            CertificateRequest::new_signed(Default::default(), &key, &SubjectAltName::default())
                .unwrap();
        csr.inner.info.subject = ca.cert.subject().clone();

        assert!(matches!(
            issue_from_csr(&ca, &csr, &CsrParams::builder().build()),
            Err(SelfCertError::InvalidSignature(_))
        ));
    }
}
