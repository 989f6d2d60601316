#![allow(dead_code)]

use selfcert::ca::{self, CaParams};
use selfcert::cert::CertificateWithPrivateKey;
use selfcert::cert::params::DistinguishedName;

pub fn ca_subject() -> DistinguishedName {
    DistinguishedName::builder()
        .common_name("myca.local".to_string())
        .country(vec!["JP".to_string()])
        .organization(vec!["My CA".to_string()])
        .build()
}

pub fn generate_ca_cert(bits: usize) -> CertificateWithPrivateKey {
    ca::create(
        &CaParams::builder()
            .bits(bits)
            .days(30)
            .subject(ca_subject())
            .build(),
    )
    .expect("CA creation should succeed")
}

pub fn server_subject(common_name: &str) -> DistinguishedName {
    DistinguishedName::builder()
        .common_name(common_name.to_string())
        .country(vec!["JP".to_string()])
        .build()
}
