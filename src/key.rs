use const_oid::{AssociatedOid, ObjectIdentifier};
use pkcs8::LineEnding;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs1v15::{
    Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey,
};
use der::Decode;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer as RsaSigner, Verifier as RsaVerifier};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::error::{Result, SelfCertError};

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// Smallest modulus accepted for freshly generated keys.
pub const MIN_RSA_BITS: usize = 1024;
/// Largest modulus generated or accepted in a certificate or request.
/// `rsa` stops at 4096 bits by default, which would lock out 8192-bit CAs.
pub const MAX_RSA_BITS: usize = 16384;

/// PEM label of a PKCS#1 `RSAPrivateKey`.
pub const PKCS1_PEM_LABEL: &str = "RSA PRIVATE KEY";
/// PEM label of a PKCS#8 `PrivateKeyInfo`.
pub const PKCS8_PEM_LABEL: &str = "PRIVATE KEY";

/// An RSA key pair used to sign certificates and requests.
#[derive(Clone, Debug)]
pub struct KeyPair {
    private: Box<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        if !(MIN_RSA_BITS..=MAX_RSA_BITS).contains(&bits) {
            return Err(SelfCertError::InvalidInput(format!(
                "RSA key length {bits} is outside {MIN_RSA_BITS}..={MAX_RSA_BITS} bits"
            )));
        }
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| SelfCertError::KeyGenerationError(e.to_string()))?;
        tracing::debug!(bits, "generated RSA key pair");
        Ok(Self::from_private_key(private))
    }

    /// Wraps an existing RSA private key.
    pub fn from_private_key(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair {
            private: Box::new(private),
            public,
        }
    }

    /// Imports a private key from PEM.
    ///
    /// The first PEM block decides the format: `RSA PRIVATE KEY` is read as
    /// PKCS#1, `PRIVATE KEY` as PKCS#8 (which must then carry an RSA key).
    pub fn import_from_pem(pem_str: &str) -> Result<Self> {
        let block = pem::parse(pem_str)?;
        match block.tag() {
            PKCS1_PEM_LABEL => Self::import_from_pkcs1_der(block.contents()),
            PKCS8_PEM_LABEL => Self::import_from_pkcs8_der(block.contents()),
            other => Err(SelfCertError::InvalidInput(format!(
                "unsupported private key type {other}"
            ))),
        }
    }

    /// Imports a PKCS#1 DER-encoded RSA private key.
    pub fn import_from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_der(der)?;
        Ok(Self::from_private_key(private))
    }

    /// Imports a PKCS#8 DER-encoded private key, rejecting anything but RSA.
    pub fn import_from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::try_from(der)?;
        if info.algorithm.oid != RSA_ENCRYPTION {
            return Err(SelfCertError::InvalidInput(
                "not an RSA private key".to_string(),
            ));
        }
        let private = RsaPrivateKey::from_pkcs8_der(der)?;
        Ok(Self::from_private_key(private))
    }

    /// Encodes the private key as a PKCS#1 `RSA PRIVATE KEY` PEM block.
    pub fn to_pkcs1_pem(&self) -> Result<String> {
        let pem = self.private.to_pkcs1_pem(LineEnding::LF)?;
        Ok(pem.to_string())
    }

    /// Returns the public half as a `SubjectPublicKeyInfo`.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        PublicKey::from_key_pair(self).to_x509spki()
    }

    /// Modulus length in bits.
    pub fn bits(&self) -> usize {
        rsa::traits::PublicKeyParts::size(&self.public) * 8
    }

    /// Signs `data` with RSASSA-PKCS1-v1_5 over SHA-256.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_key: RsaSigningKey<Sha256> = RsaSigningKey::new((*self.private).clone());
        let signature = signing_key
            .try_sign(data)
            .map_err(|e| SelfCertError::RsaError(e.to_string()))?;
        Ok(signature.to_vec())
    }
}

/// The public key of a certificate subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(pub RsaPublicKey);

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        PublicKey(key_pair.public.clone())
    }

    /// Reads an RSA key out of a `SubjectPublicKeyInfo`.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        if spki.algorithm.oid != RSA_ENCRYPTION {
            return Err(SelfCertError::Unsupported(format!(
                "public key algorithm {}",
                spki.algorithm.oid
            )));
        }
        let bits = spki.subject_public_key.as_bytes().ok_or_else(|| {
            SelfCertError::DecodingError("public key has unused bits".to_string())
        })?;
        let key = rsa::pkcs1::RsaPublicKey::from_der(bits)?;
        let public = RsaPublicKey::new_with_max_size(
            BigUint::from_bytes_be(key.modulus.as_bytes()),
            BigUint::from_bytes_be(key.public_exponent.as_bytes()),
            MAX_RSA_BITS,
        )?;
        Ok(PublicKey(public))
    }

    pub fn to_x509spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        SubjectPublicKeyInfoOwned::from_key(self.0.clone())
            .map_err(|e| SelfCertError::EncodingError(e.to_string()))
    }

    /// SHA-1 of the subjectPublicKey bits, as used for subject and authority
    /// key identifiers.
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        let spki = self.to_x509spki()?;
        Ok(key_identifier_of(&spki))
    }

    /// Verifies an RSASSA-PKCS1-v1_5 signature made with `algorithm`.
    pub fn verify(
        &self,
        algorithm: &SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        match algorithm {
            SignatureAlgorithm::Sha1WithRSA => verify_with::<Sha1>(&self.0, message, signature),
            SignatureAlgorithm::Sha256WithRSA => {
                verify_with::<Sha256>(&self.0, message, signature)
            }
            SignatureAlgorithm::Sha384WithRSA => {
                verify_with::<Sha384>(&self.0, message, signature)
            }
            SignatureAlgorithm::Sha512WithRSA => {
                verify_with::<Sha512>(&self.0, message, signature)
            }
        }
    }
}

pub(crate) fn key_identifier_of(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    <Sha1 as Digest>::digest(spki.subject_public_key.raw_bytes()).to_vec()
}

fn verify_with<D>(key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> Result<()>
where
    D: Digest + AssociatedOid,
{
    let verifying_key = RsaVerifyingKey::<D>::new(key.clone());
    let signature = RsaSignature::try_from(signature)
        .map_err(|e| SelfCertError::InvalidSignature(e.to_string()))?;
    verifying_key
        .verify(message, &signature)
        .map_err(|e| SelfCertError::InvalidSignature(e.to_string()))
}
