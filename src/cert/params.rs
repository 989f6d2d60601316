use bon::Builder;
use const_oid::ObjectIdentifier;
use der::{Tag, Tagged};
use der::asn1::{Any, OctetString, SetOfVec, Utf8StringRef};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;

use super::extensions::SubjectAltName;
use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsage;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::error::SelfCertError;
use crate::key::PublicKey;

/// Parameters for building an X.509 certificate.
///
/// This struct contains the subject, public key, and optional extensions for the certificate.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `serial_number` - The serial number the issuer assigns.
/// * `usages` - A list of extended key usage options.
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `subject_alt_names` - Names placed in the Subject Alternative Name extension.
/// * `extensions` - Additional X.509 extensions.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: Name,
    pub subject_public_key: PublicKey,
    pub serial_number: SerialNumber,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub is_ca: bool,
    #[builder(default)]
    pub subject_alt_names: SubjectAltName,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const PROVINCE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Distinguished name parameters for building an X.509 certificate.
///
/// This struct represents the subject or issuer name in a certificate. Every
/// attribute but the common name may repeat.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The countries (C).
/// * `province` - The states or provinces (ST).
/// * `locality` - The localities or cities (L).
/// * `organization` - The organizations (O).
/// * `organizational_unit` - The organizational units (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: Option<String>,
    #[builder(default)]
    pub country: Vec<String>,
    #[builder(default)]
    pub province: Vec<String>,
    #[builder(default)]
    pub locality: Vec<String>,
    #[builder(default)]
    pub organization: Vec<String>,
    #[builder(default)]
    pub organizational_unit: Vec<String>,
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// Attributes are written in C, ST, L, O, OU, CN order, one RDN per
    /// value. Values are PrintableStrings when the character set allows it
    /// and UTF8Strings otherwise.
    pub fn as_x509_name(&self) -> Result<Name, SelfCertError> {
        let common_name: Vec<String> = self
            .common_name
            .iter()
            .filter(|cn| !cn.is_empty())
            .cloned()
            .collect();
        let attributes = [
            (COUNTRY, &self.country),
            (PROVINCE, &self.province),
            (LOCALITY, &self.locality),
            (ORGANIZATION, &self.organization),
            (ORGANIZATIONAL_UNIT, &self.organizational_unit),
            (COMMON_NAME, &common_name),
        ];

        let mut rdns = Vec::new();
        for (oid, values) in attributes {
            for value in values.iter().filter(|v| !v.is_empty()) {
                rdns.push(single_valued_rdn(oid, value)?);
            }
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attribute types other than the six above are skipped.
    pub fn from_x509_name(x509dn: &Name) -> Self {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Some(value) = attribute_string(&attr.value) else {
                    continue;
                };
                match attr.oid {
                    COUNTRY => dn.country.push(value),
                    PROVINCE => dn.province.push(value),
                    LOCALITY => dn.locality.push(value),
                    ORGANIZATION => dn.organization.push(value),
                    ORGANIZATIONAL_UNIT => dn.organizational_unit.push(value),
                    COMMON_NAME => dn.common_name = Some(value),
                    _ => {}
                }
            }
        }

        dn
    }
}

fn single_valued_rdn(
    oid: ObjectIdentifier,
    value: &str,
) -> Result<RelativeDistinguishedName, SelfCertError> {
    let value = if value.chars().all(is_printable) {
        Any::new(Tag::PrintableString, value.as_bytes())?
    } else {
        Any::encode_from(&Utf8StringRef::new(value)?)?
    };
    let set = SetOfVec::try_from(vec![AttributeTypeAndValue { oid, value }])?;
    Ok(RelativeDistinguishedName(set))
}

/// PrintableString repertoire, widened with `*` and `&` so wildcard and
/// company names stay printable as other X.509 encoders write them.
fn is_printable(c: char) -> bool {
    c.is_ascii_alphanumeric() || " '()+,-./:=?*&".contains(c)
}

fn attribute_string(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::PrintableString | Tag::Utf8String | Tag::Ia5String | Tag::TeletexString => {
            Some(String::from_utf8_lossy(value.value()).into_owned())
        }
        _ => None,
    }
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    ///
    /// # Arguments
    /// * `days` - The number of days for the validity period; must not be zero.
    pub fn for_days(days: u32) -> Result<Self, SelfCertError> {
        check_days(days)?;
        let now = OffsetDateTime::now_utc();
        Ok(Self {
            not_before: now,
            not_after: add_days(now, days)?,
        })
    }

    /// Moves `not_after` later by the given number of days.
    pub fn extend_by_days(&mut self, days: u32) -> Result<(), SelfCertError> {
        check_days(days)?;
        self.not_after = add_days(self.not_after, days)?;
        Ok(())
    }
}

fn add_days(from: OffsetDateTime, days: u32) -> Result<OffsetDateTime, SelfCertError> {
    from.checked_add(Duration::days(i64::from(days)))
        .filter(|end| end.year() <= 9999)
        .ok_or_else(|| {
            SelfCertError::InvalidInput(format!("{days} days runs past the year 9999"))
        })
}

fn check_days(days: u32) -> Result<(), SelfCertError> {
    if days == 0 {
        return Err(SelfCertError::InvalidInput(
            "days must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: E,
        critical: bool,
    ) -> Result<Self, SelfCertError> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E, SelfCertError> {
        E::from_x509_extension_value(&self.value)
    }

    pub fn from_x509_extension(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }

    pub fn to_x509_extension(&self) -> Result<x509_cert::ext::Extension, SelfCertError> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: OctetString::new(self.value.clone())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinguished_name_round_trip() {
        let dn = DistinguishedName::builder()
            .common_name("server.example.jp".to_string())
            .country(vec!["JP".to_string()])
            .organization(vec!["Example Corp".to_string(), "Second Org".to_string()])
            .organizational_unit(vec!["開発部".to_string()])
            .build();

        let name = dn.as_x509_name().unwrap();
        assert_eq!(name.0.len(), 5);
        assert_eq!(DistinguishedName::from_x509_name(&name), dn);
    }

    #[test]
    fn test_string_types() {
        let dn = DistinguishedName::builder()
            .country(vec!["JP".to_string()])
            .organizational_unit(vec!["開発部".to_string()])
            .build();
        let name = dn.as_x509_name().unwrap();
        let tags: Vec<Tag> = name
            .0
            .iter()
            .flat_map(|rdn| rdn.0.iter().map(|atv| atv.value.tag()))
            .collect();
        assert_eq!(tags, vec![Tag::PrintableString, Tag::Utf8String]);
    }

    #[test]
    fn test_wildcard_and_ampersand_stay_printable() {
        let dn = DistinguishedName::builder()
            .common_name("*.example.jp".to_string())
            .organization(vec!["Smith & Co".to_string()])
            .locality(vec!["a@b".to_string()])
            .build();
        let name = dn.as_x509_name().unwrap();
        let tags: Vec<Tag> = name
            .0
            .iter()
            .flat_map(|rdn| rdn.0.iter().map(|atv| atv.value.tag()))
            .collect();
        assert_eq!(
            tags,
            vec![Tag::Utf8String, Tag::PrintableString, Tag::PrintableString]
        );
        assert_eq!(DistinguishedName::from_x509_name(&name), dn);
    }

    #[test]
    fn test_empty_values_are_omitted() {
        let dn = DistinguishedName::builder()
            .common_name(String::new())
            .country(vec![String::new()])
            .build();
        assert!(dn.as_x509_name().unwrap().0.is_empty());
    }

    #[test]
    fn test_attribute_order() {
        let dn = DistinguishedName::builder()
            .common_name("cn".to_string())
            .organization(vec!["o".to_string()])
            .country(vec!["JP".to_string()])
            .build();
        let oids: Vec<ObjectIdentifier> = dn
            .as_x509_name()
            .unwrap()
            .0
            .iter()
            .map(|rdn| rdn.0.iter().next().unwrap().oid)
            .collect();
        assert_eq!(oids, vec![COUNTRY, ORGANIZATION, COMMON_NAME]);
    }

    #[test]
    fn test_validity_requires_days() {
        assert!(Validity::for_days(0).is_err());

        let mut validity = Validity::for_days(1).unwrap();
        assert_eq!(validity.not_after - validity.not_before, Duration::days(1));
        validity.extend_by_days(30).unwrap();
        assert_eq!(validity.not_after - validity.not_before, Duration::days(31));
    }

    #[test]
    fn test_validity_stops_at_year_9999() {
        assert!(matches!(
            Validity::for_days(4_000_000),
            Err(SelfCertError::InvalidInput(_))
        ));
        assert!(matches!(
            Validity::for_days(u32::MAX),
            Err(SelfCertError::InvalidInput(_))
        ));

        let mut validity = Validity::for_days(365).unwrap();
        let before = validity.clone();
        assert!(matches!(
            validity.extend_by_days(4_000_000),
            Err(SelfCertError::InvalidInput(_))
        ));
        assert_eq!(validity, before);

        let last_day = time::Date::from_calendar_date(9999, time::Month::December, 30)
            .unwrap()
            .midnight()
            .assume_utc();
        let mut validity = Validity {
            not_before: last_day,
            not_after: last_day,
        };
        validity.extend_by_days(1).unwrap();
        assert_eq!(validity.not_after.year(), 9999);
        assert!(validity.extend_by_days(2).is_err());
    }
}
