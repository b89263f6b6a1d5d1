//! Certificate builder utilities.
//!
//! Small composable pieces used by the certificate authority: subject names,
//! serial numbers, validity windows, extensions, signing and PEM conversion.

use crate::crypto::rng::CheckedRng;
use crate::error::{DevCaError, Result};
use const_oid::db::{rfc4519, rfc5280, rfc5912};
use const_oid::ObjectIdentifier;
use der::asn1::{BitString, OctetString, PrintableStringRef, SetOfVec};
use der::{Any, DateTime, Decode, Encode, Tag};
use rand_core::CryptoRngCore;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::time::SystemTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::certificate::Certificate;
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::TbsCertificate;

/// PEM tag of an X.509 certificate.
pub const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Serial numbers are drawn uniformly from `[0, 2^SERIAL_NUMBER_BITS)`.
pub const SERIAL_NUMBER_BITS: u32 = 159;

const SERIAL_NUMBER_LEN: usize = 20;

/// Placeholder location attributes of a subject name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub country: String,
    pub province: String,
    pub locality: String,
    pub street_address: String,
    pub postal_code: String,
}

impl Location {
    /// Every field present but empty.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Obvious filler values for identities nobody will look up.
    pub fn placeholder() -> Self {
        Self {
            country: "Some Country".to_string(),
            province: "Some Province".to_string(),
            locality: "Some Locality".to_string(),
            street_address: "Some StreetAddress".to_string(),
            postal_code: "Some PostalCode".to_string(),
        }
    }
}

/// A certificate subject: common name, organizations and location fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub common_name: String,
    pub organizations: Vec<String>,
    pub location: Location,
}

impl Subject {
    /// Encode the subject as an X.501 name.
    ///
    /// RDNs are emitted in the order C, ST, L, STREET, POSTALCODE, O, CN.
    /// All organizations share one multi-valued RDN, which is left out when
    /// there are none. An empty common name is left out too.
    pub fn to_name(&self) -> Result<Name> {
        let mut rdns = vec![
            rdn(vec![printable_attribute(rfc4519::C, &self.location.country)?])?,
            rdn(vec![utf8_attribute(rfc4519::ST, &self.location.province)?])?,
            rdn(vec![utf8_attribute(rfc4519::L, &self.location.locality)?])?,
            rdn(vec![utf8_attribute(
                rfc4519::STREET,
                &self.location.street_address,
            )?])?,
            rdn(vec![utf8_attribute(
                rfc4519::POSTAL_CODE,
                &self.location.postal_code,
            )?])?,
        ];

        let mut organizations: Vec<&str> = Vec::new();
        for organization in &self.organizations {
            if !organizations.contains(&organization.as_str()) {
                organizations.push(organization);
            }
        }
        if !organizations.is_empty() {
            let attributes = organizations
                .into_iter()
                .map(|o| utf8_attribute(rfc4519::O, o))
                .collect::<Result<Vec<_>>>()?;
            rdns.push(rdn(attributes)?);
        }

        if !self.common_name.is_empty() {
            rdns.push(rdn(vec![utf8_attribute(rfc4519::CN, &self.common_name)?])?);
        }

        Ok(RdnSequence(rdns))
    }
}

fn utf8_attribute(oid: ObjectIdentifier, value: &str) -> Result<AttributeTypeAndValue> {
    let value = Any::new(Tag::Utf8String, value.as_bytes())
        .map_err(|e| DevCaError::CertificateError(format!("Invalid attribute value: {}", e)))?;
    Ok(AttributeTypeAndValue { oid, value })
}

fn printable_attribute(oid: ObjectIdentifier, value: &str) -> Result<AttributeTypeAndValue> {
    PrintableStringRef::new(value).map_err(|e| {
        DevCaError::ParseError(format!("Not a printable string '{}': {}", value, e))
    })?;
    let value = Any::new(Tag::PrintableString, value.as_bytes())
        .map_err(|e| DevCaError::CertificateError(format!("Invalid attribute value: {}", e)))?;
    Ok(AttributeTypeAndValue { oid, value })
}

// SET OF members are sorted into DER order.
fn rdn(attributes: Vec<AttributeTypeAndValue>) -> Result<RelativeDistinguishedName> {
    let attr_set = SetOfVec::try_from(attributes)
        .map_err(|e| DevCaError::CertificateError(format!("Failed to build RDN: {}", e)))?;

    Ok(RelativeDistinguishedName::from(attr_set))
}

/// Draw a serial number uniformly from `[0, 2^159)`.
pub fn generate_serial_number<R: CryptoRngCore>(rng: &mut R) -> Result<SerialNumber> {
    let mut bytes = [0u8; SERIAL_NUMBER_LEN];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| {
            DevCaError::RandomSourceError(format!("Failed to draw serial number: {}", e))
        })?;
    bytes[0] &= 0x7F;

    SerialNumber::new(minimal_positive(&bytes))
        .map_err(|e| DevCaError::CertificateError(format!("Failed to create serial number: {}", e)))
}

/// Trim `bytes` to the shortest big-endian form that still reads as a
/// non-negative DER INTEGER.
fn minimal_positive(bytes: &[u8]) -> &[u8] {
    let mut start = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    if start > 0 && bytes[start] & 0x80 != 0 {
        start -= 1;
    }
    &bytes[start..]
}

/// A validity window starting at `now` and ending `years` calendar years later.
///
/// Both bounds are truncated to whole seconds.
pub fn validity_years(now: SystemTime, years: u16) -> Result<Validity> {
    let not_before = DateTime::from_system_time(now)
        .map_err(|e| DevCaError::CertificateError(format!("Invalid start time: {}", e)))?;
    let not_after = add_years(not_before, years)?;

    Ok(Validity {
        not_before: to_time(not_before)?,
        not_after: to_time(not_after)?,
    })
}

/// Add calendar years, rolling Feb 29 over to Mar 1 in non-leap target years.
pub fn add_years(start: DateTime, years: u16) -> Result<DateTime> {
    let year = start
        .year()
        .checked_add(years)
        .ok_or_else(|| DevCaError::CertificateError("Validity end overflows".to_string()))?;

    let shifted = DateTime::new(
        year,
        start.month(),
        start.day(),
        start.hour(),
        start.minutes(),
        start.seconds(),
    );

    match shifted {
        Ok(end) => Ok(end),
        Err(_) if start.month() == 2 && start.day() == 29 => DateTime::new(
            year,
            3,
            1,
            start.hour(),
            start.minutes(),
            start.seconds(),
        )
        .map_err(|e| DevCaError::CertificateError(format!("Invalid end time: {}", e))),
        Err(e) => Err(DevCaError::CertificateError(format!(
            "Invalid end time: {}",
            e
        ))),
    }
}

// RFC 5280 4.1.2.5: UTCTime through 2049, GeneralizedTime from 2050 on.
fn to_time(datetime: DateTime) -> Result<Time> {
    if datetime.year() < 2050 {
        der::asn1::UtcTime::from_date_time(datetime)
            .map(Time::UtcTime)
            .map_err(|e| DevCaError::CertificateError(format!("Invalid UTC time: {}", e)))
    } else {
        Ok(Time::GeneralTime(der::asn1::GeneralizedTime::from_date_time(datetime)))
    }
}

/// Encode `value` as an X.509 extension.
pub fn extension<T: Encode>(oid: ObjectIdentifier, critical: bool, value: &T) -> Result<Extension> {
    let der = value
        .to_der()
        .map_err(|e| {
            DevCaError::CertificateError(format!("Failed to encode extension {}: {}", oid, e))
        })?;
    let extn_value = OctetString::new(der)
        .map_err(|e| {
            DevCaError::CertificateError(format!("Failed to wrap extension {}: {}", oid, e))
        })?;

    Ok(Extension {
        extn_id: oid,
        critical,
        extn_value,
    })
}

/// SubjectPublicKeyInfo for an RSA public key.
pub fn subject_public_key_info(public_key: &RsaPublicKey) -> Result<SubjectPublicKeyInfoOwned> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| DevCaError::CertificateError(format!("Failed to encode public key: {}", e)))?;

    SubjectPublicKeyInfoOwned::from_der(der.as_bytes())
        .map_err(|e| {
            DevCaError::CertificateError(format!("Failed to decode public key info: {}", e))
        })
}

/// Key identifier derived from the leftmost 160 bits of SHA-256 over the public key bits.
pub fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Result<OctetString> {
    let digest = Sha256::digest(spki.subject_public_key.raw_bytes());
    OctetString::new(&digest[..20])
        .map_err(|e| {
            DevCaError::CertificateError(format!("Failed to create key identifier: {}", e))
        })
}

/// The `sha256WithRSAEncryption` algorithm identifier (with NULL parameters).
pub fn rsa_sha256_algorithm() -> Result<AlgorithmIdentifierOwned> {
    let parameters = Any::new(Tag::Null, Vec::<u8>::new())
        .map_err(|e| DevCaError::CertificateError(format!("Failed to encode NULL: {}", e)))?;

    Ok(AlgorithmIdentifierOwned {
        oid: rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
        parameters: Some(parameters),
    })
}

/// Sign a TBS certificate with `signing_key` and assemble the certificate.
pub fn sign_tbs<R: CryptoRngCore>(
    tbs: TbsCertificate,
    signing_key: &RsaPrivateKey,
    rng: &mut R,
) -> Result<Certificate> {
    let tbs_der = tbs
        .to_der()
        .map_err(|e| DevCaError::CertificateError(format!("Failed to encode TBS: {}", e)))?;

    let signer = SigningKey::<Sha256>::new(signing_key.clone());
    let mut checked = CheckedRng::new(rng);
    let signed = signer.try_sign_with_rng(&mut checked, &tbs_der);
    if let Some(failure) = checked.failure() {
        return Err(DevCaError::RandomSourceError(format!(
            "Random source failed while signing: {}",
            failure
        )));
    }
    let signature = signed.map_err(|e| {
        DevCaError::CertificateError(format!("Failed to sign certificate: {}", e))
    })?;

    let signature = BitString::from_bytes(&signature.to_bytes()).map_err(|e| {
        DevCaError::CertificateError(format!("Failed to create signature bitstring: {}", e))
    })?;

    Ok(Certificate {
        signature_algorithm: tbs.signature.clone(),
        tbs_certificate: tbs,
        signature,
    })
}

/// Convert a Certificate to PEM format.
pub fn cert_to_pem(cert: &Certificate) -> Result<String> {
    let der = cert
        .to_der()
        .map_err(|e| DevCaError::CertificateError(format!("Failed to encode certificate: {}", e)))?;

    Ok(pem::encode(&pem::Pem::new(CERTIFICATE_TAG, der)))
}

/// Load a Certificate from PEM format.
pub fn cert_from_pem(pem_str: &str) -> Result<Certificate> {
    let block = pem::parse(pem_str)
        .map_err(|e| DevCaError::PemError(format!("Failed to parse PEM: {}", e)))?;

    if block.tag() != CERTIFICATE_TAG {
        return Err(DevCaError::PemError(format!(
            "Expected {}, got {}",
            CERTIFICATE_TAG,
            block.tag()
        )));
    }

    Certificate::from_der(block.contents())
        .map_err(|e| DevCaError::CertificateError(format!("Failed to decode certificate: {}", e)))
}

/// OIDs of the extended key usages carried by every certificate devca issues.
pub fn client_and_server_auth() -> Vec<ObjectIdentifier> {
    vec![rfc5280::ID_KP_CLIENT_AUTH, rfc5280::ID_KP_SERVER_AUTH]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::ca::CertificateAuthority;
    use crate::config::AuthorityConfig;
    use crate::crypto::rng::ExhaustedRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(year: u16, month: u8, day: u8) -> SystemTime {
        DateTime::new(year, month, day, 12, 30, 15)
            .unwrap()
            .to_system_time()
    }

    #[test]
    fn test_serial_number_fits_159_bits() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let serial = generate_serial_number(&mut rng).unwrap();
            let bytes = serial.as_bytes();
            assert!(!bytes.is_empty());
            assert!(bytes.len() <= SERIAL_NUMBER_LEN);
            if bytes.len() == SERIAL_NUMBER_LEN {
                assert_eq!(bytes[0] & 0x80, 0);
            }
        }
    }

    #[test]
    fn test_serial_numbers_differ() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = generate_serial_number(&mut rng).unwrap();
        let b = generate_serial_number(&mut rng).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_minimal_positive() {
        assert_eq!(minimal_positive(&[0x00, 0x00, 0x05]), &[0x05]);
        assert_eq!(minimal_positive(&[0x00, 0x9a, 0x01]), &[0x00, 0x9a, 0x01]);
        assert_eq!(minimal_positive(&[0x7f, 0x00]), &[0x7f, 0x00]);
        assert_eq!(minimal_positive(&[0x00, 0x00]), &[0x00]);
    }

    #[test]
    fn test_validity_years_exact() {
        let validity = validity_years(at(2024, 5, 17), 10).unwrap();
        let start = validity.not_before.to_date_time();
        let end = validity.not_after.to_date_time();

        assert_eq!(end.year(), start.year() + 10);
        assert_eq!(
            (end.month(), end.day(), end.hour(), end.minutes(), end.seconds()),
            (start.month(), start.day(), start.hour(), start.minutes(), start.seconds())
        );
    }

    #[test]
    fn test_validity_truncates_subseconds() {
        let now = UNIX_EPOCH + Duration::from_millis(1_700_000_000_750);
        let validity = validity_years(now, 1).unwrap();
        assert_eq!(
            validity.not_before.to_unix_duration(),
            Duration::from_secs(1_700_000_000)
        );
    }

    #[test]
    fn test_add_years_leap_day_rolls_over() {
        let start = DateTime::new(2024, 2, 29, 0, 0, 0).unwrap();
        let end = add_years(start, 1).unwrap();
        assert_eq!((end.year(), end.month(), end.day()), (2025, 3, 1));

        let end = add_years(start, 4).unwrap();
        assert_eq!((end.year(), end.month(), end.day()), (2028, 2, 29));
    }

    #[test]
    fn test_validity_switches_to_generalized_time() {
        let validity = validity_years(at(2045, 1, 1), 10).unwrap();
        assert!(matches!(validity.not_before, Time::UtcTime(_)));
        assert!(matches!(validity.not_after, Time::GeneralTime(_)));
    }

    #[test]
    fn test_subject_to_name_order() {
        let subject = Subject {
            common_name: "example".to_string(),
            organizations: vec!["Org A".to_string(), "Org B".to_string()],
            location: Location::placeholder(),
        };
        let name = subject.to_name().unwrap();
        let oids: Vec<_> = name
            .0
            .iter()
            .map(|rdn| rdn.0.iter().next().unwrap().oid)
            .collect();

        assert_eq!(
            oids,
            vec![
                rfc4519::C,
                rfc4519::ST,
                rfc4519::L,
                rfc4519::STREET,
                rfc4519::POSTAL_CODE,
                rfc4519::O,
                rfc4519::CN
            ]
        );
    }

    #[test]
    fn test_organizations_share_one_rdn() {
        let subject = Subject {
            common_name: "example".to_string(),
            organizations: vec![
                "Org B".to_string(),
                "Org A".to_string(),
                "Org B".to_string(),
            ],
            location: Location::blank(),
        };
        let name = subject.to_name().unwrap();
        let organization_rdn = &name.0[5];

        assert_eq!(organization_rdn.0.len(), 2);
        assert!(organization_rdn.0.iter().all(|attr| attr.oid == rfc4519::O));
    }

    #[test]
    fn test_empty_common_name_and_organizations_omitted() {
        let subject = Subject {
            common_name: String::new(),
            organizations: vec![],
            location: Location::placeholder(),
        };
        let name = subject.to_name().unwrap();

        assert_eq!(name.0.len(), 5);
        assert!(name
            .0
            .iter()
            .all(|rdn| rdn.0.iter().all(|attr| attr.oid != rfc4519::CN)));
    }

    #[test]
    fn test_sign_with_exhausted_source_is_random_source_error() {
        let ca = CertificateAuthority::with_config("Sign CA", &AuthorityConfig::with_key_bits(1024))
            .unwrap();
        let tbs = ca.certificate().tbs_certificate.clone();

        let result = sign_tbs(tbs, &ca.key_pair().private, &mut ExhaustedRng);
        assert!(matches!(result, Err(DevCaError::RandomSourceError(_))));
    }

    #[test]
    fn test_serial_with_exhausted_source_is_random_source_error() {
        assert!(matches!(
            generate_serial_number(&mut ExhaustedRng),
            Err(DevCaError::RandomSourceError(_))
        ));
    }

    #[test]
    fn test_subject_rejects_unprintable_country() {
        let subject = Subject {
            common_name: "example".to_string(),
            organizations: vec![],
            location: Location {
                country: "Ünited".to_string(),
                ..Location::blank()
            },
        };
        assert!(matches!(subject.to_name(), Err(DevCaError::ParseError(_))));
    }

    #[test]
    fn test_cert_from_pem_wrong_tag() {
        let pem = pem::encode(&pem::Pem::new("PUBLIC KEY", vec![1, 2, 3]));
        assert!(matches!(cert_from_pem(&pem), Err(DevCaError::PemError(_))));
    }

    #[test]
    fn test_cert_from_pem_garbage() {
        assert!(cert_from_pem("not a valid pem").is_err());
    }
}
