//! Read-only accessors over decoded certificates.

use crate::error::{DevCaError, Result};
use const_oid::db::{rfc4519, rfc5280};
use const_oid::ObjectIdentifier;
use der::asn1::{PrintableStringRef, Utf8StringRef};
use der::{Decode, Tag, Tagged};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::SystemTime;
use x509_cert::certificate::Certificate;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName, SubjectKeyIdentifier,
};

/// Decode the extension identified by `oid`, if present.
pub fn find_extension<'a, T: Decode<'a>>(
    cert: &'a Certificate,
    oid: ObjectIdentifier,
) -> Result<Option<T>> {
    let Some(extensions) = cert.tbs_certificate.extensions.as_ref() else {
        return Ok(None);
    };

    match extensions.iter().find(|ext| ext.extn_id == oid) {
        Some(ext) => T::from_der(ext.extn_value.as_bytes())
            .map(Some)
            .map_err(|e| {
                DevCaError::CertificateError(format!("Failed to decode extension {}: {}", oid, e))
            }),
        None => Ok(None),
    }
}

/// Whether the certificate's basic constraints mark it as a CA.
pub fn is_ca(cert: &Certificate) -> Result<bool> {
    Ok(find_extension::<BasicConstraints>(cert, rfc5280::ID_CE_BASIC_CONSTRAINTS)?
        .map(|bc| bc.ca)
        .unwrap_or(false))
}

/// The key usage extension, if present.
pub fn key_usage(cert: &Certificate) -> Result<Option<KeyUsage>> {
    find_extension(cert, rfc5280::ID_CE_KEY_USAGE)
}

/// The extended key usage extension, if present.
pub fn extended_key_usage(cert: &Certificate) -> Result<Option<ExtendedKeyUsage>> {
    find_extension(cert, rfc5280::ID_CE_EXT_KEY_USAGE)
}

/// The subject key identifier extension, if present.
pub fn subject_key_identifier(cert: &Certificate) -> Result<Option<SubjectKeyIdentifier>> {
    find_extension(cert, rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER)
}

/// DNS names and IP addresses from the SAN extension, in certificate order.
pub fn subject_alt_names(cert: &Certificate) -> Result<(Vec<String>, Vec<IpAddr>)> {
    let mut dns_names = Vec::new();
    let mut ip_addresses = Vec::new();

    let Some(san) = find_extension::<SubjectAltName>(cert, rfc5280::ID_CE_SUBJECT_ALT_NAME)? else {
        return Ok((dns_names, ip_addresses));
    };

    for name in san.0 {
        match name {
            GeneralName::DnsName(dns) => dns_names.push(dns.to_string()),
            GeneralName::IpAddress(octets) => ip_addresses.push(ip_from_octets(octets.as_bytes())?),
            _ => {}
        }
    }

    Ok((dns_names, ip_addresses))
}

fn ip_from_octets(octets: &[u8]) -> Result<IpAddr> {
    if let Ok(v4) = <[u8; 4]>::try_from(octets) {
        return Ok(IpAddr::V4(Ipv4Addr::from(v4)));
    }
    if let Ok(v6) = <[u8; 16]>::try_from(octets) {
        return Ok(IpAddr::V6(Ipv6Addr::from(v6)));
    }
    Err(DevCaError::CertificateError(format!(
        "IP address SAN has {} octets",
        octets.len()
    )))
}

/// The subject's common name, if it has one.
pub fn common_name(cert: &Certificate) -> Option<String> {
    cert.tbs_certificate
        .subject
        .0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|attr| attr.oid == rfc4519::CN)
        .and_then(|attr| match attr.value.tag() {
            Tag::Utf8String => Utf8StringRef::try_from(&attr.value)
                .ok()
                .map(|s| s.as_str().to_string()),
            Tag::PrintableString => PrintableStringRef::try_from(&attr.value)
                .ok()
                .map(|s| s.as_str().to_string()),
            _ => None,
        })
}

/// Serial number as lowercase hex.
pub fn serial_hex(cert: &Certificate) -> String {
    hex::encode(cert.tbs_certificate.serial_number.as_bytes())
}

/// `(not_before, not_after)` as system times.
pub fn validity(cert: &Certificate) -> (SystemTime, SystemTime) {
    let validity = &cert.tbs_certificate.validity;
    (
        validity.not_before.to_system_time(),
        validity.not_after.to_system_time(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::ca::CertificateAuthority;
    use crate::cert::builder::cert_from_pem;
    use crate::config::AuthorityConfig;

    #[test]
    fn test_inspect_leaf() {
        let ca =
            CertificateAuthority::with_config("Inspect CA", &AuthorityConfig::with_key_bits(1024))
                .unwrap();
        let issued = ca
            .issue("inspected", &["Org"], &["service.local", "10.1.2.3"])
            .unwrap();
        let leaf = cert_from_pem(&issued.certificate_pem).unwrap();

        assert_eq!(common_name(&leaf).as_deref(), Some("inspected"));
        assert!(!is_ca(&leaf).unwrap());

        let (dns, ips) = subject_alt_names(&leaf).unwrap();
        assert_eq!(dns, vec!["localhost", "service.local"]);
        assert_eq!(ips.len(), 3);
        assert_eq!(ips[2], "10.1.2.3".parse::<IpAddr>().unwrap());

        let (not_before, not_after) = validity(&leaf);
        assert!(not_before < not_after);
        assert!(serial_hex(&leaf).len() <= 40);
    }

    #[test]
    fn test_ca_has_no_sans() {
        let ca =
            CertificateAuthority::with_config("Inspect CA", &AuthorityConfig::with_key_bits(1024))
                .unwrap();
        let (dns, ips) = subject_alt_names(ca.certificate()).unwrap();
        assert!(dns.is_empty());
        assert!(ips.is_empty());
    }

    #[test]
    fn test_ip_from_octets_bad_length() {
        assert!(ip_from_octets(&[1, 2, 3]).is_err());
    }
}
