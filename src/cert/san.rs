//! Subject Alternative Name normalization.
//!
//! Every leaf certificate starts from the same default identities
//! (`localhost`, `127.0.0.1`, `::1`) and extra names are merged in input
//! order. An entry that parses as an IP literal becomes an IP address SAN,
//! anything else becomes a DNS name. Duplicates are dropped.

use crate::error::{DevCaError, Result};
use der::asn1::{Ia5String, OctetString};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use x509_cert::ext::pkix::name::GeneralName;

/// DNS name every leaf certificate is valid for.
pub const DEFAULT_DNS_NAME: &str = "localhost";

/// IP addresses every leaf certificate is valid for.
pub const DEFAULT_IP_ADDRESSES: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::LOCALHOST),
    IpAddr::V6(Ipv6Addr::LOCALHOST),
];

/// Ordered, duplicate-free DNS and IP SAN lists.
#[derive(Debug, Clone)]
pub struct SubjectAltNames {
    dns_names: Vec<String>,
    ip_addresses: Vec<IpAddr>,
    known: HashSet<String>,
}

impl SubjectAltNames {
    /// The default SAN set.
    pub fn with_defaults() -> Self {
        let mut known = HashSet::new();
        known.insert(DEFAULT_DNS_NAME.to_string());
        for ip in DEFAULT_IP_ADDRESSES {
            known.insert(ip.to_string());
        }

        Self {
            dns_names: vec![DEFAULT_DNS_NAME.to_string()],
            ip_addresses: DEFAULT_IP_ADDRESSES.to_vec(),
            known,
        }
    }

    /// Merge one name into the set. Returns `false` if it was skipped.
    pub fn add(&mut self, name: &str) -> bool {
        if name.is_empty() || self.known.contains(name) {
            return false;
        }

        match name.parse::<IpAddr>().map(canonical_ip) {
            Ok(ip) => {
                let canonical = ip.to_string();
                if self.known.contains(&canonical) {
                    self.known.insert(name.to_string());
                    return false;
                }
                self.ip_addresses.push(ip);
                self.known.insert(canonical);
            }
            Err(_) => self.dns_names.push(name.to_string()),
        }

        self.known.insert(name.to_string());
        true
    }

    /// DNS names in insertion order, starting with `localhost`.
    pub fn dns_names(&self) -> &[String] {
        &self.dns_names
    }

    /// IP addresses in insertion order, starting with the loopback addresses.
    pub fn ip_addresses(&self) -> &[IpAddr] {
        &self.ip_addresses
    }

    /// DNS names first, then IP addresses, each in insertion order.
    pub fn to_general_names(&self) -> Result<Vec<GeneralName>> {
        let mut names = Vec::with_capacity(self.dns_names.len() + self.ip_addresses.len());

        for dns_name in &self.dns_names {
            let value = Ia5String::new(dns_name).map_err(|e| {
                DevCaError::CertificateError(format!("Invalid DNS name '{}': {}", dns_name, e))
            })?;
            names.push(GeneralName::DnsName(value));
        }

        for ip in &self.ip_addresses {
            let octets = match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            let value = OctetString::new(octets).map_err(|e| {
                DevCaError::CertificateError(format!("Invalid IP address '{}': {}", ip, e))
            })?;
            names.push(GeneralName::IpAddress(value));
        }

        Ok(names)
    }
}

/// IPv4-mapped IPv6 addresses collapse to their IPv4 form.
fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
        v4 => v4,
    }
}

impl Default for SubjectAltNames {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Merge `extra` into the default SAN set.
///
/// # Example
///
/// ```
/// use devca::cert::san::normalize_sans;
///
/// let sans = normalize_sans(&["localhost", "10.0.0.5", "10.0.0.5", "example.com"]);
/// assert_eq!(sans.dns_names(), ["localhost", "example.com"]);
/// assert_eq!(sans.ip_addresses().len(), 3);
/// ```
pub fn normalize_sans<S: AsRef<str>>(extra: &[S]) -> SubjectAltNames {
    let mut sans = SubjectAltNames::with_defaults();
    for name in extra {
        sans.add(name.as_ref());
    }
    sans
}
