//! In-memory certificate authority.
//!
//! A [`CertificateAuthority`] is a self-signed root certificate together with
//! the RSA key that produced it. It issues leaf server certificates bound to a
//! caller-supplied set of hostnames and IP addresses.
//!
//! Issuance only reads the authority's key and certificate, so a single
//! authority can be shared across threads (`&CertificateAuthority` is `Sync`).
//! [`CertificateAuthority::issue`] draws from [`OsRng`], which is stateless and
//! safe to use concurrently; callers of the `_with_rng` variants supply their
//! own source per call.

use crate::cert::builder::{
    cert_to_pem, client_and_server_auth, extension, generate_serial_number, key_identifier,
    rsa_sha256_algorithm, sign_tbs, subject_public_key_info, validity_years, Location, Subject,
};
use crate::cert::san::normalize_sans;
use crate::config::AuthorityConfig;
use crate::crypto::keypair::{generate_rsa_keypair_with_rng, KeyPair};
use crate::error::{DevCaError, Result};
use const_oid::db::rfc5280;
use der::asn1::OctetString;
use rand_core::{CryptoRngCore, OsRng};
use std::time::SystemTime;
use tracing::debug;
use x509_cert::certificate::{Certificate, Version};
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
    SubjectAltName, SubjectKeyIdentifier,
};
use x509_cert::TbsCertificate;

/// Validity of the root certificate, in calendar years.
pub const CA_VALIDITY_YEARS: u16 = 10;

/// Validity of issued leaf certificates, in calendar years.
pub const LEAF_VALIDITY_YEARS: u16 = 1;

/// Subject key identifier stamped on every leaf certificate.
pub const LEAF_SUBJECT_KEY_ID: [u8; 5] = [1, 2, 3, 4, 6];

/// A PEM-encoded leaf certificate and its PKCS#1 private key.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub certificate_pem: String,
    pub private_key_pem: String,
}

impl IssuedCertificate {
    /// Split into `(certificate_pem, private_key_pem)`.
    pub fn into_parts(self) -> (String, String) {
        (self.certificate_pem, self.private_key_pem)
    }
}

impl std::fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("certificate_pem", &self.certificate_pem)
            .finish_non_exhaustive()
    }
}

/// A self-signed root certificate and its signing key.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    certificate: Certificate,
    certificate_pem: String,
    key_pair: KeyPair,
    config: AuthorityConfig,
}

impl CertificateAuthority {
    /// Create a certificate authority with the default configuration.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use devca::cert::ca::CertificateAuthority;
    ///
    /// # fn example() -> devca::error::Result<()> {
    /// let ca = CertificateAuthority::new("devca")?;
    /// let issued = ca.issue("devca", &[], &["webhook.local"])?;
    /// assert!(issued.certificate_pem.contains("BEGIN CERTIFICATE"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(name: &str) -> Result<Self> {
        Self::with_config(name, &AuthorityConfig::default())
    }

    /// Create a certificate authority with explicit key sizes.
    pub fn with_config(name: &str, config: &AuthorityConfig) -> Result<Self> {
        Self::generate(name, config, &mut OsRng, SystemTime::now())
    }

    /// Create a certificate authority from an explicit random source and clock reading.
    pub fn generate<R: CryptoRngCore>(
        name: &str,
        config: &AuthorityConfig,
        rng: &mut R,
        now: SystemTime,
    ) -> Result<Self> {
        config.validate()?;

        let key_pair = generate_rsa_keypair_with_rng(rng, config.ca_key_bits)?;
        let serial_number = generate_serial_number(rng)?;

        let subject = Subject {
            common_name: name.to_string(),
            organizations: vec![String::new()],
            location: Location::blank(),
        }
        .to_name()?;

        let spki = subject_public_key_info(&key_pair.public_key())?;
        let extensions = vec![
            extension(
                rfc5280::ID_CE_BASIC_CONSTRAINTS,
                true,
                &BasicConstraints {
                    ca: true,
                    path_len_constraint: None,
                },
            )?,
            extension(
                rfc5280::ID_CE_KEY_USAGE,
                true,
                &KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyCertSign),
            )?,
            extension(
                rfc5280::ID_CE_EXT_KEY_USAGE,
                false,
                &ExtendedKeyUsage(client_and_server_auth()),
            )?,
            extension(
                rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER,
                false,
                &SubjectKeyIdentifier(key_identifier(&spki)?),
            )?,
        ];

        let tbs = TbsCertificate {
            version: Version::V3,
            serial_number,
            signature: rsa_sha256_algorithm()?,
            issuer: subject.clone(), // Self-signed
            validity: validity_years(now, CA_VALIDITY_YEARS)?,
            subject,
            subject_public_key_info: spki,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        };

        let certificate = sign_tbs(tbs, &key_pair.private, rng)?;
        let certificate_pem = cert_to_pem(&certificate)?;

        debug!(
            authority = name,
            serial = %hex::encode(certificate.tbs_certificate.serial_number.as_bytes()),
            bits = config.ca_key_bits,
            "created certificate authority"
        );

        Ok(Self {
            certificate,
            certificate_pem,
            key_pair,
            config: config.clone(),
        })
    }

    /// Issue a leaf certificate using the operating system RNG and the current time.
    ///
    /// # Arguments
    ///
    /// * `common_name` - Subject common name of the leaf
    /// * `organizations` - Subject organization values, may be empty
    /// * `extra_sans` - Hostnames and IP literals merged into the default SAN set
    pub fn issue(
        &self,
        common_name: &str,
        organizations: &[&str],
        extra_sans: &[&str],
    ) -> Result<IssuedCertificate> {
        self.issue_with_rng(
            &mut OsRng,
            SystemTime::now(),
            common_name,
            organizations,
            extra_sans,
        )
    }

    /// Issue a leaf certificate from an explicit random source and clock reading.
    pub fn issue_with_rng<R: CryptoRngCore>(
        &self,
        rng: &mut R,
        now: SystemTime,
        common_name: &str,
        organizations: &[&str],
        extra_sans: &[&str],
    ) -> Result<IssuedCertificate> {
        let serial_number = generate_serial_number(rng)?;
        let sans = normalize_sans(extra_sans);
        let leaf_key = generate_rsa_keypair_with_rng(rng, self.config.leaf_key_bits)?;

        let subject = Subject {
            common_name: common_name.to_string(),
            organizations: organizations.iter().map(|o| o.to_string()).collect(),
            location: Location::placeholder(),
        }
        .to_name()?;

        let authority_key_id = self.subject_key_identifier()?;
        let subject_key_id = OctetString::new(LEAF_SUBJECT_KEY_ID.to_vec()).map_err(|e| {
            DevCaError::CertificateError(format!("Failed to create key identifier: {}", e))
        })?;

        let extensions = vec![
            extension(
                rfc5280::ID_CE_KEY_USAGE,
                true,
                &KeyUsage(KeyUsages::DigitalSignature.into()),
            )?,
            extension(
                rfc5280::ID_CE_EXT_KEY_USAGE,
                false,
                &ExtendedKeyUsage(client_and_server_auth()),
            )?,
            extension(
                rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER,
                false,
                &SubjectKeyIdentifier(subject_key_id),
            )?,
            extension(
                rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER,
                false,
                &AuthorityKeyIdentifier {
                    key_identifier: authority_key_id,
                    authority_cert_issuer: None,
                    authority_cert_serial_number: None,
                },
            )?,
            extension(
                rfc5280::ID_CE_SUBJECT_ALT_NAME,
                false,
                &SubjectAltName(sans.to_general_names()?),
            )?,
        ];

        let tbs = TbsCertificate {
            version: Version::V3,
            serial_number,
            signature: rsa_sha256_algorithm()?,
            issuer: self.certificate.tbs_certificate.subject.clone(),
            validity: validity_years(now, LEAF_VALIDITY_YEARS)?,
            subject,
            subject_public_key_info: subject_public_key_info(&leaf_key.public_key())?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        };

        // Signed with the CA's key, not the leaf's.
        let certificate = sign_tbs(tbs, &self.key_pair.private, rng)?;
        let certificate_pem = cert_to_pem(&certificate)?;

        debug!(
            common_name,
            serial = %hex::encode(certificate.tbs_certificate.serial_number.as_bytes()),
            dns_names = sans.dns_names().len(),
            ip_addresses = sans.ip_addresses().len(),
            "issued leaf certificate"
        );

        Ok(IssuedCertificate {
            certificate_pem,
            private_key_pem: leaf_key.private_pem,
        })
    }

    /// The root certificate in PEM form.
    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    /// PEM bytes to publish as a trust anchor.
    pub fn ca_bundle(&self) -> &[u8] {
        self.certificate_pem.as_bytes()
    }

    /// The decoded root certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The root's private key in PKCS#1 PEM form.
    pub fn private_key_pem(&self) -> &str {
        &self.key_pair.private_pem
    }

    /// The root's RSA keypair.
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Key sizes this authority was created with.
    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    fn subject_key_identifier(&self) -> Result<Option<OctetString>> {
        key_identifier(&self.certificate.tbs_certificate.subject_public_key_info).map(Some)
    }
}
