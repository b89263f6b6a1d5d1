//! Single-link chain verification.
//!
//! Checks that a certificate was issued by a given CA certificate: the issuer
//! name matches, the issuer is allowed to sign certificates, and the RSA
//! PKCS#1 v1.5 / SHA-256 signature verifies against the issuer's key.

use crate::cert::builder::cert_from_pem;
use crate::cert::inspect;
use crate::error::{DevCaError, Result};
use const_oid::db::rfc5912;
use der::Encode;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;
use std::time::SystemTime;
use x509_cert::certificate::Certificate;
use x509_cert::ext::pkix::KeyUsages;

/// Verify that `cert` was signed by `issuer`.
///
/// A self-signed root verifies against itself.
pub fn verify_signed_by(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    if cert.tbs_certificate.issuer != issuer.tbs_certificate.subject {
        return Err(DevCaError::VerificationError(
            "Issuer name does not match the CA subject".to_string(),
        ));
    }

    if !inspect::is_ca(issuer)? {
        return Err(DevCaError::VerificationError(
            "Issuer is not a certificate authority".to_string(),
        ));
    }

    if let Some(usage) = inspect::key_usage(issuer)? {
        if !usage.0.contains(KeyUsages::KeyCertSign) {
            return Err(DevCaError::VerificationError(
                "Issuer key usage does not permit certificate signing".to_string(),
            ));
        }
    }

    if cert.signature_algorithm.oid != rfc5912::SHA_256_WITH_RSA_ENCRYPTION {
        return Err(DevCaError::VerificationError(format!(
            "Unsupported signature algorithm {}",
            cert.signature_algorithm.oid
        )));
    }

    let spki_der = issuer
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| DevCaError::VerificationError(format!("Failed to encode issuer key: {}", e)))?;
    let public_key = RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| DevCaError::VerificationError(format!("Issuer key is not RSA: {}", e)))?;

    let signature_bytes = cert.signature.as_bytes().ok_or_else(|| {
        DevCaError::VerificationError("Signature has unused bits".to_string())
    })?;
    let signature = Signature::try_from(signature_bytes)
        .map_err(|e| DevCaError::VerificationError(format!("Malformed signature: {}", e)))?;

    let tbs_der = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| DevCaError::VerificationError(format!("Failed to encode TBS: {}", e)))?;

    VerifyingKey::<Sha256>::new(public_key)
        .verify(&tbs_der, &signature)
        .map_err(|e| DevCaError::VerificationError(format!("Signature verification failed: {}", e)))
}

/// Verify that `now` falls inside the certificate's validity window.
pub fn verify_validity(cert: &Certificate, now: SystemTime) -> Result<()> {
    let (not_before, not_after) = inspect::validity(cert);
    if now < not_before || now >= not_after {
        return Err(DevCaError::VerificationError(
            "Certificate is outside its validity window".to_string(),
        ));
    }
    Ok(())
}

/// Verify a PEM leaf against a PEM CA certificate.
///
/// # Example
///
/// ```no_run
/// use devca::cert::ca::CertificateAuthority;
/// use devca::cert::verify::verify_pem_chain;
///
/// # fn example() -> devca::error::Result<()> {
/// let ca = CertificateAuthority::new("devca")?;
/// let issued = ca.issue("devca", &[], &[])?;
/// verify_pem_chain(&issued.certificate_pem, ca.certificate_pem())?;
/// # Ok(())
/// # }
/// ```
pub fn verify_pem_chain(leaf_pem: &str, ca_pem: &str) -> Result<()> {
    let leaf = cert_from_pem(leaf_pem)?;
    let ca = cert_from_pem(ca_pem)?;

    verify_signed_by(&ca, &ca)?;
    verify_signed_by(&leaf, &ca)?;
    verify_validity(&leaf, SystemTime::now())
}
