//! RSA key generation.
//!
//! This module produces RSA keypairs together with their PEM encodings:
//! the public key in PKIX (`PUBLIC KEY`) form and the private key in
//! PKCS#1 (`RSA PRIVATE KEY`) form.

use crate::crypto::rng::CheckedRng;
use crate::error::{DevCaError, Result};
use rand_core::{CryptoRngCore, OsRng};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::EncodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;

/// Smallest modulus the key generator accepts.
pub const MIN_KEY_BITS: usize = 512;

/// Largest modulus the key generator accepts.
pub const MAX_KEY_BITS: usize = 16384;

/// PEM tag of a PKIX public key.
pub const PUBLIC_KEY_TAG: &str = "PUBLIC KEY";

/// PEM tag of a PKCS#1 private key.
pub const RSA_PRIVATE_KEY_TAG: &str = "RSA PRIVATE KEY";

/// An RSA private key and its PEM encodings.
#[derive(Clone)]
pub struct KeyPair {
    pub private: RsaPrivateKey,
    pub public_pem: String,
    pub private_pem: String,
}

impl KeyPair {
    /// Build a keypair from an existing private key, encoding both halves.
    pub fn from_private(private: RsaPrivateKey) -> Result<Self> {
        let public_der = private
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| DevCaError::PemError(format!("Failed to encode public key: {}", e)))?;
        let private_der = private
            .to_pkcs1_der()
            .map_err(|e| DevCaError::PemError(format!("Failed to encode private key: {}", e)))?;

        let public_pem = pem::encode(&pem::Pem::new(PUBLIC_KEY_TAG, public_der.as_bytes()));
        let private_pem = pem::encode(&pem::Pem::new(
            RSA_PRIVATE_KEY_TAG,
            private_der.as_bytes(),
        ));

        Ok(Self {
            private,
            public_pem,
            private_pem,
        })
    }

    /// Decode a PKCS#1 `RSA PRIVATE KEY` PEM block back into a keypair.
    pub fn from_private_pem(pem_str: &str) -> Result<Self> {
        let block = pem::parse(pem_str)
            .map_err(|e| DevCaError::PemError(format!("Failed to parse PEM: {}", e)))?;

        if block.tag() != RSA_PRIVATE_KEY_TAG {
            return Err(DevCaError::PemError(format!(
                "Expected {}, got {}",
                RSA_PRIVATE_KEY_TAG,
                block.tag()
            )));
        }

        let private = RsaPrivateKey::from_pkcs1_der(block.contents())
            .map_err(|e| DevCaError::PemError(format!("Failed to decode private key: {}", e)))?;
        Self::from_private(private)
    }

    /// The public half of the keypair.
    pub fn public_key(&self) -> RsaPublicKey {
        self.private.to_public_key()
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.private.n().bits()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &self.bits())
            .field("public_pem", &self.public_pem)
            .finish_non_exhaustive()
    }
}

/// Generate an RSA keypair of `bits` modulus size using the operating system RNG.
///
/// # Example
///
/// ```
/// use devca::crypto::keypair::generate_rsa_keypair;
///
/// let keypair = generate_rsa_keypair(1024).unwrap();
/// assert!(keypair.public_pem.contains("BEGIN PUBLIC KEY"));
/// assert!(keypair.private_pem.contains("BEGIN RSA PRIVATE KEY"));
/// ```
pub fn generate_rsa_keypair(bits: usize) -> Result<KeyPair> {
    generate_rsa_keypair_with_rng(&mut OsRng, bits)
}

/// Generate an RSA keypair drawing randomness from `rng`.
///
/// A failing source is reported as [`DevCaError::KeyGenerationError`].
pub fn generate_rsa_keypair_with_rng<R: CryptoRngCore>(
    rng: &mut R,
    bits: usize,
) -> Result<KeyPair> {
    if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&bits) {
        return Err(DevCaError::KeyGenerationError(format!(
            "Unsupported RSA modulus size {} (expected {}..={} bits)",
            bits, MIN_KEY_BITS, MAX_KEY_BITS
        )));
    }

    let mut checked = CheckedRng::new(rng);
    let generated = RsaPrivateKey::new(&mut checked, bits);
    if let Some(failure) = checked.failure() {
        return Err(DevCaError::KeyGenerationError(format!(
            "Random source failed: {}",
            failure
        )));
    }
    let private = generated.map_err(|e| {
        DevCaError::KeyGenerationError(format!("Failed to generate RSA key: {}", e))
    })?;

    KeyPair::from_private(private)
}
