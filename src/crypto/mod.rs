//! Cryptographic primitives for devca.
//!
//! Currently RSA key generation with PKIX/PKCS#1 PEM encodings. Every
//! generator has a `_with_rng` variant taking an explicit
//! [`rand_core::CryptoRngCore`], so tests can use a seeded source.
//!
//! # Example
//!
//! ```rust
//! use devca::crypto::keypair::{generate_rsa_keypair_with_rng, KeyPair};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! # fn example() -> devca::error::Result<()> {
//! let keypair = generate_rsa_keypair_with_rng(&mut StdRng::seed_from_u64(1), 512)?;
//! let restored = KeyPair::from_private_pem(&keypair.private_pem)?;
//! assert_eq!(keypair.public_key(), restored.public_key());
//! # Ok(())
//! # }
//! ```

pub mod keypair;
pub mod rng;
