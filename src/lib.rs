//! devca: a throwaway certificate authority for development-mode TLS endpoints
//!
//! This library creates an in-memory self-signed certificate authority and
//! uses it to mint leaf server certificates for a set of hostnames and IP
//! addresses. It is meant for things like admission webhooks run from a
//! developer machine, where the cluster only needs to trust a CA bundle for
//! the lifetime of a single process.
//!
//! - Generate RSA keypairs with PKIX / PKCS#1 PEM encodings
//! - Build a self-signed root valid for 10 years
//! - Issue leaf certificates valid for 1 year, with `localhost`, `127.0.0.1`
//!   and `::1` always included as Subject Alternative Names
//! - Write the serving files and build the webhook endpoint URL
//!
//! # Example
//!
//! ```rust,no_run
//! use devca::cert::ca::CertificateAuthority;
//! use devca::error::Result;
//!
//! fn example() -> Result<()> {
//!     let ca = CertificateAuthority::new("devca")?;
//!     let issued = ca.issue("devca", &[], &["192.168.1.20"])?;
//!     println!("{}", issued.certificate_pem);
//!     println!("CA bundle: {} bytes", ca.ca_bundle().len());
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod config;
pub mod crypto;
pub mod error;
pub mod serving;

// Re-export commonly used types
pub use cert::ca::{CertificateAuthority, IssuedCertificate};
pub use config::{AuthorityConfig, Config, ServingConfig};
pub use crypto::keypair::{generate_rsa_keypair, KeyPair};
pub use error::{DevCaError, Result};
