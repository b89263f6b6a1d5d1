//! Configuration for the certificate authority and the serving helpers.
//!
//! Configuration is plain TOML:
//!
//! ```toml
//! [authority]
//! ca_key_bits = 2048
//! leaf_key_bits = 2048
//!
//! [serving]
//! authority_name = "devca"
//! common_name = "devca"
//! organizations = []
//! subject_alt_names = ["webhook.dev.local"]
//! advertise_host = "192.168.1.20"
//! port = 9443
//! webhook_path = "/validate"
//! ```

use crate::error::{DevCaError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default RSA modulus size for both the root and issued leaf keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Smallest modulus a certificate authority will accept.
pub const MIN_AUTHORITY_KEY_BITS: usize = 1024;

/// Largest modulus a certificate authority will accept.
pub const MAX_AUTHORITY_KEY_BITS: usize = 16384;

/// Key sizes used by a certificate authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorityConfig {
    /// RSA modulus size of the root key.
    pub ca_key_bits: usize,
    /// RSA modulus size of every issued leaf key.
    pub leaf_key_bits: usize,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self::with_key_bits(DEFAULT_KEY_BITS)
    }
}

impl AuthorityConfig {
    /// Use the same modulus size for root and leaf keys.
    pub fn with_key_bits(bits: usize) -> Self {
        Self {
            ca_key_bits: bits,
            leaf_key_bits: bits,
        }
    }

    /// Reject key sizes outside the accepted range.
    pub fn validate(&self) -> Result<()> {
        for (field, bits) in [
            ("ca_key_bits", self.ca_key_bits),
            ("leaf_key_bits", self.leaf_key_bits),
        ] {
            if !(MIN_AUTHORITY_KEY_BITS..=MAX_AUTHORITY_KEY_BITS).contains(&bits) {
                return Err(DevCaError::ConfigError(format!(
                    "{} must be between {} and {}, got {}",
                    field, MIN_AUTHORITY_KEY_BITS, MAX_AUTHORITY_KEY_BITS, bits
                )));
            }
        }
        Ok(())
    }
}

/// Identity and endpoint of a development webhook server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServingConfig {
    /// Common name of the root certificate.
    pub authority_name: String,
    /// Common name of the leaf certificate.
    pub common_name: String,
    pub organizations: Vec<String>,
    /// Extra SANs beyond `advertise_host` and the loopback defaults.
    pub subject_alt_names: Vec<String>,
    /// Host the webhook is reachable at; always added as a SAN.
    pub advertise_host: String,
    pub port: u16,
    pub webhook_path: String,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            authority_name: "devca".to_string(),
            common_name: "devca".to_string(),
            organizations: Vec::new(),
            subject_alt_names: Vec::new(),
            advertise_host: "localhost".to_string(),
            port: 9443,
            webhook_path: "/".to_string(),
        }
    }
}

impl ServingConfig {
    /// Reject empty names, an empty host and port 0.
    pub fn validate(&self) -> Result<()> {
        if self.authority_name.is_empty() {
            return Err(DevCaError::ConfigError(
                "authority_name cannot be empty".to_string(),
            ));
        }
        if self.advertise_host.is_empty() {
            return Err(DevCaError::ConfigError(
                "advertise_host cannot be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(DevCaError::ConfigError("port cannot be 0".to_string()));
        }
        Ok(())
    }

    /// `advertise_host` followed by the configured extra SANs.
    pub fn all_subject_alt_names(&self) -> Vec<&str> {
        std::iter::once(self.advertise_host.as_str())
            .chain(self.subject_alt_names.iter().map(String::as_str))
            .collect()
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub authority: AuthorityConfig,
    pub serving: ServingConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Config = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Validate both sections.
    pub fn validate(&self) -> Result<()> {
        self.authority.validate()?;
        self.serving.validate()
    }
}
