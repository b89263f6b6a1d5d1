//! Serving-side helpers for a development webhook server.
//!
//! The certificate authority itself performs no I/O. These helpers do the
//! orchestration around it: they persist the issued leaf certificate and key
//! where a TLS-terminating server can read them, expose the CA bundle to
//! publish as a trust anchor, and build the HTTPS endpoint URL clients are
//! pointed at.

use crate::cert::ca::{CertificateAuthority, IssuedCertificate};
use crate::config::Config;
use crate::error::{DevCaError, Result};
use std::fs;
use std::io::Write;
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Leaf certificate file name.
pub const CERT_FILE_NAME: &str = "tls.crt";

/// Leaf private key file name.
pub const KEY_FILE_NAME: &str = "tls.key";

/// CA certificate file name.
pub const CA_FILE_NAME: &str = "ca.crt";

/// Prefix of directories created by [`create_serving_certificates`].
pub const TEMP_DIR_PREFIX: &str = "devca-certs-";

/// Where the serving material ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServingCertificates {
    pub dir: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_path: PathBuf,
    /// PEM of the CA certificate, to publish as the webhook's CA bundle.
    pub ca_bundle: String,
}

/// Write `tls.crt`, `tls.key` and `ca.crt` into `dir`.
///
/// Files are created owner read/write only on Unix.
pub fn write_serving_certificates(
    dir: &Path,
    issued: &IssuedCertificate,
    ca_pem: &str,
) -> Result<ServingCertificates> {
    let key_path = dir.join(KEY_FILE_NAME);
    let cert_path = dir.join(CERT_FILE_NAME);
    let ca_path = dir.join(CA_FILE_NAME);

    write_private_file(&key_path, issued.private_key_pem.as_bytes())?;
    write_private_file(&cert_path, issued.certificate_pem.as_bytes())?;
    write_private_file(&ca_path, ca_pem.as_bytes())?;

    debug!(dir = %dir.display(), "wrote serving certificates");

    Ok(ServingCertificates {
        dir: dir.to_path_buf(),
        cert_path,
        key_path,
        ca_path,
        ca_bundle: ca_pem.to_string(),
    })
}

/// Create a CA, issue a leaf for the configured identity and write both into `dir`.
pub fn issue_serving_certificates(config: &Config, dir: &Path) -> Result<ServingCertificates> {
    config.validate()?;

    let ca = CertificateAuthority::with_config(&config.serving.authority_name, &config.authority)?;
    let organizations: Vec<&str> = config
        .serving
        .organizations
        .iter()
        .map(String::as_str)
        .collect();
    let issued = ca.issue(
        &config.serving.common_name,
        &organizations,
        &config.serving.all_subject_alt_names(),
    )?;

    write_serving_certificates(dir, &issued, ca.certificate_pem())
}

/// Like [`issue_serving_certificates`], into a fresh temporary directory that
/// outlives this call.
pub fn create_serving_certificates(config: &Config) -> Result<ServingCertificates> {
    create_serving_certificates_in(&std::env::temp_dir(), config)
}

/// Like [`create_serving_certificates`], with the temporary directory created
/// under `parent`.
///
/// The directory is removed again if issuance fails.
pub fn create_serving_certificates_in(
    parent: &Path,
    config: &Config,
) -> Result<ServingCertificates> {
    config.validate()?;

    let dir = tempfile::Builder::new()
        .prefix(TEMP_DIR_PREFIX)
        .tempdir_in(parent)?;
    let written = issue_serving_certificates(config, dir.path())?;
    let _ = dir.keep();

    Ok(written)
}

/// Build `https://host:port/path`, bracketing IPv6 literals.
///
/// # Example
///
/// ```
/// use devca::serving::webhook_endpoint;
///
/// let url = webhook_endpoint("::1", 9443, "/validate").unwrap();
/// assert_eq!(url.as_str(), "https://[::1]:9443/validate");
/// ```
pub fn webhook_endpoint(host: &str, port: u16, path: &str) -> Result<Url> {
    let host = if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{}]", host)
    } else {
        host.to_string()
    };

    let mut url = Url::parse(&format!("https://{}:{}", host, port))
        .map_err(|e| DevCaError::ParseError(format!("Invalid webhook host '{}': {}", host, e)))?;
    url.set_path(path);
    Ok(url)
}

fn write_private_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::verify::verify_pem_chain;
    use crate::config::AuthorityConfig;
    use tempfile::TempDir;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.authority = AuthorityConfig::with_key_bits(1024);
        config.serving.advertise_host = "10.0.0.5".to_string();
        config
    }

    fn test_authority() -> CertificateAuthority {
        CertificateAuthority::with_config("Serve CA", &AuthorityConfig::with_key_bits(1024))
            .unwrap()
    }

    #[test]
    fn test_write_serving_certificates() {
        let temp_dir = TempDir::new().unwrap();
        let ca = test_authority();
        let issued = ca.issue("serve", &[], &[]).unwrap();

        let written =
            write_serving_certificates(temp_dir.path(), &issued, ca.certificate_pem()).unwrap();

        assert_eq!(fs::read_to_string(&written.cert_path).unwrap(), issued.certificate_pem);
        assert_eq!(fs::read_to_string(&written.key_path).unwrap(), issued.private_key_pem);
        assert_eq!(fs::read_to_string(&written.ca_path).unwrap(), ca.certificate_pem());
        assert_eq!(written.ca_bundle, ca.certificate_pem());
    }

    #[cfg(unix)]
    #[test]
    fn test_serving_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let ca = test_authority();
        let issued = ca.issue("serve", &[], &[]).unwrap();
        let written =
            write_serving_certificates(temp_dir.path(), &issued, ca.certificate_pem()).unwrap();

        let mode = fs::metadata(&written.key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_create_serving_certificates() {
        let written = create_serving_certificates(&test_config()).unwrap();

        let dir_name = written.dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(dir_name.starts_with(TEMP_DIR_PREFIX));

        let leaf_pem = fs::read_to_string(&written.cert_path).unwrap();
        // The bundle is the CA, not the leaf.
        assert_ne!(leaf_pem, written.ca_bundle);
        assert!(verify_pem_chain(&leaf_pem, &written.ca_bundle).is_ok());

        let leaf = crate::cert::builder::cert_from_pem(&leaf_pem).unwrap();
        let (_, ips) = crate::cert::inspect::subject_alt_names(&leaf).unwrap();
        assert!(ips.contains(&"10.0.0.5".parse().unwrap()));

        fs::remove_dir_all(&written.dir).unwrap();
    }

    #[test]
    fn test_create_in_parent_keeps_directory() {
        let parent = TempDir::new().unwrap();
        let written = create_serving_certificates_in(parent.path(), &test_config()).unwrap();

        assert_eq!(written.dir.parent(), Some(parent.path()));
        assert!(written.cert_path.exists());
    }

    #[test]
    fn test_failed_issuance_removes_temp_dir() {
        let parent = TempDir::new().unwrap();
        let mut config = test_config();
        config.serving.subject_alt_names = vec!["bücher.example".to_string()];

        let result = create_serving_certificates_in(parent.path(), &config);
        assert!(matches!(result, Err(DevCaError::CertificateError(_))));
        assert_eq!(fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_issue_serving_certificates_into_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config();
        config.serving.organizations = vec!["Dev Team".to_string()];

        let written = issue_serving_certificates(&config, temp_dir.path()).unwrap();
        assert_eq!(written.dir, temp_dir.path());
        assert!(written.key_path.ends_with(KEY_FILE_NAME));
        assert!(written.cert_path.ends_with(CERT_FILE_NAME));
    }

    #[test]
    fn test_invalid_config_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config();
        config.serving.port = 0;

        assert!(issue_serving_certificates(&config, temp_dir.path()).is_err());
        assert!(!temp_dir.path().join(KEY_FILE_NAME).exists());
    }

    #[test]
    fn test_webhook_endpoint() {
        let url = webhook_endpoint("192.168.1.20", 9443, "/validate-pods").unwrap();
        assert_eq!(url.as_str(), "https://192.168.1.20:9443/validate-pods");

        let url = webhook_endpoint("host.docker.internal", 8443, "/").unwrap();
        assert_eq!(url.as_str(), "https://host.docker.internal:8443/");
    }

    #[test]
    fn test_webhook_endpoint_ipv6() {
        let url = webhook_endpoint("2001:db8::1", 8443, "/mutate").unwrap();
        assert_eq!(url.as_str(), "https://[2001:db8::1]:8443/mutate");
    }

    #[test]
    fn test_webhook_endpoint_invalid_host() {
        assert!(webhook_endpoint("bad host", 443, "/").is_err());
    }
}
