//! devca CLI application.
//!
//! This binary creates a throwaway certificate authority, issues a serving
//! certificate for a development webhook, and inspects or verifies the
//! resulting PEM files.

use clap::{Parser, Subcommand};
use devca::cert::builder::cert_from_pem;
use devca::cert::inspect;
use devca::cert::verify::verify_pem_chain;
use devca::config::Config;
use devca::error::Result;
use devca::serving::{create_serving_certificates, issue_serving_certificates, webhook_endpoint};
use devca::AuthorityConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "devca")]
#[command(about = "devca: throwaway TLS identities for development webhooks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a CA and issue a serving certificate
    Issue {
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Common name of the certificate authority
        #[arg(long)]
        name: Option<String>,

        /// Common name of the serving certificate
        #[arg(long)]
        common_name: Option<String>,

        /// Subject organization (repeatable)
        #[arg(long = "org")]
        organizations: Vec<String>,

        /// Extra Subject Alternative Name (repeatable)
        #[arg(long = "san")]
        sans: Vec<String>,

        /// RSA modulus size for both CA and leaf keys
        #[arg(long)]
        key_bits: Option<usize>,

        /// Host the webhook is advertised at
        #[arg(long)]
        host: Option<String>,

        /// Port the webhook listens on
        #[arg(long)]
        port: Option<u16>,

        /// Webhook path
        #[arg(long)]
        path: Option<String>,

        /// Output directory (default: a new temporary directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Print the contents of a PEM certificate
    Inspect {
        /// Certificate file
        #[arg(long)]
        cert: PathBuf,
    },

    /// Verify a certificate against a CA certificate
    Verify {
        /// CA certificate file
        #[arg(long)]
        ca: PathBuf,

        /// Certificate file
        #[arg(long)]
        cert: PathBuf,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Issue {
            config,
            name,
            common_name,
            organizations,
            sans,
            key_bits,
            host,
            port,
            path,
            out_dir,
        } => {
            let mut config = match config {
                Some(path) => Config::load(&path)?,
                None => Config::default(),
            };

            if let Some(name) = name {
                config.serving.authority_name = name;
            }
            if let Some(common_name) = common_name {
                config.serving.common_name = common_name;
            }
            if !organizations.is_empty() {
                config.serving.organizations = organizations;
            }
            config.serving.subject_alt_names.extend(sans);
            if let Some(bits) = key_bits {
                config.authority = AuthorityConfig::with_key_bits(bits);
            }
            if let Some(host) = host {
                config.serving.advertise_host = host;
            }
            if let Some(port) = port {
                config.serving.port = port;
            }
            if let Some(path) = path {
                config.serving.webhook_path = path;
            }

            handle_issue_command(&config, out_dir)
        }
        Commands::Inspect { cert } => handle_inspect_command(&cert),
        Commands::Verify { ca, cert } => handle_verify_command(&ca, &cert),
    }
}

fn handle_issue_command(config: &Config, out_dir: Option<PathBuf>) -> Result<()> {
    config.validate()?;

    info!(
        authority = %config.serving.authority_name,
        bits = config.authority.ca_key_bits,
        "creating certificate authority"
    );

    let written = match out_dir {
        Some(dir) => {
            fs::create_dir_all(&dir)?;
            issue_serving_certificates(config, &dir)?
        }
        None => create_serving_certificates(config)?,
    };

    let endpoint = webhook_endpoint(
        &config.serving.advertise_host,
        config.serving.port,
        &config.serving.webhook_path,
    )?;

    info!(dir = %written.dir.display(), "wrote serving certificates");

    println!("✓ Issued serving certificate for: {}", config.serving.common_name);
    println!("  Certificate: {}", written.cert_path.display());
    println!("  Private key: {}", written.key_path.display());
    println!("  CA certificate: {}", written.ca_path.display());
    println!("  Webhook endpoint: {}", endpoint);
    println!("\nCA bundle:\n{}", written.ca_bundle);

    Ok(())
}

fn handle_inspect_command(cert_file: &Path) -> Result<()> {
    let pem = fs::read_to_string(cert_file)?;
    let cert = cert_from_pem(&pem)?;

    let validity = &cert.tbs_certificate.validity;
    let (dns_names, ip_addresses) = inspect::subject_alt_names(&cert)?;

    println!(
        "Subject CN: {}",
        inspect::common_name(&cert).unwrap_or_else(|| "<none>".to_string())
    );
    println!("Serial: {}", inspect::serial_hex(&cert));
    println!("Not before: {}", validity.not_before);
    println!("Not after: {}", validity.not_after);
    println!("CA: {}", inspect::is_ca(&cert)?);

    if !dns_names.is_empty() {
        println!("DNS names:");
        for name in dns_names {
            println!("  {}", name);
        }
    }
    if !ip_addresses.is_empty() {
        println!("IP addresses:");
        for ip in ip_addresses {
            println!("  {}", ip);
        }
    }

    Ok(())
}

fn handle_verify_command(ca_file: &Path, cert_file: &Path) -> Result<()> {
    let ca_pem = fs::read_to_string(ca_file)?;
    let cert_pem = fs::read_to_string(cert_file)?;

    verify_pem_chain(&cert_pem, &ca_pem)?;

    println!("✓ {} is signed by {}", cert_file.display(), ca_file.display());
    Ok(())
}
