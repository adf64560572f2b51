//! `custodia keygen` - ed25519 keypair plus a party certificate.

use anyhow::{bail, Context, Result};
use clap::Args;
use ed25519_dalek::SigningKey;
use std::path::PathBuf;

use custodia_core::{Certificate, Dn};

use crate::cli::material;
use crate::exit_codes;

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Subject distinguished name, e.g. "CN=alice,O=acme"
    #[arg(long)]
    pub dn: String,

    /// Output path for the private key (PKCS#8 PEM)
    #[arg(long)]
    pub out_key: PathBuf,

    /// Output path for the certificate (JSON)
    #[arg(long)]
    pub out_cert: PathBuf,

    /// Certificate lifetime in days
    #[arg(long, default_value_t = 365)]
    pub days: i64,

    /// Issuer private key; self-signed when absent
    #[arg(long, requires = "issuer_cert")]
    pub issuer_key: Option<PathBuf>,

    /// Issuer certificate; self-signed when absent
    #[arg(long, requires = "issuer_key")]
    pub issuer_cert: Option<PathBuf>,

    /// Overwrite existing files
    #[arg(long, short)]
    pub force: bool,
}

pub fn run(args: KeygenArgs) -> Result<i32> {
    if !args.force {
        for path in [&args.out_key, &args.out_cert] {
            if path.exists() {
                bail!(
                    "output already exists: {} (use --force to overwrite)",
                    path.display()
                );
            }
        }
    }

    let subject = Dn::parse(&args.dn)
        .with_context(|| format!("invalid subject distinguished name: {}", args.dn))?;
    let key = SigningKey::generate(&mut rand::thread_rng());

    let cert = match (&args.issuer_key, &args.issuer_cert) {
        (Some(issuer_key_path), Some(issuer_cert_path)) => {
            let issuer_key = material::load_signing_key(issuer_key_path)?;
            let issuer_cert = material::load_certificate(issuer_cert_path)?;
            Certificate::issue(
                subject,
                &key.verifying_key(),
                &issuer_cert,
                &issuer_key,
                args.days,
            )
            .context("failed to issue certificate")?
        }
        _ => Certificate::self_signed(subject, &key, args.days)
            .context("failed to self-sign certificate")?,
    };

    material::save_signing_key(&args.out_key, &key)?;
    material::save_certificate(&args.out_cert, &cert)?;

    println!("Generated ed25519 keypair:");
    println!("  Private key: {} (PKCS#8 PEM, mode 0600)", args.out_key.display());
    println!("  Certificate: {}", args.out_cert.display());
    println!();
    println!("subject:     {}", cert.tbs.subject);
    println!("fingerprint: {}", cert.fingerprint().context("fingerprint")?);

    Ok(exit_codes::OK)
}
