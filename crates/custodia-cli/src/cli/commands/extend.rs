//! `custodia extend` - append a hop to an existing chain.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use std::path::PathBuf;

use custodia_core::{DelegationRestrictions, Dn, Identity, SignatureEngine};

use crate::cli::material;
use crate::exit_codes;

#[derive(Args, Debug)]
pub struct ExtendArgs {
    /// Existing chain file
    #[arg(long)]
    pub chain: PathBuf,

    /// Signer private key (PKCS#8 PEM); must belong to the chain's current
    /// receiver
    #[arg(long)]
    pub key: PathBuf,

    /// Signer certificate chain, leaf first (repeatable)
    #[arg(long = "cert", required = true)]
    pub certs: Vec<PathBuf>,

    /// Receiver distinguished name (DN-mode chains)
    #[arg(long, conflicts_with = "receiver_cert")]
    pub receiver_dn: Option<String>,

    /// Receiver certificate chain, leaf first (repeatable,
    /// certificate-mode chains)
    #[arg(long = "receiver-cert")]
    pub receiver_cert: Vec<PathBuf>,

    /// Validity window in days from now
    #[arg(long, default_value_t = 14)]
    pub days: i64,

    /// Maximum further re-delegations; zero or negative is unrestricted
    #[arg(long, default_value_t = 1)]
    pub proxy: i32,

    /// Output chain file
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: ExtendArgs) -> Result<i32> {
    let engine = SignatureEngine::new();
    let chain = material::load_chain(&args.chain)?;
    let key = material::load_signing_key(&args.key)?;
    let issuer_chain = material::load_certificates(&args.certs)?;
    let restrictions = DelegationRestrictions::valid_for_days(Utc::now(), args.days, args.proxy)
        .context("invalid validity window")?;

    let receiver = if let Some(receiver_dn) = &args.receiver_dn {
        Identity::Dn(
            Dn::parse(receiver_dn)
                .with_context(|| format!("invalid receiver DN: {receiver_dn}"))?,
        )
    } else {
        anyhow::ensure!(
            !args.receiver_cert.is_empty(),
            "either --receiver-dn or --receiver-cert is required"
        );
        Identity::Certificates(material::load_certificates(&args.receiver_cert)?)
    };

    let extended = chain
        .extended(&engine, &issuer_chain, &key, &receiver, Some(restrictions))
        .context("failed to extend chain")?;

    material::save_chain(&args.out, &extended)?;
    println!(
        "Wrote {}-hop chain: {}",
        extended.len(),
        args.out.display()
    );
    Ok(exit_codes::OK)
}
