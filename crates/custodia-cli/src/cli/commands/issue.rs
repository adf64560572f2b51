//! `custodia issue` - first assertion of a delegation chain.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use std::path::PathBuf;

use custodia_core::{
    generate_bootstrap, generate_cert, generate_dn, DelegationChain, DelegationRestrictions, Dn,
    SignatureEngine,
};

use crate::cli::material;
use crate::exit_codes;

#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Custodian distinguished name (DN mode, or the bootstrap custodian)
    #[arg(long, conflicts_with = "custodian_cert")]
    pub custodian_dn: Option<String>,

    /// Custodian certificate file (certificate mode)
    #[arg(long)]
    pub custodian_cert: Option<PathBuf>,

    /// Issue a bootstrap assertion: the signer differs from the custodian
    #[arg(long, requires = "custodian_dn")]
    pub bootstrap: bool,

    /// Bootstrap issuer identity value
    #[arg(long, requires = "bootstrap")]
    pub issuer_name: Option<String>,

    /// Bootstrap issuer identity format URI
    #[arg(
        long,
        requires = "bootstrap",
        default_value = custodia_core::document::NAMEID_FORMAT_ENTITY
    )]
    pub issuer_format: String,

    /// Signer private key (PKCS#8 PEM)
    #[arg(long)]
    pub key: PathBuf,

    /// Signer certificate chain, leaf first (repeatable)
    #[arg(long = "cert", required = true)]
    pub certs: Vec<PathBuf>,

    /// Receiver distinguished name (DN mode)
    #[arg(long, conflicts_with = "receiver_cert")]
    pub receiver_dn: Option<String>,

    /// Receiver certificate chain, leaf first (repeatable, certificate mode)
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

pub fn run(args: IssueArgs) -> Result<i32> {
    let engine = SignatureEngine::new();
    let key = material::load_signing_key(&args.key)?;
    let issuer_chain = material::load_certificates(&args.certs)?;
    let restrictions = DelegationRestrictions::valid_for_days(Utc::now(), args.days, args.proxy)
        .context("invalid validity window")?;

    let first = if let Some(custodian_cert_path) = &args.custodian_cert {
        let custodian_cert = material::load_certificate(custodian_cert_path)?;
        let receiver_chain = material::load_certificates(&args.receiver_cert)?;
        anyhow::ensure!(
            !receiver_chain.is_empty(),
            "certificate mode requires at least one --receiver-cert"
        );
        generate_cert(
            &engine,
            &custodian_cert,
            &key,
            &issuer_chain,
            &receiver_chain,
            Some(restrictions),
        )
        .context("failed to issue assertion")?
    } else {
        let custodian_dn = args
            .custodian_dn
            .as_deref()
            .context("either --custodian-dn or --custodian-cert is required")?;
        let custodian_dn = Dn::parse(custodian_dn)
            .with_context(|| format!("invalid custodian DN: {custodian_dn}"))?;
        let receiver_dn = args
            .receiver_dn
            .as_deref()
            .context("DN mode requires --receiver-dn")?;
        let receiver_dn = Dn::parse(receiver_dn)
            .with_context(|| format!("invalid receiver DN: {receiver_dn}"))?;

        if args.bootstrap {
            let issuer_name = args
                .issuer_name
                .as_deref()
                .context("--bootstrap requires --issuer-name")?;
            generate_bootstrap(
                &engine,
                &custodian_dn,
                &key,
                &issuer_chain,
                issuer_name,
                &args.issuer_format,
                &receiver_dn,
                Some(restrictions),
            )
            .context("failed to issue bootstrap assertion")?
        } else {
            generate_dn(
                &engine,
                &custodian_dn,
                &key,
                &issuer_chain,
                &receiver_dn,
                Some(restrictions),
            )
            .context("failed to issue assertion")?
        }
    };

    let chain = DelegationChain::new(first);
    material::save_chain(&args.out, &chain)?;
    println!("Wrote 1-hop chain: {}", args.out.display());
    Ok(exit_codes::OK)
}
