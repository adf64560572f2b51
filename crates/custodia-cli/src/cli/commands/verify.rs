//! `custodia verify` - run the chain validator.
//!
//! Exit code 0 when the chain is valid, 3 when it is rejected.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use custodia_core::{
    AnchoredPathValidator, CertPathValidator, ChainValidator, Dn, PermissivePathValidator,
    SignatureEngine, TrustedIssuerStore,
};

use crate::cli::material;
use crate::exit_codes;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Chain file to validate
    #[arg(long)]
    pub chain: PathBuf,

    /// Claimed subject distinguished name (DN-mode chains)
    #[arg(long, conflicts_with = "subject_cert")]
    pub subject_dn: Option<String>,

    /// Claimed subject certificate chain, leaf first (repeatable)
    #[arg(long = "subject-cert")]
    pub subject_cert: Vec<PathBuf>,

    /// Claimed root user distinguished name (DN-mode chains)
    #[arg(long, conflicts_with = "user_cert")]
    pub user_dn: Option<String>,

    /// Claimed root user certificate chain, leaf first (repeatable)
    #[arg(long = "user-cert")]
    pub user_cert: Vec<PathBuf>,

    /// YAML trust policy: trusted bootstrap issuers, also used as path
    /// anchors. Without it, certificate paths are not anchored.
    #[arg(long)]
    pub trust: Option<PathBuf>,
}

pub fn run(args: VerifyArgs) -> Result<i32> {
    let engine = SignatureEngine::new();
    let chain = material::load_chain(&args.chain)?;

    let trusted = match &args.trust {
        Some(path) => TrustedIssuerStore::from_file(path)
            .with_context(|| format!("failed to load trust policy: {}", path.display()))?,
        None => TrustedIssuerStore::new(),
    };
    let anchored;
    let permissive;
    let path_validator: &dyn CertPathValidator = if args.trust.is_some() {
        anchored = AnchoredPathValidator::new(trusted.clone());
        &anchored
    } else {
        permissive = PermissivePathValidator;
        &permissive
    };

    let validator = ChainValidator::new(&engine, path_validator, &trusted);

    let result = if let (Some(subject), Some(user)) = (&args.subject_dn, &args.user_dn) {
        let subject = Dn::parse(subject).with_context(|| format!("invalid subject DN: {subject}"))?;
        let user = Dn::parse(user).with_context(|| format!("invalid user DN: {user}"))?;
        validator
            .validate_dn(&chain, &subject, &user)
            .context("chain validation failed")?
    } else {
        anyhow::ensure!(
            !args.subject_cert.is_empty() && !args.user_cert.is_empty(),
            "provide --subject-dn/--user-dn or --subject-cert/--user-cert"
        );
        let subject_chain = material::load_certificates(&args.subject_cert)?;
        let user_chain = material::load_certificates(&args.user_cert)?;
        validator
            .validate_certs(&chain, &subject_chain, &user_chain)
            .context("chain validation failed")?
    };

    println!("{result}");
    if result.is_valid() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::VALIDATION_REJECTED)
    }
}
