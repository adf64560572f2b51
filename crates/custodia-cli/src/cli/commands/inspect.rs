//! `custodia inspect` - per-hop summary of a chain file.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::cli::material;
use crate::exit_codes;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Chain file
    #[arg(long)]
    pub chain: PathBuf,
}

pub fn run(args: InspectArgs) -> Result<i32> {
    let chain = material::load_chain(&args.chain)?;
    println!(
        "{} ({} hops, {} mode)",
        args.chain.display(),
        chain.len(),
        chain
            .mode()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );

    for (i, hop) in chain.assertions().iter().enumerate() {
        println!();
        println!("hop {i}:");
        println!("  issuer:    {} ({})", hop.issuer().value, hop.issuer().format);
        println!("  receiver:  {}", hop.receiver_dn());
        println!("  custodian: {}", hop.custodian());
        let window = match (hop.not_before(), hop.not_on_or_after()) {
            (Some(nb), Some(na)) => format!("[{nb}, {na})"),
            (Some(nb), None) => format!("[{nb}, ...)"),
            (None, Some(na)) => format!("(..., {na})"),
            (None, None) => "unbounded".to_string(),
        };
        println!("  window:    {window}");
        if hop.max_proxy_count() > 0 {
            println!("  proxy:     at most {} assertions", hop.max_proxy_count());
        } else {
            println!("  proxy:     unrestricted");
        }
        match hop.signer_certificates() {
            Some(certs) => {
                for cert in certs {
                    println!(
                        "  signer:    {} (serial {})",
                        cert.tbs.subject, cert.tbs.serial
                    );
                }
            }
            None => println!("  signer:    no certificate in key-info"),
        }
    }
    Ok(exit_codes::OK)
}
