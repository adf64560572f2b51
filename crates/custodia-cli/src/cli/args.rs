use clap::{Parser, Subcommand};

use super::commands;

#[derive(Parser)]
#[command(
    name = "custodia",
    version,
    about = "Extended trust delegation: issue, extend, verify and inspect chains of signed delegation assertions"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate an ed25519 keypair and a party certificate
    Keygen(commands::keygen::KeygenArgs),
    /// Issue the first assertion of a delegation chain
    Issue(commands::issue::IssueArgs),
    /// Append a hop to an existing chain
    Extend(commands::extend::ExtendArgs),
    /// Validate a chain for a claimed subject and user
    Verify(commands::verify::VerifyArgs),
    /// Print a per-hop summary of a chain file
    Inspect(commands::inspect::InspectArgs),
}
