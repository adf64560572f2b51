pub mod extend;
pub mod inspect;
pub mod issue;
pub mod keygen;
pub mod verify;

use anyhow::Result;

use super::args::{Cli, Command};

pub fn dispatch(cli: Cli) -> Result<i32> {
    match cli.cmd {
        Command::Keygen(args) => keygen::run(args),
        Command::Issue(args) => issue::run(args),
        Command::Extend(args) => extend::run(args),
        Command::Verify(args) => verify::run(args),
        Command::Inspect(args) => inspect::run(args),
    }
}
