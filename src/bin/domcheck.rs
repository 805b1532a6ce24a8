//! The `domcheck` command line tool.
//!
//! Computes reference dominators for control flow graphs written in text.
//! See `domcheck --help` for usage.

use anyhow::Result;
use clap::Parser;

/// Reference dominator checker for control flow graphs
#[derive(Parser)]
#[command(name = "domcheck", version)]
enum Domcheck {
    /// Print the dominator set of every block
    Dump(domcheck_tools::commands::DumpCommand),

    /// Check dominators against the `dominates(...)` annotations in the input
    Check(domcheck_tools::commands::CheckCommand),
}

impl Domcheck {
    /// Executes the command.
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Dump(c) => c.execute(),
            Self::Check(c) => c.execute(),
        }
    }
}

fn main() -> Result<()> {
    Domcheck::parse().execute()
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Domcheck::command().debug_assert()
}
