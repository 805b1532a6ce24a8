//! The `check` subcommand.

use crate::common::{init_logging, read_to_string};
use anyhow::{Context, Result, bail};
use clap::Parser;
use domcheck_codegen::{
    NaiveDominators, VerifierErrors, VerifierResult, verify_dominance, verify_dominator_sets,
};
use domcheck_reader::{ParsedGraph, parse_graphs};
use std::path::PathBuf;

/// Checks the dominators of every graph against its `dominates(...)` annotations
#[derive(Parser)]
pub struct CheckCommand {
    /// Files containing graphs. Use '-' for stdin.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    debug: bool,
}

impl CheckCommand {
    /// Executes the command.
    pub fn execute(self) -> Result<()> {
        init_logging(self.debug);
        let mut failures = 0;
        for path in &self.files {
            let text = read_to_string(path)?;
            let graphs =
                parse_graphs(&text).with_context(|| format!("failed to parse {}", path.display()))?;
            for graph in &graphs {
                let label = graph_label(path.display(), graph);
                match check_graph(graph) {
                    Ok(()) => println!("{label}: ok"),
                    Err(errors) => {
                        failures += 1;
                        print!("{label}: failed\n{errors}");
                    }
                }
            }
        }
        if failures != 0 {
            bail!("{failures} graphs failed the dominator check");
        }
        Ok(())
    }
}

fn graph_label(file: impl std::fmt::Display, graph: &ParsedGraph) -> String {
    match &graph.name {
        Some(name) => format!("{file}: %{name}"),
        None => format!("{file}:{}", graph.location.line_number),
    }
}

/// Compute the naive dominators of `graph` and check them.
///
/// The dominator sets must satisfy the defining properties of dominance, and when the graph
/// carries expected immediate dominators the two must agree on every block and pair of blocks.
pub fn check_graph(graph: &ParsedGraph) -> VerifierResult<()> {
    let doms = NaiveDominators::with_graph(&graph.cfg);
    let mut errors = VerifierErrors::new();
    let _ = verify_dominator_sets(&graph.cfg, &doms, &mut errors).and_then(|()| {
        match &graph.expected {
            Some(expected) => verify_dominance(&graph.cfg, &doms, expected, &mut errors),
            None => Ok(()),
        }
    });
    log::debug!(
        "checked {} blocks, {} errors",
        doms.num_blocks(),
        errors.0.len()
    );
    errors.into()
}
