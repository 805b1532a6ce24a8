//! The `dump` subcommand.

use crate::common::{init_logging, read_to_string};
use anyhow::{Context, Result};
use clap::Parser;
use domcheck_codegen::NaiveDominators;
use domcheck_reader::parse_graphs;
use std::fmt::Write;
use std::path::PathBuf;

/// Prints the dominator sets of every graph in the given files
#[derive(Parser)]
pub struct DumpCommand {
    /// Files containing graphs. Use '-' for stdin.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    debug: bool,
}

impl DumpCommand {
    /// Executes the command.
    pub fn execute(self) -> Result<()> {
        init_logging(self.debug);
        for (i, path) in self.files.iter().enumerate() {
            if i != 0 {
                println!();
            }
            let text = read_to_string(path)?;
            let dump = dump_graphs(&text).with_context(|| format!("in {}", path.display()))?;
            print!("{dump}");
        }
        Ok(())
    }
}

/// Parse `text` and render the dominator sets of each graph in it.
///
/// Graphs are separated by a blank line, and named graphs start with their `graph %name` header.
pub fn dump_graphs(text: &str) -> Result<String> {
    let graphs = parse_graphs(text)?;
    let mut doms = NaiveDominators::new();
    let mut out = String::new();
    for (i, graph) in graphs.iter().enumerate() {
        if i != 0 {
            out.push('\n');
        }
        if let Some(name) = &graph.name {
            writeln!(out, "graph %{name}")?;
        }
        doms.compute(&graph.cfg);
        doms.dump(&mut out)?;
    }
    Ok(out)
}
