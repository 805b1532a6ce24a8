//! Reader for the textual control flow graph format used by dominator tests.
//!
//! A test file holds one or more graphs. Each graph is a list of `blockN: successors` lines,
//! optionally preceded by a `graph %name` header. A `; dominates(...)` comment on a block line
//! names the blocks that block is expected to immediately dominate.
#![deny(missing_docs)]

mod error;
mod parser;

pub use crate::error::{Location, ParseError, ParseResult};
pub use crate::parser::{ParsedGraph, parse_graphs};
