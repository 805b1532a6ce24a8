//! The `domcheck` command line tools.
//!
//! Reads control flow graphs in the textual format of `domcheck-reader`, then dumps or checks
//! their dominators with `domcheck-codegen`.

pub mod commands;
pub(crate) mod common;
