//! The module for the `domcheck` CLI commands.

mod check;
mod dump;

pub use self::{check::*, dump::*};
