//! Reference dominator analysis for control flow graphs.
//!
//! `NaiveDominators` computes which blocks dominate which with a deliberately simple fixed-point
//! algorithm over bit-vectors. It is an oracle: the `verifier` module compares the dominator tree
//! produced by a faster algorithm against it.
#![deny(missing_docs)]

pub use cranelift_entity as entity;
pub use domcheck_bitset as bitset;

/// Even when trace logging is disabled, the trace macro has a significant performance cost so we
/// disable it by default.
#[macro_export]
macro_rules! trace {
    ($($tt:tt)*) => {
        if cfg!(any(feature = "trace-log", debug_assertions)) {
            ::log::trace!($($tt)*);
        }
    };
}

pub mod flowgraph;
pub mod idom_table;
pub mod naive_dominators;
pub mod verifier;

pub use crate::flowgraph::{Block, BlockGraph, ControlFlowGraph};
pub use crate::idom_table::IdomTable;
pub use crate::naive_dominators::{DisplayDominators, NaiveDominators};
pub use crate::verifier::{
    Dominance, VerifierError, VerifierErrors, VerifierResult, VerifierStepResult,
    verify_dominance, verify_dominator_sets, verify_dominators,
};
