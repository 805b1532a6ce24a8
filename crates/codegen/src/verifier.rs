//! Dominance verifier.
//!
//! The naive dominator relation is an oracle: an embedding compiler computes its dominator tree
//! with a fast algorithm, then asks this module to compare it, block pair by block pair, against
//! `NaiveDominators` for the same graph. Any disagreement is a bug in one of the two and is
//! reported as a `VerifierError`, never as a user-facing diagnostic.
//!
//! The verifier also checks the naive relation against the defining properties of dominance:
//!
//! - Every block dominates itself.
//! - The entry block is dominated only by itself.
//! - A reachable block other than the entry is dominated by itself and by the blocks that
//!   dominate all of its reachable predecessors.
//! - Unreachable blocks are dominated only by themselves.
//! - No two distinct blocks dominate each other.
//! - Dominance is transitive.
//!
//! Like Cranelift's IR verifier, the checks report into a `VerifierErrors` accumulator and
//! return a `VerifierStepResult`, where `Err(())` means a fatal error stopped the check early.

use crate::flowgraph::{Block, BlockGraph};
use crate::idom_table::IdomTable;
use crate::naive_dominators::NaiveDominators;
use core::fmt;
use cranelift_entity::EntityRef;
use domcheck_bitset::BitVector;
use thiserror::Error;

/// Queries every dominator implementation can answer, so that two of them can be compared.
pub trait Dominance {
    /// Is `block` reachable from the entry block?
    fn is_reachable(&self, block: Block) -> bool;

    /// The immediate dominator of `block`, or `None` for the entry and unreachable blocks.
    fn idom(&self, block: Block) -> Option<Block>;

    /// Does `a` dominate `b`? Blocks dominate themselves.
    fn dominates(&self, a: Block, b: Block) -> bool;
}

impl Dominance for NaiveDominators {
    fn is_reachable(&self, block: Block) -> bool {
        NaiveDominators::is_reachable(self, block)
    }

    fn idom(&self, block: Block) -> Option<Block> {
        NaiveDominators::idom(self, block)
    }

    fn dominates(&self, a: Block, b: Block) -> bool {
        NaiveDominators::dominates(self, a, b)
    }
}

impl Dominance for IdomTable {
    fn is_reachable(&self, block: Block) -> bool {
        IdomTable::is_reachable(self, block)
    }

    fn idom(&self, block: Block) -> Option<Block> {
        IdomTable::idom(self, block)
    }

    fn dominates(&self, a: Block, b: Block) -> bool {
        IdomTable::dominates(self, a, b)
    }
}

/// A verifier error.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[error("{location}: {message}")]
pub struct VerifierError {
    /// The block the error is about.
    pub location: Block,
    /// The error message.
    pub message: String,
}

impl From<(Block, String)> for VerifierError {
    fn from((location, message): (Block, String)) -> Self {
        Self { location, message }
    }
}

impl From<(Block, &str)> for VerifierError {
    fn from((location, message): (Block, &str)) -> Self {
        Self {
            location,
            message: message.to_string(),
        }
    }
}

/// Result of a step in the verification.
///
/// If the step was successful, the result is `Ok(())` even if non-fatal errors were reported.
/// `Err(())` means a fatal error was reported and the check stopped.
pub type VerifierStepResult = Result<(), ()>;

/// Result of a verification operation.
pub type VerifierResult<T> = Result<T, VerifierErrors>;

/// List of verifier errors.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct VerifierErrors(pub Vec<VerifierError>);

impl std::error::Error for VerifierErrors {}

impl VerifierErrors {
    /// Return a new `VerifierErrors` struct.
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Return whether no errors were reported.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return whether one or more errors were reported.
    #[inline]
    pub fn has_error(&self) -> bool {
        !self.0.is_empty()
    }

    /// Return a `VerifierStepResult` that is fatal if at least one error was reported.
    #[inline]
    pub fn as_result(&self) -> VerifierStepResult {
        if self.is_empty() { Ok(()) } else { Err(()) }
    }

    /// Report an error, adding it to the list of errors.
    pub fn report(&mut self, error: impl Into<VerifierError>) {
        self.0.push(error.into());
    }

    /// Report a fatal error and return `Err`.
    pub fn fatal(&mut self, error: impl Into<VerifierError>) -> VerifierStepResult {
        self.report(error);
        Err(())
    }

    /// Report a non-fatal error and return `Ok`.
    pub fn nonfatal(&mut self, error: impl Into<VerifierError>) -> VerifierStepResult {
        self.report(error);
        Ok(())
    }
}

impl From<Vec<VerifierError>> for VerifierErrors {
    fn from(v: Vec<VerifierError>) -> Self {
        Self(v)
    }
}

impl From<VerifierErrors> for Vec<VerifierError> {
    fn from(errors: VerifierErrors) -> Vec<VerifierError> {
        errors.0
    }
}

impl From<VerifierErrors> for VerifierResult<()> {
    fn from(errors: VerifierErrors) -> VerifierResult<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl fmt::Display for VerifierErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for err in &self.0 {
            writeln!(f, "- {err}")?;
        }
        Ok(())
    }
}

struct DisplayIdom(Option<Block>);

impl fmt::Display for DisplayIdom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Some(block) => write!(f, "{block}"),
            None => write!(f, "none"),
        }
    }
}

/// Compute the naive dominator relation of `graph` and compare `candidate` against it.
///
/// This is the entry point for an embedding compiler cross-checking its own dominator tree.
pub fn verify_dominators<G, D>(graph: &G, candidate: &D) -> VerifierResult<()>
where
    G: BlockGraph,
    D: Dominance + ?Sized,
{
    let reference = NaiveDominators::with_graph(graph);
    let mut errors = VerifierErrors::new();
    let _ = verify_dominator_sets(graph, &reference, &mut errors)
        .and_then(|()| verify_dominance(graph, &reference, candidate, &mut errors));
    if errors.has_error() {
        log::debug!("dominator verification found {} errors", errors.0.len());
    }
    errors.into()
}

/// Compare `candidate` against the naive relation `reference` for every block and every pair of
/// blocks of `graph`.
///
/// Reachability, immediate dominators and `dominates` answers must all agree. Each disagreement
/// is reported as a non-fatal error.
pub fn verify_dominance<G, D>(
    graph: &G,
    reference: &NaiveDominators,
    candidate: &D,
    errors: &mut VerifierErrors,
) -> VerifierStepResult
where
    G: BlockGraph,
    D: Dominance + ?Sized,
{
    check_same_graph(graph, reference);

    let blocks = || (0..graph.num_blocks()).map(Block::new);
    for b in blocks() {
        let reachable = reference.is_reachable(b);
        if candidate.is_reachable(b) != reachable {
            let expected = if reachable { "reachable" } else { "unreachable" };
            errors.nonfatal((b, format!("block should be {expected}")))?;
        }

        let idom = reference.idom(b);
        let got = candidate.idom(b);
        if got != idom {
            errors.nonfatal((
                b,
                format!(
                    "immediate dominator is {}, expected {}",
                    DisplayIdom(got),
                    DisplayIdom(idom)
                ),
            ))?;
        }

        for a in blocks() {
            let dominates = reference.dominates(a, b);
            if candidate.dominates(a, b) != dominates {
                let verb = if dominates { "should" } else { "should not" };
                errors.nonfatal((b, format!("{a} {verb} dominate {b}")))?;
            }
        }
    }

    errors.as_result()
}

/// Check the naive relation `doms` for `graph` against the defining properties of dominance.
///
/// A failure here means the reference implementation itself is broken, so the first violated
/// property is reported as a fatal error.
pub fn verify_dominator_sets<G: BlockGraph>(
    graph: &G,
    doms: &NaiveDominators,
    errors: &mut VerifierErrors,
) -> VerifierStepResult {
    check_same_graph(graph, doms);

    let num_blocks = graph.num_blocks();
    let Some(entry) = graph.entry_block() else {
        return Ok(());
    };

    let mut expected = BitVector::new(num_blocks);
    for b in (0..num_blocks).map(Block::new) {
        let set = doms.dominator_set(b);
        if !set.get(b.index()) {
            return errors.fatal((b, "block does not dominate itself"));
        }

        if b == entry || !doms.is_reachable(b) {
            if set.count() != 1 {
                return errors.fatal((
                    b,
                    format!("block should only be dominated by itself, found {set:?}"),
                ));
            }
            continue;
        }

        expected.set_all();
        for pred in graph.pred_iter(b).filter(|&p| doms.is_reachable(p)) {
            expected.intersect_with(doms.dominator_set(pred));
        }
        expected.set(b.index());
        if *set != expected {
            return errors.fatal((
                b,
                format!("dominator set {set:?} is not the meet of its predecessors, {expected:?}"),
            ));
        }

        for a in doms.dominators(b).filter(|&a| a != b) {
            if doms.dominates(b, a) {
                return errors.fatal((b, format!("{a} and {b} dominate each other")));
            }
            if !doms.dominator_set(a).is_subset(set) {
                return errors.fatal((b, format!("dominance is not transitive through {a}")));
            }
        }
    }

    Ok(())
}

fn check_same_graph<G: BlockGraph>(graph: &G, doms: &NaiveDominators) {
    assert_eq!(
        graph.num_blocks(),
        doms.num_blocks(),
        "dominators were computed for a different graph"
    );
}
