//! Reference dominator computation, one bit-vector per block.
//!
//! `NaiveDominators` computes the full dominator relation of a control flow graph with the
//! textbook iterative dataflow algorithm: every block other than the entry starts out dominated
//! by every block, and each pass narrows a block's set to the intersection of its predecessors'
//! sets plus the block itself, until nothing changes.
//!
//! This is quadratic in the number of blocks and is not meant to be fast. It is meant to be
//! obviously correct, so that the output of a production dominator algorithm can be compared
//! against it block for block.
//!
//! # Unreachable blocks
//!
//! Dominance is not meaningful for blocks that can't be reached from the entry. After the fixed
//! point is reached, unreachable blocks are flagged (see [`NaiveDominators::is_reachable`]) and
//! their sets are reduced to the block itself. An unreachable block therefore dominates only
//! itself and is dominated only by itself, which is also how a dominator tree answers queries
//! about blocks it never visited.

use crate::flowgraph::{Block, BlockGraph};
use crate::idom_table::IdomTable;
use core::fmt;
use cranelift_entity::{EntityRef, PrimaryMap};
use domcheck_bitset::BitVector;

/// The dominator relation of a single control flow graph, as a bit-vector per block.
///
/// Bit `j` of the vector for block `i` is set if and only if `block j` dominates `block i`.
pub struct NaiveDominators {
    /// Dominator set for every block.
    doms: PrimaryMap<Block, BitVector>,
    /// Blocks reachable from the entry block.
    reachable: BitVector,
    /// Working set for a single fixed-point step. Never holds state between steps.
    scratch: BitVector,
    valid: bool,
}

impl NaiveDominators {
    /// Allocate a blank engine. Use `compute` to compute the dominator relation of a graph.
    pub fn new() -> Self {
        Self {
            doms: PrimaryMap::new(),
            reachable: BitVector::new(0),
            scratch: BitVector::new(0),
            valid: false,
        }
    }

    /// Allocate an engine and compute the dominator relation of `graph`.
    pub fn with_graph<G: BlockGraph>(graph: &G) -> Self {
        let mut doms = Self::new();
        doms.compute(graph);
        doms
    }

    /// Discard any previous result and compute the dominator relation of `graph` from scratch.
    ///
    /// Panics if the graph breaks the [`BlockGraph`] contract: an entry block other than `block0`,
    /// a non-empty graph without an entry, or a predecessor outside of the graph.
    pub fn compute<G: BlockGraph>(&mut self, graph: &G) {
        self.clear();

        let num_blocks = graph.num_blocks();
        let entry = match graph.entry_block() {
            Some(entry) => entry,
            None => {
                assert_eq!(num_blocks, 0, "graph with {num_blocks} blocks has no entry block");
                self.valid = true;
                return;
            }
        };
        assert_eq!(entry.index(), 0, "the entry block must be block0, not {entry}");

        let passes = self.compute_dominator_sets(graph, num_blocks);
        self.compute_reachability(graph);
        self.flag_unreachable();
        self.valid = true;

        log::debug!(
            "naive dominators: {} blocks, {} passes, {} unreachable",
            num_blocks,
            passes,
            num_blocks - self.reachable.count()
        );
    }

    /// Clear the computed relation. `is_valid()` returns false until the next `compute`.
    pub fn clear(&mut self) {
        self.doms.clear();
        self.reachable.reset_to(0, false);
        self.valid = false;
    }

    /// Has `compute` been called since the last `clear`?
    ///
    /// This says nothing about whether the graph has changed since.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of blocks in the graph the relation was computed for.
    pub fn num_blocks(&self) -> usize {
        self.doms.len()
    }

    /// Run the fixed-point iteration, returning the number of passes it took.
    fn compute_dominator_sets<G: BlockGraph>(&mut self, graph: &G, num_blocks: usize) -> usize {
        let mut entry_set = BitVector::new(num_blocks);
        entry_set.set(0);
        self.doms.push(entry_set);
        for _ in 1..num_blocks {
            self.doms.push(BitVector::full(num_blocks));
        }
        self.scratch.reset_to(num_blocks, true);

        // Every pass that changes something removes at least one bit, and dominance is fully
        // propagated along any acyclic path after `num_blocks - 1` passes. One more pass
        // confirms the fixed point.
        let max_passes = num_blocks + 1;
        let mut passes = 0;
        loop {
            passes += 1;
            assert!(
                passes <= max_passes,
                "dominator sets did not converge after {max_passes} passes"
            );

            let mut changed = false;
            for block in self.doms.keys().skip(1) {
                self.scratch.set_all();
                for pred in graph.pred_iter(block) {
                    assert!(
                        pred.index() < num_blocks,
                        "{block} has predecessor {pred} outside of a graph of {num_blocks} blocks"
                    );
                    self.scratch.intersect_with(&self.doms[pred]);
                }
                self.scratch.set(block.index());

                if self.scratch != self.doms[block] {
                    trace!("{} dominated by {:?}", block, self.scratch);
                    self.doms[block].copy_from(&self.scratch);
                    changed = true;
                }
            }

            if !changed {
                return passes;
            }
        }
    }

    /// Mark the blocks reachable from the entry.
    fn compute_reachability<G: BlockGraph>(&mut self, graph: &G) {
        self.reachable.reset_to(self.doms.len(), false);
        self.reachable.set(0);

        let mut changed = true;
        while changed {
            changed = false;
            for block in self.doms.keys().skip(1) {
                if self.reachable.get(block.index()) {
                    continue;
                }
                if graph
                    .pred_iter(block)
                    .any(|pred| self.reachable.get(pred.index()))
                {
                    self.reachable.set(block.index());
                    changed = true;
                }
            }
        }
    }

    /// Reduce the sets of unreachable blocks to the block itself.
    fn flag_unreachable(&mut self) {
        for (block, set) in self.doms.iter_mut() {
            if !self.reachable.get(block.index()) {
                trace!("{} is unreachable", block);
                set.clear_all();
                set.set(block.index());
            }
        }
    }

    fn check_valid(&self) {
        assert!(self.valid, "dominators queried before `compute`");
    }
}

/// Methods for querying the dominator relation.
impl NaiveDominators {
    /// Is `block` reachable from the entry block?
    pub fn is_reachable(&self, block: Block) -> bool {
        self.check_valid();
        self.reachable.get(block.index())
    }

    /// Returns `true` if `a` dominates `b`.
    ///
    /// A block is considered to dominate itself. An unreachable block dominates only itself and
    /// is dominated only by itself.
    ///
    /// The result describes the graph passed to the last `compute`. Panics if nothing has been
    /// computed, or if either block is outside of the graph.
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        self.check_valid();
        self.doms[b].get(a.index())
    }

    /// Returns `true` if `a` dominates `b` and `a != b`.
    pub fn strictly_dominates(&self, a: Block, b: Block) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Iterate over the dominators of `block` in block order, including `block` itself.
    pub fn dominators(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        self.check_valid();
        self.doms[block].iter().map(Block::new)
    }

    /// The dominator set of `block`: bit `j` is set if `block j` dominates `block`.
    ///
    /// This is what another dominator implementation's output can be compared against,
    /// bit-vector for bit-vector.
    pub fn dominator_set(&self, block: Block) -> &BitVector {
        self.check_valid();
        &self.doms[block]
    }

    /// Returns the immediate dominator of `block`.
    ///
    /// The strict dominators of a block form a chain, and the immediate dominator is the end of
    /// that chain closest to `block`: the strict dominator with the most dominators of its own.
    ///
    /// This returns `None` for the entry block and for unreachable blocks.
    pub fn idom(&self, block: Block) -> Option<Block> {
        if !self.is_reachable(block) {
            return None;
        }
        self.dominators(block)
            .filter(|&dom| dom != block)
            .max_by_key(|&dom| self.doms[dom].count())
    }

    /// Build the dominator tree of the relation, as immediate-dominator links.
    pub fn to_idom_table(&self) -> IdomTable {
        self.check_valid();
        let mut table = IdomTable::new();
        if self.doms.is_empty() {
            return table;
        }
        table.set_entry(Block::new(0));
        for block in self.doms.keys() {
            if let Some(idom) = self.idom(block) {
                table.set_idom(block, idom);
            }
        }
        table
    }

    /// Write the relation to `w`, one line per block in block order.
    ///
    /// Each line lists the dominators of the block in block order, `block3: block0 block1 block3`,
    /// or reads `block3: unreachable`. The format is stable so that dumps from different dominator
    /// implementations can be diffed.
    pub fn dump(&self, w: &mut dyn fmt::Write) -> fmt::Result {
        self.check_valid();
        for (block, set) in self.doms.iter() {
            write!(w, "{block}:")?;
            if self.reachable.get(block.index()) {
                for dom in set.iter() {
                    write!(w, " {}", Block::new(dom))?;
                }
            } else {
                write!(w, " unreachable")?;
            }
            writeln!(w)?;
        }
        Ok(())
    }

    /// Get an object implementing `Display` that prints the same text as `dump`.
    pub fn display(&self) -> DisplayDominators<'_> {
        DisplayDominators(self)
    }
}

impl Default for NaiveDominators {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapper type capable of displaying a `NaiveDominators`.
pub struct DisplayDominators<'a>(&'a NaiveDominators);

impl fmt::Display for DisplayDominators<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.dump(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowgraph::ControlFlowGraph;

    fn block(n: usize) -> Block {
        Block::new(n)
    }

    fn doms_of(num_blocks: usize, edges: &[(usize, usize)]) -> NaiveDominators {
        let cfg = ControlFlowGraph::with_edges(num_blocks, edges.iter().copied());
        NaiveDominators::with_graph(&cfg)
    }

    fn dominators_of(doms: &NaiveDominators, n: usize) -> Vec<usize> {
        doms.dominators(block(n)).map(|b| b.index()).collect()
    }

    #[test]
    fn empty() {
        let doms = doms_of(0, &[]);
        assert!(doms.is_valid());
        assert_eq!(doms.num_blocks(), 0);
        assert_eq!(doms.display().to_string(), "");
        assert_eq!(doms.to_idom_table().entry_block(), None);
    }

    #[test]
    fn single_block() {
        let doms = doms_of(1, &[]);
        assert!(doms.dominates(block(0), block(0)));
        assert!(doms.is_reachable(block(0)));
        assert_eq!(doms.idom(block(0)), None);
        assert_eq!(doms.display().to_string(), "block0: block0\n");
    }

    #[test]
    fn linear_chain() {
        let doms = doms_of(3, &[(0, 1), (1, 2)]);
        assert!(doms.dominates(block(0), block(1)));
        assert!(doms.dominates(block(0), block(2)));
        assert!(doms.dominates(block(1), block(2)));
        assert!(!doms.dominates(block(2), block(1)));
        assert!(!doms.dominates(block(1), block(0)));
        assert_eq!(doms.idom(block(2)), Some(block(1)));
        assert_eq!(doms.idom(block(1)), Some(block(0)));
    }

    #[test]
    fn diamond() {
        let doms = doms_of(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        assert!(doms.dominates(block(0), block(3)));
        assert!(!doms.dominates(block(1), block(3)));
        assert!(!doms.dominates(block(2), block(3)));
        assert_eq!(dominators_of(&doms, 3), [0, 3]);
        assert_eq!(doms.idom(block(3)), Some(block(0)));
    }

    #[test]
    fn loop_with_back_edge() {
        let doms = doms_of(3, &[(0, 1), (1, 2), (2, 1)]);
        assert!(doms.dominates(block(0), block(1)));
        assert!(doms.dominates(block(1), block(2)));
        assert!(doms.dominates(block(0), block(2)));
        assert!(!doms.dominates(block(2), block(1)));
        assert!(doms.strictly_dominates(block(1), block(2)));
        assert!(!doms.strictly_dominates(block(1), block(1)));
    }

    #[test]
    fn unreachable_block() {
        let doms = doms_of(3, &[(0, 1)]);
        assert!(!doms.is_reachable(block(2)));
        assert!(doms.dominates(block(2), block(2)));
        assert!(!doms.dominates(block(0), block(2)));
        assert!(!doms.dominates(block(1), block(2)));
        assert!(!doms.dominates(block(2), block(0)));
        assert!(!doms.dominates(block(2), block(1)));
        assert_eq!(doms.idom(block(2)), None);
        assert_eq!(
            doms.display().to_string(),
            "block0: block0\n\
             block1: block0 block1\n\
             block2: unreachable\n"
        );
    }

    #[test]
    fn unreachable_cycle_feeding_a_merge() {
        // block2 and block3 form a cycle nobody enters; block3 also jumps into the merge block4.
        let doms = doms_of(5, &[(0, 1), (1, 4), (2, 3), (3, 2), (3, 4)]);
        assert!(!doms.is_reachable(block(2)));
        assert!(!doms.is_reachable(block(3)));
        assert!(doms.is_reachable(block(4)));
        assert_eq!(dominators_of(&doms, 4), [0, 1, 4]);
        assert_eq!(dominators_of(&doms, 3), [3]);
        assert_eq!(doms.idom(block(4)), Some(block(1)));
    }

    #[test]
    fn self_loop() {
        let with_loop = doms_of(3, &[(0, 1), (1, 1), (1, 2)]);
        let without = doms_of(3, &[(0, 1), (1, 2)]);
        assert_eq!(with_loop.display().to_string(), without.display().to_string());
    }

    #[test]
    fn jump_back_to_entry() {
        let doms = doms_of(2, &[(0, 1), (1, 0)]);
        assert_eq!(dominators_of(&doms, 0), [0]);
        assert_eq!(dominators_of(&doms, 1), [0, 1]);
    }

    #[test]
    fn nested_loops() {
        // 0 -> 1 -> 2 -> 3 -> 2, 3 -> 1, 1 -> 4
        let doms = doms_of(5, &[(0, 1), (1, 2), (2, 3), (3, 2), (3, 1), (1, 4)]);
        assert_eq!(dominators_of(&doms, 3), [0, 1, 2, 3]);
        assert_eq!(dominators_of(&doms, 4), [0, 1, 4]);
        assert!(!doms.dominates(block(2), block(4)));
    }

    #[test]
    fn late_numbered_predecessors() {
        // Blocks are visited in index order, so information has to flow "backwards" through
        // several passes here.
        let doms = doms_of(5, &[(0, 4), (4, 3), (3, 2), (2, 1)]);
        assert_eq!(dominators_of(&doms, 1), [0, 1, 2, 3, 4]);
        assert_eq!(doms.idom(block(1)), Some(block(2)));
    }

    #[test]
    fn recompute_replaces_result() {
        let mut doms = doms_of(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let first = doms.display().to_string();

        let cfg = ControlFlowGraph::with_edges(4, [(0, 1), (0, 2), (1, 3), (2, 3)]);
        doms.compute(&cfg);
        assert_eq!(doms.display().to_string(), first);

        let chain = ControlFlowGraph::with_edges(2, [(0, 1)]);
        doms.compute(&chain);
        assert_eq!(doms.num_blocks(), 2);
        assert_eq!(doms.display().to_string(), "block0: block0\nblock1: block0 block1\n");
    }

    #[test]
    fn idom_table_agrees() {
        let doms = doms_of(6, &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (4, 3)]);
        let table = doms.to_idom_table();
        assert_eq!(table.entry_block(), Some(block(0)));
        for a in 0..6 {
            assert_eq!(table.idom(block(a)), doms.idom(block(a)));
            for b in 0..6 {
                assert_eq!(
                    table.dominates(block(a), block(b)),
                    doms.dominates(block(a), block(b)),
                    "block{a} dominates block{b}"
                );
            }
        }
    }

    #[test]
    #[should_panic(expected = "queried before `compute`")]
    fn query_before_compute() {
        NaiveDominators::new().dominates(block(0), block(0));
    }

    #[test]
    #[should_panic(expected = "queried before `compute`")]
    fn query_after_clear() {
        let mut doms = doms_of(1, &[]);
        doms.clear();
        doms.dominates(block(0), block(0));
    }

    struct RawGraph {
        entry: Option<Block>,
        preds: Vec<Vec<Block>>,
    }

    impl BlockGraph for RawGraph {
        fn num_blocks(&self) -> usize {
            self.preds.len()
        }

        fn entry_block(&self) -> Option<Block> {
            self.entry
        }

        fn pred_iter(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
            self.preds[block.index()].iter().copied()
        }
    }

    #[test]
    #[should_panic(expected = "must be block0")]
    fn entry_not_block0() {
        let graph = RawGraph {
            entry: Some(block(1)),
            preds: vec![vec![block(1)], vec![]],
        };
        NaiveDominators::with_graph(&graph);
    }

    #[test]
    #[should_panic(expected = "has no entry block")]
    fn missing_entry() {
        let graph = RawGraph {
            entry: None,
            preds: vec![vec![]],
        };
        NaiveDominators::with_graph(&graph);
    }

    #[test]
    #[should_panic(expected = "outside of a graph")]
    fn predecessor_out_of_range() {
        let graph = RawGraph {
            entry: Some(block(0)),
            preds: vec![vec![], vec![block(0), block(5)]],
        };
        NaiveDominators::with_graph(&graph);
    }
}
