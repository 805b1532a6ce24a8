//! A control flow graph represented as mappings of basic blocks to their predecessors
//! and successors.
//!
//! The dominator analyses only need three things from a graph: the number of blocks, which block
//! is the entry, and the predecessors of every block. That contract is the [`BlockGraph`] trait,
//! so an embedding compiler can hand its own CFG to the analyses without copying it.
//!
//! Blocks are numbered contiguously from zero and the entry block is always `block0`. A block
//! other than the entry that has no predecessors is unreachable.
//!
//! [`ControlFlowGraph`] is a simple owned implementation of the contract, used by the reader and
//! the tests.

use cranelift_entity::{EntityRef, PrimaryMap, entity_impl};
use smallvec::SmallVec;

/// An opaque reference to a [basic block](https://en.wikipedia.org/wiki/Basic_block) in a
/// control flow graph.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// Read-only view of a control flow graph, as consumed by the dominator analyses.
///
/// The graph must not change while an analysis is running over it.
pub trait BlockGraph {
    /// Number of blocks. Blocks are `block0 .. block(n-1)`.
    fn num_blocks(&self) -> usize;

    /// The unique entry block, or `None` for an empty graph.
    ///
    /// Analyses assert that this is `block0`.
    fn entry_block(&self) -> Option<Block> {
        if self.num_blocks() == 0 {
            None
        } else {
            Some(Block::new(0))
        }
    }

    /// Iterate over the blocks that have a direct control edge into `block`.
    fn pred_iter(&self, block: Block) -> impl Iterator<Item = Block> + '_;
}

#[derive(Clone, Debug, Default)]
struct CFGNode {
    predecessors: SmallVec<[Block; 4]>,
    successors: SmallVec<[Block; 2]>,
}

/// The control flow graph maintains a mapping of blocks to their predecessors
/// and successors where predecessors are basic blocks and successors are
/// basic blocks.
#[derive(Clone, Debug)]
pub struct ControlFlowGraph {
    data: PrimaryMap<Block, CFGNode>,
}

impl ControlFlowGraph {
    /// Allocate a new blank control flow graph.
    pub fn new() -> Self {
        Self {
            data: PrimaryMap::new(),
        }
    }

    /// Allocate a graph with `num_blocks` blocks and no edges.
    pub fn with_blocks(num_blocks: usize) -> Self {
        let mut cfg = Self {
            data: PrimaryMap::with_capacity(num_blocks),
        };
        for _ in 0..num_blocks {
            cfg.make_block();
        }
        cfg
    }

    /// Allocate a graph with `num_blocks` blocks and the given `(from, to)` edges, given as block
    /// numbers.
    pub fn with_edges(num_blocks: usize, edges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut cfg = Self::with_blocks(num_blocks);
        for (from, to) in edges {
            cfg.add_edge(Block::new(from), Block::new(to));
        }
        cfg
    }

    /// Remove all blocks and edges.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Append a new block without any edges.
    pub fn make_block(&mut self) -> Block {
        self.data.push(CFGNode::default())
    }

    /// Iterate over all blocks in index order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> {
        self.data.keys()
    }

    /// Record a control edge from `from` to `to`.
    ///
    /// Adding an edge that already exists has no effect.
    pub fn add_edge(&mut self, from: Block, to: Block) {
        assert!(
            self.data.is_valid(from) && self.data.is_valid(to),
            "edge {from} -> {to} refers to a block outside of the graph"
        );
        if self.data[from].successors.contains(&to) {
            return;
        }
        self.data[from].successors.push(to);
        self.data[to].predecessors.push(from);
    }

    /// Iterate over the blocks that `block` may transfer control to.
    pub fn succ_iter(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        self.data[block].successors.iter().copied()
    }
}

impl Default for ControlFlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockGraph for ControlFlowGraph {
    fn num_blocks(&self) -> usize {
        self.data.len()
    }

    fn pred_iter(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        self.data[block].predecessors.iter().copied()
    }
}
