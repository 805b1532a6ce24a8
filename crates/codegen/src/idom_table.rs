//! A dominator tree given as explicit immediate-dominator links.
//!
//! This is the shape of the result every production dominator algorithm produces, so it is what
//! the naive relation gets compared against. It is also how expected results are written down in
//! test files.

use crate::flowgraph::Block;
use cranelift_entity::SecondaryMap;
use cranelift_entity::packed_option::PackedOption;

/// Immediate dominators of the blocks of one graph.
///
/// Blocks that have no immediate dominator are either the entry block or unreachable.
#[derive(Clone, Debug, Default)]
pub struct IdomTable {
    entry: PackedOption<Block>,
    idoms: SecondaryMap<Block, PackedOption<Block>>,
    /// Number of blocks with an immediate dominator. No idom chain in a well-formed table is
    /// longer than this.
    links: usize,
}

impl IdomTable {
    /// Create an empty table without an entry block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table rooted at `entry`.
    pub fn with_entry(entry: Block) -> Self {
        let mut table = Self::new();
        table.set_entry(entry);
        table
    }

    /// Set the entry block, the root of the dominator tree.
    pub fn set_entry(&mut self, entry: Block) {
        self.entry = entry.into();
    }

    /// The entry block, if one has been set.
    pub fn entry_block(&self) -> Option<Block> {
        self.entry.expand()
    }

    /// Record `idom` as the immediate dominator of `block`, replacing any previous one.
    pub fn set_idom(&mut self, block: Block, idom: Block) {
        assert_ne!(block, idom, "{block} can't be its own immediate dominator");
        if self.idoms[block].is_none() {
            self.links += 1;
        }
        self.idoms[block] = idom.into();
    }

    /// Returns the immediate dominator of `block`.
    ///
    /// This returns `None` for the entry block and for blocks not in the tree.
    pub fn idom(&self, block: Block) -> Option<Block> {
        self.idoms[block].expand()
    }

    /// Is `block` reachable from the entry block through idom links?
    ///
    /// Blocks on a cycle of idom links, which a correct dominator algorithm never produces, are
    /// reported as unreachable.
    pub fn is_reachable(&self, block: Block) -> bool {
        let Some(entry) = self.entry_block() else {
            return false;
        };
        let mut block = block;
        for _ in 0..=self.links {
            if block == entry {
                return true;
            }
            match self.idom(block) {
                Some(idom) => block = idom,
                None => return false,
            }
        }
        false
    }

    /// Returns `true` if `a` dominates `b`.
    ///
    /// A block is considered to dominate itself. Unreachable blocks dominate only themselves and
    /// are dominated only by themselves.
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        if !self.is_reachable(b) {
            return a == b;
        }

        // Run a finger up the dominator tree from b until we see a. The chain from a reachable
        // block always ends at the entry.
        let mut b = b;
        loop {
            if a == b {
                return true;
            }
            match self.idom(b) {
                Some(idom) => b = idom,
                None => return false,
            }
        }
    }
}
