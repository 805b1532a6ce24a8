//! Parser for the textual control flow graph format.

use crate::error::{Location, ParseResult};
use domcheck_codegen::entity::EntityRef;
use domcheck_codegen::{Block, ControlFlowGraph, IdomTable};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// A `dominates(...)` annotation. The arguments are checked separately.
static DOMINATES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"dominates\(([^)]*)\)").unwrap());

/// A control flow graph read from text, with the dominator tree the test expects for it.
#[derive(Debug)]
pub struct ParsedGraph {
    /// Name from the `graph %name` header, without the `%`.
    pub name: Option<String>,
    /// Location of the header, or of the first block of an unnamed graph.
    pub location: Location,
    /// The graph itself. `block0` is the entry.
    pub cfg: ControlFlowGraph,
    /// Expected immediate dominators, if the graph carries any `dominates(...)` annotations.
    pub expected: Option<IdomTable>,
}

/// Parse the entire `text` into a list of graphs.
///
/// Text before the first `graph` header forms an unnamed graph. Empty text yields no graphs.
pub fn parse_graphs(text: &str) -> ParseResult<Vec<ParsedGraph>> {
    Parser::new().parse(text)
}

/// A graph under construction.
struct GraphBuilder {
    name: Option<String>,
    location: Location,
    /// Where each block was declared, by block number.
    declared: BTreeMap<u32, Location>,
    /// Control edges, with the location of the line that declared them.
    edges: Vec<(u32, u32, Location)>,
    /// `(idom, block)` annotations.
    idoms: Vec<(u32, u32, Location)>,
}

impl GraphBuilder {
    fn new(name: Option<String>, location: Location) -> Self {
        Self {
            name,
            location,
            declared: BTreeMap::new(),
            edges: Vec::new(),
            idoms: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    fn declare(&mut self, block: u32, loc: Location) -> ParseResult<()> {
        if let Some(prev) = self.declared.insert(block, loc) {
            return err!(
                loc,
                "duplicate definition of block{}, first defined on line {}",
                block,
                prev.line_number
            );
        }
        Ok(())
    }

    fn finish(self) -> ParseResult<ParsedGraph> {
        let num_blocks = self.declared.len();
        if num_blocks == 0 {
            return err!(self.location, "graph has no blocks");
        }
        // Keys are sorted, so the first key that differs from its position is a gap.
        if let Some(missing) = self
            .declared
            .keys()
            .zip(0u32..)
            .find_map(|(&key, expected)| (key != expected).then_some(expected))
        {
            return err!(
                self.location,
                "blocks must be numbered contiguously from block0, but block{} is missing",
                missing
            );
        }

        let mut cfg = ControlFlowGraph::with_blocks(num_blocks);
        for &(from, to, loc) in &self.edges {
            if to as usize >= num_blocks {
                return err!(loc, "block{} is not declared", to);
            }
            cfg.add_edge(Block::from_u32(from), Block::from_u32(to));
        }

        let expected = if self.idoms.is_empty() {
            None
        } else {
            let mut table = IdomTable::with_entry(Block::new(0));
            for &(idom, block, loc) in &self.idoms {
                if block as usize >= num_blocks {
                    return err!(loc, "block{} is not declared", block);
                }
                if block == 0 {
                    return err!(loc, "the entry block has no immediate dominator");
                }
                if block == idom {
                    return err!(loc, "block{} can't be its own immediate dominator", block);
                }
                let block = Block::from_u32(block);
                if let Some(prev) = table.idom(block) {
                    return err!(
                        loc,
                        "{} already has immediate dominator {}",
                        block,
                        prev
                    );
                }
                table.set_idom(block, Block::from_u32(idom));
            }
            Some(table)
        };

        Ok(ParsedGraph {
            name: self.name,
            location: self.location,
            cfg,
            expected,
        })
    }
}

struct Parser {
    graphs: Vec<ParsedGraph>,
    current: Option<GraphBuilder>,
}

impl Parser {
    fn new() -> Self {
        Self {
            graphs: Vec::new(),
            current: None,
        }
    }

    fn parse(mut self, text: &str) -> ParseResult<Vec<ParsedGraph>> {
        for (idx, line) in text.lines().enumerate() {
            let loc = Location {
                line_number: idx + 1,
            };
            let (code, comment) = match line.split_once(';') {
                Some((code, comment)) => (code.trim(), Some(comment)),
                None => (line.trim(), None),
            };
            if code.is_empty() {
                continue;
            }

            if let Some(rest) = code.strip_prefix("graph") {
                if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                    self.parse_header(rest.trim(), loc)?;
                    continue;
                }
            }
            self.parse_block_line(code, comment, loc)?;
        }

        self.finish_graph()?;
        Ok(self.graphs)
    }

    fn finish_graph(&mut self) -> ParseResult<()> {
        if let Some(builder) = self.current.take() {
            // Text before the first header that holds no blocks isn't a graph.
            if builder.name.is_some() || !builder.is_empty() {
                self.graphs.push(builder.finish()?);
            }
        }
        Ok(())
    }

    fn parse_header(&mut self, rest: &str, loc: Location) -> ParseResult<()> {
        let name = match rest.strip_prefix('%') {
            Some(name) if is_identifier(name) => name,
            _ => return err!(loc, "expected graph name like %name, got '{}'", rest),
        };
        self.finish_graph()?;
        self.current = Some(GraphBuilder::new(Some(name.to_string()), loc));
        Ok(())
    }

    fn parse_block_line(&mut self, code: &str, comment: Option<&str>, loc: Location) -> ParseResult<()> {
        let Some((head, successors)) = code.split_once(':') else {
            return err!(loc, "expected 'blockN:' at the start of the line");
        };
        let block = parse_block_ref(head.trim(), loc)?;

        let builder = self
            .current
            .get_or_insert_with(|| GraphBuilder::new(None, loc));
        builder.declare(block, loc)?;

        for succ in successors
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
        {
            let succ = parse_block_ref(succ, loc)?;
            builder.edges.push((block, succ, loc));
        }

        if let Some(comment) = comment {
            for dominated in parse_dominates(comment, loc)? {
                builder.idoms.push((block, dominated, loc));
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Parse a block number without leading zeros.
fn parse_number(text: &str) -> Option<u32> {
    if text.is_empty()
        || !text.bytes().all(|b| b.is_ascii_digit())
        || (text.len() > 1 && text.starts_with('0'))
    {
        return None;
    }
    text.parse().ok()
}

/// Parse a `blockN` reference.
fn parse_block_ref(text: &str, loc: Location) -> ParseResult<u32> {
    match text.strip_prefix("block").and_then(parse_number) {
        Some(n) if n != u32::MAX => Ok(n),
        _ => err!(loc, "expected block name, got '{}'", text),
    }
}

/// Parse a `dominates(1, 2, block3)` annotation from a comment.
///
/// Returns the listed block numbers, or nothing if the comment has no annotation.
fn parse_dominates(comment: &str, loc: Location) -> ParseResult<Vec<u32>> {
    let Some(caps) = DOMINATES.captures(comment) else {
        if comment.contains("dominates(") {
            return err!(loc, "unterminated dominates(...) annotation");
        }
        return Ok(Vec::new());
    };

    caps[1]
        .split(',')
        .map(str::trim)
        .map(|arg| {
            let number = arg.strip_prefix("block").unwrap_or(arg);
            match parse_number(number) {
                Some(n) if n != u32::MAX => Ok(n),
                _ => err!(loc, "expected block number in dominates(...), got '{}'", arg),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use domcheck_codegen::BlockGraph;

    fn block(n: usize) -> Block {
        Block::new(n)
    }

    fn parse_one(text: &str) -> ParsedGraph {
        let mut graphs = parse_graphs(text).unwrap();
        assert_eq!(graphs.len(), 1);
        graphs.pop().unwrap()
    }

    fn parse_err(text: &str) -> String {
        parse_graphs(text).unwrap_err().to_string()
    }

    #[test]
    fn empty_text() {
        assert!(parse_graphs("").unwrap().is_empty());
        assert!(parse_graphs("; just a comment\n\n").unwrap().is_empty());
    }

    #[test]
    fn diamond() {
        let graph = parse_one(
            "
            ; A diamond.
            graph %diamond
            block0: block1, block2    ; dominates(1, 2, 3)
            block1: block3
            block2: block3
            block3:
            ",
        );
        assert_eq!(graph.name.as_deref(), Some("diamond"));
        assert_eq!(graph.location.line_number, 3);
        assert_eq!(graph.cfg.num_blocks(), 4);
        assert_eq!(
            graph.cfg.pred_iter(block(3)).collect::<Vec<_>>(),
            [block(1), block(2)]
        );

        let expected = graph.expected.unwrap();
        assert_eq!(expected.entry_block(), Some(block(0)));
        assert_eq!(expected.idom(block(3)), Some(block(0)));
        assert_eq!(expected.idom(block(0)), None);
    }

    #[test]
    fn unnamed_graph_without_annotations() {
        let graph = parse_one("block0: block1 block1\nblock1: block0\n");
        assert_eq!(graph.name, None);
        assert!(graph.expected.is_none());
        assert_eq!(graph.cfg.succ_iter(block(0)).count(), 1);
        assert_eq!(graph.cfg.pred_iter(block(0)).collect::<Vec<_>>(), [block(1)]);
    }

    #[test]
    fn blocks_declared_out_of_order() {
        let graph = parse_one("block1:\nblock0: block1\n");
        assert_eq!(graph.cfg.pred_iter(block(1)).collect::<Vec<_>>(), [block(0)]);
    }

    #[test]
    fn several_graphs() {
        let graphs = parse_graphs(
            "graph %a\nblock0:\n\ngraph %b\nblock0: block1 ; dominates(block1)\nblock1:\n",
        )
        .unwrap();
        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[0].name.as_deref(), Some("a"));
        assert_eq!(graphs[1].name.as_deref(), Some("b"));
        assert_eq!(graphs[1].cfg.num_blocks(), 2);
        assert!(graphs[0].expected.is_none());
        assert!(graphs[1].expected.is_some());
    }

    #[test]
    fn errors() {
        assert_eq!(parse_err("block0: block2\nblock1:\n"), "1: block2 is not declared");
        assert_eq!(
            parse_err("block0:\nblock0:\n"),
            "2: duplicate definition of block0, first defined on line 1"
        );
        assert_eq!(
            parse_err("block0:\nblock2:\n"),
            "1: blocks must be numbered contiguously from block0, but block1 is missing"
        );
        assert_eq!(parse_err("block0: bb1\n"), "1: expected block name, got 'bb1'");
        assert_eq!(parse_err("block01:\n"), "1: expected block name, got 'block01'");
        assert_eq!(parse_err("block0\n"), "1: expected 'blockN:' at the start of the line");
        assert_eq!(parse_err("graph %g\n"), "1: graph has no blocks");
        assert_eq!(parse_err("graph g\n"), "1: expected graph name like %name, got 'g'");
    }

    #[test]
    fn huge_block_numbers() {
        assert_eq!(
            parse_err("block4000000000:\n"),
            "1: blocks must be numbered contiguously from block0, but block0 is missing"
        );
        assert_eq!(
            parse_err("block0:\nblock1:\nblock4294967294:\n"),
            "1: blocks must be numbered contiguously from block0, but block2 is missing"
        );
        assert_eq!(
            parse_err("block0: block4000000000\n"),
            "1: block4000000000 is not declared"
        );
        assert_eq!(
            parse_err("block0: ; dominates(4000000000)\n"),
            "1: block4000000000 is not declared"
        );
    }

    #[test]
    fn annotation_in_surrounding_text() {
        let graph = parse_one("block0: block1 ; falls through, dominates( block1 ) here\nblock1:\n");
        let expected = graph.expected.unwrap();
        assert_eq!(expected.idom(block(1)), Some(block(0)));
    }

    #[test]
    fn annotation_errors() {
        assert_eq!(
            parse_err("block0: block1 ; dominates(1\nblock1:\n"),
            "1: unterminated dominates(...) annotation"
        );
        assert_eq!(
            parse_err("block0: block1 ; dominates(x)\nblock1:\n"),
            "1: expected block number in dominates(...), got 'x'"
        );
        assert_eq!(
            parse_err("block0: block1 ; dominates(0)\nblock1:\n"),
            "1: the entry block has no immediate dominator"
        );
        assert_eq!(
            parse_err("block0: block1 ; dominates(1)\nblock1: ; dominates(1)\n"),
            "2: block1 can't be its own immediate dominator"
        );
        assert_eq!(
            parse_err("block0: block1 block2 ; dominates(2)\nblock1: block2 ; dominates(2)\nblock2:\n"),
            "2: block2 already has immediate dominator block0"
        );
        assert_eq!(
            parse_err("block0: ; dominates(4)\n"),
            "1: block4 is not declared"
        );
    }
}
