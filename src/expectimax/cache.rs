use std::collections::HashMap;

use ahash::RandomState;

use crate::engine::Board;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Node {
    Max,
    Chance,
}

#[derive(Clone, Copy)]
struct TranspositionEntry {
    depth: u32,
    value: f64,
}

type Table = HashMap<u64, TranspositionEntry, RandomState>;

/// Memo of node values for a single top-level search.
///
/// Keys are raw boards. Player-to-move and tile-to-spawn positions live in
/// separate tables since the same bits mean different things in each.
#[derive(Default)]
pub(crate) struct TranspositionCache {
    max: Table,
    chance: Table,
}

impl TranspositionCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn table(&self, node: Node) -> &Table {
        match node {
            Node::Max => &self.max,
            Node::Chance => &self.chance,
        }
    }

    /// Cached value for `board`, only if it was computed at least `depth` plies deep.
    #[inline]
    pub(crate) fn lookup(&self, node: Node, board: Board, depth: u32) -> Option<f64> {
        self.table(node)
            .get(&board.raw())
            .filter(|entry| entry.depth >= depth)
            .map(|entry| entry.value)
    }

    #[inline]
    pub(crate) fn store(&mut self, node: Node, board: Board, depth: u32, value: f64) {
        let table = match node {
            Node::Max => &mut self.max,
            Node::Chance => &mut self.chance,
        };
        table.insert(board.raw(), TranspositionEntry { depth, value });
    }

    pub(crate) fn len(&self) -> usize {
        self.max.len() + self.chance.len()
    }
}
