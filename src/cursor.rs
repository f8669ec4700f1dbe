//! Walking instruction trees without recursion.

use crate::instr::{Body, InstrId, InstrRef, InstrType, Instruction};

/// Steps through one body in order.
///
/// The cursor starts on the first instruction. As an [`Iterator`] it yields
/// the current instruction and then moves past it.
#[derive(Clone)]
pub struct Cursor<'a> {
    tree: &'a Instruction,
    ids: &'a [InstrId],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn current(&self) -> Option<InstrRef<'a>> {
        let id = *self.ids.get(self.position)?;
        Some(InstrRef {
            tree: self.tree,
            id,
        })
    }

    /// Moves to the next instruction and returns it.
    pub fn advance(&mut self) -> Option<InstrRef<'a>> {
        if self.position < self.ids.len() {
            self.position += 1;
        }
        self.current()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_done(&self) -> bool {
        self.position >= self.ids.len()
    }
}

impl<'a> Iterator for Cursor<'a> {
    type Item = InstrRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current()?;
        self.position += 1;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.ids.len().saturating_sub(self.position);
        (left, Some(left))
    }
}

impl<'a> Body<'a> {
    pub fn cursor(&self) -> Cursor<'a> {
        Cursor {
            tree: self.tree,
            ids: self.ids,
            position: 0,
        }
    }
}

/// Pre-order walk over a whole tree: every node comes before its bodies,
/// and a then branch before its else branch.
pub struct Walk<'a> {
    tree: &'a Instruction,
    pending: Vec<InstrId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = InstrRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.pending.pop()?;
        let node = &self.tree.nodes[id];
        for body in node.kind.bodies().into_iter().rev() {
            self.pending.extend(body.iter().rev().copied());
        }
        Some(InstrRef {
            tree: self.tree,
            id,
        })
    }
}

impl Instruction {
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            tree: self,
            pending: vec![self.root],
        }
    }

    /// Every function call in the tree, in document order.
    pub fn calls(&self) -> impl Iterator<Item = InstrRef<'_>> + '_ {
        self.walk()
            .filter(|instr| instr.get_type() == InstrType::Call)
    }
}
