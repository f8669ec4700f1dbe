//! Instruction trees.
//!
//! An [`Instruction`] owns a whole statement tree in one [`Pool`]. Bodies are
//! ordered lists of [`InstrId`] handles into that pool, and the expressions a
//! statement uses are owned by its node. Mutators address nodes by handle;
//! a handle stays valid until a body containing its node is replaced.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::mem;

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::handle::impl_handle;
use crate::ident;
use crate::pool::Pool;
use crate::pretty::Printer;

impl_handle! {
    pub struct InstrId(u32);
}

/// Where an async instruction is in its lifecycle.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum AsyncState {
    Created,
    Started,
    Finished,
}

impl fmt::Display for AsyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AsyncState::Created => "created",
            AsyncState::Started => "started",
            AsyncState::Finished => "finished",
        })
    }
}

/// The discriminator of an instruction node.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum InstrType {
    For,
    IfThenElse,
    Call,
    Block,
    Async { clocked: bool },
    Finish { clocked: bool },
    Advance,
    Opaque,
}

impl InstrType {
    pub const fn name(self) -> &'static str {
        match self {
            InstrType::For => "for loop",
            InstrType::IfThenElse => "if/then/else",
            InstrType::Call => "function call",
            InstrType::Block => "block",
            InstrType::Async { clocked: false } => "async",
            InstrType::Async { clocked: true } => "clocked async",
            InstrType::Finish { clocked: false } => "finish",
            InstrType::Finish { clocked: true } => "clocked finish",
            InstrType::Advance => "advance",
            InstrType::Opaque => "opaque block",
        }
    }
}

/// Bookkeeping attached to every node. Never part of equality.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotation {
    pub level: Option<String>,
    pub boundaries: Option<String>,
    pub date: Option<Expr>,
    pub clock: Option<String>,
}

impl Annotation {
    pub fn clock(clock: impl Into<String>) -> Self {
        Self {
            clock: Some(clock.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.level.is_none()
            && self.boundaries.is_none()
            && self.date.is_none()
            && self.clock.is_none()
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Kind {
    For {
        iterator: String,
        lower: Expr,
        upper: Expr,
        body: Vec<InstrId>,
    },
    Branch {
        condition: Expr,
        then: Vec<InstrId>,
        otherwise: Option<Vec<InstrId>>,
    },
    Call {
        function: String,
        arguments: Vec<Expr>,
    },
    Block {
        body: Vec<InstrId>,
    },
    Async {
        clocked: bool,
        state: AsyncState,
        body: Vec<InstrId>,
    },
    /// Waits for every async started in `body`.
    Finish {
        clocked: bool,
        body: Vec<InstrId>,
    },
    Advance,
    Opaque {
        text: String,
        block: Vec<InstrId>,
    },
}

impl Kind {
    pub(crate) fn ty(&self) -> InstrType {
        match self {
            Kind::For { .. } => InstrType::For,
            Kind::Branch { .. } => InstrType::IfThenElse,
            Kind::Call { .. } => InstrType::Call,
            Kind::Block { .. } => InstrType::Block,
            Kind::Async { clocked, .. } => InstrType::Async { clocked: *clocked },
            Kind::Finish { clocked, .. } => InstrType::Finish { clocked: *clocked },
            Kind::Advance => InstrType::Advance,
            Kind::Opaque { .. } => InstrType::Opaque,
        }
    }

    /// Child lists in document order; unused slots are empty.
    pub(crate) fn bodies(&self) -> [&[InstrId]; 2] {
        match self {
            Kind::For { body, .. }
            | Kind::Block { body }
            | Kind::Async { body, .. }
            | Kind::Finish { body, .. } => [body.as_slice(), &[]],
            Kind::Opaque { block, .. } => [block.as_slice(), &[]],
            Kind::Branch {
                then, otherwise, ..
            } => [then.as_slice(), otherwise.as_deref().unwrap_or_default()],
            Kind::Call { .. } | Kind::Advance => [&[], &[]],
        }
    }

    fn bodies_mut(&mut self) -> [&mut [InstrId]; 2] {
        match self {
            Kind::For { body, .. }
            | Kind::Block { body }
            | Kind::Async { body, .. }
            | Kind::Finish { body, .. } => [body.as_mut_slice(), &mut []],
            Kind::Opaque { block, .. } => [block.as_mut_slice(), &mut []],
            Kind::Branch {
                then, otherwise, ..
            } => [
                then.as_mut_slice(),
                otherwise.as_deref_mut().unwrap_or(&mut []),
            ],
            Kind::Call { .. } | Kind::Advance => [&mut [], &mut []],
        }
    }

    fn remap(&mut self, map: &HashMap<InstrId, InstrId>) {
        for body in self.bodies_mut() {
            for id in body {
                *id = map[&*id];
            }
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) kind: Kind,
    pub(crate) annotation: Annotation,
}

impl Node {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            annotation: Annotation::default(),
        }
    }
}

fn for_body(kind: &mut Kind) -> Option<&mut Vec<InstrId>> {
    match kind {
        Kind::For { body, .. } => Some(body),
        _ => None,
    }
}

fn then_body(kind: &mut Kind) -> Option<&mut Vec<InstrId>> {
    match kind {
        Kind::Branch { then, .. } => Some(then),
        _ => None,
    }
}

fn block_body(kind: &mut Kind) -> Option<&mut Vec<InstrId>> {
    match kind {
        Kind::Block { body } | Kind::Async { body, .. } | Kind::Finish { body, .. } => Some(body),
        Kind::Opaque { block, .. } => Some(block),
        _ => None,
    }
}

/// The body a single pushed instruction lands in.
fn primary_body(kind: &mut Kind) -> Option<&mut Vec<InstrId>> {
    match kind {
        Kind::For { body, .. }
        | Kind::Block { body }
        | Kind::Async { body, .. }
        | Kind::Finish { body, .. } => Some(body),
        Kind::Branch { then, .. } => Some(then),
        Kind::Opaque { block, .. } => Some(block),
        Kind::Call { .. } | Kind::Advance => None,
    }
}

/// An owned instruction tree.
#[derive(Clone)]
pub struct Instruction {
    pub(crate) nodes: Pool<Node, InstrId>,
    pub(crate) root: InstrId,
}

/// A borrowed view of one node of an [`Instruction`].
#[derive(Copy, Clone)]
pub struct InstrRef<'a> {
    pub(crate) tree: &'a Instruction,
    pub(crate) id: InstrId,
}

/// A borrowed, ordered body of instructions.
#[derive(Copy, Clone)]
pub struct Body<'a> {
    pub(crate) tree: &'a Instruction,
    pub(crate) ids: &'a [InstrId],
}

impl Instruction {
    fn empty() -> Self {
        Self {
            nodes: Pool::new(),
            root: InstrId(0),
        }
    }

    fn leaf(kind: Kind) -> Self {
        let mut tree = Self::empty();
        tree.root = tree.nodes.insert(Node::new(kind));
        tree
    }

    /// Builds a tree whose root owns the given bodies.
    ///
    /// The largest child's pool becomes the new tree's pool, so its handles
    /// stay valid and wrapping a tree costs only the other children's nodes.
    fn assemble<const N: usize>(
        mut bodies: [Vec<Instruction>; N],
        build: impl FnOnce([Vec<InstrId>; N]) -> Kind,
    ) -> Result<Self> {
        let largest = bodies
            .iter()
            .enumerate()
            .flat_map(|(b, body)| {
                body.iter()
                    .enumerate()
                    .map(move |(i, child)| ((b, i), child.nodes.len()))
            })
            .max_by_key(|&(_, len)| len)
            .map(|(at, _)| at);
        let (mut tree, base) = match largest {
            Some((b, i)) => {
                let child = mem::replace(&mut bodies[b][i], Self::empty());
                let root = child.root;
                (child, Some((b, i, root)))
            }
            None => (Self::empty(), None),
        };
        let total: usize = bodies.iter().flatten().map(|child| child.nodes.len()).sum();
        tree.nodes.try_reserve(total + 1)?;
        let mut index = 0;
        let ids = bodies.map(|body| {
            let b = index;
            index += 1;
            body.into_iter()
                .enumerate()
                .map(|(i, child)| match base {
                    Some((bb, bi, root)) if (bb, bi) == (b, i) => root,
                    _ => tree.adopt(child),
                })
                .collect::<Vec<_>>()
        });
        tree.root = tree.nodes.insert(Node::new(build(ids)));
        Ok(tree)
    }

    pub fn for_loop(
        iterator: &str,
        lower: Expr,
        upper: Expr,
        body: Vec<Instruction>,
    ) -> Result<Self> {
        ident::validate(iterator)?;
        Self::assemble([body], |[body]| Kind::For {
            iterator: iterator.to_owned(),
            lower,
            upper,
            body,
        })
    }

    /// `has_else` is decided by whether `else_body` is present, even if empty.
    pub fn if_then_else(
        condition: Expr,
        then_body: Vec<Instruction>,
        else_body: Option<Vec<Instruction>>,
    ) -> Result<Self> {
        let has_else = else_body.is_some();
        Self::assemble(
            [then_body, else_body.unwrap_or_default()],
            |[then, otherwise]| Kind::Branch {
                condition,
                then,
                otherwise: has_else.then_some(otherwise),
            },
        )
    }

    pub fn function_call(function: &str, arguments: Vec<Expr>) -> Result<Self> {
        ident::validate(function)?;
        Ok(Self::leaf(Kind::Call {
            function: function.to_owned(),
            arguments,
        }))
    }

    pub fn block(body: Vec<Instruction>) -> Result<Self> {
        Self::assemble([body], |[body]| Kind::Block { body })
    }

    /// A construct kept as verbatim source text, with the instructions it
    /// encloses.
    pub fn opaque(text: impl Into<String>, block: Vec<Instruction>) -> Result<Self> {
        let text = text.into();
        Self::assemble([block], |[block]| Kind::Opaque { text, block })
    }

    pub fn advance() -> Self {
        Self::leaf(Kind::Advance)
    }

    /// An unclocked async that has already been started.
    pub fn asynchronous(body: Vec<Instruction>, annotation: Annotation) -> Result<Self> {
        let mut tree = Self::deferred(body, false)?;
        tree.nodes[tree.root].annotation = annotation;
        tree.set_state(tree.root, AsyncState::Started);
        Ok(tree)
    }

    /// A clocked async that has already been started on `clock`.
    pub fn clocked_asynchronous(body: Vec<Instruction>, clock: Annotation) -> Result<Self> {
        let mut tree = Self::deferred(body, true)?;
        tree.nodes[tree.root].annotation = clock;
        tree.set_state(tree.root, AsyncState::Started);
        Ok(tree)
    }

    /// A region that waits for the asyncs it starts.
    pub fn finish_block(body: Vec<Instruction>) -> Result<Self> {
        Self::assemble([body], |[body]| Kind::Finish {
            clocked: false,
            body,
        })
    }

    pub fn clocked_finish_block(body: Vec<Instruction>) -> Result<Self> {
        Self::assemble([body], |[body]| Kind::Finish {
            clocked: true,
            body,
        })
    }

    /// An async that still has to be [started](Self::start).
    pub fn deferred(body: Vec<Instruction>, clocked: bool) -> Result<Self> {
        Self::assemble([body], |[body]| Kind::Async {
            clocked,
            state: AsyncState::Created,
            body,
        })
    }

    fn set_state(&mut self, id: InstrId, to: AsyncState) {
        if let Kind::Async { state, .. } = &mut self.nodes[id].kind {
            *state = to;
        }
    }

    /// Moves every node of `child` into this pool and returns the handle of
    /// its root. The caller reserves room first.
    fn adopt(&mut self, child: Instruction) -> InstrId {
        let mut map = HashMap::with_capacity(child.nodes.len());
        let mut moved = Vec::with_capacity(child.nodes.len());
        let root = child.root;
        for (old, node) in child.nodes.into_entries() {
            let new = self.nodes.insert(node);
            map.insert(old, new);
            moved.push(new);
        }
        for id in moved {
            self.nodes[id].kind.remap(&map);
        }
        map[&root]
    }

    fn adopt_all(&mut self, body: Vec<Instruction>) -> Vec<InstrId> {
        body.into_iter().map(|child| self.adopt(child)).collect()
    }

    fn reserve_for(&mut self, body: &[Instruction]) -> Result<()> {
        let total = body.iter().map(|child| child.nodes.len()).sum();
        self.nodes.try_reserve(total)?;
        Ok(())
    }

    /// Removes the subtree rooted at `from` from the pool.
    fn release(&mut self, from: InstrId) {
        let mut pending = vec![from];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.remove(id) {
                for body in node.kind.bodies() {
                    pending.extend_from_slice(body);
                }
            }
        }
    }

    fn node(&self, id: InstrId) -> Result<&Node> {
        self.nodes.get(id).ok_or(Error::UnknownHandle(id))
    }

    fn node_mut(&mut self, id: InstrId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or(Error::UnknownHandle(id))
    }

    /// Deep copy whose node storage is reserved fallibly. The expressions and
    /// strings inside each node are still cloned infallibly.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            nodes: self.nodes.try_clone()?,
            root: self.root,
        })
    }

    pub fn handle(&self) -> InstrId {
        self.root
    }

    pub fn root(&self) -> InstrRef<'_> {
        InstrRef {
            tree: self,
            id: self.root,
        }
    }

    pub fn get(&self, id: InstrId) -> Result<InstrRef<'_>> {
        self.node(id)?;
        Ok(InstrRef { tree: self, id })
    }

    pub fn get_type(&self) -> InstrType {
        self.root().get_type()
    }

    /// Number of instruction nodes in the tree.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn annotation_mut(&mut self, id: InstrId) -> Result<&mut Annotation> {
        Ok(&mut self.node_mut(id)?.annotation)
    }

    pub fn set_annotation(&mut self, id: InstrId, annotation: Annotation) -> Result<()> {
        self.node_mut(id)?.annotation = annotation;
        Ok(())
    }

    /// Swaps the list `slot` picks out of node `id` for `body`, releasing the
    /// nodes of the old list.
    fn replace_body(
        &mut self,
        id: InstrId,
        expected: &'static str,
        body: Vec<Instruction>,
        slot: fn(&mut Kind) -> Option<&mut Vec<InstrId>>,
    ) -> Result<()> {
        let node = self.node_mut(id)?;
        if slot(&mut node.kind).is_none() {
            return Err(Error::wrong_variant(expected, node.kind.ty().name()));
        }
        self.reserve_for(&body)?;
        let new = self.adopt_all(body);
        let old = match slot(&mut self.nodes[id].kind) {
            Some(list) => mem::replace(list, new),
            None => unreachable!("variant checked above"),
        };
        for child in old {
            self.release(child);
        }
        Ok(())
    }

    pub fn set_for_loop_iterator(&mut self, id: InstrId, name: &str) -> Result<()> {
        ident::validate(name)?;
        match &mut self.node_mut(id)?.kind {
            Kind::For { iterator, .. } => {
                *iterator = name.to_owned();
                Ok(())
            }
            kind => Err(Error::wrong_variant("for loop", kind.ty().name())),
        }
    }

    pub fn set_for_loop_lower(&mut self, id: InstrId, bound: Expr) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            Kind::For { lower, .. } => {
                *lower = bound;
                Ok(())
            }
            kind => Err(Error::wrong_variant("for loop", kind.ty().name())),
        }
    }

    pub fn set_for_loop_upper(&mut self, id: InstrId, bound: Expr) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            Kind::For { upper, .. } => {
                *upper = bound;
                Ok(())
            }
            kind => Err(Error::wrong_variant("for loop", kind.ty().name())),
        }
    }

    pub fn set_for_loop_body(&mut self, id: InstrId, body: Vec<Instruction>) -> Result<()> {
        self.replace_body(id, "for loop", body, for_body)
    }

    pub fn set_condition(&mut self, id: InstrId, expr: Expr) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            Kind::Branch { condition, .. } => {
                *condition = expr;
                Ok(())
            }
            kind => Err(Error::wrong_variant("if/then/else", kind.ty().name())),
        }
    }

    pub fn set_then_body(&mut self, id: InstrId, body: Vec<Instruction>) -> Result<()> {
        self.replace_body(id, "if/then/else", body, then_body)
    }

    /// `None` drops the else branch altogether.
    pub fn set_else_body(&mut self, id: InstrId, body: Option<Vec<Instruction>>) -> Result<()> {
        let node = self.node_mut(id)?;
        if !matches!(node.kind, Kind::Branch { .. }) {
            return Err(Error::wrong_variant("if/then/else", node.kind.ty().name()));
        }
        let new = match body {
            Some(body) => {
                self.reserve_for(&body)?;
                Some(self.adopt_all(body))
            }
            None => None,
        };
        let old = match &mut self.nodes[id].kind {
            Kind::Branch { otherwise, .. } => mem::replace(otherwise, new),
            _ => unreachable!("variant checked above"),
        };
        for child in old.into_iter().flatten() {
            self.release(child);
        }
        Ok(())
    }

    pub fn set_function(&mut self, id: InstrId, name: &str) -> Result<()> {
        ident::validate(name)?;
        match &mut self.node_mut(id)?.kind {
            Kind::Call { function, .. } => {
                *function = name.to_owned();
                Ok(())
            }
            kind => Err(Error::wrong_variant("function call", kind.ty().name())),
        }
    }

    pub fn set_arguments(&mut self, id: InstrId, exprs: Vec<Expr>) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            Kind::Call { arguments, .. } => {
                *arguments = exprs;
                Ok(())
            }
            kind => Err(Error::wrong_variant("function call", kind.ty().name())),
        }
    }

    pub fn push_argument(&mut self, id: InstrId, expr: Expr) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            Kind::Call { arguments, .. } => {
                arguments.try_reserve(1)?;
                arguments.push(expr);
                Ok(())
            }
            kind => Err(Error::wrong_variant("function call", kind.ty().name())),
        }
    }

    /// Replaces the body of a block, an async, a finish or an opaque construct.
    pub fn set_block(&mut self, id: InstrId, body: Vec<Instruction>) -> Result<()> {
        self.replace_body(id, "block", body, block_body)
    }

    pub fn set_opaque_text(&mut self, id: InstrId, source: impl Into<String>) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            Kind::Opaque { text, .. } => {
                *text = source.into();
                Ok(())
            }
            kind => Err(Error::wrong_variant("opaque block", kind.ty().name())),
        }
    }

    /// Appends `child` to the main body of node `id` (the then branch of an
    /// if/then/else) and returns the handle it now lives under.
    pub fn push(&mut self, id: InstrId, child: Instruction) -> Result<InstrId> {
        let node = self.node_mut(id)?;
        match primary_body(&mut node.kind) {
            Some(body) => body.try_reserve(1)?,
            None => return Err(Error::wrong_variant("instruction with a body", node.kind.ty().name())),
        }
        self.nodes.try_reserve(child.nodes.len())?;
        let new = self.adopt(child);
        match primary_body(&mut self.nodes[id].kind) {
            Some(body) => body.push(new),
            None => unreachable!("variant checked above"),
        }
        Ok(new)
    }

    fn async_state(&mut self, id: InstrId) -> Result<(bool, &mut AsyncState)> {
        match &mut self.node_mut(id)?.kind {
            Kind::Async { clocked, state, .. } => Ok((*clocked, state)),
            kind => Err(Error::wrong_variant("async", kind.ty().name())),
        }
    }

    /// Starts a deferred async, recording `annotation` on it.
    pub fn start(&mut self, id: InstrId, annotation: Annotation) -> Result<()> {
        let (clocked, state) = self.async_state(id)?;
        if *state != AsyncState::Created {
            return Err(Error::InvalidTransition {
                action: "start",
                state: *state,
            });
        }
        *state = AsyncState::Started;
        tracing::trace!(handle = ?id, clocked, "async started");
        self.nodes[id].annotation = annotation;
        Ok(())
    }

    /// Finishes a started unclocked async.
    pub fn finish(&mut self, id: InstrId) -> Result<()> {
        self.finish_with(id, false)
    }

    /// Finishes a started clocked async.
    pub fn clocked_finish(&mut self, id: InstrId) -> Result<()> {
        self.finish_with(id, true)
    }

    fn finish_with(&mut self, id: InstrId, expect_clocked: bool) -> Result<()> {
        let (clocked, state) = self.async_state(id)?;
        if clocked != expect_clocked {
            let expected = InstrType::Async {
                clocked: expect_clocked,
            };
            let found = InstrType::Async { clocked };
            return Err(Error::wrong_variant(expected.name(), found.name()));
        }
        if *state != AsyncState::Started {
            return Err(Error::InvalidTransition {
                action: "finish",
                state: *state,
            });
        }
        *state = AsyncState::Finished;
        tracing::trace!(handle = ?id, clocked, "async finished");
        Ok(())
    }

    pub fn print(&self) {
        print!("{self}");
    }

    pub fn fprint(&self, w: &mut impl io::Write) -> io::Result<()> {
        write!(w, "{self}")
    }
}

impl<'a> InstrRef<'a> {
    pub(crate) fn node(&self) -> &'a Node {
        &self.tree.nodes[self.id]
    }

    fn kind(&self) -> &'a Kind {
        &self.node().kind
    }

    fn body_of(&self, ids: &'a [InstrId]) -> Body<'a> {
        Body {
            tree: self.tree,
            ids,
        }
    }

    fn wrong(&self, expected: &'static str) -> Error {
        Error::wrong_variant(expected, self.get_type().name())
    }

    pub fn handle(&self) -> InstrId {
        self.id
    }

    pub fn get_type(&self) -> InstrType {
        self.kind().ty()
    }

    pub fn annotation(&self) -> &'a Annotation {
        &self.node().annotation
    }

    /// The identifier a for loop binds or a call names.
    pub fn identifier(&self) -> Option<&'a str> {
        match self.kind() {
            Kind::For { iterator, .. } => Some(iterator.as_str()),
            Kind::Call { function, .. } => Some(function.as_str()),
            _ => None,
        }
    }

    /// The main body: a loop body, a then branch or a block.
    pub fn body(&self) -> Option<Body<'a>> {
        match self.kind() {
            Kind::For { body, .. }
            | Kind::Block { body }
            | Kind::Async { body, .. }
            | Kind::Finish { body, .. } => Some(self.body_of(body)),
            Kind::Branch { then, .. } => Some(self.body_of(then)),
            Kind::Opaque { block, .. } => Some(self.body_of(block)),
            Kind::Call { .. } | Kind::Advance => None,
        }
    }

    pub fn for_loop_iterator(&self) -> Result<&'a str> {
        match self.kind() {
            Kind::For { iterator, .. } => Ok(iterator.as_str()),
            _ => Err(self.wrong("for loop")),
        }
    }

    pub fn for_loop_lower(&self) -> Result<&'a Expr> {
        match self.kind() {
            Kind::For { lower, .. } => Ok(lower),
            _ => Err(self.wrong("for loop")),
        }
    }

    pub fn for_loop_upper(&self) -> Result<&'a Expr> {
        match self.kind() {
            Kind::For { upper, .. } => Ok(upper),
            _ => Err(self.wrong("for loop")),
        }
    }

    pub fn for_loop_body(&self) -> Result<Body<'a>> {
        match self.kind() {
            Kind::For { body, .. } => Ok(self.body_of(body)),
            _ => Err(self.wrong("for loop")),
        }
    }

    pub fn condition(&self) -> Result<&'a Expr> {
        match self.kind() {
            Kind::Branch { condition, .. } => Ok(condition),
            _ => Err(self.wrong("if/then/else")),
        }
    }

    pub fn then_body(&self) -> Result<Body<'a>> {
        match self.kind() {
            Kind::Branch { then, .. } => Ok(self.body_of(then)),
            _ => Err(self.wrong("if/then/else")),
        }
    }

    pub fn else_body(&self) -> Result<Option<Body<'a>>> {
        match self.kind() {
            Kind::Branch { otherwise, .. } => Ok(otherwise.as_deref().map(|ids| self.body_of(ids))),
            _ => Err(self.wrong("if/then/else")),
        }
    }

    pub fn has_else(&self) -> Result<bool> {
        Ok(self.else_body()?.is_some())
    }

    pub fn function(&self) -> Result<&'a str> {
        match self.kind() {
            Kind::Call { function, .. } => Ok(function.as_str()),
            _ => Err(self.wrong("function call")),
        }
    }

    pub fn arguments(&self) -> Result<&'a [Expr]> {
        match self.kind() {
            Kind::Call { arguments, .. } => Ok(arguments.as_slice()),
            _ => Err(self.wrong("function call")),
        }
    }

    /// The body of a block, an async, a finish or an opaque construct.
    pub fn block(&self) -> Result<Body<'a>> {
        match self.kind() {
            Kind::Block { body } | Kind::Async { body, .. } | Kind::Finish { body, .. } => {
                Ok(self.body_of(body))
            }
            Kind::Opaque { block, .. } => Ok(self.body_of(block)),
            _ => Err(self.wrong("block")),
        }
    }

    pub fn async_state(&self) -> Result<AsyncState> {
        match self.kind() {
            Kind::Async { state, .. } => Ok(*state),
            _ => Err(self.wrong("async")),
        }
    }

    /// Whether an async or a finish runs under a clock.
    pub fn is_clocked(&self) -> Result<bool> {
        match self.kind() {
            Kind::Async { clocked, .. } | Kind::Finish { clocked, .. } => Ok(*clocked),
            _ => Err(self.wrong("async or finish")),
        }
    }

    pub fn opaque_text(&self) -> Result<&'a str> {
        match self.kind() {
            Kind::Opaque { text, .. } => Ok(text.as_str()),
            _ => Err(self.wrong("opaque block")),
        }
    }

    /// Copies this subtree out into a tree of its own.
    pub fn to_instruction(&self) -> Instruction {
        let mut out = Instruction::empty();
        let mut map = HashMap::new();
        let mut copied = Vec::new();
        let mut pending = vec![self.id];
        while let Some(id) = pending.pop() {
            let node = self.tree.nodes[id].clone();
            for body in node.kind.bodies() {
                pending.extend_from_slice(body);
            }
            let new = out.nodes.insert(node);
            map.insert(id, new);
            copied.push(new);
        }
        for id in copied {
            out.nodes[id].kind.remap(&map);
        }
        out.root = map[&self.id];
        out
    }
}

impl<'a> Body<'a> {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn handles(&self) -> &'a [InstrId] {
        self.ids
    }

    pub fn get(&self, index: usize) -> Option<InstrRef<'a>> {
        let id = *self.ids.get(index)?;
        Some(InstrRef {
            tree: self.tree,
            id,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = InstrRef<'a>> + 'a {
        let tree = self.tree;
        self.ids.iter().map(move |&id| InstrRef { tree, id })
    }
}

impl PartialEq for InstrRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self.id, other.id)];
        while let Some((a, b)) = pending.pop() {
            let (x, y) = (&self.tree.nodes[a].kind, &other.tree.nodes[b].kind);
            let same = match (x, y) {
                (
                    Kind::For {
                        iterator: i,
                        lower: l,
                        upper: u,
                        ..
                    },
                    Kind::For {
                        iterator: j,
                        lower: m,
                        upper: v,
                        ..
                    },
                ) => i == j && l == m && u == v,
                (
                    Kind::Branch {
                        condition: c,
                        otherwise: o,
                        ..
                    },
                    Kind::Branch {
                        condition: d,
                        otherwise: p,
                        ..
                    },
                ) => c == d && o.is_some() == p.is_some(),
                (
                    Kind::Call {
                        function: f,
                        arguments: xs,
                    },
                    Kind::Call {
                        function: g,
                        arguments: ys,
                    },
                ) => f == g && xs == ys,
                (Kind::Block { .. }, Kind::Block { .. }) => true,
                (Kind::Async { clocked: c, .. }, Kind::Async { clocked: d, .. })
                | (Kind::Finish { clocked: c, .. }, Kind::Finish { clocked: d, .. }) => c == d,
                (Kind::Advance, Kind::Advance) => true,
                (Kind::Opaque { text: s, .. }, Kind::Opaque { text: t, .. }) => s == t,
                _ => false,
            };
            if !same {
                return false;
            }
            for (p, q) in x.bodies().into_iter().zip(y.bodies()) {
                if p.len() != q.len() {
                    return false;
                }
                pending.extend(p.iter().copied().zip(q.iter().copied()));
            }
        }
        true
    }
}

impl Eq for InstrRef<'_> {}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        self.root() == other.root()
    }
}

impl Eq for Instruction {}

impl PartialEq<InstrRef<'_>> for Instruction {
    fn eq(&self, other: &InstrRef<'_>) -> bool {
        self.root() == *other
    }
}

impl PartialEq for Body<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Display for InstrRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Printer::default().write_instruction(f, *self)
    }
}

impl fmt::Display for Body<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Printer::default().write_body(f, *self)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root().fmt(f)
    }
}

impl fmt::Debug for InstrRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstrRef({:?})", self.to_string())
    }
}

impl fmt::Debug for Body<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instruction({:?})", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Op;

    fn id(name: &str) -> Expr {
        Expr::identifier(name).unwrap()
    }

    fn call(name: &str, args: Vec<Expr>) -> Instruction {
        Instruction::function_call(name, args).unwrap()
    }

    fn lt(a: Expr, b: Expr) -> Expr {
        Expr::binary(Op::Lt, a, b).unwrap()
    }

    #[test]
    fn for_loop_accessors() {
        let body = vec![call("f", vec![id("i")])];
        let l = Instruction::for_loop("i", Expr::number(0), id("N"), body).unwrap();
        let root = l.root();
        assert_eq!(root.get_type(), InstrType::For);
        assert_eq!(root.for_loop_iterator().unwrap(), "i");
        assert_eq!(root.identifier(), Some("i"));
        assert!(root.for_loop_lower().unwrap().is_zero());
        assert_eq!(root.for_loop_upper().unwrap(), &id("N"));
        let body = root.for_loop_body().unwrap();
        assert_eq!(body.len(), 1);
        assert_eq!(body.get(0).unwrap().function().unwrap(), "f");
        assert_eq!(l.size(), 2);
        assert!(root.condition().is_err());
    }

    #[test]
    fn constructors_validate_identifiers() {
        assert!(matches!(
            Instruction::for_loop("1i", Expr::number(0), Expr::number(1), vec![]),
            Err(Error::InvalidLiteral { .. })
        ));
        assert!(Instruction::function_call("", vec![]).is_err());
    }

    #[test]
    fn else_presence_is_explicit() {
        let without = Instruction::if_then_else(Expr::boolean(true), vec![], None).unwrap();
        assert!(!without.root().has_else().unwrap());
        assert!(without.root().else_body().unwrap().is_none());

        let with = Instruction::if_then_else(Expr::boolean(true), vec![], Some(vec![])).unwrap();
        assert!(with.root().has_else().unwrap());
        assert!(with.root().else_body().unwrap().unwrap().is_empty());
        assert_ne!(with, without);
    }

    #[test]
    fn accessors_reject_wrong_variants() {
        let c = call("f", vec![]);
        let root = c.root();
        assert_eq!(
            root.for_loop_body().unwrap_err(),
            Error::wrong_variant("for loop", "function call")
        );
        assert!(root.has_else().is_err());
        assert!(root.block().is_err());
        assert!(root.opaque_text().is_err());
        assert!(root.body().is_none());
        assert_eq!(root.arguments().unwrap().len(), 0);
    }

    #[test]
    fn async_lifecycle() {
        let mut a = Instruction::deferred(vec![call("g", vec![])], false).unwrap();
        let h = a.handle();
        assert_eq!(a.root().async_state().unwrap(), AsyncState::Created);
        assert_eq!(
            a.finish(h).unwrap_err(),
            Error::InvalidTransition {
                action: "finish",
                state: AsyncState::Created
            }
        );
        a.start(h, Annotation::clock("c0")).unwrap();
        assert_eq!(a.root().annotation().clock.as_deref(), Some("c0"));
        assert!(matches!(
            a.start(h, Annotation::default()),
            Err(Error::InvalidTransition { action: "start", .. })
        ));
        assert!(matches!(a.clocked_finish(h), Err(Error::WrongVariant { .. })));
        a.finish(h).unwrap();
        assert_eq!(a.root().async_state().unwrap(), AsyncState::Finished);
        assert!(a.finish(h).is_err());
    }

    #[test]
    fn clocked_asyncs_finish_with_the_clocked_transition() {
        let mut a = Instruction::clocked_asynchronous(vec![], Annotation::clock("clk")).unwrap();
        let h = a.handle();
        assert!(a.root().is_clocked().unwrap());
        assert_eq!(a.root().async_state().unwrap(), AsyncState::Started);
        assert!(matches!(a.finish(h), Err(Error::WrongVariant { .. })));
        a.clocked_finish(h).unwrap();
        assert!(matches!(
            a.clocked_finish(h),
            Err(Error::InvalidTransition {
                state: AsyncState::Finished,
                ..
            })
        ));

        let mut not_async = Instruction::advance();
        let h = not_async.handle();
        assert_eq!(
            not_async.finish(h).unwrap_err(),
            Error::wrong_variant("async", "advance")
        );
    }

    #[test]
    fn equality_ignores_bookkeeping() {
        let body = || vec![call("f", vec![Expr::number(1)])];
        let mut a = Instruction::asynchronous(body(), Annotation::default()).unwrap();
        let b = Instruction::deferred(body(), false).unwrap();
        assert_eq!(a, b);
        a.annotation_mut(a.handle()).unwrap().level = Some("0".into());
        assert_eq!(a, b);
        let c = Instruction::deferred(body(), true).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn opaque_blocks_take_part_in_equality() {
        let a = Instruction::opaque("#pragma x", vec![Instruction::advance()]).unwrap();
        let b = Instruction::opaque("#pragma x", vec![]).unwrap();
        let c = Instruction::opaque("#pragma y", vec![Instruction::advance()]).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, a.clone());
        assert_eq!(a.root().opaque_text().unwrap(), "#pragma x");
        assert_eq!(a.root().block().unwrap().len(), 1);
    }

    #[test]
    fn replacing_a_body_keeps_other_handles() {
        let inner = Instruction::if_then_else(
            lt(id("i"), Expr::number(3)),
            vec![call("a", vec![])],
            Some(vec![call("b", vec![]), call("c", vec![])]),
        )
        .unwrap();
        let mut tree = Instruction::block(vec![inner, call("d", vec![])]).unwrap();
        let body = tree.root().block().unwrap();
        let branch = body.handles()[0];
        let d = body.handles()[1];
        assert_eq!(tree.size(), 6);

        tree.set_else_body(branch, None).unwrap();
        assert_eq!(tree.size(), 4);
        assert_eq!(tree.get(d).unwrap().function().unwrap(), "d");
        assert!(!tree.get(branch).unwrap().has_else().unwrap());

        tree.set_then_body(branch, vec![Instruction::advance(), Instruction::advance()])
            .unwrap();
        assert_eq!(tree.size(), 5);
        assert_eq!(tree.get(branch).unwrap().then_body().unwrap().len(), 2);
        assert_eq!(tree.get(d).unwrap().function().unwrap(), "d");
    }

    #[test]
    fn stale_handles_are_rejected() {
        let mut tree = Instruction::block(vec![call("a", vec![])]).unwrap();
        let root = tree.handle();
        let a = tree.root().block().unwrap().handles()[0];
        tree.set_block(root, vec![]).unwrap();
        assert_eq!(tree.get(a).unwrap_err(), Error::UnknownHandle(a));
        assert_eq!(
            tree.set_function(a, "b").unwrap_err(),
            Error::UnknownHandle(a)
        );
    }

    #[test]
    fn failed_mutators_change_nothing() {
        let mut tree = call("f", vec![Expr::number(1)]);
        let h = tree.handle();
        let before = tree.clone();
        assert!(tree.set_for_loop_body(h, vec![Instruction::advance()]).is_err());
        assert!(tree.set_function(h, "no way").is_err());
        assert!(tree.push(h, Instruction::advance()).is_err());
        assert!(tree.set_condition(h, Expr::boolean(true)).is_err());
        assert_eq!(tree, before);
        assert_eq!(tree.size(), 1);
    }

    #[test]
    fn mutators_update_fields() {
        let mut l = Instruction::for_loop("i", Expr::number(0), Expr::number(9), vec![]).unwrap();
        let h = l.handle();
        l.set_for_loop_iterator(h, "j").unwrap();
        l.set_for_loop_lower(h, Expr::number(1)).unwrap();
        l.set_for_loop_upper(h, id("M")).unwrap();
        let pushed = l.push(h, call("f", vec![id("j")])).unwrap();
        l.push_argument(pushed, Expr::number(2)).unwrap();
        l.set_function(pushed, "g").unwrap();
        let expected = Instruction::for_loop(
            "j",
            Expr::number(1),
            id("M"),
            vec![call("g", vec![id("j"), Expr::number(2)])],
        )
        .unwrap();
        assert_eq!(l, expected);

        let mut o = Instruction::opaque("x", vec![]).unwrap();
        let h = o.handle();
        o.set_opaque_text(h, "y").unwrap();
        o.set_block(h, vec![Instruction::advance()]).unwrap();
        assert_eq!(o, Instruction::opaque("y", vec![Instruction::advance()]).unwrap());
    }

    #[test]
    fn subtrees_copy_out() {
        let inner = Instruction::block(vec![call("a", vec![]), Instruction::advance()]).unwrap();
        let tree =
            Instruction::for_loop("i", Expr::number(0), Expr::number(1), vec![inner.clone()])
                .unwrap();
        let copied = tree.root().for_loop_body().unwrap().get(0).unwrap().to_instruction();
        assert_eq!(copied, inner);
        assert_eq!(copied.size(), 3);
        let copy = tree.try_clone().unwrap();
        assert_eq!(copy, tree);
    }

    #[test]
    fn finish_regions() {
        let spawn =
            || Instruction::asynchronous(vec![call("f", vec![])], Annotation::default()).unwrap();
        let mut f = Instruction::finish_block(vec![spawn(), Instruction::advance()]).unwrap();
        let clocked = Instruction::clocked_finish_block(vec![spawn(), Instruction::advance()]).unwrap();
        let root = f.root();
        assert_eq!(root.get_type(), InstrType::Finish { clocked: false });
        assert_eq!(clocked.get_type().name(), "clocked finish");
        assert!(!root.is_clocked().unwrap());
        assert_eq!(root.block().unwrap().len(), 2);
        assert!(root.async_state().is_err());
        assert_ne!(f, clocked);
        assert_ne!(f, Instruction::block(vec![spawn(), Instruction::advance()]).unwrap());
        assert_eq!(f.size(), 4);

        let h = f.handle();
        assert_eq!(
            f.finish(h).unwrap_err(),
            Error::wrong_variant("async", "finish")
        );
        f.set_block(h, vec![Instruction::advance()]).unwrap();
        assert_eq!(f, Instruction::finish_block(vec![Instruction::advance()]).unwrap());
        assert_eq!(f.size(), 2);
        let pushed = f.push(h, spawn()).unwrap();
        assert_eq!(f.get(pushed).unwrap().get_type(), InstrType::Async { clocked: false });
    }

    #[test]
    fn wrapping_keeps_the_largest_childs_handles() {
        let mut big = Instruction::block(vec![call("a", vec![]), call("b", vec![])]).unwrap();
        let b = big.root().block().unwrap().handles()[1];
        let big_root = big.handle();
        big.set_function(b, "c").unwrap();
        let small = Instruction::advance();
        let tree = Instruction::if_then_else(
            Expr::boolean(true),
            vec![small.clone()],
            Some(vec![big.clone()]),
        )
        .unwrap();
        assert_eq!(tree.get(b).unwrap().function().unwrap(), "c");
        assert_eq!(big, tree.get(big_root).unwrap());
        assert_eq!(small, tree.root().then_body().unwrap().get(0).unwrap());
        assert_eq!(tree.size(), 5);
    }
}
