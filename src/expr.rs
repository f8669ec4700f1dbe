//! Expression trees.
//!
//! An [`Expr`] owns a whole tree: its nodes live in one [`Pool`], identifier
//! names in one interner, and operands refer to each other through
//! [`NodeId`] handles. Dropping or cloning a tree therefore never recurses,
//! however deep the tree is. Every traversal below runs on an explicit stack
//! for the same reason.

use std::fmt;
use std::io;

use string_interner::{DefaultStringInterner, DefaultSymbol};

use crate::error::{Error, Result};
use crate::handle::impl_handle;
use crate::ident;
use crate::ops::Op;
use crate::pool::Pool;
use crate::pretty::Printer;

impl_handle! {
    pub(crate) struct NodeId(u32);
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub(crate) enum Node {
    Number(i64),
    Boolean(bool),
    Identifier(DefaultSymbol),
    Unary { op: Op, operand: NodeId },
    Binary { op: Op, lhs: NodeId, rhs: NodeId },
}

impl Node {
    fn ty(self) -> ExprType {
        match self {
            Node::Number(_) => ExprType::Number,
            Node::Boolean(_) => ExprType::Boolean,
            Node::Identifier(_) => ExprType::Identifier,
            Node::Unary { op, .. } | Node::Binary { op, .. } => ExprType::Operation(op),
        }
    }

    fn operand_count(self) -> usize {
        match self {
            Node::Unary { .. } => 1,
            Node::Binary { .. } => 2,
            _ => 0,
        }
    }
}

/// The discriminator of an expression node.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ExprType {
    Number,
    Boolean,
    Identifier,
    Operation(Op),
}

impl ExprType {
    pub const fn name(self) -> &'static str {
        match self {
            ExprType::Number => "number",
            ExprType::Boolean => "boolean",
            ExprType::Identifier => "identifier",
            ExprType::Operation(op) if op.is_unary() => "unary operation",
            ExprType::Operation(_) => "binary operation",
        }
    }
}

/// The leaf kinds [`Expr::literal`] can build.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum LiteralKind {
    Number,
    Boolean,
    Identifier,
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LiteralKind::Number => "number",
            LiteralKind::Boolean => "boolean",
            LiteralKind::Identifier => "identifier",
        })
    }
}

/// A raw value handed to [`Expr::literal`].
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum Value {
    Number(i64),
    Boolean(bool),
    Text(String),
}

impl Value {
    fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Text(_) => "text",
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// An owned expression tree.
#[derive(Clone)]
pub struct Expr {
    pub(crate) nodes: Pool<Node, NodeId>,
    pub(crate) symbols: DefaultStringInterner,
    pub(crate) root: NodeId,
}

/// A borrowed view of one node of an [`Expr`] and the subtree below it.
#[derive(Copy, Clone)]
pub struct ExprRef<'a> {
    pub(crate) tree: &'a Expr,
    pub(crate) id: NodeId,
}

fn pop_built(built: &mut Vec<NodeId>) -> NodeId {
    match built.pop() {
        Some(id) => id,
        None => unreachable!("operands are built before their operator"),
    }
}

impl Expr {
    fn empty() -> Self {
        Self {
            nodes: Pool::new(),
            symbols: DefaultStringInterner::default(),
            root: NodeId(0),
        }
    }

    fn leaf(node: Node) -> Self {
        let mut expr = Self::empty();
        expr.root = expr.nodes.insert(node);
        expr
    }

    pub fn number(n: i64) -> Self {
        Self::leaf(Node::Number(n))
    }

    pub fn boolean(b: bool) -> Self {
        Self::leaf(Node::Boolean(b))
    }

    pub fn identifier(name: &str) -> Result<Self> {
        ident::validate(name)?;
        Ok(Self::trusted_identifier(name))
    }

    /// For names that were validated when they were first stored.
    pub(crate) fn trusted_identifier(name: &str) -> Self {
        let mut expr = Self::empty();
        let sym = expr.symbols.get_or_intern(name);
        expr.root = expr.nodes.insert(Node::Identifier(sym));
        expr
    }

    /// Builds a leaf of the given kind, checking that `value` fits it.
    pub fn literal(kind: LiteralKind, value: impl Into<Value>) -> Result<Self> {
        match (kind, value.into()) {
            (LiteralKind::Number, Value::Number(n)) => Ok(Self::number(n)),
            (LiteralKind::Boolean, Value::Boolean(b)) => Ok(Self::boolean(b)),
            (LiteralKind::Identifier, Value::Text(name)) => Self::identifier(&name),
            (kind, value) => Err(Error::invalid_literal(
                kind,
                format!("got a {} value", value.kind_name()),
            )),
        }
    }

    pub fn unary(op: Op, mut operand: Self) -> Result<Self> {
        check_arity(op, 1)?;
        operand.nodes.try_reserve(1)?;
        Ok(Self::join_unary(op, operand))
    }

    pub fn binary(op: Op, mut lhs: Self, mut rhs: Self) -> Result<Self> {
        check_arity(op, 2)?;
        // join_binary copies the smaller operand into the larger one
        if lhs.nodes.len() >= rhs.nodes.len() {
            lhs.nodes.try_reserve(rhs.nodes.len() + 1)?;
        } else {
            rhs.nodes.try_reserve(lhs.nodes.len() + 1)?;
        }
        Ok(Self::join_binary(op, lhs, rhs))
    }

    /// Applies `op` to as many operands as it takes.
    pub fn apply(op: Op, operands: Vec<Self>) -> Result<Self> {
        check_arity(op, operands.len())?;
        let mut operands = operands.into_iter();
        match (operands.next(), operands.next()) {
            (Some(operand), None) => Self::unary(op, operand),
            (Some(lhs), Some(rhs)) => Self::binary(op, lhs, rhs),
            _ => unreachable!("arity already checked"),
        }
    }

    pub(crate) fn join_unary(op: Op, mut operand: Self) -> Self {
        let root = operand.nodes.insert(Node::Unary {
            op,
            operand: operand.root,
        });
        operand.root = root;
        operand
    }

    /// Joins two trees under a binary node, copying the smaller tree into
    /// the larger one.
    pub(crate) fn join_binary(op: Op, lhs: Self, rhs: Self) -> Self {
        if lhs.nodes.len() >= rhs.nodes.len() {
            let mut base = lhs;
            let rhs_root = base.graft(&rhs, rhs.root);
            base.root = base.nodes.insert(Node::Binary {
                op,
                lhs: base.root,
                rhs: rhs_root,
            });
            base
        } else {
            let mut base = rhs;
            let lhs_root = base.graft(&lhs, lhs.root);
            base.root = base.nodes.insert(Node::Binary {
                op,
                lhs: lhs_root,
                rhs: base.root,
            });
            base
        }
    }

    /// Copies the subtree of `src` rooted at `from` into this tree's pool and
    /// returns the handle of the copied root.
    pub(crate) fn graft(&mut self, src: &Expr, from: NodeId) -> NodeId {
        let mut pending = vec![(from, false)];
        let mut built = Vec::new();
        while let Some((id, expanded)) = pending.pop() {
            let node = match src.nodes[id] {
                Node::Identifier(sym) => {
                    Node::Identifier(self.symbols.get_or_intern(src.name(sym)))
                }
                Node::Unary { operand, .. } if !expanded => {
                    pending.push((id, true));
                    pending.push((operand, false));
                    continue;
                }
                Node::Unary { op, .. } => Node::Unary {
                    op,
                    operand: pop_built(&mut built),
                },
                Node::Binary { lhs, rhs, .. } if !expanded => {
                    pending.push((id, true));
                    pending.push((rhs, false));
                    pending.push((lhs, false));
                    continue;
                }
                Node::Binary { op, .. } => {
                    let rhs = pop_built(&mut built);
                    let lhs = pop_built(&mut built);
                    Node::Binary { op, lhs, rhs }
                }
                leaf => leaf,
            };
            built.push(self.nodes.insert(node));
        }
        pop_built(&mut built)
    }

    /// Removes the subtree rooted at `from` from the pool.
    pub(crate) fn release(&mut self, from: NodeId) {
        let mut pending = vec![from];
        while let Some(id) = pending.pop() {
            match self.nodes.remove(id) {
                Some(Node::Unary { operand, .. }) => pending.push(operand),
                Some(Node::Binary { lhs, rhs, .. }) => {
                    pending.push(lhs);
                    pending.push(rhs);
                }
                _ => {}
            }
        }
    }

    pub(crate) fn name(&self, sym: DefaultSymbol) -> &str {
        // Symbols never leave the interner that issued them.
        self.symbols.resolve(sym).unwrap_or_default()
    }

    /// Deep copy whose node storage is reserved fallibly. The identifier
    /// interner is still cloned infallibly.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            nodes: self.nodes.try_clone()?,
            symbols: self.symbols.clone(),
            root: self.root,
        })
    }

    pub fn view(&self) -> ExprRef<'_> {
        ExprRef {
            tree: self,
            id: self.root,
        }
    }

    pub fn get_type(&self) -> ExprType {
        self.view().get_type()
    }

    pub fn is_number(&self) -> bool {
        self.view().is_number()
    }

    pub fn is_boolean(&self) -> bool {
        self.view().is_boolean()
    }

    pub fn is_identifier(&self) -> bool {
        self.view().is_identifier()
    }

    pub fn is_operation(&self) -> bool {
        self.view().is_operation()
    }

    pub fn is_zero(&self) -> bool {
        self.view().is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.view().is_one()
    }

    pub fn is_true(&self) -> bool {
        self.view().is_true()
    }

    pub fn is_false(&self) -> bool {
        self.view().is_false()
    }

    pub fn get_number(&self) -> Result<i64> {
        self.view().get_number()
    }

    pub fn get_boolean(&self) -> Result<bool> {
        self.view().get_boolean()
    }

    pub fn get_identifier(&self) -> Result<&str> {
        self.view().get_identifier()
    }

    pub fn get_operator(&self) -> Result<Op> {
        self.view().get_operator()
    }

    pub fn get_left(&self) -> Result<ExprRef<'_>> {
        self.view().get_left()
    }

    pub fn get_right(&self) -> Result<ExprRef<'_>> {
        self.view().get_right()
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    fn root_node(&self) -> Node {
        self.nodes[self.root]
    }

    /// Turns the root into a leaf, releasing whatever operands it owned.
    fn set_leaf(&mut self, leaf: Node) {
        match self.root_node() {
            Node::Unary { operand, .. } => self.release(operand),
            Node::Binary { lhs, rhs, .. } => {
                self.release(lhs);
                self.release(rhs);
            }
            _ => {}
        }
        self.nodes[self.root] = leaf;
    }

    pub fn set_number(&mut self, n: i64) {
        self.set_leaf(Node::Number(n));
    }

    pub fn set_boolean(&mut self, b: bool) {
        self.set_leaf(Node::Boolean(b));
    }

    pub fn set_identifier(&mut self, name: &str) -> Result<()> {
        ident::validate(name)?;
        let sym = self.symbols.get_or_intern(name);
        self.set_leaf(Node::Identifier(sym));
        Ok(())
    }

    /// Replaces the (first) operand of an operation node.
    pub fn set_left_operand(&mut self, operand: Expr) -> Result<()> {
        let root = self.root_node();
        if !matches!(root, Node::Unary { .. } | Node::Binary { .. }) {
            return Err(Error::wrong_variant("operation", root.ty().name()));
        }
        self.nodes.try_reserve(operand.nodes.len())?;
        let new = self.graft(&operand, operand.root);
        let old = match &mut self.nodes[self.root] {
            Node::Unary { operand, .. } => std::mem::replace(operand, new),
            Node::Binary { lhs, .. } => std::mem::replace(lhs, new),
            _ => unreachable!("root checked above"),
        };
        self.release(old);
        Ok(())
    }

    pub fn set_right_operand(&mut self, operand: Expr) -> Result<()> {
        let root = self.root_node();
        if !matches!(root, Node::Binary { .. }) {
            return Err(Error::wrong_variant("binary operation", root.ty().name()));
        }
        self.nodes.try_reserve(operand.nodes.len())?;
        let new = self.graft(&operand, operand.root);
        let old = match &mut self.nodes[self.root] {
            Node::Binary { rhs, .. } => std::mem::replace(rhs, new),
            _ => unreachable!("root checked above"),
        };
        self.release(old);
        Ok(())
    }

    /// Swaps the root operator for another one of the same arity.
    pub fn set_operator(&mut self, new_op: Op) -> Result<()> {
        let root = self.root_node();
        let found = root.operand_count();
        if found == 0 {
            return Err(Error::wrong_variant("operation", root.ty().name()));
        }
        check_arity(new_op, found)?;
        match &mut self.nodes[self.root] {
            Node::Unary { op, .. } | Node::Binary { op, .. } => *op = new_op,
            _ => unreachable!("root checked above"),
        }
        Ok(())
    }

    pub fn print(&self) {
        print!("{self}");
    }

    pub fn fprint(&self, w: &mut impl io::Write) -> io::Result<()> {
        write!(w, "{self}")
    }
}

fn check_arity(op: Op, found: usize) -> Result<()> {
    if op.arity() == found {
        Ok(())
    } else {
        Err(Error::InvalidOperandArity {
            op,
            expected: op.arity(),
            found,
        })
    }
}

impl<'a> ExprRef<'a> {
    pub(crate) fn node(&self) -> Node {
        self.tree.nodes[self.id]
    }

    fn at(&self, id: NodeId) -> ExprRef<'a> {
        ExprRef {
            tree: self.tree,
            id,
        }
    }

    pub fn get_type(&self) -> ExprType {
        self.node().ty()
    }

    pub fn is_number(&self) -> bool {
        matches!(self.node(), Node::Number(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.node(), Node::Boolean(_))
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.node(), Node::Identifier(_))
    }

    pub fn is_operation(&self) -> bool {
        matches!(self.node(), Node::Unary { .. } | Node::Binary { .. })
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.node(), Node::Number(0))
    }

    pub fn is_one(&self) -> bool {
        matches!(self.node(), Node::Number(1))
    }

    pub fn is_true(&self) -> bool {
        matches!(self.node(), Node::Boolean(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self.node(), Node::Boolean(false))
    }

    pub fn get_number(&self) -> Result<i64> {
        match self.node() {
            Node::Number(n) => Ok(n),
            node => Err(Error::wrong_variant("number", node.ty().name())),
        }
    }

    pub fn get_boolean(&self) -> Result<bool> {
        match self.node() {
            Node::Boolean(b) => Ok(b),
            node => Err(Error::wrong_variant("boolean", node.ty().name())),
        }
    }

    pub fn get_identifier(&self) -> Result<&'a str> {
        match self.node() {
            Node::Identifier(sym) => Ok(self.tree.name(sym)),
            node => Err(Error::wrong_variant("identifier", node.ty().name())),
        }
    }

    pub fn get_operator(&self) -> Result<Op> {
        match self.node() {
            Node::Unary { op, .. } | Node::Binary { op, .. } => Ok(op),
            node => Err(Error::wrong_variant("operation", node.ty().name())),
        }
    }

    pub fn get_left(&self) -> Result<ExprRef<'a>> {
        match self.node() {
            Node::Unary { operand, .. } => Ok(self.at(operand)),
            Node::Binary { lhs, .. } => Ok(self.at(lhs)),
            node => Err(Error::wrong_variant("operation", node.ty().name())),
        }
    }

    pub fn get_right(&self) -> Result<ExprRef<'a>> {
        match self.node() {
            Node::Binary { rhs, .. } => Ok(self.at(rhs)),
            node => Err(Error::wrong_variant("binary operation", node.ty().name())),
        }
    }

    /// Number of nodes in this subtree.
    pub fn size(&self) -> usize {
        let mut pending = vec![self.id];
        let mut count = 0;
        while let Some(id) = pending.pop() {
            count += 1;
            match self.tree.nodes[id] {
                Node::Unary { operand, .. } => pending.push(operand),
                Node::Binary { lhs, rhs, .. } => {
                    pending.push(lhs);
                    pending.push(rhs);
                }
                _ => {}
            }
        }
        count
    }

    /// Copies this subtree out into a tree of its own.
    pub fn to_expr(&self) -> Expr {
        let mut expr = Expr::empty();
        expr.root = expr.graft(self.tree, self.id);
        expr
    }
}

impl PartialEq for ExprRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self.id, other.id)];
        while let Some((a, b)) = pending.pop() {
            match (self.tree.nodes[a], other.tree.nodes[b]) {
                (Node::Number(m), Node::Number(n)) if m == n => {}
                (Node::Boolean(x), Node::Boolean(y)) if x == y => {}
                (Node::Identifier(s), Node::Identifier(t))
                    if self.tree.name(s) == other.tree.name(t) => {}
                (
                    Node::Unary { op: p, operand: x },
                    Node::Unary { op: q, operand: y },
                ) if p == q => pending.push((x, y)),
                (
                    Node::Binary {
                        op: p,
                        lhs: a_lhs,
                        rhs: a_rhs,
                    },
                    Node::Binary {
                        op: q,
                        lhs: b_lhs,
                        rhs: b_rhs,
                    },
                ) if p == q => {
                    pending.push((a_rhs, b_rhs));
                    pending.push((a_lhs, b_lhs));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for ExprRef<'_> {}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.view() == other.view()
    }
}

impl Eq for Expr {}

impl PartialEq<ExprRef<'_>> for Expr {
    fn eq(&self, other: &ExprRef<'_>) -> bool {
        self.view() == *other
    }
}

impl fmt::Display for ExprRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Printer::default().write_expr(f, *self)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.view().fmt(f)
    }
}

impl fmt::Debug for ExprRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExprRef({self})")
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({self})")
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::number(n)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::boolean(b)
    }
}

impl TryFrom<&str> for Expr {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        Expr::identifier(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> Expr {
        Expr::identifier(name).unwrap()
    }

    fn bin(op: Op, lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(op, lhs, rhs).unwrap()
    }

    #[test]
    fn literals_check_their_kind() {
        assert_eq!(
            Expr::literal(LiteralKind::Number, 3).unwrap(),
            Expr::number(3)
        );
        assert!(Expr::literal(LiteralKind::Boolean, true).unwrap().is_true());
        assert_eq!(
            Expr::literal(LiteralKind::Identifier, "i")
                .unwrap()
                .get_identifier()
                .unwrap(),
            "i"
        );
        let err = Expr::literal(LiteralKind::Number, "i").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidLiteral {
                kind: LiteralKind::Number,
                ..
            }
        ));
        assert!(Expr::literal(LiteralKind::Identifier, 4).is_err());
        assert!(Expr::literal(LiteralKind::Identifier, "4x").is_err());
    }

    #[test]
    fn operand_arity_is_checked() {
        let err = Expr::unary(Op::Add, Expr::number(1)).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidOperandArity {
                op: Op::Add,
                expected: 2,
                found: 1
            }
        );
        let err = Expr::binary(Op::Neg, Expr::number(1), Expr::number(2)).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidOperandArity {
                op: Op::Neg,
                expected: 1,
                found: 2
            }
        );
        assert!(Expr::apply(Op::Max, vec![Expr::number(1)]).is_err());
        assert!(Expr::apply(Op::Not, vec![Expr::boolean(true)]).is_ok());
        assert!(Expr::apply(Op::Not, vec![]).is_err());
    }

    #[test]
    fn operands_keep_their_sides() {
        // the right operand is larger, so it becomes the base pool
        let rhs = bin(Op::Mult, id("b"), id("c"));
        let e = bin(Op::Sub, id("a"), rhs);
        assert_eq!(e.get_operator().unwrap(), Op::Sub);
        assert_eq!(e.get_left().unwrap().get_identifier().unwrap(), "a");
        let right = e.get_right().unwrap();
        assert_eq!(right.get_operator().unwrap(), Op::Mult);
        assert_eq!(right.get_left().unwrap().get_identifier().unwrap(), "b");
        assert_eq!(right.get_right().unwrap().get_identifier().unwrap(), "c");
    }

    #[test]
    fn predicates_never_fail() {
        let zero = Expr::number(0);
        assert!(zero.is_zero() && zero.is_number() && !zero.is_one());
        assert!(Expr::number(1).is_one());
        let t = Expr::boolean(true);
        assert!(t.is_boolean() && t.is_true() && !t.is_false() && !t.is_zero());
        let x = id("x");
        assert!(x.is_identifier() && !x.is_zero() && !x.is_one());
        assert!(Expr::boolean(false).is_false());
    }

    #[test]
    fn accessors_reject_wrong_variants() {
        let x = id("x");
        assert_eq!(
            x.get_number(),
            Err(Error::wrong_variant("number", "identifier"))
        );
        assert!(x.get_left().is_err());
        assert!(x.get_operator().is_err());
        let neg = Expr::unary(Op::Neg, id("y")).unwrap();
        assert_eq!(
            neg.get_right().unwrap_err(),
            Error::wrong_variant("binary operation", "unary operation")
        );
        assert_eq!(neg.get_type(), ExprType::Operation(Op::Neg));
        assert!(Expr::number(2).get_boolean().is_err());
    }

    #[test]
    fn copies_are_independent() {
        let original = bin(Op::Add, id("i"), Expr::number(1));
        let mut copy = original.clone();
        assert_eq!(copy, original);
        copy.set_right_operand(Expr::number(2)).unwrap();
        assert_ne!(copy, original);
        assert_eq!(original.get_right().unwrap().get_number().unwrap(), 1);
        assert_eq!(original.try_clone().unwrap(), original);
    }

    #[test]
    fn replacing_an_operand_releases_the_old_one() {
        let mut e = bin(Op::Add, bin(Op::Mult, id("a"), id("b")), id("c"));
        assert_eq!(e.size(), 5);
        e.set_left_operand(Expr::number(4)).unwrap();
        assert_eq!(e.size(), 3);
        assert_eq!(e, bin(Op::Add, Expr::number(4), id("c")));
        e.set_number(9);
        assert_eq!(e.size(), 1);
        assert_eq!(e, Expr::number(9));
    }

    #[test]
    fn failed_mutators_leave_the_node_alone() {
        let mut leaf = id("x");
        assert!(leaf.set_left_operand(Expr::number(1)).is_err());
        assert!(leaf.set_identifier("not valid").is_err());
        assert_eq!(leaf, id("x"));

        let mut neg = Expr::unary(Op::Neg, id("x")).unwrap();
        assert!(neg.set_right_operand(Expr::number(1)).is_err());
        assert!(matches!(
            neg.set_operator(Op::Add),
            Err(Error::InvalidOperandArity { .. })
        ));
        assert_eq!(neg.get_operator().unwrap(), Op::Neg);
        neg.set_operator(Op::Not).unwrap();
        assert_eq!(neg.get_operator().unwrap(), Op::Not);
    }

    #[test]
    fn equality_compares_names_not_symbols() {
        let a = bin(Op::Add, id("x"), id("y"));
        let mut b = bin(Op::Add, id("y"), id("y"));
        // `x` is interned second in `b`
        b.set_left_operand(id("x")).unwrap();
        let c = bin(Op::Add, id("y"), id("x"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(Expr::number(1), Expr::boolean(true));
        assert_ne!(
            bin(Op::Add, id("x"), id("y")),
            bin(Op::Sub, id("x"), id("y"))
        );
    }

    #[test]
    fn subtrees_copy_out() {
        let e = bin(Op::Lt, bin(Op::Add, id("i"), Expr::number(1)), id("n"));
        let left = e.get_left().unwrap().to_expr();
        assert_eq!(left, bin(Op::Add, id("i"), Expr::number(1)));
        assert_eq!(left.size(), 3);
        assert_eq!(e.get_left().unwrap().size(), 3);
        assert!(left == e.get_left().unwrap());
    }
}
