//! Arithmetic on expressions with constant folding.
//!
//! The operators simplify while they build: neutral and absorbing operands
//! disappear, literal pairs are evaluated, and a literal joining an existing
//! `+` or `*` chain is merged into a literal already in that chain.

use std::ops::{Add, Div, Mul, Neg, Not, Sub};

use crate::expr::{Expr, Node, NodeId};
use crate::ops::Op;

/// Evaluates `a op b`, or `None` when the result is not representable.
fn eval(op: Op, a: i64, b: i64) -> Option<i64> {
    match op {
        Op::Add => a.checked_add(b),
        Op::Sub => a.checked_sub(b),
        Op::Mult => a.checked_mul(b),
        Op::Div => a.checked_div(b),
        Op::Min => Some(a.min(b)),
        Op::Max => Some(a.max(b)),
        _ => None,
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Expr {
    fn as_number(&self) -> Option<i64> {
        self.view().get_number().ok()
    }

    fn is_chain_of(&self, id: NodeId, op: Op) -> bool {
        matches!(self.nodes[id], Node::Binary { op: o, .. } if o == op)
    }

    /// Merges `number` into the first literal reachable through nodes of
    /// `op`, leftmost first.
    fn fold_into_chain(&mut self, number: i64, op: Op) -> bool {
        if !self.is_chain_of(self.root, op) {
            return false;
        }
        let mut pending = vec![(self.root, Side::Left)];
        while let Some((id, side)) = pending.pop() {
            let Node::Binary { lhs, rhs, .. } = self.nodes[id] else {
                continue;
            };
            let child = match side {
                Side::Left => lhs,
                Side::Right => rhs,
            };
            if let Node::Number(n) = self.nodes[child] {
                return match eval(op, n, number) {
                    Some(folded) => {
                        tracing::trace!(?op, n, number, folded, "folded literal into chain");
                        self.nodes[child] = Node::Number(folded);
                        true
                    }
                    None => false,
                };
            }
            if side == Side::Left {
                pending.push((id, Side::Right));
            }
            if self.is_chain_of(child, op) {
                pending.push((child, Side::Left));
            }
        }
        false
    }

    pub fn min(self, other: Expr) -> Expr {
        simplify(Op::Min, self, other)
    }

    pub fn max(self, other: Expr) -> Expr {
        simplify(Op::Max, self, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::join_binary(Op::And, self, other)
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::join_binary(Op::Or, self, other)
    }
}

/// Builds `a op b`, simplifying where the operator allows it.
pub(crate) fn simplify(op: Op, a: Expr, b: Expr) -> Expr {
    match op {
        Op::Add if a.is_zero() => return b,
        Op::Add if b.is_zero() => return a,
        Op::Sub if b.is_zero() => return a,
        Op::Mult if a.is_zero() => return a,
        Op::Mult if b.is_zero() => return b,
        Op::Mult if a.is_one() => return b,
        Op::Mult if b.is_one() => return a,
        Op::Div if a.is_zero() || b.is_one() => return a,
        _ => {}
    }
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        if let Some(n) = eval(op, x, y) {
            tracing::trace!(?op, x, y, n, "folded literals");
            return Expr::number(n);
        }
    }
    if matches!(op, Op::Add | Op::Mult) {
        fold_or_join(op, a, b)
    } else {
        Expr::join_binary(op, a, b)
    }
}

fn fold_or_join(op: Op, mut a: Expr, mut b: Expr) -> Expr {
    if let Some(n) = a.as_number() {
        if b.fold_into_chain(n, op) {
            return b;
        }
    } else if let Some(n) = b.as_number() {
        if a.fold_into_chain(n, op) {
            return a;
        }
    }
    Expr::join_binary(op, a, b)
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        simplify(Op::Add, self, rhs)
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        simplify(Op::Sub, self, rhs)
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        simplify(Op::Mult, self, rhs)
    }
}

impl Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        simplify(Op::Div, self, rhs)
    }
}

impl Add<i64> for Expr {
    type Output = Expr;

    fn add(self, rhs: i64) -> Expr {
        self + Expr::number(rhs)
    }
}

impl Sub<i64> for Expr {
    type Output = Expr;

    fn sub(self, rhs: i64) -> Expr {
        self - Expr::number(rhs)
    }
}

impl Mul<i64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: i64) -> Expr {
        self * Expr::number(rhs)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::join_unary(Op::Neg, self)
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::join_unary(Op::Not, self)
    }
}
