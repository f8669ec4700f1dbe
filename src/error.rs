use std::collections::TryReserveError;

use crate::expr::LiteralKind;
use crate::instr::{AsyncState, InstrId};
use crate::ops::Op;

pub type Result<T> = std::result::Result<T, Error>;

/// Caller-contract violations, reported at the call that commits them.
///
/// Every fallible operation leaves its receiver untouched when it fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid {kind} literal: {reason}")]
    InvalidLiteral { kind: LiteralKind, reason: String },

    #[error("`{op}` takes {expected} operand(s), {found} supplied")]
    InvalidOperandArity {
        op: Op,
        expected: usize,
        found: usize,
    },

    #[error("wrong variant: expected {expected}, found {found}")]
    WrongVariant {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid transition: cannot {action} an async instruction that is {state}")]
    InvalidTransition {
        action: &'static str,
        state: AsyncState,
    },

    #[error("unknown instruction handle {0:?}")]
    UnknownHandle(InstrId),

    #[error("out of memory")]
    OutOfMemory(#[from] TryReserveError),
}

impl Error {
    pub(crate) fn invalid_literal(kind: LiteralKind, reason: impl Into<String>) -> Self {
        Self::InvalidLiteral {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn wrong_variant(expected: &'static str, found: &'static str) -> Self {
        Self::WrongVariant { expected, found }
    }
}
