//! Expression and instruction trees for loop programs with async and clocked
//! regions.
//!
//! [`Expr`] and [`Instruction`] each own a whole tree in an index arena, so
//! building, copying, comparing, rendering and dropping are all iterative and
//! safe on arbitrarily deep trees.

pub mod annotate;
pub mod cursor;
pub mod error;
pub mod expr;
pub mod fold;
pub mod handle;
pub mod ident;
pub mod instr;
pub mod ops;
pub mod pool;
pub mod pretty;

pub use cursor::{Cursor, Walk};
pub use error::{Error, Result};
pub use expr::{Expr, ExprRef, ExprType, LiteralKind, Value};
pub use instr::{Annotation, AsyncState, Body, InstrId, InstrRef, InstrType, Instruction};
pub use ops::Op;
pub use pretty::{IndentStyle, PrintOptions, Printer};
