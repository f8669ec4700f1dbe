//! Text rendering for expressions and instructions.

use std::fmt::{self, Display, Write};
use std::io;

use serde::{Deserialize, Serialize};

use crate::expr::{Expr, ExprRef, Node as ExprNode, NodeId};
use crate::instr::{Annotation, Body, InstrId, InstrRef, Instruction, Kind};
use crate::ops::{Op, ATOM_POWER};

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndentStyle {
    #[default]
    Spaces,
    Tabs,
}

/// How a [`Printer`] lays text out. Missing fields take their defaults.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintOptions {
    pub indent: IndentStyle,
    /// Spaces per level. Ignored with tabs.
    pub indent_width: usize,
    /// Emit ANSI colour escapes.
    pub colour: bool,
    /// Emit a `//` comment with the annotation of each instruction.
    pub annotations: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            indent: IndentStyle::Spaces,
            indent_width: 4,
            colour: false,
            annotations: false,
        }
    }
}

#[derive(Copy, Clone)]
enum Paint {
    Keyword,
    Async,
    Clock,
    Identifier,
    Call,
    Constant,
}

impl Paint {
    const fn code(self) -> &'static str {
        match self {
            Paint::Keyword => "\x1B[1m\x1B[34m",
            Paint::Async => "\x1B[1m\x1B[36m",
            Paint::Clock => "\x1B[1m\x1B[31m",
            Paint::Identifier => "\x1B[33m",
            Paint::Call => "\x1B[1m\x1B[33m",
            Paint::Constant => "\x1B[32m",
        }
    }
}

const RESET: &str = "\x1B[0m";

enum Piece {
    Expr(NodeId, bool),
    Text(&'static str),
}

enum Step {
    Instr(InstrId, usize),
    Open(usize),
    Close(usize),
    Else(usize),
}

fn power(node: ExprNode) -> u8 {
    match node {
        ExprNode::Number(n) if n < 0 => Op::Neg.binding_power(),
        ExprNode::Unary { op, .. } | ExprNode::Binary { op, .. } => op.binding_power(),
        _ => ATOM_POWER,
    }
}

/// Queues a body one level below `depth`, braced unless it holds exactly
/// one instruction.
fn push_body(pending: &mut Vec<Step>, body: &[InstrId], depth: usize, always_brace: bool) {
    let braced = always_brace || body.len() != 1;
    if braced {
        pending.push(Step::Close(depth));
    }
    pending.extend(body.iter().rev().map(|&id| Step::Instr(id, depth + 1)));
    if braced {
        pending.push(Step::Open(depth));
    }
}

/// Whether `body`, printed without braces, ends in an `if` that would take
/// a following `else` as its own.
fn dangles<'a>(tree: &'a Instruction, mut body: &'a [InstrId]) -> bool {
    loop {
        let [id] = body else {
            return false;
        };
        body = match &tree.nodes[*id].kind {
            Kind::Branch {
                otherwise: None, ..
            } => return true,
            Kind::Branch {
                otherwise: Some(otherwise),
                ..
            } => otherwise.as_slice(),
            Kind::For { body, .. } | Kind::Async { body, .. } | Kind::Finish { body, .. } => {
                body.as_slice()
            }
            Kind::Opaque { block, .. } if !block.is_empty() => block.as_slice(),
            _ => return false,
        };
    }
}

#[derive(Clone, Debug, Default)]
pub struct Printer {
    options: PrintOptions,
}

impl Printer {
    pub fn new(options: PrintOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PrintOptions {
        &self.options
    }

    fn paint(&self, out: &mut impl Write, paint: Paint, text: impl Display) -> fmt::Result {
        if self.options.colour {
            write!(out, "{}{text}{RESET}", paint.code())
        } else {
            write!(out, "{text}")
        }
    }

    fn indent(&self, out: &mut impl Write, depth: usize) -> fmt::Result {
        let (unit, count) = match self.options.indent {
            IndentStyle::Spaces => (' ', self.options.indent_width * depth),
            IndentStyle::Tabs => ('\t', depth),
        };
        (0..count).try_for_each(|_| out.write_char(unit))
    }

    /// Infix rendering with only the parentheses the tree needs.
    pub fn write_expr(&self, out: &mut impl Write, expr: ExprRef<'_>) -> fmt::Result {
        let tree = expr.tree;
        let mut pending = vec![Piece::Expr(expr.id, false)];
        while let Some(piece) = pending.pop() {
            let (id, parens) = match piece {
                Piece::Text(text) => {
                    out.write_str(text)?;
                    continue;
                }
                Piece::Expr(id, parens) => (id, parens),
            };
            if parens {
                out.write_char('(')?;
                pending.push(Piece::Text(")"));
            }
            match tree.nodes[id] {
                ExprNode::Number(n) => self.paint(out, Paint::Constant, n)?,
                ExprNode::Boolean(b) => self.paint(out, Paint::Constant, b)?,
                ExprNode::Identifier(sym) => self.paint(out, Paint::Identifier, tree.name(sym))?,
                ExprNode::Unary { op, operand } => {
                    out.write_str(op.symbol())?;
                    let wrap = power(tree.nodes[operand]) <= op.binding_power();
                    pending.push(Piece::Expr(operand, wrap));
                }
                ExprNode::Binary { op, lhs, rhs } if op.is_call_form() => {
                    write!(out, "{}(", op.symbol())?;
                    pending.push(Piece::Text(")"));
                    pending.push(Piece::Expr(rhs, false));
                    pending.push(Piece::Text(", "));
                    pending.push(Piece::Expr(lhs, false));
                }
                ExprNode::Binary { op, lhs, rhs } => {
                    let bp = op.binding_power();
                    pending.push(Piece::Expr(rhs, power(tree.nodes[rhs]) <= bp));
                    pending.push(Piece::Text(" "));
                    pending.push(Piece::Text(op.symbol()));
                    pending.push(Piece::Text(" "));
                    pending.push(Piece::Expr(lhs, power(tree.nodes[lhs]) < bp));
                }
            }
        }
        Ok(())
    }

    pub fn write_instruction(&self, out: &mut impl Write, instr: InstrRef<'_>) -> fmt::Result {
        self.write_steps(out, instr.tree, vec![Step::Instr(instr.id, 0)])
    }

    pub fn write_body(&self, out: &mut impl Write, body: Body<'_>) -> fmt::Result {
        let steps = body.ids.iter().rev().map(|&id| Step::Instr(id, 0)).collect();
        self.write_steps(out, body.tree, steps)
    }

    fn write_steps(
        &self,
        out: &mut impl Write,
        tree: &Instruction,
        mut pending: Vec<Step>,
    ) -> fmt::Result {
        while let Some(step) = pending.pop() {
            let (id, depth) = match step {
                Step::Open(depth) => {
                    self.indent(out, depth)?;
                    out.write_str("{\n")?;
                    continue;
                }
                Step::Close(depth) => {
                    self.indent(out, depth)?;
                    out.write_str("}\n")?;
                    continue;
                }
                Step::Else(depth) => {
                    self.indent(out, depth)?;
                    self.paint(out, Paint::Keyword, "else")?;
                    out.write_char('\n')?;
                    continue;
                }
                Step::Instr(id, depth) => (id, depth),
            };
            let node = &tree.nodes[id];
            if self.options.annotations {
                self.annotation_comment(out, &node.annotation, depth)?;
            }
            match &node.kind {
                Kind::For {
                    iterator,
                    lower,
                    upper,
                    body,
                } => {
                    self.for_loop_header(out, depth, iterator, lower, upper)?;
                    push_body(&mut pending, body, depth, false);
                }
                Kind::Branch {
                    condition,
                    then,
                    otherwise,
                } => {
                    self.if_then_else_header(out, depth, condition)?;
                    if let Some(otherwise) = otherwise {
                        push_body(&mut pending, otherwise, depth, false);
                        pending.push(Step::Else(depth));
                    }
                    let brace = otherwise.is_some() && dangles(tree, then);
                    push_body(&mut pending, then, depth, brace);
                }
                Kind::Call {
                    function,
                    arguments,
                } => self.call_line(out, depth, function, arguments)?,
                Kind::Block { body } => push_body(&mut pending, body, depth, true),
                Kind::Async { clocked, body, .. } | Kind::Finish { clocked, body } => {
                    self.indent(out, depth)?;
                    if *clocked {
                        self.paint(out, Paint::Clock, "clocked ")?;
                    }
                    let keyword = match node.kind {
                        Kind::Async { .. } => "async",
                        _ => "finish",
                    };
                    self.paint(out, Paint::Async, keyword)?;
                    out.write_char('\n')?;
                    push_body(&mut pending, body, depth, false);
                }
                Kind::Advance => {
                    self.indent(out, depth)?;
                    self.paint(out, Paint::Clock, "advance")?;
                    out.write_str(";\n")?;
                }
                Kind::Opaque { text, block } => {
                    for line in text.lines() {
                        self.indent(out, depth)?;
                        writeln!(out, "{line}")?;
                    }
                    if !block.is_empty() {
                        push_body(&mut pending, block, depth, false);
                    }
                }
            }
        }
        Ok(())
    }

    fn for_loop_header(
        &self,
        out: &mut impl Write,
        depth: usize,
        iterator: &str,
        lower: &Expr,
        upper: &Expr,
    ) -> fmt::Result {
        self.indent(out, depth)?;
        self.paint(out, Paint::Keyword, "for")?;
        out.write_char(' ')?;
        self.paint(out, Paint::Identifier, iterator)?;
        out.write_char(' ')?;
        self.paint(out, Paint::Keyword, "in")?;
        out.write_str(" (")?;
        self.write_expr(out, lower.view())?;
        self.paint(out, Paint::Keyword, "..")?;
        self.write_expr(out, upper.view())?;
        out.write_str(")\n")
    }

    fn if_then_else_header(&self, out: &mut impl Write, depth: usize, condition: &Expr) -> fmt::Result {
        self.indent(out, depth)?;
        self.paint(out, Paint::Keyword, "if")?;
        out.write_str(" (")?;
        self.write_expr(out, condition.view())?;
        out.write_str(")\n")
    }

    fn call_line(
        &self,
        out: &mut impl Write,
        depth: usize,
        function: &str,
        arguments: &[Expr],
    ) -> fmt::Result {
        self.indent(out, depth)?;
        self.paint(out, Paint::Call, format_args!("{function} ("))?;
        for (i, argument) in arguments.iter().enumerate() {
            if i > 0 {
                self.paint(out, Paint::Call, ", ")?;
            }
            self.write_expr(out, argument.view())?;
        }
        self.paint(out, Paint::Call, ")")?;
        out.write_str(";\n")
    }

    fn annotation_comment(
        &self,
        out: &mut impl Write,
        annotation: &Annotation,
        depth: usize,
    ) -> fmt::Result {
        if annotation.is_empty() {
            return Ok(());
        }
        self.indent(out, depth)?;
        out.write_str("//")?;
        if let Some(level) = &annotation.level {
            write!(out, " level: {level};")?;
        }
        if let Some(boundaries) = &annotation.boundaries {
            write!(out, " boundaries: {boundaries};")?;
        }
        if let Some(date) = &annotation.date {
            out.write_str(" date: ")?;
            self.write_expr(out, date.view())?;
            out.write_char(';')?;
        }
        if let Some(clock) = &annotation.clock {
            write!(out, " clock: {clock};")?;
        }
        out.write_char('\n')
    }

    pub fn expr_to_string(&self, expr: &Expr) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_expr(&mut out, expr.view());
        out
    }

    pub fn instruction_to_string(&self, instr: &Instruction) -> String {
        let mut out = String::new();
        let _ = self.write_instruction(&mut out, instr.root());
        out
    }

    pub fn fprint(&self, w: &mut impl io::Write, instr: &Instruction) -> io::Result<()> {
        w.write_all(self.instruction_to_string(instr).as_bytes())
    }
}
