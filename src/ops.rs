use std::fmt;

/// Every operator an expression node can carry.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Op {
    /// "-" (prefix)
    Neg,
    /// "!"
    Not,
    /// "+"
    Add,
    /// "-"
    Sub,
    /// "*"
    Mult,
    /// "/"
    Div,
    /// "min"
    Min,
    /// "max"
    Max,
    /// "&&"
    And,
    /// "||"
    Or,
    /// "=="
    Eq,
    /// "!="
    Ne,
    /// "<"
    Lt,
    /// "<="
    Le,
    /// ">"
    Gt,
    /// ">="
    Ge,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Op {
    pub const ALL: [Op; 16] = [
        Op::Neg,
        Op::Not,
        Op::Add,
        Op::Sub,
        Op::Mult,
        Op::Div,
        Op::Min,
        Op::Max,
        Op::And,
        Op::Or,
        Op::Eq,
        Op::Ne,
        Op::Lt,
        Op::Le,
        Op::Gt,
        Op::Ge,
    ];

    pub const fn symbol(self) -> &'static str {
        match self {
            Op::Neg => "-",
            Op::Not => "!",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mult => "*",
            Op::Div => "/",
            Op::Min => "min",
            Op::Max => "max",
            Op::And => "&&",
            Op::Or => "||",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }

    /// Number of operands the operator takes.
    pub const fn arity(self) -> usize {
        match self {
            Op::Neg | Op::Not => 1,
            _ => 2,
        }
    }

    pub const fn is_unary(self) -> bool {
        self.arity() == 1
    }

    pub const fn is_binary(self) -> bool {
        self.arity() == 2
    }

    /// `min`/`max` render as calls rather than infix.
    pub const fn is_call_form(self) -> bool {
        matches!(self, Op::Min | Op::Max)
    }

    /// Higher binds tighter. Leaves and call forms sit above every operator.
    pub const fn binding_power(self) -> u8 {
        match self {
            Op::Or => 1,
            Op::And => 2,
            Op::Eq | Op::Ne => 3,
            Op::Lt | Op::Le | Op::Gt | Op::Ge => 4,
            Op::Add | Op::Sub => 5,
            Op::Mult | Op::Div => 6,
            Op::Neg | Op::Not => 7,
            Op::Min | Op::Max => ATOM_POWER,
        }
    }
}

pub(crate) const ATOM_POWER: u8 = 8;
