use std::{collections::BTreeSet, fmt::Display};
use serde::{Deserialize, Serialize};

use crate::common::VarName;

/// Relational operator of a binary comparison.
#[derive(PartialEq, Clone, Copy, Debug, Eq, Hash, Serialize, Deserialize)]
pub enum RelOp {
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

impl RelOp {
    pub fn symbol(self) -> &'static str {
        match self {
            RelOp::Eq => "==",
            RelOp::Neq => "!=",
            RelOp::Lt => "<",
            RelOp::Leq => "<=",
            RelOp::Gt => ">",
            RelOp::Geq => ">=",
        }
    }
}

impl Display for RelOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Boolean/relational expression. The grammar is intentionally
/// shallow: at statement level a condition is a constant, a single
/// atom, a `NOT` of one of those, or one relation over two atoms.
/// Compound conditions must be flattened by auxiliary assignments.
#[derive(PartialEq, Clone, Debug, Eq, Hash, Serialize, Deserialize)]
pub enum Exp {
    True,
    False,
    Var(VarName),
    Num(i64),
    Not(Box<Exp>),
    Rel(RelOp, Box<Exp>, Box<Exp>),
}

impl Exp {
    /// Collect every variable mentioned somewhere in the expression.
    pub fn collect_vars(&self, acc: &mut BTreeSet<VarName>) {
        match self {
            Exp::True | Exp::False | Exp::Num(_) => {}
            Exp::Var(v) => {
                acc.insert(v.clone());
            }
            Exp::Not(e) => e.collect_vars(acc),
            Exp::Rel(_, left, right) => {
                left.collect_vars(acc);
                right.collect_vars(acc);
            }
        }
    }

    /// Canonical form on the right-hand side of an assignment: a bare
    /// relation gets parenthesized, everything else prints as usual.
    pub fn fmt_rhs(&self) -> String {
        match self {
            Exp::Rel(_, _, _) => format!("({})", self),
            _ => format!("{}", self),
        }
    }
}

impl Display for Exp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exp::True => write!(f, "TRUE"),
            Exp::False => write!(f, "FALSE"),
            Exp::Var(v) => write!(f, "{}", v),
            Exp::Num(n) => write!(f, "{}", n),
            Exp::Not(e) => write!(f, "NOT({})", e),
            Exp::Rel(op, left, right) => write!(f, "{} {} {}", left, op, right),
        }
    }
}
