use std::{collections::BTreeSet, fmt::Display};
use serde::{Deserialize, Serialize};

use crate::common::VarName;
use crate::exp::Exp;

/// A statement of the While language. Five constructors: sequential
/// composition, non-deterministic choice, loop, assume filter and
/// assignment. `Assume` keeps only the runs on which its expression
/// holds; the others are silently dropped.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize)]
pub enum Stmt {
    Seq(Box<Stmt>, Box<Stmt>),
    Amb(Box<Stmt>, Box<Stmt>),
    Loop(Box<Stmt>),
    Assume(Box<Exp>),
    Assign(VarName, Box<Exp>),
}

impl Stmt {
    /// The set of program variables mentioned anywhere in the program.
    pub fn variables(&self) -> BTreeSet<VarName> {
        let mut acc = BTreeSet::new();
        self.collect_vars(&mut acc);
        acc
    }

    fn collect_vars(&self, acc: &mut BTreeSet<VarName>) {
        match self {
            Stmt::Seq(left, right) | Stmt::Amb(left, right) => {
                left.collect_vars(acc);
                right.collect_vars(acc);
            }
            Stmt::Loop(body) => body.collect_vars(acc),
            Stmt::Assume(e) => e.collect_vars(acc),
            Stmt::Assign(v, e) => {
                acc.insert(v.clone());
                e.collect_vars(acc);
            }
        }
    }

    /// Number of LOOP constructs in the program.
    pub fn loop_count(&self) -> usize {
        match self {
            Stmt::Seq(left, right) | Stmt::Amb(left, right) => {
                left.loop_count() + right.loop_count()
            }
            Stmt::Loop(body) => 1 + body.loop_count(),
            Stmt::Assume(_) | Stmt::Assign(_, _) => 0,
        }
    }
}

impl Display for Stmt {
    /// Canonical prefix text. Whitespace is insignificant on input, so
    /// the printed form re-parses to a structurally equal program.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stmt::Seq(left, right) => write!(f, "SEQ({}, {})", left, right),
            Stmt::Amb(left, right) => write!(f, "AMB({}, {})", left, right),
            Stmt::Loop(body) => write!(f, "LOOP({})", body),
            Stmt::Assume(e) => write!(f, "ASSUME({})", e),
            Stmt::Assign(v, e) => write!(f, "ASSIGN({}, {})", v, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::VarName;
    use crate::exp::RelOp;

    fn var(s: &str) -> VarName {
        VarName::new(s)
    }

    #[test]
    fn variables_cover_both_sides_of_assignments() {
        let p = Stmt::Seq(
            Box::new(Stmt::Assume(Box::new(Exp::Rel(
                RelOp::Lt,
                Box::new(Exp::Var(var("a"))),
                Box::new(Exp::Var(var("b"))),
            )))),
            Box::new(Stmt::Assign(var("c"), Box::new(Exp::Var(var("d"))))),
        );
        let vars: Vec<String> = p.variables().iter().map(|v| v.to_string()).collect();
        assert_eq!(vars, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn loop_count_sees_nested_loops() {
        let p = Stmt::Loop(Box::new(Stmt::Seq(
            Box::new(Stmt::Loop(Box::new(Stmt::Assign(
                var("x"),
                Box::new(Exp::True),
            )))),
            Box::new(Stmt::Assign(var("y"), Box::new(Exp::False))),
        )));
        assert_eq!(p.loop_count(), 2);
    }

    #[test]
    fn display_uses_prefix_form() {
        let p = Stmt::Assign(
            var("x"),
            Box::new(Exp::Rel(
                RelOp::Eq,
                Box::new(Exp::Var(var("y"))),
                Box::new(Exp::Num(3)),
            )),
        );
        assert_eq!(format!("{}", p), "ASSIGN(x, y == 3)");
    }
}
