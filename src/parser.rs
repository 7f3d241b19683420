use itertools::join;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{anychar, char, digit1};
use nom::character::is_alphanumeric;
use nom::combinator::{all_consuming, not, peek, verify};
use nom::IResult;

use crate::ast::Stmt;
use crate::common::VarName;
use crate::error::{Error, Result};
use crate::exp::{Exp, RelOp};

/// Grammar for the surface syntax (prefix form, whitespace
/// insignificant, `#` starts a comment running to end of line):
///
/// ```latex
/// stmt ::= SEQ(stmt,stmt) | AMB(stmt,stmt) | LOOP(stmt)
///        | ASSUME(expr) | ASSIGN(var,expr)
/// expr ::= var | n | TRUE | FALSE | NOT(expr) | atom ⊕ atom
///
/// with ⊕ ∈ {==, !=, <, <=, >, >=}
/// ```

/// Main function that does the parsing: it takes the program text and
/// produces the AST for it.
pub fn parse(s: &str) -> Result<Stmt> {
    // First remove any comments.
    let s = join(
        s.lines()
            .map(|line| line.find('#').map(|idx| &line[..idx]).unwrap_or(line)),
        "\n",
    );

    // Then flatten: every kind of whitespace is insignificant.
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();

    let result = match all_consuming(stmt)(s.as_str()) {
        Ok((_, p)) => Ok(p),
        Err(nom::Err::Error((rest, _))) | Err(nom::Err::Failure((rest, _))) => Err(
            Error::Malformed(format!("cannot parse statement at `{}`", rest)),
        ),
        Err(nom::Err::Incomplete(_)) => {
            Err(Error::Malformed("unexpected end of input".to_string()))
        }
    };
    result
}

//////////////////////////////
// Edge payload re-parsing  //
//////////////////////////////

/// Re-parse the canonical `v = e` payload of an assignment edge.
pub fn parse_assign_payload(s: &str) -> Result<(VarName, Exp)> {
    match all_consuming(assign_payload)(s) {
        Ok((_, r)) => Ok(r),
        Err(_) => Err(Error::Malformed(format!("bad assignment payload `{}`", s))),
    }
}

/// Re-parse the canonical condition payload of an assume edge.
pub fn parse_assume_payload(s: &str) -> Result<Exp> {
    match all_consuming(cond_exp)(s) {
        Ok((_, e)) => Ok(e),
        Err(_) => Err(Error::Malformed(format!("bad assume payload `{}`", s))),
    }
}

fn assign_payload(s: &str) -> IResult<&str, (VarName, Exp)> {
    let (s, v) = varname(s)?;
    let (s, _) = tag(" = ")(s)?;
    let (s, e) = rhs_exp(s)?;
    Ok((s, (v, e)))
}

/// Right-hand side of an assignment payload: a relation is always
/// parenthesized, so `v = (a == b)` never fuses with the `=` sign.
fn rhs_exp(s: &str) -> IResult<&str, Exp> {
    alt((paren_rel, not_payload, atom_exp))(s)
}

fn paren_rel(s: &str) -> IResult<&str, Exp> {
    let (s, _) = char('(')(s)?;
    let (s, e) = spaced_rel(s)?;
    let (s, _) = char(')')(s)?;
    Ok((s, e))
}

/// Relation in payload form, with spaces around the operator.
fn spaced_rel(s: &str) -> IResult<&str, Exp> {
    let (s, left) = atom_exp(s)?;
    let (s, _) = char(' ')(s)?;
    let (s, op) = rel_op(s)?;
    let (s, _) = char(' ')(s)?;
    let (s, right) = atom_exp(s)?;
    Ok((s, Exp::Rel(op, Box::new(left), Box::new(right))))
}

fn not_payload(s: &str) -> IResult<&str, Exp> {
    let (s, _) = tag("NOT(")(s)?;
    let (s, e) = cond_exp(s)?;
    let (s, _) = char(')')(s)?;
    Ok((s, Exp::Not(Box::new(e))))
}

/// Condition in payload form: `x`, `NOT(...)` or `a ⊕ b`.
fn cond_exp(s: &str) -> IResult<&str, Exp> {
    alt((not_payload, spaced_rel, atom_exp))(s)
}

////////////////
// Statements //
////////////////

/// An atomic statement is one of the five constructors.
fn stmt(s: &str) -> IResult<&str, Stmt> {
    alt((seq, amb, wloop, assume, assign))(s)
}

fn seq(s: &str) -> IResult<&str, Stmt> {
    let (s, _) = tag("SEQ(")(s)?;
    let (s, left) = stmt(s)?;
    let (s, _) = char(',')(s)?;
    let (s, right) = stmt(s)?;
    let (s, _) = char(')')(s)?;
    Ok((s, Stmt::Seq(Box::new(left), Box::new(right))))
}

fn amb(s: &str) -> IResult<&str, Stmt> {
    let (s, _) = tag("AMB(")(s)?;
    let (s, left) = stmt(s)?;
    let (s, _) = char(',')(s)?;
    let (s, right) = stmt(s)?;
    let (s, _) = char(')')(s)?;
    Ok((s, Stmt::Amb(Box::new(left), Box::new(right))))
}

fn wloop(s: &str) -> IResult<&str, Stmt> {
    let (s, _) = tag("LOOP(")(s)?;
    let (s, body) = stmt(s)?;
    let (s, _) = char(')')(s)?;
    Ok((s, Stmt::Loop(Box::new(body))))
}

fn assume(s: &str) -> IResult<&str, Stmt> {
    let (s, _) = tag("ASSUME(")(s)?;
    let (s, e) = expr(s)?;
    let (s, _) = char(')')(s)?;
    Ok((s, Stmt::Assume(Box::new(e))))
}

fn assign(s: &str) -> IResult<&str, Stmt> {
    let (s, _) = tag("ASSIGN(")(s)?;
    let (s, v) = varname(s)?;
    let (s, _) = char(',')(s)?;
    let (s, e) = expr(s)?;
    let (s, _) = char(')')(s)?;
    Ok((s, Stmt::Assign(v, Box::new(e))))
}

/////////////////
// Expressions //
/////////////////

/// An expression in the flattened surface form (no spaces).
fn expr(s: &str) -> IResult<&str, Exp> {
    alt((not_exp, rel_exp, atom_exp))(s)
}

fn not_exp(s: &str) -> IResult<&str, Exp> {
    let (s, _) = tag("NOT(")(s)?;
    let (s, e) = expr(s)?;
    let (s, _) = char(')')(s)?;
    Ok((s, Exp::Not(Box::new(e))))
}

fn rel_exp(s: &str) -> IResult<&str, Exp> {
    let (s, left) = atom_exp(s)?;
    let (s, op) = rel_op(s)?;
    let (s, right) = atom_exp(s)?;
    Ok((s, Exp::Rel(op, Box::new(left), Box::new(right))))
}

/// Two-character symbols come first so that `a<=b` splits at the `<=`
/// and never at the bare `<`.
fn rel_op(s: &str) -> IResult<&str, RelOp> {
    let (s, sym) = alt((
        tag("=="),
        tag("!="),
        tag("<="),
        tag(">="),
        tag("<"),
        tag(">"),
    ))(s)?;
    let op = match sym {
        "==" => RelOp::Eq,
        "!=" => RelOp::Neq,
        "<=" => RelOp::Leq,
        ">=" => RelOp::Geq,
        "<" => RelOp::Lt,
        _ => RelOp::Gt,
    };
    Ok((s, op))
}

fn atom_exp(s: &str) -> IResult<&str, Exp> {
    alt((true_const, false_const, num, var))(s)
}

fn true_const(s: &str) -> IResult<&str, Exp> {
    let (s, _) = keyword("TRUE", s)?;
    Ok((s, Exp::True))
}

fn false_const(s: &str) -> IResult<&str, Exp> {
    let (s, _) = keyword("FALSE", s)?;
    Ok((s, Exp::False))
}

fn num(s: &str) -> IResult<&str, Exp> {
    let (s, n_str) = digit1(s)?;
    peek(not(verify(anychar, |c| is_ident_char(*c))))(s)?;
    let n: i64 = match n_str.parse() {
        Ok(n) => n,
        Err(_) => return Err(nom::Err::Error((s, nom::error::ErrorKind::Digit))),
    };
    Ok((s, Exp::Num(n)))
}

fn var(s: &str) -> IResult<&str, Exp> {
    let (s, v) = varname(s)?;
    Ok((s, Exp::Var(v)))
}

//////////
// Misc //
//////////

/// A variable name is a non-empty identifier that does not start with
/// a digit.
fn varname(s: &str) -> IResult<&str, VarName> {
    let (s, name) = verify(take_while1(is_ident_char), |t: &str| {
        !t.as_bytes()[0].is_ascii_digit()
    })(s)?;
    Ok((s, VarName::new(name)))
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A given keyword `k` is parsed. It must stand by itself, i.e. cannot
/// be followed by another identifier character.
fn keyword<'a>(k: &str, s: &'a str) -> IResult<&'a str, ()> {
    let (s, _) = tag(k)(s)?;
    peek(not(verify(anychar, |c| {
        is_alphanumeric(*c as u8) || *c == '_'
    })))(s)?;
    Ok((s, ()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignment_of_constant() {
        let p = parse("ASSIGN(x, TRUE)").unwrap();
        assert_eq!(
            p,
            Stmt::Assign(VarName::new("x"), Box::new(Exp::True))
        );
    }

    #[test]
    fn parses_sequence_with_relation() {
        let p = parse("SEQ(ASSUME(x == y), ASSIGN(x, FALSE))").unwrap();
        match p {
            Stmt::Seq(left, right) => {
                assert_eq!(
                    *left,
                    Stmt::Assume(Box::new(Exp::Rel(
                        RelOp::Eq,
                        Box::new(Exp::Var(VarName::new("x"))),
                        Box::new(Exp::Var(VarName::new("y"))),
                    )))
                );
                assert_eq!(
                    *right,
                    Stmt::Assign(VarName::new("x"), Box::new(Exp::False))
                );
            }
            other => panic!("expected SEQ, got {:?}", other),
        }
    }

    #[test]
    fn whitespace_and_comments_are_insignificant() {
        let text = "SEQ(  # leading half\n  ASSUME(x),\n  ASSIGN(y, 3)  # trailing half\n)";
        let flat = parse("SEQ(ASSUME(x),ASSIGN(y,3))").unwrap();
        assert_eq!(parse(text).unwrap(), flat);
    }

    #[test]
    fn leq_beats_lt_when_splitting() {
        let p = parse("ASSUME(a<=b)").unwrap();
        assert_eq!(
            p,
            Stmt::Assume(Box::new(Exp::Rel(
                RelOp::Leq,
                Box::new(Exp::Var(VarName::new("a"))),
                Box::new(Exp::Var(VarName::new("b"))),
            )))
        );
    }

    #[test]
    fn nested_not_recurses() {
        let p = parse("ASSUME(NOT(NOT(x)))").unwrap();
        assert_eq!(
            p,
            Stmt::Assume(Box::new(Exp::Not(Box::new(Exp::Not(Box::new(
                Exp::Var(VarName::new("x"))
            ))))))
        );
    }

    #[test]
    fn keyword_needs_a_boundary() {
        // `TRUEx` is an ordinary identifier, not the constant plus junk
        let p = parse("ASSUME(TRUEx)").unwrap();
        assert_eq!(p, Stmt::Assume(Box::new(Exp::Var(VarName::new("TRUEx")))));
    }

    #[test]
    fn unknown_head_is_malformed() {
        assert!(matches!(parse("FOO(x)"), Err(Error::Malformed(_))));
    }

    #[test]
    fn arity_mismatch_is_malformed() {
        assert!(matches!(
            parse("SEQ(ASSIGN(x,TRUE))"),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(parse("LOOP()"), Err(Error::Malformed(_))));
    }

    #[test]
    fn trailing_garbage_is_malformed() {
        assert!(matches!(
            parse("ASSIGN(x,TRUE))"),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn assign_payload_roundtrips() {
        let (v, e) = parse_assign_payload("v = (a == b)").unwrap();
        assert_eq!(v, VarName::new("v"));
        assert_eq!(format!("{}", e), "a == b");

        let (v, e) = parse_assign_payload("__nflag_0 = TRUE").unwrap();
        assert!(v.is_flag());
        assert_eq!(e, Exp::True);

        let (_, e) = parse_assign_payload("v = NOT(a)").unwrap();
        assert_eq!(format!("{}", e), "NOT(a)");
    }

    #[test]
    fn assume_payload_roundtrips() {
        assert_eq!(
            parse_assume_payload("x").unwrap(),
            Exp::Var(VarName::new("x"))
        );
        assert_eq!(
            format!("{}", parse_assume_payload("a >= b").unwrap()),
            "a >= b"
        );
        assert_eq!(
            format!("{}", parse_assume_payload("NOT(a == b)").unwrap()),
            "NOT(a == b)"
        );
    }
}
