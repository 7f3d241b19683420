use crate::ast::Stmt;
use crate::cfg::{self, Cfg, Node, NodeIdx};
use crate::error::{Error, Result};
use crate::parser;

/// Rebuild the AST of a structured CFG.
///
/// The walk is read-only: the edge tags already identify every
/// structural boundary, so a branch or loop body ends exactly where a
/// non-sequencing edge would have to be followed. Statement payloads
/// are re-parsed from their canonical text.
pub fn cfg_to_ast(cfg: &Cfg) -> Result<Stmt> {
    node_to_ast(cfg, cfg.entry)
}

/// AST of the sub-CFG headed by `n`, chained with whatever follows
/// `n` in sequence.
fn node_to_ast(cfg: &Cfg, n: NodeIdx) -> Result<Stmt> {
    let g = &cfg.graph;
    let ast = match g[n] {
        Node::Assign => {
            let payload = cfg::stmt_payload(g, n)?;
            let (v, e) = parser::parse_assign_payload(&payload)?;
            Stmt::Assign(v, Box::new(e))
        }
        Node::Assume => {
            let payload = cfg::stmt_payload(g, n)?;
            let e = parser::parse_assume_payload(&payload)?;
            Stmt::Assume(Box::new(e))
        }
        Node::Amb { .. } => {
            let (left, right) = cfg::amb_branches(g, n)?;
            Stmt::Amb(
                Box::new(node_to_ast(cfg, left)?),
                Box::new(node_to_ast(cfg, right)?),
            )
        }
        Node::Loop => {
            let body = cfg::loop_entry_target(g, n)?;
            Stmt::Loop(Box::new(node_to_ast(cfg, body)?))
        }
        Node::Plain => {
            return Err(Error::Invariant(format!(
                "untagged node {:?} heads a segment",
                n
            )))
        }
    };

    // Wrap as SEQ with the successor, if one exists.
    match cfg::next_in_seq(g, n)? {
        Some(next) => Ok(Stmt::Seq(Box::new(ast), Box::new(node_to_ast(cfg, next)?))),
        None => Ok(ast),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ast_to_cfg;
    use crate::parser::parse;

    fn round_trip(text: &str) {
        let ast = parse(text).unwrap();
        let rebuilt = cfg_to_ast(&ast_to_cfg(&ast)).unwrap();
        assert_eq!(ast, rebuilt);
    }

    #[test]
    fn round_trips_single_statements() {
        round_trip("ASSIGN(x, TRUE)");
        round_trip("ASSUME(NOT(x))");
        round_trip("ASSIGN(v, a != b)");
        round_trip("ASSUME(n <= 10)");
    }

    #[test]
    fn round_trips_sequences() {
        round_trip("SEQ(ASSUME(x == y), ASSIGN(x, FALSE))");
        round_trip("SEQ(ASSIGN(a, 1), SEQ(ASSIGN(b, 2), ASSIGN(c, 3)))");
    }

    #[test]
    fn round_trips_loops() {
        round_trip("LOOP(ASSIGN(x, TRUE))");
        round_trip("SEQ(ASSUME(go), LOOP(SEQ(ASSIGN(x, y), ASSUME(x))))");
    }

    #[test]
    fn round_trips_choices() {
        round_trip("AMB(ASSIGN(x, 1), ASSIGN(x, 2))");
        round_trip("SEQ(AMB(ASSUME(a), SEQ(ASSUME(b), ASSIGN(c, 0))), ASSIGN(d, 1))");
    }

    #[test]
    fn round_trips_loops_inside_choices() {
        round_trip("AMB(LOOP(ASSIGN(x, TRUE)), LOOP(ASSIGN(y, FALSE)))");
        round_trip("AMB(SEQ(ASSUME(p), LOOP(ASSIGN(x, 1))), ASSUME(q))");
    }

    #[test]
    fn round_trips_nested_loops() {
        round_trip("LOOP(SEQ(LOOP(ASSIGN(x, TRUE)), ASSIGN(y, FALSE)))");
        round_trip("LOOP(LOOP(ASSIGN(x, TRUE)))");
    }

    #[test]
    fn seq_is_right_nested_after_conversion() {
        // the converter chains successors to the right, matching the
        // parenthesization of the printed form
        let ast = parse("SEQ(SEQ(ASSIGN(a, 1), ASSIGN(b, 2)), ASSIGN(c, 3))").unwrap();
        let rebuilt = cfg_to_ast(&ast_to_cfg(&ast)).unwrap();
        assert_eq!(
            format!("{}", rebuilt),
            "SEQ(ASSIGN(a, 1), SEQ(ASSIGN(b, 2), ASSIGN(c, 3)))"
        );
    }
}
