use std::fs::read_to_string;

use test_generator::test_resources;

use unloop::ast::Stmt;
use unloop::cfg::{ast_to_cfg, back_edge_count, validate};
use unloop::conv::cfg_to_ast;
use unloop::norm::normalize;
use unloop::parser::parse;

fn load(name: &str) -> Stmt {
    let input = read_to_string(format!("{}/prog.txt", name)).unwrap();
    parse(&input).unwrap()
}

#[test_resources("tests-res/*")]
fn test_builder_invariants(name: &str) {
    let cfg = ast_to_cfg(&load(name));
    validate(&cfg).unwrap();
}

#[test_resources("tests-res/*")]
fn test_round_trip(name: &str) {
    let ast = load(name);
    let rebuilt = cfg_to_ast(&ast_to_cfg(&ast)).unwrap();
    assert_eq!(ast, rebuilt);
}

#[test_resources("tests-res/*")]
fn test_deterministic_identifiers(name: &str) {
    let ast = load(name);
    assert_eq!(ast_to_cfg(&ast), ast_to_cfg(&ast));
}

#[test_resources("tests-res/*")]
fn test_normalize_leaves_at_most_one_back_edge(name: &str) {
    let normalized = normalize(&load(name)).unwrap();
    let cfg = ast_to_cfg(&normalized);
    validate(&cfg).unwrap();
    assert!(back_edge_count(&cfg.graph) <= 1);
    assert!(normalized.loop_count() <= 1);
}

#[test_resources("tests-res/*")]
fn test_normalize_preserves_program_variables(name: &str) {
    let ast = load(name);
    let normalized = normalize(&ast).unwrap();
    let original: Vec<_> = ast.variables().into_iter().collect();
    let kept: Vec<_> = normalized
        .variables()
        .into_iter()
        .filter(|v| !v.is_flag())
        .collect();
    assert_eq!(original, kept);
}

#[test_resources("tests-res/*")]
fn test_normalize_is_idempotent(name: &str) {
    let once = normalize(&load(name)).unwrap();
    let twice = normalize(&once).unwrap();
    assert_eq!(once, twice);
}
