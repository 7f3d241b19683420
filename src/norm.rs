//! Loop reduction. Three rewrites collapse two LOOPs into one behind a
//! fresh boolean mode flag; the driver repeats them until at most one
//! back edge remains.

use tracing::{debug, trace};

use crate::ast::Stmt;
use crate::cfg::{self, ast_to_cfg, Cfg, CfgGraph, Edge, EdgeKind, Node, NodeIdx, Span};
use crate::common::{VarName, FLAG_PREFIX};
use crate::conv::cfg_to_ast;
use crate::error::{Error, Result};

/// Issues the mode-flag names of one normalization run. Per-call state
/// rather than a global counter, so concurrent normalizations cannot
/// interfere and tests stay deterministic.
#[derive(Default)]
struct FlagGen {
    next: usize,
}

impl FlagGen {
    fn fresh(&mut self) -> VarName {
        let name = format!("{}{}", FLAG_PREFIX, self.next);
        self.next += 1;
        VarName::new(&name)
    }
}

/// Saved attachment of a region about to be replaced: the neighbour
/// node outside the region and the kind of the edge that reached it.
/// `None` when the region touches the global entry or exit.
type Ctx = Option<(NodeIdx, EdgeKind)>;

////////////////
// The driver //
////////////////

/// Normalize a program: the result has at most one LOOP construct and
/// the same feasible executions.
pub fn normalize(ast: &Stmt) -> Result<Stmt> {
    let mut cfg = ast_to_cfg(ast);
    normalize_cfg(&mut cfg)?;
    cfg_to_ast(&cfg)
}

/// In-place fixpoint on a CFG: rewrite until at most one back edge
/// remains. Runs the three passes in a fixed order each round and
/// re-checks the structural invariants after every pass.
pub fn normalize_cfg(cfg: &mut Cfg) -> Result<()> {
    cfg::validate(cfg)?;
    let mut flags = FlagGen::default();
    let mut count = cfg::back_edge_count(&cfg.graph);
    // A padding round may hold the count steady once per choice node,
    // so the retry budget is bounded rather than strict-decrease.
    let mut rounds = 4 * (count + cfg::amb_count(&cfg.graph)) + 4;
    debug!(back_edges = count, "normalizing");

    while count > 1 {
        if rounds == 0 {
            return Err(Error::Progress(count));
        }
        rounds -= 1;

        let mut fired = 0;
        fired += seq_pass(cfg, &mut flags)?;
        cfg::validate(cfg)?;
        fired += nested_pass(cfg, &mut flags)?;
        cfg::validate(cfg)?;
        fired += amb_pass(cfg, &mut flags)?;
        cfg::validate(cfg)?;
        if fired == 0 {
            // Last resort: free a loop stuck on one branch of a choice.
            fired += amb_pad_pass(cfg, &mut flags)?;
            cfg::validate(cfg)?;
        }

        let now = cfg::back_edge_count(&cfg.graph);
        if now > count {
            return Err(Error::Invariant(format!(
                "a rewrite raised the back-edge count from {} to {}",
                count, now
            )));
        }
        if fired == 0 {
            return Err(Error::Progress(count));
        }
        debug!(back_edges = now, rewrites = fired, "round done");
        count = now;
    }
    Ok(())
}

/// Reconnect a freshly built region where the old one was cut out.
fn attach(cfg: &mut Cfg, in_ctx: Ctx, region: Span, out_ctx: Ctx) {
    match in_ctx {
        Some((source, kind)) => {
            cfg.graph.add_edge(source, region.entry, Edge::eps(kind));
        }
        None => cfg.entry = region.entry,
    }
    match out_ctx {
        Some((target, kind)) => {
            cfg.graph.add_edge(region.exit, target, Edge::eps(kind));
        }
        None => cfg.exit = region.exit,
    }
}

//////////////////////
// Sequential loops //
//////////////////////

/// Merge every pair of LOOPs that follow each other on one
/// straight-line segment. Returns the number of rewrites performed.
fn seq_pass(cfg: &mut Cfg, flags: &mut FlagGen) -> Result<usize> {
    let mut fired = 0;
    while let Some((first, second)) = find_seq_pair(cfg)? {
        rewrite_seq(cfg, flags, first, second)?;
        fired += 1;
    }
    Ok(fired)
}

fn find_seq_pair(cfg: &Cfg) -> Result<Option<(NodeIdx, NodeIdx)>> {
    for start in cfg::segment_starts(&cfg.graph, cfg.entry)? {
        let mut previous: Option<NodeIdx> = None;
        for n in cfg::segment(&cfg.graph, start)? {
            if !matches!(cfg.graph[n], Node::Loop) {
                continue;
            }
            if let Some(first) = previous {
                return Ok(Some((first, n)));
            }
            previous = Some(n);
        }
    }
    Ok(None)
}

/// `<pre1>; LOOP(b1); <inter>; LOOP(b2); <post2>` becomes a single
/// loop that each iteration either flips the mode flag (running
/// `<inter>` at most once) or executes the body the current mode
/// dictates. The trailing assume keeps only the runs that flipped.
fn rewrite_seq(cfg: &mut Cfg, flags: &mut FlagGen, first: NodeIdx, second: NodeIdx) -> Result<()> {
    trace!(?first, ?second, "merging sequential loops");
    let in_ctx = cfg::loop_in_ctx(&cfg.graph, first);
    let out_ctx = cfg::loop_out_ctx(&cfg.graph, second);

    let body1 = Span {
        entry: cfg::loop_entry_target(&cfg.graph, first)?,
        exit: cfg::loop_back_source(&cfg.graph, first)?,
    };
    let body2 = Span {
        entry: cfg::loop_entry_target(&cfg.graph, second)?,
        exit: cfg::loop_back_source(&cfg.graph, second)?,
    };
    let (after_first, _) = cfg::loop_out_ctx(&cfg.graph, first)
        .ok_or_else(|| Error::Invariant(format!("loop {:?} has no outgoing context", first)))?;
    let inter = if after_first == second {
        None
    } else {
        let (inter_exit, _) = cfg::loop_in_ctx(&cfg.graph, second).ok_or_else(|| {
            Error::Invariant(format!("loop {:?} has no incoming context", second))
        })?;
        Some(Span {
            entry: after_first,
            exit: inter_exit,
        })
    };

    let flag = flags.fresh();
    let g = &mut cfg.graph;
    cfg::nuke_loop(g, first);
    cfg::nuke_loop(g, second);

    // f := TRUE
    let set = cfg::assign_flag(g, &flag, true);

    // AMB( ASSUME(f == TRUE); f := FALSE; <inter> , ASSUME(f == FALSE) )
    let flip_chk = cfg::assume_flag(g, &flag, true);
    let clear = cfg::assign_flag(g, &flag, false);
    let mut flip = cfg::chain(g, flip_chk, clear);
    if let Some(inter) = inter {
        flip = cfg::chain(g, flip, inter);
    }
    let stay = cfg::assume_flag(g, &flag, false);
    let gate = cfg::make_amb(g, flip, stay);

    // AMB( ASSUME(f == TRUE); <body1> , ASSUME(f == FALSE); <body2> )
    let chk1 = cfg::assume_flag(g, &flag, true);
    let run1 = cfg::chain(g, chk1, body1);
    let chk2 = cfg::assume_flag(g, &flag, false);
    let run2 = cfg::chain(g, chk2, body2);
    let runs = cfg::make_amb(g, run1, run2);

    let mux = cfg::make_amb(g, gate, runs);
    let merged = cfg::make_loop(g, mux);

    // ASSUME(f == FALSE) after the loop forces the transition
    let done = cfg::assume_flag(g, &flag, false);
    let mut whole = cfg::chain(g, set, merged);
    whole = cfg::chain(g, whole, done);

    attach(cfg, in_ctx, whole, out_ctx);
    Ok(())
}

//////////////////
// Nested loops //
//////////////////

/// Collapse a LOOP nested directly on another LOOP's body segment,
/// innermost pair first. Returns the number of rewrites performed.
fn nested_pass(cfg: &mut Cfg, flags: &mut FlagGen) -> Result<usize> {
    let mut fired = 0;
    while let Some((outer, inner)) = find_nested_pair(cfg)? {
        rewrite_nested(cfg, flags, outer, inner)?;
        fired += 1;
    }
    Ok(fired)
}

fn find_nested_pair(cfg: &Cfg) -> Result<Option<(NodeIdx, NodeIdx)>> {
    let g = &cfg.graph;
    for start in cfg::segment_starts(g, cfg.entry)? {
        for n in cfg::segment(g, start)? {
            if !matches!(g[n], Node::Loop) {
                continue;
            }
            if let Some(found) = loop_on_body_segment(g, n)? {
                // descend so the pair is innermost: copies taken by the
                // rewrite must never duplicate a third loop
                let (mut outer, mut inner) = (n, found);
                while let Some(deeper) = loop_on_body_segment(g, inner)? {
                    outer = inner;
                    inner = deeper;
                }
                // defer while the stretches to be copied still hold
                // back edges (choices in them merge first); a later
                // round picks the pair up once they are clean
                let (pre, post) = nested_pre_post(g, outer, inner)?;
                let clean = pre.map_or(true, |s| !span_has_back_edge(g, s))
                    && post.map_or(true, |s| !span_has_back_edge(g, s));
                if clean {
                    return Ok(Some((outer, inner)));
                }
            }
        }
    }
    Ok(None)
}

/// The stretches of `outer`'s body before and after `inner`, absent
/// when `inner` starts or ends the body.
fn nested_pre_post(
    g: &CfgGraph,
    outer: NodeIdx,
    inner: NodeIdx,
) -> Result<(Option<Span>, Option<Span>)> {
    let body_entry = cfg::loop_entry_target(g, outer)?;
    let pre = if body_entry == inner {
        None
    } else {
        let (pre_exit, _) = cfg::loop_in_ctx(g, inner)
            .ok_or_else(|| Error::Invariant(format!("loop {:?} has no incoming context", inner)))?;
        Some(Span {
            entry: body_entry,
            exit: pre_exit,
        })
    };
    let outer_back = cfg::loop_back_source(g, outer)?;
    let post = if outer_back == inner {
        None
    } else {
        let (post_entry, _) = cfg::loop_out_ctx(g, inner)
            .ok_or_else(|| Error::Invariant(format!("loop {:?} has no outgoing context", inner)))?;
        Some(Span {
            entry: post_entry,
            exit: outer_back,
        })
    };
    Ok((pre, post))
}

/// Whether a segment stretch holds a LOOP_BACK edge anywhere inside,
/// including under its choices and loops. The walk never leaves the
/// stretch: its exit's outgoing edge is the only way out.
fn span_has_back_edge(g: &CfgGraph, span: Span) -> bool {
    let mut seen = std::collections::HashSet::new();
    let mut queue = std::collections::VecDeque::new();
    seen.insert(span.entry);
    queue.push_back(span.entry);
    while let Some(n) = queue.pop_front() {
        if n == span.exit {
            continue;
        }
        for (_, target, kind) in cfg::out_edges(g, n) {
            if kind == EdgeKind::LoopBack {
                return true;
            }
            if seen.insert(target) {
                queue.push_back(target);
            }
        }
    }
    false
}

/// First LOOP on the body segment of `head`, if any.
fn loop_on_body_segment(g: &CfgGraph, head: NodeIdx) -> Result<Option<NodeIdx>> {
    let body = cfg::loop_entry_target(g, head)?;
    for n in cfg::segment(g, body)? {
        if matches!(g[n], Node::Loop) {
            return Ok(Some(n));
        }
    }
    Ok(None)
}

/// `LOOP(<pre>; LOOP(<body>); <post>)` becomes a single loop whose
/// iterations simulate either the outer level (`<post>; <pre>` again)
/// or the inner level (`<body>`), selected by the mode flag chosen on
/// entry. `<pre>` and `<post>` are deep-copied because the originals
/// are consumed inside the loop body.
fn rewrite_nested(
    cfg: &mut Cfg,
    flags: &mut FlagGen,
    outer: NodeIdx,
    inner: NodeIdx,
) -> Result<()> {
    trace!(?outer, ?inner, "merging nested loops");
    let in_ctx = cfg::loop_in_ctx(&cfg.graph, outer);
    let out_ctx = cfg::loop_out_ctx(&cfg.graph, outer);

    let (pre, post) = nested_pre_post(&cfg.graph, outer, inner)?;
    let body = Span {
        entry: cfg::loop_entry_target(&cfg.graph, inner)?,
        exit: cfg::loop_back_source(&cfg.graph, inner)?,
    };

    let flag = flags.fresh();
    let g = &mut cfg.graph;
    cfg::nuke_loop(g, outer);
    cfg::nuke_loop(g, inner);

    let pre_copy = pre.map(|span| cfg::deep_copy(g, span));
    let post_copy = post.map(|span| cfg::deep_copy(g, span));

    // AMB( f := TRUE; <pre> , f := FALSE )
    let set = cfg::assign_flag(g, &flag, true);
    let enter = match pre {
        Some(pre) => cfg::chain(g, set, pre),
        None => set,
    };
    let skip_in = cfg::assign_flag(g, &flag, false);
    let head = cfg::make_amb(g, enter, skip_in);

    // LOOP( AMB( ASSUME(f == TRUE); <post>; <pre'> ,
    //            ASSUME(f == FALSE); <body> ) )
    let chk_outer = cfg::assume_flag(g, &flag, true);
    let mut sim_outer = chk_outer;
    if let Some(post) = post {
        sim_outer = cfg::chain(g, sim_outer, post);
    }
    if let Some(pre_copy) = pre_copy {
        sim_outer = cfg::chain(g, sim_outer, pre_copy);
    }
    let chk_inner = cfg::assume_flag(g, &flag, false);
    let sim_inner = cfg::chain(g, chk_inner, body);
    let mux = cfg::make_amb(g, sim_outer, sim_inner);
    let merged = cfg::make_loop(g, mux);

    // AMB( ASSUME(f == TRUE); <post'> , ASSUME(f == FALSE) )
    let chk_done = cfg::assume_flag(g, &flag, true);
    let leave = match post_copy {
        Some(post_copy) => cfg::chain(g, chk_done, post_copy),
        None => chk_done,
    };
    let skip_out = cfg::assume_flag(g, &flag, false);
    let tail = cfg::make_amb(g, leave, skip_out);

    let mut whole = cfg::chain(g, head, merged);
    whole = cfg::chain(g, whole, tail);
    attach(cfg, in_ctx, whole, out_ctx);
    Ok(())
}

///////////////////////
// Alternative loops //
///////////////////////

/// Merge the loops sitting on both branches of an AMB. Returns the
/// number of rewrites performed.
fn amb_pass(cfg: &mut Cfg, flags: &mut FlagGen) -> Result<usize> {
    let mut fired = 0;
    while let Some(split) = find_amb_pair(cfg)? {
        rewrite_amb(cfg, flags, split)?;
        fired += 1;
    }
    Ok(fired)
}

fn find_amb_pair(cfg: &Cfg) -> Result<Option<NodeIdx>> {
    let g = &cfg.graph;
    for start in cfg::segment_starts(g, cfg.entry)? {
        for n in cfg::segment(g, start)? {
            if !matches!(g[n], Node::Amb { .. }) {
                continue;
            }
            let (left, right) = cfg::amb_branches(g, n)?;
            if loop_on_segment(g, left)?.is_some() && loop_on_segment(g, right)?.is_some() {
                return Ok(Some(n));
            }
        }
    }
    Ok(None)
}

/// First LOOP directly on the segment starting at `start`, if any.
fn loop_on_segment(g: &CfgGraph, start: NodeIdx) -> Result<Option<NodeIdx>> {
    for n in cfg::segment(g, start)? {
        if matches!(g[n], Node::Loop) {
            return Ok(Some(n));
        }
    }
    Ok(None)
}

/// One branch of an AMB under rewrite: its loop header and the (maybe
/// empty) stretches before and after the loop.
struct BranchParts {
    head: NodeIdx,
    pre: Option<Span>,
    body: Span,
    post: Option<Span>,
}

fn branch_parts(g: &CfgGraph, start: NodeIdx) -> Result<BranchParts> {
    let units = cfg::segment(g, start)?;
    let head = units
        .iter()
        .copied()
        .find(|n| matches!(g[*n], Node::Loop))
        .ok_or_else(|| Error::Invariant("branch under rewrite lost its loop".to_string()))?;

    let pre = if head == start {
        None
    } else {
        let (pre_exit, _) = cfg::loop_in_ctx(g, head)
            .ok_or_else(|| Error::Invariant(format!("loop {:?} has no incoming context", head)))?;
        Some(Span {
            entry: start,
            exit: pre_exit,
        })
    };

    let body = Span {
        entry: cfg::loop_entry_target(g, head)?,
        exit: cfg::loop_back_source(g, head)?,
    };

    let branch_exit = cfg::unit_exit(g, *units.last())?;
    let post = if branch_exit == head {
        None
    } else {
        let (post_entry, _) = cfg::loop_out_ctx(g, head)
            .ok_or_else(|| Error::Invariant(format!("loop {:?} has no outgoing context", head)))?;
        Some(Span {
            entry: post_entry,
            exit: branch_exit,
        })
    };

    Ok(BranchParts {
        head,
        pre,
        body,
        post,
    })
}

/// `AMB(<pre1>; LOOP(b1); <post1>, <pre2>; LOOP(b2); <post2>)` becomes
/// a choice of mode flag, one loop multiplexing the two bodies, and a
/// guarded choice of the matching postlude.
fn rewrite_amb(cfg: &mut Cfg, flags: &mut FlagGen, split: NodeIdx) -> Result<()> {
    trace!(?split, "merging alternative loops");
    let exit = cfg::amb_exit(&cfg.graph, split)?;
    let in_ctx = cfg::incoming_ctx(&cfg.graph, split)?;
    let out_ctx = cfg::outgoing_ctx(&cfg.graph, exit)?;
    let (lstart, rstart) = cfg::amb_branches(&cfg.graph, split)?;
    let left = branch_parts(&cfg.graph, lstart)?;
    let right = branch_parts(&cfg.graph, rstart)?;

    let flag = flags.fresh();
    let g = &mut cfg.graph;
    cfg::nuke_loop(g, left.head);
    cfg::nuke_loop(g, right.head);
    cfg::nuke_amb(g, split)?;

    // AMB( f := TRUE; <pre1> , f := FALSE; <pre2> )
    let set_l = cfg::assign_flag(g, &flag, true);
    let enter_l = match left.pre {
        Some(pre) => cfg::chain(g, set_l, pre),
        None => set_l,
    };
    let set_r = cfg::assign_flag(g, &flag, false);
    let enter_r = match right.pre {
        Some(pre) => cfg::chain(g, set_r, pre),
        None => set_r,
    };
    let head = cfg::make_amb(g, enter_l, enter_r);

    // LOOP( AMB( ASSUME(f == TRUE); <b1> , ASSUME(f == FALSE); <b2> ) )
    let chk_l = cfg::assume_flag(g, &flag, true);
    let run_l = cfg::chain(g, chk_l, left.body);
    let chk_r = cfg::assume_flag(g, &flag, false);
    let run_r = cfg::chain(g, chk_r, right.body);
    let mux = cfg::make_amb(g, run_l, run_r);
    let merged = cfg::make_loop(g, mux);

    // AMB( ASSUME(f == TRUE); <post1> , ASSUME(f == FALSE); <post2> )
    let done_l = cfg::assume_flag(g, &flag, true);
    let leave_l = match left.post {
        Some(post) => cfg::chain(g, done_l, post),
        None => done_l,
    };
    let done_r = cfg::assume_flag(g, &flag, false);
    let leave_r = match right.post {
        Some(post) => cfg::chain(g, done_r, post),
        None => done_r,
    };
    let tail = cfg::make_amb(g, leave_l, leave_r);

    let mut whole = cfg::chain(g, head, merged);
    whole = cfg::chain(g, whole, tail);
    attach(cfg, in_ctx, whole, out_ctx);
    Ok(())
}

/// Last-resort relief for a loop stuck on one branch of a choice: the
/// loop-less branch gets a trailing `LOOP(ASSUME(FALSE))`, which has
/// zero feasible iterations and so leaves the run set unchanged. The
/// alternative rewrite then hoists the real loop out of the choice
/// where a later sequential pass can reach it.
fn amb_pad_pass(cfg: &mut Cfg, flags: &mut FlagGen) -> Result<usize> {
    let (split, bare_start) = match find_pad_candidate(cfg)? {
        Some(found) => found,
        None => return Ok(0),
    };
    trace!(?split, "padding the loop-less branch of a choice");

    let units = cfg::segment(&cfg.graph, bare_start)?;
    let last_exit = cfg::unit_exit(&cfg.graph, *units.last())?;
    let exit = cfg::amb_exit(&cfg.graph, split)?;
    let join = cfg::out_edges(&cfg.graph, last_exit)
        .into_iter()
        .find(|(_, target, kind)| *target == exit && *kind == EdgeKind::AmbJoin)
        .map(|(id, _, _)| id)
        .ok_or_else(|| Error::Invariant("padded branch has no join edge".to_string()))?;

    let g = &mut cfg.graph;
    g.remove_edge(join);
    let halt = cfg::stmt_span(g, Node::Assume, "FALSE".to_string());
    let pad = cfg::make_loop(g, halt);
    cfg::connect(g, last_exit, pad.entry);
    g.add_edge(pad.exit, exit, Edge::eps(EdgeKind::AmbJoin));

    rewrite_amb(cfg, flags, split)?;
    Ok(1)
}

fn find_pad_candidate(cfg: &Cfg) -> Result<Option<(NodeIdx, NodeIdx)>> {
    let g = &cfg.graph;
    for start in cfg::segment_starts(g, cfg.entry)? {
        for n in cfg::segment(g, start)? {
            if !matches!(g[n], Node::Amb { .. }) {
                continue;
            }
            let (left, right) = cfg::amb_branches(g, n)?;
            match (loop_on_segment(g, left)?, loop_on_segment(g, right)?) {
                (Some(_), None) => return Ok(Some((n, right))),
                (None, Some(_)) => return Ok(Some((n, left))),
                _ => {}
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn normalized(text: &str) -> Stmt {
        normalize(&parse(text).unwrap()).unwrap()
    }

    fn back_edges_of(p: &Stmt) -> usize {
        cfg::back_edge_count(&ast_to_cfg(p).graph)
    }

    fn flag_names(p: &Stmt) -> Vec<VarName> {
        p.variables().into_iter().filter(|v| v.is_flag()).collect()
    }

    fn program_names(p: &Stmt) -> Vec<VarName> {
        p.variables().into_iter().filter(|v| !v.is_flag()).collect()
    }

    /// The single LOOP construct of a normalized program.
    fn find_loop(p: &Stmt) -> Option<&Stmt> {
        match p {
            Stmt::Seq(left, right) | Stmt::Amb(left, right) => {
                find_loop(left).or_else(|| find_loop(right))
            }
            Stmt::Loop(_) => Some(p),
            Stmt::Assume(_) | Stmt::Assign(_, _) => None,
        }
    }

    #[test]
    fn loop_free_programs_are_untouched() {
        let p = parse("ASSIGN(x, TRUE)").unwrap();
        let n = normalize(&p).unwrap();
        assert_eq!(p, n);
        assert_eq!(back_edges_of(&n), 0);

        let p = parse("SEQ(ASSUME(x == y), ASSIGN(x, FALSE))").unwrap();
        let n = normalize(&p).unwrap();
        assert_eq!(p, n);
        assert_eq!(back_edges_of(&n), 0);
    }

    #[test]
    fn a_single_loop_is_already_normal() {
        let p = parse("LOOP(ASSIGN(x, TRUE))").unwrap();
        let n = normalize(&p).unwrap();
        assert_eq!(p, n);
        assert_eq!(back_edges_of(&n), 1);
    }

    #[test]
    fn sequential_loops_merge_behind_one_flag() {
        let n = normalized("SEQ(LOOP(ASSIGN(x, TRUE)), LOOP(ASSIGN(y, FALSE)))");
        assert_eq!(back_edges_of(&n), 1);
        assert_eq!(n.loop_count(), 1);
        assert_eq!(flag_names(&n).len(), 1);
        let names: Vec<String> = program_names(&n).iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["x", "y"]);

        // shape: f := TRUE; LOOP(AMB(AMB(..), AMB(..))); ASSUME(f == FALSE)
        match &n {
            Stmt::Seq(first, rest) => {
                assert!(matches!(**first, Stmt::Assign(ref v, _) if v.is_flag()));
                match &**rest {
                    Stmt::Seq(lp, _) => match &**lp {
                        Stmt::Loop(body) => match &**body {
                            Stmt::Amb(gate, runs) => {
                                assert!(matches!(**gate, Stmt::Amb(_, _)));
                                assert!(matches!(**runs, Stmt::Amb(_, _)));
                            }
                            other => panic!("loop body is not a choice: {}", other),
                        },
                        other => panic!("expected the merged loop, got {}", other),
                    },
                    other => panic!("expected loop then guard, got {}", other),
                }
            }
            other => panic!("expected a sequence, got {}", other),
        }
    }

    #[test]
    fn nested_loops_merge_behind_one_flag() {
        let n = normalized("LOOP(SEQ(LOOP(ASSIGN(x, TRUE)), ASSIGN(y, FALSE)))");
        assert_eq!(back_edges_of(&n), 1);
        assert_eq!(n.loop_count(), 1);
        assert_eq!(flag_names(&n).len(), 1);
        // the surviving loop multiplexes the two levels with a choice
        match find_loop(&n) {
            Some(Stmt::Loop(body)) => assert!(matches!(**body, Stmt::Amb(_, _))),
            other => panic!("expected a loop, got {:?}", other),
        }
    }

    #[test]
    fn alternative_loops_merge_behind_one_flag() {
        let n = normalized("AMB(LOOP(ASSIGN(x, TRUE)), LOOP(ASSIGN(y, FALSE)))");
        assert_eq!(back_edges_of(&n), 1);
        assert_eq!(n.loop_count(), 1);
        assert_eq!(flag_names(&n).len(), 1);
        // shape: the mode choice comes first, then the single loop
        match &n {
            Stmt::Seq(first, rest) => {
                assert!(matches!(**first, Stmt::Amb(_, _)));
                assert!(find_loop(rest).is_some());
            }
            other => panic!("expected a sequence starting with a choice, got {}", other),
        }
    }

    #[test]
    fn three_sequential_loops_still_end_at_one() {
        let n = normalized(
            "SEQ(LOOP(ASSIGN(a, 1)), SEQ(ASSIGN(m, 0), SEQ(LOOP(ASSIGN(b, 2)), LOOP(ASSIGN(c, 3)))))",
        );
        assert_eq!(back_edges_of(&n), 1);
        assert_eq!(n.loop_count(), 1);
    }

    #[test]
    fn triply_nested_loops_still_end_at_one() {
        let n = normalized("LOOP(LOOP(LOOP(ASSIGN(x, TRUE))))");
        assert_eq!(back_edges_of(&n), 1);
        assert_eq!(n.loop_count(), 1);
    }

    #[test]
    fn choice_loops_inside_an_outer_loop_merge_choice_first() {
        // the nested rewrite must wait until the choice's loops have
        // merged, or its copies would duplicate back edges
        let n = normalized(
            "LOOP(SEQ(AMB(LOOP(ASSIGN(a, 1)), LOOP(ASSIGN(b, 2))), LOOP(ASSIGN(c, 3))))",
        );
        assert_eq!(back_edges_of(&n), 1);
        assert_eq!(n.loop_count(), 1);
    }

    #[test]
    fn loop_on_one_branch_only_is_hoisted() {
        // neither the sequential nor the alternative trigger matches at
        // first; the padding fallback must free the stuck loop
        let n = normalized(
            "SEQ(AMB(LOOP(ASSIGN(x, TRUE)), ASSIGN(a, TRUE)), LOOP(ASSIGN(y, TRUE)))",
        );
        assert_eq!(back_edges_of(&n), 1);
        assert_eq!(n.loop_count(), 1);
    }

    #[test]
    fn loops_in_amb_branches_with_surrounding_code() {
        let n = normalized(
            "SEQ(ASSIGN(i, 0), SEQ(AMB(SEQ(ASSUME(p), SEQ(LOOP(ASSIGN(x, 1)), ASSIGN(q, 2))), SEQ(LOOP(ASSIGN(y, 3)), ASSUME(r))), ASSIGN(z, 4)))",
        );
        assert_eq!(back_edges_of(&n), 1);
        assert_eq!(n.loop_count(), 1);
        assert_eq!(flag_names(&n).len(), 1);
    }

    #[test]
    fn sequential_pass_reaches_inside_a_branch() {
        // two loops on one AMB branch merge via the segment-local
        // sequential rewrite, leaving a single back edge overall
        let n = normalized("AMB(SEQ(LOOP(ASSIGN(x, 1)), LOOP(ASSIGN(y, 2))), ASSIGN(a, 0))");
        assert_eq!(back_edges_of(&n), 1);
        assert_eq!(n.loop_count(), 1);
    }

    #[test]
    fn fresh_flags_do_not_collide_across_rewrites() {
        let n = normalized(
            "SEQ(LOOP(ASSIGN(a, 1)), SEQ(LOOP(ASSIGN(b, 2)), LOOP(SEQ(LOOP(ASSIGN(c, 3)), ASSIGN(d, 4)))))",
        );
        assert_eq!(back_edges_of(&n), 1);
        let mut flags = flag_names(&n);
        flags.dedup();
        assert!(flags.len() >= 2);
    }

    #[test]
    fn normalization_preserves_program_variables() {
        let p = parse(
            "SEQ(LOOP(ASSIGN(x, TRUE)), SEQ(ASSUME(x == y), LOOP(ASSIGN(y, FALSE))))",
        )
        .unwrap();
        let n = normalize(&p).unwrap();
        assert_eq!(program_names(&n), p.variables().into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn normalizing_twice_is_idempotent() {
        let once = normalized("SEQ(LOOP(ASSIGN(x, TRUE)), LOOP(ASSIGN(y, FALSE)))");
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn normalized_output_round_trips_through_the_cfg() {
        let n = normalized("AMB(LOOP(ASSIGN(x, TRUE)), LOOP(ASSIGN(y, FALSE)))");
        let rebuilt = cfg_to_ast(&ast_to_cfg(&n)).unwrap();
        assert_eq!(n, rebuilt);
    }

    #[test]
    fn the_merged_cfg_still_satisfies_the_invariants() {
        let ast = parse("SEQ(LOOP(ASSIGN(x, TRUE)), LOOP(ASSIGN(y, FALSE)))").unwrap();
        let mut cfg = ast_to_cfg(&ast);
        normalize_cfg(&mut cfg).unwrap();
        cfg::validate(&cfg).unwrap();
        assert_eq!(cfg::back_edge_count(&cfg.graph), 1);
    }
}
