use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Display;

use itertools::Itertools;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::EdgeDirection::{Incoming, Outgoing};
use serde::{Deserialize, Serialize};
use vec1::Vec1;

use crate::ast::Stmt;
use crate::common::{VarName, EPS};
use crate::error::{Error, Result};

////////////////////
// CFG Definition //
////////////////////

/// A node index is essentially just a number.
pub type NodeIdx = NodeIndex<u32>;
pub type EdgeIdx = EdgeIndex<u32>;

/// The arena every node and edge of a CFG lives in. Stable indices:
/// deletions during surgery never invalidate the indices held
/// elsewhere.
pub type CfgGraph = StableGraph<Node, Edge>;

/// Node of a CFG. Only structural markers carry a tag; join and exit
/// nodes are `Plain`. An `Amb` split holds the index of its paired
/// exit node so that split and join can be recovered as a pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Node {
    Plain,
    Assign,
    Assume,
    Loop,
    Amb { exit: NodeIdx },
}

/// Classification of an edge. `Stmt` edges carry statement text as
/// their payload; every other kind is an ε-transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    SeqTrans,
    LoopEntry,
    LoopBack,
    AmbSplit,
    AmbJoin,
    Stmt,
}

/// Edge of a CFG: a payload string plus its classification.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub payload: String,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn eps(kind: EdgeKind) -> Edge {
        Edge {
            payload: EPS.to_string(),
            kind,
        }
    }

    pub fn stmt(payload: String) -> Edge {
        Edge {
            payload,
            kind: EdgeKind::Stmt,
        }
    }
}

/// Handle on a sub-CFG living inside a shared arena. Spans do not own
/// anything; the surgery primitives re-point them freely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub entry: NodeIdx,
    pub exit: NodeIdx,
}

/// A CFG is an arena of tagged nodes and edges plus distinguished
/// entry and exit nodes. `entry == exit` is the canonical shape of a
/// bare LOOP.
#[derive(Debug)]
pub struct Cfg {
    pub graph: CfgGraph,
    pub entry: NodeIdx,
    pub exit: NodeIdx,
}

/// Two CFGs are equal if they allocated the same nodes and edges in
/// the same order. Back-to-back translations of one AST compare equal
/// under this, which is what makes identifier assignment observable.
impl PartialEq for Cfg {
    fn eq(&self, other: &Self) -> bool {
        self.entry == other.entry
            && self.exit == other.exit
            && self
                .graph
                .node_indices()
                .map(|n| (n, &self.graph[n]))
                .eq(other.graph.node_indices().map(|n| (n, &other.graph[n])))
            && self
                .graph
                .edge_references()
                .map(|e| (e.id(), e.source(), e.target(), e.weight()))
                .eq(other
                    .graph
                    .edge_references()
                    .map(|e| (e.id(), e.source(), e.target(), e.weight())))
    }
}

///////////////////////////////
// Convert an AST into a CFG //
///////////////////////////////

/// Translate an AST into its structured CFG.
pub fn ast_to_cfg(p: &Stmt) -> Cfg {
    let mut g = CfgGraph::new();
    let span = build_stmt(&mut g, p);
    Cfg {
        graph: g,
        entry: span.entry,
        exit: span.exit,
    }
}

/// Structural translation driven by the root constructor. Allocation
/// order is fixed so identifier sequences are reproducible.
fn build_stmt(g: &mut CfgGraph, p: &Stmt) -> Span {
    match p {
        Stmt::Assign(v, e) => stmt_span(g, Node::Assign, format!("{} = {}", v, e.fmt_rhs())),
        Stmt::Assume(e) => stmt_span(g, Node::Assume, format!("{}", e)),
        Stmt::Seq(left, right) => {
            let pre = build_stmt(g, left);
            let post = build_stmt(g, right);
            chain(g, pre, post)
        }
        Stmt::Amb(left, right) => {
            let lspan = build_stmt(g, left);
            let rspan = build_stmt(g, right);
            make_amb(g, lspan, rspan)
        }
        Stmt::Loop(body) => {
            // The LOOP node serves as both entry and exit.
            let head = g.add_node(Node::Loop);
            let body = build_stmt(g, body);
            g.add_edge(head, body.entry, Edge::eps(EdgeKind::LoopEntry));
            g.add_edge(body.exit, head, Edge::eps(EdgeKind::LoopBack));
            Span {
                entry: head,
                exit: head,
            }
        }
    }
}

////////////////////////
// Surgery primitives //
////////////////////////

/// Insert an ε-edge tagged as plain sequencing from `a` to `b`.
pub fn connect(g: &mut CfgGraph, a: NodeIdx, b: NodeIdx) {
    g.add_edge(a, b, Edge::eps(EdgeKind::SeqTrans));
}

/// Concatenate two sub-CFGs in sequence.
pub fn chain(g: &mut CfgGraph, first: Span, second: Span) -> Span {
    connect(g, first.exit, second.entry);
    Span {
        entry: first.entry,
        exit: second.exit,
    }
}

/// Fresh AMB split/exit pair around two branch CFGs. The exit node is
/// allocated first, then the split that back-references it.
pub fn make_amb(g: &mut CfgGraph, left: Span, right: Span) -> Span {
    let exit = g.add_node(Node::Plain);
    let entry = g.add_node(Node::Amb { exit });
    g.add_edge(entry, left.entry, Edge::eps(EdgeKind::AmbSplit));
    g.add_edge(entry, right.entry, Edge::eps(EdgeKind::AmbSplit));
    g.add_edge(left.exit, exit, Edge::eps(EdgeKind::AmbJoin));
    g.add_edge(right.exit, exit, Edge::eps(EdgeKind::AmbJoin));
    Span { entry, exit }
}

/// Fresh LOOP header wired around a body CFG.
pub fn make_loop(g: &mut CfgGraph, body: Span) -> Span {
    let head = g.add_node(Node::Loop);
    g.add_edge(head, body.entry, Edge::eps(EdgeKind::LoopEntry));
    g.add_edge(body.exit, head, Edge::eps(EdgeKind::LoopBack));
    Span {
        entry: head,
        exit: head,
    }
}

/// Two fresh nodes joined by one statement edge.
pub fn stmt_span(g: &mut CfgGraph, tag: Node, payload: String) -> Span {
    let entry = g.add_node(tag);
    let exit = g.add_node(Node::Plain);
    g.add_edge(entry, exit, Edge::stmt(payload));
    Span { entry, exit }
}

/// Two-node CFG carrying `flag = TRUE` / `flag = FALSE`.
pub fn assign_flag(g: &mut CfgGraph, flag: &VarName, val: bool) -> Span {
    stmt_span(g, Node::Assign, format!("{} = {}", flag, bool_text(val)))
}

/// Two-node CFG carrying `flag == TRUE` / `flag == FALSE`.
pub fn assume_flag(g: &mut CfgGraph, flag: &VarName, val: bool) -> Span {
    stmt_span(g, Node::Assume, format!("{} == {}", flag, bool_text(val)))
}

fn bool_text(val: bool) -> &'static str {
    if val {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Delete a LOOP header together with every incident edge (entry,
/// back, and whatever context edges reached it).
pub fn nuke_loop(g: &mut CfgGraph, head: NodeIdx) {
    g.remove_node(head);
}

/// Delete an AMB split/exit pair together with every incident edge.
pub fn nuke_amb(g: &mut CfgGraph, split: NodeIdx) -> Result<()> {
    let exit = amb_exit(g, split)?;
    g.remove_node(split);
    g.remove_node(exit);
    Ok(())
}

/// Fresh isomorphic copy of `sub` with new identifiers. `sub` must be
/// weakly closed: every edge reachable from its entry stays inside it
/// (the shape the rewrites produce right after cutting a region out).
pub fn deep_copy(g: &mut CfgGraph, sub: Span) -> Span {
    // Discover the region breadth-first, smallest edge index first, so
    // the copy allocates in a reproducible order.
    let mut order: Vec<NodeIdx> = Vec::new();
    let mut seen: HashSet<NodeIdx> = HashSet::new();
    let mut queue: VecDeque<NodeIdx> = VecDeque::new();
    queue.push_back(sub.entry);
    seen.insert(sub.entry);
    while let Some(n) = queue.pop_front() {
        order.push(n);
        for (_, target, _) in out_edges(g, n) {
            if seen.insert(target) {
                queue.push_back(target);
            }
        }
    }

    // Allocate the copies and record the translation table.
    let mut map: HashMap<NodeIdx, NodeIdx> = HashMap::new();
    for n in &order {
        let weight = g[*n].clone();
        let fresh = g.add_node(weight);
        map.insert(*n, fresh);
    }

    // Re-point the AMB exit back-references into the copy.
    for n in &order {
        if let Node::Amb { exit } = g[map[n]] {
            g[map[n]] = Node::Amb { exit: map[&exit] };
        }
    }

    // Re-create the edges via the translation table, in creation
    // order so that the left/right reading of copied splits survives.
    for n in &order {
        let edges: Vec<(NodeIdx, Edge)> = g
            .edges_directed(*n, Outgoing)
            .map(|e| (e.id(), e.target(), e.weight().clone()))
            .sorted_by_key(|(id, _, _)| id.index())
            .map(|(_, target, weight)| (target, weight))
            .collect();
        for (target, weight) in edges {
            g.add_edge(map[n], map[&target], weight);
        }
    }

    Span {
        entry: map[&sub.entry],
        exit: map[&sub.exit],
    }
}

////////////////////////
// Structural queries //
////////////////////////

/// Edges leaving `n` in ascending edge-index order.
pub fn out_edges(g: &CfgGraph, n: NodeIdx) -> Vec<(EdgeIdx, NodeIdx, EdgeKind)> {
    g.edges_directed(n, Outgoing)
        .map(|e| (e.id(), e.target(), e.weight().kind))
        .sorted_by_key(|(id, _, _)| id.index())
        .collect()
}

/// Edges arriving at `n` in ascending edge-index order.
pub fn in_edges(g: &CfgGraph, n: NodeIdx) -> Vec<(EdgeIdx, NodeIdx, EdgeKind)> {
    g.edges_directed(n, Incoming)
        .map(|e| (e.id(), e.source(), e.weight().kind))
        .sorted_by_key(|(id, _, _)| id.index())
        .collect()
}

/// Payload of the single statement edge leaving an ASSIGN/ASSUME node.
pub fn stmt_payload(g: &CfgGraph, n: NodeIdx) -> Result<String> {
    let mut stmts = g
        .edges_directed(n, Outgoing)
        .filter(|e| e.weight().kind == EdgeKind::Stmt);
    let payload = stmts
        .next()
        .map(|e| e.weight().payload.clone())
        .ok_or_else(|| Error::Invariant(format!("node {:?} has no statement edge", n)))?;
    if stmts.next().is_some() {
        return Err(Error::Invariant(format!(
            "node {:?} has more than one statement edge",
            n
        )));
    }
    Ok(payload)
}

/// Target of the LOOP_ENTRY edge of a LOOP header.
pub fn loop_entry_target(g: &CfgGraph, head: NodeIdx) -> Result<NodeIdx> {
    out_edges(g, head)
        .into_iter()
        .find(|(_, _, kind)| *kind == EdgeKind::LoopEntry)
        .map(|(_, target, _)| target)
        .ok_or_else(|| Error::Invariant(format!("LOOP node {:?} has no entry edge", head)))
}

/// Source of the LOOP_BACK edge of a LOOP header.
pub fn loop_back_source(g: &CfgGraph, head: NodeIdx) -> Result<NodeIdx> {
    in_edges(g, head)
        .into_iter()
        .find(|(_, _, kind)| *kind == EdgeKind::LoopBack)
        .map(|(_, source, _)| source)
        .ok_or_else(|| Error::Invariant(format!("LOOP node {:?} has no back edge", head)))
}

/// The edge that reaches a LOOP header from outside, i.e. its single
/// incoming edge other than the back edge. `None` when the header is
/// the global entry.
pub fn loop_in_ctx(g: &CfgGraph, head: NodeIdx) -> Option<(NodeIdx, EdgeKind)> {
    in_edges(g, head)
        .into_iter()
        .find(|(_, _, kind)| *kind != EdgeKind::LoopBack)
        .map(|(_, source, kind)| (source, kind))
}

/// The edge that leaves a LOOP header for the code after it, i.e. its
/// single outgoing edge other than the entry edge. `None` when the
/// header is the global exit.
pub fn loop_out_ctx(g: &CfgGraph, head: NodeIdx) -> Option<(NodeIdx, EdgeKind)> {
    out_edges(g, head)
        .into_iter()
        .find(|(_, _, kind)| *kind != EdgeKind::LoopEntry)
        .map(|(_, target, kind)| (target, kind))
}

/// Paired exit node of an AMB split.
pub fn amb_exit(g: &CfgGraph, split: NodeIdx) -> Result<NodeIdx> {
    match g[split] {
        Node::Amb { exit } => Ok(exit),
        _ => Err(Error::Invariant(format!(
            "node {:?} is not an AMB split",
            split
        ))),
    }
}

/// Entry nodes of the two branches of an AMB split, in the order the
/// split edges were created (left first).
pub fn amb_branches(g: &CfgGraph, split: NodeIdx) -> Result<(NodeIdx, NodeIdx)> {
    let splits: Vec<NodeIdx> = out_edges(g, split)
        .into_iter()
        .filter(|(_, _, kind)| *kind == EdgeKind::AmbSplit)
        .map(|(_, target, _)| target)
        .collect();
    match splits[..] {
        [left, right] => Ok((left, right)),
        _ => Err(Error::Invariant(format!(
            "AMB node {:?} has {} split edges",
            split,
            splits.len()
        ))),
    }
}

/// The single edge arriving at a node from its surrounding context.
/// `None` for the global entry; an error when the node has more than
/// one incoming edge (i.e. is a LOOP header or an AMB exit).
pub fn incoming_ctx(g: &CfgGraph, n: NodeIdx) -> Result<Option<(NodeIdx, EdgeKind)>> {
    let ins = in_edges(g, n);
    match ins[..] {
        [] => Ok(None),
        [(_, source, kind)] => Ok(Some((source, kind))),
        _ => Err(Error::Invariant(format!(
            "node {:?} has {} incoming edges, expected at most one",
            n,
            ins.len()
        ))),
    }
}

/// The single edge leaving a node for its surrounding context. `None`
/// for the global exit.
pub fn outgoing_ctx(g: &CfgGraph, n: NodeIdx) -> Result<Option<(NodeIdx, EdgeKind)>> {
    let outs = out_edges(g, n);
    match outs[..] {
        [] => Ok(None),
        [(_, target, kind)] => Ok(Some((target, kind))),
        _ => Err(Error::Invariant(format!(
            "node {:?} has {} outgoing edges, expected at most one",
            n,
            outs.len()
        ))),
    }
}

/// The node carrying a structural unit's outgoing boundary edge: the
/// header itself for a LOOP, the paired exit for an AMB, the target of
/// the statement edge for ASSIGN/ASSUME.
pub fn unit_exit(g: &CfgGraph, n: NodeIdx) -> Result<NodeIdx> {
    match g[n] {
        Node::Loop => Ok(n),
        Node::Amb { exit } => Ok(exit),
        Node::Assign | Node::Assume => {
            out_edges(g, n)
                .into_iter()
                .find(|(_, _, kind)| *kind == EdgeKind::Stmt)
                .map(|(_, target, _)| target)
                .ok_or_else(|| {
                    Error::Invariant(format!("statement node {:?} has no statement edge", n))
                })
        }
        Node::Plain => Err(Error::Invariant(format!(
            "untagged node {:?} is not a structural unit",
            n
        ))),
    }
}

/// The structural unit following `n` in sequence, if any. Only plain
/// sequencing edges are followed: a walk stops by itself where the
/// enclosing AMB joins or the enclosing LOOP turns back.
pub fn next_in_seq(g: &CfgGraph, n: NodeIdx) -> Result<Option<NodeIdx>> {
    let exit = unit_exit(g, n)?;
    Ok(out_edges(g, exit)
        .into_iter()
        .find(|(_, _, kind)| *kind == EdgeKind::SeqTrans)
        .map(|(_, target, _)| target))
}

/// The structural units of one straight-line segment, in order.
pub fn segment(g: &CfgGraph, start: NodeIdx) -> Result<Vec1<NodeIdx>> {
    let mut units = Vec1::new(start);
    let mut cursor = start;
    while let Some(next) = next_in_seq(g, cursor)? {
        units.push(next);
        cursor = next;
    }
    Ok(units)
}

/// Entry node of every straight-line segment reachable from `entry`:
/// the top level, each AMB branch, each LOOP body. Outermost first.
pub fn segment_starts(g: &CfgGraph, entry: NodeIdx) -> Result<Vec<NodeIdx>> {
    let mut starts = vec![entry];
    let mut i = 0;
    while i < starts.len() {
        let units = segment(g, starts[i])?;
        for n in units {
            match g[n] {
                Node::Amb { .. } => {
                    let (left, right) = amb_branches(g, n)?;
                    starts.push(left);
                    starts.push(right);
                }
                Node::Loop => starts.push(loop_entry_target(g, n)?),
                _ => {}
            }
        }
        i += 1;
    }
    Ok(starts)
}

/// Number of LOOP_BACK edges in the graph.
pub fn back_edge_count(g: &CfgGraph) -> usize {
    g.edge_references()
        .filter(|e| e.weight().kind == EdgeKind::LoopBack)
        .count()
}

/// Number of AMB splits in the graph.
pub fn amb_count(g: &CfgGraph) -> usize {
    g.node_indices()
        .filter(|n| matches!(g[*n], Node::Amb { .. }))
        .count()
}

//////////////////////
// Invariant checks //
//////////////////////

/// Assertion-style re-check of the structural invariants, run after
/// every normalizer pass. These checks stay on in release builds: a
/// malformation detected late corrupts the whole output.
pub fn validate(cfg: &Cfg) -> Result<()> {
    let g = &cfg.graph;
    if !g.contains_node(cfg.entry) || !g.contains_node(cfg.exit) {
        return Err(Error::Invariant(
            "entry or exit node missing from the arena".to_string(),
        ));
    }

    // The arena must be exactly the closure reachable from the entry.
    let mut seen: HashSet<NodeIdx> = HashSet::new();
    let mut queue: VecDeque<NodeIdx> = VecDeque::new();
    seen.insert(cfg.entry);
    queue.push_back(cfg.entry);
    while let Some(n) = queue.pop_front() {
        for (_, target, _) in out_edges(g, n) {
            if seen.insert(target) {
                queue.push_back(target);
            }
        }
    }
    for n in g.node_indices() {
        if !seen.contains(&n) {
            return Err(Error::Invariant(format!(
                "node {:?} is not reachable from the entry",
                n
            )));
        }
    }

    let amb_exits: HashSet<NodeIdx> = g
        .node_indices()
        .filter_map(|n| match g[n] {
            Node::Amb { exit } => Some(exit),
            _ => None,
        })
        .collect();

    for n in g.node_indices() {
        let ins = in_edges(g, n);
        let outs = out_edges(g, n);

        if n != cfg.entry && ins.is_empty() {
            return Err(Error::Invariant(format!("node {:?} has no incoming edge", n)));
        }
        if n != cfg.exit && outs.is_empty() {
            return Err(Error::Invariant(format!("node {:?} has no outgoing edge", n)));
        }

        // At most one outgoing edge besides a LOOP_ENTRY, except at an
        // AMB split.
        if !matches!(g[n], Node::Amb { .. }) {
            let plain_outs = outs
                .iter()
                .filter(|(_, _, kind)| *kind != EdgeKind::LoopEntry)
                .count();
            if plain_outs > 1 {
                return Err(Error::Invariant(format!(
                    "node {:?} has {} outgoing edges besides the loop entry",
                    n, plain_outs
                )));
            }
        }

        match g[n] {
            Node::Assign | Node::Assume => {
                if outs.len() != 1 || outs[0].2 != EdgeKind::Stmt {
                    return Err(Error::Invariant(format!(
                        "statement node {:?} must have exactly one statement edge",
                        n
                    )));
                }
            }
            Node::Amb { exit } => {
                if outs.len() != 2 || outs.iter().any(|(_, _, kind)| *kind != EdgeKind::AmbSplit) {
                    return Err(Error::Invariant(format!(
                        "AMB node {:?} must have exactly two split edges",
                        n
                    )));
                }
                if !g.contains_node(exit) || !matches!(g[exit], Node::Plain) {
                    return Err(Error::Invariant(format!(
                        "AMB node {:?} lost its paired exit",
                        n
                    )));
                }
                let joins = in_edges(g, exit);
                if joins.len() != 2 || joins.iter().any(|(_, _, kind)| *kind != EdgeKind::AmbJoin) {
                    return Err(Error::Invariant(format!(
                        "AMB exit {:?} must have exactly two join edges",
                        exit
                    )));
                }
            }
            Node::Loop => {
                let backs = ins
                    .iter()
                    .filter(|(_, _, kind)| *kind == EdgeKind::LoopBack)
                    .count();
                if backs != 1 {
                    return Err(Error::Invariant(format!(
                        "LOOP node {:?} has {} back edges",
                        n, backs
                    )));
                }
                if n != cfg.entry && ins.len() != 2 {
                    return Err(Error::Invariant(format!(
                        "LOOP node {:?} has {} incoming edges, expected two",
                        n,
                        ins.len()
                    )));
                }
                let entries = outs
                    .iter()
                    .filter(|(_, _, kind)| *kind == EdgeKind::LoopEntry)
                    .count();
                if entries != 1 || outs.len() > 2 {
                    return Err(Error::Invariant(format!(
                        "LOOP node {:?} has a malformed edge fan-out",
                        n
                    )));
                }
            }
            Node::Plain => {
                let stmt_ins = ins
                    .iter()
                    .filter(|(_, _, kind)| *kind == EdgeKind::Stmt)
                    .count();
                let join_ins = ins
                    .iter()
                    .filter(|(_, _, kind)| *kind == EdgeKind::AmbJoin)
                    .count();
                let ok = (stmt_ins == 1 && ins.len() == 1)
                    || (join_ins == 2 && ins.len() == 2);
                if !ok {
                    return Err(Error::Invariant(format!(
                        "untagged node {:?} is neither a statement target nor an AMB exit",
                        n
                    )));
                }
            }
        }
    }

    // Tag consistency per edge.
    for e in g.edge_references() {
        let (source, target) = (e.source(), e.target());
        let edge = e.weight();
        let eps_ok = edge.kind == EdgeKind::Stmt || edge.payload == EPS;
        if !eps_ok {
            return Err(Error::Invariant(format!(
                "structural edge {:?} carries a non-ε payload `{}`",
                e.id(),
                edge.payload
            )));
        }
        let consistent = match edge.kind {
            EdgeKind::Stmt => {
                matches!(g[source], Node::Assign | Node::Assume)
                    && matches!(g[target], Node::Plain)
                    && edge.payload != EPS
            }
            EdgeKind::SeqTrans => !matches!(g[target], Node::Plain),
            EdgeKind::LoopEntry => matches!(g[source], Node::Loop),
            EdgeKind::LoopBack => matches!(g[target], Node::Loop),
            EdgeKind::AmbSplit => matches!(g[source], Node::Amb { .. }),
            EdgeKind::AmbJoin => amb_exits.contains(&target),
        };
        if !consistent {
            return Err(Error::Invariant(format!(
                "edge {:?} ({:?}) disagrees with its endpoint tags",
                e.id(),
                edge.kind
            )));
        }
    }

    Ok(())
}

/////////////////////
// Pretty-printing //
/////////////////////

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Plain => write!(f, ""),
            Node::Assign => write!(f, "assign"),
            Node::Assume => write!(f, "assume"),
            Node::Loop => write!(f, "loop"),
            Node::Amb { .. } => write!(f, "amb"),
        }
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.payload)
    }
}
