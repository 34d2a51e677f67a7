//! Graph construction and reachability analysis over declarations.
//!
//! The uses relation is a general directed multigraph with cycles
//! (class -> method -> class, mutually recursive functions), so
//! reachability is a plain worklist with a visited set; no topological
//! order is required.
//!
//! Performance characteristics:
//! - Graph build: O(|V| + |E|) where V = declarations, E = uses edges
//! - Multi-source reachability: O(|V| + |E|) single traversal

use std::collections::{HashSet, VecDeque};

use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::collect::SourceInfo;
use crate::decls::{DeclId, DeclIndex, DeclKind};

/// Builds the dependency graph from collected source info.
///
/// Uses `DiGraphMap<DeclId, ()>` for memory efficiency: vertices are
/// small copyable ids and edges carry no payload. Every declaration's
/// vertex is added as a node so that reachability never queries a
/// missing vertex.
pub fn build_graph(info: &SourceInfo, index: &DeclIndex) -> DiGraphMap<DeclId, ()> {
    let mut g = DiGraphMap::new();

    for decl in index.iter() {
        g.add_node(vertex(index, decl.id));
    }

    for (from, tos) in &info.uses {
        for to in tos {
            g.add_edge(*from, *to, ());
        }
    }

    g
}

/// Graph vertex for a declaration: canonical, except namespaces.
fn vertex(index: &DeclIndex, id: DeclId) -> DeclId {
    if index.get(id).kind == DeclKind::Namespace {
        id
    } else {
        index.canonical(id)
    }
}

/// Which declarations survived reachability, with two membership tests:
/// by canonical id and by source range. The range test tolerates
/// structural aliasing, where one entity is reached through one node but
/// observed through another with the same extent.
#[derive(Debug, Default)]
pub struct UsageInfo {
    used: HashSet<DeclId>,
    used_ranges: HashSet<(usize, usize)>,
}

impl UsageInfo {
    pub fn is_used(&self, index: &DeclIndex, id: DeclId) -> bool {
        let v = vertex(index, id);
        if self.used.contains(&v) {
            return true;
        }
        self.used_ranges.contains(&index.get(id).range)
    }

    fn add(&mut self, index: &DeclIndex, id: DeclId) {
        self.used.insert(id);
        self.used_ranges.insert(index.get(id).range);
    }

    pub fn used_count(&self) -> usize {
        self.used.len()
    }
}

/// Multi-source worklist from the root set.
///
/// When a class record is marked used, its destructor joins the
/// worklist: destructor calls are implicit and never appear as name
/// references.
pub fn reachable_from_roots(
    g: &DiGraphMap<DeclId, ()>,
    info: &SourceInfo,
    index: &DeclIndex,
) -> UsageInfo {
    let mut usage = UsageInfo::default();
    let mut queue: VecDeque<DeclId> = VecDeque::new();

    for &root in &info.decls_to_keep {
        if g.contains_node(root) {
            queue.push_back(root);
        } else {
            debug!(?root, "root not present in graph");
        }
    }

    while let Some(decl) = queue.pop_front() {
        if usage.used.contains(&decl) {
            continue;
        }
        usage.add(index, decl);

        if g.contains_node(decl) {
            for n in g.neighbors(decl) {
                if !usage.used.contains(&n) {
                    queue.push_back(n);
                }
            }
        }

        if index.get(decl).kind == DeclKind::Record {
            if let Some(dtor) = index.destructor_of(decl) {
                let dtor = vertex(index, dtor);
                if !usage.used.contains(&dtor) {
                    queue.push_back(dtor);
                }
            }
        }
    }

    debug!(used = usage.used.len(), "reachability complete");
    usage
}
