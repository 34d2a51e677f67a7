//! Optimizer visitor: second walk that deletes unreachable declarations.
//!
//! Only real code is visited (no implicit nodes exist in a concrete
//! syntax tree). For each declaration kind the policy consults the usage
//! info and submits a removal to the shared SmartRewriter. Function
//! bodies are never entered: dead code inside bodies is out of scope.
//!
//! Removal protocol: the declaration's expansion range is extended
//! through a terminating semicolon when one follows, the edit is
//! submitted with empty-line collapsing enabled, and the declaration's
//! attached raw comment is deleted alongside.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;
use tree_sitter::Node;

use crate::decls::{split_qualified, DeclId, DeclIndex, DeclKind};
use crate::graph::UsageInfo;
use crate::parse::{find_semi_after, TranslationUnit};
use crate::preproc::PreprocAnalysis;
use crate::rewrite::{RemoveOptions, SmartRewriter};
use crate::root;

/// Counts of removed entities, for the trim report.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RemovalStats {
    pub functions: usize,
    pub records: usize,
    pub typedefs: usize,
    pub namespaces: usize,
    pub using_directives: usize,
    pub empty_declarations: usize,
    pub variables: usize,
    pub preproc_blocks: usize,
}

impl RemovalStats {
    pub fn total(&self) -> usize {
        self.functions
            + self.records
            + self.typedefs
            + self.namespaces
            + self.using_directives
            + self.empty_declarations
            + self.variables
            + self.preproc_blocks
    }
}

/// Walk the translation unit and delete everything reachability ruled
/// out.
pub fn remove_unused_decls(
    tu: &TranslationUnit,
    index: &DeclIndex,
    usage: &UsageInfo,
    preproc: &PreprocAnalysis,
    rewriter: &mut SmartRewriter,
) -> RemovalStats {
    let mut visitor = PruneVisitor {
        tu,
        index,
        usage,
        preproc,
        rewriter,
        declared: HashSet::new(),
        used_namespaces: HashSet::new(),
        stats: RemovalStats::default(),
    };
    visitor.visit_scope(tu.root());
    visitor.stats
}

struct PruneVisitor<'a, 'src> {
    tu: &'a TranslationUnit,
    index: &'a DeclIndex,
    usage: &'a UsageInfo,
    preproc: &'a PreprocAnalysis,
    rewriter: &'a mut SmartRewriter<'src>,
    /// Canonical forms already encountered, so later bodiless
    /// redeclarations of a kept entity can still be pruned.
    declared: HashSet<DeclId>,
    /// Namespaces already nominated by an earlier using-directive.
    used_namespaces: HashSet<String>,
    stats: RemovalStats,
}

impl<'a, 'src> PruneVisitor<'a, 'src> {
    fn children_of<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.children(&mut cursor).collect()
    }

    fn declarators_of<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.children_by_field_name("declarator", &mut cursor)
            .collect()
    }

    /// Visit the children of a declaration scope (translation unit,
    /// namespace body, class body).
    fn visit_scope(&mut self, node: Node) {
        for child in self.children_of(node) {
            if self.preproc.is_invisible(child.start_byte()) {
                continue;
            }
            match child.kind() {
                ";" => {
                    // A stray semicolon, unless it terminates a sibling
                    // tag definition.
                    let mut prev = child.prev_sibling();
                    while let Some(p) = prev {
                        if p.kind() != "comment" {
                            break;
                        }
                        prev = p.prev_sibling();
                    }
                    let terminates_tag = prev
                        .map(|p| {
                            matches!(
                                p.kind(),
                                "class_specifier"
                                    | "struct_specifier"
                                    | "union_specifier"
                                    | "enum_specifier"
                            )
                        })
                        .unwrap_or(false);
                    if !terminates_tag && self.remove_decl(child) {
                        self.stats.empty_declarations += 1;
                    }
                }
                "namespace_definition" => self.visit_namespace(child),
                "function_definition" => self.visit_function_node(child, child),
                "template_declaration" => self.visit_template(child),
                "declaration" => self.visit_declaration(child),
                "empty_declaration" => self.visit_empty_declaration(child),
                "class_specifier" | "struct_specifier" | "union_specifier" => {
                    if let Some(id) = self.index.decl_at(child.id()) {
                        self.prune_record(id, child, Some(child));
                    }
                }
                "field_declaration" => self.visit_field_declaration(child),
                "type_definition" | "alias_declaration" => self.visit_typedef(child),
                "using_declaration" => self.visit_using(child),
                "linkage_specification" => {
                    if let Some(body) = child.child_by_field_name("body") {
                        if body.kind() == "declaration_list" {
                            self.visit_scope(body);
                        } else {
                            self.visit_scope(child);
                        }
                    }
                }
                "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif"
                | "preproc_elifdef" | "ERROR" => self.visit_scope(child),
                _ => {}
            }
        }
    }

    fn visit_namespace(&mut self, node: Node) {
        let Some(id) = self.index.decl_at(node.id()) else {
            return;
        };
        // Namespace occurrences are their own vertices; one re-opening
        // may die while another survives.
        if !self.usage.is_used(self.index, id) {
            if self.remove_decl(node) {
                self.stats.namespaces += 1;
            }
            return;
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_scope(body);
        }
    }

    fn visit_function_node(&mut self, node: Node, outer: Node) {
        if let Some(id) = self.index.decl_at(node.id()) {
            self.prune_function(id, outer);
        }
    }

    fn visit_template(&mut self, node: Node) {
        let Some(id) = self.index.decl_at(node.id()) else {
            // Nested template of a template, or an unindexed friend.
            for child in self.children_of(node) {
                if child.kind() == "template_declaration" {
                    self.visit_template(child);
                }
            }
            return;
        };
        match self.index.get(id).kind {
            DeclKind::Function => self.prune_function(id, node),
            DeclKind::Record => {
                let spec = self.find_record_spec(node, id);
                self.prune_record(id, node, spec);
            }
            DeclKind::Typedef => self.prune_typedefs(vec![id], node, None),
            _ => {}
        }
    }

    fn find_record_spec<'t>(&self, node: Node<'t>, id: DeclId) -> Option<Node<'t>> {
        let target = self.index.get(id).node;
        find_node_by_id(node, target)
    }

    fn visit_declaration(&mut self, node: Node) {
        let declarators = self.declarators_of(node);

        if declarators.is_empty() {
            if let Some(t) = node.child_by_field_name("type") {
                if let Some(id) = self.index.decl_at(t.id()) {
                    if self.index.get(id).kind == DeclKind::Record {
                        self.prune_record(id, node, Some(t));
                    }
                }
            }
            return;
        }

        // A single function prototype; groups of variables belong to the
        // comma-group pruner, and mixed declarations are left alone.
        if declarators.len() == 1 {
            if let Some(id) = self.index.decl_at(declarators[0].id()) {
                if self.index.get(id).kind == DeclKind::Function {
                    self.prune_function(id, node);
                    return;
                }
            }
        }

        // Inline tag definition with declarators: the group pruner
        // decides; but a used tag still gets its members visited.
        if let Some(t) = node.child_by_field_name("type") {
            if let Some(id) = self.index.decl_at(t.id()) {
                if self.index.get(id).kind == DeclKind::Record
                    && self.usage.is_used(self.index, self.index.canonical(id))
                {
                    self.declared.insert(self.index.canonical(id));
                    if let Some(body) = t.child_by_field_name("body") {
                        self.visit_scope(body);
                    }
                }
            }
        }
    }

    fn visit_field_declaration(&mut self, node: Node) {
        let declarators = self.declarators_of(node);
        if declarators.is_empty() {
            if let Some(t) = node.child_by_field_name("type") {
                if let Some(id) = self.index.decl_at(t.id()) {
                    if self.index.get(id).kind == DeclKind::Record {
                        self.prune_record(id, node, Some(t));
                    }
                }
            }
            return;
        }
        // Method prototypes are prunable; fields and static data members
        // are not (statics go through the comma-group pruner).
        if declarators.len() == 1 {
            if let Some(id) = self.index.decl_at(declarators[0].id()) {
                if self.index.get(id).kind == DeclKind::Function {
                    self.prune_function(id, node);
                }
            }
        }
    }

    fn visit_empty_declaration(&mut self, node: Node) {
        let mut handled = false;
        for child in self.children_of(node) {
            if let Some(id) = self.index.decl_at(child.id()) {
                handled = true;
                if self.index.get(id).kind == DeclKind::Record {
                    self.prune_record(id, node, Some(child));
                }
                // Enums are never pruned; their text survives unless an
                // enclosing region dies.
            }
        }
        if !handled && self.remove_decl(node) {
            self.stats.empty_declarations += 1;
        }
    }

    fn visit_typedef(&mut self, node: Node) {
        // Tag defined inside the typedef that is used on its own: keep
        // the whole text.
        let guard_tag = node
            .child_by_field_name("type")
            .and_then(|t| self.index.decl_at(t.id()));

        let ids: Vec<DeclId> = if node.kind() == "alias_declaration" {
            self.index.decl_at(node.id()).into_iter().collect()
        } else {
            self.declarators_of(node)
                .iter()
                .filter_map(|d| self.index.decl_at(d.id()))
                .collect()
        };
        if ids.is_empty() {
            return;
        }
        self.prune_typedefs(ids, node, guard_tag);
    }

    fn visit_using(&mut self, node: Node) {
        let is_directive = self
            .children_of(node)
            .iter()
            .any(|c| c.kind() == "namespace");
        if !is_directive {
            return;
        }
        let Some(name_node) = self
            .children_of(node)
            .into_iter()
            .rev()
            .find(|c| c.is_named())
        else {
            return;
        };
        let nominated = split_qualified(self.tu.text(name_node)).join("::");
        // Only the earliest using-directive for a namespace survives.
        if !self.used_namespaces.insert(nominated) && self.remove_decl(node) {
            self.stats.using_directives += 1;
        }
    }

    // ------------------------------------------------------------------
    // Per-kind policies

    fn prune_function(&mut self, id: DeclId, outer: Node) {
        let info = self.index.get(id);
        let canonical = info.canonical;
        if info.is_defaulted_or_deleted {
            self.declared.insert(canonical);
            return;
        }
        let unused = !self.usage.is_used(self.index, canonical);
        let redeclaration = !info.has_body && self.declared.contains(&canonical);
        if (unused || redeclaration) && self.remove_decl(outer) {
            debug!(name = %self.index.get(id).qualified, unused, "removed function");
            self.stats.functions += 1;
        }
        self.declared.insert(canonical);
    }

    fn prune_record(&mut self, id: DeclId, outer: Node, spec: Option<Node>) {
        let info = self.index.get(id);
        let canonical = info.canonical;
        let unused = !self.usage.is_used(self.index, canonical);
        let forward_redeclaration = !info.has_body && self.declared.contains(&canonical);
        if unused || forward_redeclaration {
            if self.remove_decl(outer) {
                debug!(name = %self.index.get(id).qualified, unused, "removed record");
                self.stats.records += 1;
            }
            self.declared.insert(canonical);
            return;
        }
        self.declared.insert(canonical);
        if let Some(body) = spec.and_then(|s| s.child_by_field_name("body")) {
            self.visit_scope(body);
        }
    }

    fn prune_typedefs(&mut self, ids: Vec<DeclId>, outer: Node, guard_tag: Option<DeclId>) {
        if let Some(tag) = guard_tag {
            if self.usage.is_used(self.index, self.index.canonical(tag)) {
                return;
            }
        }
        let all_unused = ids
            .iter()
            .all(|&id| !self.usage.is_used(self.index, self.index.canonical(id)));
        if all_unused && self.remove_decl(outer) {
            self.stats.typedefs += 1;
        }
    }

    // ------------------------------------------------------------------
    // Removal protocol

    fn remove_decl(&mut self, node: Node) -> bool {
        let start = node.start_byte();
        let mut end = node.end_byte();
        if let Some(semi) = find_semi_after(&self.tu.source, end) {
            end = semi + 1;
        }
        let opts = RemoveOptions {
            remove_empty_lines: true,
        };
        let accepted = self.rewriter.remove_range(start, end, opts);
        if accepted {
            if let Some((cstart, cend)) = root::attached_comment(node, &self.tu.source) {
                self.rewriter.remove_range(cstart, cend, opts);
            }
        }
        accepted
    }
}

fn find_node_by_id(node: Node, target: usize) -> Option<Node> {
    if node.id() == target {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        if let Some(found) = find_node_by_id(child, target) {
            return Some(found);
        }
    }
    None
}
