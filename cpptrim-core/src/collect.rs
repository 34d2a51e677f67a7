//! Dependencies collector: builds the declaration index and the uses
//! graph in two walks over the syntax tree.
//!
//! The first walk registers every declaration at namespace and class
//! scope (function bodies are opaque: locals are not graph vertices,
//! their references attribute to the enclosing function). The second
//! walk resolves every name reference against the index and records a
//! `uses` edge from the innermost enclosing declaration.
//!
//! Structural edges that never appear as name references are inserted
//! eagerly at registration time:
//! - member -> enclosing class/namespace (a kept member keeps its context),
//! - class -> virtual method (virtual calls are invisible in source),
//! - class -> constructor and class -> operator method (construction and
//!   operator calls carry no resolvable name),
//! - parameter record -> free operator function.
//!
//! The collector never fails: unresolved names simply produce no edge,
//! which only biases the result toward deletion; `/// caide keep` is the
//! user-visible remedy.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;
use tree_sitter::Node;

use crate::decls::{
    as_function_declarator, declarator_name_node, split_qualified, DeclId, DeclIndex, DeclKind,
    NewDecl,
};
use crate::parse::TranslationUnit;
use crate::preproc::PreprocAnalysis;
use crate::root;

/// One comma-separated group of namespace-scope (or static member)
/// variables sharing a type specifier.
#[derive(Debug)]
pub struct StaticGroup {
    /// Start of the whole declaration (the shared type specifier).
    pub start: usize,
    /// End of the whole declaration (past the terminating semicolon).
    pub end: usize,
    /// Start of the first declarator; whole-group removal begins here
    /// instead of `start` when the type specifier defines a tag that
    /// must survive.
    pub first_declarator: usize,
    /// Tag defined inline in the type specifier, if any.
    pub inline_tag: Option<DeclId>,
    /// Variables in declaration order.
    pub vars: Vec<DeclId>,
}

/// Everything the collector hands to the reachability solver and the
/// optimizer visitor.
#[derive(Debug, Default)]
pub struct SourceInfo {
    /// Which declarations each declaration depends on. Vertices are
    /// canonical except namespaces.
    pub uses: HashMap<DeclId, HashSet<DeclId>>,
    /// Roots of the dependency graph: `main`, `caide keep` annotations,
    /// pinned globals.
    pub decls_to_keep: HashSet<DeclId>,
    /// Function templates whose bodies failed to parse; the late-parse
    /// forcer recovers their true extents.
    pub delayed_parsed_functions: Vec<DeclId>,
    /// Comma-separated variable groups keyed by their start offset.
    pub static_variables: BTreeMap<usize, StaticGroup>,
}

/// Run both collector walks.
pub fn collect(tu: &TranslationUnit, preproc: &PreprocAnalysis) -> (DeclIndex, SourceInfo) {
    let mut collector = DependenciesCollector {
        tu,
        preproc,
        index: DeclIndex::new(),
        info: SourceInfo::default(),
        scopes: Vec::new(),
        decl_stack: Vec::new(),
    };
    collector.index_scope(tu.root(), None);
    debug_assert!(collector.scopes.is_empty());
    collector.collect_edges(tu.root());
    debug!(
        decls = collector.index.len(),
        roots = collector.info.decls_to_keep.len(),
        "collected dependency graph"
    );
    (collector.index, collector.info)
}

struct DependenciesCollector<'a> {
    tu: &'a TranslationUnit,
    preproc: &'a PreprocAnalysis,
    index: DeclIndex,
    info: SourceInfo,
    /// Named scopes (namespaces and classes) currently entered,
    /// outermost first.
    scopes: Vec<String>,
    /// Innermost enclosing declarations; substitutes for the missing
    /// parent pointer on expression nodes.
    decl_stack: Vec<DeclId>,
}

impl<'a> DependenciesCollector<'a> {
    // ------------------------------------------------------------------
    // Shared helpers

    fn current(&self) -> Option<DeclId> {
        self.decl_stack.last().copied()
    }

    fn insert_ref(&mut self, from: DeclId, to: DeclId) {
        let from = self.vertex(from);
        let to = self.vertex(to);
        self.info.uses.entry(from).or_default().insert(to);
    }

    /// Graph vertex for a declaration: canonical, except namespaces,
    /// where each re-opening stays distinct.
    fn vertex(&self, id: DeclId) -> DeclId {
        if self.index.get(id).kind == DeclKind::Namespace {
            id
        } else {
            self.index.canonical(id)
        }
    }

    fn keep(&mut self, id: DeclId) {
        let v = self.vertex(id);
        self.info.decls_to_keep.insert(v);
    }

    /// Simple and fully qualified names for a declarator name text as
    /// seen from the current scope chain.
    fn names_for(&self, name_text: &str) -> (String, String) {
        let segments = split_qualified(name_text);
        let simple = segments.last().cloned().unwrap_or_default();
        let mut qualified_parts: Vec<String> = self.scopes.clone();
        qualified_parts.extend(segments);
        (simple, qualified_parts.join("::"))
    }

    fn children_of<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.children(&mut cursor).collect()
    }

    fn declarators_of<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.children_by_field_name("declarator", &mut cursor)
            .collect()
    }

    fn has_child_kind(&self, node: Node, kinds: &[&str]) -> bool {
        self.children_of(node)
            .iter()
            .any(|c| kinds.contains(&c.kind()))
    }

    // ------------------------------------------------------------------
    // First walk: declaration indexing

    fn index_scope(&mut self, node: Node, parent: Option<DeclId>) {
        if self.preproc.is_invisible(node.start_byte()) {
            return;
        }
        match node.kind() {
            "translation_unit" | "declaration_list" | "field_declaration_list" | "ERROR"
            | "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif"
            | "preproc_elifdef" => {
                for child in self.children_of(node) {
                    self.index_scope(child, parent);
                }
            }
            "linkage_specification" => {
                if let Some(body) = node.child_by_field_name("body") {
                    self.index_scope(body, parent);
                }
            }
            "namespace_definition" => self.index_namespace(node, parent),
            "template_declaration" => self.index_template(node, node, parent),
            "function_definition" => {
                self.index_function(node, node, parent, false);
            }
            "declaration" => self.index_declaration(node, node, parent),
            // A bare type specifier with `;`: `struct A { ... };`,
            // `struct A;`, `enum E { ... };`.
            "empty_declaration" => {
                for child in self.children_of(node) {
                    match child.kind() {
                        "class_specifier" | "struct_specifier" | "union_specifier" => {
                            self.index_record(child, node, parent, false);
                        }
                        "enum_specifier" => {
                            self.index_enum(child, node, parent);
                        }
                        _ => {}
                    }
                }
            }
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.index_record(node, node, parent, false);
            }
            "enum_specifier" => {
                self.index_enum(node, node, parent);
            }
            "type_definition" => self.index_typedef(node, node, parent, false),
            "alias_declaration" => {
                self.index_alias(node, node, parent, false);
            }
            "field_declaration" => self.index_field_declaration(node, parent),
            _ => {}
        }
    }

    fn index_namespace(&mut self, node: Node, parent: Option<DeclId>) {
        let name_node = node.child_by_field_name("name");
        let name = name_node.map(|n| self.tu.text(n).to_string()).unwrap_or_default();
        let segments = split_qualified(&name);
        let (_, qualified) = self.names_for(&name);

        let id = self.index.register(NewDecl {
            kind: DeclKind::Namespace,
            name: name.clone(),
            qualified,
            range: (node.start_byte(), node.end_byte()),
            name_loc: name_node.map(|n| n.start_byte()).unwrap_or(node.start_byte()),
            name_node: name_node.map(|n| n.id()).unwrap_or(node.id()),
            decl_end: node.end_byte(),
            node: node.id(),
            parent,
            has_body: true,
            is_virtual: false,
            is_template: false,
            is_defaulted_or_deleted: false,
            is_operator: false,
        });
        if let Some(p) = parent {
            self.insert_ref(id, p);
        }
        if root::has_keep_comment(node, &self.tu.source) {
            self.keep(id);
        }

        self.scopes.extend(segments.iter().cloned());
        if let Some(body) = node.child_by_field_name("body") {
            self.index_scope(body, Some(id));
        }
        self.scopes.truncate(self.scopes.len() - segments.len());
    }

    fn index_template(&mut self, node: Node, outer: Node, parent: Option<DeclId>) {
        for child in self.children_of(node) {
            match child.kind() {
                "function_definition" => {
                    self.index_function(child, outer, parent, true);
                }
                "declaration" => self.index_templated_prototype(child, outer, parent),
                "class_specifier" | "struct_specifier" | "union_specifier" => {
                    self.index_record(child, outer, parent, true);
                }
                "empty_declaration" => {
                    for inner in self.children_of(child) {
                        if matches!(
                            inner.kind(),
                            "class_specifier" | "struct_specifier" | "union_specifier"
                        ) {
                            self.index_record(inner, outer, parent, true);
                        }
                    }
                }
                "alias_declaration" => {
                    self.index_alias(child, outer, parent, true);
                }
                "template_declaration" => self.index_template(child, outer, parent),
                _ => {}
            }
        }
    }

    /// A `template<...>` wrapper around a bodiless declaration: a
    /// function template prototype (or explicit instantiation).
    fn index_templated_prototype(&mut self, node: Node, outer: Node, parent: Option<DeclId>) {
        for d in self.declarators_of(node) {
            if as_function_declarator(d).is_some() {
                self.index_prototype(d, outer, parent, true);
            }
        }
    }

    fn index_function(
        &mut self,
        node: Node,
        outer: Node,
        parent: Option<DeclId>,
        is_template: bool,
    ) -> Option<DeclId> {
        let declarator = node.child_by_field_name("declarator")?;
        let name_node = declarator_name_node(declarator)?;
        let name_text = self.tu.text(name_node).to_string();
        let (simple, qualified) = self.names_for(&name_text);
        if simple.is_empty() {
            return None;
        }

        let is_defaulted_or_deleted =
            self.has_child_kind(node, &["default_method_clause", "delete_method_clause"]);
        let has_body = node.child_by_field_name("body").is_some() || is_defaulted_or_deleted;
        let is_virtual = self.node_is_virtual(node, declarator);
        let is_operator = matches!(name_node.kind(), "operator_name" | "operator_cast")
            || simple.starts_with("operator");

        let id = self.index.register(NewDecl {
            kind: DeclKind::Function,
            name: simple.clone(),
            qualified,
            range: (outer.start_byte(), outer.end_byte()),
            name_loc: name_node.start_byte(),
            name_node: name_node.id(),
            decl_end: outer.end_byte(),
            node: node.id(),
            parent,
            has_body,
            is_virtual,
            is_template,
            is_defaulted_or_deleted,
            is_operator,
        });
        if outer.id() != node.id() {
            self.index.alias_node(outer.id(), id);
        }
        self.register_member_edges(id, parent, &simple, is_virtual, is_operator);

        if root::is_main(&self.index.get(id).qualified) {
            self.keep(id);
        }
        if root::has_keep_comment(outer, &self.tu.source) {
            self.keep(id);
        }
        if is_template && (node.child_by_field_name("body").is_none() || node.has_error()) {
            self.info.delayed_parsed_functions.push(id);
        }
        Some(id)
    }

    /// A bodiless function declarator inside a `declaration` node.
    fn index_prototype(
        &mut self,
        declarator: Node,
        outer: Node,
        parent: Option<DeclId>,
        is_template: bool,
    ) -> Option<DeclId> {
        let name_node = declarator_name_node(declarator)?;
        let name_text = self.tu.text(name_node).to_string();
        let (simple, qualified) = self.names_for(&name_text);
        if simple.is_empty() {
            return None;
        }
        let is_virtual = self.node_is_virtual(outer, declarator);
        let is_operator = matches!(name_node.kind(), "operator_name" | "operator_cast")
            || simple.starts_with("operator");
        let is_defaulted_or_deleted =
            self.has_child_kind(outer, &["default_method_clause", "delete_method_clause"]);

        let id = self.index.register(NewDecl {
            kind: DeclKind::Function,
            name: simple.clone(),
            qualified,
            range: (outer.start_byte(), outer.end_byte()),
            name_loc: name_node.start_byte(),
            name_node: name_node.id(),
            decl_end: declarator.end_byte(),
            node: declarator.id(),
            parent,
            has_body: is_defaulted_or_deleted,
            is_virtual,
            is_template,
            is_defaulted_or_deleted,
            is_operator,
        });
        if outer.id() != declarator.id() {
            self.index.alias_node(outer.id(), id);
        }
        self.register_member_edges(id, parent, &simple, is_virtual, is_operator);
        if root::has_keep_comment(outer, &self.tu.source) {
            self.keep(id);
        }
        Some(id)
    }

    /// Context and structural edges shared by every callable
    /// registration.
    fn register_member_edges(
        &mut self,
        id: DeclId,
        parent: Option<DeclId>,
        simple: &str,
        is_virtual: bool,
        is_operator: bool,
    ) {
        let Some(p) = parent else { return };
        self.insert_ref(id, p);
        if self.index.get(p).kind != DeclKind::Record {
            return;
        }
        // Virtual dispatch, construction and operator calls do not
        // appear as name references: a live class keeps these members.
        if is_virtual || is_operator || simple == self.index.get(p).name {
            self.insert_ref(p, id);
        }
    }

    fn node_is_virtual(&self, node: Node, declarator: Node) -> bool {
        self.has_child_kind(node, &["virtual", "virtual_function_specifier"])
            || self.has_child_kind(declarator, &["virtual_specifier"])
    }

    fn index_declaration(&mut self, node: Node, outer: Node, parent: Option<DeclId>) {
        let type_node = node.child_by_field_name("type");
        let declarators = self.declarators_of(node);

        // An inline tag definition in the type specifier
        // (`struct A { ... } a;`, `enum E { X } e;`).
        let mut inline_tag = None;
        if let Some(t) = type_node {
            let has_tag_body = t.child_by_field_name("body").is_some();
            match t.kind() {
                "class_specifier" | "struct_specifier" | "union_specifier" => {
                    if has_tag_body {
                        inline_tag = self.index_record(t, t, parent, false);
                    } else if declarators.is_empty() {
                        // `struct A;` forward declaration.
                        self.index_record(t, outer, parent, false);
                        return;
                    }
                }
                "enum_specifier" => {
                    if has_tag_body {
                        inline_tag = self.index_enum(t, t, parent);
                    }
                }
                _ => {}
            }
        }

        if declarators.is_empty() {
            return;
        }

        let at_namespace_scope = match parent {
            None => true,
            Some(p) => self.index.get(p).kind == DeclKind::Namespace,
        };
        let keep_all = root::has_keep_comment(outer, &self.tu.source);

        let mut group_vars = Vec::new();
        for d in &declarators {
            if as_function_declarator(*d).is_some() {
                self.index_prototype(*d, outer, parent, false);
                continue;
            }
            let Some(name_node) = declarator_name_node(*d) else {
                continue;
            };
            let name_text = self.tu.text(name_node).to_string();
            let (simple, qualified) = self.names_for(&name_text);
            if simple.is_empty() {
                continue;
            }
            let id = self.index.register(NewDecl {
                kind: DeclKind::Var,
                name: simple,
                qualified,
                range: (outer.start_byte(), outer.end_byte()),
                name_loc: name_node.start_byte(),
                name_node: name_node.id(),
                decl_end: d.end_byte(),
                node: d.id(),
                parent,
                has_body: false,
                is_virtual: false,
                is_template: false,
                is_defaulted_or_deleted: false,
                is_operator: false,
            });
            if let Some(p) = parent {
                self.insert_ref(id, p);
            }
            if let Some(tag) = inline_tag {
                self.insert_ref(id, tag);
            }
            if keep_all {
                self.keep(id);
            }
            if at_namespace_scope {
                group_vars.push(id);
            }
        }

        if let Some(tag) = inline_tag {
            // `struct A { A(); } a;`: constructing `a` is observable.
            if self.index.has_user_ctor_or_dtor(tag) {
                for &v in &group_vars {
                    self.keep(v);
                }
            }
        }

        if !group_vars.is_empty() {
            self.info.static_variables.insert(
                node.start_byte(),
                StaticGroup {
                    start: node.start_byte(),
                    end: node.end_byte(),
                    first_declarator: declarators[0].start_byte(),
                    inline_tag,
                    vars: group_vars,
                },
            );
        }
    }

    fn index_field_declaration(&mut self, node: Node, parent: Option<DeclId>) {
        let type_node = node.child_by_field_name("type");
        let declarators = self.declarators_of(node);

        let mut inline_tag = None;
        if let Some(t) = type_node {
            let has_tag_body = t.child_by_field_name("body").is_some();
            match t.kind() {
                "class_specifier" | "struct_specifier" | "union_specifier" => {
                    if has_tag_body {
                        inline_tag = self.index_record(t, t, parent, false);
                    } else if declarators.is_empty() {
                        self.index_record(t, node, parent, false);
                        return;
                    }
                }
                "enum_specifier" => {
                    if has_tag_body {
                        inline_tag = self.index_enum(t, t, parent);
                        if declarators.is_empty() {
                            return;
                        }
                    }
                }
                _ => {}
            }
        }

        let is_static = self.children_of(node).iter().any(|c| {
            c.kind() == "storage_class_specifier" && self.tu.text(*c) == "static"
        });
        let keep_all = root::has_keep_comment(node, &self.tu.source);

        let mut group_vars = Vec::new();
        for d in &declarators {
            if as_function_declarator(*d).is_some() {
                self.index_prototype(*d, node, parent, false);
                continue;
            }
            let Some(name_node) = declarator_name_node(*d) else {
                continue;
            };
            let name_text = self.tu.text(name_node).to_string();
            let (simple, qualified) = self.names_for(&name_text);
            if simple.is_empty() {
                continue;
            }
            let kind = if is_static { DeclKind::Var } else { DeclKind::Field };
            let id = self.index.register(NewDecl {
                kind,
                name: simple,
                qualified,
                range: (node.start_byte(), node.end_byte()),
                name_loc: name_node.start_byte(),
                name_node: name_node.id(),
                decl_end: d.end_byte(),
                node: d.id(),
                parent,
                has_body: false,
                is_virtual: false,
                is_template: false,
                is_defaulted_or_deleted: false,
                is_operator: false,
            });
            if let Some(p) = parent {
                self.insert_ref(id, p);
            }
            if let Some(tag) = inline_tag {
                self.insert_ref(id, tag);
            }
            if keep_all {
                self.keep(id);
            }
            if is_static {
                group_vars.push(id);
            }
        }

        if !group_vars.is_empty() {
            self.info.static_variables.insert(
                node.start_byte(),
                StaticGroup {
                    start: node.start_byte(),
                    end: node.end_byte(),
                    first_declarator: declarators[0].start_byte(),
                    inline_tag,
                    vars: group_vars,
                },
            );
        }
    }

    fn index_record(
        &mut self,
        node: Node,
        outer: Node,
        parent: Option<DeclId>,
        is_template: bool,
    ) -> Option<DeclId> {
        let name_node = node.child_by_field_name("name");
        let (simple, qualified) = match name_node {
            Some(n) => {
                let (s, q) = self.names_for(self.tu.text(n));
                (s, q)
            }
            None => {
                // Anonymous tag: unique identity keyed by position.
                let tag = format!("(anonymous@{})", node.start_byte());
                self.names_for(&tag)
            }
        };
        if simple.is_empty() {
            return None;
        }
        let body = node.child_by_field_name("body");

        let id = self.index.register(NewDecl {
            kind: DeclKind::Record,
            name: simple.clone(),
            qualified,
            range: (outer.start_byte(), outer.end_byte()),
            name_loc: name_node.map(|n| n.start_byte()).unwrap_or(node.start_byte()),
            name_node: name_node.map(|n| n.id()).unwrap_or(node.id()),
            decl_end: outer.end_byte(),
            node: node.id(),
            parent,
            has_body: body.is_some(),
            is_virtual: false,
            is_template,
            is_defaulted_or_deleted: false,
            is_operator: false,
        });
        if outer.id() != node.id() {
            self.index.alias_node(outer.id(), id);
        }
        if let Some(p) = parent {
            self.insert_ref(id, p);
        }
        if root::has_keep_comment(outer, &self.tu.source) {
            self.keep(id);
        }

        if let Some(body) = body {
            self.scopes.push(simple);
            self.index_scope(body, Some(id));
            self.scopes.pop();
        }
        Some(id)
    }

    fn index_enum(&mut self, node: Node, outer: Node, parent: Option<DeclId>) -> Option<DeclId> {
        let name_node = node.child_by_field_name("name");
        let (simple, qualified) = match name_node {
            Some(n) => self.names_for(self.tu.text(n)),
            None => {
                let tag = format!("(anonymous@{})", node.start_byte());
                self.names_for(&tag)
            }
        };
        let body = node.child_by_field_name("body");

        let id = self.index.register(NewDecl {
            kind: DeclKind::Enum,
            name: simple.clone(),
            qualified,
            range: (outer.start_byte(), outer.end_byte()),
            name_loc: name_node.map(|n| n.start_byte()).unwrap_or(node.start_byte()),
            name_node: name_node.map(|n| n.id()).unwrap_or(node.id()),
            decl_end: outer.end_byte(),
            node: node.id(),
            parent,
            has_body: body.is_some(),
            is_virtual: false,
            is_template: false,
            is_defaulted_or_deleted: false,
            is_operator: false,
        });
        if let Some(p) = parent {
            self.insert_ref(id, p);
        }
        if root::has_keep_comment(outer, &self.tu.source) {
            self.keep(id);
        }

        // Enumerators are vertices: referencing one keeps the enum alive
        // through the context edge. Scoped enumerators resolve through
        // the enum's name as well.
        let scoped = self.has_child_kind(node, &["class", "struct"]);
        if let Some(body) = body {
            if scoped {
                self.scopes.push(simple);
            }
            for child in self.children_of(body) {
                if child.kind() != "enumerator" {
                    continue;
                }
                let Some(name) = child.child_by_field_name("name") else {
                    continue;
                };
                let (esimple, equalified) = self.names_for(self.tu.text(name));
                let eid = self.index.register(NewDecl {
                    kind: DeclKind::Enumerator,
                    name: esimple,
                    qualified: equalified,
                    range: (child.start_byte(), child.end_byte()),
                    name_loc: name.start_byte(),
                    name_node: name.id(),
                    decl_end: child.end_byte(),
                    node: child.id(),
                    parent: Some(id),
                    has_body: false,
                    is_virtual: false,
                    is_template: false,
                    is_defaulted_or_deleted: false,
                    is_operator: false,
                });
                self.insert_ref(eid, id);
            }
            if scoped {
                self.scopes.pop();
            }
        }
        Some(id)
    }

    fn index_typedef(&mut self, node: Node, outer: Node, parent: Option<DeclId>, is_template: bool) {
        // `typedef struct { ... } X;` defines the tag inline.
        if let Some(t) = node.child_by_field_name("type") {
            if t.child_by_field_name("body").is_some() {
                match t.kind() {
                    "class_specifier" | "struct_specifier" | "union_specifier" => {
                        self.index_record(t, t, parent, false);
                    }
                    "enum_specifier" => {
                        self.index_enum(t, t, parent);
                    }
                    _ => {}
                }
            }
        }

        let keep_all = root::has_keep_comment(outer, &self.tu.source);
        let mut first = true;
        for d in self.declarators_of(node) {
            let Some(name_node) = declarator_name_node(d) else {
                continue;
            };
            let (simple, qualified) = self.names_for(self.tu.text(name_node));
            if simple.is_empty() {
                continue;
            }
            let id = self.index.register(NewDecl {
                kind: DeclKind::Typedef,
                name: simple,
                qualified,
                range: (outer.start_byte(), outer.end_byte()),
                name_loc: name_node.start_byte(),
                name_node: name_node.id(),
                decl_end: d.end_byte(),
                node: d.id(),
                parent,
                has_body: false,
                is_virtual: false,
                is_template,
                is_defaulted_or_deleted: false,
                is_operator: false,
            });
            if first {
                self.index.alias_node(node.id(), id);
                if outer.id() != node.id() {
                    self.index.alias_node(outer.id(), id);
                }
                first = false;
            }
            if let Some(p) = parent {
                self.insert_ref(id, p);
            }
            if keep_all {
                self.keep(id);
            }
        }
    }

    fn index_alias(
        &mut self,
        node: Node,
        outer: Node,
        parent: Option<DeclId>,
        is_template: bool,
    ) -> Option<DeclId> {
        let name_node = node.child_by_field_name("name")?;
        let (simple, qualified) = self.names_for(self.tu.text(name_node));
        let id = self.index.register(NewDecl {
            kind: DeclKind::Typedef,
            name: simple,
            qualified,
            range: (outer.start_byte(), outer.end_byte()),
            name_loc: name_node.start_byte(),
            name_node: name_node.id(),
            decl_end: node.end_byte(),
            node: node.id(),
            parent,
            has_body: false,
            is_virtual: false,
            is_template,
            is_defaulted_or_deleted: false,
            is_operator: false,
        });
        if outer.id() != node.id() {
            self.index.alias_node(outer.id(), id);
        }
        if let Some(p) = parent {
            self.insert_ref(id, p);
        }
        if root::has_keep_comment(outer, &self.tu.source) {
            self.keep(id);
        }
        Some(id)
    }

    // ------------------------------------------------------------------
    // Second walk: reference edges

    fn collect_edges(&mut self, node: Node) {
        if self.preproc.is_invisible(node.start_byte()) {
            return;
        }

        let entered = self.index.decl_at(node.id()).filter(|id| {
            // A wrapper alias and its primary node both map here; enter once.
            self.decl_stack.last() != Some(id)
        });
        let mut pushed_scopes = 0;
        if let Some(id) = entered {
            self.decl_stack.push(id);
            let info = self.index.get(id);
            if matches!(info.kind, DeclKind::Namespace | DeclKind::Record)
                && info.node == node.id()
                && !info.name.is_empty()
                && !info.name.starts_with('(')
            {
                let segments = split_qualified(&info.name);
                pushed_scopes = segments.len();
                self.scopes.extend(segments);
            }
            if info.kind == DeclKind::Function && info.is_operator {
                let parent_is_record = info
                    .parent
                    .map(|p| self.index.get(p).kind == DeclKind::Record)
                    .unwrap_or(false);
                if !parent_is_record {
                    self.link_free_operator(id, node);
                }
            }
        }

        match node.kind() {
            "comment" | "preproc_include" | "preproc_def" | "preproc_function_def"
            | "preproc_call" => {}
            "declaration" | "field_declaration" | "type_definition" => {
                self.edges_for_declaration(node);
            }
            "identifier" | "type_identifier" | "field_identifier" | "namespace_identifier"
            | "destructor_name" => {
                self.leaf_ref(node);
            }
            "qualified_identifier" => {
                self.qualified_ref(node);
                for child in self.children_of(node) {
                    self.collect_edges(child);
                }
            }
            _ => {
                for child in self.children_of(node) {
                    self.collect_edges(child);
                }
            }
        }

        if entered.is_some() {
            self.decl_stack.pop();
            for _ in 0..pushed_scopes {
                self.scopes.pop();
            }
        }
    }

    /// Shared-type attribution: in `T a, b;` both `a` and `b` depend on
    /// the type refs of `T`, which is a sibling of their declarators.
    fn edges_for_declaration(&mut self, node: Node) {
        let type_node = node.child_by_field_name("type");
        let declarators = self.declarators_of(node);
        let declared: Vec<DeclId> = declarators
            .iter()
            .filter_map(|d| self.index.decl_at(d.id()))
            .collect();

        if let Some(t) = type_node {
            if self.index.decl_at(t.id()).is_some() {
                // Inline tag definition: walk it as a declaration of its own.
                self.collect_edges(t);
            } else {
                let targets = self.type_refs(t);
                if declared.is_empty() {
                    if let Some(cur) = self.current() {
                        for target in &targets {
                            self.insert_ref(cur, *target);
                        }
                    }
                } else {
                    for &d in &declared {
                        for target in &targets {
                            self.insert_ref(d, *target);
                        }
                    }
                    self.pin_class_type_globals(&declared, &targets);
                }
            }
        }

        for child in self.children_of(node) {
            if type_node.map(|t| t.id()) == Some(child.id()) {
                continue;
            }
            self.collect_edges(child);
        }
    }

    /// An unreferenced global of a class type with a user-declared
    /// constructor or destructor is pinned: constructing and destroying
    /// it is observable behavior.
    fn pin_class_type_globals(&mut self, declared: &[DeclId], targets: &[DeclId]) {
        let pins = targets.iter().any(|&t| {
            self.index.get(t).kind == DeclKind::Record && self.index.has_user_ctor_or_dtor(t)
        });
        if !pins {
            return;
        }
        for &d in declared {
            let info = self.index.get(d);
            if info.kind != DeclKind::Var {
                continue;
            }
            let at_namespace_scope = match info.parent {
                None => true,
                Some(p) => self.index.get(p).kind == DeclKind::Namespace,
            };
            if at_namespace_scope {
                debug!(name = %info.name, "pinning global of class type with user ctor/dtor");
                self.keep(d);
            }
        }
    }

    /// All declarations referenced by a type node.
    fn type_refs(&mut self, node: Node) -> Vec<DeclId> {
        let mut out = HashSet::new();
        self.gather_type_refs(node, &mut out);
        out.into_iter().collect()
    }

    fn gather_type_refs(&mut self, node: Node, out: &mut HashSet<DeclId>) {
        match node.kind() {
            "identifier" | "type_identifier" | "namespace_identifier" => {
                let text = self.tu.text(node).to_string();
                for id in self.resolve_targets(&text) {
                    out.insert(id);
                }
            }
            "qualified_identifier" => {
                let normalized = split_qualified(self.tu.text(node)).join("::");
                for id in self.resolve_targets(&normalized) {
                    out.insert(id);
                }
                for child in self.children_of(node) {
                    self.gather_type_refs(child, out);
                }
            }
            _ => {
                for child in self.children_of(node) {
                    self.gather_type_refs(child, out);
                }
            }
        }
    }

    /// Resolved reference targets as graph vertices. Namespaces are
    /// excluded: a qualifier like `n::` must not keep every re-opening
    /// of `n` alive; namespaces survive through their members' context
    /// edges only.
    fn resolve_targets(&self, name: &str) -> Vec<DeclId> {
        self.index
            .resolve(name, &self.scopes)
            .into_iter()
            .filter(|&id| self.index.get(id).kind != DeclKind::Namespace)
            .map(|id| self.vertex(id))
            .collect()
    }

    fn leaf_ref(&mut self, node: Node) {
        let Some(cur) = self.current() else { return };
        if self.index.get(cur).name_node == node.id() {
            return;
        }
        let text = self.tu.text(node).to_string();
        for target in self.resolve_targets(&text) {
            self.insert_ref(cur, target);
        }
    }

    fn qualified_ref(&mut self, node: Node) {
        let Some(cur) = self.current() else { return };
        if self.index.get(cur).name_node == node.id() {
            return;
        }
        let normalized = split_qualified(self.tu.text(node)).join("::");
        for target in self.resolve_targets(&normalized) {
            self.insert_ref(cur, target);
        }
    }

    /// `a + b` never names `operator+`: a free operator is kept alive by
    /// the records it operates on.
    fn link_free_operator(&mut self, func: DeclId, node: Node) {
        let Some(params) = find_parameter_list(node) else {
            return;
        };
        let mut records = HashSet::new();
        self.gather_type_refs(params, &mut records);
        for record in records {
            if self.index.get(record).kind == DeclKind::Record {
                self.insert_ref(record, func);
            }
        }
    }
}

fn find_parameter_list(node: Node) -> Option<Node> {
    if node.kind() == "function_declarator" {
        return node.child_by_field_name("parameters");
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        if child.kind() == "compound_statement" {
            continue;
        }
        if let Some(found) = find_parameter_list(child) {
            return Some(found);
        }
    }
    None
}
