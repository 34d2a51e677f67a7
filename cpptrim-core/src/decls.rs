//! Declaration identity: the index that canonicalizes syntax-tree nodes
//! into graph vertices.
//!
//! The tree presents many nodes for one logical entity (forward
//! declarations, prototypes, out-of-line member definitions). Every
//! declaration is canonicalized to the first-seen node with the same
//! qualified name and canonicalization group, **except namespaces**:
//! each textual re-opening of a namespace is a distinct vertex, so that
//! one re-opening can be deleted while another survives.

use std::collections::HashMap;

use tree_sitter::Node;

/// Opaque handle of an indexed declaration; a vertex of the uses graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DeclId(pub u32);

/// Kind of an indexed declaration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeclKind {
    /// Free function, method, or function template (prototype or definition).
    Function,
    /// Class, struct, or union (including class templates).
    Record,
    Enum,
    Enumerator,
    /// One textual namespace (re-)opening. Never canonicalized.
    Namespace,
    /// `typedef`, `using X = T`, or an alias template.
    Typedef,
    /// Namespace-scope variable or static class member.
    Var,
    /// Non-static class member. Never individually pruned.
    Field,
}

/// Canonicalization groups: a typedef named `A` and a struct named `A`
/// are different entities even though they share a qualified name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum CanonGroup {
    Callable,
    Tag,
    Value,
    Alias,
}

impl DeclKind {
    fn canon_group(self) -> Option<CanonGroup> {
        match self {
            DeclKind::Function => Some(CanonGroup::Callable),
            DeclKind::Record | DeclKind::Enum => Some(CanonGroup::Tag),
            DeclKind::Var | DeclKind::Field | DeclKind::Enumerator => Some(CanonGroup::Value),
            DeclKind::Typedef => Some(CanonGroup::Alias),
            DeclKind::Namespace => None,
        }
    }
}

/// A new declaration prior to registration.
#[derive(Debug)]
pub struct NewDecl {
    pub kind: DeclKind,
    /// Simple name (`f`, `~A`, `operator+`).
    pub name: String,
    /// Fully qualified name (`ns::A::f`).
    pub qualified: String,
    /// Expansion range in bytes; for template declarations this is the
    /// wrapper's range so deletion removes the `template<...>` head too.
    pub range: (usize, usize),
    /// Start byte of the name token (comma-group pruning).
    pub name_loc: usize,
    /// Syntax node id of the name token (self-reference filtering).
    pub name_node: usize,
    /// End byte of this declarator, including any initializer.
    pub decl_end: usize,
    /// Primary syntax node id.
    pub node: usize,
    /// Enclosing indexed declaration (class or namespace).
    pub parent: Option<DeclId>,
    pub has_body: bool,
    pub is_virtual: bool,
    pub is_template: bool,
    pub is_defaulted_or_deleted: bool,
    pub is_operator: bool,
}

/// A registered declaration.
#[derive(Debug)]
pub struct DeclInfo {
    pub id: DeclId,
    pub kind: DeclKind,
    pub name: String,
    pub qualified: String,
    pub range: (usize, usize),
    pub name_loc: usize,
    pub name_node: usize,
    pub decl_end: usize,
    pub node: usize,
    pub parent: Option<DeclId>,
    /// Representative vertex for all redeclarations of this entity.
    pub canonical: DeclId,
    pub has_body: bool,
    pub is_virtual: bool,
    pub is_template: bool,
    pub is_defaulted_or_deleted: bool,
    pub is_operator: bool,
}

/// Index of every declaration in the translation unit.
#[derive(Default)]
pub struct DeclIndex {
    decls: Vec<DeclInfo>,
    canonical_keys: HashMap<(String, CanonGroup), DeclId>,
    by_name: HashMap<String, Vec<DeclId>>,
    by_qualified: HashMap<String, Vec<DeclId>>,
    by_node: HashMap<usize, DeclId>,
    children: HashMap<DeclId, Vec<DeclId>>,
}

impl DeclIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration, computing its canonical representative.
    pub fn register(&mut self, decl: NewDecl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        let canonical = match decl.kind.canon_group() {
            Some(group) => *self
                .canonical_keys
                .entry((decl.qualified.clone(), group))
                .or_insert(id),
            None => id,
        };

        self.by_name.entry(decl.name.clone()).or_default().push(id);
        self.by_qualified
            .entry(decl.qualified.clone())
            .or_default()
            .push(id);
        self.by_node.insert(decl.node, id);
        if let Some(parent) = decl.parent {
            // Keyed by the parent's canonical so members found through a
            // forward declaration and through the definition agree.
            let parent_key = self.decls[parent.0 as usize].canonical;
            self.children.entry(parent_key).or_default().push(id);
        }

        self.decls.push(DeclInfo {
            id,
            kind: decl.kind,
            name: decl.name,
            qualified: decl.qualified,
            range: decl.range,
            name_loc: decl.name_loc,
            name_node: decl.name_node,
            decl_end: decl.decl_end,
            node: decl.node,
            parent: decl.parent,
            canonical,
            has_body: decl.has_body,
            is_virtual: decl.is_virtual,
            is_template: decl.is_template,
            is_defaulted_or_deleted: decl.is_defaulted_or_deleted,
            is_operator: decl.is_operator,
        });
        id
    }

    /// Map an additional syntax node (e.g. a template wrapper) to a
    /// registered declaration.
    pub fn alias_node(&mut self, node: usize, id: DeclId) {
        self.by_node.insert(node, id);
    }

    pub fn get(&self, id: DeclId) -> &DeclInfo {
        &self.decls[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: DeclId) -> &mut DeclInfo {
        &mut self.decls[id.0 as usize]
    }

    /// Canonical representative of a declaration.
    pub fn canonical(&self, id: DeclId) -> DeclId {
        self.get(id).canonical
    }

    /// Declaration registered for a syntax node, if any.
    pub fn decl_at(&self, node: usize) -> Option<DeclId> {
        self.by_node.get(&node).copied()
    }

    pub fn children_of(&self, id: DeclId) -> &[DeclId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeclInfo> {
        self.decls.iter()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Resolve a (possibly qualified) name seen from inside the given
    /// scope chain (outermost first).
    ///
    /// Qualified lookups are tried against every enclosing scope prefix,
    /// innermost first, then at global scope. Unqualified names fall back
    /// to all same-named declarations when no scoped match exists; the
    /// fallback only errs toward keeping code.
    pub fn resolve(&self, name: &str, scopes: &[String]) -> Vec<DeclId> {
        let name = name.trim().trim_start_matches("::");
        if name.is_empty() {
            return Vec::new();
        }

        for i in (0..=scopes.len()).rev() {
            let candidate = if i == 0 {
                name.to_string()
            } else {
                format!("{}::{}", scopes[..i].join("::"), name)
            };
            if let Some(ids) = self.by_qualified.get(&candidate) {
                return ids.clone();
            }
        }

        if !name.contains("::") {
            if let Some(ids) = self.by_name.get(name) {
                return ids.clone();
            }
        } else if let Some(simple) = name.rsplit("::").next() {
            // Qualified name whose prefix we could not match (e.g. through
            // a typedef'd scope): fall back to the last segment.
            if let Some(ids) = self.by_name.get(simple) {
                return ids.clone();
            }
        }
        Vec::new()
    }

    /// Destructor of a record, if one was declared.
    pub fn destructor_of(&self, record: DeclId) -> Option<DeclId> {
        let record = self.canonical(record);
        self.children_of(record)
            .iter()
            .copied()
            .find(|&m| self.get(m).kind == DeclKind::Function && self.get(m).name.starts_with('~'))
    }

    /// Whether a record declares its own constructor or destructor.
    pub fn has_user_ctor_or_dtor(&self, record: DeclId) -> bool {
        let info = self.get(self.canonical(record));
        if info.kind != DeclKind::Record {
            return false;
        }
        self.children_of(info.id).iter().any(|&m| {
            let member = self.get(m);
            member.kind == DeclKind::Function
                && (member.name == info.name || member.name.starts_with('~'))
        })
    }
}

/// Peel declarator wrappers down to the name-bearing node.
pub fn declarator_name_node(mut node: Node) -> Option<Node> {
    loop {
        match node.kind() {
            "identifier" | "field_identifier" | "type_identifier" | "destructor_name"
            | "operator_name" | "operator_cast" | "qualified_identifier" => return Some(node),
            "init_declarator"
            | "pointer_declarator"
            | "array_declarator"
            | "function_declarator"
            | "parenthesized_declarator"
            | "reference_declarator" => {
                if let Some(inner) = node.child_by_field_name("declarator") {
                    node = inner;
                } else {
                    let mut cursor = node.walk();
                    let inner = node.children(&mut cursor).find(|c| c.is_named());
                    match inner {
                        Some(c) => node = c,
                        None => return None,
                    }
                }
            }
            _ => return None,
        }
    }
}

/// The `function_declarator` making a declarator a function prototype,
/// if any. Function-*pointer* declarators (`int (*fp)(int)`) do not
/// qualify: their inner declarator is parenthesized.
pub fn as_function_declarator(node: Node) -> Option<Node> {
    match node.kind() {
        "function_declarator" => match node.child_by_field_name("declarator") {
            Some(d) if d.kind() == "parenthesized_declarator" => None,
            _ => Some(node),
        },
        "pointer_declarator" | "reference_declarator" => {
            let inner = match node.child_by_field_name("declarator") {
                Some(d) => Some(d),
                None => {
                    let mut cursor = node.walk();
                    let found = node.children(&mut cursor).find(|c| c.is_named());
                    found
                }
            }?;
            as_function_declarator(inner)
        }
        _ => None,
    }
}

/// Last segment of a (possibly qualified) name, with template arguments
/// stripped.
pub fn simple_name(name: &str) -> String {
    let name = name.trim().trim_start_matches("::");
    let last = split_qualified(name).pop().unwrap_or_default();
    last
}

/// Split a qualified name on `::` separators that are not nested inside
/// template argument lists.
pub fn split_qualified(name: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ':' if depth == 0 && chars.peek() == Some(&':') => {
                chars.next();
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
        .into_iter()
        .map(|s| strip_template_args(s.trim()))
        .filter(|s| !s.is_empty())
        .collect()
}

fn strip_template_args(segment: &str) -> String {
    let segment = segment.trim();
    // `operator<` and friends carry their token in the name.
    if segment.starts_with("operator") {
        return segment.to_string();
    }
    match segment.find('<') {
        Some(pos) => segment[..pos].trim().to_string(),
        None => segment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(kind: DeclKind, name: &str, qualified: &str, node: usize) -> NewDecl {
        NewDecl {
            kind,
            name: name.to_string(),
            qualified: qualified.to_string(),
            range: (0, 0),
            name_loc: 0,
            name_node: 0,
            decl_end: 0,
            node,
            parent: None,
            has_body: false,
            is_virtual: false,
            is_template: false,
            is_defaulted_or_deleted: false,
            is_operator: false,
        }
    }

    #[test]
    fn test_canonicalization_first_wins() {
        let mut index = DeclIndex::new();
        let proto = index.register(decl(DeclKind::Function, "f", "f", 1));
        let def = index.register(decl(DeclKind::Function, "f", "f", 2));
        assert_eq!(index.canonical(proto), proto);
        assert_eq!(index.canonical(def), proto);
    }

    #[test]
    fn test_namespaces_not_canonicalized() {
        let mut index = DeclIndex::new();
        let first = index.register(decl(DeclKind::Namespace, "ns", "ns", 1));
        let second = index.register(decl(DeclKind::Namespace, "ns", "ns", 2));
        assert_eq!(index.canonical(first), first);
        assert_eq!(index.canonical(second), second);
        assert_ne!(index.canonical(first), index.canonical(second));
    }

    #[test]
    fn test_canon_groups_are_distinct() {
        let mut index = DeclIndex::new();
        let record = index.register(decl(DeclKind::Record, "A", "A", 1));
        let alias = index.register(decl(DeclKind::Typedef, "A", "A", 2));
        assert_ne!(index.canonical(record), index.canonical(alias));
    }

    #[test]
    fn test_resolve_prefers_inner_scope() {
        let mut index = DeclIndex::new();
        let global = index.register(decl(DeclKind::Function, "f", "f", 1));
        let scoped = index.register(decl(DeclKind::Function, "f", "ns::f", 2));

        let scopes = vec!["ns".to_string()];
        assert_eq!(index.resolve("f", &scopes), vec![scoped]);
        assert_eq!(index.resolve("f", &[]), vec![global]);
        assert_eq!(index.resolve("ns::f", &[]), vec![scoped]);
    }

    #[test]
    fn test_resolve_simple_name_fallback() {
        let mut index = DeclIndex::new();
        let scoped = index.register(decl(DeclKind::Function, "f", "ns::f", 1));
        // No scoped match from global scope: fall back to all same-named decls.
        assert_eq!(index.resolve("f", &[]), vec![scoped]);
    }

    #[test]
    fn test_destructor_of() {
        let mut index = DeclIndex::new();
        let record = index.register(decl(DeclKind::Record, "A", "A", 1));
        let mut dtor = decl(DeclKind::Function, "~A", "A::~A", 2);
        dtor.parent = Some(record);
        let dtor = index.register(dtor);
        assert_eq!(index.destructor_of(record), Some(dtor));
        assert!(index.has_user_ctor_or_dtor(record));
    }

    #[test]
    fn test_has_user_ctor() {
        let mut index = DeclIndex::new();
        let record = index.register(decl(DeclKind::Record, "A", "A", 1));
        let mut ctor = decl(DeclKind::Function, "A", "A::A", 2);
        ctor.parent = Some(record);
        index.register(ctor);
        assert!(index.has_user_ctor_or_dtor(record));

        let plain = index.register(decl(DeclKind::Record, "B", "B", 3));
        assert!(!index.has_user_ctor_or_dtor(plain));
    }

    #[test]
    fn test_split_qualified() {
        assert_eq!(split_qualified("ns::A::f"), vec!["ns", "A", "f"]);
        assert_eq!(split_qualified("Foo<std::pair<int, int>>::type"), vec!["Foo", "type"]);
        assert_eq!(simple_name("::std::vector<int>"), "vector");
    }
}
