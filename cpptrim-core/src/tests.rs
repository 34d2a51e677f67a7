//! End-to-end test suite for cpptrim-core.
//!
//! Each test feeds a small translation unit through the full pipeline
//! and checks the rewritten output.

use crate::builder::Optimizer;

fn trim(source: &str) -> String {
    Optimizer::default()
        .optimize_source("test.cpp", source)
        .expect("optimization should succeed")
}

fn trim_with(source: &str, flags: &[&str], keep: &[&str]) -> String {
    Optimizer::new(
        flags.iter().map(|s| s.to_string()).collect(),
        keep.iter().map(|s| s.to_string()).collect(),
    )
    .optimize_source("test.cpp", source)
    .expect("optimization should succeed")
}

// ---------------------------------------------------------------------
// Literal scenarios

#[test]
fn scenario_unused_function_removed() {
    let out = trim("int unused(){return 1;} int main(){return 0;}");
    assert!(out.contains("int main(){return 0;}"));
    assert!(!out.contains("unused"));
}

#[test]
fn scenario_keep_comment_pins_declaration() {
    let out = trim("/// caide keep\nint helper(){return 7;} int main(){return 0;}");
    assert!(out.contains("helper"));
    assert!(out.contains("int main(){return 0;}"));
    assert!(out.contains("/// caide keep"));
}

#[test]
fn scenario_virtual_methods_of_live_class_survive() {
    let out = trim("struct A{virtual ~A(){} virtual void f(){}}; A a; int main(){return 0;}");
    assert!(out.contains("struct A"));
    assert!(out.contains("~A"));
    assert!(out.contains("void f"));
}

#[test]
fn scenario_comma_group_keeps_only_used_variable() {
    let out = trim("int a,b,c; int main(){return b;}");
    assert!(out.contains("int main(){return b;}"));
    assert!(out.contains("b;"));
    assert!(!out.contains("a,"));
    assert!(!out.contains(",c"));
}

#[test]
fn scenario_if_zero_block_removed() {
    let out = trim("#if 0\nint dead(){return 0;}\n#endif\nint main(){return 0;}");
    assert!(!out.contains("dead"));
    assert!(!out.contains("#if"));
    assert!(!out.contains("#endif"));
    assert!(out.contains("int main(){return 0;}"));
}

#[test]
fn scenario_kept_macro_block_preserved_verbatim() {
    let src = "#ifdef FEATURE\nint feat(){return 0;}\n#endif\nint main(){return 0;}";
    let out = trim_with(src, &[], &["FEATURE"]);
    assert_eq!(out, src);
}

// ---------------------------------------------------------------------
// Functions and prototypes

#[test]
fn test_prototype_and_definition_both_kept_when_used() {
    let out = trim("int helper();\nint main(){return helper();}\nint helper(){return 7;}\n");
    assert!(out.contains("int helper();"));
    assert!(out.contains("int helper(){return 7;}"));
}

#[test]
fn test_redundant_prototype_after_definition_removed() {
    let out = trim("int helper(){return 7;}\nint helper();\nint main(){return helper();}\n");
    assert!(out.contains("int helper(){return 7;}"));
    assert!(!out.contains("int helper();"));
}

#[test]
fn test_unused_prototype_removed() {
    let out = trim("void never_defined(int);\nint main(){return 0;}\n");
    assert!(!out.contains("never_defined"));
}

#[test]
fn test_transitive_dependencies_kept() {
    let out = trim(
        "int leaf(){return 1;}\nint mid(){return leaf();}\nint dead(){return 2;}\nint main(){return mid();}\n",
    );
    assert!(out.contains("leaf"));
    assert!(out.contains("mid"));
    assert!(!out.contains("dead"));
}

#[test]
fn test_mutually_recursive_functions_kept() {
    let out = trim(
        "int odd(int n);\nint even(int n){return n==0?1:odd(n-1);}\nint odd(int n){return n==0?0:even(n-1);}\nint main(){return even(4);}\n",
    );
    assert!(out.contains("even"));
    assert!(out.contains("int odd(int n){"));
}

// ---------------------------------------------------------------------
// Classes

#[test]
fn test_unused_class_removed() {
    let out = trim("struct Unused { int x; void m(); };\nint main(){return 0;}\n");
    assert!(!out.contains("Unused"));
}

#[test]
fn test_unused_method_pruned_from_live_class() {
    let out = trim(
        "struct A { int used(){return 1;} int unused_m(){return 2;} };\nint main(){ A x; return x.used(); }\n",
    );
    assert!(out.contains("struct A"));
    assert!(out.contains("used()"));
    assert!(!out.contains("unused_m"));
}

#[test]
fn test_base_class_kept_through_inheritance() {
    let out = trim(
        "struct Base { int b; };\nstruct Derived : Base { int d; };\nint main(){ Derived x; return x.d; }\n",
    );
    assert!(out.contains("struct Base"));
    assert!(out.contains("struct Derived"));
}

#[test]
fn test_constructor_kept_for_live_class() {
    let out = trim(
        "struct A { int v; A(int x) { v = x; } };\nint main(){ A a(5); return a.v; }\n",
    );
    assert!(out.contains("A(int x)"));
}

#[test]
fn test_free_operator_kept_for_live_record() {
    let out = trim(
        "struct Pt { int x; };\nPt operator+(Pt a, Pt b){ Pt r; r.x = a.x + b.x; return r; }\nint main(){ Pt p; Pt q; Pt s = p + q; return s.x; }\n",
    );
    assert!(out.contains("operator+"));
}

#[test]
fn test_forward_declaration_of_removed_class_removed() {
    let out = trim("struct Gone;\nstruct Gone { int g; };\nint main(){return 0;}\n");
    assert!(!out.contains("Gone"));
}

#[test]
fn test_comma_group_with_live_inline_tag() {
    let out = trim(
        "struct S { int v; } unused_s;\nint main(){ S x; x.v = 1; return x.v; }\n",
    );
    assert!(out.contains("struct S"));
    assert!(!out.contains("unused_s"));
}

// ---------------------------------------------------------------------
// Templates

#[test]
fn test_unused_function_template_removed() {
    let out = trim(
        "template<class T> T twice(T x){return x+x;}\ntemplate<class T> T thrice(T x){return 3*x;}\nint main(){return twice(21);}\n",
    );
    assert!(out.contains("twice"));
    assert!(!out.contains("thrice"));
}

#[test]
fn test_used_class_template_kept() {
    // Field names are distinct on purpose: member references resolve by
    // name, and a shared field name would conservatively keep both.
    let out = trim(
        "template<class T> struct Box { T v; };\ntemplate<class T> struct Dead { T w; };\nint main(){ Box<int> b; b.v = 1; return b.v; }\n",
    );
    assert!(out.contains("Box"));
    assert!(!out.contains("Dead"));
}

#[test]
fn test_template_removal_includes_template_head() {
    let out = trim("template<class T> T dead(T x){return x;}\nint main(){return 0;}\n");
    assert!(!out.contains("template"));
    assert!(!out.contains("dead"));
}

// ---------------------------------------------------------------------
// Typedefs and aliases

#[test]
fn test_unused_typedef_removed() {
    let out = trim("typedef long long ll;\ntypedef int dead_t;\nint main(){ ll x = 0; return (int)x; }\n");
    assert!(out.contains("typedef long long ll;"));
    assert!(!out.contains("dead_t"));
}

#[test]
fn test_unused_alias_removed() {
    let out = trim("using vi = int;\nusing dead_alias = double;\nint main(){ vi x = 0; return x; }\n");
    assert!(out.contains("using vi"));
    assert!(!out.contains("dead_alias"));
}

#[test]
fn test_typedef_chain_kept() {
    let out = trim("typedef int base_t;\ntypedef base_t derived_t;\nint main(){ derived_t x = 0; return x; }\n");
    assert!(out.contains("base_t;"));
    assert!(out.contains("derived_t;"));
}

// ---------------------------------------------------------------------
// Namespaces and using-directives

#[test]
fn test_unused_namespace_removed() {
    let out = trim("namespace dead { int f(){return 1;} }\nint main(){return 0;}\n");
    assert!(!out.contains("dead"));
}

#[test]
fn test_partially_used_namespace_pruned_inside() {
    let out = trim(
        "namespace util { int used(){return 1;} int unused(){return 2;} }\nint main(){return util::used();}\n",
    );
    assert!(out.contains("namespace util"));
    assert!(out.contains("used"));
    assert!(!out.contains("unused"));
}

#[test]
fn test_namespace_reopenings_independent() {
    let out = trim(
        "namespace n { int a(){return 1;} }\nnamespace n { int b(){return 2;} }\nint main(){return n::a();}\n",
    );
    assert!(out.contains("int a"));
    assert!(!out.contains("int b"));
    assert_eq!(out.matches("namespace n").count(), 1);
}

#[test]
fn test_duplicate_using_directive_removed() {
    let out = trim(
        "namespace foo { int x; }\nusing namespace foo;\nusing namespace foo;\nint main(){ return x; }\n",
    );
    assert_eq!(out.matches("using namespace foo;").count(), 1);
}

// ---------------------------------------------------------------------
// Variables and enums

#[test]
fn test_pinned_variable_kept() {
    let out = trim("/// caide keep\nint magic = 42;\nint main(){return 0;}\n");
    assert!(out.contains("magic"));
}

#[test]
fn test_global_of_plain_type_removed() {
    let out = trim("int unused_global = 5;\nint main(){return 0;}\n");
    assert!(!out.contains("unused_global"));
}

#[test]
fn test_global_with_user_ctor_pinned() {
    let out = trim("struct Init { Init() {} };\nInit init_guard;\nint main(){return 0;}\n");
    assert!(out.contains("init_guard"));
    assert!(out.contains("struct Init"));
}

#[test]
fn test_enumerator_reference_keeps_enum() {
    let out = trim("enum Color { RED, GREEN };\nint main(){ return RED; }\n");
    assert!(out.contains("enum Color"));
    assert!(out.contains("RED"));
}

// ---------------------------------------------------------------------
// Preprocessor interplay

#[test]
fn test_active_branch_content_analyzed() {
    // The active branch's code participates in the dependency graph:
    // `helper` is called only from inside it and must survive.
    let src = "int helper(){return 3;}\n#ifdef GO\nint run(){return helper();}\n#endif\nint main(){return run();}\n";
    let out = trim_with(src, &["-DGO"], &[]);
    assert!(out.contains("helper"));
    assert!(out.contains("run"));
    assert!(!out.contains("#ifdef"));
}

#[test]
fn test_inactive_branch_decl_not_indexed() {
    // `ghost` exists only in a dead region; the reference in main cannot
    // resolve, but the pipeline must not fail and main survives.
    let src = "#if 0\nint ghost(){return 1;}\n#endif\nint main(){return 0;}\n";
    let out = trim(src);
    assert!(out.contains("int main"));
    assert!(!out.contains("ghost"));
}

#[test]
fn test_else_branch_survives_and_is_pruned() {
    let src = "#if 0\nint a_dead(){return 1;}\n#else\nint b_used(){return 2;}\nint b_dead(){return 3;}\n#endif\nint main(){return b_used();}\n";
    let out = trim(src);
    assert!(!out.contains("a_dead"));
    assert!(out.contains("b_used"));
    assert!(!out.contains("b_dead"));
}

// ---------------------------------------------------------------------
// Invariants

#[test]
fn test_idempotence_on_scenarios() {
    let sources = [
        "int unused(){return 1;} int main(){return 0;}",
        "int a,b,c; int main(){return b;}",
        "namespace util { int used(){return 1;} int unused(){return 2;} }\nint main(){return util::used();}\n",
        "struct A{virtual ~A(){} virtual void f(){}}; A a; int main(){return 0;}",
        "#if 0\nint dead(){return 0;}\n#endif\nint main(){return 0;}",
    ];
    for src in sources {
        let once = trim(src);
        let twice = trim(&once);
        assert_eq!(once, twice, "not a fixed point for: {src}");
    }
}

#[test]
fn test_roots_always_preserved() {
    let out = trim("/// caide keep\nint pinned(){return 1;}\nint main(){return 0;}\n");
    assert!(out.contains("pinned"));
    assert!(out.contains("main"));
}

#[test]
fn test_no_edits_returns_input_unchanged() {
    let src = "int main(){return 0;}";
    assert_eq!(trim(src), src);
}

#[test]
fn test_removed_declaration_comment_removed() {
    let out = trim("// computes nothing useful\nint unused(){return 1;}\nint main(){return 0;}\n");
    assert!(!out.contains("computes nothing useful"));
    assert!(!out.contains("unused"));
}

#[test]
fn test_competitive_programming_shape() {
    // A miniature of the real use case: an inlined library followed by a
    // solution that uses a fraction of it.
    let src = r#"typedef long long ll;
typedef unsigned long long ull;

ll gcd(ll a, ll b) { return b == 0 ? a : gcd(b, a % b); }
ll lcm(ll a, ll b) { return a / gcd(a, b) * b; }
ll power(ll base, ll exp) { ll r = 1; while (exp) { if (exp & 1) r *= base; base *= base; exp >>= 1; } return r; }

struct DSU {
    int parent[100];
    DSU() { for (int i = 0; i < 100; i++) parent[i] = i; }
    int find(int x) { return parent[x] == x ? x : parent[x] = find(parent[x]); }
};

int main() {
    ll a = 12, b = 18;
    return (int)gcd(a, b);
}
"#;
    let out = trim(src);
    assert!(out.contains("ll gcd"));
    assert!(out.contains("typedef long long ll;"));
    assert!(!out.contains("lcm"));
    assert!(!out.contains("power"));
    assert!(!out.contains("DSU"));
    assert!(!out.contains("ull"));
}
