//! Inactive preprocessor block removal.
//!
//! A single document-order walk over the tree's `preproc_*` nodes,
//! maintaining a macro table seeded from `-D`/`-U` compile options and
//! updated by in-file `#define`/`#undef` directives. Directives inside
//! inactive branches do not update the table.
//!
//! Branches ruled out by condition evaluation become *invisible*: the
//! dependencies collector and the optimizer visitor skip declarations
//! starting inside them, and the whole region is submitted for removal at
//! `finalize`, after the optimizer visitor ran, through the shared
//! SmartRewriter.
//!
//! A condition that mentions a *macro-to-keep* preserves its construct
//! verbatim, so user-intended configuration points survive even if
//! inactive. A condition the evaluator cannot understand (function-like
//! macro calls, non-integer expansions) also preserves the construct, and
//! additionally leaves all of its branches visible.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use tree_sitter::Node;

use crate::parse::{CompileOptions, MacroArg, TranslationUnit};
use crate::rewrite::{RemoveOptions, SmartRewriter};

/// Preprocessor macro definitions, evolving in document order.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    defs: HashMap<String, MacroDef>,
}

#[derive(Debug, Clone)]
enum MacroDef {
    Object(Option<String>),
    Function,
}

impl MacroTable {
    /// Seed the table from `-D`/`-U` compile options, in order.
    pub fn from_options(opts: &CompileOptions) -> Self {
        let mut table = MacroTable::default();
        for arg in &opts.macros {
            match arg {
                MacroArg::Define(name, value) => table.define(name, value.as_deref()),
                MacroArg::Undefine(name) => table.undefine(name),
            }
        }
        table
    }

    pub fn define(&mut self, name: &str, value: Option<&str>) {
        self.defs.insert(
            name.to_string(),
            MacroDef::Object(value.map(|v| v.trim().to_string())),
        );
    }

    pub fn define_function(&mut self, name: &str) {
        self.defs.insert(name.to_string(), MacroDef::Function);
    }

    pub fn undefine(&mut self, name: &str) {
        self.defs.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    fn expand(&self, name: &str, depth: usize) -> Option<i64> {
        match self.defs.get(name) {
            None => Some(0),
            Some(MacroDef::Function) => None,
            Some(MacroDef::Object(None)) => Some(1),
            Some(MacroDef::Object(Some(value))) => {
                if let Some(n) = parse_int(value) {
                    return Some(n);
                }
                if depth > 0 && value.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return self.expand(value, depth - 1);
                }
                None
            }
        }
    }
}

/// Result of the preprocessor walk.
#[derive(Debug, Default)]
pub struct PreprocAnalysis {
    /// Regions excluded from declaration analysis, sorted by start.
    invisible: Vec<(usize, usize)>,
    /// Ranges to submit for removal at finalize.
    removals: Vec<(usize, usize)>,
    /// Conditional constructs preserved verbatim for the keep list.
    pub kept_blocks: usize,
    /// Conditional constructs that produced at least one removal.
    pub removed_blocks: usize,
}

impl PreprocAnalysis {
    /// Whether a byte offset lies inside an inactive region.
    pub fn is_invisible(&self, byte: usize) -> bool {
        let i = self.invisible.partition_point(|&(start, _)| start <= byte);
        i > 0 && self.invisible[i - 1].1 > byte
    }

    /// Submit all recorded removals through the shared rewriter.
    /// Ranges already claimed by the optimizer visitor lose quietly.
    pub fn finalize(&self, rewriter: &mut SmartRewriter) -> usize {
        let opts = RemoveOptions {
            remove_empty_lines: true,
        };
        let mut accepted = 0;
        for &(start, end) in &self.removals {
            if rewriter.remove_range(start, end, opts) {
                accepted += 1;
            }
        }
        accepted
    }

    fn mark_invisible(&mut self, start: usize, end: usize) {
        if start < end {
            self.invisible.push((start, end));
        }
    }
}

/// Walk the translation unit's preprocessor directives.
pub fn analyze(
    tu: &TranslationUnit,
    options: &CompileOptions,
    macros_to_keep: &HashSet<String>,
) -> PreprocAnalysis {
    let mut pass = PreprocPass {
        tu,
        macros: MacroTable::from_options(options),
        macros_to_keep,
        analysis: PreprocAnalysis::default(),
    };
    pass.process(tu.root());
    pass.analysis.invisible.sort_unstable();
    pass.analysis
}

struct PreprocPass<'a> {
    tu: &'a TranslationUnit,
    macros: MacroTable,
    macros_to_keep: &'a HashSet<String>,
    analysis: PreprocAnalysis,
}

/// One branch of a conditional construct.
struct Branch<'t> {
    node: Node<'t>,
    cond: BranchCond<'t>,
}

enum BranchCond<'t> {
    If(Node<'t>),
    Ifdef { name: Node<'t>, negated: bool },
    Else,
}

impl<'a> PreprocPass<'a> {
    fn process(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.dispatch(child);
        }
    }

    fn dispatch(&mut self, child: Node) {
        match child.kind() {
            "preproc_def" => {
                if let Some(name) = child.child_by_field_name("name") {
                    let value = child.child_by_field_name("value").map(|v| self.tu.text(v));
                    self.macros.define(self.tu.text(name), value);
                }
            }
            "preproc_function_def" => {
                if let Some(name) = child.child_by_field_name("name") {
                    self.macros.define_function(self.tu.text(name));
                }
            }
            "preproc_call" => {
                let directive = child
                    .child_by_field_name("directive")
                    .map(|d| self.tu.text(d).to_string())
                    .unwrap_or_default();
                if directive == "#undef" {
                    if let Some(arg) = child.child_by_field_name("argument") {
                        self.macros.undefine(self.tu.text(arg).trim());
                    }
                }
            }
            "preproc_if" | "preproc_ifdef" => self.handle_conditional(child),
            _ => self.process(child),
        }
    }

    fn handle_conditional(&mut self, outer: Node) {
        let branches = collect_branches(outer);
        let endif_start = find_endif(outer);

        // Activity per branch; None when any condition is unevaluable.
        let mut active_idx: Option<usize> = None;
        let mut evaluable = true;
        for (i, branch) in branches.iter().enumerate() {
            let active = match &branch.cond {
                BranchCond::If(cond) => match eval_condition(*cond, self.tu, &self.macros) {
                    Some(v) => v != 0,
                    None => {
                        evaluable = false;
                        break;
                    }
                },
                BranchCond::Ifdef { name, negated } => {
                    let defined = self.macros.is_defined(self.tu.text(*name));
                    defined != *negated
                }
                BranchCond::Else => true,
            };
            if active && active_idx.is_none() {
                active_idx = Some(i);
                break;
            }
        }

        let Some(endif_start) = endif_start else {
            // Unterminated construct (parse recovery artifact): keep verbatim.
            self.process_all_branches(&branches, outer);
            return;
        };

        if !evaluable {
            debug!(start = outer.start_byte(), "unevaluable condition, keeping block");
            self.process_all_branches(&branches, outer);
            return;
        }

        let keep_listed = self.mentions_kept_macro(&branches);

        // Per-branch extents: [directive start, next directive start).
        let extent_end = |i: usize| -> usize {
            branches
                .get(i + 1)
                .map(|b| b.node.start_byte())
                .unwrap_or(endif_start)
        };

        if keep_listed {
            self.analysis.kept_blocks += 1;
            debug!(start = outer.start_byte(), "keep-listed macro, preserving block verbatim");
            for (i, branch) in branches.iter().enumerate() {
                if Some(i) == active_idx {
                    self.process_branch_content(branch, extent_end(i));
                } else {
                    let content_start = content_start(self.tu, branch);
                    self.analysis.mark_invisible(content_start, extent_end(i));
                }
            }
            return;
        }

        self.analysis.removed_blocks += 1;
        match active_idx {
            None => {
                // No branch survives preprocessing: drop the whole
                // construct, directives included.
                self.analysis
                    .removals
                    .push((outer.start_byte(), outer.end_byte()));
                self.analysis
                    .mark_invisible(outer.start_byte(), outer.end_byte());
            }
            Some(k) => {
                for (i, branch) in branches.iter().enumerate() {
                    if i == k {
                        // Active branch: drop its directive line, keep the text.
                        let content = content_start(self.tu, branch);
                        self.analysis.removals.push((branch.node.start_byte(), content));
                        self.process_branch_content(branch, extent_end(i));
                    } else {
                        self.analysis
                            .removals
                            .push((branch.node.start_byte(), extent_end(i)));
                        // Invisibility starts after the directive line so
                        // the construct node itself stays visible and the
                        // walkers can reach the active branch.
                        self.analysis
                            .mark_invisible(content_start(self.tu, branch), extent_end(i));
                    }
                }
                self.analysis.removals.push((endif_start, outer.end_byte()));
            }
        }
    }

    /// Recurse into one branch's content nodes (nested directives and all).
    fn process_branch_content(&mut self, branch: &Branch, extent_end: usize) {
        let start = content_start(self.tu, branch);
        let mut cursor = branch.node.walk();
        let children: Vec<Node> = branch
            .node
            .children(&mut cursor)
            .filter(|c| c.start_byte() >= start && c.end_byte() <= extent_end)
            .collect();
        for child in children {
            self.dispatch(child);
        }
    }

    fn process_all_branches(&mut self, branches: &[Branch], outer: Node) {
        let endif = find_endif(outer).unwrap_or(outer.end_byte());
        for (i, branch) in branches.iter().enumerate() {
            let extent_end = branches
                .get(i + 1)
                .map(|b| b.node.start_byte())
                .unwrap_or(endif);
            self.process_branch_content(branch, extent_end);
        }
    }

    fn mentions_kept_macro(&self, branches: &[Branch]) -> bool {
        if self.macros_to_keep.is_empty() {
            return false;
        }
        for branch in branches {
            match &branch.cond {
                BranchCond::If(cond) => {
                    if self.condition_mentions_kept(*cond) {
                        return true;
                    }
                }
                BranchCond::Ifdef { name, .. } => {
                    if self.macros_to_keep.contains(self.tu.text(*name)) {
                        return true;
                    }
                }
                BranchCond::Else => {}
            }
        }
        false
    }

    fn condition_mentions_kept(&self, node: Node) -> bool {
        if node.kind() == "identifier" && self.macros_to_keep.contains(self.tu.text(node)) {
            return true;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if self.condition_mentions_kept(child) {
                return true;
            }
        }
        false
    }
}

/// Flatten the `alternative` chain of a conditional into branch order.
fn collect_branches(outer: Node) -> Vec<Branch> {
    let mut branches = Vec::new();
    let mut current = Some(outer);
    while let Some(node) = current {
        let cond = match node.kind() {
            "preproc_if" | "preproc_elif" => match node.child_by_field_name("condition") {
                Some(c) => BranchCond::If(c),
                None => BranchCond::Else,
            },
            "preproc_ifdef" | "preproc_elifdef" => {
                let negated = node
                    .child(0)
                    .map(|d| {
                        let kind = d.kind();
                        kind == "#ifndef" || kind == "#elifndef"
                    })
                    .unwrap_or(false);
                match node.child_by_field_name("name") {
                    Some(name) => BranchCond::Ifdef { name, negated },
                    None => BranchCond::Else,
                }
            }
            "preproc_else" => BranchCond::Else,
            _ => BranchCond::Else,
        };
        let next = node.child_by_field_name("alternative");
        branches.push(Branch { node, cond });
        current = next;
    }
    branches
}

/// Start byte of the `#endif` token of the outermost conditional node.
fn find_endif(outer: Node) -> Option<usize> {
    let mut cursor = outer.walk();
    for child in outer.children(&mut cursor) {
        if child.kind() == "#endif" {
            return Some(child.start_byte());
        }
    }
    None
}

/// First byte of a branch's content: the start of the line after its
/// directive header.
fn content_start(tu: &TranslationUnit, branch: &Branch) -> usize {
    let header_end = match &branch.cond {
        BranchCond::If(cond) => cond.end_byte(),
        BranchCond::Ifdef { name, .. } => name.end_byte(),
        BranchCond::Else => branch
            .node
            .child(0)
            .map(|d| d.end_byte())
            .unwrap_or(branch.node.start_byte()),
    };
    line_end_after(&tu.source, header_end)
}

fn line_end_after(src: &str, byte: usize) -> usize {
    src[byte.min(src.len())..]
        .find('\n')
        .map(|i| byte + i + 1)
        .unwrap_or(src.len())
}

/// Evaluate a preprocessor condition. `None` means unevaluable.
pub(crate) fn eval_condition(node: Node, tu: &TranslationUnit, macros: &MacroTable) -> Option<i64> {
    const EXPANSION_DEPTH: usize = 8;
    match node.kind() {
        "number_literal" => parse_int(tu.text(node)),
        "identifier" => macros.expand(tu.text(node), EXPANSION_DEPTH),
        "preproc_defined" => {
            let mut cursor = node.walk();
            let ident = node
                .children(&mut cursor)
                .find(|c| c.kind() == "identifier")?;
            Some(macros.is_defined(tu.text(ident)) as i64)
        }
        "unary_expression" => {
            let op = node.child_by_field_name("operator")?;
            let arg = eval_condition(node.child_by_field_name("argument")?, tu, macros)?;
            match tu.text(op) {
                "!" => Some((arg == 0) as i64),
                "-" => Some(-arg),
                "+" => Some(arg),
                "~" => Some(!arg),
                _ => None,
            }
        }
        "binary_expression" => {
            let op_node = node.child_by_field_name("operator")?;
            let op = tu.text(op_node);
            let lhs = eval_condition(node.child_by_field_name("left")?, tu, macros)?;
            // Short-circuit before evaluating the right operand, so that
            // e.g. `defined(X) && X > 2` stays evaluable when X is undefined.
            match op {
                "&&" if lhs == 0 => return Some(0),
                "||" if lhs != 0 => return Some(1),
                _ => {}
            }
            let rhs = eval_condition(node.child_by_field_name("right")?, tu, macros)?;
            match op {
                "&&" => Some(((lhs != 0) && (rhs != 0)) as i64),
                "||" => Some(((lhs != 0) || (rhs != 0)) as i64),
                "==" => Some((lhs == rhs) as i64),
                "!=" => Some((lhs != rhs) as i64),
                "<" => Some((lhs < rhs) as i64),
                "<=" => Some((lhs <= rhs) as i64),
                ">" => Some((lhs > rhs) as i64),
                ">=" => Some((lhs >= rhs) as i64),
                "+" => lhs.checked_add(rhs),
                "-" => lhs.checked_sub(rhs),
                "*" => lhs.checked_mul(rhs),
                "/" => lhs.checked_div(rhs),
                "%" => lhs.checked_rem(rhs),
                "<<" => Some(lhs.wrapping_shl(rhs as u32)),
                ">>" => Some(lhs.wrapping_shr(rhs as u32)),
                "&" => Some(lhs & rhs),
                "|" => Some(lhs | rhs),
                "^" => Some(lhs ^ rhs),
                _ => None,
            }
        }
        "parenthesized_expression" => {
            let mut cursor = node.walk();
            let inner = node.children(&mut cursor).find(|c| c.is_named())?;
            eval_condition(inner, tu, macros)
        }
        _ => None,
    }
}

/// Parse a C integer literal (decimal, hex, octal, binary; suffixes
/// stripped).
fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let text = text
        .trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'))
        .replace('\'', "");
    if text.is_empty() {
        return None;
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::CompileOptions;

    fn run(source: &str, flags: &[&str], keep: &[&str]) -> (TranslationUnit, PreprocAnalysis) {
        let tu = TranslationUnit::parse("test.cpp", source.to_string()).unwrap();
        let options = CompileOptions::parse(
            &flags.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        );
        let keep: HashSet<String> = keep.iter().map(|s| s.to_string()).collect();
        let analysis = analyze(&tu, &options, &keep);
        (tu, analysis)
    }

    fn apply(tu: &TranslationUnit, analysis: &PreprocAnalysis) -> String {
        let mut rw = SmartRewriter::new(&tu.source);
        analysis.finalize(&mut rw);
        rw.apply_changes();
        rw.result().to_string()
    }

    #[test]
    fn test_if_zero_removed_whole() {
        let src = "#if 0\nint dead() { return 0; }\n#endif\nint main() { return 0; }\n";
        let (tu, analysis) = run(src, &[], &[]);
        let out = apply(&tu, &analysis);
        assert!(!out.contains("dead"));
        assert!(!out.contains("#if"));
        assert!(!out.contains("#endif"));
        assert!(out.contains("int main"));
    }

    #[test]
    fn test_if_zero_content_invisible() {
        let src = "#if 0\nint dead() { return 0; }\n#endif\nint main() { return 0; }\n";
        let (tu, analysis) = run(src, &[], &[]);
        let dead_pos = tu.source.find("dead").unwrap();
        let main_pos = tu.source.find("main").unwrap();
        assert!(analysis.is_invisible(dead_pos));
        assert!(!analysis.is_invisible(main_pos));
    }

    #[test]
    fn test_ifdef_undefined_removed() {
        let src = "#ifdef FEATURE\nint feat() { return 0; }\n#endif\nint main() { return 0; }\n";
        let (tu, analysis) = run(src, &[], &[]);
        let out = apply(&tu, &analysis);
        assert!(!out.contains("feat"));
    }

    #[test]
    fn test_ifdef_kept_macro_preserved_verbatim() {
        let src = "#ifdef FEATURE\nint feat() { return 0; }\n#endif\nint main() { return 0; }\n";
        let (tu, analysis) = run(src, &[], &["FEATURE"]);
        let out = apply(&tu, &analysis);
        assert_eq!(out, src);
        assert_eq!(analysis.kept_blocks, 1);
        // Inactive content is still invisible to declaration analysis.
        assert!(analysis.is_invisible(tu.source.find("feat").unwrap()));
    }

    #[test]
    fn test_ifdef_defined_by_flag_keeps_content() {
        let src = "#ifdef FEATURE\nint feat() { return 0; }\n#endif\nint main() { return 0; }\n";
        let (tu, analysis) = run(src, &["-DFEATURE"], &[]);
        let out = apply(&tu, &analysis);
        assert!(out.contains("int feat"));
        // Directives resolved away.
        assert!(!out.contains("#ifdef"));
        assert!(!out.contains("#endif"));
        assert!(!analysis.is_invisible(tu.source.find("feat").unwrap()));
    }

    #[test]
    fn test_else_branch_active() {
        let src = "#if 0\nint a() { return 1; }\n#else\nint b() { return 2; }\n#endif\nint main() { return 0; }\n";
        let (tu, analysis) = run(src, &[], &[]);
        let out = apply(&tu, &analysis);
        assert!(!out.contains("int a"));
        assert!(out.contains("int b"));
        assert!(!out.contains("#else"));
        assert!(!out.contains("#endif"));
    }

    #[test]
    fn test_in_file_define_respected() {
        let src = "#define LOCAL 1\n#if LOCAL\nint live() { return 1; }\n#endif\nint main() { return 0; }\n";
        let (tu, analysis) = run(src, &[], &[]);
        let out = apply(&tu, &analysis);
        assert!(out.contains("int live"));
        assert!(out.contains("#define LOCAL"));
    }

    #[test]
    fn test_undef_respected() {
        let src = "#define F 1\n#undef F\n#ifdef F\nint dead() { return 0; }\n#endif\nint main() { return 0; }\n";
        let (tu, analysis) = run(src, &[], &[]);
        let out = apply(&tu, &analysis);
        assert!(!out.contains("dead"));
    }

    #[test]
    fn test_unevaluable_condition_kept() {
        let src = "#if CHECK(1)\nint maybe() { return 0; }\n#endif\nint main() { return 0; }\n";
        let (tu, analysis) = run(src, &[], &[]);
        let out = apply(&tu, &analysis);
        assert_eq!(out, src);
        assert!(!analysis.is_invisible(tu.source.find("maybe").unwrap()));
    }

    #[test]
    fn test_ifndef_guard() {
        let src = "#ifndef GUARD\nint live() { return 1; }\n#endif\nint main() { return 0; }\n";
        let (tu, analysis) = run(src, &[], &[]);
        let out = apply(&tu, &analysis);
        assert!(out.contains("int live"));
        assert!(!out.contains("#ifndef"));
    }

    #[test]
    fn test_eval_arithmetic_and_defined() {
        let src = "#if defined(A) && A > 2\nint live() { return 1; }\n#endif\nint main() { return 0; }\n";
        let (tu, analysis) = run(src, &["-DA=4"], &[]);
        let out = apply(&tu, &analysis);
        assert!(out.contains("int live"));

        let (tu2, analysis2) = run(src, &["-DA=1"], &[]);
        let out2 = apply(&tu2, &analysis2);
        assert!(!out2.contains("int live"));

        // Undefined A: short-circuit keeps the condition evaluable.
        let (tu3, analysis3) = run(src, &[], &[]);
        let out3 = apply(&tu3, &analysis3);
        assert!(!out3.contains("int live"));
    }

    #[test]
    fn test_parse_int_forms() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("010"), Some(8));
        assert_eq!(parse_int("1000000007LL"), Some(1000000007));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("banana"), None);
    }
}
