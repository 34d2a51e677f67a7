//! Front-end driver: parses a C++ translation unit with tree-sitter.
//!
//! The grammar gives a lossless concrete syntax tree with byte-precise
//! ranges and preprocessor directives as first-class nodes. Everything
//! downstream (declaration index, dependency graph, rewriter) works in
//! byte offsets into the original buffer.
//!
//! Syntax errors are fatal unless they are confined to template function
//! bodies (the delayed-parse case, recovered by the late-parse forcer) or
//! to preprocessor conditional regions (which the preprocessor pass may
//! rule out entirely).

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

use crate::error::{CpptrimError, CpptrimResult, IoResultExt};

/// One `-D`/`-U` macro directive from the compile command line, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroArg {
    /// `-DNAME` or `-DNAME=VALUE`
    Define(String, Option<String>),
    /// `-UNAME`
    Undefine(String),
}

/// Parsed compile-driver tokens.
///
/// Only macro definitions affect this stage; include paths and language
/// standard flags are accepted for interface compatibility with the first
/// inliner stage and retained unused.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// `-D`/`-U` directives in command-line order.
    pub macros: Vec<MacroArg>,
    /// All other tokens, verbatim.
    pub other: Vec<String>,
}

impl CompileOptions {
    /// Parse raw compile-driver tokens.
    pub fn parse(tokens: &[String]) -> Self {
        let mut opts = CompileOptions::default();
        for tok in tokens {
            if let Some(rest) = tok.strip_prefix("-D") {
                if rest.is_empty() {
                    continue;
                }
                match rest.split_once('=') {
                    Some((name, value)) => opts
                        .macros
                        .push(MacroArg::Define(name.to_string(), Some(value.to_string()))),
                    None => opts.macros.push(MacroArg::Define(rest.to_string(), None)),
                }
            } else if let Some(rest) = tok.strip_prefix("-U") {
                if !rest.is_empty() {
                    opts.macros.push(MacroArg::Undefine(rest.to_string()));
                }
            } else {
                opts.other.push(tok.clone());
            }
        }
        opts
    }
}

/// A parsed translation unit: the original buffer plus its syntax tree.
pub struct TranslationUnit {
    /// Display path of the input (used in diagnostics).
    pub path: PathBuf,
    /// The original source buffer. Owned until the rewriter materializes
    /// the edited result.
    pub source: String,
    /// The concrete syntax tree over `source`.
    pub tree: Tree,
    diagnostics_suppressed: Cell<bool>,
}

impl TranslationUnit {
    /// Run the front-end on a file.
    pub fn parse_file(path: &Path) -> CpptrimResult<Self> {
        let source = fs::read_to_string(path).with_path(path)?;
        Self::parse(path, source)
    }

    /// Run the front-end on an in-memory buffer.
    pub fn parse(path: impl Into<PathBuf>, source: String) -> CpptrimResult<Self> {
        let path = path.into();
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .map_err(|e| CpptrimError::Internal {
                message: format!("failed to load C++ grammar: {e}"),
            })?;

        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| CpptrimError::Internal {
                message: "parser returned no tree".to_string(),
            })?;

        let tu = TranslationUnit {
            path,
            source,
            tree,
            diagnostics_suppressed: Cell::new(false),
        };

        if let Some(node) = tu.first_fatal_error() {
            let (line, column) = line_col(&tu.source, node.start_byte());
            return Err(CpptrimError::compilation(
                tu.path.clone(),
                "syntax error",
                line,
                column,
            ));
        }

        debug!(path = %tu.path.display(), bytes = tu.source.len(), "parsed translation unit");
        Ok(tu)
    }

    /// The root `translation_unit` node.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text of a node.
    pub fn text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Whether diagnostics are currently suppressed (late-parse forcing).
    pub fn diagnostics_suppressed(&self) -> bool {
        self.diagnostics_suppressed.get()
    }

    /// Suppress diagnostics for the lifetime of the returned guard.
    ///
    /// The previous state is restored when the guard drops, on all exit
    /// paths including panics.
    pub fn suppress_diagnostics(&self) -> DiagnosticsGuard<'_> {
        let previous = self.diagnostics_suppressed.replace(true);
        DiagnosticsGuard { tu: self, previous }
    }

    /// First syntax error that cannot be tolerated, if any.
    ///
    /// Errors inside `template_declaration` subtrees are the delayed-parse
    /// case; errors inside preprocessor conditionals may sit in branches a
    /// real preprocessor would never feed to the compiler. Both are
    /// tolerated here.
    fn first_fatal_error(&self) -> Option<Node<'_>> {
        if !self.root().has_error() {
            return None;
        }
        find_fatal_error(self.root(), false)
    }
}

fn find_fatal_error<'t>(node: Node<'t>, tolerated: bool) -> Option<Node<'t>> {
    let tolerated = tolerated
        || matches!(
            node.kind(),
            "template_declaration" | "preproc_if" | "preproc_ifdef"
        );
    if (node.is_error() || node.is_missing()) && !tolerated {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(err) = find_fatal_error(child, tolerated) {
            return Some(err);
        }
    }
    None
}

/// Scoped diagnostic suppression; restores the previous state on drop.
pub struct DiagnosticsGuard<'tu> {
    tu: &'tu TranslationUnit,
    previous: bool,
}

impl Drop for DiagnosticsGuard<'_> {
    fn drop(&mut self) {
        self.tu.diagnostics_suppressed.set(self.previous);
    }
}

/// Advance past whitespace and comments starting at `pos`.
pub(crate) fn skip_trivia(src: &str, mut pos: usize) -> usize {
    let bytes = src.as_bytes();
    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos + 1 < bytes.len() && bytes[pos] == b'/' && bytes[pos + 1] == b'/' {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
        } else if pos + 1 < bytes.len() && bytes[pos] == b'/' && bytes[pos + 1] == b'*' {
            pos += 2;
            while pos + 1 < bytes.len() && !(bytes[pos] == b'*' && bytes[pos + 1] == b'/') {
                pos += 1;
            }
            pos = (pos + 2).min(bytes.len());
        } else {
            return pos;
        }
    }
}

/// Byte index of a semicolon if it is the next token after `pos`.
pub fn find_semi_after(src: &str, pos: usize) -> Option<usize> {
    find_token_after(src, pos, b';')
}

/// Byte index of `token` if it is the next token after `pos`
/// (skipping whitespace and comments).
pub fn find_token_after(src: &str, pos: usize, token: u8) -> Option<usize> {
    let p = skip_trivia(src, pos);
    if src.as_bytes().get(p) == Some(&token) {
        Some(p)
    } else {
        None
    }
}

/// 1-indexed line and column of a byte offset.
pub fn line_col(src: &str, byte: usize) -> (usize, usize) {
    let byte = byte.min(src.len());
    let mut line = 1;
    let mut col = 1;
    for b in src.as_bytes()[..byte].iter() {
        if *b == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_options_defines() {
        let opts = CompileOptions::parse(&[
            "-std=c++17".to_string(),
            "-DONLINE_JUDGE".to_string(),
            "-DVALUE=42".to_string(),
            "-UDEBUG".to_string(),
        ]);
        assert_eq!(opts.macros.len(), 3);
        assert_eq!(
            opts.macros[0],
            MacroArg::Define("ONLINE_JUDGE".to_string(), None)
        );
        assert_eq!(
            opts.macros[1],
            MacroArg::Define("VALUE".to_string(), Some("42".to_string()))
        );
        assert_eq!(opts.macros[2], MacroArg::Undefine("DEBUG".to_string()));
        assert_eq!(opts.other, vec!["-std=c++17".to_string()]);
    }

    #[test]
    fn test_parse_well_formed() {
        let tu = TranslationUnit::parse("a.cpp", "int main() { return 0; }".to_string()).unwrap();
        assert_eq!(tu.root().kind(), "translation_unit");
        assert!(!tu.root().has_error());
    }

    #[test]
    fn test_parse_fatal_error() {
        let result = TranslationUnit::parse("a.cpp", "int main( { ) }".to_string());
        assert!(matches!(result, Err(CpptrimError::Compilation { .. })));
    }

    #[test]
    fn test_diagnostics_guard_restores() {
        let tu = TranslationUnit::parse("a.cpp", "int main(){return 0;}".to_string()).unwrap();
        assert!(!tu.diagnostics_suppressed());
        {
            let _guard = tu.suppress_diagnostics();
            assert!(tu.diagnostics_suppressed());
        }
        assert!(!tu.diagnostics_suppressed());
    }

    #[test]
    fn test_find_semi_after() {
        let src = "int x = 1 /* init */ ;\nint y;";
        assert_eq!(find_semi_after(src, 9), Some(21));
        assert_eq!(find_semi_after(src, 0), None);
    }

    #[test]
    fn test_find_token_after_comma() {
        let src = "a , b";
        assert_eq!(find_token_after(src, 1, b','), Some(2));
        assert_eq!(find_token_after(src, 3, b','), None);
    }

    #[test]
    fn test_line_col() {
        let src = "ab\ncd\n";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 4), (2, 2));
    }
}
