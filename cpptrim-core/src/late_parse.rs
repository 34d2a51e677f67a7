//! Late-template forcer.
//!
//! Error recovery can truncate the recorded extent of a function
//! template whose body does not parse in isolation (dependent constructs
//! the grammar cannot resolve). Deleting such a template with a
//! truncated range would leave its body behind, so before reachability
//! runs, every delayed function is re-scanned lexically to its matching
//! closing brace and its recorded extent is widened.
//!
//! Diagnostics are suppressed for the duration under a scoped guard
//! that restores the previous state on all exit paths; these bodies are
//! allowed to be malformed.

use tracing::{debug, warn};

use crate::decls::{DeclId, DeclIndex};
use crate::parse::TranslationUnit;

/// Force full extents for all delayed-parse functions. Returns how many
/// ranges were widened.
pub fn force_parse_delayed(
    tu: &TranslationUnit,
    index: &mut DeclIndex,
    delayed: &[DeclId],
) -> usize {
    let _guard = tu.suppress_diagnostics();
    let mut widened = 0;

    for &id in delayed {
        let (start, end) = index.get(id).range;
        diag(tu, &format!("forcing late-parsed template body at {start}"));
        match body_extent(&tu.source, start) {
            Some(new_end) if new_end > end => {
                debug!(start, end, new_end, "widened delayed template extent");
                let info = index.get_mut(id);
                info.range.1 = new_end;
                info.decl_end = new_end;
                widened += 1;
            }
            Some(_) => {}
            None => diag(tu, "late-parsed template has no recoverable body"),
        }
    }

    widened
}

/// Emit a diagnostic unless diagnostics are suppressed.
fn diag(tu: &TranslationUnit, message: &str) {
    if tu.diagnostics_suppressed() {
        debug!(suppressed = true, message);
    } else {
        warn!(message);
    }
}

/// Byte offset just past the `}` matching the first `{` at or after
/// `from`. Strings, character literals and comments are opaque to the
/// scan.
fn body_extent(src: &str, from: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut pos = from;
    let mut depth = 0usize;
    let mut opened = false;

    while pos < bytes.len() {
        match bytes[pos] {
            b'/' if pos + 1 < bytes.len() && bytes[pos + 1] == b'/' => {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
            }
            b'/' if pos + 1 < bytes.len() && bytes[pos + 1] == b'*' => {
                pos += 2;
                while pos + 1 < bytes.len() && !(bytes[pos] == b'*' && bytes[pos + 1] == b'/') {
                    pos += 1;
                }
                pos = (pos + 2).min(bytes.len());
            }
            quote @ (b'"' | b'\'') => {
                pos += 1;
                while pos < bytes.len() && bytes[pos] != quote {
                    if bytes[pos] == b'\\' {
                        pos += 1;
                    }
                    pos += 1;
                }
                pos += 1;
            }
            b'{' => {
                depth += 1;
                opened = true;
                pos += 1;
            }
            b'}' => {
                if opened {
                    depth -= 1;
                    if depth == 0 {
                        return Some(pos + 1);
                    }
                }
                pos += 1;
            }
            b';' if !opened => {
                // A prototype: no body to recover.
                return None;
            }
            _ => pos += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_extent_simple() {
        let src = "template<class T> void f(T t) { if (t) { g(); } }";
        assert_eq!(body_extent(src, 0), Some(src.len()));
    }

    #[test]
    fn test_body_extent_skips_braces_in_strings() {
        let src = r#"void f() { const char* s = "}"; }"#;
        assert_eq!(body_extent(src, 0), Some(src.len()));
    }

    #[test]
    fn test_body_extent_skips_comments() {
        let src = "void f() { /* } */ g(); // }\n}";
        assert_eq!(body_extent(src, 0), Some(src.len()));
    }

    #[test]
    fn test_body_extent_prototype() {
        let src = "void f(int x);";
        assert_eq!(body_extent(src, 0), None);
    }

    #[test]
    fn test_force_parse_widens_range() {
        use crate::decls::{DeclKind, NewDecl};

        let src = "template<class T> void f(T t) { t.x; } int main() { return 0; }";
        let tu = TranslationUnit::parse("a.cpp", src.to_string()).unwrap();
        let mut index = DeclIndex::new();
        // Simulate a truncated extent ending at the declarator.
        let id = index.register(NewDecl {
            kind: DeclKind::Function,
            name: "f".to_string(),
            qualified: "f".to_string(),
            range: (0, 29),
            name_loc: 23,
            name_node: 0,
            decl_end: 29,
            node: 1,
            parent: None,
            has_body: false,
            is_virtual: false,
            is_template: true,
            is_defaulted_or_deleted: false,
            is_operator: false,
        });

        let widened = force_parse_delayed(&tu, &mut index, &[id]);
        assert_eq!(widened, 1);
        assert_eq!(index.get(id).range, (0, 38));
        assert!(!tu.diagnostics_suppressed());
    }
}
