//! Root detection: which declarations seed reachability.
//!
//! Roots are `main`, declarations whose preceding raw comment contains the
//! literal marker `caide keep`, and namespace-scope variables of class
//! types with user-declared constructors or destructors (their
//! construction is observable behavior).

use tree_sitter::Node;

/// The literal opt-in marker recognized in raw comments.
pub const KEEP_MARKER: &str = "caide keep";

/// Comments separated from the declaration (or from each other) by more
/// than this many blank lines are not considered attached.
const MAX_COMMENT_GAP: usize = 1;

/// Whether a qualified declaration name is the program entry point.
pub fn is_main(qualified: &str) -> bool {
    qualified == "main"
}

/// Byte range of the raw comment block attached to a declaration node.
///
/// Walks preceding comment siblings upward while they stay adjacent; the
/// same adjacency is used for `caide keep` detection and for deleting a
/// removed declaration's comment.
pub fn attached_comment(node: Node, _source: &str) -> Option<(usize, usize)> {
    let mut expected_before_row = node.start_position().row;
    let mut first: Option<Node> = None;
    let mut last: Option<Node> = None;

    let mut sibling = node.prev_sibling();
    while let Some(s) = sibling {
        if s.kind() != "comment" {
            break;
        }
        let gap = expected_before_row.saturating_sub(s.end_position().row + 1);
        if gap > MAX_COMMENT_GAP {
            break;
        }
        if last.is_none() {
            last = Some(s);
        }
        first = Some(s);
        expected_before_row = s.start_position().row;
        sibling = s.prev_sibling();
    }

    match (first, last) {
        (Some(f), Some(l)) => Some((f.start_byte(), l.end_byte())),
        _ => None,
    }
}

/// Whether the declaration's attached comment pins it as a root.
pub fn has_keep_comment(node: Node, source: &str) -> bool {
    match attached_comment(node, source) {
        Some((start, end)) => source[start..end].contains(KEEP_MARKER),
        None => false,
    }
}
