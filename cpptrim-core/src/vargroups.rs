//! Comma-group variable pruning.
//!
//! Variables are a special case because one declaration may declare many
//! comma-separated names (`int a, b, c;`), of which only some survive.
//! Removing a subset needs token-precise sub-ranges so the remaining
//! declarators stay well-formed.
//!
//! Runs after the optimizer visitor, over the groups the collector
//! recorded in document order.

use tracing::debug;

use crate::collect::{SourceInfo, StaticGroup};
use crate::decls::DeclIndex;
use crate::graph::UsageInfo;
use crate::parse::{find_semi_after, find_token_after};
use crate::rewrite::{RemoveOptions, SmartRewriter};

/// Delete unused variables from every recorded comma group. Returns the
/// number of variables removed.
pub fn remove_unused_variables(
    source: &str,
    index: &DeclIndex,
    info: &SourceInfo,
    usage: &UsageInfo,
    rewriter: &mut SmartRewriter,
) -> usize {
    let mut removed = 0;
    for group in info.static_variables.values() {
        removed += prune_group(source, index, usage, rewriter, group);
    }
    removed
}

fn prune_group(
    source: &str,
    index: &DeclIndex,
    usage: &UsageInfo,
    rewriter: &mut SmartRewriter,
    group: &StaticGroup,
) -> usize {
    let n = group.vars.len();
    let Some(&last_var) = group.vars.last() else {
        return 0;
    };
    let opts = RemoveOptions {
        remove_empty_lines: true,
    };

    let is_used: Vec<bool> = group
        .vars
        .iter()
        .map(|&v| usage.is_used(index, index.canonical(v)))
        .collect();
    // Index of the last used variable; `n` when none is used.
    let last_used = is_used.iter().rposition(|&u| u).unwrap_or(n);

    let last_var_end = index.get(last_var).decl_end;

    if last_used == n {
        // The whole group is unused. When the shared type specifier
        // defines a tag that must survive (`struct A { ... } a, b;`),
        // removal starts after the specifier and the semicolon stays.
        let keep_tag = group
            .inline_tag
            .map(|tag| usage.is_used(index, index.canonical(tag)))
            .unwrap_or(false);
        let accepted = if keep_tag {
            let end = find_semi_after(source, last_var_end).unwrap_or(group.end.saturating_sub(1));
            rewriter.remove_range(group.first_declarator, end, opts)
        } else {
            rewriter.remove_range(group.start, group.end, opts)
        };
        if accepted {
            debug!(start = group.start, vars = n, "removed whole variable group");
            return n;
        }
        return 0;
    }

    let mut removed = 0;
    for i in 0..last_used {
        if is_used[i] {
            continue;
        }
        let var = index.get(group.vars[i]);
        // From the variable's name through its initializer, extended to
        // the separating comma.
        let begin = var.name_loc;
        let mut end = var.decl_end;
        if i + 1 < n {
            if let Some(comma) = find_token_after(source, end, b',') {
                end = comma + 1;
            }
        }
        if rewriter.remove_range(begin, end, opts) {
            removed += 1;
        }
    }

    if last_used + 1 < n {
        // Clear all remaining variables, starting with the comma after
        // the last used one.
        let end_of_last_used = index.get(group.vars[last_used]).decl_end;
        if let Some(comma) = find_token_after(source, end_of_last_used, b',') {
            if rewriter.remove_range(comma, last_var_end, opts) {
                removed += n - (last_used + 1);
            }
        }
    }

    removed
}
