//! SmartRewriter: a deduplicating edit buffer over the original source.
//!
//! Accepts remove-range requests, rejects ranges that overlap previously
//! accepted ones, and flushes a single coherent edit set at the end. The
//! optimizer visitor and the preprocessor-block remover write to the same
//! instance, so their edit streams deconflict automatically.
//!
//! Edits compose in one deterministic sweep over the original buffer:
//! accepted ranges are kept sorted by start offset, and `apply_changes`
//! walks the buffer line by line, dropping lines that a removal left
//! whitespace-only (when the removal asked for it).

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// Options attached to a single removal.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    /// Drop the line entirely if the removal leaves it whitespace-only.
    pub remove_empty_lines: bool,
}

#[derive(Debug, Clone, Copy)]
struct RewriteItem {
    start: usize,
    end: usize,
    opts: RemoveOptions,
}

/// Buffered, overlap-rejecting text deleter.
pub struct SmartRewriter<'src> {
    source: &'src str,
    /// Accepted removals, keyed by start offset. Pairwise non-overlapping.
    removed: BTreeMap<usize, RewriteItem>,
    applied: Option<String>,
}

impl<'src> SmartRewriter<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            removed: BTreeMap::new(),
            applied: None,
        }
    }

    /// True iff no previously accepted range overlaps `[start, end)`.
    pub fn can_remove_range(&self, start: usize, end: usize) -> bool {
        if start >= end || end > self.source.len() {
            return false;
        }
        // The only candidate for overlap is the accepted range with the
        // greatest start offset below `end`.
        match self.removed.range(..end).next_back() {
            Some((_, item)) => item.end <= start,
            None => true,
        }
    }

    /// Record a removal if it does not conflict; returns whether it was
    /// accepted. Rejected requests are a no-op.
    pub fn remove_range(&mut self, start: usize, end: usize, opts: RemoveOptions) -> bool {
        if self.applied.is_some() || !self.can_remove_range(start, end) {
            debug!(start, end, "removal rejected");
            return false;
        }
        debug!(start, end, "removal accepted");
        self.removed.insert(start, RewriteItem { start, end, opts });
        true
    }

    /// Number of accepted removals.
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// Execute all accepted removals. Idempotent.
    pub fn apply_changes(&mut self) {
        if self.applied.is_some() || self.removed.is_empty() {
            return;
        }

        let src = self.source;
        let cuts: Vec<RewriteItem> = self.removed.values().copied().collect();
        let mut out = String::with_capacity(src.len());

        let mut idx = 0;
        let mut line_start = 0;
        while line_start < src.len() {
            let line_end = src[line_start..]
                .find('\n')
                .map(|i| line_start + i + 1)
                .unwrap_or(src.len());

            while idx < cuts.len() && cuts[idx].end <= line_start {
                idx += 1;
            }

            let mut surviving = String::new();
            let mut seg_start = line_start;
            let mut cut_here = false;
            let mut drop_if_empty = false;
            let mut j = idx;
            while j < cuts.len() && cuts[j].start < line_end {
                let cut = cuts[j];
                if cut.end > line_start {
                    if cut.start > seg_start {
                        surviving.push_str(&src[seg_start..cut.start.min(line_end)]);
                    }
                    seg_start = seg_start.max(cut.end.min(line_end));
                    cut_here = true;
                    drop_if_empty |= cut.opts.remove_empty_lines;
                }
                j += 1;
            }
            if seg_start < line_end {
                surviving.push_str(&src[seg_start..line_end]);
            }

            if !(cut_here && drop_if_empty && surviving.trim().is_empty()) {
                out.push_str(&surviving);
            }
            line_start = line_end;
        }

        self.applied = Some(collapse_blank_runs(&out));
    }

    /// The edited buffer, or `None` if no edits were applied.
    pub fn rewrite_buffer(&self) -> Option<&str> {
        self.applied.as_deref()
    }

    /// The edited buffer, falling back to the original when nothing
    /// changed.
    pub fn result(&self) -> &str {
        self.applied.as_deref().unwrap_or(self.source)
    }
}

/// Pre-compiled regex for collapsing consecutive blank lines left behind
/// by removals.
fn blank_line_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\n[ \t]*\n[ \t]*\n").expect("Hardcoded regex pattern is valid"))
}

fn collapse_blank_runs(text: &str) -> String {
    let regex = blank_line_regex();
    let mut result = text.to_string();
    while regex.is_match(&result) {
        result = regex.replace_all(&result, "\n\n").to_string();
    }
    result
}
