//! The optimizer pipeline and its fluent configuration API.
//!
//! ```rust,ignore
//! use cpptrim_core::prelude::*;
//!
//! let rewritten = Optimizer::new(
//!     vec!["-std=c++17".into(), "-DONLINE_JUDGE".into()],
//!     vec!["ONLINE_JUDGE".into()],
//! )
//! .optimize(Path::new("solution.cpp"))?;
//! ```
//!
//! Stages run strictly in program order: front-end, preprocessor
//! analysis, dependencies collection, late-template forcing,
//! reachability, optimizer visitor, comma-group pruning, preprocessor
//! finalize, and a single `apply_changes` at the end.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::collect;
use crate::error::{CpptrimResult, IoResultExt};
use crate::fix;
use crate::graph;
use crate::late_parse;
use crate::parse::{CompileOptions, TranslationUnit};
use crate::preproc;
use crate::report::TrimReport;
use crate::rewrite::SmartRewriter;
use crate::vargroups;

/// Second inliner stage: remove unused code from one translation unit.
#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    compile_options: Vec<String>,
    macros_to_keep: HashSet<String>,
}

impl Optimizer {
    /// Create an optimizer with compile-driver tokens and a set of macro
    /// names whose inactive conditional blocks must be preserved.
    pub fn new(compile_options: Vec<String>, macros_to_keep: Vec<String>) -> Self {
        Self {
            compile_options,
            macros_to_keep: macros_to_keep.into_iter().collect(),
        }
    }

    /// Add one compile-driver token.
    pub fn compile_flag(mut self, flag: impl Into<String>) -> Self {
        self.compile_options.push(flag.into());
        self
    }

    /// Add one macro to the keep list.
    pub fn keep_macro(mut self, name: impl Into<String>) -> Self {
        self.macros_to_keep.insert(name.into());
        self
    }

    /// Optimize a file on disk; returns the rewritten source text.
    pub fn optimize(&self, cpp_file: &Path) -> CpptrimResult<String> {
        let source = fs::read_to_string(cpp_file).with_path(cpp_file)?;
        let (result, _) = self.optimize_source_with_report(cpp_file, &source)?;
        Ok(result)
    }

    /// Optimize a file on disk, also returning the trim report.
    pub fn optimize_with_report(&self, cpp_file: &Path) -> CpptrimResult<(String, TrimReport)> {
        let source = fs::read_to_string(cpp_file).with_path(cpp_file)?;
        self.optimize_source_with_report(cpp_file, &source)
    }

    /// Optimize an in-memory buffer; `name` is used in diagnostics only.
    pub fn optimize_source(&self, name: impl AsRef<Path>, source: &str) -> CpptrimResult<String> {
        let (result, _) = self.optimize_source_with_report(name, source)?;
        Ok(result)
    }

    /// Run the full pipeline over an in-memory buffer.
    pub fn optimize_source_with_report(
        &self,
        name: impl AsRef<Path>,
        source: &str,
    ) -> CpptrimResult<(String, TrimReport)> {
        // 1. Front-end: parse the translation unit.
        let tu = TranslationUnit::parse(name.as_ref(), source.to_string())?;

        // 2. Preprocessor: rule out inactive conditional regions.
        let options = CompileOptions::parse(&self.compile_options);
        let preproc_info = preproc::analyze(&tu, &options, &self.macros_to_keep);

        // 3. Dependencies collector: declaration index + uses graph.
        let (mut index, info) = collect::collect(&tu, &preproc_info);

        // 4. Late-template forcer: recover truncated template extents.
        late_parse::force_parse_delayed(&tu, &mut index, &info.delayed_parsed_functions);

        // 5. Reachability from the root set.
        let g = graph::build_graph(&info, &index);
        let usage = graph::reachable_from_roots(&g, &info, &index);
        debug!(
            decls = index.len(),
            used = usage.used_count(),
            "reachability finished"
        );

        // 6-8. Deletions: optimizer visitor, comma groups, preprocessor.
        let mut rewriter = SmartRewriter::new(&tu.source);
        let mut stats = fix::remove_unused_decls(&tu, &index, &usage, &preproc_info, &mut rewriter);
        stats.variables =
            vargroups::remove_unused_variables(&tu.source, &index, &info, &usage, &mut rewriter);
        stats.preproc_blocks = preproc_info.finalize(&mut rewriter);

        // 9. One coherent edit set.
        rewriter.apply_changes();
        let result = rewriter.result().to_string();

        let report = TrimReport {
            input_bytes: source.len(),
            output_bytes: result.len(),
            removed: stats,
        };
        Ok((result, report))
    }
}

/// One-shot entry point: `optimize(sourceFile, compileOptions,
/// macrosToKeep) -> rewrittenSource`.
pub fn optimize(
    source_file: &Path,
    compile_options: &[String],
    macros_to_keep: &[String],
) -> CpptrimResult<String> {
    Optimizer::new(compile_options.to_vec(), macros_to_keep.to_vec()).optimize(source_file)
}
