//! cpptrim-core: unused-declaration elimination for single-file C++.
//!
//! The second stage of a competitive-programming source inliner: given a
//! self-contained translation unit (the first stage already concatenated
//! library headers and the solution), emit an equivalent translation unit
//! with all unused declarations and inactive preprocessor regions
//! removed, so that `main()` and anything pinned with a `/// caide keep`
//! comment still compile and behave identically.
//!
//! # Pipeline
//!
//! 1. [`parse`]: front-end driver (tree-sitter C++ grammar)
//! 2. [`preproc`]: inactive `#if`/`#ifdef` region analysis and removal
//! 3. [`collect`]: declaration index + dependency graph between declarations
//! 4. [`late_parse`]: forced extents for delayed-parse template bodies
//! 5. [`graph`]: reachability from the root set (`main`, pinned decls)
//! 6. [`fix`]: optimizer visitor deleting unreachable declarations
//! 7. [`vargroups`]: token-precise pruning of `int a, b, c;` groups
//! 8. [`rewrite`]: overlap-rejecting edit buffer, applied once
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cpptrim_core::prelude::*;
//!
//! let rewritten = Optimizer::new(compile_flags, keep_macros)
//!     .optimize(Path::new("inlined.cpp"))?;
//! ```

pub mod builder;
pub mod collect;
pub mod config;
pub mod decls;
pub mod error;
pub mod fix;
pub mod graph;
pub mod late_parse;
pub mod logging;
pub mod parse;
pub mod preproc;
pub mod prelude;
pub mod report;
pub mod rewrite;
pub mod root;
pub mod vargroups;

// Error types
pub use error::{CpptrimError, CpptrimResult, IoResultExt};

// Entry points
pub use builder::{optimize, Optimizer};

// Front-end
pub use parse::{CompileOptions, MacroArg, TranslationUnit};

// Data model
pub use collect::{collect, SourceInfo, StaticGroup};
pub use decls::{DeclId, DeclIndex, DeclKind};

// Preprocessor
pub use preproc::{analyze as analyze_preprocessor, MacroTable, PreprocAnalysis};

// Reachability
pub use graph::{build_graph, reachable_from_roots, UsageInfo};

// Deletion
pub use fix::{remove_unused_decls, RemovalStats};
pub use late_parse::force_parse_delayed;
pub use rewrite::{RemoveOptions, SmartRewriter};
pub use vargroups::remove_unused_variables;

// Roots
pub use root::{attached_comment, has_keep_comment, KEEP_MARKER};

// Configuration and reporting
pub use config::{load_config, CpptrimConfig, OutputConfig};
pub use logging::{init_structured_logging, log_error, log_info, log_warn};
pub use report::{print_json, print_plain, TrimReport};

#[cfg(test)]
mod tests;
