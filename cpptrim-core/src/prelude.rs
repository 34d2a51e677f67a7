//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use cpptrim_core::prelude::*;
//! ```

// Core types
pub use crate::error::{CpptrimError, CpptrimResult};

// Entry points
pub use crate::builder::{optimize, Optimizer};

// Front-end
pub use crate::parse::{CompileOptions, TranslationUnit};

// Reachability
pub use crate::graph::{build_graph, reachable_from_roots, UsageInfo};

// Configuration
pub use crate::config::{load_config, CpptrimConfig};

// Reporting
pub use crate::report::{print_json, print_plain, TrimReport};
