//! Trim report formatting - plaintext and JSON.
//!
//! Reports go to stderr: stdout carries the rewritten source.

use serde::Serialize;
use serde_json::json;

use crate::fix::RemovalStats;

/// Summary of one optimization run.
#[derive(Debug, Clone, Serialize)]
pub struct TrimReport {
    pub input_bytes: usize,
    pub output_bytes: usize,
    pub removed: RemovalStats,
}

impl TrimReport {
    /// How much of the input was removed, in percent.
    pub fn shrink_percentage(&self) -> f64 {
        if self.input_bytes == 0 {
            0.0
        } else {
            let removed = self.input_bytes.saturating_sub(self.output_bytes);
            (removed as f64 / self.input_bytes as f64) * 100.0
        }
    }
}

/// Prints the report in plain text format.
pub fn print_plain(report: &TrimReport) {
    eprintln!(
        "cpptrim: {} -> {} bytes ({:.1}% removed)",
        report.input_bytes,
        report.output_bytes,
        report.shrink_percentage()
    );
    eprintln!(
        "removed: {} functions, {} records, {} typedefs, {} namespaces, \
         {} using-directives, {} variables, {} preprocessor blocks",
        report.removed.functions,
        report.removed.records,
        report.removed.typedefs,
        report.removed.namespaces,
        report.removed.using_directives,
        report.removed.variables,
        report.removed.preproc_blocks,
    );
}

/// Prints the report in JSON format.
pub fn print_json(report: &TrimReport) {
    match serde_json::to_string_pretty(&json!(report)) {
        Ok(json) => eprintln!("{}", json),
        Err(e) => {
            eprintln!("[WARN] JSON serialization failed: {}", e);
            print_plain(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shrink_percentage() {
        let report = TrimReport {
            input_bytes: 200,
            output_bytes: 50,
            removed: RemovalStats::default(),
        };
        assert!((report.shrink_percentage() - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_shrink_percentage_empty_input() {
        let report = TrimReport {
            input_bytes: 0,
            output_bytes: 0,
            removed: RemovalStats::default(),
        };
        assert_eq!(report.shrink_percentage(), 0.0);
    }

    #[test]
    fn test_report_serializes() {
        let report = TrimReport {
            input_bytes: 10,
            output_bytes: 5,
            removed: RemovalStats::default(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["input_bytes"], 10);
        assert!(value["removed"]["functions"].is_u64());
    }
}
