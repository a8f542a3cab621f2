//! Multi-sample run reporting module
//!
//! Aggregates per-sample analysis results into a run-level summary.

use crate::results::SampleResult;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_samples: usize,
    pub analyzed_samples: usize,
    pub failed_samples: Vec<String>,
    /// Samples with at least one contaminated marker.
    pub contaminated_samples: usize,
    /// Mean contamination rate over analyzed samples.
    pub mean_contamination_rate: f64,
    pub total_contaminated_markers: usize,
}

/// Run-level reporter.
pub struct RunReporter {
    /// A sample whose contamination rate exceeds this is counted as
    /// contaminated.
    pub contamination_rate_threshold: f64,
}

impl Default for RunReporter {
    fn default() -> Self {
        Self {
            contamination_rate_threshold: 0.0,
        }
    }
}

impl RunReporter {
    pub fn new(contamination_rate_threshold: f64) -> Self {
        Self {
            contamination_rate_threshold,
        }
    }

    /// Whether a sample is clean under the reporter's threshold.
    pub fn is_sample_clean(&self, sample: &SampleResult) -> bool {
        sample.sample_contamination.contamination_rate <= self.contamination_rate_threshold
    }

    /// Summarize a run: analyzed results plus the names of failed samples.
    pub fn generate_summary(
        &self,
        results: &[SampleResult],
        failed_samples: &[String],
    ) -> RunSummary {
        let analyzed_samples = results.len();
        let contaminated_samples = results
            .iter()
            .filter(|r| !self.is_sample_clean(r))
            .count();
        let mean_contamination_rate = if analyzed_samples > 0 {
            results
                .iter()
                .map(|r| r.sample_contamination.contamination_rate)
                .sum::<f64>()
                / analyzed_samples as f64
        } else {
            0.0
        };
        let total_contaminated_markers = results
            .iter()
            .map(|r| r.sample_contamination.total_contaminated_markers)
            .sum();

        RunSummary {
            total_samples: analyzed_samples + failed_samples.len(),
            analyzed_samples,
            failed_samples: failed_samples.to_vec(),
            contaminated_samples,
            mean_contamination_rate,
            total_contaminated_markers,
        }
    }

    /// Export a run summary to JSON.
    pub fn export_json<P: AsRef<Path>>(&self, summary: &RunSummary, path: P) -> Result<()> {
        let json_content = serde_json::to_string_pretty(summary)?;
        std::fs::write(path, json_content)?;
        Ok(())
    }
}
