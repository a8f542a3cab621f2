//! STR QC Tools
//!
//! Fast QC and contamination screening for forensic STR capillary
//! electrophoresis peak tables.
//!
//! This library provides shared functionality for:
//! - Peak calling with dye-specific height thresholds
//! - Contamination detection (ratio heuristic + anomaly scoring)
//! - Per-sample result aggregation into the JSON result schema
//! - Multi-sample run reporting

pub mod calling;
pub mod config;
pub mod contamination;
pub mod loader;
pub mod pipeline;
pub mod reporting;
pub mod results;

use thiserror::Error;

/// Errors surfaced by the analysis library.
///
/// Row-level and marker-level anomalies are absorbed into output fields and
/// never appear here; only structural failures do.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The sample had no usable peak rows at all. Fatal for the sample,
    /// never for the run.
    #[error("sample '{sample}' produced no usable peak rows")]
    NoPeakRows { sample: String },

    /// The peak table is missing one of the required columns.
    #[error("peak table is missing required column '{0}'")]
    MissingColumn(&'static str),

    /// The peak table could not be read.
    #[error("failed to read peak table: {0}")]
    Table(#[from] csv::Error),

    /// The panel configuration override could not be parsed.
    #[error("invalid panel configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Round to two decimals, matching the precision used in result output.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
