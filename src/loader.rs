//! Peak-table loading
//!
//! Reads the tab-separated peak table exported by the genotyping software
//! (one row per detected fluorescence peak) into typed rows. Malformed rows
//! are skipped with a warning and counted per sample; rows without a marker
//! (size-standard peaks) are ignored silently.

use crate::AnalysisError;
use log::warn;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

const COL_SAMPLE: &str = "Sample File Name";
const COL_MARKER: &str = "Marker";
const COL_DYE: &str = "Dye/Sample Peak";
const COL_ALLELE: &str = "Allele";
const COL_SIZE: &str = "Size";
const COL_HEIGHT: &str = "Height";

/// One detected fluorescence peak, as loaded from the input table.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPeak {
    pub sample: String,
    pub marker: String,
    /// Dye channel letter, e.g. "B" for blue.
    pub dye: String,
    /// Allele designation, e.g. "15", "15.3", or "OL" for off-ladder.
    pub allele: String,
    /// Fragment size in base pairs.
    pub size: f64,
    /// Fluorescence peak height (RFU).
    pub height: f64,
}

/// A loaded peak table: usable rows plus per-sample skip counts.
#[derive(Debug, Clone, Default)]
pub struct PeakTable {
    pub rows: Vec<RawPeak>,
    pub skipped_rows: BTreeMap<String, usize>,
}

impl PeakTable {
    /// Sample names in order of first appearance in the table. Samples whose
    /// rows were all skipped still appear, so the caller can report them as
    /// failed instead of silently dropping them.
    pub fn sample_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self
            .rows
            .iter()
            .map(|r| r.sample.as_str())
            .chain(self.skipped_rows.keys().map(|s| s.as_str()))
        {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    pub fn rows_for_sample(&self, sample: &str) -> Vec<RawPeak> {
        self.rows
            .iter()
            .filter(|r| r.sample == sample)
            .cloned()
            .collect()
    }

    pub fn skipped_for(&self, sample: &str) -> usize {
        self.skipped_rows.get(sample).copied().unwrap_or(0)
    }
}

/// Read a tab-separated peak table from a file.
pub fn read_peak_table<P: AsRef<Path>>(path: P) -> Result<PeakTable, AnalysisError> {
    let file = std::fs::File::open(path)?;
    parse_peak_table(file)
}

/// Parse a tab-separated peak table from any reader.
pub fn parse_peak_table<R: Read>(input: R) -> Result<PeakTable, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(input);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let sample_idx = column_index(&headers, COL_SAMPLE)?;
    let marker_idx = column_index(&headers, COL_MARKER)?;
    let dye_idx = column_index(&headers, COL_DYE)?;
    let allele_idx = column_index(&headers, COL_ALLELE)?;
    let size_idx = column_index(&headers, COL_SIZE)?;
    let height_idx = column_index(&headers, COL_HEIGHT)?;

    let mut table = PeakTable::default();

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let sample = field(sample_idx);
        if sample.is_empty() {
            warn!("row {}: missing sample name, skipped", row_no + 1);
            continue;
        }

        // Size-standard peaks carry no marker; not an anomaly.
        let marker = field(marker_idx);
        if marker.is_empty() {
            continue;
        }

        let mut skip = |reason: &str| {
            warn!("row {} (sample '{}'): {}, skipped", row_no + 1, sample, reason);
            *table.skipped_rows.entry(sample.to_string()).or_insert(0) += 1;
        };

        let dye = extract_dye(field(dye_idx));
        let dye = match dye {
            Some(d) => d,
            None => {
                skip("missing dye");
                continue;
            }
        };

        let allele = field(allele_idx);
        if allele.is_empty() {
            skip("missing allele");
            continue;
        }

        let size: f64 = match field(size_idx).parse() {
            Ok(v) => v,
            Err(_) => {
                skip("non-numeric size");
                continue;
            }
        };
        let height: f64 = match field(height_idx).parse() {
            Ok(v) => v,
            Err(_) => {
                skip("non-numeric height");
                continue;
            }
        };

        table.rows.push(RawPeak {
            sample: sample.to_string(),
            marker: marker.to_string(),
            dye,
            allele: allele.to_string(),
            size,
            height,
        });
    }

    Ok(table)
}

fn column_index(headers: &[String], name: &'static str) -> Result<usize, AnalysisError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or(AnalysisError::MissingColumn(name))
}

/// The dye column holds `<dye>,<peak number>`, e.g. `"B,12"`, sometimes with
/// stray quotes from the export.
fn extract_dye(raw: &str) -> Option<String> {
    let dye = raw.split(',').next().unwrap_or("").trim_matches('"').trim();
    if dye.is_empty() {
        None
    } else {
        Some(dye.to_string())
    }
}
