//! Result aggregation module
//!
//! Pure merge of peak-calling and contamination outputs into the per-sample
//! result structure. Field names and nesting mirror the documented JSON
//! result schema consumed by downstream report and plot tooling; no
//! analytical decisions happen here.

use crate::calling::{CalledPeak, MarkerCalls};
use crate::config::{HeightLimits, PanelConfig};
use crate::contamination::{ContaminationInfo, SampleContamination};
use crate::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One distinct allele position retained within a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub genotype: String,
    pub allele_count: usize,
    pub motif: String,
    /// `None` means evaluated-and-clean or not evaluated (zero-peak edge
    /// case); a flagged position carries the full verdict.
    pub contamination: Option<ContaminationInfo>,
    pub peaks: Vec<CalledPeak>,
}

/// Per-marker result for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocusResult {
    pub allele_count: usize,
    pub median_height: Option<f64>,
    pub dye: String,
    pub std_height: Option<f64>,
    pub height_limits: HeightLimits,
    pub variants: BTreeMap<String, Variant>,
    /// Set when the marker had no panel configuration entry.
    #[serde(default)]
    pub unconfigured: bool,
    /// Genomic locus key, e.g. `chr3_45540738_45540802`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locus: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleParameters {
    #[serde(rename = "SampleId")]
    pub sample_id: String,
    pub sample_name: String,
    /// Malformed input rows skipped while loading this sample.
    pub skipped_rows: usize,
}

/// The top-level per-sample artifact, immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleResult {
    pub sample_name: String,
    #[serde(rename = "LocusResults")]
    pub locus_results: BTreeMap<String, LocusResult>,
    #[serde(rename = "SampleParameters")]
    pub sample_parameters: SampleParameters,
    #[serde(rename = "SampleContamination")]
    pub sample_contamination: SampleContamination,
}

impl SampleResult {
    /// Write the result as `<SampleId>.STR_analysis.json` into a directory.
    pub fn save<P: AsRef<Path>>(&self, output_dir: P) -> Result<PathBuf, AnalysisError> {
        let path = output_dir
            .as_ref()
            .join(format!("{}.STR_analysis.json", self.sample_parameters.sample_id));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

/// Merge calls and contamination verdicts into the final sample result.
///
/// Markers present in `calls_by_marker` but absent from
/// `contamination_by_marker` yield variants with `contamination: None`.
/// `ploidy` bounds how many alleles enter the genotype call.
pub fn generate_results(
    config: &PanelConfig,
    sample_name: &str,
    calls_by_marker: &BTreeMap<String, MarkerCalls>,
    contamination_by_marker: &BTreeMap<String, BTreeMap<String, ContaminationInfo>>,
    sample_contamination: SampleContamination,
    skipped_rows: usize,
    ploidy: usize,
) -> SampleResult {
    let mut locus_results = BTreeMap::new();

    for (marker, calls) in calls_by_marker {
        let verdicts = contamination_by_marker.get(marker);
        let genotype = genotype_call(&calls.peaks, ploidy);
        let motif = config.motif(marker).unwrap_or("unknown").to_string();

        let mut variants: BTreeMap<String, Variant> = BTreeMap::new();
        for peak in &calls.peaks {
            let variant = variants.entry(peak.allele.clone()).or_insert_with(|| Variant {
                genotype: genotype.clone(),
                allele_count: 0,
                motif: motif.clone(),
                contamination: verdicts
                    .and_then(|map| map.get(&peak.allele))
                    .cloned(),
                peaks: Vec::new(),
            });
            variant.allele_count += 1;
            variant.peaks.push(peak.clone());
        }

        locus_results.insert(
            marker.clone(),
            LocusResult {
                allele_count: variants.len(),
                median_height: calls.baseline.median_height,
                dye: calls.baseline.dye.clone(),
                std_height: calls.baseline.std_height,
                height_limits: HeightLimits {
                    min: calls.baseline.height_min,
                    max: calls.baseline.height_max,
                },
                variants,
                unconfigured: !config.is_configured(marker),
                locus: config.locus_key(marker),
            },
        );
    }

    SampleResult {
        sample_name: sample_name.to_string(),
        locus_results,
        sample_parameters: SampleParameters {
            sample_id: clean_sample_id(sample_name),
            sample_name: sample_name.to_string(),
            skipped_rows,
        },
        sample_contamination,
    }
}

/// Genotype from the top alleles by height: `15/16` for heterozygous calls,
/// the lone allele for homozygous ones.
fn genotype_call(peaks: &[CalledPeak], ploidy: usize) -> String {
    let mut top: Vec<&str> = peaks
        .iter()
        .take(ploidy.max(1))
        .map(|p| p.allele.as_str())
        .collect();
    top.sort_by(|a, b| match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        _ => a.cmp(b),
    });
    top.join("/")
}

/// Strip the instrument suffix and file extension from a sample file name.
fn clean_sample_id(sample_name: &str) -> String {
    let base = sample_name.split("_AC").next().unwrap_or(sample_name);
    base.split('.').next().unwrap_or(base).to_string()
}
