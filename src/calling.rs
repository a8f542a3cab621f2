//! Peak calling module
//!
//! Turns one sample's raw peak rows into called peaks per marker:
//! - groups rows by marker
//! - discards saturated peaks above the global height ceiling before any
//!   statistics are computed
//! - applies the dye-specific height window
//! - keeps only peaks at a minimum relative height of the tallest peak
//! - derives the per-marker statistical baseline (median/std, dye limits)

use crate::config::{HeightLimits, PanelConfig};
use crate::loader::RawPeak;
use crate::round2;
use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use statrs::statistics::{Data, Median, Statistics};

/// A peak accepted as genuine allele signal for its marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalledPeak {
    pub allele: String,
    pub height: f64,
    pub size: f64,
    /// Height as a percentage of the marker's tallest called peak.
    pub relative_height: f64,
}

/// Per-marker statistical baseline derived from one sample's called peaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerBaseline {
    pub marker: String,
    pub dye: String,
    /// `None` when no peak survived filtering.
    pub median_height: Option<f64>,
    /// Population standard deviation; `None` with fewer than two peaks.
    pub std_height: Option<f64>,
    pub height_min: f64,
    pub height_max: f64,
    pub allele_count: usize,
}

/// Called peaks plus baseline for one marker, peaks ordered by height
/// descending.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerCalls {
    pub baseline: MarkerBaseline,
    pub peaks: Vec<CalledPeak>,
}

impl MarkerCalls {
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

/// Off-ladder allele designation; such rows are never called.
const OFF_LADDER: &str = "OL";

/// Peak caller with run-wide settings.
pub struct PeakCaller {
    /// Global hard ceiling; peaks above it are treated as saturation
    /// artifacts and dropped before statistics.
    pub max_height: f64,
    /// Minimum height as a percentage of the tallest surviving peak.
    pub min_relative_height: f64,
}

impl Default for PeakCaller {
    fn default() -> Self {
        Self {
            max_height: 50_000.0,
            min_relative_height: 10.0,
        }
    }
}

impl PeakCaller {
    pub fn new(max_height: f64, min_relative_height: f64) -> Self {
        Self {
            max_height,
            min_relative_height,
        }
    }

    /// Call peaks for all markers in one sample's rows.
    ///
    /// Every marker with at least one raw row gets an entry; markers where
    /// nothing survives filtering keep an empty peak list with
    /// `allele_count == 0`.
    pub fn call_peaks(
        &self,
        config: &PanelConfig,
        rows: &[RawPeak],
    ) -> BTreeMap<String, MarkerCalls> {
        let is_neg_control = rows.first().map(|r| r.sample.contains("NEG")).unwrap_or(false);

        let by_marker: BTreeMap<&str, Vec<&RawPeak>> = rows
            .iter()
            .map(|p| (p.marker.as_str(), p))
            .into_group_map()
            .into_iter()
            .collect();

        let observed: Vec<&str> = by_marker.keys().copied().collect();
        let mut calls = BTreeMap::new();

        for marker in config.processing_order(&observed) {
            let peaks = &by_marker[marker];
            let marker_calls = self.call_marker(config, marker, peaks, is_neg_control);
            debug!(
                "marker {}: {} of {} peaks called",
                marker,
                marker_calls.peaks.len(),
                peaks.len()
            );
            calls.insert(marker.to_string(), marker_calls);
        }

        calls
    }

    fn call_marker(
        &self,
        config: &PanelConfig,
        marker: &str,
        rows: &[&RawPeak],
        is_neg_control: bool,
    ) -> MarkerCalls {
        let dye = rows.first().map(|r| r.dye.clone()).unwrap_or_default();

        if let Some(expected_dye) = config.marker(marker).and_then(|m| m.dye.as_deref()) {
            if expected_dye != dye {
                warn!(
                    "marker {}: observed dye '{}' differs from configured '{}'",
                    marker, dye, expected_dye
                );
            }
        }

        // Saturation cap comes first so capped peaks never distort the
        // baseline statistics.
        let mut candidates: Vec<&RawPeak> = rows
            .iter()
            .filter(|p| p.allele != OFF_LADDER && p.height <= self.max_height)
            .copied()
            .collect();
        candidates.sort_by(|a, b| b.height.total_cmp(&a.height));

        let limits = match config.height_limits(&dye) {
            Some(l) => l,
            // Unknown dye channel: fall back to thresholds derived from the
            // observed data.
            None => self.data_derived_limits(&candidates),
        };

        let min_passed: Vec<&RawPeak> = candidates
            .iter()
            .filter(|p| p.height >= limits.min)
            .copied()
            .collect();

        // The dye maximum is waived for a lone surviving peak and for
        // negative controls; the global cap has already been applied.
        let windowed: Vec<&RawPeak> = if min_passed.len() == 1 || is_neg_control {
            min_passed
        } else {
            min_passed
                .into_iter()
                .filter(|p| p.height <= limits.max)
                .collect()
        };

        let called: Vec<CalledPeak> = match windowed.first() {
            Some(tallest) => {
                let top = tallest.height;
                windowed
                    .iter()
                    .map(|p| CalledPeak {
                        allele: p.allele.clone(),
                        height: p.height,
                        size: p.size,
                        relative_height: round2(p.height / top * 100.0),
                    })
                    .filter(|p| p.relative_height >= self.min_relative_height)
                    .collect()
            }
            None => Vec::new(),
        };

        let heights: Vec<f64> = called.iter().map(|p| p.height).collect();
        let baseline = MarkerBaseline {
            marker: marker.to_string(),
            dye,
            median_height: median(&heights),
            std_height: population_std(&heights),
            height_min: limits.min,
            height_max: limits.max,
            allele_count: called.len(),
        };

        MarkerCalls {
            baseline,
            peaks: called,
        }
    }

    /// Thresholds for a dye channel with no configured cutoffs: floor at 10%
    /// of the tallest observed height, ceiling at the global cap.
    fn data_derived_limits(&self, candidates: &[&RawPeak]) -> HeightLimits {
        let tallest = candidates.first().map(|p| p.height).unwrap_or(0.0);
        HeightLimits {
            min: tallest * 0.1,
            max: self.max_height,
        }
    }
}

/// Median of a height set; `None` when empty.
pub fn median(heights: &[f64]) -> Option<f64> {
    if heights.is_empty() {
        return None;
    }
    Some(Data::new(heights.to_vec()).median())
}

/// Population standard deviation; `None` with fewer than two values.
pub fn population_std(heights: &[f64]) -> Option<f64> {
    if heights.len() < 2 {
        return None;
    }
    Some(heights.iter().population_std_dev())
}
