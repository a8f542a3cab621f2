//! Contamination detection module
//!
//! Scores called peaks against the marker's dominant allelic pattern using
//! two complementary signals:
//! - ratio heuristic: a candidate peak far below the weaker primary allele
//! - anomaly score: a pluggable statistical model, z-score by default
//!
//! A peak is reported contaminated if either signal fires; the verdict
//! records which trigger(s) fired plus the numeric evidence.

use crate::calling::{CalledPeak, MarkerBaseline, MarkerCalls};
use crate::config::HeightExpectation;
use crate::round2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which contamination signal fired for a peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Ratio,
    Score,
}

/// Verdict for one flagged allele position. Clean evaluated positions get no
/// entry at all; absence means clean or not evaluated, never `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminationInfo {
    pub is_contaminated: bool,
    pub triggers: Vec<Trigger>,
    /// Candidate height over the weaker primary allele height.
    pub ratio: Option<f64>,
    /// Anomaly score from the scoring model.
    pub score: Option<f64>,
}

/// Anomaly scoring strategy: peak plus baseline in, score out.
///
/// Returns `None` when the model cannot produce a score (for example, no
/// spread in the baseline); a missing score never fires the trigger.
pub trait PeakScorer: Send + Sync {
    fn score(&self, peak: &CalledPeak, baseline: &MarkerBaseline) -> Option<f64>;
}

/// Default scorer: z-score of the peak height against the marker baseline.
pub struct ZScoreScorer;

impl PeakScorer for ZScoreScorer {
    fn score(&self, peak: &CalledPeak, baseline: &MarkerBaseline) -> Option<f64> {
        z_score(peak.height, baseline.median_height?, baseline.std_height?)
    }
}

fn z_score(height: f64, center: f64, std: f64) -> Option<f64> {
    if std <= 0.0 {
        return None;
    }
    Some((height - center) / std)
}

/// One contaminated marker in the sample-level summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminatedMarker {
    pub marker: String,
    /// Primary alleles joined with `/`.
    pub main_profile: String,
    /// Flagged peaks as `allele(relative%)`, comma separated.
    pub contamination_peaks: String,
    /// Mean flagged height over mean primary height.
    pub relative_distance: f64,
}

/// Sample-level contamination summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleContamination {
    /// Contaminated markers over markers with at least one called allele.
    pub contamination_rate: f64,
    pub contaminated_markers: Vec<ContaminatedMarker>,
    pub total_valid_markers: usize,
    pub total_contaminated_markers: usize,
}

/// Contamination detector with run-wide settings.
pub struct ContaminationDetector {
    /// Expected number of primary alleles per marker.
    pub ploidy: usize,
    /// Candidate-to-weaker-primary height ratio below which the ratio
    /// trigger fires.
    pub ratio_threshold: f64,
    /// Absolute anomaly score above which the score trigger fires.
    pub score_cutoff: f64,
    scorer: Box<dyn PeakScorer>,
}

impl Default for ContaminationDetector {
    fn default() -> Self {
        Self {
            ploidy: 2,
            ratio_threshold: 0.3,
            score_cutoff: 3.0,
            scorer: Box::new(ZScoreScorer),
        }
    }
}

impl ContaminationDetector {
    pub fn new(ploidy: usize, ratio_threshold: f64, score_cutoff: f64) -> Self {
        Self {
            ploidy,
            ratio_threshold,
            score_cutoff,
            ..Self::default()
        }
    }

    /// Swap in a different anomaly scoring model.
    pub fn with_scorer(mut self, scorer: Box<dyn PeakScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Evaluate one marker's called peaks.
    ///
    /// Returns verdicts keyed by allele position, flagged peaks only.
    /// `expected` is the marker's configured height expectation, if any;
    /// when present, primaries (and therefore lone homozygous peaks) are
    /// scored against it as well.
    pub fn detect_contamination(
        &self,
        calls: &MarkerCalls,
        expected: Option<&HeightExpectation>,
    ) -> BTreeMap<String, ContaminationInfo> {
        let mut verdicts = BTreeMap::new();
        let peaks = &calls.peaks;
        let primary_count = self.primary_count(peaks);
        if primary_count == 0 {
            return verdicts;
        }
        let weaker_primary = peaks[primary_count - 1].height;

        for (rank, peak) in peaks.iter().enumerate() {
            let mut triggers = Vec::new();
            let mut ratio = None;
            let mut score = None;

            if rank >= self.ploidy {
                let r = round2(peak.height / weaker_primary);
                if r < self.ratio_threshold {
                    triggers.push(Trigger::Ratio);
                }
                ratio = Some(r);
                score = self.scorer.score(peak, &calls.baseline);
            }

            // Configured expectation covers every called peak, primaries
            // included.
            if score.is_none() {
                if let Some(exp) = expected {
                    score = z_score(peak.height, exp.median, exp.std);
                }
            }

            if let Some(z) = score {
                if z.abs() > self.score_cutoff {
                    triggers.push(Trigger::Score);
                }
            }

            if !triggers.is_empty() {
                verdicts.insert(
                    peak.allele.clone(),
                    ContaminationInfo {
                        is_contaminated: true,
                        triggers,
                        ratio,
                        score,
                    },
                );
            }
        }

        verdicts
    }

    /// Aggregate per-marker verdicts into the sample-level summary.
    ///
    /// Markers with zero called alleles are absent, not clean: they are
    /// excluded from the rate denominator.
    pub fn summarize_sample(
        &self,
        calls_by_marker: &BTreeMap<String, MarkerCalls>,
        contamination_by_marker: &BTreeMap<String, BTreeMap<String, ContaminationInfo>>,
    ) -> SampleContamination {
        let mut contaminated_markers = Vec::new();
        let mut total_valid_markers = 0;

        for (marker, calls) in calls_by_marker {
            if calls.baseline.allele_count == 0 {
                continue;
            }
            total_valid_markers += 1;

            let flagged = match contamination_by_marker.get(marker) {
                Some(verdicts) if !verdicts.is_empty() => verdicts,
                _ => continue,
            };
            contaminated_markers.push(self.contaminated_entry(marker, calls, flagged));
        }

        let total_contaminated_markers = contaminated_markers.len();
        let contamination_rate = if total_valid_markers > 0 {
            total_contaminated_markers as f64 / total_valid_markers as f64
        } else {
            0.0
        };

        SampleContamination {
            contamination_rate,
            contaminated_markers,
            total_valid_markers,
            total_contaminated_markers,
        }
    }

    fn contaminated_entry(
        &self,
        marker: &str,
        calls: &MarkerCalls,
        flagged: &BTreeMap<String, ContaminationInfo>,
    ) -> ContaminatedMarker {
        let primaries: Vec<&CalledPeak> = calls
            .peaks
            .iter()
            .take(self.primary_count(&calls.peaks))
            .filter(|p| !flagged.contains_key(&p.allele))
            .collect();
        let contaminants: Vec<&CalledPeak> = calls
            .peaks
            .iter()
            .filter(|p| flagged.contains_key(&p.allele))
            .collect();

        let main_profile = primaries
            .iter()
            .map(|p| p.allele.as_str())
            .collect::<Vec<_>>()
            .join("/");
        let contamination_peaks = contaminants
            .iter()
            .map(|p| format!("{}({:.1}%)", p.allele, p.relative_height))
            .collect::<Vec<_>>()
            .join(", ");
        let relative_distance = match (mean_height(&contaminants), mean_height(&primaries)) {
            (Some(contaminant), Some(primary)) if primary > 0.0 => round2(contaminant / primary),
            _ => 0.0,
        };

        ContaminatedMarker {
            marker: marker.to_string(),
            main_profile,
            contamination_peaks,
            relative_distance,
        }
    }

    fn primary_count(&self, peaks: &[CalledPeak]) -> usize {
        peaks.len().min(self.ploidy)
    }
}

fn mean_height(peaks: &[&CalledPeak]) -> Option<f64> {
    if peaks.is_empty() {
        return None;
    }
    Some(peaks.iter().map(|p| p.height).sum::<f64>() / peaks.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calling::{median, population_std};

    /// Build MarkerCalls directly: alleles with heights, tallest first.
    fn marker_calls(
        marker: &str,
        specs: &[(&str, f64)],
        height_min: f64,
        height_max: f64,
    ) -> MarkerCalls {
        let mut peaks: Vec<CalledPeak> = specs
            .iter()
            .map(|(allele, height)| CalledPeak {
                allele: allele.to_string(),
                height: *height,
                size: 120.0,
                relative_height: 0.0,
            })
            .collect();
        peaks.sort_by(|a, b| b.height.total_cmp(&a.height));
        let top = peaks[0].height;
        for peak in &mut peaks {
            peak.relative_height = crate::round2(peak.height / top * 100.0);
        }
        let heights: Vec<f64> = peaks.iter().map(|p| p.height).collect();
        MarkerCalls {
            baseline: MarkerBaseline {
                marker: marker.to_string(),
                dye: "B".to_string(),
                median_height: median(&heights),
                std_height: population_std(&heights),
                height_min,
                height_max,
                allele_count: peaks.len(),
            },
            peaks,
        }
    }

    #[test]
    fn test_two_clean_peaks_no_verdicts() {
        let calls = marker_calls("D3S1358", &[("15", 3000.0), ("16", 3200.0)], 200.0, 20_000.0);
        let verdicts = ContaminationDetector::default().detect_contamination(&calls, None);
        assert!(verdicts.is_empty());
    }

    #[test]
    fn test_low_third_peak_fires_ratio_trigger() {
        let calls = marker_calls(
            "D3S1358",
            &[("15", 3000.0), ("16", 3200.0), ("15.3", 150.0)],
            200.0,
            20_000.0,
        );
        let verdicts = ContaminationDetector::default().detect_contamination(&calls, None);
        assert_eq!(verdicts.len(), 1);
        let info = &verdicts["15.3"];
        assert!(info.is_contaminated);
        assert_eq!(info.triggers, vec![Trigger::Ratio]);
        assert_eq!(info.ratio, Some(0.05));
        // z-score evidence is recorded even though it did not fire
        assert!(info.score.is_some());
    }

    #[test]
    fn test_strong_minor_allele_is_not_flagged() {
        // A genuine tri-allelic pattern: third peak at half the weaker
        // primary clears the ratio threshold.
        let calls = marker_calls(
            "TPOX",
            &[("8", 3000.0), ("9", 3200.0), ("11", 1500.0)],
            200.0,
            20_000.0,
        );
        let verdicts = ContaminationDetector::default().detect_contamination(&calls, None);
        assert!(verdicts.is_empty());
    }

    #[test]
    fn test_custom_scorer_fires_score_trigger() {
        struct AlwaysAnomalous;
        impl PeakScorer for AlwaysAnomalous {
            fn score(&self, _: &CalledPeak, _: &MarkerBaseline) -> Option<f64> {
                Some(5.0)
            }
        }
        let calls = marker_calls(
            "TPOX",
            &[("8", 3000.0), ("9", 3200.0), ("11", 1500.0)],
            200.0,
            20_000.0,
        );
        let detector =
            ContaminationDetector::default().with_scorer(Box::new(AlwaysAnomalous));
        let verdicts = detector.detect_contamination(&calls, None);
        let info = &verdicts["11"];
        assert_eq!(info.triggers, vec![Trigger::Score]);
        assert_eq!(info.ratio, Some(0.5));
        assert_eq!(info.score, Some(5.0));
    }

    #[test]
    fn test_expected_baseline_flags_lone_peak() {
        // Homozygous marker, but far above the configured expectation.
        let calls = marker_calls("TH01", &[("9.3", 9000.0)], 200.0, 20_000.0);
        let expected = HeightExpectation {
            median: 3000.0,
            std: 500.0,
        };
        let verdicts =
            ContaminationDetector::default().detect_contamination(&calls, Some(&expected));
        let info = &verdicts["9.3"];
        assert_eq!(info.triggers, vec![Trigger::Score]);
        assert_eq!(info.score, Some(12.0));
        assert_eq!(info.ratio, None);
    }

    #[test]
    fn test_empty_marker_yields_no_verdicts() {
        let calls = MarkerCalls {
            baseline: MarkerBaseline {
                marker: "FGA".to_string(),
                dye: "B".to_string(),
                median_height: None,
                std_height: None,
                height_min: 2500.0,
                height_max: 50_000.0,
                allele_count: 0,
            },
            peaks: Vec::new(),
        };
        let verdicts = ContaminationDetector::default().detect_contamination(&calls, None);
        assert!(verdicts.is_empty());
    }

    #[test]
    fn test_sample_summary_counts_and_rate() {
        let detector = ContaminationDetector::default();
        let mut calls_by_marker = BTreeMap::new();
        calls_by_marker.insert(
            "D3S1358".to_string(),
            marker_calls(
                "D3S1358",
                &[("15", 3000.0), ("16", 3200.0), ("15.3", 150.0)],
                200.0,
                20_000.0,
            ),
        );
        calls_by_marker.insert(
            "TH01".to_string(),
            marker_calls("TH01", &[("6", 6000.0), ("9.3", 5800.0)], 200.0, 20_000.0),
        );
        // Saturated marker: zero calls, excluded from the denominator.
        calls_by_marker.insert(
            "FGA".to_string(),
            MarkerCalls {
                baseline: MarkerBaseline {
                    marker: "FGA".to_string(),
                    dye: "B".to_string(),
                    median_height: None,
                    std_height: None,
                    height_min: 2500.0,
                    height_max: 50_000.0,
                    allele_count: 0,
                },
                peaks: Vec::new(),
            },
        );

        let mut contamination_by_marker = BTreeMap::new();
        contamination_by_marker.insert(
            "D3S1358".to_string(),
            detector.detect_contamination(&calls_by_marker["D3S1358"], None),
        );

        let summary = detector.summarize_sample(&calls_by_marker, &contamination_by_marker);
        assert_eq!(summary.total_valid_markers, 2);
        assert_eq!(summary.total_contaminated_markers, 1);
        assert_eq!(summary.contamination_rate, 0.5);

        let entry = &summary.contaminated_markers[0];
        assert_eq!(entry.marker, "D3S1358");
        assert_eq!(entry.main_profile, "16/15");
        assert_eq!(entry.contamination_peaks, "15.3(4.7%)");
        assert_eq!(entry.relative_distance, 0.05);
    }

    #[test]
    fn test_no_valid_markers_means_zero_rate() {
        let detector = ContaminationDetector::default();
        let summary = detector.summarize_sample(&BTreeMap::new(), &BTreeMap::new());
        assert_eq!(summary.contamination_rate, 0.0);
        assert_eq!(summary.total_valid_markers, 0);
    }
}
