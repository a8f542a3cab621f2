//! Per-sample analysis pipeline
//!
//! Runs one sample atomically through peak calling, contamination detection,
//! and result aggregation. A sample either yields a complete result or fails
//! as a whole; nothing partial is committed. No state carries over between
//! samples, so samples can be processed in any order with identical results.

use crate::calling::PeakCaller;
use crate::config::PanelConfig;
use crate::contamination::ContaminationDetector;
use crate::loader::RawPeak;
use crate::results::{generate_results, SampleResult};
use crate::AnalysisError;
use log::debug;
use std::collections::BTreeMap;

/// One-sample analysis pipeline with run-wide settings.
pub struct SampleAnalyzer {
    config: PanelConfig,
    caller: PeakCaller,
    detector: ContaminationDetector,
}

impl SampleAnalyzer {
    pub fn new(config: PanelConfig) -> Self {
        Self {
            config,
            caller: PeakCaller::default(),
            detector: ContaminationDetector::default(),
        }
    }

    pub fn with_caller(mut self, caller: PeakCaller) -> Self {
        self.caller = caller;
        self
    }

    pub fn with_detector(mut self, detector: ContaminationDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Analyze one sample's rows.
    ///
    /// `skipped_rows` is the count of malformed rows dropped while loading
    /// this sample; it is carried through into the result parameters.
    pub fn analyze(
        &self,
        sample_name: &str,
        rows: &[RawPeak],
        skipped_rows: usize,
    ) -> Result<SampleResult, AnalysisError> {
        if rows.is_empty() {
            return Err(AnalysisError::NoPeakRows {
                sample: sample_name.to_string(),
            });
        }

        let calls_by_marker = self.caller.call_peaks(&self.config, rows);
        if calls_by_marker.is_empty() {
            return Err(AnalysisError::NoPeakRows {
                sample: sample_name.to_string(),
            });
        }

        let mut contamination_by_marker = BTreeMap::new();
        for (marker, calls) in &calls_by_marker {
            let expected = self
                .config
                .marker(marker)
                .and_then(|m| m.expected.as_ref());
            let verdicts = self.detector.detect_contamination(calls, expected);
            if !verdicts.is_empty() {
                debug!(
                    "sample {}: marker {} flagged at {} position(s)",
                    sample_name,
                    marker,
                    verdicts.len()
                );
                contamination_by_marker.insert(marker.clone(), verdicts);
            }
        }

        let summary = self
            .detector
            .summarize_sample(&calls_by_marker, &contamination_by_marker);

        Ok(generate_results(
            &self.config,
            sample_name,
            &calls_by_marker,
            &contamination_by_marker,
            summary,
            skipped_rows,
            self.detector.ploidy,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contamination::Trigger;

    fn raw(sample: &str, marker: &str, dye: &str, allele: &str, size: f64, height: f64) -> RawPeak {
        RawPeak {
            sample: sample.to_string(),
            marker: marker.to_string(),
            dye: dye.to_string(),
            allele: allele.to_string(),
            size,
            height,
        }
    }

    #[test]
    fn test_empty_sample_is_fatal_for_that_sample() {
        let analyzer = SampleAnalyzer::new(PanelConfig::default());
        let err = analyzer.analyze("empty.fsa", &[], 0).unwrap_err();
        assert!(matches!(err, AnalysisError::NoPeakRows { .. }));
    }

    #[test]
    fn test_contaminated_sample_end_to_end() {
        let analyzer = SampleAnalyzer::new(PanelConfig::default());
        let rows = vec![
            raw("case01.fsa", "D3S1358", "B", "15", 120.5, 12_000.0),
            raw("case01.fsa", "D3S1358", "B", "16", 124.6, 13_000.0),
            raw("case01.fsa", "D3S1358", "B", "15.3", 122.1, 2600.0),
            raw("case01.fsa", "vWA", "G", "17", 160.3, 9000.0),
            raw("case01.fsa", "vWA", "G", "18", 164.4, 8700.0),
        ];
        let result = analyzer.analyze("case01.fsa", &rows, 1).unwrap();

        assert_eq!(result.sample_parameters.skipped_rows, 1);
        assert_eq!(result.sample_contamination.total_valid_markers, 2);
        assert_eq!(result.sample_contamination.total_contaminated_markers, 1);
        assert_eq!(result.sample_contamination.contamination_rate, 0.5);

        let info = result.locus_results["D3S1358"].variants["15.3"]
            .contamination
            .as_ref()
            .unwrap();
        assert!(info.triggers.contains(&Trigger::Ratio));
        assert!(result.locus_results["vWA"].variants["17"]
            .contamination
            .is_none());
    }

    #[test]
    fn test_analysis_is_deterministic_across_calls() {
        let analyzer = SampleAnalyzer::new(PanelConfig::default());
        let rows = vec![
            raw("case01.fsa", "D3S1358", "B", "15", 120.5, 3000.0),
            raw("case01.fsa", "D3S1358", "B", "16", 124.6, 3200.0),
            raw("case01.fsa", "TH01", "G", "9.3", 185.0, 8100.0),
        ];
        let first = analyzer.analyze("case01.fsa", &rows, 0).unwrap();
        let second = analyzer.analyze("case01.fsa", &rows, 0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_samples_do_not_affect_each_other() {
        // Same marker, wildly different heights per sample: the second
        // sample's baseline must be untouched by the first's.
        let analyzer = SampleAnalyzer::new(PanelConfig::default());
        let heavy = vec![
            raw("a.fsa", "D3S1358", "B", "15", 120.5, 40_000.0),
            raw("a.fsa", "D3S1358", "B", "16", 124.6, 41_000.0),
        ];
        let light = vec![
            raw("b.fsa", "D3S1358", "B", "14", 116.4, 3000.0),
            raw("b.fsa", "D3S1358", "B", "17", 128.7, 3100.0),
        ];
        let light_alone = analyzer.analyze("b.fsa", &light, 0).unwrap();
        analyzer.analyze("a.fsa", &heavy, 0).unwrap();
        let light_after = analyzer.analyze("b.fsa", &light, 0).unwrap();
        assert_eq!(light_alone, light_after);
    }
}
