//! Marker panel configuration
//!
//! Dye-specific height cutoffs, the STR marker table (genomic locus plus
//! repeat motif), and the panel processing order. The built-in tables cover
//! the standard 22-marker autosomal panel; an override file in the same JSON
//! shape can replace them per run.

use crate::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Min/max peak height window for one dye channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightLimits {
    pub min: f64,
    pub max: f64,
}

/// Expected per-marker height distribution, supplied via an override file.
/// When present, every called peak is scored against it in addition to the
/// per-sample baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightExpectation {
    pub median: f64,
    pub std: f64,
}

/// Static metadata for one STR marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerInfo {
    pub chr: String,
    pub start: u64,
    pub end: u64,
    pub motif: String,
    /// Expected dye channel for this marker, if pinned by the override file.
    /// Observed rows on a different dye are processed but logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dye: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<HeightExpectation>,
}

/// Per-run panel configuration, shared read-only across all samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub dye_cutoffs: BTreeMap<String, HeightLimits>,
    pub markers: BTreeMap<String, MarkerInfo>,
    pub marker_order: Vec<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        let dye_cutoffs = [
            ("B", 2500.0), // Blue
            ("G", 5000.0), // Green
            ("Y", 9000.0), // Yellow
            ("R", 1000.0), // Red
            ("P", 1000.0), // Purple
        ]
        .into_iter()
        .map(|(dye, min)| (dye.to_string(), HeightLimits { min, max: 50_000.0 }))
        .collect();

        let markers = builtin_markers();
        let marker_order = builtin_marker_order();

        Self {
            dye_cutoffs,
            markers,
            marker_order,
        }
    }
}

impl PanelConfig {
    /// Load a panel configuration override from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Height window for a dye channel, if configured.
    pub fn height_limits(&self, dye: &str) -> Option<HeightLimits> {
        self.dye_cutoffs.get(dye).copied()
    }

    pub fn marker(&self, name: &str) -> Option<&MarkerInfo> {
        self.markers.get(name)
    }

    pub fn is_configured(&self, name: &str) -> bool {
        self.markers.contains_key(name)
    }

    /// Repeat motif for a marker, if configured.
    pub fn motif(&self, name: &str) -> Option<&str> {
        self.markers.get(name).map(|m| m.motif.as_str())
    }

    /// Genomic locus key for a marker, e.g. `chr3_45540738_45540802`.
    pub fn locus_key(&self, name: &str) -> Option<String> {
        self.markers
            .get(name)
            .map(|m| format!("{}_{}_{}", m.chr, m.start, m.end))
    }

    /// Processing order for a set of observed markers: panel order first,
    /// then any unconfigured markers in name order.
    pub fn processing_order<'a>(&self, observed: &[&'a str]) -> Vec<&'a str> {
        let mut ordered: Vec<&str> = Vec::with_capacity(observed.len());
        for name in &self.marker_order {
            if let Some(found) = observed.iter().find(|m| **m == name.as_str()) {
                ordered.push(*found);
            }
        }
        let mut extras: Vec<&str> = observed
            .iter()
            .filter(|m| !self.marker_order.iter().any(|o| o.as_str() == **m))
            .copied()
            .collect();
        extras.sort_unstable();
        ordered.extend(extras);
        ordered
    }
}

fn builtin_marker_order() -> Vec<String> {
    [
        "D3S1358", "vWA", "D16S539", "CSF1PO", "TPOX", "D8S1179", "D21S11",
        "D18S51", "D2S441", "D19S433", "TH01", "FGA", "D22S1045", "D5S818",
        "D13S317", "D7S820", "SE33", "D10S1248", "D1S1656", "D12S391",
        "D2S1338", "AMEL",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn builtin_markers() -> BTreeMap<String, MarkerInfo> {
    let entries: [(&str, &str, u64, u64, &str); 22] = [
        ("CSF1PO", "chr5", 150076323, 150076375, "[ATCT]*"),
        ("D10S1248", "chr10", 129294243, 129294295, "[GGAA]*"),
        ("D12S391", "chr12", 12297019, 12297095, "[AGAT]+[AGAC]+AGAT"),
        ("D13S317", "chr13", 82148024, 82148068, "[TATC]*"),
        ("D16S539", "chr16", 86352701, 86352745, "[GATA]*"),
        ("D18S51", "chr18", 63281666, 63281738, "[AGAA]*"),
        ("D19S433", "chr19", 29926234, 29926298, "[CCTT]*cctaCCTTctttCCTT"),
        ("D1S1656", "chr1", 230769615, 230769683, "CCTA[TCTA]*"),
        (
            "D21S11",
            "chr21",
            19181972,
            19182099,
            "[TCTA]+[TCTG]+[TCTA]+ta[TCTA]+tca[TCTA]+tccata[TCTA]+",
        ),
        ("D22S1045", "chr22", 37140286, 37140337, "[ATT]+ACT[ATT]+"),
        (
            "D2S1338",
            "chr2",
            218014858,
            218014950,
            "[GGAA]+GGAC[GGAA]+[GGCA]+",
        ),
        ("D2S441", "chr2", 68011947, 68011994, "[TCTA]*"),
        ("D3S1358", "chr3", 45540738, 45540802, "TCTATCTG[TCTA]*"),
        ("D5S818", "chr5", 123775555, 123775599, "[ATCT]*"),
        ("D7S820", "chr7", 84160225, 84160277, "[TATC]*"),
        ("D8S1179", "chr8", 124894864, 124894916, "TCTATCTG[TCTA]*"),
        (
            "FGA",
            "chr4",
            154587735,
            154587823,
            "[GGAA]+GGAG[AAAG]+AGAAAAAA[GAAA]+",
        ),
        ("SE33", "chr6", 88277143, 88277245, "[CTTT]+TT[CTTT]+"),
        ("TH01", "chr11", 2171087, 2171115, "[AATG]*"),
        ("TPOX", "chr2", 1489652, 1489684, "[AATG]*"),
        ("vWA", "chr12", 5983976, 5984044, "[TAGA]*[CAGA]*TAGA"),
        ("AMEL", "chrX", 11293412, 11300761, "null"),
    ];

    entries
        .into_iter()
        .map(|(name, chr, start, end, motif)| {
            (
                name.to_string(),
                MarkerInfo {
                    chr: chr.to_string(),
                    start,
                    end,
                    motif: motif.to_string(),
                    dye: None,
                    expected: None,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_panel_covers_standard_markers() {
        let config = PanelConfig::default();
        assert_eq!(config.markers.len(), 22);
        assert_eq!(config.marker_order.len(), 22);
        assert!(config.is_configured("D3S1358"));
        assert!(config.is_configured("AMEL"));
        assert!(!config.is_configured("D6S1043"));
    }

    #[test]
    fn test_dye_cutoffs() {
        let config = PanelConfig::default();
        let blue = config.height_limits("B").unwrap();
        assert_eq!(blue.min, 2500.0);
        assert_eq!(blue.max, 50_000.0);
        let yellow = config.height_limits("Y").unwrap();
        assert_eq!(yellow.min, 9000.0);
        assert!(config.height_limits("X").is_none());
    }

    #[test]
    fn test_locus_key_and_motif() {
        let config = PanelConfig::default();
        assert_eq!(
            config.locus_key("D3S1358").as_deref(),
            Some("chr3_45540738_45540802")
        );
        assert_eq!(config.motif("TH01"), Some("[AATG]*"));
        assert!(config.locus_key("D6S1043").is_none());
    }

    #[test]
    fn test_processing_order_puts_panel_first() {
        let config = PanelConfig::default();
        let observed = vec!["D6S1043", "TH01", "D3S1358"];
        let ordered = config.processing_order(&observed);
        assert_eq!(ordered, vec!["D3S1358", "TH01", "D6S1043"]);
    }

    #[test]
    fn test_override_round_trip() {
        let json = r#"{
            "dye_cutoffs": {"B": {"min": 1500.0, "max": 30000.0}},
            "markers": {
                "D3S1358": {
                    "chr": "chr3", "start": 45540738, "end": 45540802,
                    "motif": "TCTATCTG[TCTA]*", "dye": "B",
                    "expected": {"median": 4000.0, "std": 800.0}
                }
            },
            "marker_order": ["D3S1358"]
        }"#;
        let config: PanelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.height_limits("B").unwrap().min, 1500.0);
        let marker = config.marker("D3S1358").unwrap();
        assert_eq!(marker.dye.as_deref(), Some("B"));
        assert_eq!(marker.expected.unwrap().median, 4000.0);
    }
}
