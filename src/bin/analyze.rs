//! STR Analysis Tool
//!
//! Full per-sample pipeline over a tab-separated peak-table export:
//! peak calling, contamination detection, and JSON result output.

use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use str_qc_tools::calling::PeakCaller;
use str_qc_tools::config::PanelConfig;
use str_qc_tools::contamination::ContaminationDetector;
use str_qc_tools::loader::read_peak_table;
use str_qc_tools::pipeline::SampleAnalyzer;
use str_qc_tools::reporting::RunReporter;

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("strqc-analyze")
        .version("0.1.0")
        .about("STR genotype calling and contamination screening for peak tables")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("TSV")
                .help("Input peak table (tab-separated)")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for result JSON files")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("JSON")
                .help("Marker panel configuration override"),
        )
        .arg(
            Arg::new("max_height")
                .long("max-height")
                .value_name("RFU")
                .help("Maximum peak height cutoff")
                .default_value("50000"),
        )
        .arg(
            Arg::new("ratio_threshold")
                .long("ratio-threshold")
                .value_name("RATIO")
                .help("Contamination ratio threshold against the weaker primary allele")
                .default_value("0.3"),
        )
        .arg(
            Arg::new("score_cutoff")
                .long("score-cutoff")
                .value_name("SCORE")
                .help("Absolute anomaly score cutoff")
                .default_value("3.0"),
        )
        .arg(
            Arg::new("min_relative_height")
                .long("min-relative-height")
                .value_name("PERCENT")
                .help("Minimum peak height relative to the tallest peak")
                .default_value("10.0"),
        )
        .get_matches();

    // Parse arguments
    let input_file = PathBuf::from(matches.get_one::<String>("input").unwrap());
    let output_dir = PathBuf::from(matches.get_one::<String>("output").unwrap());
    let max_height: f64 = matches.get_one::<String>("max_height").unwrap().parse()?;
    let ratio_threshold: f64 = matches
        .get_one::<String>("ratio_threshold")
        .unwrap()
        .parse()?;
    let score_cutoff: f64 = matches.get_one::<String>("score_cutoff").unwrap().parse()?;
    let min_relative_height: f64 = matches
        .get_one::<String>("min_relative_height")
        .unwrap()
        .parse()?;

    println!("🧬 STR Analysis Tool");
    println!("Input: {}", input_file.display());
    println!("Output: {}", output_dir.display());

    if !input_file.exists() {
        anyhow::bail!("Input file does not exist: {}", input_file.display());
    }
    std::fs::create_dir_all(&output_dir)?;

    let config = match matches.get_one::<String>("config") {
        Some(path) => PanelConfig::from_path(path)?,
        None => PanelConfig::default(),
    };

    let analyzer = SampleAnalyzer::new(config)
        .with_caller(PeakCaller::new(max_height, min_relative_height))
        .with_detector(ContaminationDetector::new(2, ratio_threshold, score_cutoff));

    let table = read_peak_table(&input_file)?;
    let sample_names = table.sample_names();
    println!("🔍 Processing {} sample(s)...", sample_names.len());

    let mut results = Vec::new();
    let mut failed_samples = Vec::new();

    for sample_name in &sample_names {
        let rows = table.rows_for_sample(sample_name);
        let skipped = table.skipped_for(sample_name);
        match analyzer.analyze(sample_name, &rows, skipped) {
            Ok(result) => {
                let path = result.save(&output_dir)?;
                let contamination = &result.sample_contamination;
                println!(
                    "  {} — {} markers, {} contaminated → {}",
                    sample_name,
                    contamination.total_valid_markers,
                    contamination.total_contaminated_markers,
                    path.display()
                );
                results.push(result);
            }
            Err(err) => {
                eprintln!("  ⚠️ {sample_name}: {err}");
                failed_samples.push(sample_name.clone());
            }
        }
    }

    let reporter = RunReporter::default();
    let summary = reporter.generate_summary(&results, &failed_samples);
    let summary_path = output_dir.join("run_summary.json");
    reporter.export_json(&summary, &summary_path)?;

    println!("✅ Analysis complete!");
    println!("📊 Samples analyzed: {}", summary.analyzed_samples);
    println!("📊 Samples failed: {}", summary.failed_samples.len());
    println!("🦠 Contaminated samples: {}", summary.contaminated_samples);
    println!(
        "🦠 Mean contamination rate: {:.3}",
        summary.mean_contamination_rate
    );
    println!("💾 Run summary saved to: {}", summary_path.display());

    Ok(())
}
