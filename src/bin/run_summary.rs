//! STR Run Summary Tool
//!
//! Rebuilds a run-level summary from per-sample result JSON files.

use anyhow::{Context, Result};
use clap::{Arg, Command};
use std::path::PathBuf;
use str_qc_tools::reporting::RunReporter;
use str_qc_tools::results::SampleResult;

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("strqc-summary")
        .version("0.1.0")
        .about("Multi-sample summary over STR analysis result files")
        .arg(
            Arg::new("input_dir")
                .short('i')
                .long("input-dir")
                .value_name("DIRECTORY")
                .help("Directory containing .STR_analysis.json result files")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("JSON")
                .help("Output JSON file for the run summary")
                .default_value("run_summary.json"),
        )
        .arg(
            Arg::new("rate_threshold")
                .long("rate-threshold")
                .value_name("RATE")
                .help("Contamination rate above which a sample counts as contaminated")
                .default_value("0.0"),
        )
        .get_matches();

    // Parse arguments
    let input_dir = PathBuf::from(matches.get_one::<String>("input_dir").unwrap());
    let output_file = PathBuf::from(matches.get_one::<String>("output").unwrap());
    let rate_threshold: f64 = matches
        .get_one::<String>("rate_threshold")
        .unwrap()
        .parse()?;

    println!("📊 STR Run Summary Tool");
    println!("Input directory: {}", input_dir.display());
    println!("Output: {}", output_file.display());

    if !input_dir.exists() || !input_dir.is_dir() {
        anyhow::bail!("Input directory does not exist: {}", input_dir.display());
    }

    let mut results = Vec::new();
    for entry in std::fs::read_dir(&input_dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");
        if !name.ends_with(".STR_analysis.json") {
            continue;
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let result: SampleResult = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        results.push(result);
    }

    if results.is_empty() {
        anyhow::bail!(
            "No .STR_analysis.json files found in {}",
            input_dir.display()
        );
    }
    results.sort_by(|a, b| a.sample_name.cmp(&b.sample_name));

    let reporter = RunReporter::new(rate_threshold);
    let summary = reporter.generate_summary(&results, &[]);
    reporter.export_json(&summary, &output_file)?;

    println!("✅ Summary complete!");
    println!("  Samples: {}", summary.analyzed_samples);
    println!("  Contaminated samples: {}", summary.contaminated_samples);
    println!(
        "  Mean contamination rate: {:.3}",
        summary.mean_contamination_rate
    );
    println!(
        "  Contaminated markers (all samples): {}",
        summary.total_contaminated_markers
    );
    println!("💾 Summary saved to: {}", output_file.display());

    Ok(())
}
