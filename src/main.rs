//! Synopsis Analyzer - statistics for SpAnner synopsis spreadsheets
//!
//! A CLI tool that reads the synopsis workbooks of multi-electrode array
//! recordings, tests each channel's spike rate before and during substance
//! application, and writes the excited and inhibited channels into one
//! summary workbook.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any error (no input, malformed input, invalid settings, write failure)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod parser;
mod report;
mod scanner;
mod stats;

use analysis::{NoPrompt, RowSource, TerminalPrompt};
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{AnalysisReport, Response};
use parser::Synopsis;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Synopsis Analyzer v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args) {
        error!("Analysis failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default config file.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the application rows, thresholds and labels.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(args.log_filter())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow from the command line.
fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    if args.dry_run {
        return handle_dry_run(&config);
    }

    println!("📂 Input: {}", config.input.directory.display());

    // Prompts need a human on the other end
    let stdin = std::io::stdin();
    let interactive = config.analysis.prompt && stdin.is_terminal();
    let mut rows: Box<dyn RowSource> = if interactive {
        Box::new(TerminalPrompt::new(stdin.lock(), std::io::stdout()))
    } else {
        Box::new(NoPrompt)
    };

    let (report, output_path) = run_pipeline(&config, rows.as_mut(), args.quiet)?;
    print_summary(&report, &output_path);
    Ok(())
}

/// Scan, parse, analyze and write. Returns the report and the file written.
///
/// Every input is parsed before the first prompt or write, so a malformed
/// file aborts the run without output.
fn run_pipeline(
    config: &Config,
    rows: &mut dyn RowSource,
    quiet: bool,
) -> Result<(AnalysisReport, PathBuf)> {
    let start_time = Instant::now();

    // Step 1: Find the input files
    let file_scanner = scanner::FileScanner::new(
        config.input.directory.clone(),
        scanner::ScanConfig::from(&config.input),
    );
    let inputs = file_scanner.scan()?;
    info!("Found {} synopsis files", inputs.len());

    // Step 2: Parse all of them
    let mut synopses = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let table = parser::read_table(&input.path, &config.synopsis.sheet_name)?;
        let synopsis = Synopsis::from_table(&input.path, table, &config.synopsis)?;
        info!(
            "{}: {} rows, {} channels",
            input.name,
            synopsis.row_count(),
            synopsis.channels.len()
        );
        synopses.push(synopsis);
    }

    // Step 3: Analyze file by file
    let pb = progress_bar(inputs.len() as u64, quiet);
    let mut files = Vec::with_capacity(inputs.len());
    for (input, synopsis) in inputs.iter().zip(&synopses) {
        pb.set_message(input.name.clone());
        let periods =
            pb.suspend(|| analysis::resolve_periods(synopsis, &config.analysis, &mut *rows))?;
        debug!("{}: periods {:?}", input.name, periods);

        let file_analysis = analysis::analyze_file(input, synopsis, &periods, &config.analysis);
        if file_analysis.results.is_empty() {
            warn!("{}: no channel changed significantly", input.name);
        }
        files.push(file_analysis);
        pb.inc(1);
    }
    pb.finish_and_clear();

    // Step 4: Aggregate and write
    let duration = start_time.elapsed().as_secs_f64();
    let report = analysis::build_report(
        files,
        &config.analysis,
        &config.input.directory,
        duration,
    );

    let output_path = config.output.path();
    match config.output.format {
        OutputFormat::Xlsx => report::write_workbook(&report, &output_path)?,
        OutputFormat::Json => report::write_json(&report, &output_path)?,
    }

    Ok((report, output_path))
}

fn progress_bar(len: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

fn print_summary(report: &AnalysisReport, output_path: &std::path::Path) {
    let meta = &report.metadata;

    println!("\n📊 Analysis Summary:");
    println!("   Files analyzed: {}", meta.files_analyzed);
    println!(
        "   Channels: {} found, {} significant",
        meta.channels_found, meta.channels_significant
    );
    let dist = analysis::response_distribution(&report.files);
    let count = |r: Response| dist.get(&r).copied().unwrap_or(0);
    println!(
        "   - 🔺 {}: {} | 🔻 {}: {}",
        report.excited_label,
        count(Response::Excited),
        report.inhibited_label,
        count(Response::Inhibited)
    );
    println!("   Duration: {:.1}s", meta.duration_seconds);
    println!(
        "\n✅ Analysis complete! Results saved to: {}",
        output_path.display()
    );
}

/// Handle --dry-run: parse files, print what would be analyzed, exit.
fn handle_dry_run(config: &Config) -> Result<()> {
    println!("\n🔍 Dry run: parsing files (nothing is written)...\n");

    let file_scanner = scanner::FileScanner::new(
        config.input.directory.clone(),
        scanner::ScanConfig::from(&config.input),
    );
    let files = file_scanner.scan()?;

    let mut tables = Vec::new();
    for file in &files {
        let parsed = parser::read_table(&file.path, &config.synopsis.sheet_name)
            .and_then(|t| Synopsis::from_table(&file.path, t, &config.synopsis));

        match parsed {
            Ok(synopsis) => {
                let names: Vec<&str> = synopsis.channels.iter().map(|c| c.name.as_str()).collect();
                println!(
                    "     📄 {} ({} bytes, {} rows): {}",
                    file.name,
                    file.size,
                    synopsis.row_count(),
                    names.join(", ")
                );
                tables.push(synopsis.table);
            }
            Err(e) => println!("     ⚠️  {}", e),
        }
    }

    let time_column = &config.synopsis.time_column;
    if let Some(stats) = analysis::describe_column(&tables, time_column) {
        if let (Some(min), Some(max)) = (stats.get("min"), stats.get("max")) {
            println!(
                "\n   {} values across files: {} to {} ({} values)",
                time_column, min, max, stats["count"]
            );
        }
    }

    println!("\n   Total: {} files", files.len());
    println!("\n✅ Dry run complete. No output was written.");
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
