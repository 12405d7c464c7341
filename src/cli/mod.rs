//! credit-scope CLI Module
//!
//! Command-line interface for the credit default analysis and data inspection.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::data::{DataLoader, DEFAULT_SHEET, DEFAULT_TARGET};
use crate::pipeline::{Pipeline, PipelineConfig, PipelineReport};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const TOP_RULES: usize = 10;
const TOP_FEATURES: usize = 10;
const TOP_CANDIDATES: usize = 5;

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn opt(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "credit-scope")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Credit card default analysis: random forest selection and rule extraction")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full analysis
    Run {
        /// Input data file (XLS, XLSX, ODS or CSV)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Sheet to read from workbooks
        #[arg(long)]
        sheet: Option<String>,

        /// Rows above the header row
        #[arg(long)]
        header_row: Option<usize>,

        /// Target column name
        #[arg(short, long)]
        target: Option<String>,

        /// JSON configuration file; flags override its fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed of the row shuffle
        #[arg(long)]
        seed: Option<u64>,

        /// Number of cross-validation folds
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Worker threads for fitting
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Skip rule extraction
        #[arg(long)]
        no_rules: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show data information
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Sheet to read from workbooks
        #[arg(long, default_value = DEFAULT_SHEET)]
        sheet: String,

        /// Rows above the header row
        #[arg(long, default_value = "1")]
        header_row: usize,
    },
}

/// Flag overrides of the `run` command
#[derive(Debug, Default, Clone)]
pub struct RunArgs {
    pub data: Option<PathBuf>,
    pub sheet: Option<String>,
    pub header_row: Option<usize>,
    pub target: Option<String>,
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
    pub cv_folds: Option<usize>,
    pub jobs: Option<usize>,
    pub no_rules: bool,
    pub json: bool,
}

impl RunArgs {
    /// Configuration file (or defaults) with the flags applied on top
    pub fn resolve_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(data) = &self.data {
            config.data.path = Some(data.clone());
        }
        if let Some(sheet) = &self.sheet {
            config.data.sheet_name = sheet.clone();
        }
        if let Some(row) = self.header_row {
            config.data.header_row = row;
        }
        if let Some(target) = &self.target {
            config.data.target_column = target.clone();
        }
        if let Some(seed) = self.seed {
            config.random_state = seed;
        }
        if let Some(folds) = self.cv_folds {
            config.search = config.search.with_cv_folds(folds);
        }
        if let Some(jobs) = self.jobs {
            config.search = config.search.with_n_jobs(jobs);
            config.rules = config.rules.map(|r| r.with_n_jobs(jobs));
        }
        if self.no_rules {
            config.rules = None;
        }

        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(args: &RunArgs) -> anyhow::Result<()> {
    let config = args.resolve_config()?;
    let pipeline = Pipeline::new(config);

    if args.json {
        let report = pipeline.run()?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    section("Credit default analysis");
    let start = Instant::now();

    step_run("Preparing data");
    let t = Instant::now();
    let (train, test, n_rows) = pipeline.prepare()?;
    step_done(&format!(
        "{} rows → {} train / {} test in {:?}",
        n_rows,
        train.n_samples(),
        test.n_samples(),
        t.elapsed()
    ));

    let n_candidates = pipeline.config().search.candidates().len();
    step_run(&format!("Grid search over {} candidates", n_candidates));
    let t = Instant::now();
    let search = pipeline.select_model(&train)?;
    step_done(&format!("{:?}", t.elapsed()));

    let skope = if pipeline.config().rules.is_some() {
        step_run("Extracting rules");
        let t = Instant::now();
        let skope = pipeline.extract_rules(&train)?;
        step_done(&format!("{:?}", t.elapsed()));
        skope
    } else {
        None
    };

    let report = pipeline.evaluate(n_rows, &train, &test, &search, skope.as_ref(), start)?;
    print_report(&report);
    Ok(())
}

pub fn print_report(report: &PipelineReport) {
    section("Features");
    for name in &report.feature_names {
        println!("  {}", name);
    }

    section("Model selection");
    kv("Best params", &report.best_params.to_string());
    kv("CV ROC AUC", &format!("{:.4}", report.best_cv_score));
    let mut ranked: Vec<_> = report.cv_results.iter().collect();
    ranked.sort_by_key(|c| c.rank);
    println!();
    println!("  {:<6} {:<36} {:>8} {:>8}", muted("Rank"), muted("Params"), muted("Mean"), muted("Std"));
    for c in ranked.iter().take(TOP_CANDIDATES) {
        println!(
            "  {:<6} {:<36} {:>8.4} {:>8.4}",
            c.rank,
            c.params.to_string(),
            c.mean_score,
            c.std_score
        );
    }

    section("Held-out evaluation");
    let m = &report.test_metrics;
    kv("Rows", &format!("{} ({} defaults)", m.n_samples, m.n_positive));
    kv("ROC AUC", &opt(m.auc_roc));
    kv("PR AUC", &opt(m.pr_auc));
    kv("Accuracy", &format!("{:.4}", m.accuracy));
    kv("Precision", &format!("{:.4}", m.precision));
    kv("Recall", &format!("{:.4}", m.recall));
    kv("F1", &format!("{:.4}", m.f1_score));

    if !report.feature_importances.is_empty() {
        section("Feature importance");
        for (name, imp) in report.feature_importances.iter().take(TOP_FEATURES) {
            println!("  {:<20} {:.4}", name, imp);
        }
    }

    if let Some(rules) = &report.rules {
        section("Rules");
        kv("Kept", &rules.n_rules.to_string());
        kv("Precision", &format!("{:.4}", rules.test_metrics.precision));
        kv("Recall", &format!("{:.4}", rules.test_metrics.recall));
        kv("Score ROC AUC", &opt(rules.score_curves.roc_auc));
        kv("Score PR AUC", &opt(rules.score_curves.pr_auc));
        println!();
        for r in rules.top_rules.iter().take(TOP_RULES) {
            println!(
                "  {} {}",
                dim(&format!("[p={:.2} r={:.2} n={}]", r.precision, r.recall, r.n_occurrences)),
                r.rule
            );
        }
        if rules.top_rules.is_empty() {
            println!("  {}", "No rule met the precision and recall thresholds".yellow());
        }
    }

    println!();
    println!("  {} {}", ok("✓"), dim(&format!("finished in {:.2}s", report.elapsed_secs)));
    println!();
}

pub fn cmd_info(data_path: &PathBuf, sheet: &str, header_row: usize) -> anyhow::Result<()> {
    section("Data Info");

    let loader = DataLoader::new().with_sheet_name(sheet).with_header_row(header_row);
    let info = loader.get_file_info(data_path)?;

    kv("File", &info.path);
    kv("Size", &format!("{:.2} MB", info.file_size as f64 / 1024.0 / 1024.0));
    kv("Rows", &info.n_rows.to_string());
    kv("Columns", &info.n_cols.to_string());
    println!();

    println!("  {:<28} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in &info.columns {
        let name = if col.name == DEFAULT_TARGET {
            col.name.as_str().bold()
        } else {
            col.name.as_str().normal()
        };
        println!(
            "  {:<28} {:<12} {:>6}",
            name,
            col.dtype.truecolor(140, 140, 140),
            col.null_count
        );
    }

    println!();
    Ok(())
}
