//! mccv CLI module
//!
//! Command-line interface for running cross-validation, summarizing saved
//! results and generating the synthetic benchmark.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::loader::{dataset_to_dataframe, save_csv};
use crate::data::{with_hinge_term, DataLoader, Dataset, DatasetSchema, QuadraticBenchmark};
use crate::evaluation::{best_by_median, summarize, ModelSummary};
use crate::training::{CrossValidationConfig, CrossValidationRunner, HingeTerm, ModelRegistry, ResultsTable, RunConfig};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
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

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mccv")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Monte Carlo cross-validation for competing regression families")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cross-validate model families on a CSV dataset
    Run(RunArgs),

    /// Summarize a saved JSON results table
    Summarize {
        /// Results file written by `run --output results.json`
        #[arg(short, long)]
        results: PathBuf,
    },

    /// Write the quadratic benchmark dataset as CSV
    Simulate {
        /// Number of rows
        #[arg(short = 'n', long, default_value = "100")]
        rows: usize,

        /// Noise standard deviation
        #[arg(long, default_value = "0.4")]
        noise: f64,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List registered model families
    Models,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// JSON run file (flags below override its split settings and output)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Input CSV file
    #[arg(short, long, required_unless_present = "config")]
    pub data: Option<PathBuf>,

    /// Response column
    #[arg(short, long, required_unless_present = "config")]
    pub response: Option<String>,

    /// Predictor columns
    #[arg(short, long, value_delimiter = ',')]
    pub predictors: Vec<String>,

    /// Identifier column (default: row number)
    #[arg(long)]
    pub id_column: Option<String>,

    /// Derived hinge predictor, `source:threshold[:name]` (repeatable)
    #[arg(long)]
    pub hinge: Vec<HingeTerm>,

    /// Model declaration, `label=family:key=value,...` (repeatable)
    #[arg(short, long)]
    pub model: Vec<String>,

    /// Number of random partitions
    #[arg(short, long, allow_negative_numbers = true)]
    pub splits: Option<i64>,

    /// Fraction of rows used for training
    #[arg(long)]
    pub train_fraction: Option<f64>,

    /// Fraction of rows used for testing (default: the remainder)
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads (enables parallel evaluation)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Run separately within each value of this tag column
    #[arg(long)]
    pub group_by: Option<String>,

    /// Results file (.json or .csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl RunArgs {
    /// Resolve flags and the optional run file into one run configuration
    pub fn into_run_config(self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => {
                let (Some(data), Some(response)) = (self.data.clone(), self.response.clone()) else {
                    anyhow::bail!("--data and --response are required without --config");
                };
                let mut schema = DatasetSchema::new(response).with_predictors(self.predictors.clone());
                if let Some(id) = &self.id_column {
                    schema = schema.with_id_column(id.clone());
                }
                let models = if self.model.is_empty() {
                    vec!["linear".to_string(), "smooth".to_string()]
                } else {
                    self.model.clone()
                };
                RunConfig {
                    data,
                    schema,
                    hinges: self.hinge.clone(),
                    models,
                    cross_validation: CrossValidationConfig::default(),
                    group_by: self.group_by.clone(),
                    output: None,
                }
            }
        };

        let cv = &config.cross_validation;
        let mut merged = CrossValidationConfig::new(
            self.splits.unwrap_or(cv.num_splits as i64),
            self.train_fraction.unwrap_or(cv.train_fraction),
        )?;
        merged.test_fraction = self.test_fraction.or(cv.test_fraction);
        merged.seed = self.seed.or(cv.seed);
        merged.parallel = cv.parallel;
        merged.n_threads = cv.n_threads;
        if let Some(n) = self.threads {
            merged = merged.with_threads(n);
        }
        merged.validate()?;
        config.cross_validation = merged;

        if self.output.is_some() {
            config.output = self.output;
        }
        if self.group_by.is_some() {
            config.group_by = self.group_by;
        }
        if let Some(tag) = &config.group_by {
            if !config.schema.tag_columns.contains(tag) {
                config.schema.tag_columns.push(tag.clone());
            }
        }
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.into_run_config()?;
    section("Cross-validation");

    step_run("Loading data");
    let start = Instant::now();
    let mut dataset = DataLoader::new().load_dataset(&config.data, &config.schema)?;
    step_done(&format!("{} rows in {:?}", dataset.len(), start.elapsed()));

    for term in &config.hinges {
        dataset = with_hinge_term(&dataset, &term.source, term.threshold, &term.column_name())?;
        kv("hinge", &format!("{} = max(0, {} - {})", term.column_name(), term.source, term.threshold));
    }

    let registry = ModelRegistry::with_defaults();
    let models = registry.build_all(&config.models, &config.schema.predictors)?;

    let cv = &config.cross_validation;
    kv("splits", &cv.num_splits.to_string());
    kv("train fraction", &cv.train_fraction.to_string());
    if let Some(seed) = cv.seed {
        kv("seed", &seed.to_string());
    }
    kv(
        "models",
        &models.iter().map(|m| format!("{} ({})", m.name(), m.family())).collect::<Vec<_>>().join(", "),
    );

    let mut runner = CrossValidationRunner::new(cv.clone());
    match &config.group_by {
        None => {
            step_run("Scoring");
            let start = Instant::now();
            let table = runner.run(&dataset, &models)?;
            step_done(&format!("{} records in {:?}", table.len(), start.elapsed()));

            print_summaries(&summarize(&table));
            if let Some(path) = &config.output {
                write_results(&table, path)?;
            }
        }
        Some(tag) => {
            let results = runner.run_grouped(&dataset, tag, &models)?;
            for (group, outcome) in results {
                section(&format!("{} = {}", tag, group));
                match outcome {
                    Ok(table) => {
                        print_summaries(&summarize(&table));
                        if let Some(path) = &config.output {
                            write_results(&table, &group_path(path, &group))?;
                        }
                    }
                    Err(e) => println!("  {}", format!("skipped: {}", e).yellow()),
                }
            }
        }
    }

    println!();
    Ok(())
}

pub fn cmd_summarize(results: &Path) -> anyhow::Result<()> {
    section("Summary");
    let table = ResultsTable::load_json(results)?;
    kv("records", &table.len().to_string());
    kv("partitions", &table.num_partitions().to_string());
    print_summaries(&summarize(&table));
    println!();
    Ok(())
}

pub fn cmd_simulate(rows: usize, noise: f64, seed: Option<u64>, output: &Path) -> anyhow::Result<()> {
    section("Simulate");

    let mut benchmark = QuadraticBenchmark::new(rows).with_noise(noise);
    if let Some(seed) = seed {
        benchmark = benchmark.with_seed(seed);
    }

    step_run("Generating");
    let dataset: Dataset = benchmark.generate()?;
    step_done(&format!("{} rows", dataset.len()));

    step_run(&format!("Saving → {}", output.display()));
    let mut df = dataset_to_dataframe(&dataset)?;
    save_csv(&mut df, output)?;
    step_done(&format!("{} cols", df.width()));

    println!();
    Ok(())
}

pub fn cmd_models() -> anyhow::Result<()> {
    section("Model families");
    let registry = ModelRegistry::with_defaults();
    for (name, entry) in registry.families() {
        println!("  {} {}", name.white().bold(), muted(entry.description));
        for (param, meaning) in &entry.parameters {
            println!("    {:<12} {}", accent(param), dim(meaning));
        }
    }
    println!();
    println!("  {}", dim("declare as label=family:key=value,key=value"));
    println!();
    Ok(())
}

// ─── Output ────────────────────────────────────────────────────────────────────

fn print_summaries(summaries: &[ModelSummary]) {
    println!();
    println!(
        "  {:<16} {:>6} {:>6} {:>9} {:>9} {:>9} {:>9}",
        muted("Model"),
        muted("n"),
        muted("failed"),
        muted("median"),
        muted("q1"),
        muted("q3"),
        muted("mean")
    );
    println!("  {}", dim(&"─".repeat(72)));
    for s in summaries {
        println!(
            "  {:<16} {:>6} {:>6} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
            s.model_name, s.count, s.failed, s.median, s.q1, s.q3, s.mean
        );
    }
    println!("  {}", dim(&"─".repeat(72)));

    if let Some(best) = best_by_median(summaries) {
        println!();
        println!("  {} {} {} {:.4}", ok("best"), best.model_name.white().bold(), muted("median RMSE:"), best.median);
    }
}

fn write_results(table: &ResultsTable, path: &Path) -> anyhow::Result<()> {
    step_run(&format!("Saving → {}", path.display()));
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => table.save_json(path)?,
        Some("csv") | None => table.write_csv(path)?,
        Some(ext) => anyhow::bail!("Unsupported output format: {}", ext),
    }
    step_done(&format!("{} records", table.len()));
    Ok(())
}

/// `results.csv` + group `north` → `results_north.csv`
fn group_path(path: &Path, group: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("results");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, group, ext),
        None => format!("{}_{}", stem, group),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "mccv", "run", "--data", "d.csv", "--response", "y", "--predictors", "x,z",
            "--model", "lin=linear", "--model", "s=smooth:x=x", "--splits", "20", "--seed", "3",
            "--hinge", "x:0.5", "--group-by", "borough",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.into_run_config().unwrap();
        assert_eq!(config.schema.predictors, vec!["x", "z"]);
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.cross_validation.num_splits, 20);
        assert_eq!(config.cross_validation.seed, Some(3));
        assert_eq!(config.hinges[0].column_name(), "x_after_0.5");
        assert_eq!(config.schema.tag_columns, vec!["borough"]);
    }

    #[test]
    fn test_negative_splits_rejected() {
        let cli = Cli::parse_from([
            "mccv", "run", "--data", "d.csv", "--response", "y", "--predictors", "x", "--splits", "-1",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.into_run_config().is_err());
    }

    #[test]
    fn test_group_by_adds_tag_to_run_file_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let run_path = dir.path().join("run.json");
        std::fs::write(
            &run_path,
            r#"{
                "data": "sites.csv",
                "schema": { "response": "y", "predictors": ["x"] },
                "models": ["linear"],
                "cross_validation": { "num_splits": 5, "train_fraction": 0.8 }
            }"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "mccv", "run", "--config", run_path.to_str().unwrap(), "--group-by", "site",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.into_run_config().unwrap();
        assert_eq!(config.group_by.as_deref(), Some("site"));
        assert_eq!(config.schema.tag_columns, vec!["site"]);
    }

    #[test]
    fn test_group_path() {
        assert_eq!(group_path(Path::new("out/r.csv"), "north"), PathBuf::from("out/r_north.csv"));
    }
}
