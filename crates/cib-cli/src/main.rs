//! CIB CLI
//!
//! Command-line interface for Cross-Impact Balance scenario analysis.
//!
//! ## Usage
//!
//! ```bash
//! # Start a project and describe the system
//! cib project new project.json
//! cib descriptor add --project project.json "Energy Policy"
//! cib variant add --project project.json "Energy Policy" "1"
//! cib variant auto --project project.json Growth --min 0 --max 4 --count 5
//!
//! # Enter cross-impacts by flat index
//! cib matrix set --project project.json 0 3 2
//!
//! # Analyse
//! cib analyze --project project.json --tolerance 1
//! cib analyze --project project.json --config analysis.yaml --format json
//! ```
//!
//! ## Exit Codes
//!
//! - 0: Success (analysis found at least one consistent scenario)
//! - 1: No consistent scenario, or project validation failed
//! - 3: Error

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cib_core::registry::parse_bound;
use cib_core::{AnalysisConfig, AnalysisReport, Conflict, ConsistencyPolicy, Project};

/// CIB: Cross-Impact Balance scenario analysis
#[derive(Parser)]
#[command(name = "cib")]
#[command(version)]
#[command(about = "Enumerate, check and rank CIB scenarios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find consistent scenarios and rank them
    Analyze {
        /// Path to the project snapshot (JSON or YAML)
        #[arg(short, long)]
        project: PathBuf,

        /// Analysis config file (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Tolerance (overrides the config file)
        #[arg(short, long)]
        tolerance: Option<f64>,

        /// Maximum number of scenarios to enumerate (overrides the config file)
        #[arg(long)]
        max_scenarios: Option<u64>,

        /// Consistency policy (overrides the config file)
        #[arg(long)]
        policy: Option<PolicyArg>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Show why rejected scenarios failed
        #[arg(long)]
        explain: bool,

        /// Explicit timestamp for a reproducible report (RFC 3339).
        /// Example: --analyzed-at 2025-12-20T00:00:00Z
        #[arg(long, value_parser = parse_datetime)]
        analyzed_at: Option<DateTime<Utc>>,
    },

    /// Print how many scenarios the project would generate
    Count {
        #[arg(short, long)]
        project: PathBuf,
    },

    /// Project file commands
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Descriptor commands
    Descriptor {
        #[command(subcommand)]
        action: DescriptorAction,
    },

    /// Variant commands
    Variant {
        #[command(subcommand)]
        action: VariantAction,
    },

    /// Cross-impact matrix commands
    Matrix {
        #[command(subcommand)]
        action: MatrixAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create an empty project file
    New {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a project file
    Validate { path: PathBuf },

    /// Show descriptors, variants and flat indices
    Show { path: PathBuf },
}

#[derive(Subcommand)]
enum DescriptorAction {
    /// Append a descriptor
    Add {
        #[arg(short, long)]
        project: PathBuf,
        name: String,
    },

    /// Remove a descriptor and its variants
    Remove {
        #[arg(short, long)]
        project: PathBuf,
        name: String,
    },
}

#[derive(Subcommand)]
enum VariantAction {
    /// Append a variant to a descriptor
    Add {
        #[arg(short, long)]
        project: PathBuf,
        descriptor: String,
        name: String,
    },

    /// Remove a variant from a descriptor
    Remove {
        #[arg(short, long)]
        project: PathBuf,
        descriptor: String,
        name: String,
    },

    /// Replace a descriptor's variants with an evenly spaced range
    Auto {
        #[arg(short, long)]
        project: PathBuf,
        descriptor: String,

        #[arg(long, allow_hyphen_values = true)]
        min: String,

        #[arg(long, allow_hyphen_values = true)]
        max: String,

        #[arg(long)]
        count: usize,
    },
}

#[derive(Subcommand)]
enum MatrixAction {
    /// Set the influence of variant ROW on variant COL
    Set {
        #[arg(short, long)]
        project: PathBuf,
        row: usize,
        col: usize,

        #[arg(allow_hyphen_values = true)]
        value: i32,
    },

    /// Print the matrix
    Show {
        #[arg(short, long)]
        project: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    AllPairs,
    RowSum,
}

impl From<PolicyArg> for ConsistencyPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::AllPairs => ConsistencyPolicy::AllPairs,
            PolicyArg::RowSum => ConsistencyPolicy::RowSum,
        }
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid datetime format: {}. Expected RFC 3339 (e.g., 2025-12-20T00:00:00Z)", e))
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    match run() {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(3)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            project,
            config,
            tolerance,
            max_scenarios,
            policy,
            format,
            explain,
            analyzed_at,
        } => {
            let base = match config {
                Some(path) => AnalysisConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))?,
                None => AnalysisConfig::default(),
            };
            let overrides = ConfigOverrides {
                tolerance,
                max_scenarios,
                policy,
                analyzed_at,
                explain,
            };
            let config = overrides.apply(base)?;
            analyze_command(&project, &config, format, explain)
        }

        Commands::Count { project } => count_command(&project),

        Commands::Project { action } => match action {
            ProjectAction::New { path, force } => new_project(&path, force),
            ProjectAction::Validate { path } => validate_project(&path),
            ProjectAction::Show { path } => show_project(&path),
        },

        Commands::Descriptor { action } => match action {
            DescriptorAction::Add { project, name } => {
                edit_project(&project, |p| p.with_descriptor(name.as_str()))
            }
            DescriptorAction::Remove { project, name } => {
                edit_project(&project, |p| p.without_descriptor(&name))
            }
        },

        Commands::Variant { action } => match action {
            VariantAction::Add {
                project,
                descriptor,
                name,
            } => edit_project(&project, |p| p.with_variant(&descriptor, name.as_str())),
            VariantAction::Remove {
                project,
                descriptor,
                name,
            } => edit_project(&project, |p| p.without_variant(&descriptor, &name)),
            VariantAction::Auto {
                project,
                descriptor,
                min,
                max,
                count,
            } => {
                let min = parse_bound(&min)?;
                let max = parse_bound(&max)?;
                edit_project(&project, |p| {
                    p.with_generated_variants(&descriptor, min, max, count)
                })
            }
        },

        Commands::Matrix { action } => match action {
            MatrixAction::Set {
                project,
                row,
                col,
                value,
            } => edit_project(&project, |p| p.with_influence(row, col, value)),
            MatrixAction::Show { project } => show_matrix(&project),
        },
    }
}

fn load_project(path: &Path) -> Result<Project> {
    Project::load(path).with_context(|| format!("Failed to load project from {:?}", path))
}

/// Load, apply one edit, write back.
fn edit_project(
    path: &Path,
    edit: impl FnOnce(&Project) -> cib_core::Result<Project>,
) -> Result<ExitCode> {
    let project = load_project(path)?;
    let edited = edit(&project)?;
    edited
        .save(path)
        .with_context(|| format!("Failed to write project to {:?}", path))?;
    tracing::debug!(path = %path.display(), "project updated");
    print_registry(&edited);
    Ok(ExitCode::from(0))
}

/// Command-line values that take precedence over the config file.
#[derive(Default)]
struct ConfigOverrides {
    tolerance: Option<f64>,
    max_scenarios: Option<u64>,
    policy: Option<PolicyArg>,
    analyzed_at: Option<DateTime<Utc>>,
    explain: bool,
}

impl ConfigOverrides {
    /// Apply on top of `config` and re-validate the result.
    fn apply(self, mut config: AnalysisConfig) -> Result<AnalysisConfig> {
        if let Some(tolerance) = self.tolerance {
            config.tolerance = tolerance;
        }
        if let Some(max) = self.max_scenarios {
            config.max_scenarios = max;
        }
        if let Some(policy) = self.policy {
            config.policy = policy.into();
        }
        if self.analyzed_at.is_some() {
            config.determinism.analyzed_at = self.analyzed_at;
        }
        config.record_rejections |= self.explain;
        config.validate().context("Invalid command-line override")?;
        Ok(config)
    }
}

fn analyze_command(
    path: &Path,
    config: &AnalysisConfig,
    format: OutputFormat,
    explain: bool,
) -> Result<ExitCode> {
    let project = load_project(path)?;
    let report = cib_core::analyze(&project, config).context("Analysis failed")?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Text => print_text_report(&report, &project, explain),
    }

    Ok(if report.has_consistent() {
        ExitCode::from(0)
    } else {
        ExitCode::from(1)
    })
}

fn print_text_report(report: &AnalysisReport, project: &Project, explain: bool) {
    println!(
        "{} of {} scenarios consistent (tolerance {}, {:?})",
        report.consistent.len(),
        report.total_scenarios,
        report.tolerance,
        report.policy
    );
    println!();

    if !report.consistent.is_empty() {
        println!("Consistent Scenario Tableau:");
        for entry in &report.consistent {
            println!();
            println!("  Scenario {}", entry.number);
            for variant in &entry.variants {
                println!("    {}", variant);
            }
        }
        println!();
    }

    match (&report.ranking, &report.ranking_skipped) {
        (Some(ranking), _) if !ranking.is_empty() => {
            println!("TOPSIS Ranking:");
            for ranked in &ranking.entries {
                let number = report
                    .tableau_entry(ranked)
                    .map(|e| e.number)
                    .unwrap_or(ranked.index + 1);
                let marker = if ranked.degenerate { " (degenerate)" } else { "" };
                println!(
                    "  {}. Scenario {}: {:.2}{}",
                    ranked.rank, number, ranked.closeness, marker
                );
            }
            println!();
        }
        (_, Some(reason)) => {
            println!("Ranking skipped: {}", reason);
            println!();
        }
        _ => {}
    }

    if explain && !report.rejected.is_empty() {
        println!("--- Rejected Scenarios ---");
        println!();
        let registry = project.registry();
        for rejection in &report.rejected {
            let names: Vec<String> = rejection.variants.iter().map(|v| v.to_string()).collect();
            println!("  [{}]", names.join(", "));
            match rejection.conflict {
                Conflict::Pair {
                    first,
                    second,
                    influence_sum,
                } => {
                    let describe = |i| {
                        registry
                            .variant_at(i)
                            .map(|r| r.to_string())
                            .unwrap_or_else(|| format!("#{}", i))
                    };
                    println!(
                        "    {} <-> {}: combined influence {}",
                        describe(first),
                        describe(second),
                        influence_sum
                    );
                }
                Conflict::Row { variant, row_sum } => {
                    let name = registry
                        .variant_at(variant)
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| format!("#{}", variant));
                    println!("    {}: row sum {}", name, row_sum);
                }
            }
        }
    }
}

fn count_command(path: &Path) -> Result<ExitCode> {
    let project = load_project(path)?;
    let count = cib_core::scenario_count(project.registry())?;
    println!("{}", count);
    Ok(ExitCode::from(0))
}

fn new_project(path: &Path, force: bool) -> Result<ExitCode> {
    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
    }
    Project::new()
        .save(path)
        .with_context(|| format!("Failed to write project to {:?}", path))?;
    println!("Created empty project {:?}", path);
    Ok(ExitCode::from(0))
}

fn validate_project(path: &Path) -> Result<ExitCode> {
    match Project::load(path) {
        Ok(project) => {
            let registry = project.registry();
            println!("Project is valid: {:?}", path);
            println!();
            println!("Descriptors: {}", registry.descriptors().len());
            println!("Variants: {}", registry.variant_count());
            match cib_core::scenario_count(registry) {
                Ok(count) => println!("Scenarios: {}", count),
                Err(e) => println!("Scenarios: none ({})", e),
            }
            Ok(ExitCode::from(0))
        }
        Err(e) => {
            eprintln!("Project validation failed: {}", e);
            Ok(ExitCode::from(1))
        }
    }
}

fn show_project(path: &Path) -> Result<ExitCode> {
    let project = load_project(path)?;
    print_registry(&project);
    Ok(ExitCode::from(0))
}

fn print_registry(project: &Project) {
    let registry = project.registry();
    if registry.is_empty() {
        println!("No descriptors.");
        return;
    }

    let offsets = registry.offsets();
    for (descriptor, offset) in registry.descriptors().iter().zip(offsets) {
        println!("{}:", descriptor.name);
        if descriptor.variants.is_empty() {
            println!("  (no variants)");
        }
        for (i, variant) in descriptor.variants.iter().enumerate() {
            println!("  [{}] {}", offset + i, variant);
        }
    }
}

fn show_matrix(path: &Path) -> Result<ExitCode> {
    let project = load_project(path)?;
    let matrix = project.matrix();
    let labels: Vec<String> = project
        .registry()
        .flattened()
        .iter()
        .map(|r| r.to_string())
        .collect();

    for (i, label) in labels.iter().enumerate() {
        let cells: Vec<String> = (0..matrix.dim())
            .map(|j| match matrix.influence(i, j) {
                Some(value) => format!("{:>3}", value),
                None => "  -".to_string(),
            })
            .collect();
        println!("[{:>2}] {} | {}", i, cells.join(" "), label);
    }
    Ok(ExitCode::from(0))
}
