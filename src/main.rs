// SPDX-License-Identifier: PMPL-1.0-or-later

//! simple-spa: parse SIMPLE programs and answer PQL queries about them

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use simple_spa::batch;
use simple_spa::config::EnvFlags;
use simple_spa::{EngineProfile, QueryProcessor};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simple-spa")]
#[command(version = "0.1.0")]
#[command(about = "Static program analyser for SIMPLE with a PQL query engine")]
#[command(long_about = None)]
struct Cli {
    /// Debug logging on stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a SIMPLE program
    Parse {
        /// SIMPLE source file
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Write the AST as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Evaluate a single PQL query
    Query {
        /// SIMPLE source file
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Query text, e.g. "stmt s; Select s such that Follows(1, s)"
        #[arg(value_name = "QUERY")]
        query: String,

        /// Engine profile (json or yaml)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Disable every optimizer rewrite
        #[arg(long)]
        no_optimize: bool,
    },

    /// Run an autotester-style query file
    Batch {
        /// SIMPLE source file
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Query file of five-line blocks
        #[arg(value_name = "QUERIES")]
        queries: PathBuf,

        /// Engine profile (json or yaml)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Save a JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Parse { source, output } => {
            let text = read_source(&source)?;
            let program = simple_spa::parse(&text)
                .with_context(|| format!("parsing {}", source.display()))?;

            if let Some(output_path) = output {
                let json = serde_json::to_string_pretty(&program)?;
                fs::write(&output_path, json)
                    .with_context(|| format!("writing {}", output_path.display()))?;
                println!("AST saved to: {}", output_path.display());
            } else {
                println!("{} {}", "OK".green().bold(), source.display());
                println!("  Procedures: {}", program.children().len());
                println!("  Statements: {}", program.statement_count());
            }
        }

        Commands::Query {
            source,
            query,
            profile,
            no_optimize,
        } => {
            let mut profile = load_profile(profile.as_deref())?;
            if no_optimize {
                profile.optimize = false;
            }
            let processor = build_processor(&source, profile)?;

            // Malformed queries print nothing on stdout
            match processor.process(&query) {
                Ok(lines) => {
                    for line in lines {
                        println!("{}", line);
                    }
                }
                Err(err) => eprintln!("{} {}", "error:".red().bold(), err),
            }
        }

        Commands::Batch {
            source,
            queries,
            profile,
            output,
        } => {
            let profile = load_profile(profile.as_deref())?;
            let processor = build_processor(&source, profile)?;
            let cases = batch::load_cases(&queries)?;
            let report = batch::run_cases(&processor, &cases);

            for outcome in &report.cases {
                let status = if outcome.passed {
                    "PASSED".green()
                } else {
                    "FAILED".red()
                };
                println!(
                    "  {} {} - {} ({} ms)",
                    status, outcome.id, outcome.comment, outcome.elapsed_ms
                );
                if !outcome.passed {
                    println!("      expected: {}", join(&outcome.expected).dimmed());
                    println!("      actual:   {}", join(&outcome.actual).dimmed());
                    if let Some(error) = &outcome.error {
                        println!("      error:    {}", error.red());
                    }
                    if outcome.timed_out {
                        println!("      {}", "timed out".yellow());
                    }
                }
            }

            let summary = format!("{}/{} passed", report.passed, report.total);
            if report.failed == 0 {
                println!("\n{}", summary.green().bold());
            } else {
                println!("\n{}", summary.red().bold());
            }

            if let Some(output_path) = output {
                report.save(&output_path)?;
                println!("Report saved to: {}", output_path.display());
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading SIMPLE source {}", path.display()))
}

fn load_profile(path: Option<&Path>) -> Result<EngineProfile> {
    match path {
        Some(path) => Ok(EngineProfile::load(path)?.with_flags(EnvFlags::get())),
        None => Ok(EngineProfile::from_env()),
    }
}

fn build_processor(source: &Path, profile: EngineProfile) -> Result<QueryProcessor> {
    let text = read_source(source)?;
    QueryProcessor::from_source(&text, profile)
        .with_context(|| format!("building knowledge base for {}", source.display()))
}

fn join(answers: &std::collections::BTreeSet<String>) -> String {
    if answers.is_empty() {
        "none".to_string()
    } else {
        answers.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
