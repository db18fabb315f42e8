//! CLI module for declgraph.
//!
//! Commands:
//! - inspect: load sources and print declaration summaries
//! - stats: graph statistics

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::ModelConfig;
use crate::graph::DeclarationSummary;
use crate::model::DeclId;
use crate::project::load_project;
use crate::resolver::DeclarationResolver;

#[derive(Parser)]
#[command(name = "declgraph")]
#[command(about = "Declaration graph for C# sources", long_about = None)]
pub struct Cli {
    /// Configuration file (default: declgraph.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load sources, deep-load every declaration and print their shape
    Inspect {
        /// Source files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only declarations whose full name contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show graph statistics
    Stats {
        /// Source files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

const DEFAULT_CONFIG: &str = "declgraph.toml";

pub fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ModelConfig::load(path).with_context(|| format!("reading {}", path.display()))?,
        None => ModelConfig::load(Path::new(DEFAULT_CONFIG))?,
    };

    match cli.command {
        Commands::Inspect { paths, filter, json } => inspect(&paths, config, filter.as_deref(), json),
        Commands::Stats { paths } => {
            let mut resolver = load_project(&paths, config)?;
            let roots = resolver.graph().ids();
            let failures = load_roots(&mut resolver, roots);
            let stats = resolver.graph().stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
            if failures > 0 {
                bail!("{failures} declaration(s) failed to load");
            }
            Ok(())
        }
    }
}

fn inspect(paths: &[PathBuf], config: ModelConfig, filter: Option<&str>, json: bool) -> Result<()> {
    let mut resolver = load_project(paths, config)?;
    let roots: Vec<DeclId> = resolver
        .graph()
        .iter()
        .filter(|(_, d)| filter.map_or(true, |f| d.full_name().contains(f)))
        .map(|(id, _)| id)
        .collect();
    let failures = load_roots(&mut resolver, roots.clone());

    let summaries: Vec<DeclarationSummary> = roots.iter().map(|&id| resolver.graph().summary(id)).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else if summaries.is_empty() {
        println!("No declarations found");
    } else {
        for summary in &summaries {
            print_summary(summary);
        }
    }

    if failures > 0 {
        bail!("{failures} declaration(s) failed to load");
    }
    Ok(())
}

/// Deep-load each root, reporting failures on stderr. Returns the failure count.
fn load_roots(resolver: &mut DeclarationResolver, roots: Vec<DeclId>) -> usize {
    let mut failures = 0;
    for id in roots {
        if let Err(err) = resolver.deep_load(id) {
            let declaration = resolver.graph().get(id);
            eprintln!(
                "error: {} ({}): {}",
                declaration.full_name(),
                declaration.location(),
                err
            );
            failures += 1;
        }
    }
    failures
}

fn print_summary(summary: &DeclarationSummary) {
    let mut header = format!("{} {}", summary.kind, summary.full_name);
    if !summary.generic_parameters.is_empty() {
        header.push_str(&format!("<{}>", summary.generic_parameters.join(", ")));
    }
    println!("{header}");
    println!("  from {} ({})", summary.location, summary.provenance);
    if !summary.extends.is_empty() {
        println!("  : {}", summary.extends.join(", "));
    }
    for attribute in &summary.attributes {
        println!("  [{attribute}]");
    }
    for member in &summary.members {
        let attributes: String = member.attributes.iter().map(|a| format!("[{a}] ")).collect();
        println!("  {}{} {}", attributes, member.kind, member.signature);
    }
    println!();
}
