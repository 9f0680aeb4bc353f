//! entiq CLI: inspect the operator catalog and explain YAML queries.

use clap::{Parser, Subcommand};
use entiq_core::config::EntiqConfig;
use entiq_operators::dsl::{parse_yaml_query, QueryBuilder};
use entiq_operators::{OperatorId, Registry};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "entiq")]
#[command(about = "entiq: async operator dispatch and database lifecycle tooling", long_about = None)]
struct Cli {
    /// Enable debug logging when `RUST_LOG` is unset
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every catalog operator and print its signature
    Catalog,

    /// Show the rewritten call tree for a YAML query
    Explain {
        /// Path to the query YAML file
        #[arg(short, long)]
        query: PathBuf,
    },

    /// Print the effective configuration as JSON
    Config,
}

/// `RUST_LOG` when set, otherwise `debug` with `-v` and `warn` without.
fn log_filter(verbose: bool) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| fallback_level(verbose).into())
}

fn fallback_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Catalog => print_catalog(),
        Commands::Explain { query } => explain_query(&query),
        Commands::Config => print_config(),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_catalog() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::prepopulated()?;
    println!("Operator Catalog");
    println!("================");
    for id in OperatorId::all() {
        let template = registry.template(id)?;
        println!("  {:<36} {}", template.key().to_string(), template.definition());
    }
    println!();
    println!("{} templates resolved", registry.len());
    Ok(())
}

fn explain_query(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let yaml_content = fs::read_to_string(path)?;
    let doc = parse_yaml_query(&yaml_content)?;
    let registry = Registry::from_config(&EntiqConfig::from_env())?;
    let expr = QueryBuilder::new(&registry, &doc.source)?.build(&doc)?;

    println!("Query Plan");
    println!("==========");
    println!();
    println!("Source: {} ({})", doc.source.name, doc.source.entity);
    println!("Steps: {}", doc.steps.len());
    if let Some(t) = &doc.terminal {
        println!("Terminal: {}", t.op);
    }
    println!();
    println!("Call tree:");
    println!("  {}", expr);
    println!("Result type: {}", expr.ty());
    Ok(())
}

fn print_config() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = EntiqConfig::from_env();
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_flag_raises_fallback_level() {
        let quiet = Cli::try_parse_from(["entiq", "catalog"]).unwrap();
        assert_eq!(fallback_level(quiet.verbose), "warn");
        let loud = Cli::try_parse_from(["entiq", "config", "-v"]).unwrap();
        assert_eq!(fallback_level(loud.verbose), "debug");
    }

    #[test]
    fn fallback_levels_are_valid_filters() {
        for verbose in [false, true] {
            assert!(fallback_level(verbose)
                .parse::<tracing_subscriber::EnvFilter>()
                .is_ok());
        }
    }
}
