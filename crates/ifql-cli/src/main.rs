//! IFQL CLI: parse, plan, and run queries against JSON-loaded data.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use std::{fs, process};

use clap::{Parser, Subcommand};
use serde::Deserialize;

use ifql_core::block::Block;
use ifql_core::config::EngineConfig;
use ifql_core::time::Time;
use ifql_exec::MemoryStorage;
use ifql_functions::{default_registry, ExecutionRegistry};
use ifql_plan::ProcedureSpec;

#[derive(Parser)]
#[command(name = "ifql")]
#[command(about = "IFQL: query time series with a chainable dataflow language", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a query against a JSON data file
    Run {
        /// The query source text
        query: String,

        /// Path to a JSON file with the databases to query
        #[arg(short, long)]
        data: PathBuf,

        /// Value of `now` in nanoseconds (defaults to wall clock)
        #[arg(long)]
        now: Option<i64>,

        /// Memory cap in bytes (overrides config)
        #[arg(long)]
        memory_cap: Option<usize>,

        /// Print result blocks as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the operation graph of a query as JSON
    Spec {
        /// The query source text
        query: String,
    },

    /// Show the physical plan for a query (EXPLAIN)
    Plan {
        /// The query source text
        query: String,

        /// Value of `now` in nanoseconds (defaults to wall clock)
        #[arg(long)]
        now: Option<i64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Run {
            query,
            data,
            now,
            memory_cap,
            json,
        } => run_query(&query, &data, now, memory_cap, json),
        Commands::Spec { query } => print_spec(&query),
        Commands::Plan { query, now } => explain(&query, now),
    };
    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

type MainResult = Result<(), Box<dyn std::error::Error>>;

/// Data file layout: database name to a list of blocks. Untagged numeric
/// cells deserialize as integers, so every column is coerced to its
/// declared type before the block is stored.
#[derive(Deserialize)]
struct DataFile {
    databases: std::collections::HashMap<String, Vec<Block>>,
}

fn load_storage(path: &PathBuf) -> Result<Arc<MemoryStorage>, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let file: DataFile = serde_json::from_str(&text)?;
    let storage = MemoryStorage::new();
    for (db, blocks) in file.databases {
        for mut block in blocks {
            if block.data.len() != block.cols.len() {
                return Err(format!(
                    "database {db:?}: block has {} columns but {} data vectors",
                    block.cols.len(),
                    block.data.len()
                )
                .into());
            }
            for (i, col) in block.cols.clone().iter().enumerate() {
                block.data[i] = std::mem::take(&mut block.data[i])
                    .into_iter()
                    .map(|v| v.coerce(col.data_type))
                    .collect();
            }
            block.validate()?;
            storage.insert(&db, block);
        }
    }
    Ok(Arc::new(storage))
}

fn resolve_now(now: Option<i64>) -> Time {
    match now {
        Some(ns) => Time(ns),
        None => Time(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as i64)
                .unwrap_or_default(),
        ),
    }
}

fn compile(query: &str, now: Time) -> Result<ifql_plan::PlanSpec, Box<dyn std::error::Error>> {
    let program = ifql_lang::parse(query)?;
    let registry = default_registry();
    let spec = ifql_lang::build_query(&program, &registry)?;
    let logical = ifql_plan::create_logical_plan(&spec)?;
    Ok(ifql_plan::plan(&logical, now)?)
}

fn run_query(
    query: &str,
    data: &PathBuf,
    now: Option<i64>,
    memory_cap: Option<usize>,
    json: bool,
) -> MainResult {
    let storage = load_storage(data)?;
    let plan = compile(query, resolve_now(now))?;
    for warning in &plan.warnings {
        eprintln!("Warning: {warning}");
    }

    let mut config = EngineConfig::from_env();
    if let Some(cap) = memory_cap {
        config.mem_cap_bytes = cap;
    }

    let registry = ExecutionRegistry::new();
    let results = ifql_exec::execute(
        &plan,
        &registry,
        storage,
        &config,
        Arc::new(AtomicBool::new(false)),
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results_json(&results))?);
        return Ok(());
    }
    for result in &results {
        println!("Result: {}", result.name);
        for block in &result.blocks {
            println!("  Block {}", block.bounds);
            let labels: Vec<&str> = block.cols.iter().map(|c| c.label.as_str()).collect();
            println!("    {}", labels.join("\t"));
            for i in 0..block.num_rows() {
                let row: Vec<String> = block
                    .row_values(i)
                    .iter()
                    .map(|v| v.to_string())
                    .collect();
                println!("    {}", row.join("\t"));
            }
        }
    }
    Ok(())
}

fn results_json(results: &[ifql_exec::QueryResult]) -> serde_json::Value {
    serde_json::Value::Array(
        results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.name.to_string(),
                    "blocks": r.blocks,
                })
            })
            .collect(),
    )
}

fn print_spec(query: &str) -> MainResult {
    let program = ifql_lang::parse(query)?;
    let registry = default_registry();
    let spec = ifql_lang::build_query(&program, &registry)?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}

fn explain(query: &str, now: Option<i64>) -> MainResult {
    let plan = compile(query, resolve_now(now))?;

    println!("Query Execution Plan");
    println!("====================");
    println!();
    println!("Now:    {}", plan.now);
    println!("Bounds: {}", plan.bounds);
    println!();
    println!("Procedures:");
    for id in &plan.order {
        if let Some(p) = plan.procedure(id) {
            let parents: Vec<String> = p.parents.iter().map(|x| x.to_string()).collect();
            println!(
                "  {} ({}){}",
                id,
                p.spec.kind(),
                if parents.is_empty() {
                    String::new()
                } else {
                    format!(" <- {}", parents.join(", "))
                }
            );
            if let ProcedureSpec::Select(s) = &p.spec {
                println!(
                    "      database={:?} bounds={} predicate={} limit={:?}",
                    s.database,
                    s.bounds.resolve(plan.now),
                    s.predicate_set,
                    s.limit
                );
            }
        }
    }
    println!();
    println!(
        "Results: {}",
        plan.results
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    for warning in &plan.warnings {
        println!("Warning: {warning}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_produces_pushed_down_plan() {
        let plan = compile(r#"from(db:"d").range(start:0, stop:10)"#, Time(0)).unwrap();
        assert_eq!(plan.order.len(), 1);
        let select = plan.procedure(&plan.results[0]).unwrap();
        assert!(matches!(select.spec, ProcedureSpec::Select(_)));
    }

    #[test]
    fn now_flag_overrides_clock() {
        assert_eq!(resolve_now(Some(42)), Time(42));
    }
}
