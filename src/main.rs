//! `srag` — support question answering over product docs and support
//! tickets.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use support_rag::config::{load_config, Config};
use support_rag::dataset::load_all;
use support_rag::eval::{evaluate, safe_load_test_queries};
use support_rag::index::CorpusIndex;
use support_rag::inspect;
use support_rag::pipeline::{answer_query, trace_query, QueryResponse};
use support_rag::server::run_server;

#[derive(Parser)]
#[command(
    name = "srag",
    version,
    about = "Answer support questions over product docs and support tickets"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "./config/srag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question; opens an interactive shell when no text is given
    Query {
        /// Question text
        text: Vec<String>,

        /// Number of results to retrieve
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Run the test-query evaluation harness
    Eval {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the ranking trace for a query as JSON
    Trace {
        /// Question text
        #[arg(required = true)]
        text: Vec<String>,

        /// Number of results to retrieve
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Inspect the indexed corpus
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// Start the HTTP API server
    Serve,
}

#[derive(Subcommand)]
enum DbCommand {
    /// Document and chunk counts
    Stats,

    /// List chunk previews with metadata
    List {
        /// Maximum number of chunks to print
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Equality filter as a JSON object, e.g. '{"source": "ticket"}'
        #[arg(long = "where")]
        where_filter: Option<String>,
    },

    /// Show one chunk in full
    Show {
        /// Chunk id, as printed by `db list`
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Query { text, top_k, json } => {
            let index = build_index(&config).await?;
            let top_k = top_k.unwrap_or(config.retrieval.top_k);
            if text.is_empty() {
                interactive_shell(&index, top_k, json).await?;
            } else {
                let query = text.join(" ");
                let resp = answer_query(&index, &query, top_k).await;
                print_response(&resp, json)?;
            }
        }

        Command::Eval { json } => {
            let index = build_index(&config).await?;
            let queries = safe_load_test_queries(&config.dataset.dir.join("test_queries.json"));
            let report = evaluate(&index, &queries).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Passed {}/{} test queries.", report.passed, report.total);
                for note in &report.notes {
                    println!("  FAIL {}", note);
                }
            }
        }

        Command::Trace { text, top_k } => {
            let index = build_index(&config).await?;
            let query = text.join(" ");
            let trace = trace_query(&index, &query, top_k.unwrap_or(config.retrieval.top_k)).await;
            println!("{}", serde_json::to_string_pretty(&trace)?);
        }

        Command::Db { command } => {
            let index = build_index(&config).await?;
            match command {
                DbCommand::Stats => {
                    println!("{}", serde_json::to_string_pretty(&inspect::stats(&index))?);
                }
                DbCommand::List {
                    limit,
                    where_filter,
                } => {
                    let filter = where_filter
                        .as_deref()
                        .map(serde_json::from_str::<serde_json::Value>)
                        .transpose()
                        .map_err(|e| anyhow::anyhow!("invalid where filter: {}", e))?;
                    let entries = inspect::list(&index, limit, filter.as_ref())?;
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                }
                DbCommand::Show { id } => match inspect::show(&index, &id) {
                    Some(chunk) => println!("{}", serde_json::to_string_pretty(&chunk)?),
                    None => anyhow::bail!("no chunk with id: {}", id),
                },
            }
        }

        Command::Serve => {
            run_server(&config).await?;
        }
    }

    Ok(())
}

async fn build_index(config: &Config) -> Result<CorpusIndex> {
    let documents = load_all(&config.dataset.dir)?;
    let index = CorpusIndex::build(config, documents).await?;
    eprintln!(
        "Indexed {} documents into {} chunks",
        index.documents().len(),
        index.chunks().len()
    );
    Ok(index)
}

/// Read-answer loop on stdin. An empty line, "exit", or "quit" ends it.
async fn interactive_shell(index: &CorpusIndex, top_k: usize, json: bool) -> Result<()> {
    let stdin = std::io::stdin();
    loop {
        print!("Query> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() || query == "exit" || query == "quit" {
            break;
        }

        let resp = answer_query(index, query, top_k).await;
        print_response(&resp, json)?;
        println!();
    }
    Ok(())
}

fn print_response(resp: &QueryResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(resp)?);
        return Ok(());
    }
    println!("Answer:\n{}", resp.answer);
    println!("\nConfidence: {:.2}", resp.confidence);
    println!("Citations:");
    for citation in &resp.citations {
        println!("  - {}", citation);
    }
    Ok(())
}
