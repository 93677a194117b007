use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tkp_core::{AnswerResult, Confidence, EvaluationResult};
use tkp_trust::TrustGate;

mod app;
mod server;

use app::Settings;

#[derive(Parser)]
#[command(name = "tkp")]
#[command(about = "Trust-aware answers over an enterprise knowledge base", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
    },

    /// Answer a single question
    Ask {
        question: String,
        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },

    /// Score and check a saved retrieval result without calling any service
    Evaluate {
        /// JSON array of {vector_id, relevance_score, payload}
        file: PathBuf,
        /// Reference time for freshness (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("tkp=info,tkp_rag=info,tkp_trust=info,tkp_watsonx=info")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Serve { bind } => {
            let service = Arc::new(app::build_service(&settings).await?);
            server::serve(service, bind).await?;
        }
        Commands::Ask { question, json } => {
            let service = app::build_service(&settings).await?;
            let answer = service.answer(&question).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Commands::Evaluate { file, now } => {
            let now = match now {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("--now must be RFC 3339, got {}", raw))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            let chunks = app::load_retrieval(&file)?;
            let evaluation = TrustGate::new(&settings.trust).evaluate_retrieval_at(chunks, now);
            print_evaluation(&evaluation)?;
        }
    }

    Ok(())
}

fn print_answer(answer: &AnswerResult) {
    let confidence = match answer.confidence {
        Confidence::High => "high".green(),
        Confidence::Medium => "medium".yellow(),
        Confidence::Low => "low".red(),
    };

    println!("{}", answer.answer);
    println!();
    println!("{} {}", "Confidence:".bold(), confidence.bold());

    if !answer.sources.is_empty() {
        println!("{}", "Sources:".bold());
        for source in &answer.sources {
            let page = source
                .page
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let date = source.created_at.as_deref().unwrap_or("unknown");
            println!("  {} {} (page {}, {})", "•".cyan(), source.title, page, date);
        }
    }

    if !answer.conflicts.is_empty() {
        println!("{}", "Conflicts:".bold().yellow());
        for conflict in &answer.conflicts {
            println!(
                "  {} {} vs {}: {}",
                "⚠".yellow(),
                conflict.sources[0],
                conflict.sources[1],
                conflict.description
            );
        }
    }
}

fn print_evaluation(evaluation: &EvaluationResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(evaluation)?);
    Ok(())
}
