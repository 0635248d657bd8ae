//! Chat RAG command line interface
//!
//! Run with: cargo run -p chat-rag --bin chat-rag -- <command>

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_rag::config::RagConfig;
use chat_rag::conversation::ConversationSession;
use chat_rag::evaluation::{default_cases, load_cases, write_reports, Evaluator};
use chat_rag::generation::{is_weak_answer, strip_source_tags, truncate_for_display};
use chat_rag::pipeline::RagPipeline;
use chat_rag::types::PipelineResult;

/// Longest answer printed to the terminal
const MAX_DISPLAY_CHARS: usize = 1900;

const WEAK_ANSWER_HELP: &str =
    "I couldn't find that in the knowledge base. Try rephrasing, or ask about a topic the ingested documents cover.";

#[derive(Parser)]
#[command(name = "chat-rag")]
#[command(about = "Conversational question answering over your documents, with source citations", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat with conversation memory
    Chat {
        /// Passages retrieved per question
        #[arg(short, long)]
        top_k: Option<usize>,

        /// Show raw answers with source tags
        #[arg(long)]
        raw: bool,
    },

    /// Answer one question
    Ask {
        /// The question
        question: String,

        /// Passages retrieved per question
        #[arg(short, long)]
        top_k: Option<usize>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Retrieve passages without generating an answer
    Search {
        /// Query text
        query: String,

        /// Number of results to return
        #[arg(short, long, default_value = "3")]
        top_k: usize,
    },

    /// Replace the passage store with chunks of the given .txt/.md files or directories
    Ingest {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Evaluate answers against expected keywords
    Eval {
        /// JSON file with [{"query", "expected_keywords"}] cases
        #[arg(long)]
        tests: Option<PathBuf>,

        /// Output folder for reports
        #[arg(long, default_value = "reports")]
        out_dir: PathBuf,

        /// Passages retrieved per question
        #[arg(long, default_value = "3")]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_rag=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = RagConfig::load(cli.config.as_deref())?;
    let pipeline = RagPipeline::from_config(&config).await?;

    match cli.command {
        Commands::Chat { top_k, raw } => {
            chat(&pipeline, config.conversation.history_capacity, top_k, raw).await?
        }
        Commands::Ask {
            question,
            top_k,
            json,
        } => {
            let spinner = spinner("Thinking...");
            let result = pipeline.run(&question, top_k).await;
            spinner.finish_and_clear();
            let result = result?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result, false);
            }
        }
        Commands::Search { query, top_k } => {
            let spinner = spinner("Searching...");
            let passages = pipeline.retriever().retrieve(&query, top_k).await;
            spinner.finish_and_clear();

            let passages = passages?;
            if passages.is_empty() {
                println!("{}", style("No passages found.").yellow());
            }
            for (i, passage) in passages.iter().enumerate() {
                println!(
                    "{} {} {}",
                    style(format!("{}.", i + 1)).bold(),
                    style(&passage.source).cyan(),
                    style(format!("score={:.4}", passage.score)).dim()
                );
                println!("   {}\n", truncate_for_display(&passage.text, 300));
            }
        }
        Commands::Ingest { paths } => {
            let spinner = spinner("Embedding passages...");
            let report = pipeline.ingest_paths(&paths).await;
            spinner.finish_and_clear();
            let report = report?;

            println!(
                "{} Ingested {} passages from {} files into {}",
                style("✓").green(),
                report.passages,
                report.files,
                pipeline.store().name()
            );
        }
        Commands::Eval {
            tests,
            out_dir,
            top_k,
        } => {
            let cases = match tests {
                Some(path) => load_cases(&path)?,
                None => default_cases(),
            };

            println!("Running {} tests...", cases.len());
            let spinner = spinner("Evaluating...");
            let results = Evaluator::new(&pipeline, top_k).run_all(&cases).await;
            spinner.finish_and_clear();

            let (results_path, report_path) = write_reports(&results, &out_dir)?;
            println!("Saved raw results: {}", results_path.display());
            println!("Saved markdown report: {}", report_path.display());
        }
    }

    Ok(())
}

async fn chat(
    pipeline: &RagPipeline,
    history_capacity: usize,
    top_k: Option<usize>,
    raw: bool,
) -> anyhow::Result<()> {
    let mut session = ConversationSession::new(history_capacity);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!(
        "{}",
        style("Chat started. Type 'exit' or 'quit' to leave.").bold()
    );

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let spinner = spinner("Thinking...");
        let outcome = pipeline.chat_turn(&mut session, input, top_k).await;
        spinner.finish_and_clear();

        match outcome {
            Ok(result) => print_result(&result, raw),
            Err(e) => eprintln!("{} {}", style("error:").red().bold(), e),
        }
    }

    println!("Bye!");
    Ok(())
}

fn print_result(result: &PipelineResult, raw: bool) {
    if result.generation_failed {
        println!("{}", style(&result.answer).red());
        return;
    }

    let answer = if raw {
        result.answer.clone()
    } else {
        let clean = strip_source_tags(&result.answer);
        if is_weak_answer(&clean) {
            WEAK_ANSWER_HELP.to_string()
        } else {
            clean
        }
    };

    println!("{}", truncate_for_display(&answer, MAX_DISPLAY_CHARS));
    if !result.sources.is_empty() {
        println!(
            "{} {}",
            style("Sources:").dim(),
            style(result.sources.join(", ")).cyan()
        );
    }
    if result.cached {
        println!("{}", style("(cached)").dim());
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(progress_style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(progress_style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
