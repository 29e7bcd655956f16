//! LogProb Ranker - Rank LLM outputs by self-evaluation
//!
//! Generates several variants of a response, asks the model to judge each one
//! against a criteria template, and keeps the ranked runs in a gallery that can
//! be browsed from the desktop app.

mod core;
mod llm;
mod persistence;
mod ui;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::{
    AppState, Example, ExampleId, LogProbRanker, RankedOutput, RankerConfig, RunReport, Settings,
    StoredExample,
};
use crate::llm::{ChatMessage, OpenAiClient, Provider};
use crate::persistence::{report, Database};
use crate::ui::RankerApp;

/// Application name constant
pub const APP_NAME: &str = "logprob-ranker";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "logprob-ranker", version, about = "Rank LLM outputs by self-evaluation")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate variants for a prompt and rank them
    Rank(RankArgs),
    /// Score a text per criterion by the logprob of the evaluator's verdict
    Score(ScoreArgs),
    /// Complete a prompt and report the average token logprob
    Evaluate(EvaluateArgs),
    /// Open the desktop gallery (default)
    Gallery,
}

/// Model selection shared by every command that calls the API
#[derive(clap::Args, Debug)]
struct BackendArgs {
    /// Model to use; OpenRouter short names are expanded
    #[arg(short, long, default_value = "gpt-3.5-turbo")]
    model: String,

    /// API key; falls back to the provider's environment variable
    #[arg(long)]
    api_key: Option<String>,

    /// Chat completion provider; defaults to the saved setting
    #[arg(long, value_enum)]
    provider: Option<Provider>,
}

#[derive(clap::Args, Debug)]
struct ScoreArgs {
    /// Text to score
    text: String,

    /// File containing the criteria template
    #[arg(short = 'c', long)]
    template: Option<PathBuf>,

    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(clap::Args, Debug)]
struct EvaluateArgs {
    /// Prompt to complete
    prompt: String,

    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(clap::Args, Debug)]
struct RankArgs {
    /// Prompt to generate responses for
    prompt: String,

    /// Number of variants to generate
    #[arg(short = 'n', long, default_value_t = 3)]
    variants: u32,

    /// Sampling temperature for generation
    #[arg(short, long, default_value_t = 0.7)]
    temperature: f32,

    /// Maximum variants in flight at once
    #[arg(long, default_value_t = 1)]
    threads: u32,

    /// File containing the criteria template
    #[arg(short = 'c', long)]
    template: Option<PathBuf>,

    /// Write the ranked results to this JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    backend: BackendArgs,
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    info!("{} v{} starting...", APP_NAME, APP_VERSION);

    match cli.command.unwrap_or(Command::Gallery) {
        Command::Rank(args) => run_rank(args),
        Command::Score(args) => run_score(args),
        Command::Evaluate(args) => run_evaluate(args),
        Command::Gallery => run_gallery(),
    }
}

/// Initialize the logging system
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("logprob_ranker=info,eframe=warn,egui=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database() -> Result<Database> {
    let db = Database::new()?;
    db.initialize()?;
    info!("Database initialized");
    Ok(db)
}

/// Gallery database, if it can be opened
fn try_open_database() -> Option<Database> {
    match open_database() {
        Ok(db) => Some(db),
        Err(e) => {
            warn!("Gallery database unavailable: {}", e);
            None
        }
    }
}

/// Client for the command line flags, on top of the saved settings
fn build_client(args: &BackendArgs, database: Option<&Database>) -> Result<(OpenAiClient, Settings)> {
    // Saved settings supply the API base, timeout and run defaults
    let mut settings = database
        .and_then(|db| db.load_settings().ok().flatten())
        .unwrap_or_default();

    if let Some(provider) = args.provider {
        if provider != settings.provider {
            settings.api_base = None;
        }
        settings.provider = provider;
    }
    settings.model = args.model.clone();

    let client = OpenAiClient::from_settings(&settings, args.api_key.as_deref())
        .context("Failed to create API client")?;
    info!("Using model {} at {}", client.model(), client.base_url());
    Ok((client, settings))
}

fn read_template(path: &Path) -> Result<String> {
    report::load_template(path).with_context(|| format!("Failed to read template {:?}", path))
}

/// `rank` subcommand
fn run_rank(args: RankArgs) -> Result<()> {
    let database = try_open_database();
    let (client, settings) = build_client(&args.backend, database.as_ref())?;

    let mut config = RankerConfig {
        temperature: args.temperature,
        num_variants: args.variants,
        thread_count: args.threads,
        ..settings.ranker
    };
    if let Some(path) = &args.template {
        config.template = read_template(path)?;
    }

    let ranker = LogProbRanker::new(client, config)?.with_callback(|output| {
        println!(
            "Generated output {} with score: {:.3}",
            output.index + 1,
            output.logprob
        );
        Ok(())
    });

    println!("Generating and ranking {} outputs...", args.variants);
    let results = ranker.rank_outputs_blocking(&args.prompt)?;
    print_results(&results);

    let run = RunReport::new(args.prompt.clone(), results, ranker.config());
    finish_run(run, args.output.as_deref(), database.as_ref());
    Ok(())
}

/// Write the report file and record the run in the gallery.
///
/// Neither step can fail the command once results are printed.
fn finish_run(run: RunReport, output: Option<&Path>, database: Option<&Database>) -> Option<ExampleId> {
    if let Some(path) = output {
        match report::save_report(path, &run) {
            Ok(()) => println!("\nResults saved to {}", path.display()),
            Err(e) => {
                warn!("Failed to write report {:?}: {}", path, e);
                eprintln!("Error saving results to {}: {}", path.display(), e);
            }
        }
    }

    let db = database?;
    let stored = StoredExample::new(Example::from(run));
    match db.save_example(&stored) {
        Ok(()) => {
            info!("Run recorded in gallery as {}", stored.id);
            Some(stored.id)
        }
        Err(e) => {
            warn!("Failed to record run in gallery: {}", e);
            None
        }
    }
}

/// `score` subcommand
fn run_score(args: ScoreArgs) -> Result<()> {
    let database = try_open_database();
    let (client, settings) = build_client(&args.backend, database.as_ref())?;
    let template = args.template.as_deref().map(read_template).transpose()?;

    let ranker = LogProbRanker::new(client, settings.ranker)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let scores = runtime.block_on(ranker.score_text_attributes(&args.text, template.as_deref()))?;

    println!("Attribute logprobs:");
    for attr in &scores {
        println!("  {}: {:.4}", attr.name, attr.score);
    }
    Ok(())
}

/// `evaluate` subcommand
fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let database = try_open_database();
    let (client, settings) = build_client(&args.backend, database.as_ref())?;

    let ranker = LogProbRanker::new(client, settings.ranker)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(ranker.evaluate_text(vec![ChatMessage::user(args.prompt)]))?;

    println!("{}", result.text);
    println!(
        "\nAverage token logprob: {:.4} over {} tokens",
        result.average_logprob, result.num_tokens
    );
    Ok(())
}

fn print_results(results: &[RankedOutput]) {
    println!("\nRanked outputs:");
    for (rank, result) in results.iter().enumerate() {
        println!("\n{}. Score: {:.3}", rank + 1, result.logprob);
        println!("{}", result.output);

        if let Some(scores) = &result.attribute_scores {
            println!("Attribute scores:");
            for attr in scores {
                if attr.explanation.is_empty() {
                    println!("  {}: {:.3}", attr.name, attr.score);
                } else {
                    println!("  {}: {:.3} ({})", attr.name, attr.score, attr.explanation);
                }
            }
        }
    }
}

/// `gallery` subcommand
fn run_gallery() -> Result<()> {
    let app_state = AppState::new(open_database()?)?;
    info!("Application state initialized");

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_icon(load_app_icon()),
        ..Default::default()
    };

    info!("Starting GUI...");
    eframe::run_native(
        &format!("LogProb Ranker v{}", APP_VERSION),
        native_options,
        Box::new(|cc| Ok(Box::new(RankerApp::new(cc, app_state)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run application: {}", e))?;

    info!("{} shutting down", APP_NAME);
    Ok(())
}

/// Teal diamond drawn into an RGBA buffer
fn load_app_icon() -> egui::IconData {
    let size = 64;
    let mut rgba = vec![0u8; size * size * 4];
    let half = size as f32 / 2.0;

    for y in 0..size {
        for x in 0..size {
            let idx = (y * size + x) * 4;
            let dist = (x as f32 - half).abs() + (y as f32 - half).abs();

            if dist < half - 2.0 {
                let t = dist / half;
                rgba[idx] = (20.0 + t * 40.0) as u8;
                rgba[idx + 1] = (184.0 - t * 50.0) as u8;
                rgba[idx + 2] = (166.0 - t * 40.0) as u8;
                rgba[idx + 3] = 255;
            }
        }
    }

    egui::IconData {
        rgba,
        width: size as u32,
        height: size as u32,
    }
}
