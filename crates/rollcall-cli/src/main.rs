use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{
    roll_call, CandidatePoolBuilder, ClassId, Report, RollEntry, Roster, SessionContext,
    SessionSummary, SpaceId, StudentId, Threshold,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

mod capture;
mod config;
mod engine;

use capture::{Capture, RecordedEncoder};
use config::Config;
use engine::Engine;

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Classroom attendance by face matching")]
struct Cli {
    /// Path to a TOML config file (defaults to $ROLLCALL_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match recorded captures of one session against the class roster
    Match {
        /// Roster JSON exported from the enrollment store
        #[arg(short, long)]
        roster: PathBuf,
        /// Class the session belongs to
        #[arg(short, long)]
        class: ClassId,
        /// Capture JSON, one per photo; repeat for multi-photo sessions
        #[arg(long = "capture", required = true)]
        captures: Vec<PathBuf>,
        /// Override the configured similarity threshold
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Show the candidate pool for a class
    Pool {
        #[arg(short, long)]
        roster: PathBuf,
        #[arg(short, long)]
        class: ClassId,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Serialize)]
struct MatchOutput {
    class_id: ClassId,
    space: SpaceId,
    threshold: Threshold,
    reports: Vec<Report>,
    summary: SessionSummary,
    roll: Vec<RollEntry>,
}

#[derive(Serialize)]
struct PoolEntry<'a> {
    student_id: StudentId,
    name: &'a str,
    space: &'a SpaceId,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Match {
            roster,
            class,
            captures,
            threshold,
            pretty,
        } => {
            let threshold = match threshold {
                Some(t) => Threshold::new(t)?,
                None => config.similarity_threshold,
            };
            let output = run_match(&config, &roster, class, &captures, threshold).await?;
            let json = if pretty {
                serde_json::to_string_pretty(&output)?
            } else {
                serde_json::to_string(&output)?
            };
            println!("{json}");
        }
        Commands::Pool { roster, class } => {
            let roster = load_roster(&roster)?;
            let session = SessionContext { class_id: class, space: config.space.clone() };
            let pool = CandidatePoolBuilder::new(&roster).build(&session)?;
            let entries: Vec<PoolEntry> = pool
                .iter()
                .map(|c| PoolEntry {
                    student_id: c.student_id,
                    name: &c.display.name,
                    space: &c.embedding.space,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

async fn run_match(
    config: &Config,
    roster: &Path,
    class_id: ClassId,
    captures: &[PathBuf],
    threshold: Threshold,
) -> Result<MatchOutput> {
    let roster = load_roster(roster)?;
    let session = SessionContext { class_id, space: config.space.clone() };
    let pool = CandidatePoolBuilder::new(&roster)
        .build(&session)
        .with_context(|| format!("building candidate pool for class {class_id}"))?;

    let captures = captures
        .iter()
        .map(|path| Capture::from_file(path))
        .collect::<Result<Vec<_>>>()?;

    let mut encoder = RecordedEncoder::new(config.space.clone());
    for (photo, capture) in captures.iter().enumerate() {
        encoder.record(photo, capture);
    }

    let engine = Engine::initialize(Box::new(encoder), config.request_queue_depth)?;
    let handle = engine.handle();

    let mut reports = Vec::with_capacity(captures.len());
    for (photo, capture) in captures.iter().enumerate() {
        let report = handle
            .recognize(capture.regions(photo), pool.clone(), threshold)
            .await
            .with_context(|| format!("matching photo {photo}"))?;
        tracing::info!(
            photo,
            faces = report.total_faces_detected,
            recognized = report.total_recognized,
            outcome = ?report.outcome,
            "photo matched"
        );
        reports.push(report);
    }
    engine.shutdown().await?;

    let summary = SessionSummary::merge(&reports);
    let roll = roll_call(&pool, &summary);

    Ok(MatchOutput {
        class_id,
        space: config.space.clone(),
        threshold,
        reports,
        summary,
        roll,
    })
}

fn load_roster(path: &Path) -> Result<Roster> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading roster {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing roster {}", path.display()))
}
