use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use workout_import::logging;
use workout_import::{
    CancelPolicy, ExerciseCatalogEntry, ImportConfig, ImportOutcome, ImportSession, ImportSource,
    ImportStatus, ImportSummary, InMemoryStore, MappingDecision, SqliteStore, StatusStream,
    WorkoutStore,
};

#[derive(Parser)]
#[command(name = "workout_import")]
#[command(about = "Import Strong and Hevy workout exports")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a CSV export
    Import {
        /// Path to the exported CSV file
        #[arg(long)]
        file: PathBuf,
        /// App the file came from. Available: strong, hevy
        #[arg(long, default_value = "strong")]
        source: ImportSource,
        /// Decision for an unmatched exercise: "Name=new" or "Name=<exercise id>"
        #[arg(long = "map")]
        mappings: Vec<String>,
        /// Skip mapping and discard pending exercise names
        #[arg(long)]
        cancel_unmatched: bool,
        /// What cancelling does with affected workouts: drop or retain
        #[arg(long, default_value = "drop")]
        cancel_policy: CancelPolicy,
        /// Use a throwaway in-memory store instead of the database
        #[arg(long)]
        in_memory: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the exercise catalog
    Exercises {
        #[command(subcommand)]
        action: ExerciseCommand,
    },
    /// Inspect imported workouts
    Workouts {
        #[command(subcommand)]
        action: WorkoutCommand,
    },
}

#[derive(Subcommand)]
enum ExerciseCommand {
    /// List catalog exercises
    List,
    /// Add an exercise to the catalog
    Add { name: String },
}

#[derive(Subcommand)]
enum WorkoutCommand {
    /// List stored workouts
    List,
}

fn parse_mappings(raw: &[String]) -> anyhow::Result<HashMap<String, MappingDecision>> {
    raw.iter()
        .map(|entry| {
            let (name, decision) = entry
                .rsplit_once('=')
                .ok_or_else(|| anyhow!("mapping '{entry}' must look like Name=new or Name=<id>"))?;
            let decision = decision
                .parse::<MappingDecision>()
                .map_err(|e| anyhow!("mapping '{entry}': {e}"))?;
            Ok((name.trim().to_string(), decision))
        })
        .collect()
}

fn spawn_status_printer(mut stream: StatusStream, quiet: bool) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(status) = stream.next().await {
            if quiet {
                continue;
            }
            match status {
                ImportStatus::Failed(_) | ImportStatus::NotStarted => {}
                other => println!("⏳ {}", other),
            }
        }
    })
}

fn print_summary(summary: &ImportSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("\n📊 Import Results ({}):", summary.source);
    if let Some(detected) = summary.format_override {
        println!("   ⚠️  Header identified a {} export; declared source was overridden", detected);
    }
    println!("   Data lines: {}", summary.data_lines);
    println!("   Rows parsed: {}", summary.rows_parsed);
    for (reason, count) in &summary.dropped_rows {
        println!("   Dropped ({}): {}", reason.as_str(), count);
    }
    println!("   Workouts saved: {}", summary.workouts_saved);
    println!("   Exercises created: {}", summary.exercises_created);
    println!("   References remapped: {}", summary.mappings_applied);
    if summary.workouts_dropped > 0 {
        println!("   Workouts dropped: {}", summary.workouts_dropped);
    }
    if !summary.unresolved_workouts.is_empty() {
        println!(
            "   Workouts kept unresolved (not saved): {}",
            summary.unresolved_workouts.len()
        );
    }
    println!("   File SHA-256: {}", summary.file_sha256);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_import(
    store: Arc<dyn WorkoutStore>,
    config: ImportConfig,
    file: PathBuf,
    source: ImportSource,
    mappings: Vec<String>,
    cancel_unmatched: bool,
    cancel_policy: CancelPolicy,
    json: bool,
) -> anyhow::Result<()> {
    let selections = parse_mappings(&mappings)?;
    let (mut session, stream) = ImportSession::new(store, config);
    let printer = spawn_status_printer(stream, json);

    let outcome = session
        .start_import(&file, source)
        .await
        .with_context(|| format!("import of {} failed", file.display()))?;

    let summary = match outcome {
        ImportOutcome::Completed(summary) => summary,
        ImportOutcome::NeedsMapping(pending) => {
            if !json {
                println!("\n🔎 {} exercises are not in the catalog:", pending.len());
                for exercise in &pending {
                    let decision = selections
                        .iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case(exercise.name.trim()))
                        .map(|(_, d)| match d {
                            MappingDecision::KeepNew => "new".to_string(),
                            MappingDecision::MapTo(id) => format!("-> {id}"),
                        })
                        .unwrap_or_else(|| "new (default)".to_string());
                    println!("   - {} [{}]", exercise.name, decision);
                }
            }
            if cancel_unmatched {
                warn!("Cancelling exercise mapping with policy {}", cancel_policy);
                session.cancel_mapping(cancel_policy).await?
            } else {
                session.confirm_exercise_mapping(selections).await?
            }
        }
    };

    print_summary(&summary, json)?;
    printer.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    let config = ImportConfig::load()?;
    info!("Loaded configuration: {:?}", config);

    match cli.command {
        Commands::Import {
            file,
            source,
            mappings,
            cancel_unmatched,
            cancel_policy,
            in_memory,
            json,
        } => {
            if !json {
                println!("📥 Importing {} ({})...", file.display(), source);
            }
            let store: Arc<dyn WorkoutStore> = if in_memory {
                Arc::new(InMemoryStore::new())
            } else {
                Arc::new(SqliteStore::open(&config.database_path)?)
            };
            run_import(
                store,
                config,
                file,
                source,
                mappings,
                cancel_unmatched,
                cancel_policy,
                json,
            )
            .await?;
        }
        Commands::Exercises { action } => {
            let store = SqliteStore::open(&config.database_path)?;
            match action {
                ExerciseCommand::List => {
                    let exercises = store.list_exercises().await?;
                    println!("📚 {} exercises", exercises.len());
                    for exercise in exercises {
                        println!("   {}  {}", exercise.id, exercise.name);
                    }
                }
                ExerciseCommand::Add { name } => {
                    let entry = ExerciseCatalogEntry {
                        id: Uuid::new_v4(),
                        name: name.trim().to_string(),
                    };
                    store.create_exercise(&entry).await?;
                    println!("✅ Added {} ({})", entry.name, entry.id);
                }
            }
        }
        Commands::Workouts { action } => {
            let store = SqliteStore::open(&config.database_path)?;
            match action {
                WorkoutCommand::List => {
                    let workouts = store.list_workouts().await?;
                    println!("🏋️ {} workouts", workouts.len());
                    for workout in workouts {
                        println!(
                            "   {}  {} ({} exercises, {} sets, {}s)",
                            workout.start,
                            workout.name,
                            workout.exercises.len(),
                            workout.set_count(),
                            workout.duration_seconds
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
