use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lineup::config::Config;
use lineup::filler::{ChannelFillerList, FillerPicker, PlayRecord};
use lineup::infinite::{BufferMaintainer, GeneratedScheduleItem, InfiniteSchedule, InfiniteScheduleService};
use lineup::models::{DAY_MS, MINUTE_MS};
use lineup::pool::ProgramPool;
use lineup::random::SeededRng;
use lineup::scheduler::{
    Lineup, RandomSlotSchedule, RandomSlotScheduler, RunOptions, TimeSlotSchedule, TimeSlotScheduler,
};
use lineup::storage::{
    create_sqlite_repository, PlayHistoryRepository, SqlitePlayHistoryRepository,
};

#[derive(Parser)]
#[command(
    name = "lineup",
    version,
    about = "Scheduling engine for a personal linear-television emulator",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

/// Seed and start options shared by the one-shot schedulers
#[derive(clap::Args)]
struct RunArgs {
    /// Schedule definition (JSON)
    #[arg(short, long)]
    schedule: PathBuf,

    /// Program pool (JSON)
    #[arg(short, long)]
    pool: PathBuf,

    /// Start time, RFC 3339 or epoch milliseconds (default: now)
    #[arg(long)]
    start: Option<String>,

    /// Seed words, comma separated (default: fresh seed)
    #[arg(long)]
    seed: Option<String>,

    /// Random draws to discard before generating
    #[arg(long, default_value = "0")]
    discard: u64,

    /// Print the lineup as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a lineup from a time-slot schedule
    TimeSlots(RunArgs),

    /// Generate a lineup from a random-slot schedule
    RandomSlots(RunArgs),

    /// Store an infinite schedule definition
    Import {
        /// Infinite schedule definition (JSON)
        definition: PathBuf,

        /// Replace an existing schedule with the same id
        #[arg(long)]
        update: bool,
    },

    /// Extend the buffer of an infinite schedule
    Generate {
        schedule_id: String,

        /// Program pool (JSON)
        #[arg(short, long)]
        pool: PathBuf,

        /// Print the items without storing anything
        #[arg(long)]
        preview: bool,

        /// Window start, RFC 3339 or epoch milliseconds
        #[arg(long)]
        from: Option<String>,

        /// Window end, RFC 3339 or epoch milliseconds
        #[arg(long)]
        to: Option<String>,
    },

    /// Force regeneration of an infinite schedule's buffer
    Regenerate {
        schedule_id: String,

        /// Program pool (JSON)
        #[arg(short, long)]
        pool: PathBuf,

        /// Delete future items first
        #[arg(long)]
        clear: bool,
    },

    /// Give every slot of a schedule a fresh random seed
    ResetSeeds { schedule_id: String },

    /// Show persisted state and buffer figures of a schedule
    Diagnostics { schedule_id: String },

    /// Keep every infinite schedule's buffer filled
    Maintain {
        /// Program pool (JSON)
        #[arg(short, long)]
        pool: PathBuf,

        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
    },

    /// Pick one filler program for a gap
    PickFiller {
        /// Channel filler lists (JSON array)
        #[arg(short, long)]
        lists: PathBuf,

        /// Channel whose play history is consulted
        #[arg(long)]
        channel: String,

        /// Longest acceptable filler, in milliseconds
        #[arg(long)]
        max_duration: i64,

        /// Seed words, comma separated
        #[arg(long)]
        seed: Option<String>,

        /// Record the pick in the play history
        #[arg(long)]
        record: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(db) = &cli.db {
        config.storage.sqlite_path = db.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    config.validate()?;

    // Initialize tracing/logging
    setup_tracing(&config.logging.format, cli.verbose)?;

    if let Err(e) = lineup::metrics::init_metrics() {
        tracing::warn!("Metrics initialization failed: {}", e);
    }

    match cli.command {
        Commands::TimeSlots(args) => {
            let schedule: TimeSlotSchedule = read_json(&args.schedule)?;
            let pool: ProgramPool = read_json(&args.pool)?;
            let options = run_options(&args, &config)?;
            tracing::info!(slots = schedule.slots.len(), start_ms = options.start_ms, "Starting time-slot run");
            let lineup = TimeSlotScheduler::new(&schedule, &pool).generate(&options)?;
            print_lineup(&lineup, args.json)?;
        }

        Commands::RandomSlots(args) => {
            let schedule: RandomSlotSchedule = read_json(&args.schedule)?;
            let pool: ProgramPool = read_json(&args.pool)?;
            let options = run_options(&args, &config)?;
            tracing::info!(slots = schedule.slots.len(), start_ms = options.start_ms, "Starting random-slot run");
            let lineup = RandomSlotScheduler::new(&schedule, &pool).generate(&options)?;
            print_lineup(&lineup, args.json)?;
        }

        Commands::Import { definition, update } => {
            let schedule: InfiniteSchedule = read_json(&definition)?;
            let service = build_service(&config, ProgramPool::new())?;
            let now = now_ms();
            let saved = if update {
                service.update_schedule(schedule, now)?
            } else {
                service.create_schedule(schedule, now)?
            };
            println!("Stored schedule {} with {} slots", saved.id, saved.slots.len());
        }

        Commands::Generate {
            schedule_id,
            pool,
            preview,
            from,
            to,
        } => {
            let service = build_service(&config, read_json(&pool)?)?;
            let now = now_ms();
            let from = from.as_deref().map(parse_time).transpose()?;
            let to = to.as_deref().map(parse_time).transpose()?;

            if preview {
                let from = from.unwrap_or(now);
                let to = to.unwrap_or(from + DAY_MS);
                let items = service.preview(&schedule_id, from, to).await?;
                print_items(&items);
            } else {
                let report = service.generate_and_commit(&schedule_id, now, from, to).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        Commands::Regenerate {
            schedule_id,
            pool,
            clear,
        } => {
            let service = build_service(&config, read_json(&pool)?)?;
            let report = service.regenerate(&schedule_id, now_ms(), clear).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::ResetSeeds { schedule_id } => {
            let service = build_service(&config, ProgramPool::new())?;
            service.reset_seeds(&schedule_id)?;
            println!("Seeds reset for schedule {schedule_id}");
        }

        Commands::Diagnostics { schedule_id } => {
            let service = build_service(&config, ProgramPool::new())?;
            let diagnostics = service.diagnostics(&schedule_id)?;
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        }

        Commands::Maintain { pool, once } => {
            let service = Arc::new(build_service(&config, read_json(&pool)?)?);
            let maintainer = BufferMaintainer::new(service, config.maintenance_settings());
            if once {
                let report = maintainer.run_once(now_ms()).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let (tx, rx) = tokio::sync::watch::channel(false);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        let _ = tx.send(true);
                    }
                });
                tracing::info!(interval_secs = config.maintenance.interval_secs, "Starting buffer maintenance");
                maintainer.run_forever(rx).await;
            }
        }

        Commands::PickFiller {
            lists,
            channel,
            max_duration,
            seed,
            record,
        } => {
            let lists: Vec<ChannelFillerList> = read_json(&lists)?;
            let history_repo = SqlitePlayHistoryRepository::new(&config.storage.sqlite_path)?;
            let now = now_ms();
            let history = history_repo.history_for_channel(&channel, now - DAY_MS)?;

            let mut rng = match seed.as_deref() {
                Some(words) => SeededRng::from_seed(&parse_seed(words)?),
                None => SeededRng::fresh(),
            };
            let picker = FillerPicker::new(config.engine.filler_repeat_cooldown_ms);
            let pick = picker.pick(&lists, &history, max_duration, now, &mut rng);

            if record {
                if let Some(program) = &pick.program {
                    history_repo.record_play(&channel, &PlayRecord::new(&program.id, pick.list_id.as_deref(), now))?;
                }
            }
            println!("{}", serde_json::to_string_pretty(&pick)?);
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("lineup=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("lineup=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// RFC 3339 timestamp or epoch milliseconds
fn parse_time(value: &str) -> Result<i64> {
    if let Ok(ms) = value.parse::<i64>() {
        return Ok(ms);
    }
    let parsed = chrono::DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid time '{value}'"))?;
    Ok(parsed.timestamp_millis())
}

fn parse_seed(words: &str) -> Result<Vec<u32>> {
    words
        .split(',')
        .map(|w| {
            w.trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid seed word '{w}'"))
        })
        .collect()
}

fn run_options(args: &RunArgs, config: &Config) -> Result<RunOptions> {
    let start = args.start.as_deref().map(parse_time).transpose()?.unwrap_or_else(now_ms);
    let mut options = RunOptions::starting_at(start)
        .with_discard(args.discard)
        .with_max_items(config.engine.max_lineup_items);
    if let Some(seed) = &args.seed {
        options = options.with_seed(parse_seed(seed)?);
    }
    Ok(options)
}

fn build_service(config: &Config, pool: ProgramPool) -> Result<InfiniteScheduleService> {
    let repo = create_sqlite_repository(&config.storage.sqlite_path)?;
    Ok(InfiniteScheduleService::new(repo, Arc::new(pool))
        .with_max_items(config.engine.max_lineup_items)
        .with_default_buffer_days(config.engine.default_buffer_days))
}

fn format_time(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn format_duration(ms: i64) -> String {
    let minutes = ms / MINUTE_MS;
    let seconds = (ms % MINUTE_MS) / 1000;
    format!("{minutes:>4}:{seconds:02}")
}

fn print_lineup(lineup: &Lineup, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(lineup)?);
        return Ok(());
    }

    for item in &lineup.items {
        let title = item
            .program
            .program()
            .map(|p| p.title.as_str())
            .unwrap_or("");
        println!(
            "{}  {}  {:<8}  {}",
            format_time(item.start_ms),
            format_duration(item.duration_ms),
            item.kind(),
            title
        );
    }
    let seed = lineup
        .seed
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    println!("seed={seed} discard={} next_discard={}", lineup.discard_count, lineup.final_use_count);
    Ok(())
}

fn print_items(items: &[GeneratedScheduleItem]) {
    for item in items {
        println!(
            "{:>6}  {}  {}  {:<8}  {}",
            item.sequence_index,
            format_time(item.start_time_ms),
            format_duration(item.duration_ms),
            item.item_type.as_str(),
            item.program_id
                .as_deref()
                .or(item.redirect_channel_id.as_deref())
                .unwrap_or("")
        );
    }
}
