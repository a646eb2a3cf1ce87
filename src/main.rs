//! Emoji Atlas CLI - record reaction events and browse the leaderboards

use clap::{Parser, Subcommand};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use emoji_atlas::atlas::{NoHistory, PrecomputedSentiment, TopEmojisQuery};
use emoji_atlas::config::{self, AtlasConfig};
use emoji_atlas::model::EmojiCount;
use emoji_atlas::ui::{self, Icons, Spinner};
use emoji_atlas::{ingest, view, Atlas, Database, Dispatcher, Sentiment, ShutdownHandle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "emoji-atlas")]
#[command(version = "0.0.1")]
#[command(about = "Emoji reaction leaderboards backed by a single-writer SQLite store")]
#[command(long_about = r#"
Emoji Atlas records emoji reactions on chat messages, scores the reacted-to
messages for sentiment, and serves leaderboards:
  • Most used and most removed emoji
  • Recently added or first used emoji
  • Top reactions for positive, neutral and negative messages

Example usage:
  emoji-atlas init
  emoji-atlas ingest --file events.jsonl
  emoji-atlas top --sentiment positive --limit 5
  emoji-atlas suggest --compound -0.4
  emoji-atlas user "<@U123|ana> <#C456|general>"
  emoji-atlas home --json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./emoji-atlas.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the database
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Record JSON-lines platform events (file or stdin)
    Ingest {
        /// Events file; reads stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Most used emoji
    Top {
        /// Count removals instead of additions
        #[arg(long)]
        removals: bool,

        /// Only reactions on messages of this sentiment
        #[arg(short, long)]
        sentiment: Option<Sentiment>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Most recently added or first used emoji
    Recent {
        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Top emoji used by one user
    User {
        /// Platform user id, or `/top-emojis` text such as `<@U123|ana> <#C456|general>`
        id: String,

        /// Only reactions in this channel
        #[arg(long)]
        channel: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Print the Block Kit modal instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Suggest reactions for a message with the given compound score
    Suggest {
        /// Compound sentiment score of the message (-1.0 to 1.0)
        #[arg(long, allow_hyphen_values = true)]
        compound: f64,

        /// Maximum number of suggestions (defaults to the config)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the Block Kit modal instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Render the home tab leaderboards
    Home {
        /// Print Block Kit JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Show row counts for every table
    Stats,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);

    if let Commands::Init { force } = cli.command {
        return init(&config_path, cli.database.as_deref(), force);
    }

    let config = config::load_config(Some(&config_path))?.unwrap_or_default();
    let db_path = match &cli.database {
        Some(path) => path.clone(),
        None => config.database_path_in(&std::env::current_dir()?),
    };
    config::ensure_db_dir(&db_path)?;

    let dispatcher = Dispatcher::open(&db_path)?;
    let db = dispatcher.database();
    tracing::debug!("Opened {}", db_path.display());

    let result = run(cli.command, &db, &dispatcher, &config, &db_path);

    // A shutdown signal may already have closed the dispatcher
    if let Err(e) = db.close() {
        tracing::debug!("Close after shutdown: {}", e);
    }
    drop(db);
    dispatcher.join()?;
    result
}

fn run(
    command: Commands,
    db: &Database,
    dispatcher: &Dispatcher,
    config: &AtlasConfig,
    db_path: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Init { .. } => Ok(()),
        Commands::Ingest { file } => run_ingest(db, dispatcher.shutdown_handle(), config, file.as_deref()),
        Commands::Top { removals, sentiment, limit } => {
            let n = limit.unwrap_or(config.leaderboard_size);
            let entries = match sentiment {
                Some(sentiment) => db.top_n_by_sentiment(n, sentiment, removals)?,
                None => db.top_n_emojis(n, removals)?,
            };
            let title = match (sentiment, removals) {
                (Some(s), _) => format!("Top reactions for {} messages", s),
                (None, true) => "Most removed emoji".to_string(),
                (None, false) => "Most used emoji".to_string(),
            };
            print_counts(&title, &entries);
            Ok(())
        }
        Commands::Recent { limit } => {
            let entries = db.top_n_recent(limit.unwrap_or(config.leaderboard_size))?;
            ui::header("Most recently added or first used");
            if entries.is_empty() {
                ui::nothing_yet();
            } else {
                println!("{}", ui::recent_table(&entries));
            }
            Ok(())
        }
        Commands::User { id, channel, limit, json } => {
            let atlas = offline_atlas(db, config);
            let found = if id.trim_start().starts_with("<@") {
                atlas.user_top_emojis(&id, limit)?
            } else {
                let query = TopEmojisQuery { user: id, channel };
                let emojis = atlas.top_emojis_for(&query, limit)?;
                Some((query, emojis))
            };

            if json {
                let modal = view::top_emojis_modal(found.as_ref().map(|(q, e)| (q, e.as_slice())));
                println!("{}", serde_json::to_string_pretty(&modal)?);
                return Ok(());
            }
            let Some((query, entries)) = found else {
                ui::warn("No user found in command");
                return Ok(());
            };
            let title = match &query.channel {
                Some(channel) if !channel.is_empty() => {
                    format!("{} Top emoji for {} in {}", Icons::PERSON, query.user, channel)
                }
                _ => format!("{} Top emoji for {}", Icons::PERSON, query.user),
            };
            print_counts(&title, &entries);
            Ok(())
        }
        Commands::Suggest { compound, limit, json } => {
            let atlas = offline_atlas(db, config);
            let (sentiment, emojis) = atlas.suggest_for(compound, limit.unwrap_or(config.suggestion_size))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view::emote_modal(sentiment, &emojis))?);
            } else {
                print_counts(&format!("Suggestions for a {} message", sentiment), &emojis);
            }
            Ok(())
        }
        Commands::Home { json } => home(db, config, json),
        Commands::Stats => {
            let stats = db.stats()?;
            ui::header(&format!("{} Database: {}", Icons::DATABASE, db_path.display()));
            println!("{}", ui::stats_table(&stats));
            Ok(())
        }
    }
}

fn init(config_path: &Path, database: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let config = AtlasConfig {
        database: database.map(|p| p.to_string_lossy().to_string()),
        ..AtlasConfig::default()
    };
    config::write_config(config_path, &config, force)?;

    let db_path = config.database_path_in(&std::env::current_dir()?);
    config::ensure_db_dir(&db_path)?;
    emoji_atlas::AtlasStore::open(&db_path)?.close()?;

    ui::success("Initialized emoji atlas");
    ui::info("Config", &config_path.display().to_string());
    ui::info("Database", &db_path.display().to_string());
    Ok(())
}

fn run_ingest(
    db: &Database,
    shutdown: ShutdownHandle,
    config: &AtlasConfig,
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let (stop_tx, stop) = crossbeam::channel::bounded::<()>(1);
    spawn_ctrl_c_listener(shutdown, stop_tx.clone())?;

    let lines = match file {
        Some(path) => ingest::spawn_line_reader(BufReader::new(std::fs::File::open(path)?))?,
        None => ingest::spawn_line_reader(BufReader::new(std::io::stdin()))?,
    };

    let atlas = offline_atlas(db, config);
    let spinner = Spinner::new("Recording events...");
    let start = std::time::Instant::now();

    let summary = ingest::ingest_lines(&atlas, &lines, &stop, |progress| {
        spinner.set_message(&format!("Recorded {} events", progress.events));
    })?;
    drop(stop_tx);

    if summary.interrupted {
        spinner.finish_with_message("Interrupted");
        ui::warn("Ingest stopped before the end of input");
    } else {
        spinner.finish_with_message(&format!("Recorded {} events", summary.events));
    }

    ui::section("Ingest");
    ui::summary_row("Events", &summary.events.to_string());
    ui::summary_row("Skipped", &summary.skipped.to_string());
    ui::summary_row("Reactions", &summary.recorded.reactions.to_string());
    ui::summary_row("Messages attached", &summary.recorded.messages_attached.to_string());
    ui::summary_row("Analyses", &summary.recorded.analyses.to_string());
    ui::summary_row("Emoji changes", &summary.recorded.emoji_changes.to_string());
    ui::summary_row(
        &format!("{} Time", Icons::CLOCK),
        &format!("{:.2?}", start.elapsed()),
    );
    Ok(())
}

/// First Ctrl-C stops ingest and the dispatcher; a second one exits at once
fn spawn_ctrl_c_listener(shutdown: ShutdownHandle, stop: crossbeam::channel::Sender<()>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    std::thread::Builder::new()
        .name("emoji-atlas-signal".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Ctrl-C handler unavailable: {}", e);
                    return;
                }
                tracing::info!("Ctrl-C received, shutting down dispatcher");
                shutdown.shutdown();
                let _ = stop.try_send(());

                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            });
        })?;
    Ok(())
}

fn offline_atlas(db: &Database, config: &AtlasConfig) -> Atlas {
    Atlas::new(
        db.clone(),
        Box::new(NoHistory),
        Box::new(PrecomputedSentiment::new(config.model.clone())),
    )
}

fn home(db: &Database, config: &AtlasConfig, json: bool) -> anyhow::Result<()> {
    let atlas = offline_atlas(db, config);
    let boards = atlas.home_leaderboards(config.leaderboard_size)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view::home_view(&boards))?);
        return Ok(());
    }

    print_counts(&format!("{} Most used emoji", Icons::TROPHY), &boards.most_used);
    print_counts("Most removed emoji", &boards.most_removed);
    ui::section(&format!("{} Most recently added or first used", Icons::SPARKLE));
    if boards.recent.is_empty() {
        ui::nothing_yet();
    } else {
        println!("{}", ui::recent_table(&boards.recent));
    }
    print_counts("Top reactions for positive messages", &boards.positive);
    print_counts("Top reactions for negative messages", &boards.negative);
    print_counts("Top reactions for neutral messages", &boards.neutral);
    Ok(())
}

fn print_counts(title: &str, entries: &[EmojiCount]) {
    ui::section(title);
    if entries.is_empty() {
        ui::nothing_yet();
    } else {
        println!("{}", ui::leaderboard_table(entries));
    }
}
