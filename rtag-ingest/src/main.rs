//! rtag - replay tagging command line
//!
//! Thin front end over [`ReplayManager`]: tag editing against an explicit
//! replay or the most recently played one, tag queries with optional export,
//! and tag frequency tables.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rtag_common::config::{load_module_config, load_toml_config, LoggingConfig, RootFolderResolver};
use rtag_common::time::{format_unix, parse_timestamp};
use rtag_ingest::telemetry::{CommandTelemetrySource, StaticTelemetrySource, TelemetrySource};
use rtag_ingest::{ReplayLocator, ReplayManager, ReplayProcessor, ReplayQuery, ReplaySources, ReplayStore};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Config file and root folder module name
const MODULE_NAME: &str = "rtag";

#[derive(Parser, Debug)]
#[command(name = "rtag")]
#[command(about = "Manage derived and user-defined tags on game replay files")]
#[command(version)]
struct Cli {
    /// Folder holding the replay archive and record database
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Config file (default: <config dir>/rtag/rtag.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Archive and process replay files
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Add tags to a replay
    AddTag {
        #[command(flatten)]
        target: ReplayTarget,
        tags: Vec<String>,
    },

    /// Remove tags from a replay
    RemoveTag {
        #[command(flatten)]
        target: ReplayTarget,
        tags: Vec<String>,
    },

    /// Replace a replay's notes
    Notes {
        #[command(flatten)]
        target: ReplayTarget,
        notes: String,
    },

    /// Print a stored replay's record
    Show {
        /// Replay file path or digest
        replay: String,
    },

    /// Remove a replay's record (the archived file is kept)
    Forget {
        /// Replay file path or digest
        replay: String,
    },

    /// List replays matching tags
    Query {
        #[command(flatten)]
        sources: SourceArgs,

        /// Directory to copy matching replays to
        #[arg(short = 'o', long)]
        output_dir: Option<PathBuf>,

        /// Match replays carrying any of the tags instead of all
        #[arg(long)]
        match_any_tag: bool,

        /// Match replays carrying none of the tags
        #[arg(long)]
        inverse: bool,

        /// Earliest game time (unix seconds, YYYY-MM-DD, or RFC 3339)
        #[arg(long)]
        start: Option<String>,

        /// Latest game time (unix seconds, YYYY-MM-DD, or RFC 3339)
        #[arg(long)]
        end: Option<String>,

        tags: Vec<String>,
    },

    /// Print how many replays carry each tag
    TagFrequency {
        #[command(flatten)]
        sources: SourceArgs,

        /// Tags to leave out of the table
        #[arg(long, num_args = 1..)]
        ignore: Vec<String>,
    },

    /// Re-run processing on one stored replay, or all of them
    Reprocess {
        /// Digest of the replay to reprocess
        digest: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ReplayTarget {
    /// Use your most recently played replay
    #[arg(short = 'm', long)]
    most_recent_replay: bool,

    /// Path to the replay
    #[arg(short = 'r', long, conflicts_with = "most_recent_replay")]
    replay: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// File listing replay paths, one per line ('-' for stdin)
    #[arg(short = 'l', long)]
    source_list: Option<PathBuf>,

    /// Directory containing replay files
    #[arg(short = 'd', long)]
    source_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_toml_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => load_module_config(MODULE_NAME),
    };

    init_tracing(&config.logging)?;

    info!(
        "Starting rtag v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Usage errors are reported before anything is opened or processed
    let target_path = match &cli.command {
        Command::AddTag { target, .. }
        | Command::RemoveTag { target, .. }
        | Command::Notes { target, .. } => Some(resolve_target(target, &config)?),
        _ => None,
    };
    if let Command::Query {
        output_dir: Some(dir),
        ..
    } = &cli.command
    {
        if !dir.is_dir() {
            bail!("Output directory {} is not a directory", dir.display());
        }
    }

    let root_folder =
        RootFolderResolver::new(MODULE_NAME).resolve_with(cli.root_folder.as_deref(), Some(&config));
    info!("Root folder: {}", root_folder.display());

    let store = ReplayStore::open(&root_folder, config.replay_extension())
        .await
        .context("Failed to open replay store")?;

    let source: Arc<dyn TelemetrySource> = match CommandTelemetrySource::from_config(&config.telemetry) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            warn!("{} - replays will be stored without derived tags", e);
            Arc::new(StaticTelemetrySource::new())
        }
    };

    let manager = ReplayManager::new(store, ReplayProcessor::new(source));
    let outcome = run(&manager, cli.command, target_path).await;
    manager.close().await;
    outcome
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn resolve_target(target: &ReplayTarget, config: &rtag_common::config::TomlConfig) -> Result<PathBuf> {
    if let Some(path) = &target.replay {
        return Ok(path.clone());
    }
    if !target.most_recent_replay {
        bail!("Replay not specified (use --replay PATH or --most-recent-replay)");
    }

    let locator = ReplayLocator::from_config(config)?;
    locator
        .find_most_recent()?
        .with_context(|| format!("No replays found under {}", locator.accounts_dir().display()))
}

fn read_sources(args: &SourceArgs) -> Result<ReplaySources> {
    let mut files = Vec::new();

    if let Some(list) = &args.source_list {
        let reader: Box<dyn BufRead> = if list == Path::new("-") {
            Box::new(BufReader::new(std::io::stdin()))
        } else {
            let file = std::fs::File::open(list)
                .with_context(|| format!("Failed to open source list {}", list.display()))?;
            Box::new(BufReader::new(file))
        };

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if !line.is_empty() {
                files.push(PathBuf::from(line));
            }
        }
    }

    if let Some(dir) = &args.source_dir {
        if !dir.is_dir() {
            bail!("Source directory {} is not a directory", dir.display());
        }
    }

    Ok(ReplaySources {
        files,
        dir: args.source_dir.clone(),
    })
}

async fn run(manager: &ReplayManager, command: Command, target: Option<PathBuf>) -> Result<()> {
    match command {
        Command::Ingest { paths } => {
            for path in paths {
                match manager.ingest_file(&path, None).await? {
                    Some(replay) => println!("{} {}", replay.digest, replay.path.display()),
                    None => println!("rejected {}", path.display()),
                }
            }
        }

        Command::AddTag { tags, .. } => {
            let path = target.context("Replay not specified")?;
            let replay = manager.tag_replay(&path, &tags).await?;
            println!("{}", replay.tags.as_slice().join(" "));
        }

        Command::RemoveTag { tags, .. } => {
            let path = target.context("Replay not specified")?;
            let replay = manager.untag_replay(&path, &tags).await?;
            println!("{}", replay.tags.as_slice().join(" "));
        }

        Command::Notes { notes, .. } => {
            let path = target.context("Replay not specified")?;
            manager.set_notes(&path, &notes).await?;
        }

        Command::Show { replay } => match manager.find(&replay).await? {
            Some(replay) => {
                println!("digest:    {}", replay.digest);
                println!("path:      {}", replay.path.display());
                println!("played:    {}", format_unix(replay.timestamp));
                for (index, team) in replay.teams.iter().enumerate() {
                    let role = if replay.player_team == Some(index) {
                        " (player)"
                    } else if replay.opponent_team == Some(index) {
                        " (opponent)"
                    } else {
                        ""
                    };
                    println!("team {}:    {}{}", index, team.name, role);
                }
                println!("tags:      {}", replay.tags.as_slice().join(" "));
                if !replay.notes.is_empty() {
                    println!("notes:     {}", replay.notes);
                }
            }
            None => bail!("No stored replay for {}", replay),
        },

        Command::Forget { replay } => {
            if !manager.forget(&replay).await? {
                bail!("No stored replay for {}", replay);
            }
        }

        Command::Query {
            sources,
            output_dir,
            match_any_tag,
            inverse,
            start,
            end,
            tags,
        } => {
            let sources = read_sources(&sources)?;

            let mut query = if inverse {
                ReplayQuery::new().exclude(tags)
            } else {
                ReplayQuery::new().include(tags)
            };
            if match_any_tag {
                query = query.match_any();
            }
            if start.is_some() || end.is_some() {
                let start = start
                    .as_deref()
                    .map(|s| parse_timestamp(s, false))
                    .transpose()?
                    .unwrap_or(i64::MIN);
                let end = end
                    .as_deref()
                    .map(|s| parse_timestamp(s, true))
                    .transpose()?
                    .unwrap_or(i64::MAX);
                query = query.between(start, end);
            }

            let replays = manager.query(query, &sources).await?;
            match output_dir {
                Some(dir) => {
                    manager.export(&replays, &dir).await?;
                }
                None => {
                    for replay in &replays {
                        println!("{}", replay.path.display());
                    }
                }
            }
        }

        Command::TagFrequency { sources, ignore } => {
            let sources = read_sources(&sources)?;
            for (tag, count) in manager.tag_frequency(&sources, &ignore).await? {
                println!("{} {}", tag, count);
            }
        }

        Command::Reprocess { digest } => match digest {
            Some(digest) => {
                if manager.reprocess(&digest).await?.is_none() {
                    bail!("No stored replay with digest {}", digest);
                }
            }
            None => {
                let summary = manager.reprocess_all().await?;
                println!("processed {} failed {}", summary.processed, summary.failed);
            }
        },
    }

    Ok(())
}
