use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vodchat::aggregate::{WindowAxis, WindowSpec};
use vodchat::config::{config_path, init_config, Config};
use vodchat::db::Database;
use vodchat::ingest::Ingestor;
use vodchat::output::markdown::{render_search_report, ReportParams};
use vodchat::output::{json as json_out, table};
use vodchat::search::filters::VideoFilters;
use vodchat::search::{bursts, SearchQuery};

#[derive(Parser)]
#[command(name = "vodchat", version, about = "Archive, search and chart YouTube live-chat replays")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to database file (default: ~/.vodchat/vodchat.db)
    #[arg(long, global = true, env = "VODCHAT_DB")]
    db: Option<PathBuf>,

    /// Path to config file (default: ~/.vodchat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load yt-dlp .info.json and .live_chat.json files
    Parse {
        /// Directories, files or glob patterns
        #[arg(required = true)]
        paths: Vec<String>,

        /// Report what would be loaded without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Search chat text with regular expressions
    Search {
        /// Patterns (Rust regex syntax, case-sensitive); any may match
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Include author and message columns
        #[arg(long)]
        debug: bool,

        /// Only report moments with at least this many matches within --window
        #[arg(long, default_value = "1")]
        min_matches: usize,

        /// Burst window in seconds
        #[arg(long, default_value = "60")]
        window: i64,

        /// Seconds of lead-in for watch links (default from config)
        #[arg(long)]
        lead: Option<i64>,

        /// Write a markdown report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Chatter and message counts per time window
    Plot {
        /// Video IDs (default: every video, narrowed by --last-n/--from/--to)
        video_ids: Vec<String>,

        /// Most recent N videos
        #[arg(long, conflicts_with_all = ["from", "to"])]
        last_n: Option<usize>,

        /// Videos aired on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Videos aired on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Window width in minutes (default from config)
        #[arg(short, long)]
        window: Option<u32>,

        /// Bucket by wall-clock time instead of stream offset
        #[arg(long)]
        wall_clock: bool,

        /// Drop pre-stream chat and chat past the video's end
        #[arg(long)]
        stream_only: bool,

        /// Keep the video's overall top emoji in per-window picks
        #[arg(long)]
        all_emoji: bool,
    },

    /// List archived videos
    Videos {
        /// Filter by channel id or name
        #[arg(long)]
        channel: Option<String>,

        /// Aired on or after (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Aired on or before (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Maximum results
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Days without an archived video
    Gaps {
        /// First day to check (YYYY-MM-DD)
        #[arg(long)]
        since: NaiveDate,

        /// Day after the last one to check (default: today)
        #[arg(long)]
        until: Option<NaiveDate>,
    },

    /// Show database statistics
    Stats,

    /// Rebuild the chat text index
    Reindex,

    /// Show database info
    Info,

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file if none exists
    Init,
    /// Print the effective configuration
    Show,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json_output = cli.json;

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;

    if let Commands::Config { action } = &cli.command {
        return run_config(action, &config, cli.config.as_deref(), json_output);
    }

    let db_path = config
        .database_path(cli.db.as_deref())
        .context("Could not determine database path")?;
    let db = Database::open(&db_path)?;

    match cli.command {
        Commands::Parse { paths, dry_run } => {
            let summary = Ingestor::new(&db, config.ingest.clone())
                .dry_run(dry_run)
                .ingest_paths(&paths)?;
            if json_output {
                json_out::print_json(&summary)?;
            } else {
                table::print_ingest_summary(&summary, dry_run);
            }
        }

        Commands::Search {
            patterns,
            debug,
            min_matches,
            window,
            lead,
            output,
        } => {
            if window <= 0 {
                bail!("--window must be a positive number of seconds");
            }
            let lead_seconds = lead.unwrap_or(config.search.lead_seconds);
            let query = SearchQuery::new(patterns.iter().cloned()).debug(debug);
            let matches = db.search(&query)?;
            let results = if min_matches > 1 {
                bursts(&matches, TimeDelta::seconds(window), min_matches)
            } else {
                matches
            };

            if let Some(path) = output {
                let stats = db.stats()?;
                let report = render_search_report(
                    &results,
                    &ReportParams {
                        patterns: &patterns,
                        window_seconds: window,
                        min_matches,
                        lead_seconds,
                        messages_searched: stats.message_count,
                        latest_message: stats.latest,
                        generated_at: Utc::now(),
                    },
                    debug,
                );
                std::fs::write(&path, report)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                eprintln!("Wrote {} result(s) to {}", results.len(), path.display());
            }

            if json_output {
                json_out::print_json(&serde_json::json!({
                    "patterns": patterns,
                    "total": results.len(),
                    "matches": results,
                }))?;
            } else {
                table::print_search_results(&results, lead_seconds, debug);
            }
        }

        Commands::Plot {
            video_ids,
            last_n,
            from,
            to,
            window,
            wall_clock,
            stream_only,
            all_emoji,
        } => {
            let video_ids = if video_ids.is_empty() {
                let filters = VideoFilters {
                    channel: None,
                    from_date: from,
                    to_date: to,
                };
                let limit = match last_n {
                    Some(0) => bail!("--last-n must be a positive integer"),
                    Some(n) => n,
                    None => i64::MAX as usize,
                };
                db.list_videos(&filters, limit)?
                    .into_iter()
                    .map(|v| v.video_id)
                    .collect()
            } else {
                video_ids
            };
            if video_ids.is_empty() {
                bail!("No videos found for the selected criteria");
            }

            let minutes = window.unwrap_or(config.aggregate.window_minutes);
            let mut spec = WindowSpec::minutes(i64::from(minutes))
                .axis(if wall_clock {
                    WindowAxis::WallClock
                } else {
                    WindowAxis::Offset
                })
                .stream_only(stream_only);
            spec.exclude_global_top_emoji = !all_emoji;

            let mut plots = Vec::new();
            for video_id in &video_ids {
                let windows = db.aggregate(video_id, &spec)?;
                let video = db.get_video(video_id)?;
                if json_output {
                    plots.push(serde_json::json!({
                        "video_id": video_id,
                        "title": video.as_ref().map(|v| v.title.clone()),
                        "windows": windows,
                    }));
                } else {
                    table::print_windows(video.as_ref(), video_id, &windows);
                }
            }
            if json_output {
                json_out::print_json(&plots)?;
            }
        }

        Commands::Videos {
            channel,
            from,
            to,
            limit,
        } => {
            let filters = VideoFilters {
                channel,
                from_date: from,
                to_date: to,
            };
            let videos = db.list_videos(&filters, limit)?;
            if json_output {
                json_out::print_json(&videos)?;
            } else {
                table::print_video_list(&videos);
            }
        }

        Commands::Gaps { since, until } => {
            let until = until.unwrap_or_else(|| Utc::now().date_naive());
            if until <= since {
                bail!("--since must be before {until}");
            }
            let gaps = db.missing_days(since, until)?;
            if json_output {
                json_out::print_json(&gaps)?;
            } else {
                table::print_missing_days(&gaps);
            }
        }

        Commands::Stats => {
            let stats = db.stats()?;
            if json_output {
                json_out::print_json(&stats)?;
            } else {
                table::print_stats(&stats);
            }
        }

        Commands::Reindex => {
            println!("Rebuilding chat text index...");
            db.reindex()?;
            println!("Done.");
        }

        Commands::Info => {
            let stats = db.stats()?;
            let schema_ver = db
                .schema_version()?
                .unwrap_or_else(|| "unknown".to_string());

            if json_output {
                json_out::print_json(&serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "schema_version": schema_ver,
                    "db_path": db.path.display().to_string(),
                    "db_size_bytes": stats.db_size_bytes,
                    "videos": stats.video_count,
                    "messages": stats.message_count,
                }))?;
            } else {
                println!("vodchat v{}", env!("CARGO_PKG_VERSION"));
                println!("  Schema:      v{schema_ver}");
                println!("  Database:    {}", db.path.display());
                println!("  Videos:      {}", stats.video_count);
                println!("  Messages:    {}", stats.message_count);
            }
        }

        Commands::Config { .. } => unreachable!("handled before opening the database"),
    }

    Ok(())
}

fn run_config(
    action: &ConfigAction,
    config: &Config,
    path: Option<&std::path::Path>,
    json_output: bool,
) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let target = match path {
                Some(p) => p.to_path_buf(),
                None => config_path()?,
            };
            if init_config(Some(&target))? {
                println!("Created {}", target.display());
            } else {
                println!("Config already exists: {}", target.display());
            }
        }
        ConfigAction::Show => {
            if json_output {
                json_out::print_json(config)?;
            } else {
                print!("{}", config.display());
            }
        }
    }
    Ok(())
}
