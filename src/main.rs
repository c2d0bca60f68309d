//! MemoLog - Personal memo log embedded in plain-text files
//!
//! Command-line front end over the `MemoLog` engine.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use memolog::{
    config::MemoLogConfig,
    memo::{flat_view, sort_for_display, thread_view, trash_view, MemoRecord, DELETED_PLACEHOLDER},
    MemoBuilder, MemoLog,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "memolog")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Personal memo log embedded in plain-text files")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MEMOLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Storage unit to operate on, relative to the storage root
    #[arg(short, long, env = "MEMOLOG_UNIT")]
    unit: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a new memo
    Add {
        /// Memo text
        content: String,

        /// Category to file the memo under
        #[arg(short, long)]
        category: Option<String>,

        /// Attachment file name (repeatable)
        #[arg(short, long = "attach")]
        attachments: Vec<String>,

        /// Template for this memo, e.g. "### dddd, MMMM DD"
        #[arg(short, long)]
        template: Option<String>,
    },

    /// Reply to an existing memo
    Reply {
        /// Id of the memo to reply to
        parent: String,

        /// Reply text
        content: String,

        /// Expected category of the parent
        #[arg(short, long)]
        category: Option<String>,
    },

    /// List memos
    List {
        /// Only memos in this category
        #[arg(short, long, default_value = "")]
        category: String,

        /// Show the trash instead
        #[arg(long, conflicts_with = "threads")]
        trash: bool,

        /// Show reply threads
        #[arg(long)]
        threads: bool,
    },

    /// Replace the text of a memo
    Edit {
        /// Memo id
        id: String,

        /// New text
        content: String,
    },

    /// Move a memo to the trash
    Trash {
        /// Memo id
        id: String,
    },

    /// Take a memo out of the trash
    Restore {
        /// Memo id
        id: String,

        /// Also restore trashed replies
        #[arg(long)]
        cascade: bool,
    },

    /// Delete a memo and all of its replies
    Delete {
        /// Memo id
        id: String,
    },

    /// Pin a memo to the top of listings
    Pin {
        /// Memo id
        id: String,
    },

    /// Unpin a memo
    Unpin {
        /// Memo id
        id: String,
    },

    /// Remove trashed memos past the retention period
    Purge,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("memolog={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = match &cli.config {
        Some(config_path) => MemoLogConfig::load(config_path)?,
        None => MemoLogConfig::default(),
    };

    let unit = cli
        .unit
        .clone()
        .unwrap_or_else(|| config.storage.default_unit.clone());
    let log = MemoLog::from_config(&config)?;

    match cli.command {
        Commands::Add {
            content,
            category,
            attachments,
            template,
        } => {
            let mut memo = MemoBuilder::new(content);
            if let Some(category) = category {
                memo = memo.category(category);
            }
            for name in attachments {
                memo = memo.attachment(name);
            }
            if let Some(template) = template {
                memo = memo.template(template);
            }
            let record = log.add(&unit, memo).await?;
            println!("{}", record.id);
        }
        Commands::Reply {
            parent,
            content,
            category,
        } => {
            let record = log
                .add_reply(&unit, &parent, MemoBuilder::new(content), category.as_deref())
                .await?;
            println!("{}", record.id);
        }
        Commands::List {
            category,
            trash,
            threads,
        } => {
            list_memos(&log, &unit, &category, trash, threads).await?;
        }
        Commands::Edit { id, content } => {
            if !log.update_content(&unit, &id, &content).await? {
                bail!("Memo {} not found in {}", id, unit);
            }
        }
        Commands::Trash { id } => {
            if !log.trash(&unit, &id).await? {
                bail!("Memo {} not found in {}", id, unit);
            }
        }
        Commands::Restore { id, cascade } => {
            if cascade {
                match log.restore_with_descendants(&unit, &id).await? {
                    Some(restored) => println!("Restored {} memo(s)", restored.len()),
                    None => bail!("Memo {} not found in {}", id, unit),
                }
            } else if !log.restore(&unit, &id).await? {
                bail!("Memo {} is not in the trash of {}", id, unit);
            }
        }
        Commands::Delete { id } => match log.delete_with_descendants(&unit, &id).await? {
            Some(affected) => println!("Deleted {} memo(s)", affected.len()),
            None => bail!("Memo {} not found in {}", id, unit),
        },
        Commands::Pin { id } => {
            if !log.pin(&unit, &id).await? {
                bail!("Memo {} not found in {}", id, unit);
            }
        }
        Commands::Unpin { id } => {
            if !log.unpin(&unit, &id).await? {
                bail!("Memo {} not found in {}", id, unit);
            }
        }
        Commands::Purge => {
            let removed = log.purge_expired(&unit).await?;
            println!(
                "Purged {} memo(s) older than {} day(s)",
                removed,
                log.retention_days()
            );
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

async fn list_memos(
    log: &MemoLog,
    unit: &str,
    category: &str,
    trash: bool,
    threads: bool,
) -> Result<()> {
    let records = log.list(unit, category).await?;

    if threads {
        let index = log.thread_index(unit, category).await?;
        for row in thread_view(&index, &records) {
            let indent = "  ".repeat(row.depth);
            let text = if row.placeholder {
                DELETED_PLACEHOLDER.to_string()
            } else {
                summary(row.memo)
            };
            println!("{}{}  {}", indent, row.memo.id, text);
        }
        return Ok(());
    }

    let mut shown: Vec<MemoRecord> = if trash {
        trash_view(&records).into_iter().cloned().collect()
    } else {
        flat_view(&records).into_iter().cloned().collect()
    };
    sort_for_display(&mut shown, log.insert_order());

    for memo in &shown {
        let pin = if memo.is_pinned() { "*" } else { " " };
        let category = if memo.category.is_empty() {
            String::new()
        } else {
            format!("[{}] ", memo.category)
        };
        println!(
            "{} {}  {}  {}{}",
            pin,
            memo.id,
            memo.timestamp,
            category,
            summary(memo)
        );
    }
    Ok(())
}

/// First non-empty line of the memo, shortened for listings.
fn summary(memo: &MemoRecord) -> String {
    const MAX_CHARS: usize = 72;
    let line = memo
        .content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    if line.chars().count() > MAX_CHARS {
        let cut: String = line.chars().take(MAX_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

fn show_config(config: Option<&MemoLogConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    println!("{}", config.to_toml()?);
    Ok(())
}
