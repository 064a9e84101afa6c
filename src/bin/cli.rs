//! questlog CLI
//!
//! Thin driver over the library: sync the catalog, browse it, and manage
//! character profiles from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use questlog::{
    config::{DataLayout, load_config},
    error::{AppError, Result},
    models::{Campaign, Catalog, QuestStatus, StatusChange},
    query::{self, StatusFilter},
    storage::ImportFormat,
    utils::wiki_search_url,
};

/// questlog - Wiki quest catalog and progress tracker
#[derive(Parser, Debug)]
#[command(
    name = "questlog",
    version,
    about = "Quest catalog sync and per-character progress tracking"
)]
struct Cli {
    /// Data directory holding config, catalog, profiles and page cache
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the catalog from the wiki and reconcile all profiles
    Sync,

    /// List quests for a profile, grouped by campaign and section
    Query {
        profile: String,

        /// Case-insensitive title search
        #[arg(default_value = "")]
        search: String,

        /// all, not-started, in-progress or completed
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,
    },

    /// Manage profiles
    Profiles {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Change the status of one quest
    SetStatus {
        profile: String,
        quest_key: String,
        status: QuestStatus,
    },

    /// Attach notes to a quest; omit the text to clear them
    Notes {
        profile: String,
        quest_key: String,
        text: Option<String>,
    },

    /// Reset every quest of a campaign to Not Started
    Reset { profile: String, campaign: Campaign },

    /// Import a profile document (current or legacy format)
    Import {
        path: PathBuf,

        /// Profile to merge into (required for legacy documents)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Export a profile document
    Export { profile: String, path: PathBuf },

    /// Print the wiki article of a quest
    Link { quest_key: String },

    /// Print a wiki search URL
    Search { term: String },

    /// Show completion counts for a profile
    Summary { profile: String },

    /// Validate configuration
    Validate,

    /// Show data directory info
    Info,
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    List,
    Create { name: String },
    Delete { name: String },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// The committed catalog, or an error telling the user to sync first.
async fn require_catalog(layout: &DataLayout) -> Result<Catalog> {
    layout
        .catalog_store()
        .load()
        .await?
        .ok_or_else(|| AppError::config("No catalog yet. Run 'sync' first."))
}

fn require_key(catalog: &Catalog, quest_key: &str) -> Result<()> {
    if catalog.contains_key(quest_key) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "unknown quest key '{quest_key}'"
        )))
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let layout = DataLayout::new(&cli.data_dir);
    let config = Arc::new(load_config(&layout.config_path())?);
    let profiles = layout.profile_store();
    log::debug!("Using data directory {}", cli.data_dir.display());

    match cli.command {
        Command::Sync => {
            let worker = layout.worker(Arc::clone(&config))?;
            let mut job = worker.start()?;
            while let Some(event) = job.next_progress().await {
                log::info!("[{:>3}%] {}", event.percent, event.message);
            }
            match job.wait().await {
                Ok(report) => {
                    for campaign in &report.diff.campaigns {
                        log::info!(
                            "  {}: +{} -{} ={}",
                            campaign.campaign,
                            campaign.added.len(),
                            campaign.removed.len(),
                            campaign.unchanged
                        );
                    }
                    log::info!("Sync complete: {}", report.summary());
                }
                Err(e) if e.is_sync_failure() => {
                    log::error!("Sync failed: {e} - using existing data");
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        Command::Query {
            profile,
            search,
            status,
        } => {
            let catalog = require_catalog(&layout).await?;
            let profile = profiles.load(&profile).await?;
            let result = query::query(&catalog, &profile, &search, status);

            for campaign in &result.campaigns {
                println!("{}", campaign.campaign);
                for section in &campaign.sections {
                    println!("  {}", section.name);
                    for quest in &section.quests {
                        println!("    [{}] {}  ({})", quest.status, quest.title, quest.quest_key);
                    }
                }
            }
            log::info!("{} quests match", result.quest_count());
        }

        Command::Profiles { action } => match action {
            ProfileAction::List => {
                for name in profiles.list_profiles().await? {
                    println!("{name}");
                }
            }
            ProfileAction::Create { name } => {
                let profile = profiles.load(&name).await?;
                if let Some(catalog) = layout.catalog_store().load().await? {
                    profiles.reconcile(&profile.name, &catalog).await?;
                }
                log::info!("Profile '{}' ready", profile.name);
            }
            ProfileAction::Delete { name } => {
                if !profiles.delete(&name).await? {
                    log::warn!("No profile named '{}'", name);
                }
            }
        },

        Command::SetStatus {
            profile,
            quest_key,
            status,
        } => {
            let catalog = require_catalog(&layout).await?;
            require_key(&catalog, &quest_key)?;
            match profiles.set_status(&profile, &quest_key, status).await? {
                StatusChange::Unchanged => log::info!("{quest_key} already {status}"),
                StatusChange::Changed { from, to } => {
                    log::info!("{quest_key}: {from} -> {to}")
                }
            }
        }

        Command::Notes {
            profile,
            quest_key,
            text,
        } => {
            let catalog = require_catalog(&layout).await?;
            require_key(&catalog, &quest_key)?;
            profiles
                .update(&profile, |p| p.set_notes(&quest_key, text))
                .await?;
        }

        Command::Reset { profile, campaign } => {
            let catalog = require_catalog(&layout).await?;
            let changed = profiles
                .update(&profile, |p| p.reset_campaign(&catalog, campaign))
                .await?;
            log::info!("Reset {changed} {campaign} quests for '{profile}'");
        }

        Command::Import { path, profile } => {
            let catalog = require_catalog(&layout).await?;
            let report = profiles.import(&path, profile.as_deref(), &catalog).await?;
            let format = match report.format {
                ImportFormat::Current => "current".to_string(),
                ImportFormat::Legacy(format) => format!("legacy {format:?}"),
            };
            log::info!(
                "Imported {} records into '{}' ({} format), {} skipped",
                report.mapped,
                report.profile,
                format,
                report.skipped.len()
            );
            for skipped in &report.skipped {
                log::warn!(
                    "  skipped {} ({}): {}",
                    skipped.identifier,
                    skipped.category.as_deref().unwrap_or("-"),
                    skipped.reason
                );
            }
        }

        Command::Export { profile, path } => {
            profiles.export(&profile, &path).await?;
        }

        Command::Link { quest_key } => {
            let catalog = require_catalog(&layout).await?;
            let url = catalog
                .wiki_url(&quest_key)
                .ok_or_else(|| AppError::validation(format!("unknown quest key '{quest_key}'")))?;
            println!("{url}");
        }

        Command::Search { term } => {
            println!("{}", wiki_search_url(&config.wiki_base_url, &term)?);
        }

        Command::Summary { profile } => {
            let catalog = require_catalog(&layout).await?;
            let profile = profiles.load(&profile).await?;
            let summary = query::progress_summary(&catalog, &profile);
            for campaign in &summary.campaigns {
                if let Some(name) = campaign.campaign {
                    println!(
                        "{:<18} {:>4}/{:<4} {:>5.1}%  ({} in progress)",
                        name.to_string(),
                        campaign.completed,
                        campaign.total,
                        campaign.percent_complete(),
                        campaign.in_progress
                    );
                }
            }
            println!(
                "{:<18} {:>4}/{:<4} {:>5.1}%",
                "Overall",
                summary.overall.completed,
                summary.overall.total,
                summary.overall.percent_complete()
            );
            for (key, entry) in profile.orphaned_entries(&catalog) {
                println!("  orphaned: {key} [{}]", entry.status);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            log::info!(
                "✓ Config OK ({} pages, {} seed quests)",
                config.pages.len(),
                config.seed.quests.len()
            );
        }

        Command::Info => {
            log::info!("Data directory: {}", layout.root().display());
            match layout.catalog_store().load().await? {
                Some(catalog) => {
                    log::info!("Catalog: v{} ({} quests)", catalog.version, catalog.quest_count());
                    log::info!("Built at: {}", catalog.built_at);
                }
                None => log::info!("No catalog yet."),
            }
            log::info!("Profiles: {}", profiles.list_profiles().await?.len());
        }
    }

    Ok(())
}
