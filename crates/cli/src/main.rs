use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use contact_store::{ContactRecord, ExportFormat};
use contact_sync::{ChatDirectory, ContactService, FixtureDirectory, LiveEvent, SyncConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "contact-ids")]
#[command(about = "Resolve contact identities across phone and linked ids", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Service configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot file (overrides the configured path)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Print results as JSON on stdout (implies --quiet)
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show store counters
    Stats,

    /// Show the record for an id
    Get(GetArgs),

    /// Find the record for a phone number (phone-routed or via its linked id)
    Phone(PhoneArgs),

    /// Search records by name substring or exact phone
    Search(SearchArgs),

    /// Best display name for an id
    Resolve(ResolveArgs),

    /// Export all records beside the snapshot
    Export(ExportArgs),

    /// Clear display names shared by unrelated records
    Dedupe,

    /// Fill missing linked ids on phone records from known links
    Link,

    /// Replay live events from a JSON-lines file
    Ingest(IngestArgs),

    /// Run a backfill scan over a directory fixture
    Scan(ScanArgs),
}

#[derive(Args)]
struct GetArgs {
    id: String,
}

#[derive(Args)]
struct PhoneArgs {
    phone: String,
}

#[derive(Args)]
struct SearchArgs {
    term: String,

    #[arg(long, value_enum, default_value = "name")]
    by: SearchBy,
}

#[derive(Args)]
struct ResolveArgs {
    id: String,

    /// Returned when no name is known
    #[arg(long, default_value = "Unknown")]
    fallback: String,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long, value_enum, default_value = "json")]
    format: ExportFormatFlag,

    /// File name, relative to the snapshot directory
    #[arg(long)]
    out: Option<String>,
}

#[derive(Args)]
struct IngestArgs {
    /// One `LiveEvent` JSON object per line
    events: PathBuf,
}

#[derive(Args)]
struct ScanArgs {
    /// Directory fixture (JSON); without it only chats already seen can be scanned
    #[arg(long)]
    directory: Option<PathBuf>,
}

#[derive(Copy, Clone, ValueEnum)]
enum SearchBy {
    Name,
    Phone,
}

#[derive(Copy, Clone, ValueEnum)]
enum ExportFormatFlag {
    Json,
    Csv,
}

impl ExportFormatFlag {
    const fn as_domain(self) -> ExportFormat {
        match self {
            ExportFormatFlag::Json => ExportFormat::Json,
            ExportFormatFlag::Csv => ExportFormat::Csv,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref(), cli.snapshot.clone()).await?;
    let directory: Arc<dyn ChatDirectory> = match &cli.command {
        Commands::Scan(ScanArgs {
            directory: Some(path),
        }) => Arc::new(
            FixtureDirectory::load(path)
                .await
                .with_context(|| format!("Failed to load directory {}", path.display()))?,
        ),
        _ => Arc::new(FixtureDirectory::default()),
    };

    let service = ContactService::new(config).context("Invalid configuration")?;
    service
        .initialize(directory)
        .await
        .context("Failed to load contact snapshot")?;

    let json = cli.json;
    match cli.command {
        Commands::Stats => run_stats(&service, json).await?,
        Commands::Get(args) => {
            let record = service.get(&args.id).await?;
            print_record(record.as_ref(), json)?;
        }
        Commands::Phone(args) => {
            let record = service.get_by_phone(&args.phone).await?;
            print_record(record.as_ref(), json)?;
        }
        Commands::Search(args) => run_search(&service, args, json).await?,
        Commands::Resolve(args) => {
            let name = service.resolve_display_name(&args.id, &args.fallback).await?;
            if json {
                print_json(&serde_json::json!({ "id": args.id, "displayName": name }))?;
            } else {
                println!("{name}");
            }
        }
        Commands::Export(args) => {
            let path = service
                .export(args.format.as_domain(), args.out.as_deref())
                .await
                .context("Export failed")?;
            if json {
                print_json(&serde_json::json!({ "path": path }))?;
            } else {
                println!("Exported to {}", path.display());
            }
        }
        Commands::Dedupe => {
            let report = service.dedupe_display_names().await?;
            finish(&service).await?;
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "{} shared names examined, {} names cleared",
                    report.names_examined,
                    report.cleared.len()
                );
            }
        }
        Commands::Link => {
            let linked = service.link_phone_records().await?;
            finish(&service).await?;
            if json {
                print_json(&serde_json::json!({ "linked": linked }))?;
            } else {
                println!("Linked {linked} phone records");
            }
        }
        Commands::Ingest(args) => run_ingest(&service, &args.events, json).await?,
        Commands::Scan(_) => {
            let report = service.scan_all().await.context("Scan failed")?;
            finish(&service).await?;
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "Scanned {}/{} chats ({} failed): {} contacts, {} links",
                    report.chats_scanned,
                    report.chats_total,
                    report.chats_failed,
                    report.contacts_total,
                    report.links_mapped
                );
            }
        }
    }

    Ok(())
}

async fn load_config(path: Option<&Path>, snapshot: Option<PathBuf>) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => SyncConfig::from_toml_file(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SyncConfig::default(),
    };
    if let Some(snapshot) = snapshot {
        config.store.snapshot_path = snapshot;
    }
    // One-shot process: persist once at the end instead of after every event.
    config.autosave = false;
    config.validate()?;
    Ok(config)
}

async fn finish(service: &ContactService) -> Result<()> {
    service
        .shutdown()
        .await
        .context("Failed to save contact snapshot")
}

async fn run_stats(service: &ContactService, json: bool) -> Result<()> {
    let stats = service.stats().await?;
    if json {
        return print_json(&stats);
    }
    println!("Contacts:        {}", stats.total_contacts);
    println!("Mapped links:    {}", stats.mapped_links);
    println!("Display names:   {}", stats.display_name_count);
    println!("Chats scanned:   {}", stats.chats_scanned);
    println!(
        "Last scan:       {}",
        stats
            .last_scan_time
            .map_or_else(|| "never".to_string(), |t| t.to_string())
    );
    println!(
        "Last saved:      {}",
        stats
            .last_saved
            .map_or_else(|| "never".to_string(), |t| t.to_string())
    );
    Ok(())
}

async fn run_search(service: &ContactService, args: SearchArgs, json: bool) -> Result<()> {
    let records = match args.by {
        SearchBy::Name => service.search_by_name(&args.term).await?,
        SearchBy::Phone => service.search_by_phone(&args.term).await?,
    };
    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No matches for '{}'", args.term);
    }
    for record in &records {
        println!("{}", describe(record));
    }
    Ok(())
}

async fn run_ingest(service: &ContactService, path: &Path, json: bool) -> Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut events = 0usize;
    let mut merged = 0usize;
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: LiveEvent = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid event", path.display(), index + 1))?;
        merged += service.ingest(event).await?;
        events += 1;
    }
    finish(service).await?;

    if json {
        print_json(&serde_json::json!({ "events": events, "merged": merged }))?;
    } else {
        println!("Ingested {events} events ({merged} observations merged)");
    }
    Ok(())
}

fn print_record(record: Option<&ContactRecord>, json: bool) -> Result<()> {
    if json {
        return print_json(&record);
    }
    match record {
        Some(record) => println!("{}", describe(record)),
        None => println!("Not found"),
    }
    Ok(())
}

fn describe(record: &ContactRecord) -> String {
    format!(
        "{}  phone={}  linked={}  name={}  source={}",
        record.id,
        record.phone_number.as_deref().unwrap_or("-"),
        record.linked_id.as_deref().unwrap_or("-"),
        record.display_name.as_deref().unwrap_or("-"),
        record.source
    )
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
