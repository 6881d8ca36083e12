use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use eventdesk_core::{EventdeskConfig, ItemKind};
use tracing::info;

mod items;
mod orders;
mod run;

/// Eventdesk - scheduled report delivery and order sealing.
#[derive(Parser, Debug)]
#[command(name = "eventdesk", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to $EVENTDESK_CONFIG, then ~/.eventdesk/eventdesk.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one report pass over every catalog item (cron entry point).
    Run {
        /// Evaluate windows as of this instant instead of the current time.
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        /// Re-deliver the latest complete period for every item without
        /// touching cursors.
        #[arg(long)]
        force_replay: bool,
    },
    /// Print the stored cursor for an item.
    Cursor { item_id: String },
    /// Manage reportable items.
    #[command(subcommand)]
    Item(ItemCommand),
    /// Seal, verify and correct order records (JSON files).
    #[command(subcommand)]
    Order(OrderCommand),
}

#[derive(Subcommand, Debug)]
enum ItemCommand {
    /// Create or replace an item and its report settings.
    Upsert(UpsertItem),
}

#[derive(Args, Debug)]
struct UpsertItem {
    #[arg(long)]
    id: String,
    #[arg(long)]
    kind: ItemKind,
    #[arg(long)]
    label: String,
    /// Free-form cadence label, e.g. "monthly" or "twice per month".
    #[arg(long, default_value = "")]
    frequency: String,
    #[arg(long)]
    publish_start: Option<DateTime<Utc>>,
    #[arg(long)]
    publish_end: Option<DateTime<Utc>>,
    /// Report recipient; repeat for several.
    #[arg(long = "chair-email")]
    chair_emails: Vec<String>,
    /// Label used in reports instead of the catalog label.
    #[arg(long)]
    report_label: Option<String>,
    #[arg(long)]
    inactive: bool,
    #[arg(long)]
    archived: bool,
}

#[derive(Subcommand, Debug)]
enum OrderCommand {
    /// Stamp a fresh hash triple onto an order.
    Seal(OrderFile),
    /// Check an order's hash; exits non-zero on mismatch.
    Verify { file: String },
    /// Fill in court name/number on the purchaser and every line.
    PatchCourt {
        #[command(flatten)]
        target: OrderFile,
        #[arg(long)]
        court_name: Option<String>,
        #[arg(long)]
        court_no: Option<String>,
        /// Replace values that are already set.
        #[arg(long)]
        overwrite: bool,
    },
    /// Re-seal an order after an admin correction.
    Reseal {
        #[command(flatten)]
        target: OrderFile,
        #[arg(long)]
        by: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Verify every order in a JSON array file.
    VerifyAll { file: String },
}

#[derive(Args, Debug)]
struct OrderFile {
    file: String,
    /// Write the result back to the file instead of stdout.
    #[arg(long)]
    in_place: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventdesk=info,eventdesk_scheduler=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // config: --config > EVENTDESK_CONFIG env > ~/.eventdesk/eventdesk.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("EVENTDESK_CONFIG").ok());
    let config = load_config(config_path.as_deref())?;

    match cli.command {
        Commands::Run { now, force_replay } => run::run_pass(&config, now, force_replay).await,
        Commands::Cursor { item_id } => items::show_cursor(&config, &item_id).await,
        Commands::Item(ItemCommand::Upsert(args)) => items::upsert(&config, args),
        Commands::Order(cmd) => orders::dispatch(cmd),
    }
}

/// A missing file falls back to defaults; a file that fails to parse or
/// validate stops the command.
fn load_config(path: Option<&str>) -> anyhow::Result<EventdeskConfig> {
    if let Some(p) = path.filter(|p| !std::path::Path::new(p).exists()) {
        tracing::warn!(path = %p, "config file not found, using defaults");
    }
    EventdeskConfig::load(path).map_err(|e| anyhow::anyhow!("{} [{}]", e, e.code()))
}

/// Open the shared SQLite file, creating its directory on first use.
pub(crate) fn open_db(config: &EventdeskConfig) -> anyhow::Result<rusqlite::Connection> {
    let db_path = &config.database.path;
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    info!(path = %db_path, "opening SQLite database");
    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(
            config.scheduler.retry_delays_ms,
            EventdeskConfig::default().scheduler.retry_delays_ms
        );
    }

    #[test]
    fn invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eventdesk.toml");
        std::fs::write(&path, "[scheduler]\nretry_delays_ms = []\n").unwrap();
        let err = load_config(path.to_str()).unwrap_err();
        assert!(err.to_string().contains("CONFIG_ERROR"));
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "eventdesk",
            "run",
            "--now",
            "2025-03-10T00:00:00Z",
            "--force-replay",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { now, force_replay } => {
                assert_eq!(now.unwrap().to_rfc3339(), "2025-03-10T00:00:00+00:00");
                assert!(force_replay);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_item_upsert_with_repeated_emails() {
        let cli = Cli::try_parse_from([
            "eventdesk",
            "item",
            "upsert",
            "--id",
            "b-1",
            "--kind",
            "Banquet",
            "--label",
            "Gala",
            "--chair-email",
            "a@x.org",
            "--chair-email",
            "b@x.org",
        ])
        .unwrap();
        let Commands::Item(ItemCommand::Upsert(args)) = cli.command else {
            panic!("expected item upsert");
        };
        assert_eq!(args.kind, ItemKind::Banquet);
        assert_eq!(args.chair_emails.len(), 2);
        assert!(args.frequency.is_empty());
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(Cli::try_parse_from([
            "eventdesk", "item", "upsert", "--id", "x", "--kind", "raffle", "--label", "X",
        ])
        .is_err());
    }

    #[test]
    fn parses_patch_court_in_place() {
        let cli = Cli::try_parse_from([
            "eventdesk",
            "order",
            "patch-court",
            "order.json",
            "--court-name",
            "Oak",
            "--in-place",
        ])
        .unwrap();
        let Commands::Order(OrderCommand::PatchCourt { target, court_name, .. }) = cli.command
        else {
            panic!("expected patch-court");
        };
        assert!(target.in_place);
        assert_eq!(court_name.as_deref(), Some("Oak"));
    }
}
