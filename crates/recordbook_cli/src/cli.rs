use clap::{Args, Parser, Subcommand};
use recordbook_core::EntityType;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "recordbook", about = "Record book revision ledger tools", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite ledger file.
    #[arg(long, global = true, default_value = "recordbook.sqlite3")]
    pub db: PathBuf,

    /// TOML file with ledger settings.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files; logging is off without it.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Delete all but the newest revisions of every entity of one type
    Compact(CompactArgs),
    /// Show the newest revision of one entity
    Latest(EntityArgs),
    /// List a user's restorable deleted items
    DeletedItems(DeletedItemsArgs),
    /// Clear stale deleted flags in a restored folder's history
    RestoreFolder(IdArgs),
    /// Show since which revision an identifier has been findable
    FindableSince(IdArgs),
}

#[derive(Args)]
pub struct CompactArgs {
    #[arg(long, value_parser = parse_entity_type)]
    pub entity_type: EntityType,
    /// Revisions kept per entity; defaults to `retention_max_to_keep`.
    #[arg(long)]
    pub keep: Option<usize>,
}

#[derive(Args)]
pub struct EntityArgs {
    #[arg(value_parser = parse_entity_type)]
    pub entity_type: EntityType,
    pub id: Uuid,
}

#[derive(Args)]
pub struct IdArgs {
    pub id: Uuid,
}

#[derive(Args)]
pub struct DeletedItemsArgs {
    #[arg(long)]
    pub user: String,
    #[arg(long, default_value = "")]
    pub name: String,
    /// `name` or `deletedDate`.
    #[arg(long)]
    pub order_by: Option<String>,
    #[arg(long)]
    pub ascending: bool,
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
    #[arg(long)]
    pub limit: Option<u32>,
}

fn parse_entity_type(value: &str) -> Result<EntityType, String> {
    EntityType::parse(value).ok_or_else(|| {
        format!("unknown entity type `{value}`; expected folder|record|identifier")
    })
}
