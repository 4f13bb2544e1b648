use crate::cli::{Cli, Command, DeletedItemsArgs};
use anyhow::{bail, Context};
use recordbook_core::{
    default_log_level, init_logging, open_db_with_settings, DeletedItemsQuery,
    DeletionRecoveryFinder, LedgerSettings, LifecycleScanner, RestorationMutator,
    RetentionCompactor, Revision, RevisionQueryEngine, SqliteStore,
};
use std::path::Path;

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings(cli.config.as_deref())?;
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or_else(|| default_log_level());
        init_logging(level, log_dir).context("failed to start logging")?;
    }

    let conn = open_db_with_settings(&cli.db, &settings)
        .with_context(|| format!("failed to open ledger `{}`", cli.db.display()))?;
    let store = SqliteStore::try_new(&conn)?;

    match cli.command {
        Command::Compact(args) => {
            let keep = args.keep.unwrap_or(settings.retention_max_to_keep);
            let report = RetentionCompactor::new(store).compact(args.entity_type, keep)?;
            println!(
                "entity_type={} ids_scanned={} ids_compacted={} deleted={} child_rows_deleted={}",
                args.entity_type.as_str(),
                report.ids_scanned,
                report.ids_compacted,
                report.deleted_count,
                report.child_rows_deleted
            );
        }
        Command::Latest(args) => {
            match RevisionQueryEngine::new(store).latest(args.entity_type, args.id)? {
                Some(revision) => print_revision(&revision),
                None => bail!("no revisions for {} {}", args.entity_type.as_str(), args.id),
            }
        }
        Command::DeletedItems(args) => deleted_items(store, &settings, args)?,
        Command::RestoreFolder(args) => {
            let updated = RestorationMutator::new(store).restore_folder(args.id)?;
            println!("folder_id={} updated={}", args.id, updated);
        }
        Command::FindableSince(args) => {
            match LifecycleScanner::new(store).findable_since(args.id)? {
                Some(revision) => print_revision(&revision),
                None => println!("identifier_id={} findable=false", args.id),
            }
        }
    }
    Ok(())
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<LedgerSettings> {
    let Some(path) = path else {
        return Ok(LedgerSettings::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config `{}`", path.display()))?;
    let settings: LedgerSettings = toml::from_str(&text)
        .with_context(|| format!("invalid config `{}`", path.display()))?;
    Ok(settings.validated())
}

fn deleted_items(
    store: SqliteStore<'_>,
    settings: &LedgerSettings,
    args: DeletedItemsArgs,
) -> anyhow::Result<()> {
    let finder = DeletionRecoveryFinder::with_settings(store, settings.clone());
    let page = finder.find_deleted_items(&DeletedItemsQuery {
        user: args.user,
        name_filter: args.name,
        order_by: args.order_by,
        ascending: args.ascending,
        offset: args.offset,
        limit: args.limit,
    })?;

    println!("total={}", page.total_count);
    for item in &page.items {
        println!(
            "{} {} parent={} deleted_date={} name={:?}",
            item.entity_type().as_str(),
            item.entity_id(),
            item.parent_folder_id,
            item.deleted_date.map_or_else(|| "-".to_string(), |ms| ms.to_string()),
            item.name()
        );
    }
    Ok(())
}

fn print_revision(revision: &Revision) {
    println!(
        "{} {} rev={} type={} at={} by={} deleted={} name={:?}",
        revision.entity_type.as_str(),
        revision.entity_id,
        revision.number,
        revision.revision_type.as_str(),
        revision.timestamp_ms,
        revision.modified_by,
        revision.snapshot.deleted,
        revision.snapshot.name
    );
}
