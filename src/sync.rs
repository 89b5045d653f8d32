//! Sync orchestration: load configured collections, open one store
//! session, and reconcile each collection.
//!
//! Collections are independent. They are reconciled concurrently (bounded
//! by `sync.collection_concurrency`) over the same session, and one
//! collection aborting never stops the others.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use qa_sync_core::error::ProvisionError;
use qa_sync_core::plan::PlannedSync;
use qa_sync_core::report::ReportRecorder;
use qa_sync_core::{
    DesiredCollection, ReconcileOptions, ReconciliationEngine, StoreAdapter, SyncReport,
};
use serde_json::json;
use tracing::{info, warn};

use crate::config::{CollectionConfig, Config, SyncConfig};
use crate::embedding::create_provider;
use crate::loader::load_collection;
use crate::weaviate::WeaviateStore;

/// Result of one collection's run.
#[derive(Debug)]
pub struct CollectionRun {
    pub collection: String,
    pub result: Result<SyncReport, ProvisionError>,
}

impl CollectionRun {
    /// Aborted, cancelled, or recorded at least one failure.
    pub fn is_failure(&self) -> bool {
        match &self.result {
            Ok(report) => !report.is_success(),
            Err(_) => true,
        }
    }
}

fn engine_options(config: &SyncConfig) -> ReconcileOptions {
    ReconcileOptions {
        page_size: config.page_size,
        concurrency: config.concurrency,
    }
}

/// Reconcile every desired collection against `store`.
///
/// Results come back in the order of `desired`. With `timeout_secs` set, a
/// collection that runs past its deadline is cancelled and its partial
/// report (marked `cancelled`) is returned.
pub async fn sync_collections(
    store: Arc<dyn StoreAdapter>,
    desired: &[DesiredCollection],
    config: &SyncConfig,
) -> Vec<CollectionRun> {
    let engine = ReconciliationEngine::new(store).with_options(engine_options(config));
    let deadline = config.timeout_secs.map(Duration::from_secs);

    stream::iter(desired)
        .map(|collection| reconcile_one(&engine, collection, deadline))
        .buffered(config.collection_concurrency.max(1))
        .collect()
        .await
}

async fn reconcile_one(
    engine: &ReconciliationEngine,
    desired: &DesiredCollection,
    deadline: Option<Duration>,
) -> CollectionRun {
    let recorder = ReportRecorder::new(&desired.name);

    let result = match deadline {
        Some(limit) => {
            match tokio::time::timeout(limit, engine.reconcile_into(desired, &recorder)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        collection = %desired.name,
                        timeout_secs = limit.as_secs(),
                        "reconciliation timed out, keeping partial report"
                    );
                    recorder.cancel();
                    Ok(())
                }
            }
        }
        None => engine.reconcile_into(desired, &recorder).await,
    };

    if let Err(e) = &result {
        warn!(collection = %desired.name, error = %e, "collection aborted");
    }

    CollectionRun {
        collection: desired.name.clone(),
        result: result.map(|()| recorder.finish()),
    }
}

/// Collections selected by `only`, or all configured collections.
fn select_collections<'a>(
    config: &'a Config,
    only: Option<&str>,
) -> Result<Vec<&'a CollectionConfig>> {
    if config.collections.is_empty() {
        bail!("No collections configured. Add [[collections]] entries to the config file.");
    }
    match only {
        Some(name) => match config.collection(name) {
            Some(collection) => Ok(vec![collection]),
            None => bail!("Unknown collection: '{}'", name),
        },
        None => Ok(config.collections.iter().collect()),
    }
}

/// Open the store session described by `config`.
pub fn open_store(config: &Config, collections: &[&CollectionConfig]) -> Result<WeaviateStore> {
    let mut store = WeaviateStore::new(&config.store)?;
    if let Some(embedder) = create_provider(&config.embedding)? {
        info!(model = embedder.model_name(), "embedding enabled");
        store = store.with_embedder(embedder);
        for collection in collections {
            store = store.with_vector_field(&collection.name, collection.kind.vector_field());
        }
    }
    Ok(store)
}

/// Load, reconcile, and print a summary for the selected collections.
///
/// # Errors
///
/// Fails when loading fails, when the session cannot be opened, or when
/// any collection aborted, was cancelled, or recorded failures.
pub async fn run_sync(
    config: &Config,
    only: Option<&str>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let selected = select_collections(config, only)?;

    let mut desired = Vec::with_capacity(selected.len());
    for collection in &selected {
        let loaded = load_collection(collection)
            .with_context(|| format!("Failed to load collection '{}'", collection.name))?;
        info!(collection = %loaded.name, records = loaded.records.len(), "loaded");
        desired.push(loaded);
    }

    let store: Arc<dyn StoreAdapter> = Arc::new(open_store(config, &selected)?);

    if dry_run {
        return run_plan(store, &desired, &config.sync, json).await;
    }

    let runs = sync_collections(store, &desired, &config.sync).await;
    print_runs(&runs, json)?;

    let failed: Vec<&str> = runs
        .iter()
        .filter(|run| run.is_failure())
        .map(|run| run.collection.as_str())
        .collect();
    if !failed.is_empty() {
        bail!("Sync incomplete for: {}", failed.join(", "));
    }
    Ok(())
}

async fn run_plan(
    store: Arc<dyn StoreAdapter>,
    desired: &[DesiredCollection],
    config: &SyncConfig,
    json: bool,
) -> Result<()> {
    let engine = ReconciliationEngine::new(store).with_options(engine_options(config));

    let mut plans = Vec::with_capacity(desired.len());
    for collection in desired {
        let planned = engine
            .plan(collection)
            .await
            .with_context(|| format!("Failed to plan collection '{}'", collection.name))?;
        plans.push(planned);
    }

    if json {
        let out: Vec<_> = plans.iter().map(plan_json).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for planned in &plans {
        println!("sync {} (dry-run)", planned.collection);
        if !planned.collection_exists {
            println!("  collection: would be created");
        }
        println!("  to insert: {}", planned.plan.to_insert.len());
        println!("  to update: {}", planned.plan.to_update.len());
        println!("  to delete: {}", planned.plan.to_delete.len());
        if !planned.collisions.is_empty() {
            println!("  collisions: {}", planned.collisions.len());
        }
        if !planned.invalid.is_empty() {
            println!("  invalid records: {}", planned.invalid.len());
        }
    }
    Ok(())
}

fn plan_json(planned: &PlannedSync) -> serde_json::Value {
    json!({
        "collection": planned.collection,
        "collectionExists": planned.collection_exists,
        "toInsert": planned.plan.to_insert,
        "toUpdate": planned.plan.to_update,
        "toDelete": planned.plan.to_delete,
        "collisions": planned.collisions,
        "invalid": planned.invalid,
    })
}

fn print_runs(runs: &[CollectionRun], json: bool) -> Result<()> {
    if json {
        let out: Vec<serde_json::Value> = runs
            .iter()
            .map(|run| match &run.result {
                Ok(report) => serde_json::to_value(report),
                Err(e) => Ok(json!({"collection": run.collection, "error": e.to_string()})),
            })
            .collect::<Result<_, _>>()?;
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for run in runs {
        for line in summary_lines(run) {
            println!("{}", line);
        }
    }
    Ok(())
}

/// Human-readable summary of one run: a `sync` header, then indented
/// detail lines.
fn summary_lines(run: &CollectionRun) -> Vec<String> {
    let mut lines = vec![format!("sync {}", run.collection)];
    let report = match &run.result {
        Ok(report) => report,
        Err(e) => {
            lines.push(format!("  aborted: {}", e));
            return lines;
        }
    };

    let counts = report.counts();
    lines.push(format!("  inserted: {}", counts.inserted));
    lines.push(format!("  updated: {}", counts.updated));
    lines.push(format!("  deleted: {}", counts.deleted));
    if counts.collisions > 0 {
        lines.push(format!("  collisions: {}", counts.collisions));
    }
    for failure in report.failures() {
        lines.push(match failure.identity {
            Some(id) => format!("  failed {:?} {}: {}", failure.operation, id, failure.reason),
            None => format!("  failed {:?}: {}", failure.operation, failure.reason),
        });
    }
    if report.cancelled() {
        lines.push("  cancelled".to_string());
    } else if report.is_success() {
        lines.push("  ok".to_string());
    }
    lines
}

/// Print the configured collections with the number of entries loaded
/// from each root. Makes no network calls.
pub fn list_collections(config: &Config) {
    println!("{:<20} {:<10} {:<8} ROOT", "COLLECTION", "KIND", "ENTRIES");
    for collection in &config.collections {
        let kind = format!("{:?}", collection.kind).to_lowercase();
        let entries = match load_collection(collection) {
            Ok(desired) => desired.records.len().to_string(),
            Err(e) => {
                warn!(collection = %collection.name, error = %e, "failed to load");
                "error".to_string()
            }
        };
        println!(
            "{:<20} {:<10} {:<8} {}",
            collection.name,
            kind,
            entries,
            collection.root.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const TWO: &str = r#"
[[collections]]
name = "QAEntry"
kind = "qa"
root = "docs"

[[collections]]
name = "Tooltip"
kind = "tooltip"
root = "tips"
"#;

    #[test]
    fn test_select_all_collections() {
        let config = parse_config(TWO).unwrap();
        let selected = select_collections(&config, None).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_select_one_collection() {
        let config = parse_config(TWO).unwrap();
        let selected = select_collections(&config, Some("Tooltip")).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "Tooltip");
    }

    #[test]
    fn test_select_unknown_collection() {
        let config = parse_config(TWO).unwrap();
        let err = select_collections(&config, Some("Nope")).unwrap_err();
        assert!(err.to_string().contains("Unknown collection"));
    }

    #[test]
    fn test_summary_lines_are_indented() {
        use qa_sync_core::report::{Applied, Operation};
        use qa_sync_core::Identity;

        let recorder = ReportRecorder::new("QAEntry");
        recorder.record(Identity::derive("a").unwrap(), Applied::Inserted);
        recorder.fail(None, Operation::List, "503");
        recorder.cancel();
        let run = CollectionRun {
            collection: "QAEntry".to_string(),
            result: Ok(recorder.finish()),
        };

        let lines = summary_lines(&run);
        assert_eq!(lines[0], "sync QAEntry");
        assert!(lines[1..].iter().all(|line| line.starts_with("  ")));
        assert_eq!(lines.last().map(String::as_str), Some("  cancelled"));
        assert!(lines.contains(&"  failed List: 503".to_string()));
    }

    #[test]
    fn test_summary_lines_ok_and_aborted() {
        let ok = CollectionRun {
            collection: "Tooltip".to_string(),
            result: Ok(ReportRecorder::new("Tooltip").finish()),
        };
        assert_eq!(summary_lines(&ok).last().map(String::as_str), Some("  ok"));

        let aborted = CollectionRun {
            collection: "Tooltip".to_string(),
            result: Err(ProvisionError::AlreadyExists("Tooltip".to_string())),
        };
        let lines = summary_lines(&aborted);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("  aborted: "));
    }

    #[test]
    fn test_select_requires_collections() {
        let config = parse_config("").unwrap();
        assert!(select_collections(&config, None).is_err());
    }
}
