//! Filesystem loader: walks a collection's root and turns Markdown entries
//! into desired [`Record`]s.
//!
//! Files are matched against include/exclude globs (with `.git`, `target`
//! and `node_modules` always excluded) and processed in sorted
//! relative-path order, so the record order, and with it the
//! last-one-wins collision rule, is deterministic.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use qa_sync_core::models::{DesiredCollection, Record};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{CollectionConfig, CollectionKind};
use crate::markdown::{parse_entries, Entry};

/// Load the desired state for one configured collection.
pub fn load_collection(collection: &CollectionConfig) -> Result<DesiredCollection> {
    let files = discover_files(collection)?;
    let mut records = Vec::new();

    for (path, relative) in &files {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let entries = parse_entries(&content);
        debug!(
            collection = %collection.name,
            file = %relative,
            entries = entries.len(),
            "parsed file"
        );
        records.extend(
            entries
                .into_iter()
                .map(|entry| entry_to_record(collection.kind, entry, relative)),
        );
    }

    Ok(DesiredCollection {
        name: collection.name.clone(),
        schema: collection.kind.schema(),
        identity_field: collection.kind.identity_field().to_string(),
        display_field: None,
        records,
    })
}

/// Map a parsed entry onto the collection kind's record shape.
pub fn entry_to_record(kind: CollectionKind, entry: Entry, source: &str) -> Record {
    Record::new()
        .with(kind.identity_field(), entry.title)
        .with(kind.body_field(), entry.body)
        .with("source", source)
        .with("tags", entry.tags)
}

/// Matching files as `(absolute path, root-relative path)`, sorted.
fn discover_files(collection: &CollectionConfig) -> Result<Vec<(PathBuf, String)>> {
    let root = &collection.root;
    if !root.exists() {
        bail!(
            "Collection '{}' root does not exist: {}",
            collection.name,
            root.display()
        );
    }

    let include_set = build_globset(&collection.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(collection.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = relative_path(root, path);

        if exclude_set.is_match(&relative) || !include_set.is_match(&relative) {
            continue;
        }
        files.push((path.to_path_buf(), relative));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

/// Root-relative path with `/` separators on every platform.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_to_record_qa() {
        let entry = Entry {
            title: "What is X?".to_string(),
            body: "X is...".to_string(),
            tags: vec!["a".to_string()],
        };
        let record = entry_to_record(CollectionKind::Qa, entry, "faq/x.md");

        assert_eq!(record.text("question"), Some("What is X?"));
        assert_eq!(record.text("answer"), Some("X is..."));
        assert_eq!(record.text("source"), Some("faq/x.md"));
        assert_eq!(
            record.get("tags"),
            Some(&qa_sync_core::FieldValue::TextList(vec!["a".to_string()]))
        );
    }

    #[test]
    fn test_entry_to_record_tooltip() {
        let entry = Entry {
            title: "Idempotent".to_string(),
            body: "Safe to repeat.".to_string(),
            tags: Vec::new(),
        };
        let record = entry_to_record(CollectionKind::Tooltip, entry, "glossary.md");

        assert_eq!(record.text("term"), Some("Idempotent"));
        assert_eq!(record.text("definition"), Some("Safe to repeat."));
        assert!(record.get("question").is_none());
    }

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = Path::new("/docs");
        let path = Path::new("/docs/guides/deploy.md");
        assert_eq!(relative_path(root, path), "guides/deploy.md");
    }
}
