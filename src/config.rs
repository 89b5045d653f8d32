//! TOML configuration parsing and validation.
//!
//! ```toml
//! [store]
//! url = "https://my-cluster.weaviate.network"
//! api_key_env = "WEAVIATE_API_KEY"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//!
//! [sync]
//! page_size = 100
//! concurrency = 4
//!
//! [[collections]]
//! name = "QAEntry"
//! kind = "qa"
//! root = "../docs"
//!
//! [[collections]]
//! name = "Tooltip"
//! kind = "tooltip"
//! root = "../tooltips"
//! ```

use anyhow::{bail, Context, Result};
use qa_sync_core::models::{DataType, Schema};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Base URL of the Weaviate instance. Falls back to `WEAVIATE_URL`.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// Configured URL, else `WEAVIATE_URL`, with trailing slashes removed.
    pub fn resolve_url(&self) -> Result<String> {
        let url = match &self.url {
            Some(url) => url.clone(),
            None => std::env::var("WEAVIATE_URL").map_err(|_| {
                anyhow::anyhow!("store.url not set and WEAVIATE_URL not in environment")
            })?,
        };
        Ok(url.trim_end_matches('/').to_string())
    }

    /// API key from the configured environment variable, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
    }
}

fn default_api_key_env() -> String {
    "WEAVIATE_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// In-flight store operations per collection.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Collections reconciled at the same time.
    #[serde(default = "default_collection_concurrency")]
    pub collection_concurrency: usize,
    /// Deadline for one collection's reconciliation.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            concurrency: default_concurrency(),
            collection_concurrency: default_collection_concurrency(),
            timeout_secs: None,
        }
    }
}

fn default_page_size() -> usize {
    qa_sync_core::engine::DEFAULT_PAGE_SIZE
}
fn default_concurrency() -> usize {
    qa_sync_core::engine::DEFAULT_CONCURRENCY
}
fn default_collection_concurrency() -> usize {
    2
}

/// What a collection holds. Fixes the schema and which fields carry
/// identity, display labels, and the embedding input.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Qa,
    Tooltip,
}

impl CollectionKind {
    pub fn schema(&self) -> Schema {
        match self {
            CollectionKind::Qa => Schema::new()
                .property("question", DataType::Text)
                .property("answer", DataType::Text)
                .property("source", DataType::Text)
                .property("tags", DataType::TextArray),
            CollectionKind::Tooltip => Schema::new()
                .property("term", DataType::Text)
                .property("definition", DataType::Text)
                .property("source", DataType::Text)
                .property("tags", DataType::TextArray),
        }
    }

    pub fn identity_field(&self) -> &'static str {
        match self {
            CollectionKind::Qa => "question",
            CollectionKind::Tooltip => "term",
        }
    }

    /// Field whose text is embedded as the object's vector.
    pub fn vector_field(&self) -> &'static str {
        self.identity_field()
    }

    /// Field holding the entry body (answer or definition).
    pub fn body_field(&self) -> &'static str {
        match self {
            CollectionKind::Qa => "answer",
            CollectionKind::Tooltip => "definition",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    pub name: String,
    pub kind: CollectionKind,
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

impl Config {
    pub fn collection(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.name == name)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;

    // Relative collection roots are relative to the config file.
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for collection in &mut config.collections {
        if collection.root.is_relative() {
            collection.root = base.join(&collection.root);
        }
    }

    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.sync.page_size == 0 {
        bail!("sync.page_size must be > 0");
    }
    if config.sync.concurrency == 0 {
        bail!("sync.concurrency must be > 0");
    }
    if config.sync.collection_concurrency == 0 {
        bail!("sync.collection_concurrency must be > 0");
    }
    if config.sync.timeout_secs == Some(0) {
        bail!("sync.timeout_secs must be > 0 when set");
    }

    let mut names = HashSet::new();
    for collection in &config.collections {
        if collection.name.trim().is_empty() {
            bail!("collections[].name must not be empty");
        }
        if !names.insert(collection.name.as_str()) {
            bail!("Duplicate collection name: '{}'", collection.name);
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[store]
url = "http://localhost:8080/"

[[collections]]
name = "QAEntry"
kind = "qa"
root = "docs"
"#;

    #[test]
    fn test_defaults_applied() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.sync.page_size, 100);
        assert_eq!(config.sync.concurrency, 4);
        assert_eq!(config.sync.collection_concurrency, 2);
        assert!(config.sync.timeout_secs.is_none());
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.store.api_key_env, "WEAVIATE_API_KEY");

        let qa = config.collection("QAEntry").unwrap();
        assert_eq!(qa.kind, CollectionKind::Qa);
        assert_eq!(qa.include_globs, vec!["**/*.md".to_string()]);
    }

    #[test]
    fn test_url_trailing_slash_trimmed() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.store.resolve_url().unwrap(), "http://localhost:8080");
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let content = format!("{}\n[sync]\npage_size = 0\n", MINIMAL);
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_rejects_duplicate_collection_names() {
        let content = format!(
            "{}\n[[collections]]\nname = \"QAEntry\"\nkind = \"tooltip\"\nroot = \"other\"\n",
            MINIMAL
        );
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_rejects_unknown_embedding_provider() {
        let content = format!("{}\n[embedding]\nprovider = \"magic\"\n", MINIMAL);
        assert!(parse_config(&content).is_err());
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let content = "[[collections]]\nname = \"X\"\nkind = \"faq\"\nroot = \"d\"\n";
        assert!(parse_config(content).is_err());
    }

    #[test]
    fn test_kind_fields_are_in_schema() {
        for kind in [CollectionKind::Qa, CollectionKind::Tooltip] {
            let schema = kind.schema();
            let names: Vec<&str> = schema
                .properties()
                .iter()
                .map(|p| p.name.as_str())
                .collect();
            assert!(names.contains(&kind.identity_field()));
            assert!(names.contains(&kind.body_field()));
            assert!(names.contains(&"source"));
        }
    }

    #[test]
    fn test_load_resolves_relative_roots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qasync.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.collections[0].root, dir.path().join("docs"));
    }
}
