//! Weaviate REST (v1) implementation of [`StoreAdapter`].
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `collection_exists` | `GET /v1/schema/{class}` |
//! | `create_collection` | `POST /v1/schema` |
//! | `insert` | `POST /v1/objects` |
//! | `update` | `PUT /v1/objects/{class}/{id}` |
//! | `fetch_by_id` | `GET /v1/objects/{class}/{id}` |
//! | `delete_by_id` | `DELETE /v1/objects/{class}/{id}` |
//! | `list_page` | `GET /v1/objects?class=&limit=&offset=` |
//!
//! Classes are created with `vectorizer: none`. When an embedding provider
//! is attached, each write embeds the collection's vector field and sends
//! the vector with the object.
//!
//! Weaviate caps offset pagination at its `QUERY_MAXIMUM_RESULTS` setting
//! (10 000 by default). Collections larger than that cannot be listed
//! exhaustively through this adapter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use qa_sync_core::error::{ProvisionError, StoreError};
use qa_sync_core::models::{FieldValue, Record, Schema};
use qa_sync_core::{Identity, InsertOutcome, StoreAdapter};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::StoreConfig;
use crate::embedding::{embed_one, EmbeddingProvider};

type VectorKey = (String, Identity);

/// One session against a Weaviate instance.
///
/// Holds a single pooled HTTP client shared by every collection and every
/// concurrent operation of a run.
pub struct WeaviateStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    vector_fields: HashMap<String, String>,
    /// Vectors computed for an insert that conflicted, reused by the
    /// follow-up update for the same identity.
    pending_vectors: Mutex<HashMap<VectorKey, Vec<f32>>>,
}

impl WeaviateStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.resolve_url()?,
            api_key: config.api_key(),
            embedder: None,
            vector_fields: HashMap::new(),
            pending_vectors: Mutex::new(HashMap::new()),
        })
    }

    /// Attach an embedding provider. Collections registered with
    /// [`with_vector_field`](Self::with_vector_field) get vectors.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_vector_field(mut self, collection: &str, field: &str) -> Self {
        self.vector_fields
            .insert(collection.to_string(), field.to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, StoreError> {
        builder
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    /// Vector for `properties`, or `None` when the collection has no
    /// embedding configured.
    async fn embed(
        &self,
        collection: &str,
        properties: &Record,
    ) -> Result<Option<Vec<f32>>, StoreError> {
        let (Some(embedder), Some(field)) = (&self.embedder, self.vector_fields.get(collection))
        else {
            return Ok(None);
        };
        let Some(text) = properties.text(field) else {
            return Ok(None);
        };

        embed_one(embedder.as_ref(), text)
            .await
            .map(Some)
            .map_err(|e| StoreError::Dependency(format!("embedding failed: {:#}", e)))
    }

    fn stash_vector(&self, collection: &str, identity: Identity, vector: Vec<f32>) {
        self.pending_vectors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((collection.to_string(), identity), vector);
    }

    fn take_vector(&self, collection: &str, identity: Identity) -> Option<Vec<f32>> {
        self.pending_vectors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(collection.to_string(), identity))
    }
}

#[async_trait]
impl StoreAdapter for WeaviateStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let resp = Self::send(self.request(Method::GET, &format!("/v1/schema/{}", name))).await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(rejected(resp).await),
        }
    }

    async fn create_collection(&self, name: &str, schema: &Schema) -> Result<(), ProvisionError> {
        let create_error = |source| ProvisionError::Create {
            collection: name.to_string(),
            source,
        };

        let request = self
            .request(Method::POST, "/v1/schema")
            .json(&class_body(name, schema));
        let resp = Self::send(request).await.map_err(create_error)?;

        let status = resp.status();
        if status.is_success() {
            debug!(collection = name, "created class");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        if is_already_exists(status, &body) {
            return Err(ProvisionError::AlreadyExists(name.to_string()));
        }
        Err(create_error(StoreError::Rejected {
            status: status.as_u16(),
            message: body,
        }))
    }

    async fn insert(
        &self,
        collection: &str,
        identity: Identity,
        properties: &Record,
    ) -> Result<InsertOutcome, StoreError> {
        let vector = self.embed(collection, properties).await?;
        let body = object_body(collection, identity, properties, vector.as_deref());

        let resp = Self::send(self.request(Method::POST, "/v1/objects").json(&body)).await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(InsertOutcome::Created);
        }

        let text = resp.text().await.unwrap_or_default();
        if is_already_exists(status, &text) {
            if let Some(vector) = vector {
                self.stash_vector(collection, identity, vector);
            }
            return Ok(InsertOutcome::Conflict);
        }
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message: text,
        })
    }

    async fn update(
        &self,
        collection: &str,
        identity: Identity,
        properties: &Record,
    ) -> Result<(), StoreError> {
        let vector = match self.take_vector(collection, identity) {
            Some(vector) => Some(vector),
            None => self.embed(collection, properties).await?,
        };
        let body = object_body(collection, identity, properties, vector.as_deref());

        let path = format!("/v1/objects/{}/{}", collection, identity);
        let resp = Self::send(self.request(Method::PUT, &path).json(&body)).await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(format!(
                "{}/{}",
                collection, identity
            ))),
            _ => Err(rejected(resp).await),
        }
    }

    async fn fetch_by_id(
        &self,
        collection: &str,
        identity: Identity,
    ) -> Result<Option<Record>, StoreError> {
        let path = format!("/v1/objects/{}/{}", collection, identity);
        let resp = Self::send(self.request(Method::GET, &path)).await?;
        match resp.status() {
            s if s.is_success() => {
                let json: Value = resp
                    .json()
                    .await
                    .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
                Ok(Some(record_from_properties(
                    json.get("properties").unwrap_or(&Value::Null),
                )))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(rejected(resp).await),
        }
    }

    async fn delete_by_id(&self, collection: &str, identity: Identity) -> Result<(), StoreError> {
        let path = format!("/v1/objects/{}/{}", collection, identity);
        let resp = Self::send(self.request(Method::DELETE, &path)).await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(rejected(resp).await),
        }
    }

    async fn list_page(
        &self,
        collection: &str,
        page_size: usize,
        offset: usize,
    ) -> Result<Vec<Identity>, StoreError> {
        let resp = Self::send(self.request(Method::GET, "/v1/objects").query(&[
            ("class", collection.to_string()),
            ("limit", page_size.to_string()),
            ("offset", offset.to_string()),
        ]))
        .await?;

        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        let json: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        parse_object_ids(&json)
    }
}

async fn rejected(resp: Response) -> StoreError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    StoreError::Rejected { status, message }
}

/// Weaviate reports duplicate classes and duplicate object ids as 422
/// with an "already exists" message.
fn is_already_exists(status: StatusCode, body: &str) -> bool {
    status == StatusCode::UNPROCESSABLE_ENTITY && body.to_lowercase().contains("already exists")
}

fn class_body(name: &str, schema: &Schema) -> Value {
    let properties: Vec<Value> = schema
        .properties()
        .iter()
        .map(|p| json!({"name": p.name, "dataType": [p.data_type.as_str()]}))
        .collect();
    json!({
        "class": name,
        "vectorizer": "none",
        "properties": properties,
    })
}

fn object_body(
    collection: &str,
    identity: Identity,
    properties: &Record,
    vector: Option<&[f32]>,
) -> Value {
    let mut body = json!({
        "class": collection,
        "id": identity.to_string(),
        "properties": properties,
    });
    if let Some(vector) = vector {
        body["vector"] = json!(vector);
    }
    body
}

/// Map a Weaviate `properties` object onto a [`Record`].
///
/// Values that have no [`FieldValue`] counterpart (nested objects, mixed
/// arrays, references) are skipped.
fn record_from_properties(properties: &Value) -> Record {
    let Some(map) = properties.as_object() else {
        return Record::new();
    };
    map.iter()
        .filter_map(|(name, value)| {
            let field = match value {
                Value::String(s) => FieldValue::Text(s.clone()),
                Value::Bool(b) => FieldValue::Bool(*b),
                Value::Number(n) => FieldValue::Number(n.as_f64()?),
                Value::Array(items) => FieldValue::TextList(
                    items
                        .iter()
                        .map(|item| item.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()?,
                ),
                _ => return None,
            };
            Some((name.clone(), field))
        })
        .collect()
}

fn parse_object_ids(json: &Value) -> Result<Vec<Identity>, StoreError> {
    let Some(objects) = json.get("objects") else {
        return Ok(Vec::new());
    };
    let objects = objects
        .as_array()
        .ok_or_else(|| StoreError::InvalidResponse("objects is not an array".to_string()))?;

    objects
        .iter()
        .map(|object| {
            let id = object
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| StoreError::InvalidResponse("object without id".to_string()))?;
            id.parse::<Identity>()
                .map_err(|_| StoreError::InvalidResponse(format!("malformed object id `{}`", id)))
        })
        .collect()
}
