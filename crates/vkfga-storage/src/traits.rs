//! DataStore trait definition and domain types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};
use crate::iterator::TupleIterator;

/// Maximum length for string fields.
const MAX_FIELD_LENGTH: usize = 255;

/// Default page size for paginated queries.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Default bound on the number of tuples accepted by a single `write_tuples` call.
pub const DEFAULT_MAX_TUPLES_PER_WRITE: usize = 100;

/// Default bound on the number of type definitions per authorization model.
pub const DEFAULT_MAX_TYPES_PER_AUTHORIZATION_MODEL: usize = 100;

/// Store metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// An optional condition attached to a tuple.
///
/// The context holds the condition's parameters as JSON key-value pairs. A
/// condition persisted without a context is normalized to an empty map on
/// decode so that equality comparisons in upper layers are well-defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleCondition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Map<String, serde_json::Value>>,
}

/// A relationship tuple key: `user` has `relation` on `object`.
///
/// `object` is a typed identifier of the form `type:id`. `user` is either
/// `type:id` or a userset of the form `type:id#relation`. Components are
/// never parsed back out of a storage key; the full key is always recovered
/// by decoding the stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleKey {
    pub object: String,
    pub relation: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<TupleCondition>,
}

impl TupleKey {
    /// Creates a tuple key without a condition.
    pub fn new(
        object: impl Into<String>,
        relation: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            object: object.into(),
            relation: relation.into(),
            user: user.into(),
            condition: None,
        }
    }

    /// Creates a tuple key carrying a condition.
    pub fn with_condition(
        object: impl Into<String>,
        relation: impl Into<String>,
        user: impl Into<String>,
        condition_name: impl Into<String>,
        context: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Self {
        Self {
            object: object.into(),
            relation: relation.into(),
            user: user.into(),
            condition: Some(TupleCondition {
                name: condition_name.into(),
                context,
            }),
        }
    }

    /// Replaces an absent condition context with an empty map.
    pub fn normalize_condition(&mut self) {
        if let Some(condition) = &mut self.condition {
            if condition.context.is_none() {
                condition.context = Some(serde_json::Map::new());
            }
        }
    }
}

/// A stored relationship tuple: the key plus its write timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuple {
    pub key: TupleKey,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// The kind of mutation recorded in the changelog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleOperation {
    Write,
    Delete,
}

impl TupleOperation {
    pub fn as_i64(self) -> i64 {
        match self {
            TupleOperation::Write => 0,
            TupleOperation::Delete => 1,
        }
    }

    /// Any unrecognized value decodes as `Write`; changelog records are
    /// parsed defensively rather than rejected.
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => TupleOperation::Delete,
            _ => TupleOperation::Write,
        }
    }
}

/// One entry of a store's changelog.
///
/// `timestamp` and `sequence` are server-assigned: the millisecond prefix
/// and intra-millisecond counter of the stream entry id. Together they are
/// strictly monotonic per store.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleChange {
    pub tuple_key: TupleKey,
    pub operation: TupleOperation,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub sequence: u64,
}

/// A versioned authorization model.
///
/// `id` is a lexicographically time-sortable ULID supplied by the caller;
/// its time component orders models newest-first. The schema payload is
/// opaque to the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAuthorizationModel {
    pub id: String,
    pub store_id: String,
    pub schema_version: String,
    pub type_definitions: serde_json::Value,
}

/// A schema-validation assertion attached to a `(store, model)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub tuple_key: TupleKey,
    pub expectation: bool,
}

/// Filter for `read` / `read_page`.
///
/// The populated fields pick the index: all three select a point read,
/// `object` + `relation` the forward index, `user` the reverse index, and an
/// empty filter a full keyspace scan.
#[derive(Debug, Clone, Default)]
pub struct ReadFilter {
    pub object: Option<String>,
    pub relation: Option<String>,
    pub user: Option<String>,
}

/// A `(type, relation)` pair restricting which usersets a query may return.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationReference {
    pub type_name: String,
    pub relation: String,
}

/// Filter for `read_userset_tuples`.
#[derive(Debug, Clone)]
pub struct ReadUsersetTuplesFilter {
    pub object: String,
    pub relation: String,
    /// When non-empty, only usersets whose `(type, relation)` matches one of
    /// these references are returned.
    pub allowed_user_type_restrictions: Vec<RelationReference>,
}

/// An object, optionally qualified by a relation, identifying one user value.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRelation {
    pub object: String,
    pub relation: Option<String>,
}

impl ObjectRelation {
    /// Renders the user value this entry addresses: `type:id` or
    /// `type:id#relation`.
    pub fn user_string(&self) -> String {
        match &self.relation {
            Some(relation) => format!("{}#{}", self.object, relation),
            None => self.object.clone(),
        }
    }
}

/// Filter for `read_starting_with_user`.
#[derive(Debug, Clone)]
pub struct ReadStartingWithUserFilter {
    pub object_type: String,
    pub relation: String,
    pub user_filter: Vec<ObjectRelation>,
}

/// Filter for `read_changes`.
#[derive(Debug, Clone, Default)]
pub struct ReadChangesFilter {
    /// When set, only changes whose object is of this type are returned.
    pub object_type: Option<String>,
    /// Changes newer than `now - horizon_offset` are not returned,
    /// preventing consumers from observing effects that may not yet be
    /// globally visible.
    pub horizon_offset: Option<std::time::Duration>,
}

/// Options for paginated queries.
#[derive(Debug, Clone, Default)]
pub struct PaginationOptions {
    /// Maximum number of results to return.
    pub page_size: Option<u32>,
    /// Continuation token from a previous query.
    pub continuation_token: Option<String>,
}

/// Paginated query result.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    /// The results.
    pub items: Vec<T>,
    /// Token for fetching the next page, if there are more results.
    pub continuation_token: Option<String>,
}

/// Options for `read_changes`.
#[derive(Debug, Clone, Default)]
pub struct ReadChangesOptions {
    pub pagination: PaginationOptions,
    /// Return newest changes first.
    pub sort_desc: bool,
}

/// Options for `list_stores`.
#[derive(Debug, Clone, Default)]
pub struct ListStoresOptions {
    /// When non-empty, fetch exactly these stores (no pagination).
    pub ids: Vec<String>,
    /// Restrict the listing to stores with this name.
    pub name: Option<String>,
    pub pagination: PaginationOptions,
}

/// Result of a readiness probe.
#[derive(Debug, Clone)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub message: String,
}

/// Returns the type prefix of a `type:id` identifier, or the whole string
/// when no separator is present.
pub fn object_type_of(object: &str) -> &str {
    object.split(':').next().unwrap_or(object)
}

/// Whether a user value is a userset (`type:id#relation`).
pub fn is_userset(user: &str) -> bool {
    user.contains('#')
}

/// Splits a user value into its object part and optional relation.
pub fn split_object_relation(user: &str) -> (&str, Option<&str>) {
    match user.split_once('#') {
        Some((object, relation)) => (object, Some(relation)),
        None => (user, None),
    }
}

/// Parse a user filter value into `(user_type, user_id, Option<user_relation>)`.
///
/// # Format
/// - `"type:id"` for direct users
/// - `"type:id#relation"` for usersets
///
/// # Errors
/// Returns `StorageError::InvalidFilter` if the format is invalid.
pub fn parse_user_filter(user: &str) -> StorageResult<(String, String, Option<String>)> {
    if user.contains('#') {
        let parts: Vec<&str> = user.split('#').collect();
        if parts.len() != 2 || parts[1].is_empty() {
            return Err(StorageError::InvalidFilter {
                message: format!(
                    "invalid user filter format: '{}'. Expected 'type:id#relation'",
                    user
                ),
            });
        }
        let user_parts: Vec<&str> = parts[0].split(':').collect();
        if user_parts.len() != 2 || user_parts[0].is_empty() || user_parts[1].is_empty() {
            return Err(StorageError::InvalidFilter {
                message: format!(
                    "invalid user filter format: '{}'. Expected 'type:id#relation'",
                    user
                ),
            });
        }
        Ok((
            user_parts[0].to_string(),
            user_parts[1].to_string(),
            Some(parts[1].to_string()),
        ))
    } else {
        let user_parts: Vec<&str> = user.split(':').collect();
        if user_parts.len() != 2 || user_parts[0].is_empty() || user_parts[1].is_empty() {
            return Err(StorageError::InvalidFilter {
                message: format!("invalid user filter format: '{}'. Expected 'type:id'", user),
            });
        }
        Ok((user_parts[0].to_string(), user_parts[1].to_string(), None))
    }
}

/// Validate a store ID.
///
/// # Errors
/// Returns `StorageError::InvalidInput` if the store ID is empty or too long.
pub fn validate_store_id(store_id: &str) -> StorageResult<()> {
    if store_id.is_empty() {
        return Err(StorageError::InvalidInput {
            message: "store_id cannot be empty".to_string(),
        });
    }
    if store_id.len() > MAX_FIELD_LENGTH {
        return Err(StorageError::InvalidInput {
            message: format!(
                "store_id exceeds maximum length of {} characters",
                MAX_FIELD_LENGTH
            ),
        });
    }
    Ok(())
}

/// Validate a store name.
///
/// # Errors
/// Returns `StorageError::InvalidInput` if the name is empty or too long.
pub fn validate_store_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidInput {
            message: "store name cannot be empty".to_string(),
        });
    }
    if name.len() > MAX_FIELD_LENGTH {
        return Err(StorageError::InvalidInput {
            message: format!(
                "store name exceeds maximum length of {} characters",
                MAX_FIELD_LENGTH
            ),
        });
    }
    Ok(())
}

/// Validate a tuple key at the storage boundary.
///
/// This is **structural validation** only: required components must be
/// non-empty and within length bounds. No existence checks are performed;
/// the upper layer is authoritative for invalid-write-input detection.
///
/// # Errors
/// Returns `StorageError::InvalidInput` if any component is empty or too long.
pub fn validate_tuple_key(tuple_key: &TupleKey) -> StorageResult<()> {
    for (field, value) in [
        ("object", &tuple_key.object),
        ("relation", &tuple_key.relation),
        ("user", &tuple_key.user),
    ] {
        if value.is_empty() {
            return Err(StorageError::InvalidInput {
                message: format!("{} cannot be empty", field),
            });
        }
        if value.len() > MAX_FIELD_LENGTH {
            return Err(StorageError::InvalidInput {
                message: format!(
                    "{} exceeds maximum length of {} characters",
                    field, MAX_FIELD_LENGTH
                ),
            });
        }
    }
    if let Some(condition) = &tuple_key.condition {
        if condition.name.is_empty() {
            return Err(StorageError::InvalidInput {
                message: "condition name cannot be empty if provided".to_string(),
            });
        }
    }
    Ok(())
}

/// Abstract storage interface for authorization data.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    // Store operations

    /// Creates a new store. Fails with `StoreAlreadyExists` when the id is
    /// taken, including when a concurrent creation wins the race.
    async fn create_store(&self, id: &str, name: &str) -> StorageResult<Store>;

    /// Gets a store by ID.
    async fn get_store(&self, id: &str) -> StorageResult<Store>;

    /// Updates a store's name, re-stamping `updated_at`.
    async fn update_store(&self, id: &str, name: &str) -> StorageResult<Store>;

    /// Deletes a store envelope and its index entries. Deleting an absent
    /// store is a success.
    async fn delete_store(&self, id: &str) -> StorageResult<()>;

    /// Lists stores, either by explicit id set, by name, or all, oldest
    /// first.
    async fn list_stores(&self, options: &ListStoresOptions)
        -> StorageResult<PaginatedResult<Store>>;

    // Authorization model operations

    /// Persists a model and makes it the store's latest.
    async fn write_authorization_model(
        &self,
        model: &StoredAuthorizationModel,
    ) -> StorageResult<()>;

    /// Reads one model. An empty `model_id` resolves to the latest model.
    async fn read_authorization_model(
        &self,
        store_id: &str,
        model_id: &str,
    ) -> StorageResult<StoredAuthorizationModel>;

    /// Reads the most recently written model for a store.
    async fn find_latest_authorization_model(
        &self,
        store_id: &str,
    ) -> StorageResult<StoredAuthorizationModel>;

    /// Lists models newest-first.
    async fn read_authorization_models(
        &self,
        store_id: &str,
        pagination: &PaginationOptions,
    ) -> StorageResult<PaginatedResult<StoredAuthorizationModel>>;

    // Assertion operations

    /// Replaces the assertions recorded for `(store, model)`.
    async fn write_assertions(
        &self,
        store_id: &str,
        model_id: &str,
        assertions: &[Assertion],
    ) -> StorageResult<()>;

    /// Reads the assertions for `(store, model)`; absent means empty.
    async fn read_assertions(
        &self,
        store_id: &str,
        model_id: &str,
    ) -> StorageResult<Vec<Assertion>>;

    // Tuple operations

    /// Writes a single tuple to storage.
    async fn write_tuple(&self, store_id: &str, tuple_key: TupleKey) -> StorageResult<()> {
        self.write_tuples(store_id, vec![tuple_key], vec![]).await
    }

    /// Deletes a single tuple from storage.
    async fn delete_tuple(&self, store_id: &str, tuple_key: TupleKey) -> StorageResult<()> {
        self.write_tuples(store_id, vec![], vec![tuple_key]).await
    }

    /// Applies deletes and writes in one atomic batch, keeping the primary
    /// records, both secondary indexes, and the changelog consistent.
    async fn write_tuples(
        &self,
        store_id: &str,
        writes: Vec<TupleKey>,
        deletes: Vec<TupleKey>,
    ) -> StorageResult<()>;

    /// Point read of one tuple.
    async fn read_user_tuple(
        &self,
        store_id: &str,
        object: &str,
        relation: &str,
        user: &str,
    ) -> StorageResult<Tuple>;

    /// Streams tuples matching the filter. See [`ReadFilter`] for how the
    /// populated fields select an index.
    async fn read(
        &self,
        store_id: &str,
        filter: &ReadFilter,
    ) -> StorageResult<Box<dyn TupleIterator>>;

    /// Pageable twin of `read`: returns one concrete page plus a
    /// continuation token derived from the server-side cursor.
    async fn read_page(
        &self,
        store_id: &str,
        filter: &ReadFilter,
        pagination: &PaginationOptions,
    ) -> StorageResult<PaginatedResult<Tuple>>;

    /// Streams the userset tuples of `(object, relation)`, optionally
    /// restricted to allowed `(type, relation)` references.
    async fn read_userset_tuples(
        &self,
        store_id: &str,
        filter: &ReadUsersetTuplesFilter,
    ) -> StorageResult<Box<dyn TupleIterator>>;

    /// Streams tuples relating any of the given users to objects of
    /// `object_type` via `relation`.
    async fn read_starting_with_user(
        &self,
        store_id: &str,
        filter: &ReadStartingWithUserFilter,
    ) -> StorageResult<Box<dyn TupleIterator>>;

    // Changelog operations

    /// Reads a page of tuple changes for a store, forward by default or
    /// newest-first with `sort_desc`.
    async fn read_changes(
        &self,
        store_id: &str,
        filter: &ReadChangesFilter,
        options: &ReadChangesOptions,
    ) -> StorageResult<PaginatedResult<TupleChange>>;

    // Lifecycle

    /// Reports whether the datastore is ready to accept traffic.
    async fn is_ready(&self) -> StorageResult<ReadinessStatus>;

    /// Upper bound on tuples accepted per `write_tuples` call.
    fn max_tuples_per_write(&self) -> usize;

    /// Upper bound on type definitions per authorization model.
    fn max_types_per_authorization_model(&self) -> usize;
}
