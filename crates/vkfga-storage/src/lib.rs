//! vkfga-storage: Valkey/Redis storage backend for relationship-based
//! authorization.
//!
//! This crate persists the four kinds of state behind a ReBAC query
//! engine: stores (tenants), versioned authorization models, relationship
//! tuples, and a changelog of tuple mutations. It speaks to any
//! Redis-protocol server and exposes the data through the `DataStore`
//! trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 vkfga-storage                   │
//! ├─────────────────────────────────────────────────┤
//! │  traits.rs   - DataStore trait and domain types │
//! │  valkey.rs   - Valkey/Redis implementation      │
//! │  iterator.rs - lazy tuple iterators             │
//! │  keys.rs     - key schema                       │
//! │  token.rs    - continuation token codecs        │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! Every query shape is a single index touch: point reads hit the primary
//! tuple record, forward and reverse edge scans walk per-edge and per-user
//! sets, paginated enumeration walks creation-time sorted sets with a
//! tie-safe `(score, member)` cursor, and change streaming reads a
//! per-store stream whose server-assigned ids are strictly monotonic.

pub mod error;
pub mod iterator;
mod keys;
mod token;
pub mod traits;
pub mod valkey;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use iterator::{CombinedTupleIterator, StaticTupleIterator, TupleIterator};
pub use traits::{
    is_userset, object_type_of, parse_user_filter, split_object_relation, validate_store_id,
    validate_store_name, validate_tuple_key, Assertion, DataStore, ListStoresOptions, ObjectRelation, PaginatedResult,
    PaginationOptions, ReadChangesFilter, ReadChangesOptions, ReadFilter, ReadStartingWithUserFilter,
    ReadUsersetTuplesFilter, ReadinessStatus, RelationReference, Store, StoredAuthorizationModel,
    Tuple, TupleChange, TupleCondition, TupleKey, TupleOperation, DEFAULT_MAX_TUPLES_PER_WRITE,
    DEFAULT_MAX_TYPES_PER_AUTHORIZATION_MODEL, DEFAULT_PAGE_SIZE,
};
pub use valkey::{ValkeyConfig, ValkeyDataStore};

// Re-export chrono types for timestamp handling
pub use chrono::{DateTime, Utc};
