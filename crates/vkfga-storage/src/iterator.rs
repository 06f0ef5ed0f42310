//! Lazy tuple iterators.
//!
//! A [`TupleIterator`] streams tuples back from a query without
//! materializing the full result set. `next` consumes, `head` peeks, and
//! `stop` releases the iterator early; an exhausted iterator yields
//! `Ok(None)`. Iterators are single-consumer, but every method serializes
//! on an internal mutex so a concurrent `stop` is safe.
//!
//! [`ValkeyTupleIterator`] is the workhorse: it walks a server-side cursor
//! (`SSCAN` over an index set, or `SCAN` over the tuple keyspace),
//! translates raw members into primary keys under the active filter, and
//! hydrates each batch with a single `MGET`. Scans offer no snapshot
//! isolation: members deleted mid-scan are skipped when their primary
//! record is gone, and concurrently added members may or may not appear.

use std::collections::VecDeque;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::StorageResult;
use crate::keys;
use crate::traits::{
    is_userset, object_type_of, split_object_relation, RelationReference, Tuple,
};

/// How many raw members a single scan round trip requests.
pub(crate) const SCAN_BATCH_SIZE: usize = 100;

/// A stateful, cancellable stream of tuples.
#[async_trait]
pub trait TupleIterator: Send + Sync {
    /// Returns the next tuple, or `None` once the iterator is exhausted.
    async fn next(&self) -> StorageResult<Option<Tuple>>;

    /// Returns the next tuple without consuming it.
    async fn head(&self) -> StorageResult<Option<Tuple>>;

    /// Releases the iterator. Idempotent; subsequent `next`/`head` calls
    /// yield `None`.
    async fn stop(&self);
}

/// An iterator over a pre-materialized list of tuples.
pub struct StaticTupleIterator {
    items: Mutex<VecDeque<Tuple>>,
}

impl StaticTupleIterator {
    pub fn new(items: Vec<Tuple>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }

    /// An iterator that is exhausted from the start.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl TupleIterator for StaticTupleIterator {
    async fn next(&self) -> StorageResult<Option<Tuple>> {
        Ok(self.items.lock().await.pop_front())
    }

    async fn head(&self) -> StorageResult<Option<Tuple>> {
        Ok(self.items.lock().await.front().cloned())
    }

    async fn stop(&self) {
        self.items.lock().await.clear();
    }
}

/// Sequential composition of several iterators.
pub struct CombinedTupleIterator {
    inner: Mutex<VecDeque<Box<dyn TupleIterator>>>,
}

impl CombinedTupleIterator {
    pub fn new(iterators: Vec<Box<dyn TupleIterator>>) -> Self {
        Self {
            inner: Mutex::new(iterators.into()),
        }
    }
}

#[async_trait]
impl TupleIterator for CombinedTupleIterator {
    async fn next(&self) -> StorageResult<Option<Tuple>> {
        let mut inner = self.inner.lock().await;
        while let Some(current) = inner.front() {
            if let Some(tuple) = current.next().await? {
                return Ok(Some(tuple));
            }
            inner.pop_front();
        }
        Ok(None)
    }

    async fn head(&self) -> StorageResult<Option<Tuple>> {
        let mut inner = self.inner.lock().await;
        while let Some(current) = inner.front() {
            if let Some(tuple) = current.head().await? {
                return Ok(Some(tuple));
            }
            inner.pop_front();
        }
        Ok(None)
    }

    async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        for iterator in inner.iter() {
            iterator.stop().await;
        }
        inner.clear();
    }
}

/// Where the raw members come from.
enum ScanSource {
    /// `SSCAN` over an index set.
    Set { key: String },
    /// `SCAN` over the keyspace with a MATCH pattern.
    Keyspace { pattern: String },
}

/// How raw members translate into primary tuple keys.
enum MemberMode {
    /// Members are users of a fixed `(object, relation)`.
    Forward { object: String, relation: String },
    /// Members are users of a fixed `(object, relation)`; only usersets
    /// passing the type restrictions survive.
    Userset {
        object: String,
        relation: String,
        allowed: Vec<RelationReference>,
    },
    /// Members are `object#relation` pairs of a fixed user.
    Reverse {
        user: String,
        target_object: Option<String>,
        target_object_type: Option<String>,
        target_relation: Option<String>,
    },
    /// Members are primary keys already.
    FullScan,
}

struct ScanState {
    conn: ConnectionManager,
    cursor: u64,
    buffer: VecDeque<Tuple>,
    eof: bool,
}

/// Iterator over a server-side scan cursor with batched hydration.
pub struct ValkeyTupleIterator {
    store_id: String,
    source: ScanSource,
    mode: MemberMode,
    state: Mutex<ScanState>,
}

impl ValkeyTupleIterator {
    /// Forward-index scan: the users of `(object, relation)`.
    pub(crate) fn forward(
        conn: ConnectionManager,
        store_id: &str,
        object: &str,
        relation: &str,
    ) -> Self {
        Self::new(
            conn,
            store_id,
            ScanSource::Set {
                key: keys::index_object_relation_key(store_id, object, relation),
            },
            MemberMode::Forward {
                object: object.to_string(),
                relation: relation.to_string(),
            },
        )
    }

    /// Forward-index scan restricted to userset members.
    pub(crate) fn userset(
        conn: ConnectionManager,
        store_id: &str,
        object: &str,
        relation: &str,
        allowed: Vec<RelationReference>,
    ) -> Self {
        Self::new(
            conn,
            store_id,
            ScanSource::Set {
                key: keys::index_object_relation_key(store_id, object, relation),
            },
            MemberMode::Userset {
                object: object.to_string(),
                relation: relation.to_string(),
                allowed,
            },
        )
    }

    /// Reverse-index scan: the `(object, relation)` pairs of `user`,
    /// narrowed by exact object, object type, and/or relation.
    pub(crate) fn reverse(
        conn: ConnectionManager,
        store_id: &str,
        user: &str,
        target_object: Option<String>,
        target_object_type: Option<String>,
        target_relation: Option<String>,
    ) -> Self {
        Self::new(
            conn,
            store_id,
            ScanSource::Set {
                key: keys::index_user_key(store_id, user),
            },
            MemberMode::Reverse {
                user: user.to_string(),
                target_object,
                target_object_type,
                target_relation,
            },
        )
    }

    /// Keyspace scan over every tuple of a store.
    pub(crate) fn full_scan(conn: ConnectionManager, store_id: &str) -> Self {
        Self::new(
            conn,
            store_id,
            ScanSource::Keyspace {
                pattern: keys::tuple_match_pattern(store_id),
            },
            MemberMode::FullScan,
        )
    }

    fn new(conn: ConnectionManager, store_id: &str, source: ScanSource, mode: MemberMode) -> Self {
        Self {
            store_id: store_id.to_string(),
            source,
            mode,
            state: Mutex::new(ScanState {
                conn,
                cursor: 0,
                buffer: VecDeque::new(),
                eof: false,
            }),
        }
    }

    /// Refills the buffer: scan a batch of raw members, translate them into
    /// primary keys, hydrate with one `MGET`, decode. Loops until at least
    /// one tuple lands or the server cursor wraps to zero.
    async fn refill(&self, state: &mut ScanState) -> StorageResult<()> {
        while state.buffer.is_empty() && !state.eof {
            let (next_cursor, members): (u64, Vec<String>) = match &self.source {
                ScanSource::Set { key } => {
                    redis::cmd("SSCAN")
                        .arg(key)
                        .arg(state.cursor)
                        .arg("COUNT")
                        .arg(SCAN_BATCH_SIZE)
                        .query_async(&mut state.conn)
                        .await?
                }
                ScanSource::Keyspace { pattern } => {
                    redis::cmd("SCAN")
                        .arg(state.cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH_SIZE)
                        .query_async(&mut state.conn)
                        .await?
                }
            };

            state.cursor = next_cursor;
            if next_cursor == 0 {
                state.eof = true;
            }

            let tuple_keys: Vec<String> = members
                .iter()
                .filter_map(|member| translate_member(&self.store_id, &self.mode, member))
                .collect();
            if tuple_keys.is_empty() {
                continue;
            }

            // A member whose primary record was deleted mid-scan hydrates
            // to nil and is skipped.
            let values: Vec<Option<String>> = state.conn.mget(&tuple_keys).await?;
            for value in values.into_iter().flatten() {
                if let Some(tuple) = decode_tuple(&value) {
                    state.buffer.push_back(tuple);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TupleIterator for ValkeyTupleIterator {
    async fn next(&self) -> StorageResult<Option<Tuple>> {
        let mut state = self.state.lock().await;
        if state.buffer.is_empty() {
            if state.eof {
                return Ok(None);
            }
            self.refill(&mut state).await?;
        }
        Ok(state.buffer.pop_front())
    }

    async fn head(&self) -> StorageResult<Option<Tuple>> {
        let mut state = self.state.lock().await;
        if state.buffer.is_empty() {
            if state.eof {
                return Ok(None);
            }
            self.refill(&mut state).await?;
        }
        Ok(state.buffer.front().cloned())
    }

    async fn stop(&self) {
        let mut state = self.state.lock().await;
        state.buffer.clear();
        state.eof = true;
    }
}

/// Translates a raw scan member into the primary key it hydrates from,
/// applying the mode's narrowing filters. Returns `None` when the member is
/// filtered out or malformed.
fn translate_member(store_id: &str, mode: &MemberMode, member: &str) -> Option<String> {
    match mode {
        MemberMode::FullScan => Some(member.to_string()),

        MemberMode::Forward { object, relation } => {
            Some(keys::tuple_key(store_id, object, relation, member))
        }

        MemberMode::Userset {
            object,
            relation,
            allowed,
        } => {
            if !is_userset(member) {
                return None;
            }
            if !allowed.is_empty() {
                let (object_part, user_relation) = split_object_relation(member);
                let user_type = object_type_of(object_part);
                let permitted = allowed.iter().any(|reference| {
                    reference.type_name == user_type
                        && Some(reference.relation.as_str()) == user_relation
                });
                if !permitted {
                    return None;
                }
            }
            Some(keys::tuple_key(store_id, object, relation, member))
        }

        MemberMode::Reverse {
            user,
            target_object,
            target_object_type,
            target_relation,
        } => {
            let (object, relation) = member.split_once('#')?;
            if let Some(target) = target_object {
                if object != target {
                    return None;
                }
            }
            if let Some(target_type) = target_object_type {
                if object_type_of(object) != target_type {
                    return None;
                }
            }
            if let Some(target) = target_relation {
                if relation != target {
                    return None;
                }
            }
            Some(keys::tuple_key(store_id, object, relation, user))
        }
    }
}

/// Decodes a stored tuple value, normalizing an absent condition context.
/// Undecodable records are skipped with a diagnostic.
pub(crate) fn decode_tuple(raw: &str) -> Option<Tuple> {
    match serde_json::from_str::<Tuple>(raw) {
        Ok(mut tuple) => {
            tuple.key.normalize_condition();
            Some(tuple)
        }
        Err(error) => {
            warn!(%error, "failed to decode stored tuple, skipping");
            None
        }
    }
}
