//! Key construction for every logical record and index.
//!
//! All keys are ASCII, colon-delimited, and prefixed by a namespace
//! constant. Keys embed the full `object` / `user` strings, which may
//! themselves contain `:` or `#`; keys are therefore write-only: records
//! are always recovered by decoding the stored value, never by parsing key
//! text.

const STORE_PREFIX: &str = "stores";
const MODEL_PREFIX: &str = "models";
const ASSERTION_PREFIX: &str = "assertions";
const TUPLE_PREFIX: &str = "tuples";
const CHANGELOG_PREFIX: &str = "changelog";

/// `stores:{id}` -> encoded Store
pub fn store_key(store_id: &str) -> String {
    format!("{STORE_PREFIX}:{store_id}")
}

/// `stores:index` -> sorted set of store ids scored by creation time.
pub fn stores_index_key() -> String {
    format!("{STORE_PREFIX}:index")
}

/// `stores:by_name:{name}` -> sorted set of store ids sharing one name.
pub fn stores_by_name_key(name: &str) -> String {
    format!("{STORE_PREFIX}:by_name:{name}")
}

/// `models:{store}:{model_id}` -> encoded AuthorizationModel
pub fn authorization_model_key(store_id: &str, model_id: &str) -> String {
    format!("{MODEL_PREFIX}:{store_id}:{model_id}")
}

/// `models:{store}:latest` -> model id
pub fn latest_authorization_model_key(store_id: &str) -> String {
    format!("{MODEL_PREFIX}:{store_id}:latest")
}

/// `models:index:{store}` -> sorted set of model ids scored by id time.
pub fn models_index_key(store_id: &str) -> String {
    format!("{MODEL_PREFIX}:index:{store_id}")
}

/// `assertions:{store}:{model_id}` -> JSON array of assertions
pub fn assertions_key(store_id: &str, model_id: &str) -> String {
    format!("{ASSERTION_PREFIX}:{store_id}:{model_id}")
}

/// `tuples:{store}:{object}:{relation}:{user}` -> encoded Tuple
pub fn tuple_key(store_id: &str, object: &str, relation: &str, user: &str) -> String {
    format!("{TUPLE_PREFIX}:{store_id}:{object}:{relation}:{user}")
}

/// MATCH pattern covering every tuple of a store.
pub fn tuple_match_pattern(store_id: &str) -> String {
    tuple_key(store_id, "*", "*", "*")
}

/// `index:obj_rel:{store}:{object}:{relation}` -> set of `user` (forward index)
pub fn index_object_relation_key(store_id: &str, object: &str, relation: &str) -> String {
    format!("index:obj_rel:{store_id}:{object}:{relation}")
}

/// `index:user:{store}:{user}` -> set of `object#relation` (reverse index)
pub fn index_user_key(store_id: &str, user: &str) -> String {
    format!("index:user:{store_id}:{user}")
}

/// `changelog:{store}` -> append-only stream of tuple changes
pub fn changelog_key(store_id: &str) -> String {
    format!("{CHANGELOG_PREFIX}:{store_id}")
}
