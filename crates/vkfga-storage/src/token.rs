//! Continuation token codecs.
//!
//! Sorted-set traversals resume from a `(score, member)` cursor carried as
//! base64-encoded JSON. Bare non-negative integers are accepted as legacy
//! offset tokens; new tokens are always emitted in cursor form. Changelog
//! traversals use server-native `ms-seq` stream ids, with foreign
//! lexicographic 128-bit ids degraded to their millisecond component.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// A resumable position within a sorted-set traversal.
///
/// The pair is a lexicographic key: entries at the cursor's score are
/// disambiguated by member, so ties never cause a member to be visited
/// twice within one traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZSetCursor {
    #[serde(rename = "s")]
    pub score: f64,
    #[serde(rename = "m")]
    pub member: String,
}

/// A decoded pagination token for sorted-set traversals.
#[derive(Debug, Clone, PartialEq)]
pub enum ContinuationToken {
    Cursor(ZSetCursor),
    /// Legacy rank offset, accepted for compatibility but never emitted.
    Offset(u64),
}

/// Encodes a `(score, member)` cursor as a self-contained token.
pub fn encode_zset_cursor(score: f64, member: &str) -> String {
    let cursor = ZSetCursor {
        score,
        member: member.to_string(),
    };
    // Serializing a two-field struct cannot fail.
    let bytes = serde_json::to_vec(&cursor).unwrap_or_default();
    BASE64.encode(bytes)
}

/// Decodes a token as either a cursor or a legacy integer offset.
///
/// # Errors
/// Returns `StorageError::InvalidContinuationToken` when the token decodes
/// as neither form.
pub fn parse_continuation_token(token: &str) -> StorageResult<ContinuationToken> {
    if let Ok(bytes) = BASE64.decode(token) {
        if let Ok(cursor) = serde_json::from_slice::<ZSetCursor>(&bytes) {
            return Ok(ContinuationToken::Cursor(cursor));
        }
    }
    if let Ok(offset) = token.parse::<u64>() {
        return Ok(ContinuationToken::Offset(offset));
    }
    Err(StorageError::InvalidContinuationToken {
        token: token.to_string(),
    })
}

/// A decoded resumption point for a changelog traversal.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeToken {
    /// A server-native `ms` or `ms-seq` stream id; resumption is exclusive.
    Native(String),
    /// A foreign lexicographic 128-bit id, reduced to its millisecond time.
    /// Intra-millisecond precision is conceded.
    Foreign(u64),
}

/// Parses a changelog continuation token.
///
/// # Errors
/// Returns `StorageError::InvalidContinuationToken` when the token is
/// neither a stream id nor a lexicographic time-sortable id.
pub fn parse_change_token(token: &str) -> StorageResult<ChangeToken> {
    if let Ok(id) = ulid::Ulid::from_string(token) {
        return Ok(ChangeToken::Foreign(id.timestamp_ms()));
    }
    if split_stream_id(token).is_some() {
        return Ok(ChangeToken::Native(token.to_string()));
    }
    Err(StorageError::InvalidContinuationToken {
        token: token.to_string(),
    })
}

/// Splits a stream id into its millisecond prefix and sequence counter.
/// A bare millisecond value carries sequence 0.
pub fn split_stream_id(id: &str) -> Option<(i64, u64)> {
    let (ms, seq) = match id.split_once('-') {
        Some((ms, seq)) => (ms, seq.parse::<u64>().ok()?),
        None => (id, 0),
    };
    Some((ms.parse::<i64>().ok()?, seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trip() {
        let token = encode_zset_cursor(1234.5, "01HXYZ");
        match parse_continuation_token(&token).unwrap() {
            ContinuationToken::Cursor(cursor) => {
                assert_eq!(cursor.score, 1234.5);
                assert_eq!(cursor.member, "01HXYZ");
            }
            other => panic!("expected cursor token, got {:?}", other),
        }
    }

    #[test]
    fn test_cursor_round_trip_preserves_nanosecond_scores() {
        let score = 1_700_000_000_123_456_768_f64;
        let token = encode_zset_cursor(score, "m");
        match parse_continuation_token(&token).unwrap() {
            ContinuationToken::Cursor(cursor) => assert_eq!(cursor.score, score),
            other => panic!("expected cursor token, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_offset_token() {
        assert_eq!(
            parse_continuation_token("1000").unwrap(),
            ContinuationToken::Offset(1000)
        );
        assert_eq!(
            parse_continuation_token("0").unwrap(),
            ContinuationToken::Offset(0)
        );
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result = parse_continuation_token("not a token!");
        assert!(matches!(
            result,
            Err(StorageError::InvalidContinuationToken { .. })
        ));
    }

    #[test]
    fn test_change_token_native() {
        assert_eq!(
            parse_change_token("1700000000000-3").unwrap(),
            ChangeToken::Native("1700000000000-3".to_string())
        );
        assert_eq!(
            parse_change_token("1700000000000").unwrap(),
            ChangeToken::Native("1700000000000".to_string())
        );
    }

    #[test]
    fn test_change_token_foreign_ulid_degrades_to_millis() {
        let id = ulid::Ulid::new();
        match parse_change_token(&id.to_string()).unwrap() {
            ChangeToken::Foreign(ms) => assert_eq!(ms, id.timestamp_ms()),
            other => panic!("expected foreign token, got {:?}", other),
        }
    }

    #[test]
    fn test_change_token_invalid() {
        assert!(matches!(
            parse_change_token("definitely-not-an-id"),
            Err(StorageError::InvalidContinuationToken { .. })
        ));
    }

    #[test]
    fn test_split_stream_id() {
        assert_eq!(split_stream_id("1700000000000-7"), Some((1_700_000_000_000, 7)));
        assert_eq!(split_stream_id("1700000000000"), Some((1_700_000_000_000, 0)));
        assert_eq!(split_stream_id("abc-1"), None);
    }
}
