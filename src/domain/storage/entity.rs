//! Storage entity traits and id handling

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Trait for entity kinds handled by the tenant-scoped store
///
/// Each kind maps to one table (or map) in the backend; the payload is
/// JSON-serialized and the id, tenant and timestamps are kept as indexed
/// columns.
pub trait StorageEntity: Clone + Debug + Send + Sync + Serialize + DeserializeOwned {
    /// Backend table/collection name for this kind
    const KIND: &'static str;

    /// The entity's identifier
    fn id(&self) -> &str;

    /// Overwrite the entity's identifier. Upserts write under the id in
    /// the request path, which wins over any id inside the payload.
    fn set_id(&mut self, id: &str);

    /// Creation timestamp, if already assigned
    fn created_at(&self) -> Option<DateTime<Utc>>;

    /// Assign server-side timestamps. Called by stores on upsert: the
    /// creation time of an existing row is preserved, the update time is
    /// always refreshed.
    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>);
}

/// Percent-decode an entity id received over the wire.
///
/// Malformed escape sequences are kept verbatim rather than rejected, so
/// lookups never fail on ids that were stored unescaped.
pub fn decode_id(id: &str) -> String {
    let bytes = id.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    fn hex_digit(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| id.to_string())
}
