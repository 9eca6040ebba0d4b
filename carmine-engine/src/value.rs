//! Stored value variants. Typed commands match on the variant and
//! answer WRONGTYPE on a mismatch; the tag check is a plain `match`, so
//! there is no dynamic dispatch on the hot path.

use std::sync::Arc;

use crate::zset::ZSet;

/// A value held in a database slot.
pub enum Value {
    /// Immutable byte string; writes replace the whole buffer.
    Str(Arc<[u8]>),
    /// Ordered scored set, mutated in place under the shard lock.
    Sorted(ZSet),
}

impl Value {
    /// Builds a string value from any byte source.
    pub fn str(data: impl Into<Vec<u8>>) -> Value {
        Value::Str(Arc::from(data.into().into_boxed_slice()))
    }

    /// Type tag as reported by the TYPE command.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Sorted(_) => "zset",
        }
    }
}
