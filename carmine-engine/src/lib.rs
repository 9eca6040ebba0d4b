//! # Carmine Storage Engine
//!
//! In-memory storage for the Carmine server: a sharded concurrent map
//! with per-key lazy expiry, and the rank-augmented skiplist index that
//! backs sorted sets.
//!
//! ## Structure Overview
//!
//! ```text
//! Database
//!   ├── data:    ShardedMap<Value>        (32 shards, RwLock each)
//!   │              └── Value::Str(Arc<[u8]>) | Value::Sorted(ZSet)
//!   │                                          ├── SkipList (index arena)
//!   │                                          └── member -> score map
//!   └── expires: ShardedMap<SystemTime>   (absolute deadlines)
//! ```

mod db;
mod hash;
mod map;
mod skiplist;
mod value;
mod zset;

pub use db::{Database, TtlStatus};
pub use hash::fnv1a_32;
pub use map::{ShardedMap, SHARD_COUNT};
pub use skiplist::{RangeSpec, SkipList};
pub use value::Value;
pub use zset::ZSet;
