//! Storage backends.
//!
//! Both implement [`MessageStore`]; the facade holds exactly one of them.
//!
//! | Backend | Survives restart | Read order | Search |
//! |---------|------------------|------------|--------|
//! | [`InMemoryStore`] | no | oldest → newest (recency) | no |
//! | [`SqliteStore`] | yes | newest → oldest (write time) | FTS5 |

pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{BackendKind, BackendStats, CacheError, CacheStats, MessageStore};
