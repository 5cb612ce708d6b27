//! Hybrid memory: authoritative outputs and execution log, plus an
//! optional semantic index over outputs and extracted facts.

pub mod embedding;
pub mod index;
pub mod snapshot;
pub mod sqlite_index;
pub mod store;

pub use embedding::{Embedder, HashingEmbedder};
pub use index::{IndexEntry, IndexFilter, IndexHit, IndexScope, InMemoryIndex, SemanticIndex};
pub use snapshot::MemorySnapshot;
pub use sqlite_index::SqliteIndex;
pub use store::{FactHit, MemoryStore, OutputHit};
