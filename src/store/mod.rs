//! Topic storage
//!
//! [`TopicRepository`] is the contract the mapping layer works against.
//! [`MemoryStore`] is the in-process implementation: a concurrent arena
//! keyed by topic id with a unique-key index for path lookups.

mod memory;
mod traits;

pub use memory::MemoryStore;
pub use traits::{RepositoryError, RepositoryResult, TopicRepository};
