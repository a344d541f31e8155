//! # sylva
//!
//! Persistent sorted maps with structural sharing, transient builders,
//! and pluggable comparators.
//!
//! ## Overview
//!
//! This library provides an immutable ordered key/value map together with a
//! mutable builder for efficient batched construction and modification:
//!
//! - **`PersistentSortedMap`**: an immutable snapshot backed by a balanced
//!   search tree. Every update returns a new map that shares unchanged
//!   subtrees with the original.
//! - **`SortedMapBuilder`**: a single-owner mutable front door over the same
//!   tree engine. Batched mutations swap a root pointer instead of copying,
//!   and [`freeze`](persistent::SortedMapBuilder::freeze) publishes an
//!   immutable snapshot in O(1).
//! - **Comparators**: key ordering and value equality are injected
//!   capabilities, so case-insensitive string keys (with canonical stored-key
//!   reporting) or other custom orderings are a configuration concern rather
//!   than a key-type concern.
//!
//! ## Feature Flags
//!
//! - `arc`: use `std::sync::Arc` for node links instead of `std::rc::Rc`,
//!   making snapshots shareable across threads
//! - `serde`: `Serialize`/`Deserialize` support for the map
//!
//! ## Example
//!
//! ```rust
//! use sylva::persistent::PersistentSortedMap;
//!
//! let mut builder = PersistentSortedMap::new().builder();
//! builder.put(2, "two");
//! builder.put(1, "one");
//! let snapshot = builder.freeze();
//!
//! // The snapshot is unaffected by later mutation of the builder.
//! builder.put(3, "three");
//! assert_eq!(snapshot.len(), 2);
//! let keys: Vec<&i32> = snapshot.keys().collect();
//! assert_eq!(keys, vec![&1, &2]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use sylva::prelude::*;
/// ```
pub mod prelude {
    pub use crate::comparator::*;
    pub use crate::error::*;
    pub use crate::persistent::*;
}

pub mod comparator;
pub mod error;
pub mod persistent;

#[cfg(test)]
mod tests {
    use crate::persistent::PersistentSortedMap;

    #[test]
    fn library_compiles() {
        // Basic smoke test to ensure the public surface is wired together
        let map: PersistentSortedMap<i32, i32> = PersistentSortedMap::new();
        assert!(map.is_empty());
    }
}
