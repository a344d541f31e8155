//! Persistent (immutable) sorted map and its transient builder.
//!
//! This module provides an ordered key/value map built on a balanced search
//! tree with structural sharing:
//!
//! - [`PersistentSortedMap`]: an immutable snapshot; every update returns a
//!   new map sharing unchanged subtrees with the original
//! - [`SortedMapBuilder`]: a single-owner mutable builder over the same tree
//!   engine, with a version counter that fail-fasts in-flight cursors
//! - [`EntryCursor`]: a stamped in-order cursor over a builder's entries
//!
//! # Structural Sharing
//!
//! Tree nodes are immutable and reference-counted. A mutation allocates new
//! nodes only along the affected root-to-leaf path; every subtree off that
//! path is shared between the old and new root. Snapshots therefore cost
//! O(log n) per update and O(1) to publish, and an arbitrary number of
//! snapshots and builders may hold the same subtrees at once.
//!
//! # Examples
//!
//! ```rust
//! use sylva::persistent::PersistentSortedMap;
//!
//! let original = PersistentSortedMap::new()
//!     .insert(2, "two")
//!     .insert(1, "one");
//!
//! let mut builder = original.builder();
//! builder.put(3, "three");
//! builder.remove(&1);
//! let updated = builder.freeze();
//!
//! // The original snapshot is untouched by the builder's mutations.
//! assert_eq!(original.len(), 2);
//! assert_eq!(updated.len(), 2);
//! assert_eq!(original.get(&1), Some(&"one"));
//! assert_eq!(updated.get(&1), None);
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type for tree nodes.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`, which is
/// thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod builder;
mod sortedmap;
mod tree;

pub use builder::EntryCursor;
pub use builder::KeyCursor;
pub use builder::SortedMapBuilder;
pub use builder::ValueCursor;
pub use sortedmap::PersistentSortedMap;
pub use sortedmap::PersistentSortedMapIntoIterator;
pub use sortedmap::PersistentSortedMapIterator;

// =============================================================================
// Tests
// =============================================================================
