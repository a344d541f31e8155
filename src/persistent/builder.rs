//! Mutable builder over the persistent sorted map.
//!
//! [`SortedMapBuilder`] is the mutation front door: it owns a current root
//! reference and a version counter, delegates every mutation to the pure
//! tree engine, and publishes immutable snapshots on demand via
//! [`freeze`](SortedMapBuilder::freeze) without copying unchanged
//! structure. In-flight cursors are stamped with the version they were
//! created against, so structural mutation during a traversal is detected
//! and reported instead of silently producing wrong results.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use smallvec::SmallVec;

use super::ReferenceCounter;
use super::sortedmap::{PersistentSortedMap, PersistentSortedMapIterator};
use super::tree::{self, Link, Node};
use crate::comparator::{KeyComparator, NaturalOrder, ValueComparator, ValueEquality};
use crate::error::{
    CursorExhaustedError, CursorInvalidatedError, DuplicateKeyError, KeyNotFoundError, MapError,
};

// =============================================================================
// SortedMapBuilder Definition
// =============================================================================

/// A mutable builder for efficient batched construction and modification of
/// persistent sorted maps.
///
/// The builder wraps a current root reference and the comparators of the
/// map it was derived from. Each structural mutation swaps the root for a
/// freshly built path (sharing everything else) and increments the version
/// counter exactly once; no-op mutations, such as re-adding an existing
/// entry, leave the version untouched. [`freeze`](Self::freeze) wraps the
/// current root into a [`PersistentSortedMap`] in O(1), after which the
/// builder remains fully usable — previously frozen snapshots are never
/// affected, because shared nodes are never mutated in place.
///
/// # Design
///
/// - All mutation logic is delegated to the same pure tree functions the
///   persistent map uses; there is no second code path.
/// - `PhantomData<Rc<()>>` ensures `!Send` and `!Sync`: a builder has
///   exactly one logical owner and is never shared across threads, even
///   when the `arc` feature makes the snapshots themselves shareable.
/// - `Clone`/`Copy` are intentionally not implemented.
///
/// # Examples
///
/// ```rust
/// use sylva::persistent::SortedMapBuilder;
///
/// let mut builder = SortedMapBuilder::new();
/// builder.put(2, "two");
/// builder.put(1, "one");
/// builder.put(3, "three");
///
/// let snapshot = builder.freeze();
/// assert_eq!(snapshot.len(), 3);
///
/// // The builder keeps working; the snapshot is already published.
/// builder.remove(&2);
/// assert_eq!(builder.len(), 2);
/// assert_eq!(snapshot.len(), 3);
/// ```
///
/// # Builder-Snapshot Pattern
///
/// ```rust
/// use sylva::persistent::PersistentSortedMap;
///
/// let original: PersistentSortedMap<i32, i32> =
///     [(1, 10), (2, 20), (3, 30)].into_iter().collect();
///
/// // Batch-edit through a builder derived from the snapshot.
/// let mut builder = original.builder();
/// builder.put(4, 40);
/// builder.remove(&1);
/// let updated = builder.freeze();
///
/// assert_eq!(original.len(), 3); // original unchanged
/// assert_eq!(updated.len(), 3);
/// assert!(updated.contains_key(&4));
/// ```
pub struct SortedMapBuilder<K, V, C = NaturalOrder, E = ValueEquality> {
    root: Link<K, V>,
    key_comparator: C,
    value_comparator: E,
    /// Bumped exactly once per structural mutation; shared with cursors.
    version: ReferenceCounter<Cell<u64>>,
    /// Marker to ensure `!Send` and `!Sync`.
    _marker: PhantomData<Rc<()>>,
}

// Static assertions to verify the builder is single-owner only.
static_assertions::assert_not_impl_any!(SortedMapBuilder<i32, i32>: Send, Sync);
static_assertions::assert_not_impl_any!(SortedMapBuilder<String, String>: Send, Sync);

// Arc feature verification: even with Arc links the builder stays confined.
#[cfg(feature = "arc")]
mod arc_send_sync_verification {
    use super::SortedMapBuilder;
    use std::sync::Arc;

    static_assertions::assert_not_impl_any!(SortedMapBuilder<Arc<i32>, Arc<i32>>: Send, Sync);
}

// =============================================================================
// Construction
// =============================================================================

impl<K, V, C, E> SortedMapBuilder<K, V, C, E> {
    pub(crate) fn from_parts(root: Link<K, V>, key_comparator: C, value_comparator: E) -> Self {
        Self {
            root,
            key_comparator,
            value_comparator,
            version: ReferenceCounter::new(Cell::new(0)),
            _marker: PhantomData,
        }
    }

    fn bump(&self) {
        self.version.set(self.version.get() + 1);
    }

    /// Returns the number of entries.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        tree::count(&self.root)
    }

    /// Returns `true` if the builder contains no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// The current structural version.
    ///
    /// Starts at 0 and increments exactly once per structural mutation;
    /// no-op mutations do not change it. Cursors capture this value at
    /// creation and fail once it moves.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.get()
    }
}

impl<K, V> SortedMapBuilder<K, V> {
    /// Creates an empty builder ordered by the key type's `Ord` instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::SortedMapBuilder;
    ///
    /// let builder: SortedMapBuilder<i32, String> = SortedMapBuilder::new();
    /// assert!(builder.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(None, NaturalOrder, ValueEquality)
    }
}

impl<K, V, C: KeyComparator<K>> SortedMapBuilder<K, V, C, ValueEquality> {
    /// Creates an empty builder ordered by the given key comparator.
    #[must_use]
    pub fn with_comparator(key_comparator: C) -> Self {
        Self::from_parts(None, key_comparator, ValueEquality)
    }
}

impl<K, V, C: KeyComparator<K>, E: ValueComparator<V>> SortedMapBuilder<K, V, C, E> {
    /// Creates an empty builder with explicit key and value comparators.
    #[must_use]
    pub fn with_comparators(key_comparator: C, value_comparator: E) -> Self {
        Self::from_parts(None, key_comparator, value_comparator)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns a reference to the value stored under a key equivalent to
    /// `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        tree::search(&self.root, &self.key_comparator, key).map(|node| &node.value)
    }

    /// Returns the *stored* key equivalent to `key`.
    ///
    /// Recovers the canonical spelling when the comparator treats distinct
    /// key values as equivalent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::comparator::CaseInsensitiveOrdinal;
    /// use sylva::persistent::SortedMapBuilder;
    ///
    /// let mut builder = SortedMapBuilder::with_comparator(CaseInsensitiveOrdinal);
    /// builder.put("a".to_string(), 1);
    /// assert_eq!(builder.get_key(&"A".to_string()), Some(&"a".to_string()));
    /// ```
    #[must_use]
    pub fn get_key(&self, key: &K) -> Option<&K> {
        tree::search(&self.root, &self.key_comparator, key).map(|node| &node.key)
    }

    /// Strict lookup: like [`get`](Self::get), but absence is an error.
    ///
    /// # Errors
    ///
    /// Returns [`KeyNotFoundError`] when no equivalent key is stored.
    pub fn fetch(&self, key: &K) -> Result<&V, KeyNotFoundError> {
        self.get(key).ok_or(KeyNotFoundError)
    }

    /// Returns `true` if the builder contains a key equivalent to `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns `true` if the builder contains an entry whose key is
    /// equivalent to `key` *and* whose value equals `value` under the value
    /// comparator.
    #[must_use]
    pub fn contains_entry(&self, key: &K, value: &V) -> bool {
        tree::search(&self.root, &self.key_comparator, key)
            .is_some_and(|node| self.value_comparator.equals(&node.value, value))
    }

    // =========================================================================
    // Cursors
    // =========================================================================

    /// Returns a fail-fast cursor over entries in ascending key order.
    ///
    /// The cursor reflects the builder's root at the moment of this call
    /// and is stamped with the current version; any structural mutation of
    /// the builder invalidates it.
    #[must_use]
    pub fn entries(&self) -> EntryCursor<K, V> {
        EntryCursor::new(&self.root, &self.version)
    }

    /// Returns a fail-fast cursor over keys in ascending order.
    #[must_use]
    pub fn keys(&self) -> KeyCursor<K, V> {
        KeyCursor {
            cursor: self.entries(),
        }
    }

    /// Returns a fail-fast cursor over values in ascending key order.
    #[must_use]
    pub fn values(&self) -> ValueCursor<K, V> {
        ValueCursor {
            cursor: self.entries(),
        }
    }

    // =========================================================================
    // Freeze
    // =========================================================================

    /// Publishes the current contents as an immutable map.
    ///
    /// The builder remains usable afterwards; later mutations never affect
    /// the returned snapshot.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub fn freeze(&self) -> PersistentSortedMap<K, V, C, E> {
        PersistentSortedMap::from_parts(
            self.root.clone(),
            self.key_comparator.clone(),
            self.value_comparator.clone(),
        )
    }
}

// =============================================================================
// Mutation
// =============================================================================

impl<K: Clone, V: Clone, C: KeyComparator<K>, E: ValueComparator<V>>
    SortedMapBuilder<K, V, C, E>
{
    /// Adds a key-value pair without overwriting.
    ///
    /// Re-adding an entry that already exists with an equal value is an
    /// idempotent no-op that leaves the version untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateKeyError`] when an equivalent key is stored with a
    /// different value; the builder is left unchanged. Use
    /// [`put`](Self::put) to overwrite.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::SortedMapBuilder;
    ///
    /// let mut builder = SortedMapBuilder::new();
    /// builder.add("five", 5)?;
    /// builder.add("five", 5)?; // no-op
    /// assert_eq!(builder.len(), 1);
    /// assert!(builder.add("five", 6).is_err());
    /// # Ok::<(), sylva::error::DuplicateKeyError>(())
    /// ```
    pub fn add(&mut self, key: K, value: V) -> Result<(), DuplicateKeyError> {
        let inserted = tree::add(
            &self.root,
            &self.key_comparator,
            &self.value_comparator,
            key,
            value,
        )?;
        if inserted.changed {
            self.root = inserted.root;
            self.bump();
        }
        Ok(())
    }

    /// Inserts a key-value pair, overwriting the entry of an equivalent
    /// key, and returns the displaced value.
    ///
    /// Every `put` changes the physical tree (an insertion or an entry
    /// replacement), so it always bumps the version.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::SortedMapBuilder;
    ///
    /// let mut builder = SortedMapBuilder::new();
    /// assert_eq!(builder.put(1, "one"), None);
    /// assert_eq!(builder.put(1, "ONE"), Some("one"));
    /// assert_eq!(builder.len(), 1);
    /// ```
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let inserted = tree::upsert(&self.root, &self.key_comparator, key, value);
        if inserted.changed {
            self.root = inserted.root;
            self.bump();
        }
        inserted.previous
    }

    /// Removes the entry with a key equivalent to `key` and returns its
    /// value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::SortedMapBuilder;
    ///
    /// let mut builder = SortedMapBuilder::new();
    /// builder.put(1, "one");
    /// assert_eq!(builder.remove(&1), Some("one"));
    /// assert_eq!(builder.remove(&1), None);
    /// ```
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = tree::remove(&self.root, &self.key_comparator, key);
        if removed.previous.is_some() {
            self.root = removed.root;
            self.bump();
        }
        removed.previous
    }

    /// Removes the entry only when both the key is equivalent and the
    /// stored value equals `value` under the value comparator.
    ///
    /// Returns whether an entry was removed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::SortedMapBuilder;
    ///
    /// let mut builder = SortedMapBuilder::new();
    /// builder.put("five", 5);
    /// assert!(!builder.remove_entry(&"five", &6)); // value mismatch
    /// assert!(builder.remove_entry(&"five", &5));
    /// assert!(builder.is_empty());
    /// ```
    pub fn remove_entry(&mut self, key: &K, value: &V) -> bool {
        match tree::remove_pair(
            &self.root,
            &self.key_comparator,
            &self.value_comparator,
            key,
            value,
        ) {
            Some(root) => {
                self.root = root;
                self.bump();
                true
            }
            None => false,
        }
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V, C, E> Default for SortedMapBuilder<K, V, C, E>
where
    C: KeyComparator<K> + Default,
    E: ValueComparator<V> + Default,
{
    #[inline]
    fn default() -> Self {
        Self::from_parts(None, C::default(), E::default())
    }
}

impl<K: Clone, V: Clone, C: KeyComparator<K>, E: ValueComparator<V>> Extend<(K, V)>
    for SortedMapBuilder<K, V, C, E>
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.put(key, value);
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C, E> fmt::Debug for SortedMapBuilder<K, V, C, E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_map()
            .entries(PersistentSortedMapIterator::new(&self.root))
            .finish()
    }
}

// =============================================================================
// EntryCursor Definition
// =============================================================================

/// A fail-fast in-order cursor over a builder's entries.
///
/// The cursor keeps an explicit stack of pending nodes (each popped node
/// yields its entry and queues the leftmost path of its right subtree) and
/// the builder version captured at creation. Once the builder mutates
/// structurally, every later cursor operation fails with
/// [`CursorInvalidatedError`] — the captured nodes are still physically
/// reachable, but continuing to iterate them would misrepresent the
/// builder's contents.
///
/// # Examples
///
/// ```rust
/// use sylva::persistent::SortedMapBuilder;
///
/// let mut builder = SortedMapBuilder::new();
/// builder.put(2, "two");
/// builder.put(1, "one");
///
/// let mut cursor = builder.entries();
/// assert_eq!(cursor.try_next()?, (1, "one"));
/// assert_eq!(cursor.try_next()?, (2, "two"));
/// assert_eq!(cursor.has_next()?, false);
/// assert!(cursor.try_next().is_err()); // exhausted
/// # Ok::<(), sylva::error::MapError>(())
/// ```
pub struct EntryCursor<K, V> {
    /// Nodes whose entry and right subtree are still pending.
    stack: SmallVec<[ReferenceCounter<Node<K, V>>; 12]>,
    stamp: u64,
    version: ReferenceCounter<Cell<u64>>,
}

impl<K, V> EntryCursor<K, V> {
    fn new(root: &Link<K, V>, version: &ReferenceCounter<Cell<u64>>) -> Self {
        let mut cursor = Self {
            stack: SmallVec::new(),
            stamp: version.get(),
            version: version.clone(),
        };
        cursor.push_left_spine(root);
        cursor
    }

    fn push_left_spine(&mut self, link: &Link<K, V>) {
        let mut current = link.clone();
        while let Some(node) = current {
            current = node.left.clone();
            self.stack.push(node);
        }
    }

    fn check_valid(&self) -> Result<(), CursorInvalidatedError> {
        let version = self.version.get();
        if version == self.stamp {
            Ok(())
        } else {
            Err(CursorInvalidatedError {
                stamp: self.stamp,
                version,
            })
        }
    }

    /// Returns whether another entry is pending.
    ///
    /// # Errors
    ///
    /// Returns [`CursorInvalidatedError`] once the owning builder has
    /// mutated structurally.
    pub fn has_next(&self) -> Result<bool, CursorInvalidatedError> {
        self.check_valid()?;
        Ok(!self.stack.is_empty())
    }
}

impl<K: Clone, V: Clone> EntryCursor<K, V> {
    /// Yields the next entry in ascending key order.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::CursorInvalidated`] once the owning builder has
    /// mutated structurally, and [`MapError::CursorExhausted`] when no
    /// entry remains.
    pub fn try_next(&mut self) -> Result<(K, V), MapError> {
        self.check_valid()?;
        match self.stack.pop() {
            None => Err(CursorExhaustedError.into()),
            Some(node) => {
                self.push_left_spine(&node.right);
                Ok((node.key.clone(), node.value.clone()))
            }
        }
    }
}

impl<K: Clone, V: Clone> Iterator for EntryCursor<K, V> {
    type Item = Result<(K, V), MapError>;

    /// Yields `Ok` entries until clean exhaustion (`None`); invalidation is
    /// reported as one `Err` item, after which the cursor is drained.
    fn next(&mut self) -> Option<Self::Item> {
        if let Err(error) = self.check_valid() {
            if self.stack.is_empty() {
                return None;
            }
            self.stack.clear();
            return Some(Err(error.into()));
        }
        let node = self.stack.pop()?;
        self.push_left_spine(&node.right);
        Some(Ok((node.key.clone(), node.value.clone())))
    }
}

/// A fail-fast cursor over a builder's keys in ascending order.
pub struct KeyCursor<K, V> {
    cursor: EntryCursor<K, V>,
}

impl<K: Clone, V: Clone> Iterator for KeyCursor<K, V> {
    type Item = Result<K, MapError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor
            .next()
            .map(|result| result.map(|(key, _)| key))
    }
}

/// A fail-fast cursor over a builder's values in ascending key order.
pub struct ValueCursor<K, V> {
    cursor: EntryCursor<K, V>,
}

impl<K: Clone, V: Clone> Iterator for ValueCursor<K, V> {
    type Item = Result<V, MapError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor
            .next()
            .map(|result| result.map(|(_, value)| value))
    }
}

// =============================================================================
// Tests
// =============================================================================
