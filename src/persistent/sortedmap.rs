//! Persistent (immutable) sorted map.
//!
//! [`PersistentSortedMap`] is a published snapshot: a root node reference
//! plus the comparators it was built with. It is fully immutable and safe to
//! share; every updating operation returns a new map that shares all
//! unchanged subtrees with the original.
//!
//! # Examples
//!
//! ```rust
//! use sylva::persistent::PersistentSortedMap;
//!
//! let map = PersistentSortedMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! // Entries are always in comparator order
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//! ```

use std::fmt;

use smallvec::SmallVec;

use super::builder::SortedMapBuilder;
use super::tree::{self, Link, Node};
use crate::comparator::{KeyComparator, NaturalOrder, ValueComparator, ValueEquality};
use crate::error::{DuplicateKeyError, KeyNotFoundError};

// =============================================================================
// PersistentSortedMap Definition
// =============================================================================

/// A persistent (immutable) ordered map with pluggable comparators.
///
/// The map holds a balanced-tree root, a key comparator defining the total
/// order (and therefore key equivalence), and a value comparator used for
/// duplicate detection and exact-entry removal. Updates never mutate
/// existing nodes: they build a fresh root-to-leaf path and share the rest,
/// so an update costs O(log n) and cloning a map costs O(1).
///
/// Two keys comparing as equal are *equivalent*; the map stores one entry
/// per equivalence class and always reports the stored key, not the query
/// key (see [`get_key`](Self::get_key)).
///
/// # Time Complexity
///
/// | Operation      | Complexity   |
/// |----------------|--------------|
/// | `get`          | O(log N)     |
/// | `insert`       | O(log N)     |
/// | `remove`       | O(log N)     |
/// | `min`/`max`    | O(log N)     |
/// | `len`          | O(1)         |
/// | `freeze` (via builder) | O(1) |
///
/// # Examples
///
/// ```rust
/// use sylva::persistent::PersistentSortedMap;
///
/// let map = PersistentSortedMap::singleton(42, "answer");
/// assert_eq!(map.get(&42), Some(&"answer"));
///
/// let updated = map.insert(42, "ANSWER");
/// assert_eq!(map.get(&42), Some(&"answer"));     // original unchanged
/// assert_eq!(updated.get(&42), Some(&"ANSWER")); // new version
/// ```
pub struct PersistentSortedMap<K, V, C = NaturalOrder, E = ValueEquality> {
    root: Link<K, V>,
    key_comparator: C,
    value_comparator: E,
}

impl<K, V, C: Clone, E: Clone> Clone for PersistentSortedMap<K, V, C, E> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            key_comparator: self.key_comparator.clone(),
            value_comparator: self.value_comparator.clone(),
        }
    }
}

// Thread-safety: a snapshot holds only shared immutable state, so with
// atomically counted links it crosses threads freely.
#[cfg(feature = "arc")]
mod arc_send_sync_verification {
    use super::PersistentSortedMap;

    static_assertions::assert_impl_all!(PersistentSortedMap<i32, String>: Send, Sync);
}

// =============================================================================
// Construction
// =============================================================================

impl<K, V> PersistentSortedMap<K, V> {
    /// Creates a new empty map ordered by the key type's `Ord` instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, String> = PersistentSortedMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            key_comparator: NaturalOrder,
            value_comparator: ValueEquality,
        }
    }
}

impl<K: Clone + Ord, V: Clone + PartialEq> PersistentSortedMap<K, V> {
    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::PersistentSortedMap;
    ///
    /// let map = PersistentSortedMap::singleton(42, "answer");
    /// assert_eq!(map.len(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }
}

impl<K, V, C: KeyComparator<K>> PersistentSortedMap<K, V, C, ValueEquality> {
    /// Creates a new empty map ordered by the given key comparator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::comparator::CaseInsensitiveOrdinal;
    /// use sylva::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<String, i32, CaseInsensitiveOrdinal> =
    ///     PersistentSortedMap::with_comparator(CaseInsensitiveOrdinal);
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn with_comparator(key_comparator: C) -> Self {
        Self {
            root: None,
            key_comparator,
            value_comparator: ValueEquality,
        }
    }
}

impl<K, V, C: KeyComparator<K>, E: ValueComparator<V>> PersistentSortedMap<K, V, C, E> {
    /// Creates a new empty map with explicit key and value comparators.
    #[inline]
    #[must_use]
    pub const fn with_comparators(key_comparator: C, value_comparator: E) -> Self {
        Self {
            root: None,
            key_comparator,
            value_comparator,
        }
    }

    pub(crate) const fn from_parts(root: Link<K, V>, key_comparator: C, value_comparator: E) -> Self {
        Self {
            root,
            key_comparator,
            value_comparator,
        }
    }

    /// The key comparator this map orders by.
    #[inline]
    pub const fn key_comparator(&self) -> &C {
        &self.key_comparator
    }

    /// The value comparator this map detects duplicates with.
    #[inline]
    pub const fn value_comparator(&self) -> &E {
        &self.value_comparator
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1) — entry counts are maintained on every node.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        tree::count(&self.root)
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns a reference to the value stored under a key equivalent to
    /// `key`.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::PersistentSortedMap;
    ///
    /// let map = PersistentSortedMap::singleton("hello", 42);
    /// assert_eq!(map.get(&"hello"), Some(&42));
    /// assert_eq!(map.get(&"world"), None);
    /// ```
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        tree::search(&self.root, &self.key_comparator, key).map(|node| &node.value)
    }

    /// Returns the *stored* key equivalent to `key`.
    ///
    /// When the comparator collapses distinct key values (for example, a
    /// case-insensitive string comparator), the map normalizes to the key
    /// that was stored, and this is the only way to recover it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::comparator::CaseInsensitiveOrdinal;
    /// use sylva::persistent::PersistentSortedMap;
    ///
    /// let map = PersistentSortedMap::with_comparator(CaseInsensitiveOrdinal)
    ///     .insert("a".to_string(), 1);
    ///
    /// assert_eq!(map.get_key(&"A".to_string()), Some(&"a".to_string()));
    /// assert_eq!(map.get_key(&"b".to_string()), None);
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

    /// Returns `true` if the map contains a key equivalent to `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns `true` if the map contains an entry whose key is equivalent
    /// to `key` *and* whose value equals `value` under the value comparator.
    #[must_use]
    pub fn contains_entry(&self, key: &K, value: &V) -> bool {
        tree::search(&self.root, &self.key_comparator, key)
            .is_some_and(|node| self.value_comparator.equals(&node.value, value))
    }

    /// Returns the entry with the minimum key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::PersistentSortedMap;
    ///
    /// let map = PersistentSortedMap::new().insert(3, "three").insert(1, "one");
    /// assert_eq!(map.min(), Some((&1, &"one")));
    /// ```
    #[must_use]
    pub fn min(&self) -> Option<(&K, &V)> {
        tree::min_node(&self.root).map(|node| (&node.key, &node.value))
    }

    /// Returns the entry with the maximum key.
    #[must_use]
    pub fn max(&self) -> Option<(&K, &V)> {
        tree::max_node(&self.root).map(|node| (&node.key, &node.value))
    }

    /// Returns an iterator over entries in ascending key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::PersistentSortedMap;
    ///
    /// let map = PersistentSortedMap::new().insert(2, "two").insert(1, "one");
    /// for (key, value) in map.iter() {
    ///     println!("{key}: {value}");
    /// }
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentSortedMapIterator<'_, K, V> {
        PersistentSortedMapIterator::new(&self.root)
    }

    /// Returns an iterator over keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values in ascending key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Returns an iterator over key-value pairs in ascending key order.
    ///
    /// This is an alias for [`iter`](Self::iter).
    #[inline]
    #[must_use]
    pub fn entries(&self) -> PersistentSortedMapIterator<'_, K, V> {
        self.iter()
    }

    /// Derives a mutable builder seeded with this map's entries.
    ///
    /// The builder shares this map's nodes until it mutates them away; the
    /// map itself is never affected by the builder.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::PersistentSortedMap;
    ///
    /// let map = PersistentSortedMap::singleton(1, "one");
    /// let mut builder = map.builder();
    /// builder.put(2, "two");
    /// assert_eq!(builder.freeze().len(), 2);
    /// assert_eq!(map.len(), 1);
    /// ```
    #[must_use]
    pub fn builder(&self) -> SortedMapBuilder<K, V, C, E> {
        SortedMapBuilder::from_parts(
            self.root.clone(),
            self.key_comparator.clone(),
            self.value_comparator.clone(),
        )
    }
}

// =============================================================================
// Persistent Updates
// =============================================================================

impl<K: Clone, V: Clone, C: KeyComparator<K>, E: ValueComparator<V>>
    PersistentSortedMap<K, V, C, E>
{
    /// Inserts a key-value pair, overwriting the entry of an equivalent key.
    ///
    /// Returns a new map; the original is unchanged. On overwrite both the
    /// stored key and the stored value are replaced by the arguments.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::PersistentSortedMap;
    ///
    /// let map1 = PersistentSortedMap::new().insert(1, "one");
    /// let map2 = map1.insert(1, "ONE");
    ///
    /// assert_eq!(map1.get(&1), Some(&"one"));
    /// assert_eq!(map2.get(&1), Some(&"ONE"));
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let inserted = tree::upsert(&self.root, &self.key_comparator, key, value);
        Self {
            root: inserted.root,
            key_comparator: self.key_comparator.clone(),
            value_comparator: self.value_comparator.clone(),
        }
    }

    /// Adds a key-value pair without overwriting.
    ///
    /// Adding an entry that already exists with an equal value is an
    /// idempotent no-op returning an unchanged map.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateKeyError`] when an equivalent key is stored with a
    /// different value; the original map is unaffected.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sylva::persistent::PersistentSortedMap;
    ///
    /// let map = PersistentSortedMap::new().add("five", 5)?;
    /// let same = map.add("five", 5)?; // exact duplicate: no-op
    /// assert_eq!(same.len(), 1);
    /// assert!(map.add("five", 6).is_err());
    /// # Ok::<(), sylva::error::DuplicateKeyError>(())
    /// ```
    pub fn add(&self, key: K, value: V) -> Result<Self, DuplicateKeyError> {
        let inserted = tree::add(
            &self.root,
            &self.key_comparator,
            &self.value_comparator,
            key,
            value,
        )?;
        Ok(Self {
            root: inserted.root,
            key_comparator: self.key_comparator.clone(),
            value_comparator: self.value_comparator.clone(),
        })
    }

    /// Removes the entry with a key equivalent to `key`.
    ///
    /// Returns a new map; when the key is absent the result is an unchanged
    /// clone sharing the whole tree.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn remove(&self, key: &K) -> Self {
        let removed = tree::remove(&self.root, &self.key_comparator, key);
        Self {
            root: removed.root,
            key_comparator: self.key_comparator.clone(),
            value_comparator: self.value_comparator.clone(),
        }
    }

    /// Removes the entry only when both the key is equivalent and the stored
    /// value equals `value` under the value comparator.
    #[must_use]
    pub fn remove_entry(&self, key: &K, value: &V) -> Self {
        let root = tree::remove_pair(
            &self.root,
            &self.key_comparator,
            &self.value_comparator,
            key,
            value,
        )
        .unwrap_or_else(|| self.root.clone());
        Self {
            root,
            key_comparator: self.key_comparator.clone(),
            value_comparator: self.value_comparator.clone(),
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An in-order iterator over entries of a [`PersistentSortedMap`].
///
/// Traversal is driven by an explicit stack of pending nodes, so creating
/// the iterator is O(log n) and the whole walk is O(n).
pub struct PersistentSortedMapIterator<'a, K, V> {
    stack: SmallVec<[&'a Node<K, V>; 12]>,
    remaining: usize,
}

impl<'a, K, V> PersistentSortedMapIterator<'a, K, V> {
    pub(crate) fn new(root: &'a Link<K, V>) -> Self {
        let mut iterator = Self {
            stack: SmallVec::new(),
            remaining: tree::count(root),
        };
        iterator.push_left_spine(root);
        iterator
    }

    fn push_left_spine(&mut self, mut link: &'a Link<K, V>) {
        while let Some(node) = link {
            self.stack.push(node.as_ref());
            link = &node.left;
        }
    }
}

impl<'a, K, V> Iterator for PersistentSortedMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_spine(&node.right);
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentSortedMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

/// An owning iterator over entries of a [`PersistentSortedMap`].
pub struct PersistentSortedMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for PersistentSortedMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentSortedMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V, C, E> Default for PersistentSortedMap<K, V, C, E>
where
    C: KeyComparator<K> + Default,
    E: ValueComparator<V> + Default,
{
    #[inline]
    fn default() -> Self {
        Self::with_comparators(C::default(), E::default())
    }
}

impl<K: Clone + Ord, V: Clone + PartialEq> FromIterator<(K, V)> for PersistentSortedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut builder = Self::new().builder();
        for (key, value) in iter {
            builder.put(key, value);
        }
        builder.freeze()
    }
}

impl<K: Clone, V: Clone, C: KeyComparator<K>, E: ValueComparator<V>> IntoIterator
    for PersistentSortedMap<K, V, C, E>
{
    type Item = (K, V);
    type IntoIter = PersistentSortedMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PersistentSortedMapIntoIterator {
            entries: entries.into_iter(),
        }
    }
}

impl<'a, K, V, C: KeyComparator<K>, E: ValueComparator<V>> IntoIterator
    for &'a PersistentSortedMap<K, V, C, E>
{
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentSortedMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, C: KeyComparator<K>, E: ValueComparator<V>> PartialEq
    for PersistentSortedMap<K, V, C, E>
{
    /// Maps are equal when they hold equivalent keys with equal values in
    /// the same order, judged by `self`'s comparators.
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().zip(other.iter()).all(|((k1, v1), (k2, v2))| {
            self.key_comparator.equivalent(k1, k2) && self.value_comparator.equals(v1, v2)
        })
    }
}

impl<K, V, C: KeyComparator<K>, E: ValueComparator<V>> Eq for PersistentSortedMap<K, V, C, E> {}

impl<K: fmt::Debug, V: fmt::Debug, C: KeyComparator<K>, E: ValueComparator<V>> fmt::Debug
    for PersistentSortedMap<K, V, C, E>
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display, C: KeyComparator<K>, E: ValueComparator<V>> fmt::Display
    for PersistentSortedMap<K, V, C, E>
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for (key, value) in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V, C, E> serde::Serialize for PersistentSortedMap<K, V, C, E>
where
    K: serde::Serialize,
    V: serde::Serialize,
    C: KeyComparator<K>,
    E: ValueComparator<V>,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentSortedMapVisitor<K, V> {
    key_marker: std::marker::PhantomData<K>,
    value_marker: std::marker::PhantomData<V>,
}

#[cfg(feature = "serde")]
impl<K, V> PersistentSortedMapVisitor<K, V> {
    const fn new() -> Self {
        Self {
            key_marker: std::marker::PhantomData,
            value_marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for PersistentSortedMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone + PartialEq,
{
    type Value = PersistentSortedMap<K, V>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut builder = PersistentSortedMap::new().builder();
        while let Some((key, value)) = access.next_entry()? {
            builder.put(key, value);
        }
        Ok(builder.freeze())
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for PersistentSortedMap<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone + PartialEq,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentSortedMapVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::CaseInsensitiveOrdinal;
    use rstest::rstest;

    #[rstest]
    fn test_new_creates_empty() {
        let map: PersistentSortedMap<i32, String> = PersistentSortedMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }

    #[rstest]
    fn test_singleton() {
        let map = PersistentSortedMap::singleton(42, "answer".to_string());
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&42), Some(&"answer".to_string()));
    }

    #[rstest]
    fn test_insert_and_get() {
        let map = PersistentSortedMap::new()
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&1), Some(&"one".to_string()));
        assert_eq!(map.get(&2), Some(&"two".to_string()));
        assert_eq!(map.get(&3), None);
    }

    #[rstest]
    fn test_insert_overwrite_preserves_original() {
        let map1 = PersistentSortedMap::new().insert(1, "one");
        let map2 = map1.insert(1, "ONE");

        assert_eq!(map1.get(&1), Some(&"one"));
        assert_eq!(map2.get(&1), Some(&"ONE"));
        assert_eq!(map1.len(), 1);
        assert_eq!(map2.len(), 1);
    }

    #[rstest]
    fn test_add_exact_duplicate_is_noop() {
        let map = PersistentSortedMap::singleton("five", 5);
        let same = match map.add("five", 5) {
            Ok(map) => map,
            Err(error) => panic!("exact duplicate must not fail: {error}"),
        };
        assert_eq!(same.len(), 1);
        assert_eq!(same.get(&"five"), Some(&5));
    }

    #[rstest]
    fn test_add_conflicting_value_fails_and_preserves_map() {
        let map = PersistentSortedMap::singleton("five", 5);
        assert!(map.add("five", 6).is_err());
        assert_eq!(map.get(&"five"), Some(&5));
    }

    #[rstest]
    fn test_remove() {
        let map = PersistentSortedMap::new().insert(1, "one").insert(2, "two");
        let removed = map.remove(&1);

        assert_eq!(map.len(), 2);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed.get(&1), None);
        assert_eq!(removed.get(&2), Some(&"two"));
    }

    #[rstest]
    fn test_remove_entry_requires_matching_value() {
        let map = PersistentSortedMap::new().insert("five", 5).insert("six", 6);

        let untouched = map.remove_entry(&"five", &6);
        assert_eq!(untouched.len(), 2);

        let removed = map.remove_entry(&"five", &5);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed.get(&"six"), Some(&6));
    }

    #[rstest]
    fn test_fetch_reports_absence_as_error() {
        let map = PersistentSortedMap::singleton(1, 10);
        assert_eq!(map.fetch(&1), Ok(&10));
        assert!(map.fetch(&2).is_err());
    }

    #[rstest]
    fn test_contains_entry() {
        let map = PersistentSortedMap::singleton("five", 5);
        assert!(map.contains_entry(&"five", &5));
        assert!(!map.contains_entry(&"five", &6));
        assert!(!map.contains_entry(&"six", &5));
    }

    #[rstest]
    fn test_min_max() {
        let map = PersistentSortedMap::new()
            .insert(3, "three")
            .insert(1, "one")
            .insert(5, "five");

        assert_eq!(map.min(), Some((&1, &"one")));
        assert_eq!(map.max(), Some((&5, &"five")));
    }

    #[rstest]
    fn test_iter_is_sorted() {
        let map = PersistentSortedMap::new()
            .insert(3, "three")
            .insert(1, "one")
            .insert(2, "two");

        let keys: Vec<&i32> = map.keys().collect();
        assert_eq!(keys, vec![&1, &2, &3]);
        assert_eq!(map.iter().len(), 3);
    }

    #[rstest]
    fn test_case_insensitive_key_normalization() {
        let map = PersistentSortedMap::with_comparator(CaseInsensitiveOrdinal)
            .insert("a".to_string(), 1);

        assert_eq!(map.get_key(&"a".to_string()), Some(&"a".to_string()));
        assert_eq!(map.get_key(&"A".to_string()), Some(&"a".to_string()));
        assert_eq!(map.get_key(&"b".to_string()), None);
        assert_eq!(map.get(&"A".to_string()), Some(&1));
    }

    #[rstest]
    fn test_display_sorted() {
        let map = PersistentSortedMap::new()
            .insert(2, "two")
            .insert(1, "one");
        assert_eq!(format!("{map}"), "{1: one, 2: two}");

        let empty: PersistentSortedMap<i32, String> = PersistentSortedMap::new();
        assert_eq!(format!("{empty}"), "{}");
    }

    #[rstest]
    fn test_debug_formats_as_map() {
        let map = PersistentSortedMap::new().insert(1, "one");
        assert_eq!(format!("{map:?}"), "{1: \"one\"}");
    }

    #[rstest]
    fn test_equality_is_comparator_relative() {
        let left = PersistentSortedMap::with_comparator(CaseInsensitiveOrdinal)
            .insert("KEY".to_string(), 1);
        let right = PersistentSortedMap::with_comparator(CaseInsensitiveOrdinal)
            .insert("key".to_string(), 1);
        assert_eq!(left, right);

        let different = PersistentSortedMap::with_comparator(CaseInsensitiveOrdinal)
            .insert("key".to_string(), 2);
        assert_ne!(left, different);
    }

    #[rstest]
    fn test_from_iterator_collects_sorted() {
        let map: PersistentSortedMap<i32, i32> = vec![(3, 30), (1, 10), (2, 20)]
            .into_iter()
            .collect();
        let keys: Vec<&i32> = map.keys().collect();
        assert_eq!(keys, vec![&1, &2, &3]);
    }

    #[rstest]
    fn test_into_iterator_yields_owned_entries() {
        let map = PersistentSortedMap::new().insert(2, "two").insert(1, "one");
        let entries: Vec<(i32, &str)> = map.into_iter().collect();
        assert_eq!(entries, vec![(1, "one"), (2, "two")]);
    }
}
