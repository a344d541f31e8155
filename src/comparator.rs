//! Comparator capabilities for key ordering and value equality.
//!
//! The persistent map never hard-codes comparison semantics. Both the total
//! order over keys and the equality test over values are injected as small
//! comparator objects, which keeps comparator substitution (for example,
//! swapping case-sensitivity of string keys) a configuration concern rather
//! than a key-type concern.
//!
//! Two keys that compare as [`Ordering::Equal`] are *equivalent*: the map
//! stores at most one entry for an equivalence class and always reports the
//! originally stored key, not the query key (see
//! [`PersistentSortedMap::get_key`](crate::persistent::PersistentSortedMap::get_key)).
//!
//! # Examples
//!
//! ```rust
//! use sylva::comparator::CaseInsensitiveOrdinal;
//! use sylva::persistent::PersistentSortedMap;
//!
//! let map: PersistentSortedMap<String, i32, CaseInsensitiveOrdinal> =
//!     PersistentSortedMap::with_comparator(CaseInsensitiveOrdinal)
//!         .insert("Alpha".to_string(), 1);
//!
//! assert_eq!(map.get(&"ALPHA".to_string()), Some(&1));
//! assert_eq!(map.get_key(&"alpha".to_string()), Some(&"Alpha".to_string()));
//! ```

use std::cmp::Ordering;

// =============================================================================
// Comparator Traits
// =============================================================================

/// A total order over keys of type `K`.
///
/// Implementations must be consistent: `compare(a, b)` reversed must equal
/// `compare(b, a)`, and the order must be transitive. The comparator is
/// stored inside the map, so it must be `Clone`; comparators are typically
/// zero-sized.
///
/// A comparator that collapses distinct keys into one equivalence class is
/// legal; the map then keeps a single entry per class.
pub trait KeyComparator<K: ?Sized>: Clone {
    /// Compares two keys, returning their relative ordering.
    fn compare(&self, left: &K, right: &K) -> Ordering;

    /// Returns `true` if the two keys belong to the same equivalence class.
    fn equivalent(&self, left: &K, right: &K) -> bool {
        self.compare(left, right) == Ordering::Equal
    }
}

/// An equality test over values of type `V`.
///
/// Used to distinguish an idempotent re-add of an existing entry from a
/// conflicting add with a different value, and to implement exact-entry
/// removal.
pub trait ValueComparator<V: ?Sized>: Clone {
    /// Returns `true` if the two values are equal.
    fn equals(&self, left: &V, right: &V) -> bool;
}

// =============================================================================
// Standard Comparators
// =============================================================================

/// Key comparator that delegates to the key type's [`Ord`] instance.
///
/// This is the default key comparator.
///
/// # Examples
///
/// ```rust
/// use std::cmp::Ordering;
/// use sylva::comparator::{KeyComparator, NaturalOrder};
///
/// assert_eq!(NaturalOrder.compare(&1, &2), Ordering::Less);
/// assert!(NaturalOrder.equivalent(&7, &7));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<K: Ord> KeyComparator<K> for NaturalOrder {
    #[inline]
    fn compare(&self, left: &K, right: &K) -> Ordering {
        left.cmp(right)
    }
}

/// Value comparator that delegates to the value type's [`PartialEq`] instance.
///
/// This is the default value comparator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValueEquality;

impl<V: PartialEq> ValueComparator<V> for ValueEquality {
    #[inline]
    fn equals(&self, left: &V, right: &V) -> bool {
        left == right
    }
}

/// Ordinal, ASCII case-insensitive comparator for string-like keys.
///
/// Keys differing only in ASCII letter case are equivalent, so a map using
/// this comparator keeps one entry per case-insensitive spelling and reports
/// the spelling that was stored first (or last overwritten).
///
/// Comparison is byte-wise after folding ASCII uppercase letters to
/// lowercase; no locale or Unicode case rules are applied.
///
/// # Examples
///
/// ```rust
/// use std::cmp::Ordering;
/// use sylva::comparator::{CaseInsensitiveOrdinal, KeyComparator};
///
/// assert!(CaseInsensitiveOrdinal.equivalent(&"Key", &"KEY"));
/// assert_eq!(CaseInsensitiveOrdinal.compare(&"abc", &"ABD"), Ordering::Less);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaseInsensitiveOrdinal;

impl<K: AsRef<str> + ?Sized> KeyComparator<K> for CaseInsensitiveOrdinal {
    fn compare(&self, left: &K, right: &K) -> Ordering {
        let left = left.as_ref().bytes().map(|byte| byte.to_ascii_lowercase());
        let right = right.as_ref().bytes().map(|byte| byte.to_ascii_lowercase());
        left.cmp(right)
    }
}

// =============================================================================
// Tests
// =============================================================================
