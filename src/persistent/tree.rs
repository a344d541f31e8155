//! Pure tree engine shared by the persistent map and its builder.
//!
//! Nodes are immutable and reference-counted; every operation takes a root
//! link and returns a new root that shares all subtrees off the rebuilt
//! path with the input. The empty tree is the `None` link, so the empty
//! sentinel is a process-wide singleton by construction and is never
//! allocated.
//!
//! Balance is height-based (AVL): after any structural change, every node
//! on the unwound root-to-leaf path is rebuilt with fresh height/count
//! metadata and rotated back into the |balance factor| ≤ 1 regime.

use std::cmp::Ordering;

use super::ReferenceCounter;
use crate::comparator::{KeyComparator, ValueComparator};
use crate::error::DuplicateKeyError;

/// A shared, possibly empty subtree.
pub(crate) type Link<K, V> = Option<ReferenceCounter<Node<K, V>>>;

// =============================================================================
// Node Definition
// =============================================================================

/// One stored entry plus subtree metadata.
///
/// A node exclusively owns its key and value; its children are shared and
/// may be reachable from arbitrarily many roots at once. A node is never
/// mutated after construction.
#[derive(Clone)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    /// 1 + max child height; an empty link has height 0.
    height: u8,
    /// Number of entries in this subtree, this node included.
    count: usize,
    pub(crate) left: Link<K, V>,
    pub(crate) right: Link<K, V>,
}

impl<K, V> Node<K, V> {
    /// Creates a childless node.
    const fn leaf(key: K, value: V) -> Self {
        Self {
            key,
            value,
            height: 1,
            count: 1,
            left: None,
            right: None,
        }
    }

    /// Creates a node over the given children, computing height and count.
    fn branch(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Self {
        let node_height = 1 + height(&left).max(height(&right));
        let node_count = 1 + count(&left) + count(&right);
        Self {
            key,
            value,
            height: node_height,
            count: node_count,
            left,
            right,
        }
    }

    /// Height difference between the left and right subtrees.
    fn balance_factor(&self) -> i16 {
        i16::from(height(&self.left)) - i16::from(height(&self.right))
    }
}

impl<K: Clone, V: Clone> Node<K, V> {
    /// Creates a copy of this node's entry over new children.
    fn with_children(&self, left: Link<K, V>, right: Link<K, V>) -> Self {
        Self::branch(self.key.clone(), self.value.clone(), left, right)
    }
}

/// Height of a possibly empty subtree.
pub(crate) fn height<K, V>(link: &Link<K, V>) -> u8 {
    link.as_ref().map_or(0, |node| node.height)
}

/// Entry count of a possibly empty subtree.
pub(crate) fn count<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |node| node.count)
}

// =============================================================================
// Read Operations
// =============================================================================

/// Finds the node holding a key equivalent to `key`, if any.
///
/// One descent serves both value lookup and stored-key recovery: callers
/// project out `&node.value` or `&node.key` as needed. The stored key is
/// what the map reports, which matters whenever the comparator considers
/// distinct key values equivalent.
pub(crate) fn search<'a, K, V, C>(
    link: &'a Link<K, V>,
    key_comparator: &C,
    key: &K,
) -> Option<&'a Node<K, V>>
where
    C: KeyComparator<K>,
{
    let mut current = link;
    while let Some(node) = current {
        match key_comparator.compare(key, &node.key) {
            Ordering::Less => current = &node.left,
            Ordering::Greater => current = &node.right,
            Ordering::Equal => return Some(node.as_ref()),
        }
    }
    None
}

/// Node holding the minimum key of a subtree.
pub(crate) fn min_node<K, V>(link: &Link<K, V>) -> Option<&Node<K, V>> {
    let mut current = link.as_ref()?;
    while let Some(left) = &current.left {
        current = left;
    }
    Some(current.as_ref())
}

/// Node holding the maximum key of a subtree.
pub(crate) fn max_node<K, V>(link: &Link<K, V>) -> Option<&Node<K, V>> {
    let mut current = link.as_ref()?;
    while let Some(right) = &current.right {
        current = right;
    }
    Some(current.as_ref())
}

// =============================================================================
// Insert Operations
// =============================================================================

/// Outcome of an insertion.
pub(crate) struct Inserted<K, V> {
    /// Root of the updated tree; equals the input root when nothing changed.
    pub(crate) root: Link<K, V>,
    /// Value displaced by an overwrite.
    pub(crate) previous: Option<V>,
    /// Whether the physical tree changed.
    pub(crate) changed: bool,
}

/// Add-only insertion.
///
/// - No equivalent key: insert and rebalance the path.
/// - Equivalent key with an equal value: idempotent no-op; the input root is
///   returned unchanged and nothing is allocated.
/// - Equivalent key with a different value: [`DuplicateKeyError`]; the tree
///   is untouched.
pub(crate) fn add<K, V, C, E>(
    link: &Link<K, V>,
    key_comparator: &C,
    value_comparator: &E,
    key: K,
    value: V,
) -> Result<Inserted<K, V>, DuplicateKeyError>
where
    K: Clone,
    V: Clone,
    C: KeyComparator<K>,
    E: ValueComparator<V>,
{
    match link {
        None => Ok(Inserted {
            root: Some(ReferenceCounter::new(Node::leaf(key, value))),
            previous: None,
            changed: true,
        }),
        Some(node) => match key_comparator.compare(&key, &node.key) {
            Ordering::Less => {
                let inserted = add(&node.left, key_comparator, value_comparator, key, value)?;
                if !inserted.changed {
                    return Ok(Inserted {
                        root: link.clone(),
                        previous: None,
                        changed: false,
                    });
                }
                Ok(Inserted {
                    root: Some(ReferenceCounter::new(rebalance(
                        node.with_children(inserted.root, node.right.clone()),
                    ))),
                    previous: None,
                    changed: true,
                })
            }
            Ordering::Greater => {
                let inserted = add(&node.right, key_comparator, value_comparator, key, value)?;
                if !inserted.changed {
                    return Ok(Inserted {
                        root: link.clone(),
                        previous: None,
                        changed: false,
                    });
                }
                Ok(Inserted {
                    root: Some(ReferenceCounter::new(rebalance(
                        node.with_children(node.left.clone(), inserted.root),
                    ))),
                    previous: None,
                    changed: true,
                })
            }
            Ordering::Equal => {
                if value_comparator.equals(&node.value, &value) {
                    Ok(Inserted {
                        root: link.clone(),
                        previous: None,
                        changed: false,
                    })
                } else {
                    Err(DuplicateKeyError)
                }
            }
        },
    }
}

/// Overwriting insertion.
///
/// An equivalent key has both its stored key and its value replaced by the
/// query pair; the displaced value is reported in `previous`. A fresh key
/// is inserted and the path rebalanced.
pub(crate) fn upsert<K, V, C>(
    link: &Link<K, V>,
    key_comparator: &C,
    key: K,
    value: V,
) -> Inserted<K, V>
where
    K: Clone,
    V: Clone,
    C: KeyComparator<K>,
{
    match link {
        None => Inserted {
            root: Some(ReferenceCounter::new(Node::leaf(key, value))),
            previous: None,
            changed: true,
        },
        Some(node) => match key_comparator.compare(&key, &node.key) {
            Ordering::Less => {
                let inserted = upsert(&node.left, key_comparator, key, value);
                Inserted {
                    root: Some(ReferenceCounter::new(rebalance(
                        node.with_children(inserted.root, node.right.clone()),
                    ))),
                    previous: inserted.previous,
                    changed: true,
                }
            }
            Ordering::Greater => {
                let inserted = upsert(&node.right, key_comparator, key, value);
                Inserted {
                    root: Some(ReferenceCounter::new(rebalance(
                        node.with_children(node.left.clone(), inserted.root),
                    ))),
                    previous: inserted.previous,
                    changed: true,
                }
            }
            Ordering::Equal => Inserted {
                // Entry replacement: same shape, so metadata carries over.
                root: Some(ReferenceCounter::new(Node {
                    key,
                    value,
                    height: node.height,
                    count: node.count,
                    left: node.left.clone(),
                    right: node.right.clone(),
                })),
                previous: Some(node.value.clone()),
                changed: true,
            },
        },
    }
}

// =============================================================================
// Remove Operations
// =============================================================================

/// Outcome of a removal.
pub(crate) struct Removed<K, V> {
    /// Root of the updated tree; equals the input root when nothing changed.
    pub(crate) root: Link<K, V>,
    /// Value of the removed entry; `None` when no equivalent key existed.
    pub(crate) previous: Option<V>,
}

/// Removes the entry with a key equivalent to `key`, if any.
///
/// A node with two children is replaced by its in-order successor (the
/// minimum of the right subtree); every node on the unwound path is
/// rebalanced.
pub(crate) fn remove<K, V, C>(link: &Link<K, V>, key_comparator: &C, key: &K) -> Removed<K, V>
where
    K: Clone,
    V: Clone,
    C: KeyComparator<K>,
{
    match link {
        None => Removed {
            root: None,
            previous: None,
        },
        Some(node) => match key_comparator.compare(key, &node.key) {
            Ordering::Less => {
                let removed = remove(&node.left, key_comparator, key);
                if removed.previous.is_none() {
                    return Removed {
                        root: link.clone(),
                        previous: None,
                    };
                }
                Removed {
                    root: Some(ReferenceCounter::new(rebalance(
                        node.with_children(removed.root, node.right.clone()),
                    ))),
                    previous: removed.previous,
                }
            }
            Ordering::Greater => {
                let removed = remove(&node.right, key_comparator, key);
                if removed.previous.is_none() {
                    return Removed {
                        root: link.clone(),
                        previous: None,
                    };
                }
                Removed {
                    root: Some(ReferenceCounter::new(rebalance(
                        node.with_children(node.left.clone(), removed.root),
                    ))),
                    previous: removed.previous,
                }
            }
            Ordering::Equal => {
                let previous = Some(node.value.clone());
                let root = match (&node.left, &node.right) {
                    (None, None) => None,
                    (Some(left), None) => Some(left.clone()),
                    (None, Some(right)) => Some(right.clone()),
                    (Some(_), Some(right)) => {
                        let (rest, successor_key, successor_value) = detach_min(right);
                        Some(ReferenceCounter::new(rebalance(Node::branch(
                            successor_key,
                            successor_value,
                            node.left.clone(),
                            rest,
                        ))))
                    }
                };
                Removed { root, previous }
            }
        },
    }
}

/// Splits the minimum entry off a non-empty subtree.
///
/// Returns the rebalanced remainder plus the detached key/value pair.
fn detach_min<K, V>(node: &ReferenceCounter<Node<K, V>>) -> (Link<K, V>, K, V)
where
    K: Clone,
    V: Clone,
{
    match &node.left {
        None => (node.right.clone(), node.key.clone(), node.value.clone()),
        Some(left) => {
            let (rest, key, value) = detach_min(left);
            let rebuilt = rebalance(node.with_children(rest, node.right.clone()));
            (Some(ReferenceCounter::new(rebuilt)), key, value)
        }
    }
}

/// Removes the entry only when the key is equivalent *and* the stored value
/// equals `value` under the value comparator.
///
/// Returns the new root on removal, or `None` when the tree is untouched
/// (absent key or mismatched value).
pub(crate) fn remove_pair<K, V, C, E>(
    link: &Link<K, V>,
    key_comparator: &C,
    value_comparator: &E,
    key: &K,
    value: &V,
) -> Option<Link<K, V>>
where
    K: Clone,
    V: Clone,
    C: KeyComparator<K>,
    E: ValueComparator<V>,
{
    let stored = search(link, key_comparator, key)?;
    if !value_comparator.equals(&stored.value, value) {
        return None;
    }
    Some(remove(link, key_comparator, key).root)
}

// =============================================================================
// Rebalancing
// =============================================================================

/// Restores the height-balance invariant at a freshly rebuilt node.
///
/// The node's subtrees are assumed balanced; at most one double rotation is
/// needed. Rotations allocate new nodes for the rotated pair only and share
/// everything else.
fn rebalance<K: Clone, V: Clone>(node: Node<K, V>) -> Node<K, V> {
    let factor = node.balance_factor();

    if factor > 1 {
        // Left-left: a single right rotation.
        if let Some(left) = &node.left
            && left.balance_factor() >= 0
        {
            return rotate_right(node);
        }
        // Left-right: rotate the left child left, then this node right.
        if let Some(left) = &node.left {
            let new_left = rotate_left((**left).clone());
            let new_node =
                node.with_children(Some(ReferenceCounter::new(new_left)), node.right.clone());
            return rotate_right(new_node);
        }
    }

    if factor < -1 {
        // Right-right: a single left rotation.
        if let Some(right) = &node.right
            && right.balance_factor() <= 0
        {
            return rotate_left(node);
        }
        // Right-left: rotate the right child right, then this node left.
        if let Some(right) = &node.right {
            let new_right = rotate_right((**right).clone());
            let new_node =
                node.with_children(node.left.clone(), Some(ReferenceCounter::new(new_right)));
            return rotate_left(new_node);
        }
    }

    node
}

/// Rotates the subtree to the right around `node`.
fn rotate_right<K: Clone, V: Clone>(node: Node<K, V>) -> Node<K, V> {
    match node.left {
        Some(left) => {
            let pivot_right = Node::branch(node.key, node.value, left.right.clone(), node.right);
            Node::branch(
                left.key.clone(),
                left.value.clone(),
                left.left.clone(),
                Some(ReferenceCounter::new(pivot_right)),
            )
        }
        None => node,
    }
}

/// Rotates the subtree to the left around `node`.
fn rotate_left<K: Clone, V: Clone>(node: Node<K, V>) -> Node<K, V> {
    match node.right {
        Some(right) => {
            let pivot_left = Node::branch(node.key, node.value, node.left, right.left.clone());
            Node::branch(
                right.key.clone(),
                right.value.clone(),
                Some(ReferenceCounter::new(pivot_left)),
                right.right.clone(),
            )
        }
        None => node,
    }
}

// =============================================================================
// Test-Only Invariant Checker
// =============================================================================

/// Verifies balance, metadata, and strict key ordering over a whole tree.
///
/// Returns the entry count so callers can cross-check it against the O(1)
/// root count.
#[cfg(test)]
pub(crate) fn check_invariants<K, V, C>(link: &Link<K, V>, key_comparator: &C) -> usize
where
    C: KeyComparator<K>,
{
    fn walk<K, V>(link: &Link<K, V>) -> (u8, usize) {
        match link {
            None => (0, 0),
            Some(node) => {
                let (left_height, left_count) = walk(&node.left);
                let (right_height, right_count) = walk(&node.right);
                let factor = i16::from(left_height) - i16::from(right_height);
                assert!(factor.abs() <= 1, "balance factor {factor} out of range");
                let expected_height = 1 + left_height.max(right_height);
                let expected_count = 1 + left_count + right_count;
                assert_eq!(node.height, expected_height, "stored height is stale");
                assert_eq!(node.count, expected_count, "stored count is stale");
                (expected_height, expected_count)
            }
        }
    }

    fn collect<'a, K, V>(link: &'a Link<K, V>, keys: &mut Vec<&'a K>) {
        if let Some(node) = link {
            collect(&node.left, keys);
            keys.push(&node.key);
            collect(&node.right, keys);
        }
    }

    let (_, total) = walk(link);
    let mut keys = Vec::new();
    collect(link, &mut keys);
    for pair in keys.windows(2) {
        assert_eq!(
            key_comparator.compare(pair[0], pair[1]),
            Ordering::Less,
            "in-order keys must be strictly increasing"
        );
    }
    assert_eq!(keys.len(), total);
    total
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{NaturalOrder, ValueEquality};
    use proptest::prelude::*;
    use rstest::rstest;

    /// Key comparator that places every key in one equivalence class.
    #[derive(Clone, Copy)]
    struct EverythingEqual;

    impl<K> KeyComparator<K> for EverythingEqual {
        fn compare(&self, _: &K, _: &K) -> Ordering {
            Ordering::Equal
        }
    }

    fn build(entries: &[(i32, i32)]) -> Link<i32, i32> {
        let mut root = None;
        for &(key, value) in entries {
            root = upsert(&root, &NaturalOrder, key, value).root;
        }
        root
    }

    #[rstest]
    fn test_empty_link_has_zero_metadata() {
        let link: Link<i32, i32> = None;
        assert_eq!(height(&link), 0);
        assert_eq!(count(&link), 0);
    }

    #[rstest]
    fn test_leaf_metadata() {
        let node = Node::leaf(1, 10);
        assert_eq!(node.height, 1);
        assert_eq!(node.count, 1);
    }

    #[rstest]
    fn test_ascending_inserts_stay_balanced() {
        let entries: Vec<(i32, i32)> = (0..128).map(|key| (key, key * 2)).collect();
        let root = build(&entries);
        assert_eq!(check_invariants(&root, &NaturalOrder), 128);
        // A linked-list shape would have height 128.
        assert!(height(&root) <= 9);
    }

    #[rstest]
    fn test_descending_inserts_stay_balanced() {
        let entries: Vec<(i32, i32)> = (0..128).rev().map(|key| (key, key)).collect();
        let root = build(&entries);
        assert_eq!(check_invariants(&root, &NaturalOrder), 128);
        assert!(height(&root) <= 9);
    }

    #[rstest]
    fn test_zigzag_inserts_exercise_double_rotations() {
        // Left-right and right-left shapes.
        let root = build(&[(10, 0), (4, 0), (7, 0)]);
        assert_eq!(check_invariants(&root, &NaturalOrder), 3);
        let root = build(&[(4, 0), (10, 0), (7, 0)]);
        assert_eq!(check_invariants(&root, &NaturalOrder), 3);
    }

    #[rstest]
    fn test_search_finds_stored_node() {
        let root = build(&[(2, 20), (1, 10), (3, 30)]);
        let node = search(&root, &NaturalOrder, &3);
        assert_eq!(node.map(|node| node.value), Some(30));
        assert!(search(&root, &NaturalOrder, &4).is_none());
    }

    #[rstest]
    fn test_min_and_max_nodes() {
        let root = build(&[(5, 50), (1, 10), (9, 90), (3, 30)]);
        assert_eq!(min_node(&root).map(|node| node.key), Some(1));
        assert_eq!(max_node(&root).map(|node| node.key), Some(9));
        let empty: Link<i32, i32> = None;
        assert!(min_node(&empty).is_none());
        assert!(max_node(&empty).is_none());
    }

    #[rstest]
    fn test_add_exact_duplicate_reuses_root() {
        let root = build(&[(1, 10), (2, 20)]);
        let inserted = add(&root, &NaturalOrder, &ValueEquality, 1, 10)
            .unwrap_or_else(|error| panic!("exact duplicate must not fail: {error}"));
        assert!(!inserted.changed);
        match (&root, &inserted.root) {
            (Some(before), Some(after)) => {
                assert!(ReferenceCounter::ptr_eq(before, after));
            }
            _ => panic!("both roots must be non-empty"),
        }
    }

    #[rstest]
    fn test_add_conflicting_value_fails() {
        let root = build(&[(1, 10)]);
        let result = add(&root, &NaturalOrder, &ValueEquality, 1, 11);
        assert!(result.is_err());
        // The input tree is untouched.
        assert_eq!(check_invariants(&root, &NaturalOrder), 1);
    }

    #[rstest]
    fn test_upsert_reports_previous_value() {
        let root = build(&[(1, 10), (2, 20)]);
        let inserted = upsert(&root, &NaturalOrder, 2, 21);
        assert_eq!(inserted.previous, Some(20));
        assert!(inserted.changed);
        let node = search(&inserted.root, &NaturalOrder, &2);
        assert_eq!(node.map(|node| node.value), Some(21));
    }

    #[rstest]
    fn test_remove_missing_key_is_noop() {
        let root = build(&[(1, 10), (2, 20)]);
        let removed = remove(&root, &NaturalOrder, &9);
        assert!(removed.previous.is_none());
        match (&root, &removed.root) {
            (Some(before), Some(after)) => {
                assert!(ReferenceCounter::ptr_eq(before, after));
            }
            _ => panic!("both roots must be non-empty"),
        }
    }

    #[rstest]
    fn test_remove_leaf_and_single_child() {
        let root = build(&[(2, 20), (1, 10), (3, 30), (4, 40)]);
        let removed = remove(&root, &NaturalOrder, &1);
        assert_eq!(removed.previous, Some(10));
        assert_eq!(check_invariants(&removed.root, &NaturalOrder), 3);

        let removed = remove(&removed.root, &NaturalOrder, &3);
        assert_eq!(removed.previous, Some(30));
        assert_eq!(check_invariants(&removed.root, &NaturalOrder), 2);
    }

    #[rstest]
    fn test_remove_node_with_two_children_uses_successor() {
        let root = build(&[(5, 50), (2, 20), (8, 80), (6, 60), (9, 90)]);
        let removed = remove(&root, &NaturalOrder, &8);
        assert_eq!(removed.previous, Some(80));
        assert_eq!(check_invariants(&removed.root, &NaturalOrder), 4);
        assert!(search(&removed.root, &NaturalOrder, &8).is_none());
        assert_eq!(
            search(&removed.root, &NaturalOrder, &9).map(|node| node.value),
            Some(90)
        );
    }

    #[rstest]
    fn test_remove_root_repeatedly_drains_tree() {
        let mut root = build(&[(4, 0), (2, 0), (6, 0), (1, 0), (3, 0), (5, 0), (7, 0)]);
        for expected in (0..7).rev() {
            let key = match &root {
                Some(node) => node.key,
                None => panic!("tree drained early"),
            };
            root = remove(&root, &NaturalOrder, &key).root;
            assert_eq!(check_invariants(&root, &NaturalOrder), expected);
        }
        assert!(root.is_none());
    }

    #[rstest]
    fn test_remove_pair_requires_matching_value() {
        let root = build(&[(1, 10), (2, 20)]);
        assert!(remove_pair(&root, &NaturalOrder, &ValueEquality, &1, &11).is_none());
        assert!(remove_pair(&root, &NaturalOrder, &ValueEquality, &9, &10).is_none());
        let new_root = remove_pair(&root, &NaturalOrder, &ValueEquality, &1, &10);
        match new_root {
            Some(root) => assert_eq!(check_invariants(&root, &NaturalOrder), 1),
            None => panic!("matching pair must be removed"),
        }
    }

    #[rstest]
    fn test_degenerate_comparator_keeps_single_node() {
        let mut root: Link<i32, i32> = None;
        root = upsert(&root, &EverythingEqual, 1, 10).root;
        // Every further add lands in the same equivalence class.
        let inserted = add(&root, &EverythingEqual, &ValueEquality, 2, 10)
            .unwrap_or_else(|error| panic!("equal value must not conflict: {error}"));
        assert!(!inserted.changed);
        assert!(add(&root, &EverythingEqual, &ValueEquality, 3, 99).is_err());
        assert_eq!(count(&root), 1);
        check_invariants(&root, &EverythingEqual);
    }

    #[rstest]
    fn test_degenerate_comparator_upsert_replaces_entry() {
        let mut root: Link<i32, i32> = None;
        for key in 0..16 {
            root = upsert(&root, &EverythingEqual, key, key).root;
        }
        assert_eq!(count(&root), 1);
        assert_eq!(
            search(&root, &EverythingEqual, &0).map(|node| (node.key, node.value)),
            Some((15, 15))
        );
    }

    proptest! {
        /// Random interleavings of upsert and remove preserve all invariants.
        #[test]
        fn prop_random_operations_preserve_invariants(
            operations in prop::collection::vec((any::<bool>(), 0i32..64, any::<i32>()), 0..200)
        ) {
            let mut root: Link<i32, i32> = None;
            for (is_insert, key, value) in operations {
                if is_insert {
                    root = upsert(&root, &NaturalOrder, key, value).root;
                } else {
                    root = remove(&root, &NaturalOrder, &key).root;
                }
                check_invariants(&root, &NaturalOrder);
            }
        }

        /// The tree height stays logarithmic in the entry count.
        #[test]
        fn prop_height_is_logarithmic(
            keys in prop::collection::vec(any::<i32>(), 1..300)
        ) {
            let mut root: Link<i32, i32> = None;
            for key in keys {
                root = upsert(&root, &NaturalOrder, key, key).root;
            }
            let entries = count(&root) as f64;
            // AVL height bound: 1.4405 * log2(n + 2).
            let bound = (1.4405 * (entries + 2.0).log2()).ceil() as u8;
            prop_assert!(height(&root) <= bound);
        }
    }
}
