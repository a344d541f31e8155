//! Error types for the persistent sorted map.
//!
//! All failures are caller-contract violations or expected "not found"
//! conditions; nothing here is transient, so there are no retries and no
//! internal recovery. Each condition has its own error struct, and
//! [`MapError`] aggregates them for APIs that can fail in more than one way.

/// Represents a rejected add: an equivalent key is already stored with a
/// different value.
///
/// Adding an entry whose key *and* value match the stored entry is an
/// idempotent no-op, not an error. To replace the value of an existing key,
/// use `put` instead of `add`.
///
/// # Examples
///
/// ```rust
/// use sylva::error::DuplicateKeyError;
///
/// let error = DuplicateKeyError;
/// assert_eq!(
///     format!("{}", error),
///     "an equivalent key is already stored with a different value"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateKeyError;

impl std::fmt::Display for DuplicateKeyError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "an equivalent key is already stored with a different value"
        )
    }
}

impl std::error::Error for DuplicateKeyError {}

/// Represents a strict lookup that found no equivalent key.
///
/// Returned by `fetch`; the optional-style `get` reports absence as `None`
/// instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyNotFoundError;

impl std::fmt::Display for KeyNotFoundError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "no equivalent key is stored in the map")
    }
}

impl std::error::Error for KeyNotFoundError {}

/// Represents a read past the end of a cursor.
///
/// A cursor that has yielded its last entry reports `has_next() == false`;
/// calling `try_next` at that point fails with this error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorExhaustedError;

impl std::fmt::Display for CursorExhaustedError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "cursor has no remaining entries")
    }
}

impl std::error::Error for CursorExhaustedError {}

/// Represents a cursor used after its owning builder mutated.
///
/// Cursors are stamped with the builder's version at creation time. Any
/// structural mutation of the builder bumps the version, and every later
/// cursor operation fails with this error even though the nodes captured by
/// the cursor are still physically reachable.
///
/// # Examples
///
/// ```rust
/// use sylva::error::CursorInvalidatedError;
///
/// let error = CursorInvalidatedError { stamp: 3, version: 5 };
/// assert_eq!(
///     format!("{}", error),
///     "builder mutated during iteration: cursor was created at version 3 \
///      but the builder is now at version 5"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorInvalidatedError {
    /// The builder version captured when the cursor was created.
    pub stamp: u64,
    /// The builder version observed by the failing operation.
    pub version: u64,
}

impl std::fmt::Display for CursorInvalidatedError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "builder mutated during iteration: cursor was created at version {} \
             but the builder is now at version {}",
            self.stamp, self.version
        )
    }
}

impl std::error::Error for CursorInvalidatedError {}

/// Represents errors that can occur when operating on a sorted map or its
/// builder.
///
/// # Examples
///
/// ```rust
/// use sylva::error::{DuplicateKeyError, MapError};
///
/// let error = MapError::from(DuplicateKeyError);
/// assert!(matches!(error, MapError::DuplicateKey(_)));
/// println!("{}", error);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// An `add` collided with an equivalent key holding a different value.
    DuplicateKey(DuplicateKeyError),
    /// A strict lookup found no equivalent key.
    KeyNotFound(KeyNotFoundError),
    /// A cursor was read past its last entry.
    CursorExhausted(CursorExhaustedError),
    /// A cursor outlived a structural mutation of its builder.
    CursorInvalidated(CursorInvalidatedError),
}

impl std::fmt::Display for MapError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey(error) => write!(formatter, "{error}"),
            Self::KeyNotFound(error) => write!(formatter, "{error}"),
            Self::CursorExhausted(error) => write!(formatter, "{error}"),
            Self::CursorInvalidated(error) => write!(formatter, "{error}"),
        }
    }
}

impl std::error::Error for MapError {}

impl From<DuplicateKeyError> for MapError {
    fn from(error: DuplicateKeyError) -> Self {
        Self::DuplicateKey(error)
    }
}

impl From<KeyNotFoundError> for MapError {
    fn from(error: KeyNotFoundError) -> Self {
        Self::KeyNotFound(error)
    }
}

impl From<CursorExhaustedError> for MapError {
    fn from(error: CursorExhaustedError) -> Self {
        Self::CursorExhausted(error)
    }
}

impl From<CursorInvalidatedError> for MapError {
    fn from(error: CursorInvalidatedError) -> Self {
        Self::CursorInvalidated(error)
    }
}

// =============================================================================
// Tests
// =============================================================================
