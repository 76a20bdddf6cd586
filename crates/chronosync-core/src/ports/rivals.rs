//! Rivals resolver port
//!
//! Some entity types carry a set-wide invariant that a single write can
//! break, e.g. "at most one time entry is running". Two records that both
//! violate it are *rivals*. The repository consults a [`RivalsResolver`]
//! after conflict-resolved writes and persists the repaired pair atomically.

/// Predicate matching the rivals of a given record
pub type RivalPredicate<T> = Box<dyn for<'a> Fn(&'a T) -> bool + Send + Sync>;

/// Detects and repairs invariant-violating pairs
pub trait RivalsResolver<T>: Send + Sync {
    /// Returns true if `entity` is in the invariant-sensitive state
    fn can_have_rival(&self, entity: &T) -> bool;

    /// Predicate matching other records that rival `entity`
    ///
    /// Returns an always-false predicate when `entity` cannot have a rival.
    fn are_rivals(&self, entity: &T) -> RivalPredicate<T>;

    /// Repairs a rival pair; the result keeps the argument order
    fn fix_rivals(&self, entity: &T, rival: &T, all_entities: &[T]) -> (T, T);
}
