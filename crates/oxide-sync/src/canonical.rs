//! Canonical join orientation.
//!
//! The left side of a normalized join is the lexicographically smaller table.
//! Self-joins fall back to the endpoint names, with a missing name sorting
//! before any present one. This ordering is the only definition of "left" the
//! engine relies on; it is applied to introspected foreign keys and to
//! relationships upgraded from the legacy directional format.

use std::cmp::Ordering;

use crate::join::{Join, JoinSide};

/// Returns true when `join` is not in canonical orientation.
#[must_use]
pub fn needs_swap(join: &Join) -> bool {
    match join.entities[0].cmp(&join.entities[1]) {
        Ordering::Greater => true,
        Ordering::Less => false,
        // None < Some(_) is exactly "missing name sorts low"
        Ordering::Equal => {
            declared_name(join, JoinSide::Left) > declared_name(join, JoinSide::Right)
        }
    }
}

/// The endpoint name as declared. Names synthesized by
/// [`SchemaModel::compile`](crate::schema::SchemaModel::compile) count as
/// missing.
fn declared_name(join: &Join, side: JoinSide) -> Option<&str> {
    join.name(side).filter(|_| !join.is_synthesized(side))
}

/// Returns true when `join` is already canonical.
#[must_use]
pub fn is_normalized(join: &Join) -> bool {
    !needs_swap(join)
}

/// Returns the canonical orientation of `join`.
///
/// Idempotent: normalizing a normalized join returns it unchanged.
#[must_use]
pub fn normalize(join: Join) -> Join {
    if needs_swap(&join) {
        join.reversed()
    } else {
        join
    }
}

/// In-place variant of [`normalize`]. Returns true when the join was swapped.
pub fn normalize_in_place(join: &mut Join) -> bool {
    if needs_swap(join) {
        *join = join.reversed();
        true
    } else {
        false
    }
}

/// The direction-reversed structural twin of `join`.
#[must_use]
pub fn reverse_orientation(join: &Join) -> Join {
    join.reversed()
}
