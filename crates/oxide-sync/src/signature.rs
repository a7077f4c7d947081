//! Join signatures.
//!
//! A signature is the dictionary key of a join. It is built from one
//! `LOW_TABLE.LOW_COLUMN>HIGH_TABLE.HIGH_COLUMN` fragment per column pair,
//! where "low" is decided by comparing the two table names rather than by the
//! join's current left/right. Fragments go through a sorted set, so neither
//! declaration order nor declared direction changes the result.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::join::{ColumnPair, Join};

/// Separator between fragments.
pub const FRAGMENT_SEPARATOR: &str = ";";

/// Computes the signature of a join.
#[must_use]
pub fn signature(join: &Join) -> String {
    let left_table = join.entities[0].to_ascii_uppercase();
    let right_table = join.entities[1].to_ascii_uppercase();
    let table_order = left_table.cmp(&right_table);

    let fragments: BTreeSet<String> = join
        .condition
        .pairs()
        .iter()
        .map(|pair| fragment(&left_table, &right_table, table_order, pair))
        .collect();

    fragments
        .into_iter()
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR)
}

fn fragment(
    left_table: &str,
    right_table: &str,
    table_order: Ordering,
    pair: &ColumnPair,
) -> String {
    let left = (left_table, pair.left.to_ascii_uppercase());
    let right = (right_table, pair.right.to_ascii_uppercase());

    let left_is_low = match table_order {
        Ordering::Less => true,
        Ordering::Greater => false,
        // self-join: orient the pair by column instead
        Ordering::Equal => left.1 <= right.1,
    };
    let (low, high) = if left_is_low { (left, right) } else { (right, left) };
    format!("{}.{}>{}.{}", low.0, low.1, high.0, high.1)
}
