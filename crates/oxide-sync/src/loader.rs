//! Join loading.
//!
//! Joins coming from introspection or from a serialized file are resolved
//! against the tables of the model they are loaded into. A join naming a
//! column its table does not have is skipped with a warning; the rest of
//! the batch still loads.

use tracing::{debug, info, warn};

use crate::canonical::normalize;
use crate::error::{Result, SyncError};
use crate::join::{
    ColumnPair, Join, JoinCondition, JoinSide, ToDependentPkSemantics, ToManySemantics,
};
use crate::schema::SchemaModel;

/// A foreign key as reported by a live database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    /// Referencing table.
    pub table: String,
    /// Referencing columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub references_table: String,
    /// Referenced columns, matching `columns` by position.
    pub references_columns: Vec<String>,
}

/// Resolves joins against the tables of one model.
#[derive(Debug, Clone, Copy)]
pub struct JoinLoader<'a> {
    model: &'a SchemaModel,
}

impl<'a> JoinLoader<'a> {
    /// Creates a loader resolving against `model`.
    #[must_use]
    pub fn new(model: &'a SchemaModel) -> Self {
        Self { model }
    }

    /// Resolves every endpoint table and column of `join`, rewriting names
    /// to the model's spelling.
    pub fn resolve_join(&self, join: &Join) -> Result<Join> {
        let mut resolved = join.clone();
        let mut pairs: Vec<ColumnPair> = join.condition.pairs().to_vec();

        for side in JoinSide::BOTH {
            let entity = join.entity(side);
            let table = self
                .model
                .find_table(entity)
                .ok_or_else(|| SyncError::DanglingJoin {
                    join: join.to_string(),
                    table: entity.to_string(),
                })?;
            resolved.entities[side.index()] = table.name.clone();

            for pair in &mut pairs {
                let column = match side {
                    JoinSide::Left => &mut pair.left,
                    JoinSide::Right => &mut pair.right,
                };
                let found = table
                    .find_column(column)
                    .ok_or_else(|| SyncError::UnresolvedAttribute {
                        table: table.name.clone(),
                        column: column.clone(),
                    })?;
                *column = found.name.clone();
            }
        }

        resolved.condition = JoinCondition::from_pairs(pairs)?;
        Ok(resolved)
    }

    /// Resolves a batch of joins, skipping the ones that do not resolve.
    pub fn load_joins(&self, joins: impl IntoIterator<Item = Join>) -> Vec<Join> {
        joins
            .into_iter()
            .filter_map(|join| match self.resolve_join(&join) {
                Ok(resolved) => Some(resolved),
                Err(e) => {
                    warn!(join = %join, error = %e, "Skipping join");
                    None
                }
            })
            .collect()
    }

    /// Builds the normalized join for a foreign key.
    ///
    /// The referenced table becomes the left side. When the referencing
    /// columns are exactly the referencing table's primary key the join is
    /// one-to-one with a dependent key on the referencing side.
    pub fn join_from_foreign_key(&self, fk: &ForeignKeyInfo) -> Result<Join> {
        if fk.columns.len() != fk.references_columns.len() {
            return Err(SyncError::config(format!(
                "foreign key on '{}' has {} columns but references {}",
                fk.table,
                fk.columns.len(),
                fk.references_columns.len()
            )));
        }

        let dependent = self
            .model
            .find_table(&fk.table)
            .map(|t| {
                t.primary_key.len() == fk.columns.len()
                    && fk.columns.iter().all(|c| t.is_primary_key_column(c))
            })
            .unwrap_or(false);
        let (to_many, to_dependent_pk) = if dependent {
            (ToManySemantics::OneToOne, ToDependentPkSemantics::Left)
        } else {
            (ToManySemantics::OneToMany, ToDependentPkSemantics::None)
        };

        let pairs = fk
            .references_columns
            .iter()
            .zip(&fk.columns)
            .map(|(referenced, referencing)| {
                ColumnPair::new(referenced.clone(), referencing.clone())
            })
            .collect();

        let join = Join::new(
            [fk.references_table.clone(), fk.table.clone()],
            [None, None],
            to_many,
            to_dependent_pk,
            JoinCondition::from_pairs(pairs)?,
        )?;
        Ok(normalize(join))
    }
}

/// Loads foreign keys into `model` as joins. Returns the number of joins
/// added.
pub fn load_foreign_keys(model: &mut SchemaModel, foreign_keys: &[ForeignKeyInfo]) -> usize {
    let loader = JoinLoader::new(model);
    let joins: Vec<Join> = foreign_keys
        .iter()
        .filter_map(|fk| match loader.join_from_foreign_key(fk) {
            Ok(join) => Some(join),
            Err(e) => {
                warn!(table = %fk.table, error = %e, "Skipping foreign key");
                None
            }
        })
        .collect();
    load_joins_into(model, joins)
}

/// Resolves `joins` against `model` and adds the ones that resolve.
/// Returns the number of joins added.
pub fn load_joins_into(model: &mut SchemaModel, joins: Vec<Join>) -> usize {
    let total = joins.len();
    let resolved = JoinLoader::new(model).load_joins(joins);
    let loaded = resolved.len();
    for join in resolved {
        debug!(join = %join, "Loaded join");
        model.joins.push(join);
    }
    model.compile();
    info!(loaded, skipped = total - loaded, "Joins loaded");
    loaded
}
