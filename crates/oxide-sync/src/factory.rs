//! Token construction.

use tracing::debug;

use crate::error::Result;
use crate::join::{ColumnPair, Join, JoinCondition, JoinSide};
use crate::schema::{ColumnSchema, SchemaModel, SqlType, TableSchema};
use crate::token::{MergeChange, MergeDirection, MergeToken};

/// Builds tokens aimed at one target.
///
/// The factory only decides payload and direction; whether a token is
/// needed at all is the merger's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenFactory {
    direction: MergeDirection,
}

impl Default for TokenFactory {
    fn default() -> Self {
        Self::to_db()
    }
}

impl TokenFactory {
    /// Factory for tokens that mutate the model.
    #[must_use]
    pub fn to_model() -> Self {
        Self {
            direction: MergeDirection::ToModel,
        }
    }

    /// Factory for tokens that emit DDL.
    #[must_use]
    pub fn to_db() -> Self {
        Self {
            direction: MergeDirection::ToDb,
        }
    }

    /// The direction of produced tokens.
    #[must_use]
    pub fn direction(&self) -> MergeDirection {
        self.direction
    }

    fn token(&self, change: MergeChange) -> MergeToken {
        MergeToken::new(self.direction, change)
    }

    /// Creates a table.
    #[must_use]
    pub fn add_table(&self, table: &TableSchema) -> MergeToken {
        self.token(MergeChange::AddTable {
            table: table.clone(),
        })
    }

    /// Drops a table.
    #[must_use]
    pub fn drop_table(&self, table: &TableSchema) -> MergeToken {
        self.token(MergeChange::DropTable {
            table: table.clone(),
        })
    }

    /// Adds a column.
    #[must_use]
    pub fn add_column(&self, table: &str, column: &ColumnSchema) -> MergeToken {
        self.token(MergeChange::AddColumn {
            table: table.to_string(),
            column: column.clone(),
        })
    }

    /// Drops a column.
    #[must_use]
    pub fn drop_column(&self, table: &str, column: &ColumnSchema) -> MergeToken {
        self.token(MergeChange::DropColumn {
            table: table.to_string(),
            column: column.clone(),
        })
    }

    /// Changes a column type.
    #[must_use]
    pub fn set_column_type(
        &self,
        table: &str,
        column: &str,
        from: &SqlType,
        to: &SqlType,
    ) -> MergeToken {
        self.token(MergeChange::SetColumnType {
            table: table.to_string(),
            column: column.to_string(),
            from: from.clone(),
            to: to.clone(),
        })
    }

    /// Sets the nullability of a column.
    #[must_use]
    pub fn set_nullability(&self, table: &str, column: &str, nullable: bool) -> MergeToken {
        let (table, column) = (table.to_string(), column.to_string());
        if nullable {
            self.token(MergeChange::SetAllowNull { table, column })
        } else {
            self.token(MergeChange::SetNotNull { table, column })
        }
    }

    /// Replaces a primary key.
    #[must_use]
    pub fn set_primary_key(&self, table: &str, from: &[String], to: &[String]) -> MergeToken {
        self.token(MergeChange::SetPrimaryKey {
            table: table.to_string(),
            from: from.to_vec(),
            to: to.to_vec(),
        })
    }

    /// Adds a join. `model` is the model the join belongs to and is used to
    /// resolve which side holds the foreign key.
    pub fn add_join(&self, join: &Join, model: &SchemaModel) -> Result<MergeToken> {
        let referencing = join.referencing_side(model)?;
        Ok(self.token(MergeChange::AddJoin {
            join: join.clone(),
            referencing,
        }))
    }

    /// Drops a join found only in `imported`.
    ///
    /// The foreign key side is resolved against `imported`, then table and
    /// column names are re-resolved against `original` so the token speaks
    /// the tracked model's naming.
    pub fn drop_join(
        &self,
        join: &Join,
        imported: &SchemaModel,
        original: &SchemaModel,
    ) -> Result<MergeToken> {
        let referencing = join.referencing_side(imported)?;
        let join = resolve_naming(join, original)?;
        Ok(self.token(MergeChange::DropJoin { join, referencing }))
    }
}

/// Rewrites a join's table and column names to the spelling used by
/// `model`. Orientation is kept. Sides whose table is unknown to `model`
/// keep their names.
pub fn resolve_naming(join: &Join, model: &SchemaModel) -> Result<Join> {
    let mut entities = join.entities.clone();
    let mut pairs: Vec<ColumnPair> = join.condition.pairs().to_vec();

    for side in JoinSide::BOTH {
        let Some(table) = model.find_table(join.entity(side)) else {
            debug!(table = join.entity(side), "Table not in original model, keeping imported name");
            continue;
        };
        entities[side.index()] = table.name.clone();
        for pair in &mut pairs {
            let column = match side {
                JoinSide::Left => &mut pair.left,
                JoinSide::Right => &mut pair.right,
            };
            if let Some(resolved) = table.find_column(column) {
                *column = resolved.name.clone();
            }
        }
    }

    let mut resolved = Join::new(
        entities,
        join.names.clone(),
        join.to_many,
        join.to_dependent_pk,
        JoinCondition::from_pairs(pairs)?,
    )?;
    resolved.synthesized = join.synthesized;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::{ToDependentPkSemantics, ToManySemantics};

    fn model(artist: &str, painting: &str, fk: &str) -> SchemaModel {
        SchemaModel::new()
            .table(
                TableSchema::new(artist)
                    .column(ColumnSchema::new("Id", SqlType::BigInt).primary_key()),
            )
            .table(
                TableSchema::new(painting)
                    .column(ColumnSchema::new("Id", SqlType::BigInt).primary_key())
                    .column(ColumnSchema::new(fk, SqlType::BigInt)),
            )
    }

    fn join(artist: &str, painting: &str, fk: &str) -> Join {
        Join::builder()
            .left(artist)
            .right(painting)
            .to_many(ToManySemantics::OneToMany)
            .to_dependent_pk(ToDependentPkSemantics::None)
            .pair("ID", fk)
            .build()
            .unwrap()
    }

    #[test]
    fn test_direction() {
        assert_eq!(TokenFactory::to_db().direction(), MergeDirection::ToDb);
        assert_eq!(TokenFactory::to_model().direction(), MergeDirection::ToModel);
    }

    #[test]
    fn test_set_nullability() {
        let factory = TokenFactory::to_db();
        assert!(matches!(
            factory.set_nullability("T", "C", true).change,
            MergeChange::SetAllowNull { .. }
        ));
        assert!(matches!(
            factory.set_nullability("T", "C", false).change,
            MergeChange::SetNotNull { .. }
        ));
    }

    #[test]
    fn test_add_join_resolves_referencing_side() {
        let model = model("ARTIST", "PAINTING", "ARTIST_ID");
        let token = TokenFactory::to_db()
            .add_join(&join("ARTIST", "PAINTING", "ARTIST_ID"), &model)
            .unwrap();
        match token.change {
            MergeChange::AddJoin { referencing, .. } => assert_eq!(referencing, JoinSide::Right),
            other => panic!("Expected AddJoin, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_join_uses_original_naming() {
        let imported = model("ARTIST", "PAINTING", "ARTIST_ID");
        let original = model("Artist", "Painting", "Artist_Id");
        let token = TokenFactory::to_db()
            .drop_join(&join("ARTIST", "PAINTING", "ARTIST_ID"), &imported, &original)
            .unwrap();

        match token.change {
            MergeChange::DropJoin { join, referencing } => {
                assert_eq!(join.entities, ["Artist".to_string(), "Painting".to_string()]);
                assert_eq!(join.condition.pairs()[0], ColumnPair::new("Id", "Artist_Id"));
                assert_eq!(referencing, JoinSide::Right);
            }
            other => panic!("Expected DropJoin, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_naming_keeps_unknown_tables() {
        let original = SchemaModel::new().table(TableSchema::new("Artist"));
        let resolved = resolve_naming(&join("ARTIST", "PAINTING", "ARTIST_ID"), &original).unwrap();
        assert_eq!(resolved.entities, ["Artist".to_string(), "PAINTING".to_string()]);
        // ARTIST has no ID column in the original, so the column keeps its spelling
        assert_eq!(resolved.condition.pairs()[0], ColumnPair::new("ID", "ARTIST_ID"));
    }
}
