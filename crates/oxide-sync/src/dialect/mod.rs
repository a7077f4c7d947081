//! Database dialect implementations.
//!
//! Each dialect knows how to render DDL for database-bound merge tokens.
//! Tokens a dialect cannot express are reported as
//! [`SyncError::UnsupportedOperation`] rather than silently skipped.

mod postgres;
mod sqlite;

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::error::{Result, SyncError};
use crate::join::{Join, JoinSide};
use crate::schema::{ColumnSchema, SqlType, TableSchema};
use crate::token::MergeToken;

/// A foreign key constraint derived from a join and its referencing side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    /// Constraint name.
    pub name: String,
    /// Table holding the constraint.
    pub table: String,
    /// Referencing columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub references_table: String,
    /// Referenced columns.
    pub references_columns: Vec<String>,
}

impl ForeignKeyDef {
    /// Builds the constraint for `join`, originating from `referencing`.
    ///
    /// The constraint is always named `fk_<table>_<columns>`, lowercased. Join
    /// tokens carry no constraint name, so a drop only matches constraints
    /// created under this name. A foreign key created elsewhere, such as one
    /// named by PostgreSQL's `<table>_<column>_fkey` default, is not found by
    /// the rendered `DROP CONSTRAINT`.
    #[must_use]
    pub fn from_join(join: &Join, referencing: JoinSide) -> Self {
        let target = referencing.opposite();
        let table = join.entity(referencing).to_string();
        let columns: Vec<String> = join
            .condition
            .columns(referencing)
            .into_iter()
            .map(str::to_string)
            .collect();
        let name = format!(
            "fk_{}_{}",
            table.to_ascii_lowercase(),
            columns.join("_").to_ascii_lowercase()
        );
        Self {
            name,
            table,
            columns,
            references_table: join.entity(target).to_string(),
            references_columns: join
                .condition
                .columns(target)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Trait for database-specific DDL rendering.
pub trait MergeDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Renders the statements for a token.
    fn render_ddl(&self, token: &MergeToken) -> Result<Vec<String>>;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, sql_type: &SqlType) -> String;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Generates column definition SQL. Primary keys are declared at table
    /// level, so only nullability is rendered here.
    fn column_definition(&self, column: &ColumnSchema) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.type_name(&column.sql_type)
        );
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        sql
    }

    /// Quotes and joins a column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Generates SQL for creating a table.
    fn create_table_sql(&self, table: &TableSchema) -> String {
        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        if !table.primary_key.is_empty() {
            defs.push(format!("PRIMARY KEY ({})", self.column_list(&table.primary_key)));
        }
        format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(&table.name),
            defs.join(",\n  ")
        )
    }

    /// Error for a token this dialect cannot express.
    fn unsupported(&self, token: &MergeToken) -> SyncError {
        SyncError::UnsupportedOperation {
            dialect: self.name().to_string(),
            operation: token.change.description(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::{ToDependentPkSemantics, ToManySemantics};

    #[test]
    fn test_foreign_key_from_join() {
        let join = Join::builder()
            .left("order")
            .right("order_line")
            .to_many(ToManySemantics::OneToMany)
            .to_dependent_pk(ToDependentPkSemantics::None)
            .pair("id", "order_id")
            .pair("code", "order_code")
            .build()
            .unwrap();

        let fk = ForeignKeyDef::from_join(&join, JoinSide::Right);
        assert_eq!(fk.name, "fk_order_line_order_id_order_code");
        assert_eq!(fk.table, "order_line");
        assert_eq!(fk.columns, vec!["order_id", "order_code"]);
        assert_eq!(fk.references_table, "order");
        assert_eq!(fk.references_columns, vec!["id", "code"]);
    }

    #[test]
    fn test_quote_identifier_escapes() {
        assert_eq!(SqliteDialect::new().quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
