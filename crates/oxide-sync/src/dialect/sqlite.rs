//! SQLite dialect.
//!
//! SQLite has limited ALTER TABLE support: constraints, column types and
//! nullability can only be changed by recreating the table. Those tokens are
//! rejected so the executor records them as failures.

use crate::error::Result;
use crate::schema::{ColumnSchema, SqlType};
use crate::token::{MergeChange, MergeToken};

use super::MergeDialect;

/// SQLite merge dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn add_column_sql(&self, table: &str, column: &ColumnSchema) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )
    }

    /// SQLite 3.35.0+.
    fn drop_column_sql(&self, table: &str, column_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column_name)
        )
    }
}

impl MergeDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn render_ddl(&self, token: &MergeToken) -> Result<Vec<String>> {
        match &token.change {
            MergeChange::AddTable { table } => Ok(vec![self.create_table_sql(table)]),
            MergeChange::DropTable { table } => Ok(vec![format!(
                "DROP TABLE {}",
                self.quote_identifier(&table.name)
            )]),
            MergeChange::AddColumn { table, column } => {
                Ok(vec![self.add_column_sql(table, column)])
            }
            MergeChange::DropColumn { table, column } => {
                Ok(vec![self.drop_column_sql(table, &column.name)])
            }
            MergeChange::AddJoin { .. }
            | MergeChange::DropJoin { .. }
            | MergeChange::SetPrimaryKey { .. }
            | MergeChange::SetColumnType { .. }
            | MergeChange::SetNotNull { .. }
            | MergeChange::SetAllowNull { .. } => Err(self.unsupported(token)),
        }
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer | SqlType::SmallInt | SqlType::BigInt | SqlType::Boolean => {
                "INTEGER".to_string()
            }
            SqlType::Text | SqlType::Varchar(_) | SqlType::Char(_) => "TEXT".to_string(),
            SqlType::Date | SqlType::Time | SqlType::Timestamp => "TEXT".to_string(),
            SqlType::Real | SqlType::Double => "REAL".to_string(),
            SqlType::Decimal(_, _) => "NUMERIC".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Other(name) => name.clone(),
        }
    }
}
