//! PostgreSQL dialect.

use crate::error::Result;
use crate::schema::SqlType;
use crate::token::{MergeChange, MergeToken};

use super::{ForeignKeyDef, MergeDialect};

/// PostgreSQL merge dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// PostgreSQL's default primary key constraint name.
    fn primary_key_name(table: &str) -> String {
        format!("{}_pkey", table)
    }
}

impl MergeDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn render_ddl(&self, token: &MergeToken) -> Result<Vec<String>> {
        let statements = match &token.change {
            MergeChange::AddTable { table } => vec![self.create_table_sql(table)],
            MergeChange::DropTable { table } => vec![format!(
                "DROP TABLE {} CASCADE",
                self.quote_identifier(&table.name)
            )],
            MergeChange::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.quote_identifier(table),
                self.column_definition(column)
            )],
            MergeChange::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.quote_identifier(table),
                self.quote_identifier(&column.name)
            )],
            MergeChange::AddJoin { join, referencing } => {
                let fk = ForeignKeyDef::from_join(join, *referencing);
                vec![format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.quote_identifier(&fk.table),
                    self.quote_identifier(&fk.name),
                    self.column_list(&fk.columns),
                    self.quote_identifier(&fk.references_table),
                    self.column_list(&fk.references_columns)
                )]
            }
            MergeChange::DropJoin { join, referencing } => {
                let fk = ForeignKeyDef::from_join(join, *referencing);
                vec![format!(
                    "ALTER TABLE {} DROP CONSTRAINT {}",
                    self.quote_identifier(&fk.table),
                    self.quote_identifier(&fk.name)
                )]
            }
            MergeChange::SetPrimaryKey { table, from, to } => {
                let quoted = self.quote_identifier(table);
                let mut sql = Vec::new();
                if !from.is_empty() {
                    sql.push(format!(
                        "ALTER TABLE {} DROP CONSTRAINT {}",
                        quoted,
                        self.quote_identifier(&Self::primary_key_name(table))
                    ));
                }
                if !to.is_empty() {
                    sql.push(format!(
                        "ALTER TABLE {} ADD PRIMARY KEY ({})",
                        quoted,
                        self.column_list(to)
                    ));
                }
                sql
            }
            MergeChange::SetColumnType {
                table, column, to, ..
            } => vec![format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
                self.quote_identifier(table),
                self.quote_identifier(column),
                self.type_name(to)
            )],
            MergeChange::SetNotNull { table, column } => vec![format!(
                "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL",
                self.quote_identifier(table),
                self.quote_identifier(column)
            )],
            MergeChange::SetAllowNull { table, column } => vec![format!(
                "ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL",
                self.quote_identifier(table),
                self.quote_identifier(column)
            )],
        };
        Ok(statements)
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(n) => format!("VARCHAR({n})"),
            SqlType::Char(n) => format!("CHAR({n})"),
            SqlType::Decimal(p, s) => format!("NUMERIC({p}, {s})"),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Blob => "BYTEA".to_string(),
            SqlType::Other(name) => name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::{Join, JoinSide, ToDependentPkSemantics, ToManySemantics};
    use crate::token::MergeDirection;

    fn render(change: MergeChange) -> Vec<String> {
        PostgresDialect::new()
            .render_ddl(&MergeToken::new(MergeDirection::ToDb, change))
            .unwrap()
    }

    fn artist_painting() -> Join {
        Join::builder()
            .left("artist")
            .right("painting")
            .to_many(ToManySemantics::OneToMany)
            .to_dependent_pk(ToDependentPkSemantics::None)
            .pair("id", "artist_id")
            .build()
            .unwrap()
    }

    #[test]
    fn test_add_join() {
        let sql = render(MergeChange::AddJoin {
            join: artist_painting(),
            referencing: JoinSide::Right,
        });
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"painting\" ADD CONSTRAINT \"fk_painting_artist_id\" \
                 FOREIGN KEY (\"artist_id\") REFERENCES \"artist\" (\"id\")"
            ]
        );
    }

    #[test]
    fn test_drop_join() {
        let sql = render(MergeChange::DropJoin {
            join: artist_painting(),
            referencing: JoinSide::Right,
        });
        assert_eq!(
            sql,
            vec!["ALTER TABLE \"painting\" DROP CONSTRAINT \"fk_painting_artist_id\""]
        );
    }

    #[test]
    fn test_drop_join_uses_generated_constraint_name() {
        let join = artist_painting();
        let added = render(MergeChange::AddJoin {
            join: join.clone(),
            referencing: JoinSide::Right,
        });
        let dropped = render(MergeChange::DropJoin {
            join,
            referencing: JoinSide::Right,
        });

        assert!(added[0].contains("ADD CONSTRAINT \"fk_painting_artist_id\""));
        assert!(dropped[0].ends_with("DROP CONSTRAINT \"fk_painting_artist_id\""));
        // the server default would be painting_artist_id_fkey
        assert!(!dropped[0].contains("_fkey"));
    }

    #[test]
    fn test_set_primary_key() {
        let sql = render(MergeChange::SetPrimaryKey {
            table: "artist".to_string(),
            from: vec!["id".to_string()],
            to: vec!["id".to_string(), "code".to_string()],
        });
        assert_eq!(sql.len(), 2);
        assert_eq!(sql[0], "ALTER TABLE \"artist\" DROP CONSTRAINT \"artist_pkey\"");
        assert_eq!(sql[1], "ALTER TABLE \"artist\" ADD PRIMARY KEY (\"id\", \"code\")");

        let sql = render(MergeChange::SetPrimaryKey {
            table: "artist".to_string(),
            from: vec![],
            to: vec!["id".to_string()],
        });
        assert_eq!(sql.len(), 1);
    }

    #[test]
    fn test_alter_column() {
        let sql = render(MergeChange::SetColumnType {
            table: "artist".to_string(),
            column: "name".to_string(),
            from: SqlType::Text,
            to: SqlType::Varchar(100),
        });
        assert_eq!(
            sql[0],
            "ALTER TABLE \"artist\" ALTER COLUMN \"name\" TYPE VARCHAR(100)"
        );

        let sql = render(MergeChange::SetAllowNull {
            table: "artist".to_string(),
            column: "name".to_string(),
        });
        assert_eq!(sql[0], "ALTER TABLE \"artist\" ALTER COLUMN \"name\" DROP NOT NULL");
    }

    #[test]
    fn test_type_names() {
        let d = PostgresDialect::new();
        assert_eq!(d.type_name(&SqlType::Double), "DOUBLE PRECISION");
        assert_eq!(d.type_name(&SqlType::Blob), "BYTEA");
        assert_eq!(d.type_name(&SqlType::Decimal(10, 2)), "NUMERIC(10, 2)");
    }
}
