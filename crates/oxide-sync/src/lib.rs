//! Schema synchronization for Rust.
//!
//! `oxide-sync` compares a tracked schema model against a schema imported
//! from a live database and plans the changes that bring one in line with
//! the other:
//! - Joins are canonicalized so the same relationship described from either
//!   end compares equal
//! - Every change is a reversible merge token aimed at the model or the
//!   database
//! - Tokens run in a fixed priority order so drops precede creates
//! - SQL generation is dialect-aware (SQLite, PostgreSQL)
//!
//! # Architecture
//!
//! - **Joins** - Two-sided relationships between tables, with a canonical
//!   orientation and a text signature
//! - **Dictionaries** - Keyed views over tables, columns and joins of a model
//! - **Diff** - Generic key-based comparison of two dictionaries
//! - **Merger** - Turns dictionary diffs into merge tokens
//! - **Executor** - Sorts tokens and applies them to a model or renders DDL
//! - **Dialect** - Database-specific SQL generation
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_sync::prelude::*;
//!
//! let original = SchemaModel::load("schema.json".as_ref())?;
//! let imported = introspect_sqlite(&pool, None).await?;
//!
//! let plan = SchemaMerger::new().plan(&original, &imported)?;
//! let dialect = SqliteDialect::new();
//! let report = TokenExecutor::new(&dialect).execute(plan.tokens, &mut original.clone());
//!
//! for sql in report.sql() {
//!     println!("{};", sql);
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the DDL that makes the database match the model
//! oxide-sync plan --model schema.json
//!
//! # Run it
//! oxide-sync apply --model schema.json
//!
//! # Update the model from the database instead
//! oxide-sync pull --model schema.json
//! ```

pub mod apply;
pub mod canonical;
pub mod dialect;
pub mod dictionary;
pub mod diff;
pub mod error;
pub mod executor;
pub mod factory;
pub mod filter;
pub mod introspect;
pub mod join;
pub mod loader;
pub mod merger;
pub mod schema;
pub mod signature;
pub mod token;
pub mod xml;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::apply::{ApplyReport, SqliteApplier};
    pub use crate::canonical::{is_normalized, normalize, reverse_orientation};
    pub use crate::dialect::{MergeDialect, PostgresDialect, SqliteDialect};
    pub use crate::dictionary::{ColumnDictionary, Dictionary, JoinDictionary, TableDictionary};
    pub use crate::diff::{diff, DictionaryDiff};
    pub use crate::error::{Result, SyncError};
    pub use crate::executor::{sort_tokens, ExecutionReport, TokenExecutor, ValidationResult};
    pub use crate::factory::TokenFactory;
    pub use crate::filter::{FilterConfig, InclusionFilter, PatternFilter};
    pub use crate::introspect::introspect_sqlite;
    pub use crate::join::{
        ColumnPair, Join, JoinCondition, JoinSide, ToDependentPkSemantics, ToManySemantics,
    };
    pub use crate::loader::{load_foreign_keys, load_joins_into, ForeignKeyInfo, JoinLoader};
    pub use crate::merger::{MergePlan, MergerOptions, SchemaMerger};
    pub use crate::schema::{ColumnSchema, SchemaModel, SqlType, TableSchema};
    pub use crate::signature::signature;
    pub use crate::token::{MergeChange, MergeDirection, MergeToken, TokenKind};
    pub use crate::xml::{read_joins, write_joins};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_plans_and_renders() {
        let original = SchemaModel::new().table(
            TableSchema::new("artist")
                .column(ColumnSchema::new("id", SqlType::Integer).primary_key()),
        );
        let imported = SchemaModel::new();

        let plan = SchemaMerger::new().plan(&original, &imported).unwrap();
        assert_eq!(plan.tokens.len(), 1);

        let dialect = SqliteDialect::new();
        let mut model = imported.clone();
        let report = TokenExecutor::new(&dialect).execute(plan.tokens, &mut model);
        assert!(report.is_success());
        assert_eq!(report.sql().len(), 1);
    }
}
