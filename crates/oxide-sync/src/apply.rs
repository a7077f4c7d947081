//! Running rendered DDL against a live SQLite database.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, info, warn};

use crate::executor::{ExecutionReport, ValidationResult};

/// Outcome of applying an [`ExecutionReport`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    /// Statements that ran (or were printed, in dry-run mode).
    pub executed: usize,
    /// Tokens whose statements failed against the database.
    pub validation: ValidationResult,
}

impl ApplyReport {
    /// Returns true when every statement ran.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.validation.is_empty()
    }
}

/// Applies rendered statements token by token.
pub struct SqliteApplier {
    pool: SqlitePool,
    dry_run: bool,
}

impl SqliteApplier {
    /// Creates an applier for `pool`.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            dry_run: false,
        }
    }

    /// Print statements instead of running them.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Runs the statements of every token in `report`.
    ///
    /// When a statement fails, the token is recorded as failed and its
    /// remaining statements are skipped. Later tokens still run.
    pub async fn apply(&self, report: &ExecutionReport) -> ApplyReport {
        let mut outcome = ApplyReport::default();

        for rendered in &report.statements {
            for sql in &rendered.statements {
                if self.dry_run {
                    println!("{};", sql);
                    outcome.executed += 1;
                    continue;
                }
                debug!(sql = %sql, "Executing statement");
                match sqlx::query(sql).execute(&self.pool).await {
                    Ok(_) => outcome.executed += 1,
                    Err(e) => {
                        warn!(token = %rendered.token, error = %e, "Statement failed");
                        outcome
                            .validation
                            .add_failure(rendered.token.clone(), e.to_string());
                        break;
                    }
                }
            }
        }

        info!(
            executed = outcome.executed,
            failures = outcome.validation.len(),
            dry_run = self.dry_run,
            "Statements applied"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use crate::executor::TokenExecutor;
    use crate::factory::TokenFactory;
    use crate::schema::{ColumnSchema, SchemaModel, SqlType, TableSchema};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_one(pool)
                .await
                .unwrap();
        count.0 > 0
    }

    fn artist() -> TableSchema {
        TableSchema::new("artist")
            .column(ColumnSchema::new("id", SqlType::Integer).primary_key())
            .column(ColumnSchema::new("name", SqlType::Text).not_null())
    }

    fn render(tokens: Vec<crate::token::MergeToken>) -> ExecutionReport {
        let dialect = SqliteDialect::new();
        let mut model = SchemaModel::new();
        TokenExecutor::new(&dialect).execute(tokens, &mut model)
    }

    #[tokio::test]
    async fn test_apply_creates_table() {
        let pool = create_test_pool().await;
        let report = render(vec![TokenFactory::to_db().add_table(&artist())]);

        let outcome = SqliteApplier::new(pool.clone()).apply(&report).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.executed, 1);
        assert!(table_exists(&pool, "artist").await);
    }

    #[tokio::test]
    async fn test_dry_run() {
        let pool = create_test_pool().await;
        let report = render(vec![TokenFactory::to_db().add_table(&artist())]);

        let outcome = SqliteApplier::new(pool.clone())
            .dry_run(true)
            .apply(&report)
            .await;
        assert_eq!(outcome.executed, 1);
        assert!(!table_exists(&pool, "artist").await);
    }

    #[tokio::test]
    async fn test_failed_statement_does_not_abort_batch() {
        let pool = create_test_pool().await;
        let factory = TokenFactory::to_db();
        let report = render(vec![
            factory.drop_table(&TableSchema::new("missing")),
            factory.add_table(&artist()),
        ]);

        let outcome = SqliteApplier::new(pool.clone()).apply(&report).await;
        assert_eq!(outcome.validation.len(), 1);
        assert_eq!(outcome.executed, 1);
        assert!(table_exists(&pool, "artist").await);
    }
}
