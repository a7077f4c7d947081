//! Token sorting and execution.
//!
//! Tokens run strictly in priority order. Model-bound tokens mutate the
//! [`SchemaModel`] and recompile it; database-bound tokens are rendered by
//! the dialect into a statement buffer. A token that fails is recorded and
//! the rest of the batch still runs.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dialect::MergeDialect;
use crate::error::{Result, SyncError};
use crate::schema::SchemaModel;
use crate::signature::signature;
use crate::token::{MergeChange, MergeToken};

/// Sorts tokens by ascending priority.
///
/// The sort is stable: equal-priority tokens keep their relative order, so
/// sorting an already sorted batch is a no-op.
#[must_use]
pub fn sort_tokens(mut tokens: Vec<MergeToken>) -> Vec<MergeToken> {
    tokens.sort_by_key(MergeToken::priority);
    tokens
}

/// A token that could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    /// The failed token.
    pub token: MergeToken,
    /// Why it failed.
    pub message: String,
}

/// Failures accumulated over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    failures: Vec<ValidationFailure>,
}

impl ValidationResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure.
    pub fn add_failure(&mut self, token: MergeToken, message: impl Into<String>) {
        self.failures.push(ValidationFailure {
            token,
            message: message.into(),
        });
    }

    /// All failures, in execution order.
    #[must_use]
    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    /// Number of failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Returns true when nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Appends the failures of another result.
    pub fn extend(&mut self, other: ValidationResult) {
        self.failures.extend(other.failures);
    }
}

/// Statements rendered for one database-bound token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenStatements {
    /// The token.
    pub token: MergeToken,
    /// Its DDL, in execution order.
    pub statements: Vec<String>,
}

/// Outcome of executing a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    /// Rendered DDL per database-bound token, in execution order.
    pub statements: Vec<TokenStatements>,
    /// Number of model-bound tokens applied.
    pub model_changes: usize,
    /// Tokens that failed.
    pub validation: ValidationResult,
}

impl ExecutionReport {
    /// Every rendered statement, flattened.
    #[must_use]
    pub fn sql(&self) -> Vec<&str> {
        self.statements
            .iter()
            .flat_map(|t| t.statements.iter().map(String::as_str))
            .collect()
    }

    /// Returns true when no token failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.validation.is_empty()
    }
}

/// Applies sorted token batches.
pub struct TokenExecutor<'a> {
    dialect: &'a dyn MergeDialect,
}

impl<'a> TokenExecutor<'a> {
    /// Creates an executor rendering DDL with `dialect`.
    #[must_use]
    pub fn new(dialect: &'a dyn MergeDialect) -> Self {
        Self { dialect }
    }

    /// Sorts and executes `tokens`.
    ///
    /// Model-bound tokens mutate `model`; database-bound tokens are rendered.
    /// Failures never abort the batch.
    pub fn execute(&self, tokens: Vec<MergeToken>, model: &mut SchemaModel) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for token in sort_tokens(tokens) {
            debug!(token = %token, priority = token.priority(), "Executing token");
            if token.is_to_db() {
                match self.dialect.render_ddl(&token) {
                    Ok(statements) => report.statements.push(TokenStatements { token, statements }),
                    Err(e) => {
                        warn!(token = %token, error = %e, "Token could not be rendered");
                        report.validation.add_failure(token, e.to_string());
                    }
                }
            } else {
                match apply_to_model(&token.change, model) {
                    Ok(()) => {
                        model.compile();
                        report.model_changes += 1;
                    }
                    Err(e) => {
                        warn!(token = %token, error = %e, "Token could not be applied to model");
                        report.validation.add_failure(token, e.to_string());
                    }
                }
            }
        }

        info!(
            statements = report.statements.len(),
            model_changes = report.model_changes,
            failures = report.validation.len(),
            dialect = self.dialect.name(),
            "Token batch executed"
        );
        report
    }
}

fn missing_table(name: &str) -> SyncError {
    SyncError::invalid_state(format!("Table '{}' does not exist", name))
}

fn missing_column(table: &str, column: &str) -> SyncError {
    SyncError::invalid_state(format!(
        "Column '{}' does not exist in table '{}'",
        column, table
    ))
}

/// Applies a single change to the model.
///
/// The model is left untouched when an error is returned.
pub fn apply_to_model(change: &MergeChange, model: &mut SchemaModel) -> Result<()> {
    match change {
        MergeChange::AddTable { table } => model.add_table(table.clone()),

        MergeChange::DropTable { table } => model.remove_table(&table.name).map(|_| ()),

        MergeChange::AddColumn { table, column } => {
            let t = model.find_table_mut(table).ok_or_else(|| missing_table(table))?;
            if t.find_column(&column.name).is_some() {
                return Err(SyncError::invalid_state(format!(
                    "Column '{}' already exists in table '{}'",
                    column.name, table
                )));
            }
            if column.primary_key {
                t.primary_key.push(column.name.clone());
            }
            t.columns.push(column.clone());
            Ok(())
        }

        MergeChange::DropColumn { table, column } => {
            let t = model.find_table_mut(table).ok_or_else(|| missing_table(table))?;
            let idx = t
                .columns
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(&column.name))
                .ok_or_else(|| missing_column(table, &column.name))?;
            t.columns.remove(idx);
            t.primary_key.retain(|pk| !pk.eq_ignore_ascii_case(&column.name));
            Ok(())
        }

        MergeChange::AddJoin { join, .. } => {
            for entity in &join.entities {
                if model.find_table(entity).is_none() {
                    return Err(missing_table(entity));
                }
            }
            let key = signature(join);
            if model.joins.iter().any(|j| signature(j) == key) {
                return Err(SyncError::invalid_state(format!(
                    "Join '{}' already exists",
                    join
                )));
            }
            model.add_join(join.clone());
            Ok(())
        }

        MergeChange::DropJoin { join, .. } => model
            .remove_join(join)
            .map(|_| ())
            .ok_or_else(|| SyncError::invalid_state(format!("Join '{}' does not exist", join))),

        MergeChange::SetPrimaryKey { table, to, .. } => {
            let t = model.find_table_mut(table).ok_or_else(|| missing_table(table))?;
            if let Some(missing) = to.iter().find(|c| t.find_column(c).is_none()) {
                return Err(missing_column(table, missing));
            }
            t.set_primary_key(to.clone());
            Ok(())
        }

        MergeChange::SetColumnType {
            table, column, to, ..
        } => {
            let t = model.find_table_mut(table).ok_or_else(|| missing_table(table))?;
            let c = t
                .find_column_mut(column)
                .ok_or_else(|| missing_column(table, column))?;
            c.sql_type = to.clone();
            Ok(())
        }

        MergeChange::SetNotNull { table, column } | MergeChange::SetAllowNull { table, column } => {
            let nullable = matches!(change, MergeChange::SetAllowNull { .. });
            let t = model.find_table_mut(table).ok_or_else(|| missing_table(table))?;
            let c = t
                .find_column_mut(column)
                .ok_or_else(|| missing_column(table, column))?;
            if nullable && c.primary_key {
                return Err(SyncError::invalid_state(format!(
                    "Primary key column '{}.{}' cannot allow NULL",
                    table, column
                )));
            }
            c.nullable = nullable;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{PostgresDialect, SqliteDialect};
    use crate::factory::TokenFactory;
    use crate::join::{Join, ToDependentPkSemantics, ToManySemantics};
    use crate::schema::{ColumnSchema, SqlType, TableSchema};
    use crate::token::{MergeDirection, TokenKind};

    fn artist() -> TableSchema {
        TableSchema::new("ARTIST")
            .column(ColumnSchema::new("ID", SqlType::BigInt).primary_key())
            .column(ColumnSchema::new("NAME", SqlType::Varchar(100)))
    }

    fn painting() -> TableSchema {
        TableSchema::new("PAINTING")
            .column(ColumnSchema::new("ID", SqlType::BigInt).primary_key())
            .column(ColumnSchema::new("ARTIST_ID", SqlType::BigInt))
    }

    fn artist_join() -> Join {
        Join::builder()
            .left("ARTIST")
            .right("PAINTING")
            .to_many(ToManySemantics::OneToMany)
            .to_dependent_pk(ToDependentPkSemantics::None)
            .pair("ID", "ARTIST_ID")
            .build()
            .unwrap()
    }

    fn model() -> SchemaModel {
        SchemaModel::new().table(artist()).table(painting())
    }

    #[test]
    fn test_sort_is_stable_and_idempotent() {
        let db = TokenFactory::to_db();
        let tokens = vec![
            db.add_column("ARTIST", &ColumnSchema::new("A", SqlType::Text)),
            db.drop_table(&TableSchema::new("OLD")),
            db.add_column("ARTIST", &ColumnSchema::new("B", SqlType::Text)),
            db.drop_column("ARTIST", &ColumnSchema::new("C", SqlType::Text)),
            db.add_table(&TableSchema::new("NEW")),
            db.add_column("ARTIST", &ColumnSchema::new("D", SqlType::Text)),
        ];

        let sorted = sort_tokens(tokens);
        let kinds: Vec<TokenKind> = sorted.iter().map(MergeToken::kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::DropColumn,
                TokenKind::DropTable,
                TokenKind::AddTable,
                TokenKind::AddColumn,
                TokenKind::AddColumn,
                TokenKind::AddColumn,
            ]
        );
        let added: Vec<&str> = sorted
            .iter()
            .filter_map(|t| match &t.change {
                MergeChange::AddColumn { column, .. } => Some(column.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(added, vec!["A", "B", "D"]);
        assert_eq!(sort_tokens(sorted.clone()), sorted);
    }

    #[test]
    fn test_execute_renders_db_tokens() {
        let dialect = SqliteDialect::new();
        let mut model = model();
        let tokens = vec![
            TokenFactory::to_db().add_column("ARTIST", &ColumnSchema::new("BIO", SqlType::Text)),
            TokenFactory::to_db().drop_table(&TableSchema::new("LEGACY")),
        ];

        let report = TokenExecutor::new(&dialect).execute(tokens, &mut model);
        assert!(report.is_success());
        assert_eq!(
            report.sql(),
            vec![
                "DROP TABLE \"LEGACY\"",
                "ALTER TABLE \"ARTIST\" ADD COLUMN \"BIO\" TEXT"
            ]
        );
        assert_eq!(report.model_changes, 0);
    }

    #[test]
    fn test_unsupported_token_does_not_abort_batch() {
        let dialect = SqliteDialect::new();
        let mut model = model().join(artist_join());
        let tokens = vec![
            TokenFactory::to_db().add_join(&artist_join(), &model).unwrap(),
            TokenFactory::to_db().add_column("ARTIST", &ColumnSchema::new("BIO", SqlType::Text)),
        ];

        let report = TokenExecutor::new(&dialect).execute(tokens, &mut model);
        assert_eq!(report.validation.len(), 1);
        assert_eq!(report.validation.failures()[0].token.kind(), TokenKind::AddJoin);
        assert_eq!(report.statements.len(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_execute_model_tokens_recompiles() {
        let dialect = PostgresDialect::new();
        let mut model = model();
        let tokens = vec![
            TokenFactory::to_model().add_join(&artist_join(), &model).unwrap(),
            TokenFactory::to_model().set_nullability("ARTIST", "NAME", false),
            TokenFactory::to_model().add_table(&TableSchema::new("GALLERY")),
        ];

        let report = TokenExecutor::new(&dialect).execute(tokens, &mut model);
        assert!(report.is_success());
        assert_eq!(report.model_changes, 3);
        assert!(report.statements.is_empty());
        assert_eq!(model.relationships().len(), 2);
        assert!(!model.find_table("ARTIST").unwrap().find_column("NAME").unwrap().nullable);
        assert!(model.find_table("GALLERY").is_some());
    }

    #[test]
    fn test_model_failures_are_recorded() {
        let dialect = SqliteDialect::new();
        let mut model = model();
        let tokens = vec![
            TokenFactory::to_model().drop_table(&TableSchema::new("MISSING")),
            TokenFactory::to_model().add_table(&artist()),
            TokenFactory::to_model().set_nullability("ARTIST", "ID", true),
            TokenFactory::to_model()
                .drop_column("ARTIST", &ColumnSchema::new("NAME", SqlType::Text)),
        ];

        let report = TokenExecutor::new(&dialect).execute(tokens, &mut model);
        assert_eq!(report.validation.len(), 3);
        assert_eq!(report.model_changes, 1);
        assert!(model.find_table("ARTIST").unwrap().find_column("NAME").is_none());
    }

    #[test]
    fn test_reversed_db_token_undoes_model_change() {
        let mut model = model().join(artist_join());
        let add = TokenFactory::to_db().add_join(&artist_join(), &model).unwrap();
        let undo = add.reverse();
        assert_eq!(undo.direction, MergeDirection::ToModel);

        apply_to_model(&undo.change, &mut model).unwrap();
        assert!(model.joins.is_empty());
        assert!(apply_to_model(&undo.change, &mut model).is_err());
    }

    #[test]
    fn test_set_primary_key_on_model() {
        let mut model = model();
        let token = TokenFactory::to_model().set_primary_key(
            "PAINTING",
            &["ID".to_string()],
            &["ID".to_string(), "ARTIST_ID".to_string()],
        );
        apply_to_model(&token.change, &mut model).unwrap();
        let painting = model.find_table("PAINTING").unwrap();
        assert_eq!(painting.primary_key, vec!["ID", "ARTIST_ID"]);
        assert!(painting.find_column("ARTIST_ID").unwrap().primary_key);

        let bad = TokenFactory::to_model().set_primary_key("PAINTING", &[], &["NOPE".to_string()]);
        assert!(matches!(
            apply_to_model(&bad.change, &mut model),
            Err(SyncError::InvalidState(_))
        ));
    }
}
