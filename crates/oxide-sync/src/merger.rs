//! Schema merger.
//!
//! Compares a tracked ("original") model against an imported one, usually
//! introspected from a live database, and plans the database-bound tokens
//! that bring the database in line with the model.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::diff::diff;
use crate::dictionary::{ColumnDictionary, JoinDictionary, TableDictionary};
use crate::error::Result;
use crate::executor::sort_tokens;
use crate::factory::TokenFactory;
use crate::filter::InclusionFilter;
use crate::schema::{SchemaModel, TableSchema};
use crate::token::MergeToken;

/// Options for the merger.
#[derive(Clone, Default)]
pub struct MergerOptions {
    /// Do not emit tokens that add joins.
    pub skip_join_tokens: bool,
    /// Do not emit primary key tokens.
    pub skip_pk_tokens: bool,
    /// Restricts which tables and columns are compared.
    pub filter: Option<Arc<dyn InclusionFilter>>,
}

impl fmt::Debug for MergerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergerOptions")
            .field("skip_join_tokens", &self.skip_join_tokens)
            .field("skip_pk_tokens", &self.skip_pk_tokens)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl MergerOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses join tokens.
    #[must_use]
    pub fn skip_join_tokens(mut self, skip: bool) -> Self {
        self.skip_join_tokens = skip;
        self
    }

    /// Suppresses primary key tokens.
    #[must_use]
    pub fn skip_pk_tokens(mut self, skip: bool) -> Self {
        self.skip_pk_tokens = skip;
        self
    }

    /// Sets the inclusion filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn InclusionFilter>) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// The planned tokens of one merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergePlan {
    /// Tokens, sorted by priority.
    pub tokens: Vec<MergeToken>,
    /// Dictionary keys held by several entries on one side.
    pub ambiguous: Vec<String>,
}

impl MergePlan {
    /// Returns true when the models are in sync.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The plan with every token reversed, re-sorted.
    ///
    /// Reversing a database plan yields the model-bound tokens that bring
    /// the tracked model in line with the database instead.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            tokens: sort_tokens(self.tokens.iter().map(MergeToken::reverse).collect()),
            ambiguous: self.ambiguous.clone(),
        }
    }
}

/// Plans merge tokens between two models.
#[derive(Debug, Default)]
pub struct SchemaMerger {
    options: MergerOptions,
    factory: TokenFactory,
}

impl SchemaMerger {
    /// Creates a merger with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a merger with custom options.
    #[must_use]
    pub fn with_options(options: MergerOptions) -> Self {
        Self {
            options,
            factory: TokenFactory::to_db(),
        }
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &MergerOptions {
        &self.options
    }

    /// Plans the database-bound tokens that make `imported` match `original`.
    ///
    /// Both models must be referentially complete; a join pointing at a
    /// missing table fails the whole pass.
    pub fn plan(&self, original: &SchemaModel, imported: &SchemaModel) -> Result<MergePlan> {
        original.validate_joins()?;
        imported.validate_joins()?;

        let filter = self.options.filter.as_deref();
        let mut plan = MergePlan::default();
        let mut tokens = Vec::new();

        let tables = diff(
            &TableDictionary::new(original).with_filter(filter),
            &TableDictionary::new(imported).with_filter(filter),
        );
        debug!(summary = %tables.summary(), "Table diff");
        plan.ambiguous.extend(tables.ambiguous.iter().map(|k| format!("table {}", k)));

        for table in &tables.only_original {
            tokens.push(self.factory.add_table(table));
        }
        for table in &tables.only_imported {
            tokens.push(self.factory.drop_table(table));
        }
        for (original_table, imported_table) in &tables.both {
            self.plan_table(
                original_table,
                imported_table,
                filter,
                &mut tokens,
                &mut plan.ambiguous,
            );
        }

        let joins = diff(
            &JoinDictionary::new(original).with_filter(filter),
            &JoinDictionary::new(imported).with_filter(filter),
        );
        debug!(summary = %joins.summary(), "Join diff");
        plan.ambiguous.extend(joins.ambiguous.iter().map(|k| format!("join {}", k)));

        for join in &joins.only_imported {
            tokens.push(self.factory.drop_join(join, imported, original)?);
        }
        if !self.options.skip_join_tokens {
            for join in &joins.only_original {
                tokens.push(self.factory.add_join(join, original)?);
            }
        }

        plan.tokens = sort_tokens(tokens);
        info!(
            tokens = plan.tokens.len(),
            ambiguous = plan.ambiguous.len(),
            "Merge plan ready"
        );
        Ok(plan)
    }

    fn plan_table(
        &self,
        original: &TableSchema,
        imported: &TableSchema,
        filter: Option<&dyn InclusionFilter>,
        tokens: &mut Vec<MergeToken>,
        ambiguous: &mut Vec<String>,
    ) {
        let columns = diff(
            &ColumnDictionary::new(original, filter),
            &ColumnDictionary::new(imported, filter),
        );
        ambiguous.extend(
            columns
                .ambiguous
                .iter()
                .map(|k| format!("column {}.{}", original.name, k)),
        );

        for column in &columns.only_original {
            tokens.push(self.factory.add_column(&original.name, column));
        }
        for column in &columns.only_imported {
            tokens.push(self.factory.drop_column(&original.name, column));
        }
        for (wanted, actual) in &columns.both {
            if wanted.sql_type != actual.sql_type {
                tokens.push(self.factory.set_column_type(
                    &original.name,
                    &wanted.name,
                    &actual.sql_type,
                    &wanted.sql_type,
                ));
            }
            if wanted.nullable != actual.nullable {
                tokens.push(
                    self.factory
                        .set_nullability(&original.name, &wanted.name, wanted.nullable),
                );
            }
        }

        if !self.options.skip_pk_tokens && !same_key(&original.primary_key, &imported.primary_key) {
            tokens.push(self.factory.set_primary_key(
                &original.name,
                &imported.primary_key,
                &original.primary_key,
            ));
        }
    }
}

fn same_key(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::filter::FilterConfig;
    use crate::join::{Join, JoinSide, ToDependentPkSemantics, ToManySemantics};
    use crate::schema::{ColumnSchema, SqlType};
    use crate::token::{MergeChange, MergeDirection, TokenKind};

    fn artist() -> TableSchema {
        TableSchema::new("ARTIST")
            .column(ColumnSchema::new("ID", SqlType::BigInt).primary_key())
            .column(ColumnSchema::new("NAME", SqlType::Varchar(100)).not_null())
    }

    fn painting() -> TableSchema {
        TableSchema::new("PAINTING")
            .column(ColumnSchema::new("ID", SqlType::BigInt).primary_key())
            .column(ColumnSchema::new("ARTIST_ID", SqlType::BigInt))
    }

    fn forward_join() -> Join {
        Join::builder()
            .left("ARTIST")
            .right("PAINTING")
            .to_many(ToManySemantics::OneToMany)
            .to_dependent_pk(ToDependentPkSemantics::None)
            .pair("ID", "ARTIST_ID")
            .build()
            .unwrap()
    }

    fn reverse_join() -> Join {
        Join::builder()
            .left("PAINTING")
            .right("ARTIST")
            .to_many(ToManySemantics::ManyToOne)
            .to_dependent_pk(ToDependentPkSemantics::None)
            .pair("ARTIST_ID", "ID")
            .build()
            .unwrap()
    }

    fn kinds(plan: &MergePlan) -> Vec<TokenKind> {
        plan.tokens.iter().map(MergeToken::kind).collect()
    }

    #[test]
    fn test_identical_join_declared_in_reverse() {
        let original = SchemaModel::new().table(artist()).table(painting()).join(forward_join());
        let imported = SchemaModel::new().table(artist()).table(painting()).join(reverse_join());

        let plan = SchemaMerger::new().plan(&original, &imported).unwrap();
        assert!(plan.is_empty(), "unexpected tokens: {:?}", plan.tokens);
    }

    #[test]
    fn test_table_level_tokens() {
        let original = SchemaModel::new().table(artist()).table(painting());
        let imported = SchemaModel::new()
            .table(
                TableSchema::new("artist")
                    .column(ColumnSchema::new("id", SqlType::BigInt).primary_key())
                    .column(ColumnSchema::new("name", SqlType::Text))
                    .column(ColumnSchema::new("legacy", SqlType::Text)),
            )
            .table(TableSchema::new("audit"));

        let plan = SchemaMerger::new().plan(&original, &imported).unwrap();
        assert_eq!(
            kinds(&plan),
            vec![
                TokenKind::DropColumn,
                TokenKind::DropTable,
                TokenKind::AddTable,
                TokenKind::SetColumnType,
                TokenKind::SetNotNull,
            ]
        );
        assert!(plan.tokens.iter().all(|t| t.direction == MergeDirection::ToDb));
        match &plan.tokens[3].change {
            MergeChange::SetColumnType { column, from, to, .. } => {
                assert_eq!(column, "NAME");
                assert_eq!(*from, SqlType::Text);
                assert_eq!(*to, SqlType::Varchar(100));
            }
            other => panic!("Expected SetColumnType, got {:?}", other),
        }
    }

    #[test]
    fn test_join_tokens() {
        let original = SchemaModel::new().table(artist()).table(painting()).join(forward_join());
        let imported = SchemaModel::new().table(artist()).table(painting());

        let plan = SchemaMerger::new().plan(&original, &imported).unwrap();
        assert_eq!(kinds(&plan), vec![TokenKind::AddJoin]);
        match &plan.tokens[0].change {
            MergeChange::AddJoin { referencing, .. } => assert_eq!(*referencing, JoinSide::Right),
            other => panic!("Expected AddJoin, got {:?}", other),
        }

        let skipped = SchemaMerger::with_options(MergerOptions::new().skip_join_tokens(true))
            .plan(&original, &imported)
            .unwrap();
        assert!(skipped.is_empty());

        // drops are never suppressed
        let plan = SchemaMerger::with_options(MergerOptions::new().skip_join_tokens(true))
            .plan(&imported, &original)
            .unwrap();
        assert_eq!(kinds(&plan), vec![TokenKind::DropJoin]);
    }

    #[test]
    fn test_primary_key_tokens() {
        let original = SchemaModel::new().table(artist());
        let mut changed = artist();
        changed.set_primary_key(vec!["ID".to_string(), "NAME".to_string()]);
        let imported = SchemaModel::new().table(changed);

        let plan = SchemaMerger::new().plan(&original, &imported).unwrap();
        assert_eq!(kinds(&plan), vec![TokenKind::SetPrimaryKey]);

        let plan = SchemaMerger::with_options(MergerOptions::new().skip_pk_tokens(true))
            .plan(&original, &imported)
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_filter_limits_scope() {
        let original = SchemaModel::new().table(artist());
        let imported = SchemaModel::new()
            .table(artist())
            .table(TableSchema::new("SQLITE_SEQUENCE"));
        let filter = FilterConfig {
            exclude_tables: vec!["sqlite_.*".to_string()],
            ..FilterConfig::default()
        }
        .build()
        .unwrap();

        let plan = SchemaMerger::with_options(MergerOptions::new().with_filter(Arc::new(filter)))
            .plan(&original, &imported)
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_dangling_join_fails_the_pass() {
        let original = SchemaModel::new().table(artist()).join(forward_join());
        let imported = SchemaModel::new().table(artist());
        assert!(matches!(
            SchemaMerger::new().plan(&original, &imported),
            Err(SyncError::DanglingJoin { .. })
        ));
    }

    #[test]
    fn test_reversed_plan_targets_model() {
        let original = SchemaModel::new().table(artist()).table(painting());
        let imported = SchemaModel::new().table(artist());

        let plan = SchemaMerger::new().plan(&original, &imported).unwrap();
        let reversed = plan.reversed();
        assert_eq!(kinds(&reversed), vec![TokenKind::DropTable]);
        assert_eq!(reversed.tokens[0].direction, MergeDirection::ToModel);
        assert_eq!(reversed.reversed(), plan);
    }
}
