//! Named-entity dictionaries.
//!
//! A dictionary exposes the entries of one entity kind of a model together
//! with the key used to match them across models. Tables and columns are
//! keyed by upper-cased name, joins by their signature.

use crate::filter::{InclusionFilter, PatternFilter};
use crate::join::{Join, JoinSide};
use crate::schema::{ColumnSchema, SchemaModel, TableSchema};
use crate::signature::signature;

/// A collection of named entries of a single kind.
pub trait Dictionary {
    /// Entry type.
    type Entry: Clone;

    /// Every entry in scope.
    fn all_entries(&self) -> Vec<Self::Entry>;

    /// The key of an entry.
    fn name(&self, entry: &Self::Entry) -> String;
}

/// Tables of a model.
#[derive(Clone, Copy)]
pub struct TableDictionary<'a> {
    model: &'a SchemaModel,
    filter: Option<&'a dyn InclusionFilter>,
}

impl<'a> TableDictionary<'a> {
    /// Creates a dictionary over every table of `model`.
    #[must_use]
    pub fn new(model: &'a SchemaModel) -> Self {
        Self { model, filter: None }
    }

    /// Restricts the dictionary with an inclusion filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<&'a dyn InclusionFilter>) -> Self {
        self.filter = filter;
        self
    }
}

impl<'a> Dictionary for TableDictionary<'a> {
    type Entry = &'a TableSchema;

    fn all_entries(&self) -> Vec<Self::Entry> {
        self.model
            .tables
            .iter()
            .filter(|t| match self.filter {
                Some(filter) => {
                    filter.is_table_included(t.catalog.as_deref(), t.schema.as_deref(), &t.name)
                }
                None => true,
            })
            .collect()
    }

    fn name(&self, entry: &Self::Entry) -> String {
        entry.name.to_ascii_uppercase()
    }
}

/// Columns of one table.
#[derive(Clone)]
pub struct ColumnDictionary<'a> {
    table: &'a TableSchema,
    filter: PatternFilter,
}

impl<'a> ColumnDictionary<'a> {
    /// Creates a dictionary over the columns of `table`, filtered by the
    /// column filter of `filter` when given.
    #[must_use]
    pub fn new(table: &'a TableSchema, filter: Option<&dyn InclusionFilter>) -> Self {
        let filter = filter
            .map(|f| f.column_filter(&table.name))
            .unwrap_or_default();
        Self { table, filter }
    }
}

impl<'a> Dictionary for ColumnDictionary<'a> {
    type Entry = &'a ColumnSchema;

    fn all_entries(&self) -> Vec<Self::Entry> {
        self.table
            .columns
            .iter()
            .filter(|c| self.filter.is_included(&c.name))
            .collect()
    }

    fn name(&self, entry: &Self::Entry) -> String {
        entry.name.to_ascii_uppercase()
    }
}

/// Joins of a model.
#[derive(Clone, Copy)]
pub struct JoinDictionary<'a> {
    model: &'a SchemaModel,
    filter: Option<&'a dyn InclusionFilter>,
}

impl<'a> JoinDictionary<'a> {
    /// Creates a dictionary over every join of `model`.
    #[must_use]
    pub fn new(model: &'a SchemaModel) -> Self {
        Self { model, filter: None }
    }

    /// Restricts the dictionary with an inclusion filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<&'a dyn InclusionFilter>) -> Self {
        self.filter = filter;
        self
    }

    fn is_included(&self, filter: &dyn InclusionFilter, join: &Join) -> bool {
        JoinSide::BOTH.iter().all(|&side| {
            let entity = join.entity(side);
            let table_included = match self.model.find_table(entity) {
                Some(t) => {
                    filter.is_table_included(t.catalog.as_deref(), t.schema.as_deref(), &t.name)
                }
                None => filter.is_table_included(None, None, entity),
            };
            let columns = filter.column_filter(entity);
            table_included
                && join
                    .condition
                    .pairs()
                    .iter()
                    .all(|p| columns.is_included(p.column(side)))
        })
    }
}

impl<'a> Dictionary for JoinDictionary<'a> {
    type Entry = &'a Join;

    fn all_entries(&self) -> Vec<Self::Entry> {
        match self.filter {
            Some(filter) => self
                .model
                .joins
                .iter()
                .filter(|j| self.is_included(filter, j))
                .collect(),
            None => self.model.joins.iter().collect(),
        }
    }

    fn name(&self, entry: &Self::Entry) -> String {
        signature(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterConfig;
    use crate::join::{ToDependentPkSemantics, ToManySemantics};
    use crate::schema::SqlType;

    fn model() -> SchemaModel {
        SchemaModel::new()
            .table(
                TableSchema::new("Artist")
                    .column(ColumnSchema::new("id", SqlType::BigInt).primary_key())
                    .column(ColumnSchema::new("name", SqlType::Text)),
            )
            .table(
                TableSchema::new("painting")
                    .column(ColumnSchema::new("id", SqlType::BigInt).primary_key())
                    .column(ColumnSchema::new("artist_id", SqlType::BigInt)),
            )
            .table(TableSchema::new("audit_log"))
            .join(
                Join::builder()
                    .left("Artist")
                    .right("painting")
                    .to_many(ToManySemantics::OneToMany)
                    .to_dependent_pk(ToDependentPkSemantics::None)
                    .pair("id", "artist_id")
                    .build()
                    .unwrap(),
            )
    }

    #[test]
    fn test_table_dictionary_unfiltered() {
        let model = model();
        let dict = TableDictionary::new(&model);
        let entries = dict.all_entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(dict.name(&entries[0]), "ARTIST");
    }

    #[test]
    fn test_table_dictionary_filtered() {
        let model = model();
        let filter = FilterConfig {
            exclude_tables: vec!["audit_.*".to_string()],
            ..FilterConfig::default()
        }
        .build()
        .unwrap();
        let dict = TableDictionary::new(&model).with_filter(Some(&filter));
        assert_eq!(dict.all_entries().len(), 2);
    }

    #[test]
    fn test_column_dictionary() {
        let model = model();
        let table = model.find_table("ARTIST").unwrap();
        let filter = FilterConfig {
            exclude_columns: vec!["name".to_string()],
            ..FilterConfig::default()
        }
        .build()
        .unwrap();

        assert_eq!(ColumnDictionary::new(table, None).all_entries().len(), 2);
        let dict = ColumnDictionary::new(table, Some(&filter));
        let entries = dict.all_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(dict.name(&entries[0]), "ID");
    }

    #[test]
    fn test_join_dictionary_keys_by_signature() {
        let model = model();
        let dict = JoinDictionary::new(&model);
        let entries = dict.all_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(dict.name(&entries[0]), "ARTIST.ID>PAINTING.ARTIST_ID");
    }

    #[test]
    fn test_join_dictionary_excludes_filtered_endpoints() {
        let model = model();
        let table_filter = FilterConfig {
            exclude_tables: vec!["painting".to_string()],
            ..FilterConfig::default()
        }
        .build()
        .unwrap();
        let column_filter = FilterConfig {
            exclude_columns: vec![".*_id".to_string()],
            ..FilterConfig::default()
        }
        .build()
        .unwrap();

        assert!(JoinDictionary::new(&model)
            .with_filter(Some(&table_filter))
            .all_entries()
            .is_empty());
        assert!(JoinDictionary::new(&model)
            .with_filter(Some(&column_filter))
            .all_entries()
            .is_empty());
    }
}
