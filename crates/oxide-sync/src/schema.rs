//! Schema model types.
//!
//! A [`SchemaModel`] owns tables and the joins between them. Directional
//! [`Relationship`] projections are derived from the joins by
//! [`SchemaModel::compile`] and are never edited directly.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::join::{Join, JoinSide};
use crate::signature::signature;

/// SQL data types understood by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Small integer (16-bit).
    SmallInt,
    /// Boolean.
    Boolean,
    /// Unbounded text.
    Text,
    /// Variable-length character string.
    Varchar(usize),
    /// Fixed-length character string.
    Char(usize),
    /// Decimal with precision and scale.
    Decimal(u8, u8),
    /// Single precision float.
    Real,
    /// Double precision float.
    Double,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Date and time.
    Timestamp,
    /// Binary large object.
    Blob,
    /// A declared type the engine has no mapping for, kept verbatim.
    Other(String),
}

impl SqlType {
    /// Maps a declared column type (as reported by a live database) to a
    /// [`SqlType`].
    #[must_use]
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        let (base, args) = match upper.find('(') {
            Some(open) => {
                let args = upper[open + 1..].trim_end_matches(')').to_string();
                (upper[..open].trim().to_string(), Some(args))
            }
            None => (upper.clone(), None),
        };
        let numbers: Vec<usize> = args
            .as_deref()
            .map(|a| a.split(',').filter_map(|n| n.trim().parse().ok()).collect())
            .unwrap_or_default();

        match base.as_str() {
            "INT" | "INTEGER" | "INT4" | "MEDIUMINT" => Self::Integer,
            "BIGINT" | "INT8" => Self::BigInt,
            "SMALLINT" | "INT2" | "TINYINT" => Self::SmallInt,
            "BOOL" | "BOOLEAN" => Self::Boolean,
            "TEXT" | "CLOB" => Self::Text,
            "VARCHAR" | "CHARACTER VARYING" | "NVARCHAR" => match numbers.first() {
                Some(len) => Self::Varchar(*len),
                None => Self::Text,
            },
            "CHAR" | "CHARACTER" | "NCHAR" => Self::Char(numbers.first().copied().unwrap_or(1)),
            "DECIMAL" | "NUMERIC" => {
                let precision = numbers.first().copied().unwrap_or(10);
                let scale = numbers.get(1).copied().unwrap_or(0);
                Self::Decimal(
                    u8::try_from(precision).unwrap_or(u8::MAX),
                    u8::try_from(scale).unwrap_or(u8::MAX),
                )
            }
            "REAL" | "FLOAT" | "FLOAT4" => Self::Real,
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => Self::Double,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "TIMESTAMP" | "DATETIME" => Self::Timestamp,
            "BLOB" | "BYTEA" => Self::Blob,
            _ => Self::Other(upper),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("INTEGER"),
            Self::BigInt => f.write_str("BIGINT"),
            Self::SmallInt => f.write_str("SMALLINT"),
            Self::Boolean => f.write_str("BOOLEAN"),
            Self::Text => f.write_str("TEXT"),
            Self::Varchar(len) => write!(f, "VARCHAR({})", len),
            Self::Char(len) => write!(f, "CHAR({})", len),
            Self::Decimal(p, s) => write!(f, "DECIMAL({}, {})", p, s),
            Self::Real => f.write_str("REAL"),
            Self::Double => f.write_str("DOUBLE"),
            Self::Date => f.write_str("DATE"),
            Self::Time => f.write_str("TIME"),
            Self::Timestamp => f.write_str("TIMESTAMP"),
            Self::Blob => f.write_str("BLOB"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// SQL data type.
    pub sql_type: SqlType,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Whether this column is part of the primary key.
    pub primary_key: bool,
}

impl ColumnSchema {
    /// Creates a nullable, non-key column.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            primary_key: false,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column as part of the primary key (implies NOT NULL).
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// A table: columns plus an ordered primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Catalog, if the source database has one.
    #[serde(default)]
    pub catalog: Option<String>,
    /// Schema, if the source database has one.
    #[serde(default)]
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
    /// Column definitions.
    pub columns: Vec<ColumnSchema>,
    /// Primary key column(s), in key order.
    #[serde(default)]
    pub primary_key: Vec<String>,
}

impl TableSchema {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Sets catalog and schema.
    #[must_use]
    pub fn in_schema(mut self, catalog: Option<&str>, schema: Option<&str>) -> Self {
        self.catalog = catalog.map(str::to_string);
        self.schema = schema.map(str::to_string);
        self
    }

    /// Adds a column, recording it in the primary key when flagged.
    #[must_use]
    pub fn column(mut self, column: ColumnSchema) -> Self {
        if column.primary_key && !self.primary_key.contains(&column.name) {
            self.primary_key.push(column.name.clone());
        }
        self.columns.push(column);
        self
    }

    /// Finds a column by name, ignoring case.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Mutable variant of [`TableSchema::find_column`].
    pub fn find_column_mut(&mut self, name: &str) -> Option<&mut ColumnSchema> {
        self.columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns true when `column` belongs to the primary key.
    #[must_use]
    pub fn is_primary_key_column(&self, column: &str) -> bool {
        self.primary_key
            .iter()
            .any(|pk| pk.eq_ignore_ascii_case(column))
    }

    /// Replaces the primary key, keeping the per-column flags in sync.
    pub fn set_primary_key(&mut self, columns: Vec<String>) {
        for column in &mut self.columns {
            column.primary_key = columns.iter().any(|pk| pk.eq_ignore_ascii_case(&column.name));
            if column.primary_key {
                column.nullable = false;
            }
        }
        self.primary_key = columns;
    }
}

/// A directional view of a join, compiled from the owning model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Index of the join in [`SchemaModel::joins`].
    pub join: usize,
    /// Side of the join this relationship starts from.
    pub side: JoinSide,
    /// Relationship name.
    pub name: String,
    /// Source table.
    pub source: String,
    /// Target table.
    pub target: String,
    /// Whether the relationship is to-many.
    pub to_many: bool,
    /// Whether the target is a dependent primary key.
    pub to_dependent_pk: bool,
    /// `(source_column, target_column)` pairs.
    pub pairs: Vec<(String, String)>,
}

/// Callback invoked after joins are added to or removed from a model.
pub trait ModelObserver: Send + Sync {
    /// A join was added.
    fn join_added(&self, _join: &Join) {}

    /// A join was removed.
    fn join_removed(&self, _join: &Join) {}
}

/// A complete schema: tables and joins, with derived relationship views.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SchemaModel {
    /// All tables.
    pub tables: Vec<TableSchema>,
    /// All joins.
    #[serde(default)]
    pub joins: Vec<Join>,
    #[serde(skip)]
    relationships: Vec<Relationship>,
    #[serde(skip)]
    table_joins: BTreeMap<String, Vec<usize>>,
    #[serde(skip)]
    observer: Option<Arc<dyn ModelObserver>>,
}

impl fmt::Debug for SchemaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaModel")
            .field("tables", &self.tables)
            .field("joins", &self.joins)
            .field("relationships", &self.relationships.len())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl SchemaModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table (builder style).
    #[must_use]
    pub fn table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    /// Adds a join and recompiles (builder style).
    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self.compile();
        self
    }

    /// Parses a model from JSON and compiles it.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut model: Self = serde_json::from_str(json)?;
        model.compile();
        Ok(model)
    }

    /// Loads a model from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| SyncError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Writes the model to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Installs a change observer.
    pub fn set_observer(&mut self, observer: Arc<dyn ModelObserver>) {
        self.observer = Some(observer);
    }

    /// Finds a table by name, ignoring case.
    #[must_use]
    pub fn find_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Mutable variant of [`SchemaModel::find_table`].
    pub fn find_table_mut(&mut self, name: &str) -> Option<&mut TableSchema> {
        self.tables
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Adds a table.
    pub fn add_table(&mut self, table: TableSchema) -> Result<()> {
        if self.find_table(&table.name).is_some() {
            return Err(SyncError::invalid_state(format!(
                "Table '{}' already exists",
                table.name
            )));
        }
        self.tables.push(table);
        Ok(())
    }

    /// Removes a table and every join touching it.
    pub fn remove_table(&mut self, name: &str) -> Result<TableSchema> {
        let idx = self
            .tables
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| SyncError::invalid_state(format!("Table '{}' does not exist", name)))?;
        let table = self.tables.remove(idx);

        let (removed, kept): (Vec<Join>, Vec<Join>) = std::mem::take(&mut self.joins)
            .into_iter()
            .partition(|j| j.touches(name));
        self.joins = kept;
        for join in &removed {
            self.notify_removed(join);
        }
        self.compile();
        Ok(table)
    }

    /// Adds a join, notifies the observer and recompiles.
    pub fn add_join(&mut self, join: Join) {
        if let Some(observer) = &self.observer {
            observer.join_added(&join);
        }
        self.joins.push(join);
        self.compile();
    }

    /// Removes the join matching `join` and recompiles.
    ///
    /// An exactly equal join is preferred; otherwise the first join with the
    /// same signature is removed.
    pub fn remove_join(&mut self, join: &Join) -> Option<Join> {
        let idx = self.joins.iter().position(|j| j == join).or_else(|| {
            let key = signature(join);
            self.joins.iter().position(|j| signature(j) == key)
        })?;
        let removed = self.joins.remove(idx);
        self.notify_removed(&removed);
        self.compile();
        Some(removed)
    }

    fn notify_removed(&self, join: &Join) {
        if let Some(observer) = &self.observer {
            observer.join_removed(join);
        }
    }

    /// Rebuilds relationship projections and the table → join index.
    ///
    /// Missing endpoint names are synthesized here, unique per source table.
    pub fn compile(&mut self) {
        self.relationships.clear();
        self.table_joins.clear();

        let mut used: HashSet<(String, String)> = HashSet::new();
        for join in &self.joins {
            for side in JoinSide::BOTH {
                if let Some(name) = join.name(side) {
                    used.insert((join.entity(side).to_ascii_uppercase(), name.to_string()));
                }
            }
        }

        for (idx, join) in self.joins.iter_mut().enumerate() {
            for side in JoinSide::BOTH {
                if join.name(side).is_some() {
                    continue;
                }
                let source = join.entity(side).to_ascii_uppercase();
                let base = format!("to_{}", join.entity(side.opposite()).to_ascii_lowercase());
                let mut candidate = base.clone();
                let mut n = 1;
                while used.contains(&(source.clone(), candidate.clone())) {
                    candidate = format!("{}{}", base, n);
                    n += 1;
                }
                used.insert((source, candidate.clone()));
                join.set_synthesized_name(side, candidate);
            }

            for side in JoinSide::BOTH {
                let target = side.opposite();
                self.relationships.push(Relationship {
                    join: idx,
                    side,
                    name: join.name(side).unwrap_or_default().to_string(),
                    source: join.entity(side).to_string(),
                    target: join.entity(target).to_string(),
                    to_many: join.is_to_many(side),
                    to_dependent_pk: join.is_to_dependent_pk(side),
                    pairs: join
                        .condition
                        .pairs()
                        .iter()
                        .map(|p| (p.column(side).to_string(), p.column(target).to_string()))
                        .collect(),
                });
            }

            let left = join.entities[0].to_ascii_uppercase();
            let right = join.entities[1].to_ascii_uppercase();
            self.table_joins.entry(left.clone()).or_default().push(idx);
            if right != left {
                self.table_joins.entry(right).or_default().push(idx);
            }
        }

        debug!(
            joins = self.joins.len(),
            relationships = self.relationships.len(),
            "Compiled schema model"
        );
    }

    /// All compiled relationships.
    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Relationships whose source is `table`.
    pub fn relationships_from<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships
            .iter()
            .filter(move |r| r.source.eq_ignore_ascii_case(table))
    }

    /// Joins touching `table`, through the compiled index.
    #[must_use]
    pub fn joins_for_table(&self, table: &str) -> Vec<&Join> {
        self.table_joins
            .get(&table.to_ascii_uppercase())
            .map(|indices| indices.iter().filter_map(|&i| self.joins.get(i)).collect())
            .unwrap_or_default()
    }

    /// Checks that every join endpoint resolves to a table of this model.
    pub fn validate_joins(&self) -> Result<()> {
        for join in &self.joins {
            for side in JoinSide::BOTH {
                if self.find_table(join.entity(side)).is_none() {
                    return Err(SyncError::DanglingJoin {
                        join: join.to_string(),
                        table: join.entity(side).to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
