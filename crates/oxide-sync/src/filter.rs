//! Inclusion filters.
//!
//! Filters decide which tables and columns take part in a comparison. They
//! are consulted by the dictionaries and by live introspection.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Decides which tables and columns are in scope.
pub trait InclusionFilter: Send + Sync {
    /// Whether a table is compared at all.
    fn is_table_included(&self, catalog: Option<&str>, schema: Option<&str>, table: &str) -> bool;

    /// The column filter for a table.
    fn column_filter(&self, table: &str) -> PatternFilter;
}

/// Include/exclude regex lists matched against a name.
///
/// Patterns are anchored and case-insensitive. An empty include list
/// includes everything; excludes always win.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl PatternFilter {
    /// A filter that includes every name.
    #[must_use]
    pub fn include_all() -> Self {
        Self::default()
    }

    /// Compiles include and exclude patterns.
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self> {
        Ok(Self {
            includes: compile_patterns(includes)?,
            excludes: compile_patterns(excludes)?,
        })
    }

    /// Whether `name` passes the filter.
    #[must_use]
    pub fn is_included(&self, name: &str) -> bool {
        let included = self.includes.is_empty() || self.includes.iter().any(|r| r.is_match(name));
        included && !self.excludes.iter().any(|r| r.is_match(name))
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i)^(?:{})$", p)).map_err(SyncError::from))
        .collect()
}

/// Filter configuration as read from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Only tables in this catalog (tables without one always pass).
    pub catalog: Option<String>,
    /// Only tables in this schema (tables without one always pass).
    pub schema: Option<String>,
    /// Table include patterns.
    pub include_tables: Vec<String>,
    /// Table exclude patterns.
    pub exclude_tables: Vec<String>,
    /// Column include patterns, applied to every table.
    pub include_columns: Vec<String>,
    /// Column exclude patterns, applied to every table.
    pub exclude_columns: Vec<String>,
}

impl FilterConfig {
    /// Reads a filter config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| SyncError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Compiles the config into a filter.
    pub fn build(&self) -> Result<PatternInclusionFilter> {
        Ok(PatternInclusionFilter {
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            tables: PatternFilter::new(&self.include_tables, &self.exclude_tables)?,
            columns: PatternFilter::new(&self.include_columns, &self.exclude_columns)?,
        })
    }
}

/// [`InclusionFilter`] built from a [`FilterConfig`].
#[derive(Debug, Clone, Default)]
pub struct PatternInclusionFilter {
    catalog: Option<String>,
    schema: Option<String>,
    tables: PatternFilter,
    columns: PatternFilter,
}

fn scope_matches(expected: Option<&String>, actual: Option<&str>) -> bool {
    match (expected, actual) {
        (Some(expected), Some(actual)) => expected.eq_ignore_ascii_case(actual),
        _ => true,
    }
}

impl InclusionFilter for PatternInclusionFilter {
    fn is_table_included(&self, catalog: Option<&str>, schema: Option<&str>, table: &str) -> bool {
        scope_matches(self.catalog.as_ref(), catalog)
            && scope_matches(self.schema.as_ref(), schema)
            && self.tables.is_included(table)
    }

    fn column_filter(&self, _table: &str) -> PatternFilter {
        self.columns.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pattern_filter() {
        let filter =
            PatternFilter::new(&strings(&["art.*", "painting"]), &strings(&["artist_tmp"]))
                .unwrap();
        assert!(filter.is_included("ARTIST"));
        assert!(filter.is_included("painting"));
        assert!(!filter.is_included("ARTIST_TMP"));
        assert!(!filter.is_included("gallery"));
        // anchored
        assert!(!filter.is_included("old_painting"));
    }

    #[test]
    fn test_include_all() {
        assert!(PatternFilter::include_all().is_included("anything"));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = PatternFilter::new(&strings(&["("]), &[]);
        assert!(matches!(result, Err(SyncError::Pattern(_))));
    }

    #[test]
    fn test_scope_matching() {
        let filter = FilterConfig {
            schema: Some("public".to_string()),
            exclude_tables: strings(&["audit_.*"]),
            ..FilterConfig::default()
        }
        .build()
        .unwrap();

        assert!(filter.is_table_included(None, Some("PUBLIC"), "artist"));
        assert!(filter.is_table_included(None, None, "artist"));
        assert!(!filter.is_table_included(None, Some("archive"), "artist"));
        assert!(!filter.is_table_included(None, Some("public"), "audit_log"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"include_tables": ["ARTIST", "PAINTING"], "exclude_columns": ["created_.*"]}}"#
        )
        .unwrap();

        let config = FilterConfig::load(file.path()).unwrap();
        assert_eq!(config.include_tables.len(), 2);
        let filter = config.build().unwrap();
        assert!(!filter.is_table_included(None, None, "GALLERY"));
        assert!(!filter.column_filter("ARTIST").is_included("CREATED_AT"));
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            FilterConfig::load(file.path()),
            Err(SyncError::ParseError { .. })
        ));
    }
}
