//! Live SQLite introspection.
//!
//! Reads tables, columns, primary keys and foreign keys from a database
//! into an imported [`SchemaModel`]. Foreign keys become normalized joins
//! through the join loader.

use std::collections::BTreeMap;

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{debug, info};

use crate::error::Result;
use crate::filter::InclusionFilter;
use crate::loader::{load_foreign_keys, ForeignKeyInfo};
use crate::schema::{ColumnSchema, SchemaModel, SqlType, TableSchema};

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Introspects every user table of the database behind `pool`.
pub async fn introspect_sqlite(
    pool: &SqlitePool,
    filter: Option<&dyn InclusionFilter>,
) -> Result<SchemaModel> {
    let names: Vec<String> = sqlx::query(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| row.try_get::<String, _>("name"))
    .collect::<std::result::Result<_, _>>()?;

    let mut model = SchemaModel::new();
    let mut foreign_keys = Vec::new();

    for name in names {
        if let Some(filter) = filter {
            if !filter.is_table_included(None, None, &name) {
                debug!(table = %name, "Table excluded by filter");
                continue;
            }
        }
        model.add_table(read_table(pool, &name).await?)?;
        foreign_keys.extend(read_foreign_keys(pool, &name).await?);
    }

    // implicit references target the referenced table's primary key
    for fk in &mut foreign_keys {
        if fk.references_columns.iter().any(String::is_empty) {
            if let Some(target) = model.find_table(&fk.references_table) {
                for (i, column) in fk.references_columns.iter_mut().enumerate() {
                    if column.is_empty() {
                        if let Some(pk) = target.primary_key.get(i) {
                            *column = pk.clone();
                        }
                    }
                }
            }
        }
    }

    let joins = load_foreign_keys(&mut model, &foreign_keys);
    info!(
        tables = model.tables.len(),
        joins,
        "Introspected SQLite schema"
    );
    Ok(model)
}

async fn read_table(pool: &SqlitePool, name: &str) -> Result<TableSchema> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", quote(name)))
        .fetch_all(pool)
        .await?;

    let mut table = TableSchema::new(name);
    let mut key: Vec<(i64, String)> = Vec::new();
    for row in rows {
        let column: String = row.try_get("name")?;
        let declared: String = row.try_get("type")?;
        let not_null: i64 = row.try_get("notnull")?;
        let pk: i64 = row.try_get("pk")?;

        if pk > 0 {
            key.push((pk, column.clone()));
        }
        table.columns.push(ColumnSchema {
            name: column,
            sql_type: SqlType::from_declared(&declared),
            nullable: not_null == 0 && pk == 0,
            primary_key: pk > 0,
        });
    }
    key.sort();
    table.primary_key = key.into_iter().map(|(_, c)| c).collect();
    Ok(table)
}

async fn read_foreign_keys(pool: &SqlitePool, name: &str) -> Result<Vec<ForeignKeyInfo>> {
    let rows = sqlx::query(&format!("PRAGMA foreign_key_list({})", quote(name)))
        .fetch_all(pool)
        .await?;

    let mut by_id: BTreeMap<i64, ForeignKeyInfo> = BTreeMap::new();
    for row in rows {
        let id: i64 = row.try_get("id")?;
        let referenced: String = row.try_get("table")?;
        let from: String = row.try_get("from")?;
        let to: Option<String> = row.try_get("to")?;

        let fk = by_id.entry(id).or_insert_with(|| ForeignKeyInfo {
            table: name.to_string(),
            columns: Vec::new(),
            references_table: referenced,
            references_columns: Vec::new(),
        });
        fk.columns.push(from);
        fk.references_columns.push(to.unwrap_or_default());
    }
    Ok(by_id.into_values().collect())
}
