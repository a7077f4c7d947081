//! Merge tokens.
//!
//! A token is one atomic, reversible schema change aimed either at the
//! tracked model or at the live database. Every kind has exactly one dual
//! kind, and [`MergeToken::reverse`] produces the dual aimed at the other
//! target, so `t.reverse().reverse() == t`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::join::{Join, JoinSide};
use crate::schema::{ColumnSchema, SqlType, TableSchema};

/// What a token changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDirection {
    /// Mutates the in-memory model.
    ToModel,
    /// Emits DDL for the live database.
    ToDb,
}

impl MergeDirection {
    /// The other target.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::ToModel => Self::ToDb,
            Self::ToDb => Self::ToModel,
        }
    }
}

impl fmt::Display for MergeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToModel => f.write_str("model"),
            Self::ToDb => f.write_str("database"),
        }
    }
}

/// Token kind, independent of payload and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenKind {
    /// Create a table.
    AddTable,
    /// Drop a table.
    DropTable,
    /// Add a column.
    AddColumn,
    /// Drop a column.
    DropColumn,
    /// Add a join (foreign key).
    AddJoin,
    /// Drop a join (foreign key).
    DropJoin,
    /// Replace a primary key.
    SetPrimaryKey,
    /// Change a column type.
    SetColumnType,
    /// Make a column NOT NULL.
    SetNotNull,
    /// Make a column nullable.
    SetAllowNull,
}

impl TokenKind {
    /// Execution priority. Lower runs first.
    ///
    /// Primary key changes sit between the two nullability changes: a
    /// column joining the key is made NOT NULL first, and a column leaving
    /// the key only allows NULL once the key has been replaced.
    #[must_use]
    pub fn priority(self) -> u32 {
        match self {
            Self::DropJoin => 10,
            Self::DropColumn => 20,
            Self::DropTable => 30,
            Self::AddTable => 40,
            Self::AddColumn => 50,
            Self::SetColumnType => 60,
            Self::SetNotNull => 70,
            Self::SetPrimaryKey => 80,
            Self::SetAllowNull => 85,
            Self::AddJoin => 90,
        }
    }

    /// The structurally dual kind.
    #[must_use]
    pub fn dual(self) -> Self {
        match self {
            Self::AddTable => Self::DropTable,
            Self::DropTable => Self::AddTable,
            Self::AddColumn => Self::DropColumn,
            Self::DropColumn => Self::AddColumn,
            Self::AddJoin => Self::DropJoin,
            Self::DropJoin => Self::AddJoin,
            Self::SetNotNull => Self::SetAllowNull,
            Self::SetAllowNull => Self::SetNotNull,
            Self::SetPrimaryKey => Self::SetPrimaryKey,
            Self::SetColumnType => Self::SetColumnType,
        }
    }
}

/// The payload of a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergeChange {
    /// Create a table.
    AddTable {
        /// Full table definition.
        table: TableSchema,
    },
    /// Drop a table.
    DropTable {
        /// Full table definition, kept for reversal.
        table: TableSchema,
    },
    /// Add a column.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnSchema,
    },
    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Column definition, kept for reversal.
        column: ColumnSchema,
    },
    /// Add a join.
    AddJoin {
        /// The join.
        join: Join,
        /// Side holding the foreign key constraint.
        referencing: JoinSide,
    },
    /// Drop a join.
    DropJoin {
        /// The join.
        join: Join,
        /// Side holding the foreign key constraint.
        referencing: JoinSide,
    },
    /// Replace a primary key.
    SetPrimaryKey {
        /// Table name.
        table: String,
        /// Key columns before the change.
        from: Vec<String>,
        /// Key columns after the change.
        to: Vec<String>,
    },
    /// Change a column type.
    SetColumnType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Type before the change.
        from: SqlType,
        /// Type after the change.
        to: SqlType,
    },
    /// Make a column NOT NULL.
    SetNotNull {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Make a column nullable.
    SetAllowNull {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
}

impl MergeChange {
    /// The kind of this change.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        match self {
            Self::AddTable { .. } => TokenKind::AddTable,
            Self::DropTable { .. } => TokenKind::DropTable,
            Self::AddColumn { .. } => TokenKind::AddColumn,
            Self::DropColumn { .. } => TokenKind::DropColumn,
            Self::AddJoin { .. } => TokenKind::AddJoin,
            Self::DropJoin { .. } => TokenKind::DropJoin,
            Self::SetPrimaryKey { .. } => TokenKind::SetPrimaryKey,
            Self::SetColumnType { .. } => TokenKind::SetColumnType,
            Self::SetNotNull { .. } => TokenKind::SetNotNull,
            Self::SetAllowNull { .. } => TokenKind::SetAllowNull,
        }
    }

    /// The dual change, carrying the same payload.
    #[must_use]
    pub fn dual(&self) -> Self {
        match self.clone() {
            Self::AddTable { table } => Self::DropTable { table },
            Self::DropTable { table } => Self::AddTable { table },
            Self::AddColumn { table, column } => Self::DropColumn { table, column },
            Self::DropColumn { table, column } => Self::AddColumn { table, column },
            Self::AddJoin { join, referencing } => Self::DropJoin { join, referencing },
            Self::DropJoin { join, referencing } => Self::AddJoin { join, referencing },
            Self::SetPrimaryKey { table, from, to } => Self::SetPrimaryKey {
                table,
                from: to,
                to: from,
            },
            Self::SetColumnType {
                table,
                column,
                from,
                to,
            } => Self::SetColumnType {
                table,
                column,
                from: to,
                to: from,
            },
            Self::SetNotNull { table, column } => Self::SetAllowNull { table, column },
            Self::SetAllowNull { table, column } => Self::SetNotNull { table, column },
        }
    }

    /// The table a change is about.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::AddTable { table } | Self::DropTable { table } => &table.name,
            Self::AddJoin { join, referencing } | Self::DropJoin { join, referencing } => {
                join.entity(*referencing)
            }
            Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::SetPrimaryKey { table, .. }
            | Self::SetColumnType { table, .. }
            | Self::SetNotNull { table, .. }
            | Self::SetAllowNull { table, .. } => table,
        }
    }

    /// Returns a human-readable description of this change.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::AddTable { table } => format!("Add table '{}'", table.name),
            Self::DropTable { table } => format!("Drop table '{}'", table.name),
            Self::AddColumn { table, column } => {
                format!("Add column '{}' to table '{}'", column.name, table)
            }
            Self::DropColumn { table, column } => {
                format!("Drop column '{}' from table '{}'", column.name, table)
            }
            Self::AddJoin { join, .. } => format!("Add join {}", join),
            Self::DropJoin { join, .. } => format!("Drop join {}", join),
            Self::SetPrimaryKey { table, from, to } => format!(
                "Set primary key of table '{}' from ({}) to ({})",
                table,
                from.join(", "),
                to.join(", ")
            ),
            Self::SetColumnType {
                table,
                column,
                from,
                to,
            } => format!(
                "Change type of column '{}.{}' from {} to {}",
                table, column, from, to
            ),
            Self::SetNotNull { table, column } => {
                format!("Set column '{}.{}' NOT NULL", table, column)
            }
            Self::SetAllowNull { table, column } => {
                format!("Allow NULL in column '{}.{}'", table, column)
            }
        }
    }
}

/// A directional, reversible unit of change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeToken {
    /// What the token changes.
    pub direction: MergeDirection,
    /// The change itself.
    pub change: MergeChange,
}

impl MergeToken {
    /// Creates a token.
    #[must_use]
    pub fn new(direction: MergeDirection, change: MergeChange) -> Self {
        Self { direction, change }
    }

    /// The token kind.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        self.change.kind()
    }

    /// Execution priority of the token kind.
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.kind().priority()
    }

    /// Whether the token emits DDL.
    #[must_use]
    pub fn is_to_db(&self) -> bool {
        self.direction == MergeDirection::ToDb
    }

    /// The dual token aimed at the other target.
    ///
    /// A token that adds a column to the database reverses into a token
    /// that drops it from the model, and so on.
    #[must_use]
    pub fn reverse(&self) -> Self {
        Self {
            direction: self.direction.opposite(),
            change: self.change.dual(),
        }
    }

    /// Returns a human-readable description of this token.
    #[must_use]
    pub fn description(&self) -> String {
        format!("{} ({})", self.change.description(), self.direction)
    }
}

impl fmt::Display for MergeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}
