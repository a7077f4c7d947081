//! Join descriptors.
//!
//! A [`Join`] is the undirected description of a relationship between two
//! tables. It always names a left and a right side, but which side is "left"
//! carries no meaning until the join is normalized (see [`crate::canonical`]).
//! Cardinality and dependent-primary-key semantics are expressed as a
//! left/right pair so that reversing a join is a pure data transformation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::schema::SchemaModel;

/// One of the two endpoints of a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinSide {
    /// The left endpoint (`entities[0]`).
    Left,
    /// The right endpoint (`entities[1]`).
    Right,
}

impl JoinSide {
    /// Both sides, left first.
    pub const BOTH: [JoinSide; 2] = [JoinSide::Left, JoinSide::Right];

    /// Returns the other side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Index into the `entities` / `names` arrays.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

/// A single column equality `left_column = right_column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnPair {
    /// Column on the left table.
    pub left: String,
    /// Column on the right table.
    pub right: String,
}

impl ColumnPair {
    /// Creates a column pair.
    #[must_use]
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Returns the pair with its columns exchanged.
    #[must_use]
    pub fn swapped(&self) -> Self {
        Self {
            left: self.right.clone(),
            right: self.left.clone(),
        }
    }

    /// Returns the column on the given side.
    #[must_use]
    pub fn column(&self, side: JoinSide) -> &str {
        match side {
            JoinSide::Left => &self.left,
            JoinSide::Right => &self.right,
        }
    }
}

/// The column-level predicate of a join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinCondition {
    /// A single column pair.
    Single(ColumnPair),
    /// Two or more column pairs, in declaration order.
    Composite(Vec<ColumnPair>),
}

impl JoinCondition {
    /// Builds a condition from declared pairs.
    ///
    /// One pair yields [`JoinCondition::Single`], several yield
    /// [`JoinCondition::Composite`]. An empty list is a configuration error.
    pub fn from_pairs(mut pairs: Vec<ColumnPair>) -> Result<Self> {
        match pairs.len() {
            0 => Err(SyncError::config("join condition has no column pairs")),
            1 => Ok(Self::Single(pairs.remove(0))),
            _ => Ok(Self::Composite(pairs)),
        }
    }

    /// Returns the pairs in declaration order.
    #[must_use]
    pub fn pairs(&self) -> &[ColumnPair] {
        match self {
            Self::Single(pair) => std::slice::from_ref(pair),
            Self::Composite(pairs) => pairs,
        }
    }

    /// Returns the condition with every pair swapped.
    #[must_use]
    pub fn swapped(&self) -> Self {
        match self {
            Self::Single(pair) => Self::Single(pair.swapped()),
            Self::Composite(pairs) => {
                Self::Composite(pairs.iter().map(ColumnPair::swapped).collect())
            }
        }
    }

    /// Returns the columns of one side, in declaration order.
    #[must_use]
    pub fn columns(&self, side: JoinSide) -> Vec<&str> {
        self.pairs().iter().map(|p| p.column(side)).collect()
    }

    /// Returns true for a multi-column condition.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }
}

/// Cardinality of a join, read left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToManySemantics {
    /// Each side relates to at most one row of the other.
    OneToOne,
    /// One left row relates to many right rows.
    OneToMany,
    /// Many left rows relate to one right row.
    ManyToOne,
    /// Many to many.
    ManyToMany,
}

impl ToManySemantics {
    /// Builds semantics from the to-many flags of both directional relationships.
    #[must_use]
    pub fn from_flags(left_to_many: bool, right_to_many: bool) -> Self {
        match (left_to_many, right_to_many) {
            (false, false) => Self::OneToOne,
            (true, false) => Self::OneToMany,
            (false, true) => Self::ManyToOne,
            (true, true) => Self::ManyToMany,
        }
    }

    /// Semantics as seen from the other side.
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Self::OneToMany => Self::ManyToOne,
            Self::ManyToOne => Self::OneToMany,
            other => other,
        }
    }

    /// Whether the relationship starting at `side` is to-many.
    #[must_use]
    pub fn is_to_many(self, side: JoinSide) -> bool {
        match side {
            JoinSide::Left => matches!(self, Self::OneToMany | Self::ManyToMany),
            JoinSide::Right => matches!(self, Self::ManyToOne | Self::ManyToMany),
        }
    }

    /// The endpoint holding the "many" rows of a one-to-many join.
    #[must_use]
    pub fn many_side(self) -> Option<JoinSide> {
        match self {
            Self::OneToMany => Some(JoinSide::Right),
            Self::ManyToOne => Some(JoinSide::Left),
            Self::OneToOne | Self::ManyToMany => None,
        }
    }

    /// The serialized name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "ONE_TO_ONE",
            Self::OneToMany => "ONE_TO_MANY",
            Self::ManyToOne => "MANY_TO_ONE",
            Self::ManyToMany => "MANY_TO_MANY",
        }
    }
}

impl fmt::Display for ToManySemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToManySemantics {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ONE_TO_ONE" => Ok(Self::OneToOne),
            "ONE_TO_MANY" => Ok(Self::OneToMany),
            "MANY_TO_ONE" => Ok(Self::ManyToOne),
            "MANY_TO_MANY" => Ok(Self::ManyToMany),
            other => Err(SyncError::config(format!("unknown toMany value '{}'", other))),
        }
    }
}

/// Which side's relationship points at the other side's dependent primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToDependentPkSemantics {
    /// Neither side.
    None,
    /// The left-to-right relationship targets the right side's dependent PK.
    Left,
    /// The right-to-left relationship targets the left side's dependent PK.
    Right,
}

impl ToDependentPkSemantics {
    /// Builds semantics from the flags of both directional relationships.
    pub fn from_flags(left: bool, right: bool) -> Result<Self> {
        match (left, right) {
            (false, false) => Ok(Self::None),
            (true, false) => Ok(Self::Left),
            (false, true) => Ok(Self::Right),
            (true, true) => Err(SyncError::config(
                "both sides of a join cannot point to a dependent primary key",
            )),
        }
    }

    /// Semantics as seen from the other side.
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// The side whose relationship is to a dependent PK, if any.
    #[must_use]
    pub fn side(self) -> Option<JoinSide> {
        match self {
            Self::None => None,
            Self::Left => Some(JoinSide::Left),
            Self::Right => Some(JoinSide::Right),
        }
    }

    /// The serialized name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

impl fmt::Display for ToDependentPkSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToDependentPkSemantics {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NONE" => Ok(Self::None),
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            other => Err(SyncError::config(format!(
                "unknown toDependentPK value '{}'",
                other
            ))),
        }
    }
}

/// An undirected relationship between two tables.
///
/// Endpoint names may be absent. A name filled in by
/// [`SchemaModel::compile`] is marked as synthesized and is never written
/// back to the serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Join {
    /// `[left_table, right_table]`.
    pub entities: [String; 2],
    /// `[left_name, right_name]`: names of the relationships starting at each side.
    pub names: [Option<String>; 2],
    /// Whether each name was synthesized rather than declared.
    #[serde(default)]
    pub synthesized: [bool; 2],
    /// Cardinality, read left to right.
    pub to_many: ToManySemantics,
    /// Dependent primary key semantics.
    pub to_dependent_pk: ToDependentPkSemantics,
    /// Column predicate.
    pub condition: JoinCondition,
}

impl Join {
    /// Creates a join from its parts.
    pub fn new(
        entities: [String; 2],
        names: [Option<String>; 2],
        to_many: ToManySemantics,
        to_dependent_pk: ToDependentPkSemantics,
        condition: JoinCondition,
    ) -> Result<Self> {
        if entities.iter().any(|e| e.trim().is_empty()) {
            return Err(SyncError::config("join endpoint table name is empty"));
        }
        Ok(Self {
            entities,
            names,
            synthesized: [false, false],
            to_many,
            to_dependent_pk,
            condition,
        })
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder() -> JoinBuilder {
        JoinBuilder::default()
    }

    /// Table on the given side.
    #[must_use]
    pub fn entity(&self, side: JoinSide) -> &str {
        &self.entities[side.index()]
    }

    /// Relationship name on the given side.
    #[must_use]
    pub fn name(&self, side: JoinSide) -> Option<&str> {
        self.names[side.index()].as_deref()
    }

    /// Whether the name on the given side was synthesized.
    #[must_use]
    pub fn is_synthesized(&self, side: JoinSide) -> bool {
        self.synthesized[side.index()]
    }

    /// Sets a synthesized name on one side.
    pub fn set_synthesized_name(&mut self, side: JoinSide, name: impl Into<String>) {
        self.names[side.index()] = Some(name.into());
        self.synthesized[side.index()] = true;
    }

    /// Whether the relationship starting at `side` is to-many.
    #[must_use]
    pub fn is_to_many(&self, side: JoinSide) -> bool {
        self.to_many.is_to_many(side)
    }

    /// Whether the relationship starting at `side` targets a dependent PK.
    #[must_use]
    pub fn is_to_dependent_pk(&self, side: JoinSide) -> bool {
        self.to_dependent_pk.side() == Some(side)
    }

    /// Returns true when either endpoint is `table` (case-insensitive).
    #[must_use]
    pub fn touches(&self, table: &str) -> bool {
        self.entities.iter().any(|e| e.eq_ignore_ascii_case(table))
    }

    /// The same relationship declared from the other side.
    ///
    /// Swaps entities, names and column order and reverses both semantics.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let [left, right] = self.entities.clone();
        let [left_name, right_name] = self.names.clone();
        Self {
            entities: [right, left],
            names: [right_name, left_name],
            synthesized: [self.synthesized[1], self.synthesized[0]],
            to_many: self.to_many.reverse(),
            to_dependent_pk: self.to_dependent_pk.reverse(),
            condition: self.condition.swapped(),
        }
    }

    /// Returns true when every column of `side` is a primary key column of
    /// that side's table.
    ///
    /// A single pair that is not on the primary key is enough to return
    /// false, so mixed composite conditions are never "fully" to the PK.
    pub fn is_fully_to_primary_key(&self, model: &SchemaModel, side: JoinSide) -> Result<bool> {
        let table_name = self.entity(side);
        let table = model
            .find_table(table_name)
            .ok_or_else(|| SyncError::DanglingJoin {
                join: self.to_string(),
                table: table_name.to_string(),
            })?;
        Ok(self
            .condition
            .pairs()
            .iter()
            .all(|pair| table.is_primary_key_column(pair.column(side))))
    }

    /// Resolves which side holds the `FOREIGN KEY` constraint.
    ///
    /// With explicit dependent-PK semantics the referencing side is the
    /// dependent one (opposite the declared side), unless the cardinality has
    /// a "many" side, which then wins. Without dependent-PK semantics the
    /// left side references the right one only when every right column is a
    /// primary key column of the right table.
    pub fn referencing_side(&self, model: &SchemaModel) -> Result<JoinSide> {
        match self.to_dependent_pk.side() {
            Some(declared) => Ok(self.to_many.many_side().unwrap_or(declared.opposite())),
            None => {
                if self.is_fully_to_primary_key(model, JoinSide::Right)? {
                    Ok(JoinSide::Left)
                } else {
                    Ok(JoinSide::Right)
                }
            }
        }
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .condition
            .pairs()
            .iter()
            .map(|p| {
                format!(
                    "{}.{} > {}.{}",
                    self.entities[0], p.left, self.entities[1], p.right
                )
            })
            .collect();
        f.write_str(&pairs.join(", "))
    }
}

/// Builder for [`Join`] that refuses to default missing fields.
#[derive(Debug, Clone, Default)]
pub struct JoinBuilder {
    left: Option<String>,
    right: Option<String>,
    left_name: Option<String>,
    right_name: Option<String>,
    to_many: Option<ToManySemantics>,
    to_dependent_pk: Option<ToDependentPkSemantics>,
    pairs: Vec<ColumnPair>,
}

impl JoinBuilder {
    /// Sets the left table.
    #[must_use]
    pub fn left(mut self, table: impl Into<String>) -> Self {
        self.left = Some(table.into());
        self
    }

    /// Sets the right table.
    #[must_use]
    pub fn right(mut self, table: impl Into<String>) -> Self {
        self.right = Some(table.into());
        self
    }

    /// Sets the left relationship name.
    #[must_use]
    pub fn left_name(mut self, name: impl Into<String>) -> Self {
        self.left_name = Some(name.into());
        self
    }

    /// Sets the right relationship name.
    #[must_use]
    pub fn right_name(mut self, name: impl Into<String>) -> Self {
        self.right_name = Some(name.into());
        self
    }

    /// Sets the cardinality.
    #[must_use]
    pub fn to_many(mut self, semantics: ToManySemantics) -> Self {
        self.to_many = Some(semantics);
        self
    }

    /// Sets the dependent-PK semantics.
    #[must_use]
    pub fn to_dependent_pk(mut self, semantics: ToDependentPkSemantics) -> Self {
        self.to_dependent_pk = Some(semantics);
        self
    }

    /// Appends a column pair.
    #[must_use]
    pub fn pair(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.pairs.push(ColumnPair::new(left, right));
        self
    }

    /// Builds the join, failing on any missing field.
    pub fn build(self) -> Result<Join> {
        let left = self
            .left
            .ok_or_else(|| SyncError::config("join is missing its left entity"))?;
        let right = self
            .right
            .ok_or_else(|| SyncError::config("join is missing its right entity"))?;
        let to_many = self
            .to_many
            .ok_or_else(|| SyncError::config("join is missing toMany semantics"))?;
        let to_dependent_pk = self
            .to_dependent_pk
            .ok_or_else(|| SyncError::config("join is missing toDependentPK semantics"))?;
        let condition = JoinCondition::from_pairs(self.pairs)?;
        Join::new(
            [left, right],
            [self.left_name, self.right_name],
            to_many,
            to_dependent_pk,
            condition,
        )
    }
}
