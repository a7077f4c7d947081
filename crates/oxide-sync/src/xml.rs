//! XML form of joins.
//!
//! ```xml
//! <joins>
//!   <join toMany="ONE_TO_MANY" toDependentPK="NONE">
//!     <left entity="ARTIST" name="paintings"/>
//!     <right entity="PAINTING" name="artist"/>
//!     <column-pair left="ID" right="ARTIST_ID"/>
//!   </join>
//! </joins>
//! ```
//!
//! Synthesized endpoint names are not written. The older directional form,
//! one `<db-relationship>` per direction, is read as well: a relationship
//! and its reverse are merged into a single normalized join.

use std::collections::HashMap;
use std::fmt;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::canonical::normalize;
use crate::error::{Result, SyncError};
use crate::join::{
    ColumnPair, Join, JoinBuilder, JoinCondition, JoinSide, ToDependentPkSemantics, ToManySemantics,
};

fn xml_error(e: impl fmt::Display) -> SyncError {
    SyncError::Xml(e.to_string())
}

/// Serializes joins.
pub fn write_joins(joins: &[Join]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("joins")))
        .map_err(xml_error)?;

    for join in joins {
        let mut start = BytesStart::new("join");
        start.push_attribute(("toMany", join.to_many.as_str()));
        start.push_attribute(("toDependentPK", join.to_dependent_pk.as_str()));
        writer.write_event(Event::Start(start)).map_err(xml_error)?;

        for side in JoinSide::BOTH {
            let mut endpoint = BytesStart::new(match side {
                JoinSide::Left => "left",
                JoinSide::Right => "right",
            });
            endpoint.push_attribute(("entity", join.entity(side)));
            if let Some(name) = join.name(side).filter(|_| !join.is_synthesized(side)) {
                endpoint.push_attribute(("name", name));
            }
            writer.write_event(Event::Empty(endpoint)).map_err(xml_error)?;
        }

        for pair in join.condition.pairs() {
            let mut element = BytesStart::new("column-pair");
            element.push_attribute(("left", pair.left.as_str()));
            element.push_attribute(("right", pair.right.as_str()));
            writer.write_event(Event::Empty(element)).map_err(xml_error)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("join")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("joins")))
        .map_err(xml_error)?;
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

/// Parses joins, upgrading legacy relationships.
///
/// A join missing a required attribute or element fails the whole read.
pub fn read_joins(xml: &str) -> Result<Vec<Join>> {
    let mut reader = Reader::from_str(xml);
    let mut state = ReadState::default();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => state.start(&e)?,
            Event::Empty(e) => {
                state.start(&e)?;
                state.end(e.name().as_ref())?;
            }
            Event::End(e) => state.end(e.name().as_ref())?,
            Event::Eof => break,
            _ => {}
        }
    }

    let mut joins = state.joins;
    if !state.legacy.is_empty() {
        let upgraded = upgrade_legacy(state.legacy)?;
        debug!(count = upgraded.len(), "Upgraded legacy relationships");
        joins.extend(upgraded);
    }
    Ok(joins)
}

#[derive(Debug, Clone, Default)]
struct LegacyRelationship {
    source: String,
    target: String,
    name: Option<String>,
    to_many: bool,
    to_dependent_pk: bool,
    pairs: Vec<ColumnPair>,
}

impl LegacyRelationship {
    fn is_reverse_of(&self, other: &LegacyRelationship) -> bool {
        self.source.eq_ignore_ascii_case(&other.target)
            && self.target.eq_ignore_ascii_case(&other.source)
            && self.pairs.len() == other.pairs.len()
            && self.pairs.iter().all(|p| {
                other.pairs.iter().any(|o| {
                    p.left.eq_ignore_ascii_case(&o.right) && p.right.eq_ignore_ascii_case(&o.left)
                })
            })
    }
}

#[derive(Default)]
struct ReadState {
    joins: Vec<Join>,
    legacy: Vec<LegacyRelationship>,
    join: Option<JoinBuilder>,
    relationship: Option<LegacyRelationship>,
}

fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn required(attrs: &mut HashMap<String, String>, element: &str, key: &str) -> Result<String> {
    attrs
        .remove(key)
        .ok_or_else(|| {
            SyncError::config(format!("<{}> is missing the '{}' attribute", element, key))
        })
}

fn flag(attrs: &HashMap<String, String>, key: &str) -> Result<bool> {
    match attrs.get(key).map(String::as_str) {
        None | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(SyncError::config(format!(
            "'{}' must be true or false, got '{}'",
            key, other
        ))),
    }
}

impl ReadState {
    fn start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let name = e.name();
        match name.as_ref() {
            b"join" => {
                let attrs = attributes(e)?;
                let mut builder = Join::builder();
                if let Some(value) = attrs.get("toMany") {
                    builder = builder.to_many(value.parse::<ToManySemantics>()?);
                }
                if let Some(value) = attrs.get("toDependentPK") {
                    builder = builder.to_dependent_pk(value.parse::<ToDependentPkSemantics>()?);
                }
                self.join = Some(builder);
            }
            element @ (b"left" | b"right") => {
                let Some(builder) = self.join.take() else {
                    return Ok(());
                };
                let is_left = element == b"left";
                let tag = if is_left { "left" } else { "right" };
                let mut attrs = attributes(e)?;
                let entity = required(&mut attrs, tag, "entity")?;
                let name = attrs.remove("name");
                let builder = match (is_left, name) {
                    (true, Some(name)) => builder.left(entity).left_name(name),
                    (true, None) => builder.left(entity),
                    (false, Some(name)) => builder.right(entity).right_name(name),
                    (false, None) => builder.right(entity),
                };
                self.join = Some(builder);
            }
            b"column-pair" => {
                let Some(builder) = self.join.take() else {
                    return Ok(());
                };
                let mut attrs = attributes(e)?;
                let left = required(&mut attrs, "column-pair", "left")?;
                let right = required(&mut attrs, "column-pair", "right")?;
                self.join = Some(builder.pair(left, right));
            }
            b"db-relationship" => {
                let mut attrs = attributes(e)?;
                self.relationship = Some(LegacyRelationship {
                    source: required(&mut attrs, "db-relationship", "source")?,
                    target: required(&mut attrs, "db-relationship", "target")?,
                    to_many: flag(&attrs, "toMany")?,
                    to_dependent_pk: flag(&attrs, "toDependentPK")?,
                    name: attrs.remove("name"),
                    pairs: Vec::new(),
                });
            }
            b"db-attribute-pair" => {
                if let Some(relationship) = self.relationship.as_mut() {
                    let mut attrs = attributes(e)?;
                    let source = required(&mut attrs, "db-attribute-pair", "source")?;
                    let target = required(&mut attrs, "db-attribute-pair", "target")?;
                    relationship.pairs.push(ColumnPair::new(source, target));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) -> Result<()> {
        match name {
            b"join" => {
                if let Some(builder) = self.join.take() {
                    self.joins.push(builder.build()?);
                }
            }
            b"db-relationship" => {
                if let Some(relationship) = self.relationship.take() {
                    self.legacy.push(relationship);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Merges directional relationships into normalized joins.
///
/// A relationship without a declared reverse gets one implied: the reverse
/// of a to-many or dependent relationship is to-one, otherwise to-many.
fn upgrade_legacy(relationships: Vec<LegacyRelationship>) -> Result<Vec<Join>> {
    let mut used = vec![false; relationships.len()];
    let mut joins = Vec::new();

    for (i, forward) in relationships.iter().enumerate() {
        if used[i] {
            continue;
        }
        used[i] = true;

        let reverse = relationships
            .iter()
            .enumerate()
            .skip(i + 1)
            .find(|(j, r)| !used[*j] && r.is_reverse_of(forward))
            .map(|(j, r)| {
                used[j] = true;
                r
            });

        let (right_to_many, right_dependent, right_name) = match reverse {
            Some(r) => (r.to_many, r.to_dependent_pk, r.name.clone()),
            None => (!forward.to_many && !forward.to_dependent_pk, false, None),
        };

        let join = Join::new(
            [forward.source.clone(), forward.target.clone()],
            [forward.name.clone(), right_name],
            ToManySemantics::from_flags(forward.to_many, right_to_many),
            ToDependentPkSemantics::from_flags(forward.to_dependent_pk, right_dependent)?,
            JoinCondition::from_pairs(forward.pairs.clone())?,
        )?;
        joins.push(normalize(join));
    }

    Ok(joins)
}
