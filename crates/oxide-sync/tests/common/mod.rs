#![allow(dead_code)]

use oxide_sync::prelude::*;

pub fn artist() -> TableSchema {
    TableSchema::new("ARTIST")
        .column(ColumnSchema::new("ID", SqlType::Integer).primary_key())
        .column(ColumnSchema::new("NAME", SqlType::Text).not_null())
}

pub fn painting() -> TableSchema {
    TableSchema::new("PAINTING")
        .column(ColumnSchema::new("ID", SqlType::Integer).primary_key())
        .column(ColumnSchema::new("ARTIST_ID", SqlType::Integer))
        .column(ColumnSchema::new("TITLE", SqlType::Text))
}

pub fn artist_paintings() -> Join {
    Join::builder()
        .left("ARTIST")
        .right("PAINTING")
        .right_name("artist")
        .left_name("paintings")
        .to_many(ToManySemantics::OneToMany)
        .to_dependent_pk(ToDependentPkSemantics::None)
        .pair("ID", "ARTIST_ID")
        .build()
        .unwrap_or_else(|e| panic!("Failed to build join: {e}"))
}

pub fn gallery() -> SchemaModel {
    SchemaModel::new()
        .table(artist())
        .table(painting())
        .join(artist_paintings())
}

pub fn token(change: MergeChange) -> MergeToken {
    MergeToken::new(MergeDirection::ToDb, change)
}

pub fn kinds(tokens: &[MergeToken]) -> Vec<TokenKind> {
    tokens.iter().map(MergeToken::kind).collect()
}
