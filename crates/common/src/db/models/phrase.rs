//! Phrase entity
//!
//! One row per phrase. The key lives in the reserved `_id` column; list and
//! topic payloads are JSONB.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "phrases")]
pub struct Model {
    #[sea_orm(primary_key, column_name = "_id")]
    pub id: i64,

    pub txt_id: i64,

    #[sea_orm(column_type = "Text")]
    pub path: String,

    #[sea_orm(column_type = "Text")]
    pub phrase: String,

    pub lenght: i64,

    #[sea_orm(column_type = "Text")]
    pub section: String,

    pub a_id: i64,

    /// JSON array of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub match_word: Json,

    /// Opaque topic annotations, always a JSON object
    #[sea_orm(column_type = "JsonBinary")]
    pub topics: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
