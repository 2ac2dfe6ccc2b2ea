use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "property_annotations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub property_key: String,
    /// Raw level identifier as authored, if any
    pub level: Option<String>,
    pub visible_to: String, // JSON-encoded list of raw group tokens
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
