use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row of the access ledger: the highest non-implicit mode a user
/// holds on a repository. Unique on `(user_id, repo_id)`, `mode` never 0.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accesses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub repo_id: i64,
    pub mode: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
