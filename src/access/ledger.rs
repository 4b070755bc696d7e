use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::access::AccessMode;
use crate::entities::access::{ActiveModel, Column, Entity};
use crate::errors::{AccessError, RefreshStep};
use crate::storage::Repository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub repo_id: i64,
    pub user_id: i64,
    pub mode: AccessMode,
}

impl TryFrom<crate::entities::access::Model> for LedgerEntry {
    type Error = AccessError;

    fn try_from(model: crate::entities::access::Model) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            repo_id: model.repo_id,
            user_id: model.user_id,
            mode: AccessMode::try_from(model.mode)?,
        })
    }
}

/// Lowest mode worth persisting for a repository.
///
/// Everyone can read a public repository already, so only write and above
/// needs a row there.
pub fn visibility_floor(is_private: bool) -> AccessMode {
    if is_private {
        AccessMode::Read
    } else {
        AccessMode::Write
    }
}

/// Ledger mode of `user_id` on `repo_id`, if a row exists.
pub async fn get_access<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    repo_id: i64,
) -> Result<Option<AccessMode>, AccessError> {
    let model = Entity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::RepoId.eq(repo_id))
        .one(db)
        .await?;

    model.map(|m| AccessMode::try_from(m.mode)).transpose()
}

pub async fn entries_for_repo<C: ConnectionTrait>(
    db: &C,
    repo_id: i64,
) -> Result<Vec<LedgerEntry>, AccessError> {
    Entity::find()
        .filter(Column::RepoId.eq(repo_id))
        .order_by_asc(Column::UserId)
        .all(db)
        .await?
        .into_iter()
        .map(LedgerEntry::try_from)
        .collect()
}

pub async fn entries_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
) -> Result<Vec<LedgerEntry>, AccessError> {
    Entity::find()
        .filter(Column::UserId.eq(user_id))
        .order_by_asc(Column::RepoId)
        .all(db)
        .await?
        .into_iter()
        .map(LedgerEntry::try_from)
        .collect()
}

/// Replace every ledger row of `repo` with `grants`, dropping grants below
/// the visibility floor. Returns the number of rows written.
///
/// Delete and insert run in one transaction (a savepoint when `db` already is
/// one); on any error it is dropped uncommitted and the previous rows stay.
pub async fn refresh<C>(
    db: &C,
    repo: &Repository,
    grants: &HashMap<i64, AccessMode>,
) -> Result<usize, AccessError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let floor = visibility_floor(repo.is_private);

    let mut rows: Vec<(i64, AccessMode)> = grants
        .iter()
        .filter(|(_, mode)| **mode >= floor)
        .map(|(user_id, mode)| (*user_id, *mode))
        .collect();
    rows.sort_unstable_by_key(|(user_id, _)| *user_id);
    let written = rows.len();

    let txn = db.begin().await?;

    Entity::delete_many()
        .filter(Column::RepoId.eq(repo.id))
        .exec(&txn)
        .await
        .map_err(|source| AccessError::Refresh {
            repo_id: repo.id,
            step: RefreshStep::Delete,
            source,
        })?;

    if !rows.is_empty() {
        let models = rows.into_iter().map(|(user_id, mode)| ActiveModel {
            user_id: Set(user_id),
            repo_id: Set(repo.id),
            mode: Set(mode.as_i32()),
            ..Default::default()
        });
        Entity::insert_many(models)
            .exec(&txn)
            .await
            .map_err(|source| AccessError::Refresh {
                repo_id: repo.id,
                step: RefreshStep::Insert,
                source,
            })?;
    }

    txn.commit().await?;

    debug!(
        repo_id = repo.id,
        granted = grants.len(),
        written,
        %floor,
        "Refreshed repository accesses"
    );
    Ok(written)
}
