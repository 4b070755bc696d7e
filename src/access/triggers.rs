use sea_orm::{ConnectionTrait, TransactionTrait};

use crate::access::{collector, ledger};
use crate::errors::AccessError;
use crate::storage::Repository;

/// Rebuild the ledger of `repo` from its collaborators and, for organization
/// repositories, every team of the organization.
pub async fn recalculate_accesses<C>(db: &C, repo: &Repository) -> Result<(), AccessError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let grants = collector::collect_grants(db, repo, None).await?;
    ledger::refresh(db, repo, &grants).await?;
    Ok(())
}

/// Like [`recalculate_accesses`] but without the grants of `exclude_team_id`,
/// for when that team is being detached. The owner team is never excluded.
///
/// Every team of an organization covers all of its repositories; there is no
/// per-repository team list. A team is therefore only ever detached by being
/// deleted, and team deletion is the one caller that passes an exclusion.
pub async fn recalculate_team_accesses<C>(
    db: &C,
    repo: &Repository,
    exclude_team_id: i64,
) -> Result<(), AccessError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let grants = collector::collect_grants(db, repo, Some(exclude_team_id)).await?;
    ledger::refresh(db, repo, &grants).await?;
    Ok(())
}
