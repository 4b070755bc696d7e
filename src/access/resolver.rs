use sea_orm::ConnectionTrait;
use tracing::warn;

use crate::access::{ledger, AccessMode};
use crate::errors::AccessError;
use crate::storage::{self, Repository};

/// Effective mode of `actor` on `repo`. `None` is an anonymous actor.
///
/// The owner short-circuits to `Owner` before the ledger is consulted.
/// Without a ledger row, public repositories fall back to `Read`.
pub async fn resolve<C: ConnectionTrait>(
    db: &C,
    actor: Option<i64>,
    repo: &Repository,
) -> Result<AccessMode, AccessError> {
    let fallback = if repo.is_private {
        AccessMode::None
    } else {
        AccessMode::Read
    };

    let Some(user_id) = actor else {
        return Ok(fallback);
    };

    if user_id == repo.owner_id {
        return Ok(AccessMode::Owner);
    }

    let stored = ledger::get_access(db, user_id, repo.id).await?;
    Ok(stored.unwrap_or(fallback))
}

pub async fn has_access<C: ConnectionTrait>(
    db: &C,
    actor: Option<i64>,
    repo: &Repository,
    required: AccessMode,
) -> Result<bool, AccessError> {
    let mode = resolve(db, actor, repo).await?;
    Ok(mode.allows(required))
}

/// Repositories `user_id` holds a ledger row on, besides the ones they own,
/// ordered by repository id.
pub async fn accessible_repositories<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
) -> Result<Vec<(Repository, AccessMode)>, AccessError> {
    let entries = ledger::entries_for_user(db, user_id).await?;

    let mut repos = Vec::with_capacity(entries.len());
    for entry in entries {
        let repo = match storage::get_repository_by_id(db, entry.repo_id).await {
            Ok(repo) => repo,
            Err(AccessError::RepoNotFound(id)) => {
                // Row outlived its repository; cleaned up by the next refresh
                warn!(user_id, repo = %id, "Skipping access to missing repository");
                continue;
            }
            Err(e) => return Err(e),
        };
        if repo.owner_id == user_id {
            continue;
        }
        repos.push((repo, entry.mode));
    }

    Ok(repos)
}
