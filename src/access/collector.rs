use std::collections::HashMap;

use sea_orm::ConnectionTrait;
use tracing::debug;

use crate::access::AccessMode;
use crate::errors::AccessError;
use crate::storage::{self, Repository};

/// Build the desired `user -> mode` map for `repo` from the current graph.
///
/// Collaborators get write. When the owner is an organization, every member
/// of one of its teams gets the team's authorization, owner team members get
/// owner, and a user reached several ways keeps the strongest mode. The team
/// `exclude_team` is left out unless it is the owner team.
pub async fn collect_grants<C: ConnectionTrait>(
    db: &C,
    repo: &Repository,
    exclude_team: Option<i64>,
) -> Result<HashMap<i64, AccessMode>, AccessError> {
    let mut grants = HashMap::new();

    // No read-only tier for collaborators
    for user_id in storage::get_collaborator_ids(db, repo.id).await? {
        grants.insert(user_id, AccessMode::Write);
    }

    let owner = storage::get_user_by_id(db, repo.owner_id).await?;
    if owner.is_organization {
        for team in storage::get_teams_by_org(db, owner.id).await? {
            if exclude_team == Some(team.id) && !team.is_owner_team {
                continue;
            }

            let granted = if team.is_owner_team {
                AccessMode::Owner
            } else {
                team.authorize
            };
            for member in storage::get_team_member_ids(db, team.id).await? {
                let mode = grants.entry(member).or_insert(AccessMode::None);
                *mode = AccessMode::max_of([*mode, granted]);
            }
        }
    }

    debug!(
        repo_id = repo.id,
        users = grants.len(),
        ?exclude_team,
        "Collected repository grants"
    );
    Ok(grants)
}
