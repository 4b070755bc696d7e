use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, TransactionTrait};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

use crate::access::locks::RepoGuard;
use crate::access::{resolver, triggers, AccessMode, RepoLocks};
use crate::errors::AccessError;
use crate::storage::{self, Repository};

/// Entry point for callers: the read path plus every graph change that has
/// to be followed by a ledger recalculation.
///
/// Each mutation takes the lock of every repository it recalculates, then
/// applies the change and the recalculation in one transaction, so readers
/// see either the old graph and ledger or the new ones. Changes to the set of
/// repositories an owner has (creation, transfer) and team changes also take
/// the owner lock, so a team change always recalculates every repository of
/// the organization, including one created concurrently.
///
/// On SQLite, write transactions are additionally serialized through a single
/// permit. SQLite allows one writer at a time and a deferred transaction that
/// reads before it writes fails instead of waiting for another writer.
#[derive(Clone)]
pub struct AccessEngine {
    db: DatabaseConnection,
    locks: RepoLocks,
    writer: Option<Arc<Semaphore>>,
}

impl AccessEngine {
    pub fn new(db: DatabaseConnection) -> Self {
        let writer = match db.get_database_backend() {
            DatabaseBackend::Sqlite => Some(Arc::new(Semaphore::new(1))),
            _ => None,
        };

        Self {
            db,
            locks: RepoLocks::new(),
            writer,
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn resolve(
        &self,
        actor: Option<i64>,
        repo: &Repository,
    ) -> Result<AccessMode, AccessError> {
        resolver::resolve(&self.db, actor, repo).await
    }

    pub async fn has_access(
        &self,
        actor: Option<i64>,
        repo: &Repository,
        required: AccessMode,
    ) -> Result<bool, AccessError> {
        resolver::has_access(&self.db, actor, repo, required).await
    }

    pub async fn accessible_repositories(
        &self,
        user_id: i64,
    ) -> Result<Vec<(Repository, AccessMode)>, AccessError> {
        resolver::accessible_repositories(&self.db, user_id).await
    }

    pub async fn recalculate_accesses(&self, repo_id: i64) -> Result<(), AccessError> {
        let _guard = self.locks.lock(repo_id).await;
        let _writer = self.write_permit().await;
        let txn = self.db.begin().await?;

        let repo = storage::get_repository_by_id(&txn, repo_id).await?;
        triggers::recalculate_accesses(&txn, &repo).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Recalculate `repo_id` without the grants of `exclude_team_id`.
    ///
    /// Teams are not linked to individual repositories, so the only caller
    /// inside the engine is [`AccessEngine::delete_team`]. Detaching a team
    /// from a single repository has no counterpart.
    pub async fn recalculate_team_accesses(
        &self,
        repo_id: i64,
        exclude_team_id: i64,
    ) -> Result<(), AccessError> {
        let _guard = self.locks.lock(repo_id).await;
        let _writer = self.write_permit().await;
        let txn = self.db.begin().await?;

        let repo = storage::get_repository_by_id(&txn, repo_id).await?;
        triggers::recalculate_team_accesses(&txn, &repo, exclude_team_id).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Create a repository and build its initial ledger, which for an
    /// organization owner already covers every team.
    pub async fn create_repository(
        &self,
        owner_id: i64,
        name: &str,
        is_private: bool,
    ) -> Result<Repository, AccessError> {
        let _owner = self.locks.lock_owners([owner_id]).await;
        let _writer = self.write_permit().await;
        let txn = self.db.begin().await?;

        let repo = storage::create_repository(&txn, owner_id, name, is_private).await?;
        triggers::recalculate_accesses(&txn, &repo).await?;

        txn.commit().await?;
        info!(repo_id = repo.id, owner_id, name, "Repository created");
        Ok(repo)
    }

    pub async fn add_collaborator(&self, repo_id: i64, user_id: i64) -> Result<(), AccessError> {
        let _guard = self.locks.lock(repo_id).await;
        let _writer = self.write_permit().await;
        let txn = self.db.begin().await?;

        let repo = storage::get_repository_by_id(&txn, repo_id).await?;
        let user = storage::get_user_by_id(&txn, user_id).await?;
        if user.id == repo.owner_id {
            return Err(AccessError::CannotCollaborateOnOwnRepo);
        }
        let owner = storage::get_user_by_id(&txn, repo.owner_id).await?;
        if owner.is_organization && storage::is_org_member(&txn, owner.id, user.id).await? {
            return Err(AccessError::CollaboratorIsOrgMember(user.name));
        }

        storage::add_collaboration(&txn, repo.id, user.id).await?;
        triggers::recalculate_accesses(&txn, &repo).await?;

        txn.commit().await?;
        info!(repo_id, user_id, "Collaborator added");
        Ok(())
    }

    pub async fn delete_collaborator(&self, repo_id: i64, user_id: i64) -> Result<(), AccessError> {
        let _guard = self.locks.lock(repo_id).await;
        let _writer = self.write_permit().await;
        let txn = self.db.begin().await?;

        let repo = storage::get_repository_by_id(&txn, repo_id).await?;
        storage::delete_collaboration(&txn, repo.id, user_id).await?;
        triggers::recalculate_accesses(&txn, &repo).await?;

        txn.commit().await?;
        info!(repo_id, user_id, "Collaborator removed");
        Ok(())
    }

    /// Change visibility; the floor moves with it, so the ledger is rebuilt
    /// when the flag actually changes.
    pub async fn set_visibility(&self, repo_id: i64, is_private: bool) -> Result<(), AccessError> {
        let _guard = self.locks.lock(repo_id).await;
        let _writer = self.write_permit().await;
        let txn = self.db.begin().await?;

        let mut repo = storage::get_repository_by_id(&txn, repo_id).await?;
        if repo.is_private == is_private {
            return Ok(());
        }

        storage::set_repository_private(&txn, repo.id, is_private).await?;
        repo.is_private = is_private;
        triggers::recalculate_accesses(&txn, &repo).await?;

        txn.commit().await?;
        info!(repo_id, is_private, "Repository visibility changed");
        Ok(())
    }

    /// Move a repository to another user or organization.
    ///
    /// Collaborations that became redundant (the new owner, or members of the
    /// new owning organization) are dropped before the ledger is rebuilt.
    pub async fn transfer_ownership(
        &self,
        repo_id: i64,
        new_owner_id: i64,
    ) -> Result<(), AccessError> {
        let _guard = self.lock_transfer(repo_id, new_owner_id).await?;
        let _writer = self.write_permit().await;
        let txn = self.db.begin().await?;

        let mut repo = storage::get_repository_by_id(&txn, repo_id).await?;
        let new_owner = storage::get_user_by_id(&txn, new_owner_id).await?;
        if repo.owner_id == new_owner.id {
            return Ok(());
        }
        if storage::get_repository_by_name(&txn, new_owner.id, &repo.name)
            .await?
            .is_some()
        {
            return Err(AccessError::RepoAlreadyExists(format!(
                "{}/{}",
                new_owner.name, repo.name
            )));
        }

        for collaborator in storage::get_collaborator_ids(&txn, repo.id).await? {
            let redundant = collaborator == new_owner.id
                || (new_owner.is_organization
                    && storage::is_org_member(&txn, new_owner.id, collaborator).await?);
            if redundant {
                storage::delete_collaboration(&txn, repo.id, collaborator).await?;
            }
        }

        let old_owner_id = repo.owner_id;
        storage::set_repository_owner(&txn, repo.id, new_owner.id).await?;
        repo.owner_id = new_owner.id;
        triggers::recalculate_accesses(&txn, &repo).await?;

        txn.commit().await?;
        info!(
            repo_id,
            old_owner_id, new_owner_id, "Repository ownership transferred"
        );
        Ok(())
    }

    pub async fn add_team_member(&self, team_id: i64, user_id: i64) -> Result<(), AccessError> {
        let team = storage::get_team_by_id(&self.db, team_id).await?;
        let _guard = self.lock_organization(team.org_id).await?;
        let _writer = self.write_permit().await;
        let txn = self.db.begin().await?;

        let user = storage::get_user_by_id(&txn, user_id).await?;
        if user.is_organization {
            return Err(AccessError::OrganizationNotAllowed(user.name));
        }
        if !storage::add_team_user(&txn, &team, user.id).await? {
            return Ok(());
        }
        recalculate_org(&txn, team.org_id).await?;

        txn.commit().await?;
        info!(team_id, user_id, "Team member added");
        Ok(())
    }

    pub async fn remove_team_member(&self, team_id: i64, user_id: i64) -> Result<(), AccessError> {
        let team = storage::get_team_by_id(&self.db, team_id).await?;
        let _guard = self.lock_organization(team.org_id).await?;
        let _writer = self.write_permit().await;
        let txn = self.db.begin().await?;

        let members = storage::get_team_member_ids(&txn, team.id).await?;
        if !members.contains(&user_id) {
            return Ok(());
        }
        if team.is_owner_team && members.len() == 1 {
            return Err(AccessError::LastOwner);
        }

        storage::remove_team_user(&txn, team.id, user_id).await?;
        recalculate_org(&txn, team.org_id).await?;

        txn.commit().await?;
        info!(team_id, user_id, "Team member removed");
        Ok(())
    }

    pub async fn change_team_authorize(
        &self,
        team_id: i64,
        authorize: AccessMode,
    ) -> Result<(), AccessError> {
        let team = storage::get_team_by_id(&self.db, team_id).await?;
        if team.is_owner_team {
            return Err(AccessError::OwnerTeamImmutable);
        }
        storage::check_team_authorize(authorize)?;

        let _guard = self.lock_organization(team.org_id).await?;
        let _writer = self.write_permit().await;
        let txn = self.db.begin().await?;

        let team = storage::get_team_by_id(&txn, team_id).await?;
        if team.authorize == authorize {
            return Ok(());
        }
        storage::update_team_authorize(&txn, team.id, authorize).await?;
        recalculate_org(&txn, team.org_id).await?;

        txn.commit().await?;
        info!(team_id, %authorize, "Team authorization changed");
        Ok(())
    }

    /// Delete a team. Its grants are removed from every repository of the
    /// organization before the team itself goes away.
    pub async fn delete_team(&self, team_id: i64) -> Result<(), AccessError> {
        let team = storage::get_team_by_id(&self.db, team_id).await?;
        if team.is_owner_team {
            return Err(AccessError::OwnerTeamImmutable);
        }

        let _guard = self.lock_organization(team.org_id).await?;
        let _writer = self.write_permit().await;
        let txn = self.db.begin().await?;

        // Gone if a concurrent delete won
        let team = storage::get_team_by_id(&txn, team_id).await?;
        for repo in storage::get_repositories_by_owner(&txn, team.org_id).await? {
            triggers::recalculate_team_accesses(&txn, &repo, team.id).await?;
        }
        storage::delete_team(&txn, team.id).await?;

        txn.commit().await?;
        info!(team_id, org_id = team.org_id, "Team deleted");
        Ok(())
    }

    /// Lock the organization, then every repository it owns. The listing
    /// happens under the owner lock, so no repository can join the set
    /// until the guard is dropped.
    async fn lock_organization(&self, org_id: i64) -> Result<RepoGuard, AccessError> {
        let owner = self.locks.lock_owners([org_id]).await;
        let repos = storage::get_repositories_by_owner(&self.db, org_id).await?;
        let repos = self.locks.lock_many(repos.iter().map(|r| r.id)).await;
        Ok(owner.join(repos))
    }

    /// Lock both owners of a transfer and the repository itself. The current
    /// owner is re-checked under its lock since a concurrent transfer may
    /// have moved the repository in the meantime.
    async fn lock_transfer(
        &self,
        repo_id: i64,
        new_owner_id: i64,
    ) -> Result<RepoGuard, AccessError> {
        loop {
            let seen = storage::get_repository_by_id(&self.db, repo_id).await?;
            let owners = self.locks.lock_owners([seen.owner_id, new_owner_id]).await;
            let current = storage::get_repository_by_id(&self.db, repo_id).await?;
            if current.owner_id == seen.owner_id {
                return Ok(owners.join(self.locks.lock(repo_id).await));
            }
        }
    }

    async fn write_permit(&self) -> Option<OwnedSemaphorePermit> {
        match &self.writer {
            // The semaphore is never closed
            Some(writer) => writer.clone().acquire_owned().await.ok(),
            None => None,
        }
    }
}

async fn recalculate_org<C>(db: &C, org_id: i64) -> Result<(), AccessError>
where
    C: ConnectionTrait + TransactionTrait,
{
    for repo in storage::get_repositories_by_owner(db, org_id).await? {
        triggers::recalculate_accesses(db, &repo).await?;
    }
    Ok(())
}
