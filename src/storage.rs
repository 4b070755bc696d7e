use crate::access::AccessMode;
use crate::entities;
use crate::errors::AccessError;
use crate::settings::Database as DbCfg;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

/// Name of the team every organization is created with.
pub const OWNER_TEAM_NAME: &str = "Owners";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub is_organization: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub org_id: i64,
    pub name: String,
    pub authorize: AccessMode,
    pub is_owner_team: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub is_private: bool,
    pub created_at: i64,
}

impl From<entities::user::Model> for User {
    fn from(model: entities::user::Model) -> Self {
        User {
            id: model.id,
            name: model.name,
            is_organization: model.is_organization,
            created_at: model.created_at,
        }
    }
}

impl TryFrom<entities::team::Model> for Team {
    type Error = AccessError;

    fn try_from(model: entities::team::Model) -> Result<Self, Self::Error> {
        Ok(Team {
            id: model.id,
            org_id: model.org_id,
            name: model.name,
            authorize: AccessMode::try_from(model.authorize)?,
            is_owner_team: model.is_owner_team,
        })
    }
}

impl From<entities::repository::Model> for Repository {
    fn from(model: entities::repository::Model) -> Self {
        Repository {
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            is_private: model.is_private,
            created_at: model.created_at,
        }
    }
}

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, AccessError> {
    let db = Database::connect(&cfg.url).await?;
    if cfg.run_migrations {
        Migrator::up(&db, None).await?;
    }
    Ok(db)
}

// User and organization functions

pub async fn create_user<C: ConnectionTrait>(db: &C, name: &str) -> Result<User, AccessError> {
    insert_user(db, name, false).await
}

async fn insert_user<C: ConnectionTrait>(
    db: &C,
    name: &str,
    is_organization: bool,
) -> Result<User, AccessError> {
    if get_user_by_name(db, name).await?.is_some() {
        return Err(AccessError::NameTaken(name.to_string()));
    }

    let user = entities::user::ActiveModel {
        lower_name: Set(name.to_lowercase()),
        name: Set(name.to_string()),
        is_organization: Set(is_organization),
        created_at: Set(Utc::now().timestamp()),
        ..Default::default()
    };

    let model = user.insert(db).await?;
    Ok(model.into())
}

/// Create an organization together with its owner team, and make `creator_id`
/// the first owner.
pub async fn create_organization<C>(
    db: &C,
    name: &str,
    creator_id: i64,
) -> Result<(User, Team), AccessError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let creator = get_user_by_id(&txn, creator_id).await?;
    if creator.is_organization {
        return Err(AccessError::OrganizationNotAllowed(creator.name));
    }

    let org = insert_user(&txn, name, true).await?;
    let team = entities::team::ActiveModel {
        org_id: Set(org.id),
        lower_name: Set(OWNER_TEAM_NAME.to_lowercase()),
        name: Set(OWNER_TEAM_NAME.to_string()),
        authorize: Set(AccessMode::Owner.as_i32()),
        is_owner_team: Set(true),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let owner_team = Team::try_from(team)?;
    add_team_user(&txn, &owner_team, creator.id).await?;

    txn.commit().await?;
    Ok((org, owner_team))
}

pub async fn get_user_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<User, AccessError> {
    entities::User::find_by_id(id)
        .one(db)
        .await?
        .map(User::from)
        .ok_or_else(|| AccessError::UserNotFound(format!("#{id}")))
}

pub async fn get_user_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<User>, AccessError> {
    use entities::user::{Column, Entity};

    let model = Entity::find()
        .filter(Column::LowerName.eq(name.to_lowercase()))
        .one(db)
        .await?;
    Ok(model.map(User::from))
}

// Team functions

pub async fn create_team<C: ConnectionTrait>(
    db: &C,
    org_id: i64,
    name: &str,
    authorize: AccessMode,
) -> Result<Team, AccessError> {
    use entities::team::{Column, Entity};

    check_team_authorize(authorize)?;

    let org = get_user_by_id(db, org_id).await?;
    if !org.is_organization {
        return Err(AccessError::NotAnOrganization(org.name));
    }

    let lower_name = name.to_lowercase();
    let exists = Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::LowerName.eq(lower_name.as_str()))
        .count(db)
        .await?
        > 0;
    if exists {
        return Err(AccessError::NameTaken(name.to_string()));
    }

    let model = entities::team::ActiveModel {
        org_id: Set(org_id),
        lower_name: Set(lower_name),
        name: Set(name.to_string()),
        authorize: Set(authorize.as_i32()),
        is_owner_team: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Team::try_from(model)
}

/// Ordinary teams grant one of read, write or admin. Owner is reserved for
/// the owner team.
pub fn check_team_authorize(authorize: AccessMode) -> Result<(), AccessError> {
    match authorize {
        AccessMode::Read | AccessMode::Write | AccessMode::Admin => Ok(()),
        other => Err(AccessError::InvalidTeamAuthorize(other)),
    }
}

pub async fn get_team_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Team, AccessError> {
    let model = entities::Team::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AccessError::TeamNotFound(format!("#{id}")))?;
    Team::try_from(model)
}

pub async fn get_teams_by_org<C: ConnectionTrait>(
    db: &C,
    org_id: i64,
) -> Result<Vec<Team>, AccessError> {
    use entities::team::{Column, Entity};

    Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(Team::try_from)
        .collect()
}

pub async fn update_team_authorize<C: ConnectionTrait>(
    db: &C,
    team_id: i64,
    authorize: AccessMode,
) -> Result<(), AccessError> {
    let team = entities::Team::find_by_id(team_id)
        .one(db)
        .await?
        .ok_or_else(|| AccessError::TeamNotFound(format!("#{team_id}")))?;

    let mut active: entities::team::ActiveModel = team.into();
    active.authorize = Set(authorize.as_i32());
    active.update(db).await?;

    Ok(())
}

/// Delete a team and its memberships.
pub async fn delete_team<C: ConnectionTrait>(db: &C, team_id: i64) -> Result<(), AccessError> {
    use entities::team_user::{Column, Entity};

    Entity::delete_many()
        .filter(Column::TeamId.eq(team_id))
        .exec(db)
        .await?;
    entities::Team::delete_by_id(team_id).exec(db).await?;

    Ok(())
}

pub async fn get_team_member_ids<C: ConnectionTrait>(
    db: &C,
    team_id: i64,
) -> Result<Vec<i64>, AccessError> {
    use entities::team_user::{Column, Entity};

    let members = Entity::find()
        .filter(Column::TeamId.eq(team_id))
        .order_by_asc(Column::UserId)
        .all(db)
        .await?;
    Ok(members.into_iter().map(|m| m.user_id).collect())
}

/// Add `user_id` to `team`. Returns false when the user already was a member.
pub async fn add_team_user<C: ConnectionTrait>(
    db: &C,
    team: &Team,
    user_id: i64,
) -> Result<bool, AccessError> {
    if is_team_member(db, team.id, user_id).await? {
        return Ok(false);
    }

    let membership = entities::team_user::ActiveModel {
        org_id: Set(team.org_id),
        team_id: Set(team.id),
        user_id: Set(user_id),
        ..Default::default()
    };
    membership.insert(db).await?;

    Ok(true)
}

/// Remove `user_id` from a team. Returns false when there was nothing to remove.
pub async fn remove_team_user<C: ConnectionTrait>(
    db: &C,
    team_id: i64,
    user_id: i64,
) -> Result<bool, AccessError> {
    use entities::team_user::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::TeamId.eq(team_id))
        .filter(Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

pub async fn is_team_member<C: ConnectionTrait>(
    db: &C,
    team_id: i64,
    user_id: i64,
) -> Result<bool, AccessError> {
    use entities::team_user::{Column, Entity};

    let count = Entity::find()
        .filter(Column::TeamId.eq(team_id))
        .filter(Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// A user is a member of an organization when they belong to any of its teams.
pub async fn is_org_member<C: ConnectionTrait>(
    db: &C,
    org_id: i64,
    user_id: i64,
) -> Result<bool, AccessError> {
    use entities::team_user::{Column, Entity};

    let count = Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

// Repository functions

pub async fn create_repository<C: ConnectionTrait>(
    db: &C,
    owner_id: i64,
    name: &str,
    is_private: bool,
) -> Result<Repository, AccessError> {
    let owner = get_user_by_id(db, owner_id).await?;
    if get_repository_by_name(db, owner.id, name).await?.is_some() {
        return Err(AccessError::RepoAlreadyExists(format!(
            "{}/{}",
            owner.name, name
        )));
    }

    let repo = entities::repository::ActiveModel {
        owner_id: Set(owner.id),
        lower_name: Set(name.to_lowercase()),
        name: Set(name.to_string()),
        is_private: Set(is_private),
        created_at: Set(Utc::now().timestamp()),
        ..Default::default()
    };

    let model = repo.insert(db).await?;
    Ok(model.into())
}

pub async fn get_repository_by_id<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Repository, AccessError> {
    entities::Repository::find_by_id(id)
        .one(db)
        .await?
        .map(Repository::from)
        .ok_or_else(|| AccessError::RepoNotFound(format!("#{id}")))
}

pub async fn get_repository_by_name<C: ConnectionTrait>(
    db: &C,
    owner_id: i64,
    name: &str,
) -> Result<Option<Repository>, AccessError> {
    use entities::repository::{Column, Entity};

    let model = Entity::find()
        .filter(Column::OwnerId.eq(owner_id))
        .filter(Column::LowerName.eq(name.to_lowercase()))
        .one(db)
        .await?;
    Ok(model.map(Repository::from))
}

pub async fn get_repositories_by_owner<C: ConnectionTrait>(
    db: &C,
    owner_id: i64,
) -> Result<Vec<Repository>, AccessError> {
    use entities::repository::{Column, Entity};

    let repos = Entity::find()
        .filter(Column::OwnerId.eq(owner_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?;
    Ok(repos.into_iter().map(Repository::from).collect())
}

pub async fn get_all_repository_ids<C: ConnectionTrait>(db: &C) -> Result<Vec<i64>, AccessError> {
    use entities::repository::{Column, Entity};

    let repos = Entity::find().order_by_asc(Column::Id).all(db).await?;
    Ok(repos.into_iter().map(|r| r.id).collect())
}

pub async fn set_repository_private<C: ConnectionTrait>(
    db: &C,
    repo_id: i64,
    is_private: bool,
) -> Result<(), AccessError> {
    let repo = entities::Repository::find_by_id(repo_id)
        .one(db)
        .await?
        .ok_or_else(|| AccessError::RepoNotFound(format!("#{repo_id}")))?;

    let mut active: entities::repository::ActiveModel = repo.into();
    active.is_private = Set(is_private);
    active.update(db).await?;

    Ok(())
}

pub async fn set_repository_owner<C: ConnectionTrait>(
    db: &C,
    repo_id: i64,
    owner_id: i64,
) -> Result<(), AccessError> {
    let repo = entities::Repository::find_by_id(repo_id)
        .one(db)
        .await?
        .ok_or_else(|| AccessError::RepoNotFound(format!("#{repo_id}")))?;

    let mut active: entities::repository::ActiveModel = repo.into();
    active.owner_id = Set(owner_id);
    active.update(db).await?;

    Ok(())
}

// Collaboration functions

pub async fn get_collaborator_ids<C: ConnectionTrait>(
    db: &C,
    repo_id: i64,
) -> Result<Vec<i64>, AccessError> {
    use entities::collaboration::{Column, Entity};

    let rows = Entity::find()
        .filter(Column::RepoId.eq(repo_id))
        .order_by_asc(Column::UserId)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|c| c.user_id).collect())
}

/// Record a collaboration. Returns false when it already existed.
pub async fn add_collaboration<C: ConnectionTrait>(
    db: &C,
    repo_id: i64,
    user_id: i64,
) -> Result<bool, AccessError> {
    use entities::collaboration::{Column, Entity};

    let exists = Entity::find()
        .filter(Column::RepoId.eq(repo_id))
        .filter(Column::UserId.eq(user_id))
        .count(db)
        .await?
        > 0;
    if exists {
        return Ok(false);
    }

    let collaboration = entities::collaboration::ActiveModel {
        repo_id: Set(repo_id),
        user_id: Set(user_id),
        created_at: Set(Utc::now().timestamp()),
        ..Default::default()
    };
    collaboration.insert(db).await?;

    Ok(true)
}

/// Remove a collaboration. Returns false when there was nothing to remove.
pub async fn delete_collaboration<C: ConnectionTrait>(
    db: &C,
    repo_id: i64,
    user_id: i64,
) -> Result<bool, AccessError> {
    use entities::collaboration::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::RepoId.eq(repo_id))
        .filter(Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::testing::TestDb;

    // ============================================================================
    // User and Organization Tests
    // ============================================================================

    #[tokio::test]
    async fn test_create_and_get_user() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let user = create_user(db, "Alice").await.expect("Failed to create user");
        assert!(!user.is_organization);

        let by_id = get_user_by_id(db, user.id).await.expect("Failed to get user");
        assert_eq!(by_id, user);

        let by_name = get_user_by_name(db, "alice")
            .await
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_name.name, "Alice");
    }

    #[tokio::test]
    async fn test_create_user_duplicate_name() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        create_user(db, "alice").await.expect("Failed to create user");
        let result = create_user(db, "ALICE").await;

        assert!(matches!(result, Err(AccessError::NameTaken(_))));
    }

    #[tokio::test]
    async fn test_get_user_by_id_missing() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let result = get_user_by_id(db, 42).await;
        assert!(matches!(result, Err(AccessError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_organization_adds_owner_team() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let creator = create_user(db, "alice").await.expect("Failed to create user");
        let (org, owner_team) = create_organization(db, "acme", creator.id)
            .await
            .expect("Failed to create organization");

        assert!(org.is_organization);
        assert!(owner_team.is_owner_team);
        assert_eq!(owner_team.authorize, AccessMode::Owner);
        assert_eq!(owner_team.name, OWNER_TEAM_NAME);

        let members = get_team_member_ids(db, owner_team.id)
            .await
            .expect("Failed to get members");
        assert_eq!(members, vec![creator.id]);
        assert!(is_org_member(db, org.id, creator.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_organization_unknown_creator() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let result = create_organization(db, "acme", 999).await;
        assert!(matches!(result, Err(AccessError::UserNotFound(_))));
        assert!(get_user_by_name(db, "acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_organization_cannot_create_organization() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let creator = create_user(db, "alice").await.unwrap();
        let (org, _) = create_organization(db, "acme", creator.id).await.unwrap();

        let result = create_organization(db, "acme-labs", org.id).await;
        assert!(matches!(
            result,
            Err(AccessError::OrganizationNotAllowed(name)) if name == "acme"
        ));
        assert!(get_user_by_name(db, "acme-labs").await.unwrap().is_none());
    }

    // ============================================================================
    // Team Tests
    // ============================================================================

    #[tokio::test]
    async fn test_create_team_validates_authorize() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let creator = create_user(db, "alice").await.unwrap();
        let (org, _) = create_organization(db, "acme", creator.id).await.unwrap();

        let result = create_team(db, org.id, "root", AccessMode::Owner).await;
        assert!(matches!(
            result,
            Err(AccessError::InvalidTeamAuthorize(AccessMode::Owner))
        ));

        let result = create_team(db, org.id, "nobody", AccessMode::None).await;
        assert!(matches!(result, Err(AccessError::InvalidTeamAuthorize(_))));

        let team = create_team(db, org.id, "Readers", AccessMode::Read)
            .await
            .expect("Failed to create team");
        assert_eq!(team.authorize, AccessMode::Read);
        assert!(!team.is_owner_team);
    }

    #[tokio::test]
    async fn test_create_team_requires_organization() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let user = create_user(db, "alice").await.unwrap();
        let result = create_team(db, user.id, "devs", AccessMode::Write).await;

        assert!(matches!(result, Err(AccessError::NotAnOrganization(_))));
    }

    #[tokio::test]
    async fn test_team_membership() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let creator = create_user(db, "alice").await.unwrap();
        let bob = create_user(db, "bob").await.unwrap();
        let (org, _) = create_organization(db, "acme", creator.id).await.unwrap();
        let team = create_team(db, org.id, "devs", AccessMode::Write).await.unwrap();

        assert!(add_team_user(db, &team, bob.id).await.unwrap());
        assert!(!add_team_user(db, &team, bob.id).await.unwrap());
        assert!(is_team_member(db, team.id, bob.id).await.unwrap());
        assert!(is_org_member(db, org.id, bob.id).await.unwrap());

        assert!(remove_team_user(db, team.id, bob.id).await.unwrap());
        assert!(!remove_team_user(db, team.id, bob.id).await.unwrap());
        assert!(!is_org_member(db, org.id, bob.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_team_removes_memberships() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let creator = create_user(db, "alice").await.unwrap();
        let bob = create_user(db, "bob").await.unwrap();
        let (org, _) = create_organization(db, "acme", creator.id).await.unwrap();
        let team = create_team(db, org.id, "devs", AccessMode::Write).await.unwrap();
        add_team_user(db, &team, bob.id).await.unwrap();

        delete_team(db, team.id).await.expect("Failed to delete team");

        assert!(matches!(
            get_team_by_id(db, team.id).await,
            Err(AccessError::TeamNotFound(_))
        ));
        assert!(get_team_member_ids(db, team.id).await.unwrap().is_empty());
        assert_eq!(get_teams_by_org(db, org.id).await.unwrap().len(), 1);
    }

    // ============================================================================
    // Repository and Collaboration Tests
    // ============================================================================

    #[tokio::test]
    async fn test_create_repository_duplicate_name() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let owner = create_user(db, "alice").await.unwrap();
        let repo = create_repository(db, owner.id, "Tools", true)
            .await
            .expect("Failed to create repository");
        assert!(repo.is_private);

        let result = create_repository(db, owner.id, "tools", false).await;
        assert!(matches!(result, Err(AccessError::RepoAlreadyExists(_))));

        let found = get_repository_by_name(db, owner.id, "TOOLS")
            .await
            .unwrap()
            .expect("Repository not found");
        assert_eq!(found.id, repo.id);
    }

    #[tokio::test]
    async fn test_update_repository_fields() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let alice = create_user(db, "alice").await.unwrap();
        let bob = create_user(db, "bob").await.unwrap();
        let repo = create_repository(db, alice.id, "tools", true).await.unwrap();

        set_repository_private(db, repo.id, false).await.unwrap();
        set_repository_owner(db, repo.id, bob.id).await.unwrap();

        let updated = get_repository_by_id(db, repo.id).await.unwrap();
        assert!(!updated.is_private);
        assert_eq!(updated.owner_id, bob.id);
        assert_eq!(get_repositories_by_owner(db, bob.id).await.unwrap().len(), 1);
        assert!(get_repositories_by_owner(db, alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collaborations() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let alice = create_user(db, "alice").await.unwrap();
        let bob = create_user(db, "bob").await.unwrap();
        let repo = create_repository(db, alice.id, "tools", true).await.unwrap();

        assert!(add_collaboration(db, repo.id, bob.id).await.unwrap());
        assert!(!add_collaboration(db, repo.id, bob.id).await.unwrap());
        assert_eq!(get_collaborator_ids(db, repo.id).await.unwrap(), vec![bob.id]);

        assert!(delete_collaboration(db, repo.id, bob.id).await.unwrap());
        assert!(get_collaborator_ids(db, repo.id).await.unwrap().is_empty());
    }
}
