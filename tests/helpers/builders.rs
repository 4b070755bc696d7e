use std::collections::HashMap;

use sea_orm::DatabaseConnection;
use tollgate::access::AccessMode;
use tollgate::storage::{self, Team, User};

/// Fetch a user by name, creating it on first use
pub async fn user(db: &DatabaseConnection, name: &str) -> User {
    if let Some(existing) = storage::get_user_by_name(db, name)
        .await
        .expect("Failed to look up user")
    {
        return existing;
    }
    storage::create_user(db, name)
        .await
        .expect("Failed to create test user")
}

/// Builder for an organization with its teams and members
pub struct OrgBuilder {
    name: String,
    owner: String,
    teams: Vec<(String, AccessMode, Vec<String>)>,
}

/// Organization created by [`OrgBuilder`]
pub struct TestOrg {
    pub org: User,
    pub owner: User,
    pub owner_team: Team,
    pub teams: HashMap<String, Team>,
}

impl TestOrg {
    pub fn team(&self, name: &str) -> &Team {
        self.teams
            .get(name)
            .unwrap_or_else(|| panic!("No team named {name}"))
    }
}

impl OrgBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner: format!("{name}-founder"),
            teams: Vec::new(),
        }
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = owner.to_string();
        self
    }

    pub fn with_team(mut self, name: &str, authorize: AccessMode, members: &[&str]) -> Self {
        self.teams.push((
            name.to_string(),
            authorize,
            members.iter().map(|m| m.to_string()).collect(),
        ));
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> TestOrg {
        let owner = user(db, &self.owner).await;
        let (org, owner_team) = storage::create_organization(db, &self.name, owner.id)
            .await
            .expect("Failed to create organization");

        let mut teams = HashMap::new();
        for (name, authorize, members) in self.teams {
            let team = storage::create_team(db, org.id, &name, authorize)
                .await
                .expect("Failed to create team");
            for member in members {
                let member = user(db, &member).await;
                storage::add_team_user(db, &team, member.id)
                    .await
                    .expect("Failed to add team member");
            }
            teams.insert(name, team);
        }

        TestOrg {
            org,
            owner,
            owner_team,
            teams,
        }
    }
}
