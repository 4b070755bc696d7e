use miette::Diagnostic;
use thiserror::Error;

use crate::access::AccessMode;

/// Which half of a ledger refresh failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStep {
    Delete,
    Insert,
}

impl std::fmt::Display for RefreshStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshStep::Delete => write!(f, "delete old accesses"),
            RefreshStep::Insert => write!(f, "insert new accesses"),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum AccessError {
    #[error("User {0} does not exist")]
    #[diagnostic(code(tollgate::user_not_found))]
    UserNotFound(String),

    #[error("Repository {0} does not exist")]
    #[diagnostic(code(tollgate::repo_not_found))]
    RepoNotFound(String),

    #[error("Team {0} does not exist")]
    #[diagnostic(code(tollgate::team_not_found))]
    TeamNotFound(String),

    #[error("Database error: {0}")]
    #[diagnostic(code(tollgate::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Failed to refresh accesses of repository {repo_id}: {step}")]
    #[diagnostic(
        code(tollgate::refresh),
        help("The previous access ledger for this repository was left in place")
    )]
    Refresh {
        repo_id: i64,
        step: RefreshStep,
        #[source]
        source: sea_orm::DbErr,
    },

    #[error("Invalid stored access mode {0}")]
    #[diagnostic(code(tollgate::invalid_access_mode))]
    InvalidAccessMode(i32),

    #[error("Teams cannot be authorized with `{0}`")]
    #[diagnostic(
        code(tollgate::invalid_team_authorize),
        help("Team authorization must be one of: read, write, admin")
    )]
    InvalidTeamAuthorize(AccessMode),

    #[error("The owner of a repository cannot be added as its collaborator")]
    #[diagnostic(code(tollgate::collaborate_own_repo))]
    CannotCollaborateOnOwnRepo,

    #[error("User {0} is already a member of the owning organization")]
    #[diagnostic(
        code(tollgate::collaborator_is_org_member),
        help("Organization members get access through their teams")
    )]
    CollaboratorIsOrgMember(String),

    #[error("The owner team cannot be modified or deleted")]
    #[diagnostic(code(tollgate::owner_team_immutable))]
    OwnerTeamImmutable,

    #[error("Cannot remove the last member of the owner team")]
    #[diagnostic(code(tollgate::last_owner))]
    LastOwner,

    #[error("Repository `{0}` already exists for this owner")]
    #[diagnostic(code(tollgate::repo_already_exists))]
    RepoAlreadyExists(String),

    #[error("Name `{0}` is already taken")]
    #[diagnostic(code(tollgate::name_taken))]
    NameTaken(String),

    #[error("User {0} is not an organization")]
    #[diagnostic(
        code(tollgate::not_an_organization),
        help("Teams can only be created under an organization")
    )]
    NotAnOrganization(String),

    #[error("{0} is an organization and cannot act as a member")]
    #[diagnostic(
        code(tollgate::organization_not_allowed),
        help("Only individual users can join teams or create organizations")
    )]
    OrganizationNotAllowed(String),
}
