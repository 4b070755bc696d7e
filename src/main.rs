use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use sea_orm::DatabaseConnection;
use tollgate::access::{AccessEngine, AccessMode};
use tollgate::errors::AccessError;
use tollgate::settings::Settings;
use tollgate::storage::{self, Repository, User};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about = "Repository access ledger")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the effective access mode of a user on a repository
    Resolve {
        /// Repository as owner/name
        repo: String,
        /// User name; anonymous when omitted
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Exit with status 1 unless the user holds at least the given mode
    Check {
        /// Repository as owner/name
        repo: String,
        /// Required mode: read, write, admin or owner
        #[arg(short, long)]
        level: AccessMode,
        /// User name; anonymous when omitted
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Rebuild the access ledger of one repository, or of all of them
    Recalculate {
        /// Repository as owner/name
        #[arg(required_unless_present = "all")]
        repo: Option<String>,
        #[arg(long, conflicts_with = "repo")]
        all: bool,
    },
    /// List the repositories a user can access besides their own
    Accessible {
        user: String,
        /// Print JSON instead of one line per repository
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = Settings::load(&cli.config)?;
    tracing::debug!(?settings, "Loaded configuration");

    // init storage (database)
    let db = storage::init(&settings.database).await?;
    let engine = AccessEngine::new(db);

    match cli.command {
        Command::Resolve { repo, user } => {
            let repo = find_repository(engine.connection(), &repo).await?;
            let actor = find_actor(engine.connection(), user.as_deref()).await?;
            let mode = engine.resolve(actor.map(|u| u.id), &repo).await?;
            println!("{mode}");
        }
        Command::Check { repo, level, user } => {
            let repo = find_repository(engine.connection(), &repo).await?;
            let actor = find_actor(engine.connection(), user.as_deref()).await?;
            if engine.has_access(actor.map(|u| u.id), &repo, level).await? {
                println!("allowed");
            } else {
                println!("denied");
                std::process::exit(1);
            }
        }
        Command::Recalculate { repo, all } => {
            let repo_ids = if all {
                storage::get_all_repository_ids(engine.connection()).await?
            } else {
                let name = repo.unwrap_or_default();
                vec![find_repository(engine.connection(), &name).await?.id]
            };
            for repo_id in &repo_ids {
                engine.recalculate_accesses(*repo_id).await?;
            }
            tracing::info!("Recalculated accesses of {} repositories", repo_ids.len());
        }
        Command::Accessible { user, json } => {
            let user = find_user(engine.connection(), &user).await?;
            let repos = engine.accessible_repositories(user.id).await?;
            if json {
                let listing: Vec<_> = repos
                    .iter()
                    .map(|(repo, mode)| serde_json::json!({ "repository": repo, "mode": mode }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing).into_diagnostic()?);
            } else {
                for (repo, mode) in repos {
                    println!("{}\t{}", repo.name, mode);
                }
            }
        }
    }

    Ok(())
}

async fn find_user(db: &DatabaseConnection, name: &str) -> Result<User> {
    storage::get_user_by_name(db, name)
        .await?
        .ok_or_else(|| AccessError::UserNotFound(name.to_string()).into())
}

async fn find_actor(db: &DatabaseConnection, name: Option<&str>) -> Result<Option<User>> {
    match name {
        Some(name) => Ok(Some(find_user(db, name).await?)),
        None => Ok(None),
    }
}

/// Look up a repository given as `owner/name`.
async fn find_repository(db: &DatabaseConnection, full_name: &str) -> Result<Repository> {
    let (owner, name) = full_name
        .split_once('/')
        .ok_or_else(|| miette::miette!("invalid repository `{full_name}` (expected \"owner/name\")"))?;
    let owner = find_user(db, owner).await?;
    storage::get_repository_by_name(db, owner.id, name)
        .await?
        .ok_or_else(|| AccessError::RepoNotFound(full_name.to_string()).into())
}
