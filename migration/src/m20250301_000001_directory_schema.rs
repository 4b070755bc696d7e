use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Users and organizations share one table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id).big_integer())
                    .col(
                        ColumnDef::new(Users::LowerName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(string(Users::Name))
                    .col(
                        ColumnDef::new(Users::IsOrganization)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(big_integer(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Teams::Table)
                    .if_not_exists()
                    .col(pk_auto(Teams::Id).big_integer())
                    .col(big_integer(Teams::OrgId))
                    .col(string(Teams::LowerName))
                    .col(string(Teams::Name))
                    .col(integer(Teams::Authorize))
                    .col(
                        ColumnDef::new(Teams::IsOwnerTeam)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_teams_org_id")
                            .from(Teams::Table, Teams::OrgId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_teams_org_lower_name")
                    .table(Teams::Table)
                    .col(Teams::OrgId)
                    .col(Teams::LowerName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TeamUsers::Table)
                    .if_not_exists()
                    .col(pk_auto(TeamUsers::Id).big_integer())
                    .col(big_integer(TeamUsers::OrgId))
                    .col(big_integer(TeamUsers::TeamId))
                    .col(big_integer(TeamUsers::UserId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_team_users_team_id")
                            .from(TeamUsers::Table, TeamUsers::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_team_users_user_id")
                            .from(TeamUsers::Table, TeamUsers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_team_users_team_user")
                    .table(TeamUsers::Table)
                    .col(TeamUsers::TeamId)
                    .col(TeamUsers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Org membership is answered from this index
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_team_users_org_user")
                    .table(TeamUsers::Table)
                    .col(TeamUsers::OrgId)
                    .col(TeamUsers::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Repositories::Table)
                    .if_not_exists()
                    .col(pk_auto(Repositories::Id).big_integer())
                    .col(big_integer(Repositories::OwnerId))
                    .col(string(Repositories::LowerName))
                    .col(string(Repositories::Name))
                    .col(
                        ColumnDef::new(Repositories::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(big_integer(Repositories::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_repositories_owner_lower_name")
                    .table(Repositories::Table)
                    .col(Repositories::OwnerId)
                    .col(Repositories::LowerName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Collaborations::Table)
                    .if_not_exists()
                    .col(pk_auto(Collaborations::Id).big_integer())
                    .col(big_integer(Collaborations::RepoId))
                    .col(big_integer(Collaborations::UserId))
                    .col(big_integer(Collaborations::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_collaborations_user_id")
                            .from(Collaborations::Table, Collaborations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_collaborations_repo_user")
                    .table(Collaborations::Table)
                    .col(Collaborations::RepoId)
                    .col(Collaborations::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Collaborations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Repositories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TeamUsers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Teams::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    LowerName,
    Name,
    IsOrganization,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Teams {
    Table,
    Id,
    OrgId,
    LowerName,
    Name,
    Authorize,
    IsOwnerTeam,
}

#[derive(DeriveIden)]
enum TeamUsers {
    Table,
    Id,
    OrgId,
    TeamId,
    UserId,
}

#[derive(DeriveIden)]
enum Repositories {
    Table,
    Id,
    OwnerId,
    LowerName,
    Name,
    IsPrivate,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Collaborations {
    Table,
    Id,
    RepoId,
    UserId,
    CreatedAt,
}
