use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Ledger rows outlive deleted repositories until the next cleanup,
        // so only the user side carries a foreign key.
        manager
            .create_table(
                Table::create()
                    .table(Accesses::Table)
                    .if_not_exists()
                    .col(pk_auto(Accesses::Id).big_integer())
                    .col(big_integer(Accesses::UserId))
                    .col(big_integer(Accesses::RepoId))
                    .col(
                        ColumnDef::new(Accesses::Mode)
                            .integer()
                            .not_null()
                            .check(Expr::col(Accesses::Mode).gt(0)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_accesses_user_id")
                            .from(Accesses::Table, Accesses::UserId)
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
                    .name("idx_accesses_user_repo")
                    .table(Accesses::Table)
                    .col(Accesses::UserId)
                    .col(Accesses::RepoId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Refreshes delete by repository
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_accesses_repo_id")
                    .table(Accesses::Table)
                    .col(Accesses::RepoId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Accesses::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Accesses {
    Table,
    Id,
    UserId,
    RepoId,
    Mode,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
