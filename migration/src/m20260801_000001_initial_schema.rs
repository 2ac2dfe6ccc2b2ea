use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Enable foreign keys for SQLite
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
            manager
                .get_connection()
                .execute_unprepared("PRAGMA foreign_keys = ON")
                .await?;
        }

        // Create visibility_levels table
        manager
            .create_table(
                Table::create()
                    .table(VisibilityLevels::Table)
                    .if_not_exists()
                    .col(pk_auto(VisibilityLevels::Id))
                    .col(string_uniq(VisibilityLevels::Name))
                    .col(big_integer(VisibilityLevels::Rank))
                    .col(string_null(VisibilityLevels::Reference))
                    .col(big_integer(VisibilityLevels::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create group_levels table
        manager
            .create_table(
                Table::create()
                    .table(GroupLevels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupLevels::GroupName)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(GroupLevels::LevelName))
                    .col(big_integer(GroupLevels::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create property_annotations table
        manager
            .create_table(
                Table::create()
                    .table(PropertyAnnotations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PropertyAnnotations::PropertyKey)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string_null(PropertyAnnotations::Level))
                    .col(string(PropertyAnnotations::VisibleTo))
                    .col(big_integer(PropertyAnnotations::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PropertyAnnotations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupLevels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VisibilityLevels::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum VisibilityLevels {
    Table,
    Id,
    Name,
    Rank,
    Reference,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum GroupLevels {
    Table,
    GroupName,
    LevelName,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PropertyAnnotations {
    Table,
    PropertyKey,
    Level,
    VisibleTo,
    UpdatedAt,
}
