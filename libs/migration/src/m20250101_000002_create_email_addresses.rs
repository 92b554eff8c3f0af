use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailAddresses::Table)
                    .if_not_exists()
                    .col(pk_uuid(EmailAddresses::Id))
                    .col(uuid(EmailAddresses::UserId))
                    .col(string_len(EmailAddresses::Email, 254))
                    .col(boolean(EmailAddresses::Verified).default(false))
                    .col(boolean(EmailAddresses::Primary).default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_addresses_user_id")
                            .from(EmailAddresses::Table, EmailAddresses::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_addresses_user_id")
                    .table(EmailAddresses::Table)
                    .col(EmailAddresses::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_email_addresses_email_lower ON email_addresses (LOWER(email))",
            )
            .await?;

        // At most one primary address per user
        manager
            .get_connection()
            .execute_unprepared(
                r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_email_addresses_one_primary
                   ON email_addresses (user_id) WHERE "primary""#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailAddresses::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum EmailAddresses {
    Table,
    Id,
    UserId,
    Email,
    Verified,
    Primary,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
