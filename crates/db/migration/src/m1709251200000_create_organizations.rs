use sea_orm_migration::{prelude::*, sea_orm::Statement};

use crate::{
    schema,
    tenant::{DEFAULT_ORGANIZATION_NAME, DEFAULT_ORGANIZATION_SLUG},
};

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "1709251200000-CreateOrganizations"
    }
}

/// Values the status type is created with. Later units may only add to it.
pub const ORGANIZATION_STATUSES: &[&str] = &["active", "suspended", "pending"];

pub const SUBSCRIPTION_PLANS: &[&str] = &["basic", "professional", "enterprise"];

pub const STATUS_ENUM: &str = "organizations_status_enum";
pub const SUBSCRIPTION_PLAN_ENUM: &str = "organizations_subscriptionplan_enum";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        conn.execute_unprepared(&schema::create_enum(STATUS_ENUM, ORGANIZATION_STATUSES))
            .await?;
        conn.execute_unprepared(&schema::create_enum(SUBSCRIPTION_PLAN_ENUM, SUBSCRIPTION_PLANS))
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Organizations::Table)
                    .if_not_exists()
                    .col(&mut schema::id())
                    .col(ColumnDef::new(Organizations::Name).string().not_null())
                    .col(ColumnDef::new(Organizations::Slug).string().not_null())
                    .col(ColumnDef::new(Organizations::Email).string().null())
                    .col(ColumnDef::new(Organizations::Phone).string().null())
                    .col(ColumnDef::new(Organizations::Address).text().null())
                    .col(&mut schema::enum_column("status", STATUS_ENUM, "pending"))
                    .col(&mut schema::enum_column(
                        "subscriptionPlan",
                        SUBSCRIPTION_PLAN_ENUM,
                        "basic",
                    ))
                    .col(
                        ColumnDef::new(Organizations::Settings)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(&mut schema::created_at())
                    .col(&mut schema::updated_at())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(schema::unique("organizations", &["slug"]))
            .await?;

        // every tenant-scoped row created before multi-tenancy is assigned to this one
        conn.execute(Statement::from_sql_and_values(
            manager.get_database_backend(),
            r#"INSERT INTO "organizations" ("name", "slug", "status", "settings")
               SELECT $1, $2, 'active', '{}'::jsonb
               WHERE NOT EXISTS (SELECT 1 FROM "organizations" WHERE "slug" = $2)"#,
            [
                DEFAULT_ORGANIZATION_NAME.into(),
                DEFAULT_ORGANIZATION_SLUG.into(),
            ],
        ))
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(schema::drop_table("organizations"))
            .await?;
        let conn = manager.get_connection();
        conn.execute_unprepared(&schema::drop_enum(SUBSCRIPTION_PLAN_ENUM))
            .await?;
        conn.execute_unprepared(&schema::drop_enum(STATUS_ENUM))
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Organizations {
    Table,
    Name,
    Slug,
    Email,
    Phone,
    Address,
    Settings,
}
