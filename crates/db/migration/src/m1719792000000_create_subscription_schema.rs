use sea_orm_migration::prelude::*;

use crate::{
    m1709251200000_create_organizations::{SUBSCRIPTION_PLANS, SUBSCRIPTION_PLAN_ENUM},
    schema,
};

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "1719792000000-CreateSubscriptionSchema"
    }
}

pub const SUBSCRIPTION_STATUS_ENUM: &str = "subscriptions_status_enum";
pub const BILLING_CYCLE_ENUM: &str = "subscriptions_billingcycle_enum";
pub const PAYMENT_STATUS_ENUM: &str = "payments_status_enum";

const SUBSCRIPTION_STATUSES: &[&str] = &["trialing", "active", "past_due", "canceled", "expired"];
const BILLING_CYCLES: &[&str] = &["monthly", "yearly"];
const PAYMENT_STATUSES: &[&str] = &["pending", "succeeded", "failed", "refunded"];

/// Creation order; dropped in reverse.
pub const TABLES: &[&str] = &[
    "plans",
    "subscriptions",
    "feature_limits",
    "usage_tracking",
    "payments",
];

fn money(name: &str) -> ColumnDef {
    ColumnDef::new(Alias::new(name))
        .decimal_len(10, 2)
        .not_null()
        .default(0)
        .to_owned()
}

fn currency() -> ColumnDef {
    ColumnDef::new(Alias::new("currency"))
        .string_len(3)
        .not_null()
        .default("INR")
        .to_owned()
}

fn organization_id() -> ColumnDef {
    ColumnDef::new(Alias::new("organizationId"))
        .uuid()
        .not_null()
        .to_owned()
}

fn column(name: &str) -> ColumnDef {
    ColumnDef::new(Alias::new(name))
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        for (name, values) in [
            (SUBSCRIPTION_STATUS_ENUM, SUBSCRIPTION_STATUSES),
            (BILLING_CYCLE_ENUM, BILLING_CYCLES),
            (PAYMENT_STATUS_ENUM, PAYMENT_STATUSES),
        ] {
            conn.execute_unprepared(&schema::create_enum(name, values))
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("plans"))
                    .if_not_exists()
                    .col(&mut schema::id())
                    .col(column("name").string().not_null())
                    .col(column("slug").string().not_null())
                    .col(column("description").text().null())
                    .col(&mut money("priceMonthly"))
                    .col(&mut money("priceYearly"))
                    .col(&mut currency())
                    .col(column("trialDays").integer().not_null().default(0))
                    .col(column("isActive").boolean().not_null().default(true))
                    .col(&mut schema::created_at())
                    .col(&mut schema::updated_at())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(schema::unique("plans", &["slug"]))
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("subscriptions"))
                    .if_not_exists()
                    .col(&mut schema::id())
                    .col(&mut organization_id())
                    .col(column("planId").uuid().not_null())
                    .col(&mut schema::enum_column(
                        "status",
                        SUBSCRIPTION_STATUS_ENUM,
                        "trialing",
                    ))
                    .col(&mut schema::enum_column(
                        "billingCycle",
                        BILLING_CYCLE_ENUM,
                        "monthly",
                    ))
                    .col(column("currentPeriodStart").timestamp().not_null())
                    .col(column("currentPeriodEnd").timestamp().not_null())
                    .col(column("trialEndsAt").timestamp().null())
                    .col(column("canceledAt").timestamp().null())
                    .col(&mut schema::created_at())
                    .col(&mut schema::updated_at())
                    .foreign_key(&mut schema::foreign_key(
                        "subscriptions",
                        "organizationId",
                        "organizations",
                        ForeignKeyAction::Cascade,
                    ))
                    .foreign_key(&mut schema::foreign_key(
                        "subscriptions",
                        "planId",
                        "plans",
                        ForeignKeyAction::Restrict,
                    ))
                    .to_owned(),
            )
            .await?;
        // one subscription per organization
        manager
            .create_index(
                schema::index("subscriptions", &["organizationId"])
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("feature_limits"))
                    .if_not_exists()
                    .col(&mut schema::id())
                    .col(column("planId").uuid().not_null())
                    .col(column("featureKey").string().not_null())
                    // NULL means unlimited
                    .col(column("limitValue").integer().null())
                    .col(&mut schema::created_at())
                    .foreign_key(&mut schema::foreign_key(
                        "feature_limits",
                        "planId",
                        "plans",
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(schema::unique("feature_limits", &["planId", "featureKey"]))
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("usage_tracking"))
                    .if_not_exists()
                    .col(&mut schema::id())
                    .col(&mut organization_id())
                    .col(column("featureKey").string().not_null())
                    .col(column("usedValue").integer().not_null().default(0))
                    .col(column("periodStart").timestamp().not_null())
                    .col(column("periodEnd").timestamp().null())
                    .col(&mut schema::updated_at())
                    .foreign_key(&mut schema::foreign_key(
                        "usage_tracking",
                        "organizationId",
                        "organizations",
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(schema::unique(
                "usage_tracking",
                &["organizationId", "featureKey"],
            ))
            .await?;
        manager
            .create_index(schema::index("usage_tracking", &["organizationId"]))
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("payments"))
                    .if_not_exists()
                    .col(&mut schema::id())
                    .col(&mut organization_id())
                    .col(column("subscriptionId").uuid().null())
                    .col(column("amount").decimal_len(10, 2).not_null())
                    .col(&mut currency())
                    .col(&mut schema::enum_column(
                        "status",
                        PAYMENT_STATUS_ENUM,
                        "pending",
                    ))
                    .col(column("provider").string().not_null())
                    .col(column("providerPaymentId").string().null())
                    .col(column("paidAt").timestamp().null())
                    .col(&mut schema::created_at())
                    .foreign_key(&mut schema::foreign_key(
                        "payments",
                        "organizationId",
                        "organizations",
                        ForeignKeyAction::Cascade,
                    ))
                    .foreign_key(&mut schema::foreign_key(
                        "payments",
                        "subscriptionId",
                        "subscriptions",
                        ForeignKeyAction::SetNull,
                    ))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(schema::index("payments", &["organizationId"]))
            .await?;

        // the plan now lives in subscriptions
        conn.execute_unprepared(r#"ALTER TABLE "organizations" DROP COLUMN "subscriptionPlan""#)
            .await?;
        conn.execute_unprepared(&schema::drop_enum(SUBSCRIPTION_PLAN_ENUM))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in TABLES.iter().rev() {
            manager.drop_table(schema::drop_table(table)).await?;
        }

        let conn = manager.get_connection();
        for name in [
            PAYMENT_STATUS_ENUM,
            BILLING_CYCLE_ENUM,
            SUBSCRIPTION_STATUS_ENUM,
        ] {
            conn.execute_unprepared(&schema::drop_enum(name)).await?;
        }

        conn.execute_unprepared(&schema::create_enum(SUBSCRIPTION_PLAN_ENUM, SUBSCRIPTION_PLANS))
            .await?;
        conn.execute_unprepared(&format!(
            r#"ALTER TABLE "organizations" ADD "subscriptionPlan" "public"."{SUBSCRIPTION_PLAN_ENUM}" NOT NULL DEFAULT 'basic'"#
        ))
        .await?;
        Ok(())
    }
}
