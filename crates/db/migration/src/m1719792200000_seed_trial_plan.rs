use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "1719792200000-SeedTrialPlan"
    }
}

pub const TRIAL_PLAN_SLUG: &str = "trial";
pub const TRIAL_DAYS: i32 = 14;

/// Feature key and limit granted by the trial plan.
pub const TRIAL_LIMITS: &[(&str, i32)] = &[
    ("max_users", 5),
    ("max_patients", 100),
    ("max_doctors", 3),
    ("max_appointments_per_month", 200),
    ("storage_mb", 512),
];

fn insert_plan_sql() -> String {
    format!(
        r#"INSERT INTO "plans" ("name", "slug", "description", "priceMonthly", "priceYearly", "trialDays", "isActive")
           SELECT 'Trial', '{TRIAL_PLAN_SLUG}', 'Free evaluation plan', 0, 0, {TRIAL_DAYS}, true
           WHERE NOT EXISTS (SELECT 1 FROM "plans" WHERE "slug" = '{TRIAL_PLAN_SLUG}')"#
    )
}

fn insert_limits_sql() -> String {
    let values = TRIAL_LIMITS
        .iter()
        .map(|(key, limit)| format!("('{key}', {limit})"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"INSERT INTO "feature_limits" ("planId", "featureKey", "limitValue")
           SELECT p."id", l."featureKey", l."limitValue"
           FROM "plans" p CROSS JOIN (VALUES {values}) AS l("featureKey", "limitValue")
           WHERE p."slug" = '{TRIAL_PLAN_SLUG}'
           ON CONFLICT ("planId", "featureKey") DO NOTHING"#
    )
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        conn.execute_unprepared(&insert_plan_sql()).await?;
        conn.execute_unprepared(&insert_limits_sql()).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // feature_limits rows go with the plan through the cascading key
        manager
            .get_connection()
            .execute_unprepared(&format!(
                r#"DELETE FROM "plans" WHERE "slug" = '{TRIAL_PLAN_SLUG}'"#
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_insert_is_guarded() {
        let sql = insert_plan_sql();
        assert!(sql.contains(r#"WHERE NOT EXISTS (SELECT 1 FROM "plans" WHERE "slug" = 'trial')"#));
        assert!(sql.contains(", 14, true"));
    }

    #[test]
    fn limits_cover_every_trial_feature() {
        let sql = insert_limits_sql();
        for (key, limit) in TRIAL_LIMITS {
            assert!(sql.contains(&format!("('{key}', {limit})")));
        }
        assert!(sql.ends_with(r#"ON CONFLICT ("planId", "featureKey") DO NOTHING"#));
    }
}
