use sea_orm_migration::prelude::*;

use crate::{m1704067200000_initial_hospital_schema::USER_ROLES, schema};

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "1714521600000-CreateRbac"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Permissions::Table)
                    .if_not_exists()
                    .col(&mut schema::id())
                    .col(ColumnDef::new(Permissions::Key).string().not_null())
                    .col(ColumnDef::new(Permissions::Description).text().null())
                    .col(&mut schema::created_at())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(schema::unique("permissions", &["key"]))
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Roles::Table)
                    .if_not_exists()
                    .col(&mut schema::id())
                    .col(ColumnDef::new(Roles::OrganizationId).uuid().not_null())
                    .col(ColumnDef::new(Roles::Name).string().not_null())
                    .col(ColumnDef::new(Roles::Description).text().null())
                    .col(
                        ColumnDef::new(Roles::IsSystem)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(&mut schema::created_at())
                    .col(&mut schema::updated_at())
                    .foreign_key(&mut schema::foreign_key(
                        "roles",
                        "organizationId",
                        "organizations",
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(schema::unique("roles", &["organizationId", "name"]))
            .await?;
        manager
            .create_index(schema::index("roles", &["organizationId"]))
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RolePermissions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RolePermissions::RoleId).uuid().not_null())
                    .col(
                        ColumnDef::new(RolePermissions::PermissionId)
                            .uuid()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .name("PK_role_permissions")
                            .col(RolePermissions::RoleId)
                            .col(RolePermissions::PermissionId),
                    )
                    .foreign_key(&mut schema::foreign_key(
                        "role_permissions",
                        "roleId",
                        "roles",
                        ForeignKeyAction::Cascade,
                    ))
                    .foreign_key(&mut schema::foreign_key(
                        "role_permissions",
                        "permissionId",
                        "permissions",
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(schema::index("role_permissions", &["permissionId"]))
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserRoles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserRoles::UserId).uuid().not_null())
                    .col(ColumnDef::new(UserRoles::RoleId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .name("PK_user_roles")
                            .col(UserRoles::UserId)
                            .col(UserRoles::RoleId),
                    )
                    .foreign_key(&mut schema::foreign_key(
                        "user_roles",
                        "userId",
                        "users",
                        ForeignKeyAction::Cascade,
                    ))
                    .foreign_key(&mut schema::foreign_key(
                        "user_roles",
                        "roleId",
                        "roles",
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(schema::index("user_roles", &["roleId"]))
            .await?;

        let conn = manager.get_connection();
        // one role per distinct legacy role name inside each organization
        conn.execute_unprepared(
            r#"INSERT INTO "roles" ("organizationId", "name", "isSystem")
               SELECT DISTINCT u."organizationId", r.role::text, true
               FROM "users" u CROSS JOIN LATERAL unnest(u."roles") AS r(role)
               ON CONFLICT ("organizationId", "name") DO NOTHING"#,
        )
        .await?;
        conn.execute_unprepared(
            r#"INSERT INTO "user_roles" ("userId", "roleId")
               SELECT DISTINCT u."id", ro."id"
               FROM "users" u CROSS JOIN LATERAL unnest(u."roles") AS r(role)
               JOIN "roles" ro ON ro."organizationId" = u."organizationId" AND ro."name" = r.role::text
               ON CONFLICT DO NOTHING"#,
        )
        .await?;

        conn.execute_unprepared(r#"ALTER TABLE "users" DROP COLUMN "roles""#)
            .await?;
        conn.execute_unprepared(&schema::drop_enum("users_roles_enum"))
            .await?;

        Ok(())
    }

    /// Restores the `users.roles` array from role assignments. Roles whose name
    /// is not one of the original enum values cannot be represented and are lost.
    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        conn.execute_unprepared(&schema::create_enum("users_roles_enum", USER_ROLES))
            .await?;
        conn.execute_unprepared(
            r#"ALTER TABLE "users" ADD "roles" "public"."users_roles_enum" array NOT NULL DEFAULT '{patient}'"#,
        )
        .await?;
        let known = USER_ROLES
            .iter()
            .map(|role| format!("'{role}'"))
            .collect::<Vec<_>>()
            .join(", ");
        conn.execute_unprepared(&format!(
            r#"UPDATE "users" u SET "roles" = granted.roles
               FROM (
                   SELECT ur."userId", array_agg(DISTINCT ro."name"::"public"."users_roles_enum") AS roles
                   FROM "user_roles" ur JOIN "roles" ro ON ro."id" = ur."roleId"
                   WHERE ro."name" IN ({known})
                   GROUP BY ur."userId"
               ) granted
               WHERE granted."userId" = u."id""#
        ))
        .await?;

        for table in ["user_roles", "role_permissions", "roles", "permissions"] {
            manager.drop_table(schema::drop_table(table)).await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Permissions {
    Table,
    Key,
    Description,
}

#[derive(DeriveIden)]
enum Roles {
    Table,
    #[sea_orm(iden = "organizationId")]
    OrganizationId,
    Name,
    Description,
    #[sea_orm(iden = "isSystem")]
    IsSystem,
}

#[derive(DeriveIden)]
enum RolePermissions {
    Table,
    #[sea_orm(iden = "roleId")]
    RoleId,
    #[sea_orm(iden = "permissionId")]
    PermissionId,
}

#[derive(DeriveIden)]
enum UserRoles {
    Table,
    #[sea_orm(iden = "userId")]
    UserId,
    #[sea_orm(iden = "roleId")]
    RoleId,
}
