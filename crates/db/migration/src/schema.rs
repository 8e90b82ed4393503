//! Column and constraint shapes shared by the units. Names follow the
//! `PK_`/`FK_`/`IDX_`/`UQ_` + table + columns convention used across the schema.

use sea_orm_migration::prelude::*;

pub fn id() -> ColumnDef {
    ColumnDef::new(Alias::new("id"))
        .uuid()
        .not_null()
        .primary_key()
        .default(Expr::cust("uuid_generate_v4()"))
        .to_owned()
}

pub fn created_at() -> ColumnDef {
    ColumnDef::new(Alias::new("createdAt"))
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

pub fn updated_at() -> ColumnDef {
    ColumnDef::new(Alias::new("updatedAt"))
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

/// Column typed with a PostgreSQL enum created through `create_enum`.
pub fn enum_column(name: &str, type_name: &str, default: &str) -> ColumnDef {
    ColumnDef::new(Alias::new(name))
        .custom(Alias::new(type_name))
        .not_null()
        .default(Expr::cust(format!("'{default}'")))
        .to_owned()
}

pub fn foreign_key(
    table: &str,
    column: &str,
    target: &str,
    on_delete: ForeignKeyAction,
) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(format!("FK_{table}_{column}"))
        .from(Alias::new(table), Alias::new(column))
        .to(Alias::new(target), Alias::new("id"))
        .on_delete(on_delete)
        .on_update(ForeignKeyAction::NoAction)
        .to_owned()
}

pub fn index(table: &str, columns: &[&str]) -> IndexCreateStatement {
    let mut index = Index::create();
    index
        .name(format!("IDX_{table}_{}", columns.join("_")))
        .table(Alias::new(table));
    for column in columns {
        index.col(Alias::new(*column));
    }
    index.if_not_exists().to_owned()
}

pub fn unique(table: &str, columns: &[&str]) -> IndexCreateStatement {
    let mut index = Index::create();
    index
        .name(format!("UQ_{table}_{}", columns.join("_")))
        .table(Alias::new(table))
        .unique();
    for column in columns {
        index.col(Alias::new(*column));
    }
    index.if_not_exists().to_owned()
}

pub fn create_enum(type_name: &str, values: &[&str]) -> String {
    format!(
        r#"CREATE TYPE "public"."{type_name}" AS ENUM({})"#,
        values
            .iter()
            .map(|v| format!("'{v}'"))
            .collect::<Vec<_>>()
            .join(", ")
    )
}

pub fn drop_enum(type_name: &str) -> String {
    format!(r#"DROP TYPE IF EXISTS "public"."{type_name}""#)
}

pub fn drop_table(table: &str) -> TableDropStatement {
    Table::drop()
        .table(Alias::new(table))
        .if_exists()
        .to_owned()
}
