use sea_orm_migration::prelude::*;

use crate::schema;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "1704067200000-InitialHospitalSchema"
    }
}

pub const USER_ROLES: &[&str] = &[
    "admin",
    "doctor",
    "nurse",
    "receptionist",
    "pharmacist",
    "lab_technician",
    "accountant",
    "patient",
];

#[derive(Clone, Copy)]
enum Kind {
    Varchar,
    Text,
    Int,
    Money,
    Date,
    Timestamp,
    Bool,
    Json,
    Uuid,
}

impl Kind {
    fn column(self, name: &str, required: bool) -> ColumnDef {
        let mut col = ColumnDef::new(Alias::new(name));
        match self {
            Kind::Varchar => col.string(),
            Kind::Text => col.text(),
            Kind::Int => col.integer(),
            Kind::Money => col.decimal_len(12, 2),
            Kind::Date => col.date(),
            Kind::Timestamp => col.timestamp(),
            Kind::Bool => col.boolean(),
            Kind::Json => col.json_binary(),
            Kind::Uuid => col.uuid(),
        };
        if required {
            col.not_null();
        } else {
            col.null();
        }
        col
    }
}

use Kind as K;

struct TableDef {
    name: &'static str,
    /// (column, type, NOT NULL)
    columns: &'static [(&'static str, Kind, bool)],
    /// (column, referenced table); required references cascade, optional ones set null
    references: &'static [(&'static str, &'static str)],
}

const TABLES: &[TableDef] = &[
    TableDef {
        name: "users",
        columns: &[
            ("email", K::Varchar, true),
            ("password", K::Varchar, true),
            ("firstName", K::Varchar, true),
            ("lastName", K::Varchar, true),
            ("phone", K::Varchar, false),
            ("refreshToken", K::Varchar, false),
            ("isActive", K::Bool, true),
        ],
        references: &[],
    },
    TableDef {
        name: "patients",
        columns: &[
            ("firstName", K::Varchar, true),
            ("lastName", K::Varchar, true),
            ("dateOfBirth", K::Date, false),
            ("gender", K::Varchar, false),
            ("phone", K::Varchar, false),
            ("email", K::Varchar, false),
            ("address", K::Text, false),
            ("bloodGroup", K::Varchar, false),
            ("emergencyContact", K::Varchar, false),
        ],
        references: &[],
    },
    TableDef {
        name: "doctors",
        columns: &[
            ("userId", K::Uuid, false),
            ("firstName", K::Varchar, true),
            ("lastName", K::Varchar, true),
            ("specialization", K::Varchar, true),
            ("licenseNumber", K::Varchar, true),
            ("phone", K::Varchar, false),
            ("email", K::Varchar, false),
            ("consultationFee", K::Money, false),
        ],
        references: &[("userId", "users")],
    },
    TableDef {
        name: "appointments",
        columns: &[
            ("patientId", K::Uuid, true),
            ("doctorId", K::Uuid, true),
            ("appointmentDate", K::Timestamp, true),
            ("status", K::Varchar, true),
            ("reason", K::Text, false),
            ("notes", K::Text, false),
        ],
        references: &[("patientId", "patients"), ("doctorId", "doctors")],
    },
    TableDef {
        name: "medical_records",
        columns: &[
            ("patientId", K::Uuid, true),
            ("doctorId", K::Uuid, false),
            ("diagnosis", K::Text, true),
            ("treatment", K::Text, false),
            ("prescription", K::Json, false),
            ("recordDate", K::Timestamp, true),
        ],
        references: &[("patientId", "patients"), ("doctorId", "doctors")],
    },
    TableDef {
        name: "invoices",
        columns: &[
            ("patientId", K::Uuid, true),
            ("invoiceNumber", K::Varchar, true),
            ("totalAmount", K::Money, true),
            ("paidAmount", K::Money, true),
            ("status", K::Varchar, true),
            ("dueDate", K::Date, false),
        ],
        references: &[("patientId", "patients")],
    },
    TableDef {
        name: "lab_tests",
        columns: &[
            ("patientId", K::Uuid, true),
            ("doctorId", K::Uuid, false),
            ("testName", K::Varchar, true),
            ("status", K::Varchar, true),
            ("result", K::Text, false),
            ("requestedAt", K::Timestamp, true),
            ("completedAt", K::Timestamp, false),
        ],
        references: &[("patientId", "patients"), ("doctorId", "doctors")],
    },
    TableDef {
        name: "medicines",
        columns: &[
            ("name", K::Varchar, true),
            ("genericName", K::Varchar, false),
            ("manufacturer", K::Varchar, false),
            ("unitPrice", K::Money, true),
            ("stockQuantity", K::Int, true),
            ("expiryDate", K::Date, false),
        ],
        references: &[],
    },
    TableDef {
        name: "staff",
        columns: &[
            ("userId", K::Uuid, false),
            ("firstName", K::Varchar, true),
            ("lastName", K::Varchar, true),
            ("department", K::Varchar, true),
            ("designation", K::Varchar, true),
            ("salary", K::Money, false),
            ("joiningDate", K::Date, false),
        ],
        references: &[("userId", "users")],
    },
    TableDef {
        name: "inventory",
        columns: &[
            ("itemName", K::Varchar, true),
            ("category", K::Varchar, true),
            ("quantity", K::Int, true),
            ("unit", K::Varchar, false),
            ("reorderLevel", K::Int, false),
            ("supplier", K::Varchar, false),
        ],
        references: &[],
    },
    TableDef {
        name: "wards",
        columns: &[
            ("name", K::Varchar, true),
            ("wardType", K::Varchar, true),
            ("floor", K::Int, false),
            ("capacity", K::Int, true),
        ],
        references: &[],
    },
    TableDef {
        name: "beds",
        columns: &[
            ("wardId", K::Uuid, true),
            ("bedNumber", K::Varchar, true),
            ("status", K::Varchar, true),
        ],
        references: &[("wardId", "wards")],
    },
    TableDef {
        name: "admissions",
        columns: &[
            ("patientId", K::Uuid, true),
            ("bedId", K::Uuid, false),
            ("doctorId", K::Uuid, false),
            ("admittedAt", K::Timestamp, true),
            ("dischargedAt", K::Timestamp, false),
            ("status", K::Varchar, true),
            ("notes", K::Text, false),
        ],
        references: &[
            ("patientId", "patients"),
            ("bedId", "beds"),
            ("doctorId", "doctors"),
        ],
    },
    TableDef {
        name: "operation_theaters",
        columns: &[
            ("name", K::Varchar, true),
            ("status", K::Varchar, true),
            ("equipment", K::Json, false),
        ],
        references: &[],
    },
    TableDef {
        name: "surgeries",
        columns: &[
            ("patientId", K::Uuid, true),
            ("doctorId", K::Uuid, true),
            ("operationTheaterId", K::Uuid, true),
            ("procedureName", K::Varchar, true),
            ("scheduledAt", K::Timestamp, true),
            ("status", K::Varchar, true),
            ("notes", K::Text, false),
        ],
        references: &[
            ("patientId", "patients"),
            ("doctorId", "doctors"),
            ("operationTheaterId", "operation_theaters"),
        ],
    },
    TableDef {
        name: "radiology_requests",
        columns: &[
            ("patientId", K::Uuid, true),
            ("doctorId", K::Uuid, false),
            ("modality", K::Varchar, true),
            ("bodyPart", K::Varchar, true),
            ("status", K::Varchar, true),
            ("findings", K::Text, false),
            ("requestedAt", K::Timestamp, true),
        ],
        references: &[("patientId", "patients"), ("doctorId", "doctors")],
    },
    TableDef {
        name: "expenses",
        columns: &[
            ("category", K::Varchar, true),
            ("description", K::Text, false),
            ("amount", K::Money, true),
            ("expenseDate", K::Date, true),
            ("paidTo", K::Varchar, false),
        ],
        references: &[],
    },
    TableDef {
        name: "revenue",
        columns: &[
            ("source", K::Varchar, true),
            ("amount", K::Money, true),
            ("revenueDate", K::Date, true),
            ("invoiceId", K::Uuid, false),
        ],
        references: &[("invoiceId", "invoices")],
    },
    TableDef {
        name: "compliance_records",
        columns: &[
            ("regulation", K::Varchar, true),
            ("requirement", K::Text, true),
            ("status", K::Varchar, true),
            ("dueDate", K::Date, false),
            ("reviewedBy", K::Uuid, false),
            ("evidence", K::Json, false),
        ],
        references: &[("reviewedBy", "users")],
    },
    TableDef {
        name: "data_access_logs",
        columns: &[
            ("userId", K::Uuid, false),
            ("patientId", K::Uuid, false),
            ("action", K::Varchar, true),
            ("resource", K::Varchar, true),
            ("accessedAt", K::Timestamp, true),
            ("ipAddress", K::Varchar, false),
        ],
        references: &[("userId", "users"), ("patientId", "patients")],
    },
    TableDef {
        name: "audit_logs",
        columns: &[
            ("userId", K::Uuid, false),
            ("action", K::Varchar, true),
            ("entity", K::Varchar, true),
            ("entityId", K::Varchar, false),
            ("changes", K::Json, false),
            ("ipAddress", K::Varchar, false),
        ],
        references: &[("userId", "users")],
    },
];

fn create_statement(def: &TableDef) -> TableCreateStatement {
    let mut table = Table::create();
    table
        .table(Alias::new(def.name))
        .if_not_exists()
        .col(&mut schema::id());
    for (name, kind, required) in def.columns {
        table.col(&mut kind.column(name, *required));
    }
    table
        .col(&mut schema::created_at())
        .col(&mut schema::updated_at());
    for (column, target) in def.references {
        let required = def
            .columns
            .iter()
            .any(|(name, _, required)| name == column && *required);
        let on_delete = if required {
            ForeignKeyAction::Cascade
        } else {
            ForeignKeyAction::SetNull
        };
        table.foreign_key(&mut schema::foreign_key(def.name, column, target, on_delete));
    }
    table.to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        conn.execute_unprepared(r#"CREATE EXTENSION IF NOT EXISTS "uuid-ossp""#)
            .await?;
        conn.execute_unprepared(&schema::create_enum("users_roles_enum", USER_ROLES))
            .await?;

        for def in TABLES {
            manager.create_table(create_statement(def)).await?;
        }

        conn.execute_unprepared(
            r#"ALTER TABLE "users" ADD "roles" "public"."users_roles_enum" array NOT NULL DEFAULT '{patient}'"#,
        )
        .await?;
        manager
            .create_index(schema::unique("users", &["email"]))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for def in TABLES.iter().rev() {
            manager.drop_table(schema::drop_table(def.name)).await?;
        }
        manager
            .get_connection()
            .execute_unprepared(&schema::drop_enum("users_roles_enum"))
            .await?;
        // uuid-ossp stays installed; it is database-wide and other schemas may use it.
        Ok(())
    }
}
