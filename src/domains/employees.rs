use serde_json::json;

use super::DomainSpec;
use crate::models::Domain;
use crate::sync::{FieldRule, OnMissing, Transform, ValueKind};

/// Employees come from the Rubi HR tables. Dismissed employees
/// (`SITAFA = 7`) are archived when present and never created.
pub fn spec() -> DomainSpec {
    DomainSpec {
        domain: Domain::Employees,
        entity: "hr.employee",
        key_columns: &["NUMCAD"],
        key_fields: &["barcode"],
        rules: vec![
            FieldRule::new(
                "barcode",
                Transform::Copy {
                    column: "NUMCAD",
                    kind: ValueKind::Text,
                },
            )
            .required(),
            FieldRule::new(
                "name",
                Transform::Copy {
                    column: "NOMFUN",
                    kind: ValueKind::Text,
                },
            )
            .required(),
            FieldRule::new(
                "identification_id",
                Transform::Copy {
                    column: "NUMCPF",
                    kind: ValueKind::Digits,
                },
            ),
            FieldRule::new(
                "job_title",
                Transform::Copy {
                    column: "CARGO",
                    kind: ValueKind::Text,
                },
            ),
            FieldRule::new(
                "department_id",
                Transform::Reference {
                    entity: "hr.department",
                    key_field: "name",
                    column: "SETOR",
                    scope: None,
                    on_missing: OnMissing::Create,
                },
            ),
            FieldRule::new(
                "active",
                Transform::Flag {
                    column: "SITAFA",
                    truthy: &["7"],
                    if_true: json!(false),
                    if_false: json!(true),
                },
            ),
        ],
        hierarchy: None,
        create_guard: Some("active"),
        post_write: &[],
        parent_default: None,
        query: include_str!("../../queries/employees.sql"),
    }
}
