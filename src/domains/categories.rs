use super::DomainSpec;
use crate::models::Domain;
use crate::sync::{FieldRule, HierarchySpec, Transform, ValueKind};

/// Product groups (TGFGRU). Odoo has no field for the Sankhya code, so it is
/// kept in the custom field `x_sankhya_id`.
pub fn spec() -> DomainSpec {
    DomainSpec {
        domain: Domain::Categories,
        entity: "product.category",
        key_columns: &["CODGRUPOPROD"],
        key_fields: &["x_sankhya_id"],
        rules: vec![
            FieldRule::new(
                "x_sankhya_id",
                Transform::Copy {
                    column: "CODGRUPOPROD",
                    kind: ValueKind::Text,
                },
            )
            .required(),
            FieldRule::new(
                "name",
                Transform::Format {
                    template: "[{CODGRUPOPROD}] {DESCRGRUPOPROD}",
                    fallback: Some("[{CODGRUPOPROD}] Grupo {CODGRUPOPROD}"),
                },
            )
            .required(),
        ],
        hierarchy: Some(HierarchySpec {
            parent_field: "parent_id",
            parent_column: "CODGRUPAI",
            depth_column: "GRAU",
        }),
        create_guard: None,
        post_write: &[],
        parent_default: None,
        query: include_str!("../../queries/categories.sql"),
    }
}
