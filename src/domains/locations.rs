use serde_json::json;

use super::DomainSpec;
use crate::models::Domain;
use crate::sync::{FieldRule, HierarchySpec, Transform, ValueKind};

pub fn spec() -> DomainSpec {
    DomainSpec {
        domain: Domain::Locations,
        entity: "stock.location",
        key_columns: &["CODLOCAL"],
        key_fields: &["barcode"],
        rules: vec![
            FieldRule::new(
                "barcode",
                Transform::Copy {
                    column: "CODLOCAL",
                    kind: ValueKind::Text,
                },
            )
            .required(),
            FieldRule::new(
                "name",
                Transform::FirstOf {
                    columns: &["DESCRLOCAL"],
                    fallback: Some("Local {CODLOCAL}"),
                },
            )
            .required(),
            FieldRule::new("usage", Transform::Const(json!("internal"))),
            FieldRule::new("active", Transform::Const(json!(true))),
        ],
        hierarchy: Some(HierarchySpec {
            parent_field: "location_id",
            parent_column: "CODLOCALPAI",
            depth_column: "GRAU",
        }),
        create_guard: None,
        post_write: &[],
        parent_default: None,
        query: include_str!("../../queries/locations.sql"),
    }
}
