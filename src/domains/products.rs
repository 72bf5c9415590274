use serde_json::json;

use super::DomainSpec;
use crate::models::Domain;
use crate::sync::{FieldRule, OnMissing, Transform, ValueKind};

pub fn spec() -> DomainSpec {
    DomainSpec {
        domain: Domain::Products,
        entity: "product.template",
        key_columns: &["CODPROD"],
        key_fields: &["default_code"],
        rules: vec![
            FieldRule::new(
                "default_code",
                Transform::Copy {
                    column: "CODPROD",
                    kind: ValueKind::Text,
                },
            )
            .required(),
            FieldRule::new(
                "name",
                Transform::FirstOf {
                    columns: &["DESCRPROD"],
                    fallback: Some("Produto {CODPROD}"),
                },
            )
            .required(),
            FieldRule::new("list_price", Transform::Const(json!(0.0))),
            FieldRule::new(
                "weight",
                Transform::Copy {
                    column: "PESOBRUTO",
                    kind: ValueKind::Float,
                },
            )
            .or(0.0),
            FieldRule::new("sale_ok", Transform::Const(json!(false))),
            FieldRule::new("purchase_ok", Transform::Const(json!(true))),
            FieldRule::new(
                "type",
                Transform::Translate {
                    column: "USOPROD",
                    table: &[("S", "service")],
                    default: Some("consu"),
                },
            ),
            // Services never hold stock
            FieldRule::new(
                "is_storable",
                Transform::Flag {
                    column: "USOPROD",
                    truthy: &["S"],
                    if_true: json!(false),
                    if_false: json!(true),
                },
            ),
            FieldRule::new(
                "barcode",
                Transform::Copy {
                    column: "REFFORN",
                    kind: ValueKind::Text,
                },
            ),
            FieldRule::new(
                "uom_id",
                Transform::Reference {
                    entity: "uom.uom",
                    key_field: "name",
                    column: "CODVOL",
                    scope: None,
                    on_missing: OnMissing::Omit,
                },
            ),
            FieldRule::new(
                "uom_po_id",
                Transform::Reference {
                    entity: "uom.uom",
                    key_field: "name",
                    column: "CODVOL",
                    scope: None,
                    on_missing: OnMissing::Omit,
                },
            ),
            FieldRule::new(
                "categ_id",
                Transform::Reference {
                    entity: "product.category",
                    key_field: "x_sankhya_id",
                    column: "CODGRUPOPROD",
                    scope: None,
                    on_missing: OnMissing::Omit,
                },
            ),
        ],
        hierarchy: None,
        create_guard: None,
        post_write: &[],
        parent_default: None,
        query: include_str!("../../queries/products.sql"),
    }
}
