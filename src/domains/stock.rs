use super::DomainSpec;
use crate::models::Domain;
use crate::sync::{FieldRule, OnMissing, Transform, ValueKind};

/// On-hand quantities per product and location. Each write sets the counted
/// quantity, then applies it as an inventory adjustment. Older servers name
/// the apply method `apply_inventory`.
pub fn spec() -> DomainSpec {
    DomainSpec {
        domain: Domain::Stock,
        entity: "stock.quant",
        key_columns: &["CODPROD", "CODLOCAL"],
        key_fields: &["product_id", "location_id"],
        rules: vec![
            FieldRule::new(
                "product_id",
                Transform::Reference {
                    entity: "product.product",
                    key_field: "default_code",
                    column: "CODPROD",
                    scope: None,
                    on_missing: OnMissing::Skip,
                },
            )
            .required(),
            FieldRule::new(
                "location_id",
                Transform::Reference {
                    entity: "stock.location",
                    key_field: "barcode",
                    column: "CODLOCAL",
                    scope: None,
                    on_missing: OnMissing::Skip,
                },
            )
            .required(),
            FieldRule::new(
                "inventory_quantity",
                Transform::Copy {
                    column: "ESTOQUE",
                    kind: ValueKind::Float,
                },
            )
            .or(0.0),
        ],
        hierarchy: None,
        create_guard: None,
        post_write: &["action_apply_inventory", "apply_inventory"],
        parent_default: None,
        query: include_str!("../../queries/stock.sql"),
    }
}
