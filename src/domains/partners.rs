use serde_json::json;

use super::DomainSpec;
use crate::models::Domain;
use crate::sync::{FieldRule, OnMissing, Transform, ValueKind};

pub fn spec() -> DomainSpec {
    DomainSpec {
        domain: Domain::Partners,
        entity: "res.partner",
        key_columns: &["CODPARC"],
        key_fields: &["ref"],
        rules: vec![
            FieldRule::new(
                "ref",
                Transform::Copy {
                    column: "CODPARC",
                    kind: ValueKind::Text,
                },
            )
            .required(),
            FieldRule::new(
                "name",
                Transform::FirstOf {
                    columns: &["RAZAOSOCIAL", "NOMEPARC"],
                    fallback: Some("Parceiro {CODPARC}"),
                },
            )
            .required(),
            FieldRule::new(
                "company_type",
                Transform::Translate {
                    column: "TIPPESSOA",
                    table: &[("F", "person")],
                    default: Some("company"),
                },
            ),
            FieldRule::new(
                "is_company",
                Transform::Flag {
                    column: "TIPPESSOA",
                    truthy: &["F"],
                    if_true: json!(false),
                    if_false: json!(true),
                },
            ),
            FieldRule::new(
                "vat",
                Transform::Copy {
                    column: "CGC_CPF",
                    kind: ValueKind::Text,
                },
            ),
            FieldRule::new(
                "email",
                Transform::Copy {
                    column: "EMAIL",
                    kind: ValueKind::Text,
                },
            ),
            FieldRule::new(
                "phone",
                Transform::Copy {
                    column: "TELEFONE",
                    kind: ValueKind::Text,
                },
            ),
            FieldRule::new(
                "mobile",
                Transform::Copy {
                    column: "FAX",
                    kind: ValueKind::Text,
                },
            ),
            FieldRule::new(
                "zip",
                Transform::Copy {
                    column: "CEP",
                    kind: ValueKind::Text,
                },
            ),
            FieldRule::new(
                "street",
                Transform::Concat {
                    columns: &["NOMEEND", "NUMEND"],
                    separator: ", ",
                },
            ),
            FieldRule::new(
                "street2",
                Transform::FirstOf {
                    columns: &["COMPLEMENTO", "NOMEBAI"],
                    fallback: None,
                },
            ),
            FieldRule::new(
                "city",
                Transform::Copy {
                    column: "NOMECID",
                    kind: ValueKind::Text,
                },
            ),
            FieldRule::new(
                "country_id",
                Transform::Reference {
                    entity: "res.country",
                    key_field: "code",
                    column: "PAIS",
                    scope: None,
                    on_missing: OnMissing::Omit,
                },
            ),
            // State codes repeat across countries
            FieldRule::new(
                "state_id",
                Transform::Reference {
                    entity: "res.country.state",
                    key_field: "code",
                    column: "UF",
                    scope: Some("country_id"),
                    on_missing: OnMissing::Omit,
                },
            ),
            FieldRule::new(
                "customer_rank",
                Transform::Flag {
                    column: "CLIENTE",
                    truthy: &["S"],
                    if_true: json!(1),
                    if_false: json!(0),
                },
            ),
            FieldRule::new(
                "supplier_rank",
                Transform::Flag {
                    column: "FORNECEDOR",
                    truthy: &["S"],
                    if_true: json!(1),
                    if_false: json!(0),
                },
            ),
            FieldRule::new(
                "active",
                Transform::Copy {
                    column: "ATIVO",
                    kind: ValueKind::Bool,
                },
            )
            .or(true),
        ],
        hierarchy: None,
        create_guard: None,
        post_write: &[],
        parent_default: None,
        query: include_str!("../../queries/partners.sql"),
    }
}
