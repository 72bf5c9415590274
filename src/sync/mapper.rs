//! Declarative row to record mapping.
//!
//! A domain is described by an ordered list of [`FieldRule`]s. Mapping is
//! pure: references are resolved by the engine beforehand and handed in as
//! ids keyed by destination field.

use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;

use super::error::MappingError;
use crate::models::{DestinationRecord, SourceRow, Value};
use crate::store::DestinationId;

/// Reference ids resolved for one row, keyed by destination field.
pub type ResolvedRefs = HashMap<&'static str, DestinationId>;

/// Target type of a copied column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Bool,
    /// Text reduced to its digits (tax ids, NCM codes).
    Digits,
}

/// What to do when a referenced record is not in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
    /// Leave the field out of the record.
    Omit,
    /// Report the row as skipped.
    Skip,
    /// Create the referenced record from the key value alone.
    Create,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Copy {
        column: &'static str,
        kind: ValueKind,
    },
    Const(JsonValue),
    /// Case-insensitive lookup of the column value in `table`.
    Translate {
        column: &'static str,
        table: &'static [(&'static str, &'static str)],
        default: Option<&'static str>,
    },
    /// Non-empty columns joined by `separator`.
    Concat {
        columns: &'static [&'static str],
        separator: &'static str,
    },
    /// Template with `{COLUMN}` placeholders. Renders only when every
    /// placeholder has a value, else the `fallback` template is used.
    Format {
        template: &'static str,
        fallback: Option<&'static str>,
    },
    /// First non-empty column, else the `fallback` template.
    FirstOf {
        columns: &'static [&'static str],
        fallback: Option<&'static str>,
    },
    /// Id of the `entity` record whose `key_field` equals the column value.
    /// With a `scope`, the lookup also matches that field of the entity
    /// against the id already resolved for the same field of this record.
    Reference {
        entity: &'static str,
        key_field: &'static str,
        column: &'static str,
        scope: Option<&'static str>,
        on_missing: OnMissing,
    },
    /// `if_true` when the column value is one of `truthy`, else `if_false`.
    Flag {
        column: &'static str,
        truthy: &'static [&'static str],
        if_true: JsonValue,
        if_false: JsonValue,
    },
}

impl Transform {
    /// Columns read by this transform, for error messages.
    fn columns(&self) -> String {
        match self {
            Transform::Copy { column, .. }
            | Transform::Translate { column, .. }
            | Transform::Reference { column, .. }
            | Transform::Flag { column, .. } => column.to_string(),
            Transform::Concat { columns, .. } | Transform::FirstOf { columns, .. } => {
                columns.join(", ")
            }
            Transform::Format { template, .. } => placeholders(template).join(", "),
            Transform::Const(_) => "(constant)".to_string(),
        }
    }

    /// Entity and key fields a reference is looked up by.
    pub fn reference_target(&self) -> Option<(&'static str, Vec<&'static str>)> {
        match self {
            Transform::Reference {
                entity,
                key_field,
                scope,
                ..
            } => {
                let mut fields = vec![*key_field];
                fields.extend(*scope);
                Some((*entity, fields))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub field: &'static str,
    pub transform: Transform,
    pub required: bool,
    pub default: Option<JsonValue>,
}

impl FieldRule {
    pub fn new(field: &'static str, transform: Transform) -> Self {
        Self {
            field,
            transform,
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value written when the transform yields nothing.
    pub fn or(mut self, default: impl Into<JsonValue>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Maps one row. Malformed values always fail the row; missing values fall
/// back to the rule default, fail a required rule, or leave the field out.
pub fn map_record(
    row: &SourceRow,
    rules: &[FieldRule],
    refs: &ResolvedRefs,
) -> Result<DestinationRecord, MappingError> {
    let mut record = DestinationRecord::new();
    for rule in rules {
        match (apply(row, rule, refs)?, &rule.default) {
            (Some(value), _) => record.insert(rule.field, value),
            (None, Some(default)) => record.insert(rule.field, default.clone()),
            (None, None) if rule.required => {
                return Err(MappingError::MissingRequired {
                    field: rule.field.to_string(),
                    column: rule.transform.columns(),
                })
            }
            (None, None) => {}
        }
    }
    Ok(record)
}

fn apply(
    row: &SourceRow,
    rule: &FieldRule,
    refs: &ResolvedRefs,
) -> Result<Option<JsonValue>, MappingError> {
    let value = match &rule.transform {
        Transform::Copy { column, kind } => copy(row.get(column), column, *kind)?,
        Transform::Const(value) => Some(value.clone()),
        Transform::Translate {
            column,
            table,
            default,
        } => {
            let found = row.text(column).and_then(|text| {
                table
                    .iter()
                    .find(|(from, _)| from.eq_ignore_ascii_case(&text))
                    .map(|(_, to)| *to)
            });
            found.or(*default).map(|to| json!(to))
        }
        Transform::Concat { columns, separator } => {
            let parts: Vec<String> = columns.iter().filter_map(|c| row.text(c)).collect();
            (!parts.is_empty()).then(|| json!(parts.join(*separator)))
        }
        Transform::Format { template, fallback } => render_complete(template, row)
            .or_else(|| fallback.and_then(|template| render(template, row)))
            .map(JsonValue::String),
        Transform::FirstOf { columns, fallback } => columns
            .iter()
            .find_map(|c| row.text(c))
            .or_else(|| fallback.and_then(|template| render(template, row)))
            .map(JsonValue::String),
        Transform::Reference { .. } => refs.get(rule.field).map(|id| json!(id)),
        Transform::Flag {
            column,
            truthy,
            if_true,
            if_false,
        } => {
            let hit = row
                .text(column)
                .is_some_and(|text| truthy.iter().any(|t| t.eq_ignore_ascii_case(&text)));
            Some(if hit { if_true.clone() } else { if_false.clone() })
        }
    };
    Ok(value)
}

fn copy(value: &Value, column: &str, kind: ValueKind) -> Result<Option<JsonValue>, MappingError> {
    let invalid = |expected: &'static str, raw: String| MappingError::Invalid {
        column: column.to_string(),
        expected,
        value: raw,
    };

    let converted = match kind {
        ValueKind::Text => value.as_text().map(JsonValue::String),
        ValueKind::Integer => value
            .as_i64()
            .map_err(|raw| invalid("an integer", raw))?
            .map(|i| json!(i)),
        ValueKind::Float => value
            .as_f64()
            .map_err(|raw| invalid("a number", raw))?
            .map(|f| json!(f)),
        ValueKind::Bool => value
            .as_bool()
            .map_err(|raw| invalid("a flag", raw))?
            .map(JsonValue::Bool),
        ValueKind::Digits => value
            .as_text()
            .map(|text| text.chars().filter(char::is_ascii_digit).collect::<String>())
            .filter(|digits| !digits.is_empty())
            .map(JsonValue::String),
    };
    Ok(converted)
}

fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                names.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

/// Like [`render`], but `None` unless every placeholder has a value.
fn render_complete(template: &str, row: &SourceRow) -> Option<String> {
    placeholders(template)
        .iter()
        .all(|name| row.text(name).is_some())
        .then(|| render(template, row))
        .flatten()
}

/// Fills `{COLUMN}` placeholders. `None` when every placeholder is empty.
fn render(template: &str, row: &SourceRow) -> Option<String> {
    let names = placeholders(template);
    let mut rendered = template.to_string();
    let mut any = names.is_empty();
    for name in names {
        let text = row.text(name);
        any |= text.is_some();
        rendered = rendered.replace(&format!("{{{}}}", name), &text.unwrap_or_default());
    }
    let rendered = rendered.trim().to_string();
    (any && !rendered.is_empty()).then_some(rendered)
}
