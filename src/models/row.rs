use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar value produced by the source engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

static NULL: Value = Value::Null;

impl Value {
    /// Converts a JSON scalar returned by a remote source into a `Value`.
    ///
    /// Arrays and objects are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    /// True for null and for text that is empty after trimming.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed textual form, `None` when empty.
    ///
    /// Whole floats render without a fractional part so that numeric codes
    /// (`10.0`) match their textual form (`"10"`).
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Value::Null => return None,
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{}", *f as i64)
                } else {
                    f.to_string()
                }
            }
            Value::Text(s) => s.trim().to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Numeric view. Accepts a decimal comma in text (`"1,5"`).
    pub fn as_f64(&self) -> Result<Option<f64>, String> {
        match self {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i as f64)),
            Value::Float(f) => Ok(Some(*f)),
            Value::Bool(b) => Err(b.to_string()),
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .replace(',', ".")
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| trimmed.to_string())
            }
        }
    }

    pub fn as_i64(&self) -> Result<Option<i64>, String> {
        match self {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i)),
            Value::Float(f) if f.fract() == 0.0 => Ok(Some(*f as i64)),
            Value::Float(f) => Err(f.to_string()),
            Value::Bool(b) => Err(b.to_string()),
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| trimmed.to_string())
            }
        }
    }

    /// Boolean view. Understands the `S`/`N` flags used by the ERP.
    pub fn as_bool(&self) -> Result<Option<bool>, String> {
        match self {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            Value::Integer(0) => Ok(Some(false)),
            Value::Integer(1) => Ok(Some(true)),
            Value::Integer(i) => Err(i.to_string()),
            Value::Float(f) => Err(f.to_string()),
            Value::Text(s) => match s.trim().to_uppercase().as_str() {
                "" => Ok(None),
                "S" | "Y" | "SIM" | "YES" | "TRUE" | "1" => Ok(Some(true)),
                "N" | "NAO" | "NÃO" | "NO" | "FALSE" | "0" => Ok(Some(false)),
                _ => Err(s.trim().to_string()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "{}", text),
            None => write!(f, "null"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One row returned by the source: ordered column/value pairs.
///
/// Column lookups ignore case because source engines disagree on how they
/// report identifiers.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SourceRow {
    columns: Vec<(String, Value)>,
}

impl SourceRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for fixtures.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    /// Appends a column, replacing an existing column with the same name.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self
            .columns
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(&column))
        {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> &Value {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
            .unwrap_or(&NULL)
    }

    /// Shorthand for `get(column).as_text()`.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).as_text()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SourceRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = SourceRow::new();
        for (column, value) in iter {
            row.push(column, value);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_is_case_insensitive() {
        let row = SourceRow::new().with("CODPROD", 10);
        assert_eq!(row.get("codprod"), &Value::Integer(10));
        assert_eq!(row.get("missing"), &Value::Null);
    }

    #[test]
    fn test_push_replaces_existing_column() {
        let mut row = SourceRow::new().with("NAME", "a");
        row.push("name", "b");
        assert_eq!(row.len(), 1);
        assert_eq!(row.text("NAME").as_deref(), Some("b"));
    }

    #[test]
    fn test_as_text_trims_and_formats_whole_floats() {
        assert_eq!(Value::from("  A1 ").as_text().as_deref(), Some("A1"));
        assert_eq!(Value::Float(10.0).as_text().as_deref(), Some("10"));
        assert_eq!(Value::Float(1.5).as_text().as_deref(), Some("1.5"));
        assert_eq!(Value::from("   ").as_text(), None);
        assert_eq!(Value::Null.as_text(), None);
    }

    #[test]
    fn test_as_f64_accepts_decimal_comma() {
        assert_eq!(Value::from("1,5").as_f64(), Ok(Some(1.5)));
        assert_eq!(Value::Integer(3).as_f64(), Ok(Some(3.0)));
        assert_eq!(Value::from("").as_f64(), Ok(None));
        assert_eq!(Value::from("abc").as_f64(), Err("abc".to_string()));
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::Float(7.0).as_i64(), Ok(Some(7)));
        assert!(Value::Float(7.2).as_i64().is_err());
        assert_eq!(Value::from(" 42 ").as_i64(), Ok(Some(42)));
    }

    #[test]
    fn test_as_bool_understands_erp_flags() {
        assert_eq!(Value::from("S").as_bool(), Ok(Some(true)));
        assert_eq!(Value::from("n").as_bool(), Ok(Some(false)));
        assert_eq!(Value::Integer(1).as_bool(), Ok(Some(true)));
        assert!(Value::from("maybe").as_bool().is_err());
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            Value::from_json(&serde_json::json!(12)),
            Value::Integer(12)
        );
        assert_eq!(
            Value::from_json(&serde_json::json!(1.25)),
            Value::Float(1.25)
        );
        assert_eq!(
            Value::from_json(&serde_json::json!("x")),
            Value::Text("x".into())
        );
        assert_eq!(Value::from_json(&serde_json::Value::Null), Value::Null);
    }
}
