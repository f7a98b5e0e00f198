//! Structural validation of decoded JSON values.
//!
//! A [`SchemaDescription`] names the fields a JSON object must carry, the primitive type of
//! each declared field, and an optional format hint. [`validate`] is pure: it never fails,
//! it reports every violation it finds as data.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        };
        f.write_str(s)
    }
}

/// Name of the JSON type a value actually has.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// At least one `@`, with a `.` somewhere after the first `@`.
    Email,
    /// Starts with `http://` or `https://`.
    Uri,
}

impl Format {
    pub fn check(self, s: &str) -> bool {
        match self {
            Format::Email => match s.split_once('@') {
                Some((_, domain)) => domain.contains('.'),
                None => false,
            },
            Format::Uri => s.starts_with("http://") || s.starts_with("https://"),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Email => f.write_str("email"),
            Format::Uri => f.write_str("uri"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(default)]
    pub nullable: bool,
}

impl FieldSpec {
    pub fn new(kind: FieldType) -> Self {
        Self {
            kind,
            format: None,
            nullable: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescription {
    #[serde(default)]
    pub properties: IndexMap<String, FieldSpec>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl SchemaDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldType) -> Self {
        self.properties.insert(name.into(), FieldSpec::new(kind));
        self
    }

    pub fn formatted(mut self, name: impl Into<String>, kind: FieldType, format: Format) -> Self {
        let mut spec = FieldSpec::new(kind);
        spec.format = Some(format);
        self.properties.insert(name.into(), spec);
        self
    }

    pub fn nullable(mut self, name: impl Into<String>, kind: FieldType) -> Self {
        let mut spec = FieldSpec::new(kind);
        spec.nullable = true;
        self.properties.insert(name.into(), spec);
        self
    }

    pub fn require<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(names.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub field: String,
    pub expected: FieldType,
    pub actual: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatViolation {
    pub field: String,
    pub format: Format,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations {
    pub missing_fields: Vec<String>,
    /// Required fields with no declared type that came back null.
    pub null_fields: Vec<String>,
    pub type_mismatches: Vec<TypeMismatch>,
    pub format_violations: Vec<FormatViolation>,
}

impl Violations {
    pub fn is_empty(&self) -> bool {
        self.missing_fields.is_empty()
            && self.null_fields.is_empty()
            && self.type_mismatches.is_empty()
            && self.format_violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.missing_fields.len()
            + self.null_fields.len()
            + self.type_mismatches.len()
            + self.format_violations.len()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::with_capacity(self.len());
        for name in &self.missing_fields {
            lines.push(format!("missing required field '{name}'"));
        }
        for name in &self.null_fields {
            lines.push(format!("required field '{name}' must not be null"));
        }
        for m in &self.type_mismatches {
            lines.push(format!(
                "field '{}' expected {}, got {}",
                m.field, m.expected, m.actual
            ));
        }
        for v in &self.format_violations {
            lines.push(format!(
                "field '{}' value {:?} is not a valid {}",
                v.field, v.value, v.format
            ));
        }
        f.write_str(&lines.join("; "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(Violations),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Root-level type problems are reported against this pseudo field.
pub const ROOT: &str = "$";

pub fn validate(value: &Value, schema: &SchemaDescription) -> ValidationResult {
    let mut out = Violations::default();

    let Some(obj) = value.as_object() else {
        out.type_mismatches.push(TypeMismatch {
            field: ROOT.to_string(),
            expected: FieldType::Object,
            actual: type_name(value),
        });
        out.missing_fields.extend(schema.required.iter().cloned());
        return ValidationResult::Invalid(out);
    };

    for name in &schema.required {
        let declared = schema.properties.get(name);
        match (obj.get(name), declared) {
            (None, _) => out.missing_fields.push(name.clone()),
            (Some(Value::Null), None) => out.null_fields.push(name.clone()),
            (Some(Value::Null), Some(spec)) if !spec.nullable => {
                out.type_mismatches.push(TypeMismatch {
                    field: name.clone(),
                    expected: spec.kind,
                    actual: "null",
                })
            }
            _ => {}
        }
    }

    for (name, spec) in &schema.properties {
        let Some(field) = obj.get(name) else { continue };
        if field.is_null() {
            // required nulls were reported above; optional nulls only fail if not nullable
            if !spec.nullable && !schema.required.contains(name) {
                out.type_mismatches.push(TypeMismatch {
                    field: name.clone(),
                    expected: spec.kind,
                    actual: "null",
                });
            }
            continue;
        }
        if !spec.kind.matches(field) {
            out.type_mismatches.push(TypeMismatch {
                field: name.clone(),
                expected: spec.kind,
                actual: type_name(field),
            });
            continue;
        }
        if let (Some(format), Some(s)) = (spec.format, field.as_str()) {
            if !format.check(s) {
                out.format_violations.push(FormatViolation {
                    field: name.clone(),
                    format,
                    value: s.to_string(),
                });
            }
        }
    }

    if out.is_empty() {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid(out)
    }
}

/// The user object served by the user-management API.
pub fn user_schema() -> SchemaDescription {
    SchemaDescription::new()
        .field("id", FieldType::Integer)
        .formatted("email", FieldType::String, Format::Email)
        .field("first_name", FieldType::String)
        .field("last_name", FieldType::String)
        .field("avatar", FieldType::String)
        .require(["id", "email", "first_name", "last_name"])
}

/// A post served by the fake-data CRUD API.
pub fn post_schema() -> SchemaDescription {
    SchemaDescription::new()
        .field("userId", FieldType::Integer)
        .field("id", FieldType::Integer)
        .field("title", FieldType::String)
        .field("body", FieldType::String)
        .require(["userId", "id", "title", "body"])
}
