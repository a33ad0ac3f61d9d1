//! Declarative schemas and validation
//!
//! A schema maps field names to [`FieldRule`]s. Validation walks fields in
//! schema order and, per field, checks required → type → range → nested
//! schema. The first violated rule is reported with the dotted path of the
//! field.
//!
//! Schemas can be built in code:
//!
//! ```rust
//! use confparse_core::schema::{FieldRule, Schema};
//! use confparse_core::value::ValueKind;
//!
//! let schema = Schema::new()
//!     .field("database", FieldRule::mapping(
//!         Schema::new().field("host", FieldRule::of(ValueKind::String).required()),
//!     ).required())
//!     .field("port", FieldRule::of(ValueKind::Number).min(1024.0).max(65535.0));
//! assert_eq!(schema.len(), 2);
//! ```
//!
//! or read from a YAML/JSON description with the same shape:
//!
//! ```yaml
//! database:
//!   required: true
//!   type: mapping
//!   schema:
//!     host: {required: true, type: string}
//! port: {type: number, min: 1024, max: 65535}
//! ```

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::expand::join_path;
use crate::loader::{self, Format};
use crate::value::{Value, ValueKind};

/// An ordered set of field rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: IndexMap<String, FieldRule>,
}

/// Constraints for a single field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRule {
    required: bool,
    kind: Option<ValueKind>,
    min: Option<f64>,
    max: Option<f64>,
    schema: Option<Schema>,
}

/// The numeric bound a value fell outside of
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Min(f64),
    Max(f64),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Min(min) => write!(f, "must be >= {}", min),
            Bound::Max(max) => write!(f, "must be <= {}", max),
        }
    }
}

impl FieldRule {
    /// A rule with no type constraint
    pub fn any() -> Self {
        Self::default()
    }

    /// A rule requiring the given kind
    pub fn of(kind: ValueKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// A mapping rule whose contents are checked against `schema`
    pub fn mapping(schema: Schema) -> Self {
        Self {
            kind: Some(ValueKind::Mapping),
            schema: Some(schema),
            ..Self::default()
        }
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Lower bound, applied when the value is numeric
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Upper bound, applied when the value is numeric
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn kind(&self) -> Option<ValueKind> {
        self.kind
    }

    pub fn range(&self) -> (Option<f64>, Option<f64>) {
        (self.min, self.max)
    }

    pub fn nested(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Check the type and range of a present value
    fn check_value(&self, path: &str, value: &Value) -> Option<Error> {
        if let Some(expected) = self.kind {
            let actual = value.kind();
            if actual != expected {
                return Some(Error::type_mismatch(path, expected, actual));
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.min {
                if n < min {
                    return Some(Error::range_violation(path, value.clone(), Bound::Min(min)));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Some(Error::range_violation(path, value.clone(), Bound::Max(max)));
                }
            }
        }

        None
    }

    /// Reject rule combinations that can never be satisfied or make no sense
    fn check(&self, path: &str) -> Result<()> {
        if self.schema.is_some() && self.kind != Some(ValueKind::Mapping) {
            return Err(Error::invalid_schema(
                path,
                "a nested schema requires type: mapping",
            ));
        }
        if let Some(kind) = self.kind {
            if kind != ValueKind::Number && (self.min.is_some() || self.max.is_some()) {
                return Err(Error::invalid_schema(
                    path,
                    format!("min/max only apply to numbers, but type is {}", kind),
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(Error::invalid_schema(
                    path,
                    format!("min ({}) is greater than max ({})", min, max),
                ));
            }
        }
        Ok(())
    }
}

impl Schema {
    /// An empty schema (accepts any mapping)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rule for a field
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    /// Look up the rule for a field
    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.fields.get(name)
    }

    /// Iterate over fields in schema order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Load a schema from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_value(&loader::load_str(yaml, Format::Yaml)?)
    }

    /// Load a schema from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(&loader::load_str(json, Format::Json)?)
    }

    /// Load a schema from a file (JSON or YAML based on extension)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_value(&loader::load(path)?)
    }

    /// Build a schema from a decoded description
    ///
    /// Each field takes the options `required`, `type`, `min`, `max` and
    /// `schema`. Unknown options and contradictory combinations fail with
    /// `InvalidSchema`.
    pub fn from_value(value: &Value) -> Result<Self> {
        schema_from_value(value, "")
    }

    /// Validate a document against this schema, stopping at the first error
    pub fn validate(&self, value: &Value) -> Result<()> {
        let mut errors = Vec::new();
        self.validate_root(value, &mut errors, true);
        match errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Validate and collect every error (instead of failing on first)
    ///
    /// Each field contributes at most one error, chosen by the same
    /// required → type → range order as [`Schema::validate`], so the first
    /// entry is always the error `validate` would return.
    pub fn validate_collect(&self, value: &Value) -> Vec<Error> {
        let mut errors = Vec::new();
        self.validate_root(value, &mut errors, false);
        errors
    }

    fn validate_root(&self, value: &Value, errors: &mut Vec<Error>, fail_fast: bool) {
        match value {
            Value::Mapping(map) => self.validate_mapping(map, "", errors, fail_fast),
            other => {
                let mut err = Error::type_mismatch("", ValueKind::Mapping, other.kind());
                err.path = None;
                errors.push(err);
            }
        }
    }

    fn validate_mapping(
        &self,
        map: &IndexMap<String, Value>,
        prefix: &str,
        errors: &mut Vec<Error>,
        fail_fast: bool,
    ) {
        for (field, rule) in &self.fields {
            if fail_fast && !errors.is_empty() {
                return;
            }

            let path = join_path(prefix, field);
            let Some(value) = map.get(field) else {
                if rule.required {
                    errors.push(Error::missing_required_field(path));
                }
                continue;
            };

            if let Some(err) = rule.check_value(&path, value) {
                errors.push(err);
                continue;
            }

            if let (Some(nested), Value::Mapping(inner)) = (&rule.schema, value) {
                log::trace!("Validating nested schema at '{}'", path);
                nested.validate_mapping(inner, &path, errors, fail_fast);
            }
        }
    }
}

fn schema_from_value(value: &Value, prefix: &str) -> Result<Schema> {
    let Value::Mapping(map) = value else {
        return Err(Error::invalid_schema(
            prefix,
            format!(
                "expected a mapping of field names to rules, got {}",
                value.kind()
            ),
        ));
    };

    let mut schema = Schema::new();
    for (field, rule_value) in map {
        let path = join_path(prefix, field);
        let rule = rule_from_value(rule_value, &path)?;
        rule.check(&path)?;
        schema.fields.insert(field.clone(), rule);
    }
    Ok(schema)
}

fn rule_from_value(value: &Value, path: &str) -> Result<FieldRule> {
    let Value::Mapping(options) = value else {
        return Err(Error::invalid_schema(
            path,
            format!("expected a mapping of rule options, got {}", value.kind()),
        ));
    };

    let mut rule = FieldRule::any();
    for (option, v) in options {
        match option.as_str() {
            "required" => {
                rule.required = v.as_bool().ok_or_else(|| {
                    Error::invalid_schema(path, format!("required must be a boolean, got {}", v))
                })?;
            }
            "type" => {
                let name = v.as_str().ok_or_else(|| {
                    Error::invalid_schema(path, format!("type must be a string, got {}", v))
                })?;
                let kind = name.parse::<ValueKind>().map_err(|e| {
                    Error::invalid_schema(path, e.cause.unwrap_or_default())
                })?;
                rule.kind = Some(kind);
            }
            "min" => rule.min = Some(number_option(v, "min", path)?),
            "max" => rule.max = Some(number_option(v, "max", path)?),
            "schema" => rule.schema = Some(schema_from_value(v, path)?),
            other => {
                return Err(Error::invalid_schema(
                    path,
                    format!("unknown rule option '{}'", other),
                ))
            }
        }
    }
    Ok(rule)
}

fn number_option(value: &Value, option: &str, path: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        Error::invalid_schema(path, format!("{} must be a number, got {}", option, value))
    })
}
