//! Declarative field constraints and the generic validator that interprets them.
//!
//! Each entity publishes a static [`Schema`]: a list of [`FieldRule`]s keyed by
//! a field path. Paths are dotted (`address.country`) and may descend into
//! arrays with a `[]` suffix (`lineItems[].quantity`). The validator works on
//! the JSON form of a document, so the same schema checks raw route-layer
//! input, partial patches, and fully derived documents before persistence.

use crate::error::{Error, FieldViolation, Result};
use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// JSON shape a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    /// RFC 3339 timestamp string.
    Timestamp,
    Array,
    Object,
}

/// Named string matcher.
#[derive(Clone, Copy)]
pub struct Pattern {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

pub fn is_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

pub const EMAIL: Pattern = Pattern {
    name: "email address",
    matches: is_email,
};

/// Constraint set for one field path.
#[derive(Clone, Copy)]
pub struct FieldRule {
    pub path: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Computed by the store; ignored when validating client input.
    pub derived: bool,
    pub max_len: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub one_of: Option<&'static [&'static str]>,
    pub pattern: Option<Pattern>,
}

impl FieldRule {
    const fn of(path: &'static str, kind: FieldKind) -> Self {
        FieldRule {
            path,
            kind,
            required: false,
            derived: false,
            max_len: None,
            min: None,
            max: None,
            one_of: None,
            pattern: None,
        }
    }

    pub const fn string(path: &'static str) -> Self {
        Self::of(path, FieldKind::String)
    }

    pub const fn number(path: &'static str) -> Self {
        Self::of(path, FieldKind::Number)
    }

    pub const fn boolean(path: &'static str) -> Self {
        Self::of(path, FieldKind::Boolean)
    }

    pub const fn timestamp(path: &'static str) -> Self {
        Self::of(path, FieldKind::Timestamp)
    }

    pub const fn array(path: &'static str) -> Self {
        Self::of(path, FieldKind::Array)
    }

    pub const fn object(path: &'static str) -> Self {
        Self::of(path, FieldKind::Object)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn derived(mut self) -> Self {
        self.derived = true;
        self
    }

    pub const fn max_len(mut self, n: usize) -> Self {
        self.max_len = Some(n);
        self
    }

    pub const fn min(mut self, v: f64) -> Self {
        self.min = Some(v);
        self
    }

    pub const fn max(mut self, v: f64) -> Self {
        self.max = Some(v);
        self
    }

    pub const fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.one_of = Some(values);
        self
    }

    pub const fn pattern(mut self, p: Pattern) -> Self {
        self.pattern = Some(p);
        self
    }
}

/// Which checks apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Fully derived document about to be persisted.
    Document,
    /// Client create payload: derived fields are skipped.
    Input,
    /// Client patch payload: derived fields and `required` are skipped.
    Patch,
}

/// Field constraints for one entity type.
pub struct Schema {
    pub entity: &'static str,
    pub fields: &'static [FieldRule],
}

impl Schema {
    pub const fn new(entity: &'static str, fields: &'static [FieldRule]) -> Self {
        Schema { entity, fields }
    }

    /// Validate a complete document, derived fields included.
    pub fn validate(&self, doc: &Value) -> Result<()> {
        self.run(doc, Mode::Document)
    }

    /// Validate a create payload as received from a client.
    pub fn validate_input(&self, input: &Value) -> Result<()> {
        self.run(input, Mode::Input)
    }

    /// Validate a partial update payload as received from a client.
    pub fn validate_patch(&self, patch: &Value) -> Result<()> {
        self.run(patch, Mode::Patch)
    }

    pub fn rule(&self, path: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|r| r.path == path)
    }

    fn run(&self, value: &Value, mode: Mode) -> Result<()> {
        if !value.is_object() {
            return Err(Error::invalid(self.entity, "must be an object"));
        }

        let mut violations = Vec::new();
        for rule in self.fields {
            if rule.derived && mode != Mode::Document {
                continue;
            }
            let segments: Vec<&str> = rule.path.split('.').collect();
            let mut slots = Vec::new();
            resolve(value, &segments, String::new(), &mut slots);
            for (path, slot) in slots {
                check(rule, &path, slot, mode, &mut violations);
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(violations))
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Expand a rule path into concrete `(path, value)` slots.
///
/// A missing leaf yields `(path, None)`. Array segments expand to one slot per
/// element; an absent array expands to nothing.
fn resolve<'a>(
    value: &'a Value,
    segments: &[&str],
    prefix: String,
    out: &mut Vec<(String, Option<&'a Value>)>,
) {
    let Some((head, rest)) = segments.split_first() else {
        out.push((prefix, Some(value)));
        return;
    };

    if let Some(name) = head.strip_suffix("[]") {
        let path = join(&prefix, name);
        if let Some(Value::Array(items)) = value.get(name) {
            for (i, item) in items.iter().enumerate() {
                resolve(item, rest, format!("{}[{}]", path, i), out);
            }
        }
        return;
    }

    let path = join(&prefix, head);
    match value.get(*head) {
        Some(v) if !v.is_null() => resolve(v, rest, path, out),
        _ => {
            let mut full = path;
            for seg in rest {
                full = join(&full, seg.trim_end_matches("[]"));
            }
            if !rest.iter().any(|s| s.ends_with("[]")) {
                out.push((full, None));
            }
        }
    }
}

fn check(
    rule: &FieldRule,
    path: &str,
    slot: Option<&Value>,
    mode: Mode,
    out: &mut Vec<FieldViolation>,
) {
    let enforce_required = rule.required && mode != Mode::Patch;

    let value = match slot {
        Some(v) => v,
        None => {
            if enforce_required {
                out.push(FieldViolation::new(path, "is required"));
            }
            return;
        }
    };

    match rule.kind {
        FieldKind::String => {
            let Some(s) = value.as_str() else {
                out.push(FieldViolation::new(path, "must be a string"));
                return;
            };
            if s.trim().is_empty() {
                if enforce_required {
                    out.push(FieldViolation::new(path, "is required"));
                }
                return;
            }
            if let Some(max) = rule.max_len {
                if s.chars().count() > max {
                    out.push(FieldViolation::new(
                        path,
                        format!("must be at most {} characters", max),
                    ));
                }
            }
            if let Some(allowed) = rule.one_of {
                if !allowed.contains(&s) {
                    out.push(FieldViolation::new(
                        path,
                        format!("must be one of: {}", allowed.join(", ")),
                    ));
                }
            }
            if let Some(p) = rule.pattern {
                if !(p.matches)(s) {
                    out.push(FieldViolation::new(path, format!("is not a valid {}", p.name)));
                }
            }
        }
        FieldKind::Number => {
            let Some(n) = value.as_f64() else {
                out.push(FieldViolation::new(path, "must be a number"));
                return;
            };
            if let Some(min) = rule.min {
                if n < min {
                    out.push(FieldViolation::new(path, format!("must be >= {}", min)));
                }
            }
            if let Some(max) = rule.max {
                if n > max {
                    out.push(FieldViolation::new(path, format!("must be <= {}", max)));
                }
            }
        }
        FieldKind::Boolean => {
            if !value.is_boolean() {
                out.push(FieldViolation::new(path, "must be a boolean"));
            }
        }
        FieldKind::Timestamp => {
            let valid = value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok());
            if !valid {
                out.push(FieldViolation::new(path, "must be an RFC 3339 timestamp"));
            }
        }
        FieldKind::Array => {
            if !value.is_array() {
                out.push(FieldViolation::new(path, "must be an array"));
            }
        }
        FieldKind::Object => {
            if !value.is_object() {
                out.push(FieldViolation::new(path, "must be an object"));
            }
        }
    }
}
