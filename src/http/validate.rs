//! Request-body field validation
//!
//! Bodies arrive as loose JSON objects. [`Form`] pulls typed fields out of
//! them and collects per-field messages; `finish` turns any collected
//! messages into a 400 keyed by field name.

use crate::error::{AppError, AppResult, FieldErrors};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));

#[derive(Debug)]
pub struct Form {
    fields: Map<String, Value>,
    errors: FieldErrors,
}

impl Form {
    pub fn new(body: Value) -> AppResult<Self> {
        match body {
            Value::Object(fields) => Ok(Self {
                fields,
                errors: FieldErrors::new(),
            }),
            other => Err(AppError::field(
                "non_field_errors",
                format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    json_type_name(&other)
                ),
            )),
        }
    }

    pub fn add_error<F: Into<String>, M: Into<String>>(&mut self, field: F, message: M) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|v| !v.is_null())
    }

    /// Present and explicitly `null`
    pub fn is_null(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(Value::Null))
    }

    pub fn raw(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    pub fn take_raw(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field).filter(|v| !v.is_null())
    }

    fn as_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// A string that may be absent; present values must not be blank
    pub fn optional_str(&mut self, field: &str) -> Option<String> {
        let value = self.raw(field)?.clone();
        match Self::as_text(&value) {
            Some(text) if text.trim().is_empty() => {
                self.add_error(field, BLANK);
                None
            }
            Some(text) => Some(text.trim().to_string()),
            None => {
                self.add_error(field, "Not a valid string.");
                None
            }
        }
    }

    /// Like `optional_str` but blank strings are allowed
    pub fn optional_text(&mut self, field: &str) -> Option<String> {
        let value = self.raw(field)?.clone();
        match Self::as_text(&value) {
            Some(text) => Some(text.trim().to_string()),
            None => {
                self.add_error(field, "Not a valid string.");
                None
            }
        }
    }

    pub fn required_str(&mut self, field: &str) -> String {
        if !self.has(field) {
            self.add_error(field, REQUIRED);
            return String::new();
        }
        self.optional_str(field).unwrap_or_default()
    }

    /// Passwords are taken verbatim, without trimming
    pub fn required_secret(&mut self, field: &str) -> String {
        match self.raw(field).cloned() {
            None => {
                self.add_error(field, REQUIRED);
                String::new()
            }
            Some(Value::String(s)) if s.is_empty() => {
                self.add_error(field, BLANK);
                String::new()
            }
            Some(Value::String(s)) => s,
            Some(_) => {
                self.add_error(field, "Not a valid string.");
                String::new()
            }
        }
    }

    pub fn min_length(&mut self, field: &str, value: &str, min: usize) {
        if !value.is_empty() && value.chars().count() < min {
            self.add_error(
                field,
                format!("Ensure this field has at least {min} characters."),
            );
        }
    }

    pub fn max_length(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add_error(
                field,
                format!("Ensure this field has no more than {max} characters."),
            );
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if !value.is_empty() && !EMAIL_PATTERN.is_match(value) {
            self.add_error(field, "Enter a valid email address.");
        }
    }

    pub fn optional_i64(&mut self, field: &str) -> Option<i64> {
        let value = self.raw(field)?.clone();
        let parsed = match &value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        if parsed.is_none() {
            self.add_error(field, "A valid integer is required.");
        }
        parsed
    }

    pub fn required_i64(&mut self, field: &str) -> i64 {
        if !self.has(field) {
            self.add_error(field, REQUIRED);
            return 0;
        }
        self.optional_i64(field).unwrap_or_default()
    }

    pub fn optional_decimal(&mut self, field: &str) -> Option<Decimal> {
        let value = self.raw(field)?.clone();
        let parsed = parse_decimal_value(&value);
        if parsed.is_none() {
            self.add_error(field, "A valid number is required.");
        }
        parsed
    }

    pub fn optional_bool(&mut self, field: &str) -> Option<bool> {
        let value = self.raw(field)?.clone();
        let parsed = match &value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        };
        if parsed.is_none() {
            self.add_error(field, "Must be a valid boolean.");
        }
        parsed
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }
}

/// Accepts `12.5`, `"12.50"` and `12`
pub fn parse_decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
