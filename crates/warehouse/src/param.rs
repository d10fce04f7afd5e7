//! Query parameter bindings and placeholder validation.
//!
//! Templates use either `?` positional placeholders or `@name` named
//! placeholders; the two styles must never be mixed in one template. Only
//! the standard SQL dialect supports placeholders, so every submission made
//! through [`crate::QueryRunner`] requests standard SQL.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::WarehouseError;
use crate::result::Value;

/// Declared scalar type tag for a query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScalarType {
    String,
    Int64,
    Float64,
    Bool,
    Timestamp,
}

impl ScalarType {
    /// Wire form of the type tag ("STRING", "INT64", ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::String => "STRING",
            ScalarType::Int64 => "INT64",
            ScalarType::Float64 => "FLOAT64",
            ScalarType::Bool => "BOOL",
            ScalarType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed scalar binding for a query template.
///
/// Positional bindings carry no name and are applied in the order the `?`
/// markers appear, left to right. Named bindings match one `@identifier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: Option<String>,
    pub ty: ScalarType,
    pub value: Value,
}

impl QueryParameter {
    /// Binding for a `?` placeholder.
    pub fn positional(ty: ScalarType, value: impl Into<Value>) -> Self {
        Self {
            name: None,
            ty,
            value: value.into(),
        }
    }

    /// Binding for an `@name` placeholder.
    pub fn named(name: impl Into<String>, ty: ScalarType, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            value: value.into(),
        }
    }
}

/// Placeholder style of a validated template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterMode {
    /// Template uses `?` markers.
    Positional,
    /// Template uses `@name` markers.
    Named,
    /// Template has no placeholders (and no bindings).
    None,
}

/// Placeholders found in a template.
#[derive(Debug, Default, PartialEq, Eq)]
struct PlaceholderScan {
    /// Number of `?` markers.
    positional: usize,
    /// Distinct `@name` identifiers, in order of first appearance.
    named: Vec<String>,
}

/// Scan a template for placeholders, skipping `'...'` and `"..."` string
/// literals and `` `...` `` quoted identifiers so markers inside literals
/// are not counted. Backslash escapes inside quotes are honoured.
fn scan_placeholders(sql: &str) -> PlaceholderScan {
    let mut scan = PlaceholderScan::default();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                let quote = c;
                while let Some(inner) = chars.next() {
                    if inner == '\\' {
                        chars.next();
                    } else if inner == quote {
                        break;
                    }
                }
            }
            '?' => scan.positional += 1,
            '@' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Bare '@' with no identifier is not a placeholder.
                if !name.is_empty() && !scan.named.contains(&name) {
                    scan.named.push(name);
                }
            }
            _ => {}
        }
    }

    scan
}

/// Validate that `params` matches the placeholder style and shape of `sql`.
///
/// Runs locally, before any submission request. Returns the template's
/// [`ParameterMode`] on success and [`WarehouseError::InvalidParameterStyle`]
/// on any mismatch: mixed styles, count mismatch, unknown or duplicate or
/// missing names.
pub fn validate_bindings(
    sql: &str,
    params: &[QueryParameter],
) -> Result<ParameterMode, WarehouseError> {
    let scan = scan_placeholders(sql);

    if scan.positional > 0 && !scan.named.is_empty() {
        return Err(WarehouseError::InvalidParameterStyle(format!(
            "template mixes {} positional and {} named placeholders",
            scan.positional,
            scan.named.len(),
        )));
    }

    let named_count = params.iter().filter(|p| p.name.is_some()).count();
    if named_count > 0 && named_count < params.len() {
        return Err(WarehouseError::InvalidParameterStyle(
            "bindings mix named and positional entries".into(),
        ));
    }

    if scan.positional > 0 {
        if named_count > 0 {
            return Err(WarehouseError::InvalidParameterStyle(
                "positional template given named bindings".into(),
            ));
        }
        if params.len() != scan.positional {
            return Err(WarehouseError::InvalidParameterStyle(format!(
                "template has {} positional placeholders but {} bindings were supplied",
                scan.positional,
                params.len(),
            )));
        }
        return Ok(ParameterMode::Positional);
    }

    if !scan.named.is_empty() {
        if named_count != params.len() {
            return Err(WarehouseError::InvalidParameterStyle(
                "named template given positional bindings".into(),
            ));
        }
        let mut seen: Vec<&str> = Vec::with_capacity(params.len());
        for param in params {
            let name = param.name.as_deref().unwrap_or_default();
            if seen.contains(&name) {
                return Err(WarehouseError::InvalidParameterStyle(format!(
                    "duplicate binding for @{name}",
                )));
            }
            if !scan.named.iter().any(|n| n == name) {
                return Err(WarehouseError::InvalidParameterStyle(format!(
                    "binding @{name} does not appear in the template",
                )));
            }
            seen.push(name);
        }
        for name in &scan.named {
            if !seen.contains(&name.as_str()) {
                return Err(WarehouseError::InvalidParameterStyle(format!(
                    "no binding supplied for @{name}",
                )));
            }
        }
        return Ok(ParameterMode::Named);
    }

    if !params.is_empty() {
        return Err(WarehouseError::InvalidParameterStyle(format!(
            "template has no placeholders but {} bindings were supplied",
            params.len(),
        )));
    }

    Ok(ParameterMode::None)
}
