//! Checks the service applies to incoming resources.

use crate::domain::error::{Result, WarehouseError};
use crate::domain::table::{Field, FieldType, Schema};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static DATASET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,1024}$").unwrap());

static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]{1,1024}$").unwrap());

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,299}$").unwrap());

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

pub fn project_id(project_id: &str) -> Result<()> {
    if project_id.trim().is_empty() {
        return Err(WarehouseError::invalid("Project id must not be empty"));
    }
    Ok(())
}

pub fn dataset_name(name: &str) -> Result<()> {
    if !DATASET_NAME.is_match(name) {
        return Err(WarehouseError::invalid(format!(
            "Invalid dataset ID \"{name}\". Dataset IDs must be alphanumeric (plus underscores) and must be at most 1024 characters long."
        )));
    }
    Ok(())
}

pub fn table_name(name: &str) -> Result<()> {
    if !TABLE_NAME.is_match(name) {
        return Err(WarehouseError::invalid(format!(
            "Invalid table ID \"{name}\"."
        )));
    }
    Ok(())
}

pub fn email(email: &str) -> Result<()> {
    if !EMAIL.is_match(email) {
        return Err(WarehouseError::invalid(format!(
            "Invalid email address: {email}"
        )));
    }
    Ok(())
}

/// Non-empty, valid names, unique (case-insensitively) at each nesting level,
/// and `RECORD` exactly when there are sub-fields.
pub fn schema(schema: &Schema) -> Result<()> {
    if schema.is_empty() {
        return Err(WarehouseError::invalid("Schema must contain at least one field"));
    }
    fields(&schema.fields)
}

fn fields(fields: &[Field]) -> Result<()> {
    let mut seen = HashSet::new();
    for field in fields {
        if !FIELD_NAME.is_match(&field.name) {
            return Err(WarehouseError::invalid(format!(
                "Invalid field name \"{}\"",
                field.name
            )));
        }
        if !seen.insert(field.name.to_ascii_lowercase()) {
            return Err(WarehouseError::invalid(format!(
                "Duplicate field name \"{}\"",
                field.name
            )));
        }
        match (field.field_type, field.fields.is_empty()) {
            (FieldType::Record, true) => {
                return Err(WarehouseError::invalid(format!(
                    "Field {} is type RECORD but has no schema",
                    field.name
                )));
            }
            (FieldType::Record, false) => self::fields(&field.fields)?,
            (_, false) => {
                return Err(WarehouseError::invalid(format!(
                    "Field {} has sub-fields but is type {}",
                    field.name, field.field_type
                )));
            }
            (_, true) => {}
        }
    }
    Ok(())
}
