use crate::domain::ids::TableId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    String,
    Bytes,
    #[serde(alias = "INT64")]
    Integer,
    #[serde(alias = "FLOAT64")]
    Float,
    Numeric,
    Bignumeric,
    #[serde(alias = "BOOL")]
    Boolean,
    Timestamp,
    Date,
    Time,
    Datetime,
    Geography,
    Json,
    #[serde(alias = "STRUCT")]
    Record,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "STRING",
            FieldType::Bytes => "BYTES",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::Numeric => "NUMERIC",
            FieldType::Bignumeric => "BIGNUMERIC",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::Datetime => "DATETIME",
            FieldType::Geography => "GEOGRAPHY",
            FieldType::Json => "JSON",
            FieldType::Record => "RECORD",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

/// One named, typed column. `fields` is only populated for `RECORD` columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FieldMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

impl Field {
    pub fn of(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: None,
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn record(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Self::of(name, FieldType::Record)
        }
    }

    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Ordered field list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn of(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    pub query: String,
    pub use_legacy_sql: bool,
}

impl ViewDefinition {
    /// A view in the standard (non-legacy) SQL dialect.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            use_legacy_sql: false,
        }
    }

    pub fn with_legacy_sql(mut self, use_legacy_sql: bool) -> Self {
        self.use_legacy_sql = use_legacy_sql;
        self
    }
}

/// What a table resource is: stored rows with a schema, or a stored query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TableDefinition {
    #[serde(rename = "TABLE")]
    Standard {
        #[serde(default)]
        schema: Schema,
    },
    #[serde(rename = "VIEW")]
    View { view: ViewDefinition },
}

impl TableDefinition {
    pub fn standard(schema: Schema) -> Self {
        Self::Standard { schema }
    }

    pub fn view(view: ViewDefinition) -> Self {
        Self::View { view }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    #[serde(rename = "tableReference")]
    pub table_id: TableId,
    #[serde(flatten)]
    pub definition: TableDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl TableInfo {
    pub fn of(table_id: TableId, definition: TableDefinition) -> Self {
        Self {
            table_id,
            definition,
            description: None,
            etag: None,
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self.definition, TableDefinition::View { .. })
    }

    pub fn view(&self) -> Option<&ViewDefinition> {
        match &self.definition {
            TableDefinition::View { view } => Some(view),
            TableDefinition::Standard { .. } => None,
        }
    }

    pub fn schema(&self) -> Option<&Schema> {
        match &self.definition {
            TableDefinition::Standard { schema } => Some(schema),
            TableDefinition::View { .. } => None,
        }
    }
}
