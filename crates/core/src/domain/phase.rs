use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::domain::process::ProcessId;

pub const DEFAULT_MIN_ROWS: usize = 1;
pub const DEFAULT_MAX_ROWS: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseId(pub String);

impl PhaseId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub String);

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl QuestionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputType {
    #[serde(rename = "TEXTO", alias = "texto", alias = "TEXT", alias = "text")]
    Texto,
    #[serde(rename = "DATE", alias = "date", alias = "FECHA", alias = "fecha")]
    Date,
    #[serde(rename = "TABLA", alias = "tabla", alias = "TABLE", alias = "table")]
    Tabla,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    #[default]
    Text,
    Date,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub key: String,
    #[serde(alias = "label")]
    pub header: String,
    #[serde(rename = "type", default)]
    pub cell_type: CellType,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TableConfigError {
    #[error("table question has no table configuration")]
    Missing,
    #[error("table configuration could not be parsed: {0}")]
    Malformed(String),
    #[error("table configuration declares no columns")]
    NoColumns,
    #[error("table configuration declares column `{0}` more than once")]
    DuplicateColumn(String),
    #[error("table configuration minRows {min} exceeds maxRows {max}")]
    InvertedBounds { min: usize, max: usize },
    #[error("table configuration maxRows must be greater than zero")]
    ZeroMaxRows,
}

/// Column schema and row bounds of a TABLA question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub columns: Vec<ColumnDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<usize>,
}

impl TableConfig {
    pub fn min_rows(&self) -> usize {
        self.min_rows.unwrap_or(DEFAULT_MIN_ROWS)
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows.unwrap_or(DEFAULT_MAX_ROWS)
    }

    pub fn validate(&self) -> Result<(), TableConfigError> {
        if self.columns.is_empty() {
            return Err(TableConfigError::NoColumns);
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.key.as_str()) {
                return Err(TableConfigError::DuplicateColumn(column.key.clone()));
            }
        }

        if self.max_rows() == 0 {
            return Err(TableConfigError::ZeroMaxRows);
        }
        if self.min_rows() > self.max_rows() {
            return Err(TableConfigError::InvertedBounds {
                min: self.min_rows(),
                max: self.max_rows(),
            });
        }

        Ok(())
    }

    /// Accepts the config either as an object or as a JSON-encoded string.
    pub fn from_wire(value: &Value) -> Result<Self, TableConfigError> {
        let config = match value {
            Value::Null => return Err(TableConfigError::Missing),
            Value::String(encoded) if encoded.trim().is_empty() => {
                return Err(TableConfigError::Missing)
            }
            Value::String(encoded) => serde_json::from_str::<TableConfig>(encoded)
                .map_err(|error| TableConfigError::Malformed(error.to_string()))?,
            other => serde_json::from_value::<TableConfig>(other.clone())
                .map_err(|error| TableConfigError::Malformed(error.to_string()))?,
        };

        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "QuestionDocument")]
pub struct Question {
    #[serde(rename = "idQuestion")]
    pub id: QuestionId,
    pub title: String,
    pub description: Option<String>,
    pub input_type: InputType,
    pub required: bool,
    pub table_config: Option<TableConfig>,
    /// Why a TABLA question has no usable `table_config`.
    #[serde(skip)]
    pub table_config_issue: Option<TableConfigError>,
}

impl Question {
    pub fn table_config(&self) -> Result<&TableConfig, TableConfigError> {
        match (&self.table_config, &self.table_config_issue) {
            (Some(config), _) => Ok(config),
            (None, Some(issue)) => Err(issue.clone()),
            (None, None) => Err(TableConfigError::Missing),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionDocument {
    #[serde(alias = "id")]
    id_question: QuestionId,
    title: String,
    #[serde(default)]
    description: Option<String>,
    input_type: InputType,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    table_config: Option<Value>,
}

impl From<QuestionDocument> for Question {
    fn from(document: QuestionDocument) -> Self {
        let (table_config, table_config_issue) = match document.input_type {
            InputType::Tabla => {
                let raw = document.table_config.unwrap_or(Value::Null);
                match TableConfig::from_wire(&raw) {
                    Ok(config) => (Some(config), None),
                    Err(issue) => {
                        warn!(
                            event_name = "phase.table_config_rejected",
                            question_id = %document.id_question,
                            error = %issue,
                            "table question will render as misconfigured"
                        );
                        (None, Some(issue))
                    }
                }
            }
            InputType::Texto | InputType::Date => (None, None),
        };

        Self {
            id: document.id_question,
            title: document.title,
            description: document.description,
            input_type: document.input_type,
            required: document.required,
            table_config,
            table_config_issue,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(rename = "idSection", alias = "id")]
    pub id: SectionId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `None` when the backend sent no order; such phases keep delivery order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    #[serde(rename = "idPhase", alias = "id")]
    pub id: PhaseId,
    #[serde(rename = "idProcess", default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<ProcessId>,
    #[serde(alias = "phaseOrder", default)]
    pub order: u32,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Phase {
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections.iter().flat_map(|section| section.questions.iter())
    }

    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions().find(|question| &question.id == id)
    }

    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|section| section.questions.len()).sum()
    }
}
