use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::phase::{InputType, PhaseId, QuestionId};
use crate::domain::process::ProcessId;

/// An answer as held by the client, shaped by the question's input type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Date(String),
    Table(Vec<Vec<String>>),
}

impl AnswerValue {
    pub fn empty_for(input_type: InputType) -> Self {
        match input_type {
            InputType::Texto => Self::Text(String::new()),
            InputType::Date => Self::Date(String::new()),
            InputType::Tabla => Self::Table(Vec::new()),
        }
    }

    /// Decodes a persisted raw value using the declared input type.
    ///
    /// A TABLA value that does not parse as a string grid degrades to opaque
    /// text so the rest of the phase still loads.
    pub fn decode(input_type: InputType, raw: &str) -> Self {
        match input_type {
            InputType::Texto => Self::Text(normalize_rich_text(raw)),
            InputType::Date => Self::Date(raw.trim().to_owned()),
            InputType::Tabla => match decode_table(raw) {
                Some(rows) => Self::Table(rows),
                None => {
                    warn!(
                        event_name = "answers.table_decode_failed",
                        raw_len = raw.len(),
                        "stored table answer is not a string grid; keeping it as text"
                    );
                    Self::Text(raw.to_owned())
                }
            },
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Text(payload) => normalize_rich_text(payload),
            Self::Date(date) => date.clone(),
            Self::Table(rows) => encode_table(rows),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(value) | Self::Date(value) => value.trim().is_empty(),
            Self::Table(rows) => rows.iter().flatten().all(|cell| cell.trim().is_empty()),
        }
    }

    pub fn as_table(&self) -> Option<&[Vec<String>]> {
        match self {
            Self::Table(rows) => Some(rows),
            Self::Text(_) | Self::Date(_) => None,
        }
    }
}

pub fn encode_table(rows: &[Vec<String>]) -> String {
    serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_owned())
}

pub fn decode_table(raw: &str) -> Option<Vec<Vec<String>>> {
    if raw.trim().is_empty() {
        return Some(Vec::new());
    }

    let value = serde_json::from_str::<Value>(raw).ok()?;
    let Value::Array(rows) = value else {
        return None;
    };

    rows.into_iter()
        .map(|row| match row {
            Value::Array(cells) => cells.into_iter().map(cell_to_string).collect(),
            _ => None,
        })
        .collect()
}

fn cell_to_string(cell: Value) -> Option<String> {
    match cell {
        Value::String(text) => Some(text),
        Value::Null => Some(String::new()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Rich-text payloads that are JSON block documents are re-serialized
/// compactly; anything else is kept byte for byte.
pub fn normalize_rich_text(payload: &str) -> String {
    let trimmed = payload.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return payload.to_owned();
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(document) => serde_json::to_string(&document).unwrap_or_else(|_| payload.to_owned()),
        Err(_) => payload.to_owned(),
    }
}

/// Readable text of a rich-text payload: every `text` string of a JSON block
/// document, one line per top-level block. Non-JSON payloads are returned as is.
pub fn rich_text_plain(payload: &str) -> String {
    let document = match serde_json::from_str::<Value>(payload) {
        Ok(document @ (Value::Object(_) | Value::Array(_))) => document,
        _ => return payload.to_owned(),
    };

    let blocks = match &document {
        Value::Object(map) => match map.get("blocks") {
            Some(Value::Array(blocks)) => blocks.iter().collect::<Vec<_>>(),
            _ => vec![&document],
        },
        Value::Array(blocks) => blocks.iter().collect(),
        _ => Vec::new(),
    };

    blocks
        .into_iter()
        .map(|block| {
            let mut parts = Vec::new();
            collect_text(block, &mut parts);
            parts.concat()
        })
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text<'a>(value: &'a Value, parts: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                match (key.as_str(), nested) {
                    ("text", Value::String(text)) => parts.push(text),
                    _ => collect_text(nested, parts),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, parts)),
        _ => {}
    }
}

/// One entry of the `POST /answers` batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    #[serde(rename = "idQuestion")]
    pub question_id: QuestionId,
    pub answer_value: String,
}

/// Body of `POST /answers`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerBatch {
    #[serde(rename = "idProcess")]
    pub process_id: ProcessId,
    #[serde(rename = "idPhase")]
    pub phase_id: PhaseId,
    pub answers: Vec<AnswerEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub saved_count: usize,
}

#[cfg(test)]
mod tests {
    use super::{decode_table, encode_table, normalize_rich_text, rich_text_plain, AnswerValue};
    use crate::domain::phase::InputType;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter().map(|row| row.iter().map(|cell| (*cell).to_owned()).collect()).collect()
    }

    #[test]
    fn table_round_trip_preserves_shape_and_cell_order() {
        let samples = [
            grid(&[]),
            grid(&[&["", ""]]),
            grid(&[&["firewall", "2026-01-10", "ok"], &["vpn", "", "pending \"review\""]]),
            grid(&[&["a"], &["b", "c"], &[]]),
            grid(&[&["ñandú", "línea\nnueva", "tab\tcell"]]),
        ];

        for rows in samples {
            assert_eq!(decode_table(&encode_table(&rows)), Some(rows.clone()));
            let value = AnswerValue::Table(rows);
            assert_eq!(AnswerValue::decode(InputType::Tabla, &value.encode()), value);
        }
    }

    #[test]
    fn unparseable_table_degrades_to_text() {
        let value = AnswerValue::decode(InputType::Tabla, "legacy free text");
        assert_eq!(value, AnswerValue::Text("legacy free text".to_owned()));
        assert_eq!(value.encode(), "legacy free text");

        let nested = AnswerValue::decode(InputType::Tabla, r#"[["a", ["b"]]]"#);
        assert!(matches!(nested, AnswerValue::Text(_)));
    }

    #[test]
    fn scalar_cells_are_read_as_strings() {
        assert_eq!(decode_table(r#"[[1, true, null]]"#), Some(grid(&[&["1", "true", ""]])));
    }

    #[test]
    fn rich_text_round_trip_ignores_whitespace() {
        let spaced = r#"{ "blocks": [ { "type": "paragraph", "data": { "text": "hola" } } ] }"#;
        let first = AnswerValue::decode(InputType::Texto, spaced);
        let second = AnswerValue::decode(InputType::Texto, &first.encode());

        assert_eq!(first, second);
        assert_eq!(normalize_rich_text("plain text  "), "plain text  ");
    }

    #[test]
    fn text_is_never_parsed_as_table() {
        let value = AnswerValue::decode(InputType::Texto, r#"[["looks","like","a table"]]"#);
        assert!(matches!(value, AnswerValue::Text(_)));
    }

    #[test]
    fn emptiness_ignores_blank_cells() {
        assert!(AnswerValue::Table(grid(&[&["", " "], &["", ""]])).is_empty());
        assert!(!AnswerValue::Table(grid(&[&["", "x"]])).is_empty());
        assert!(AnswerValue::Date("  ".to_owned()).is_empty());
        assert!(!AnswerValue::Text("hola".to_owned()).is_empty());
    }

    #[test]
    fn rich_text_plain_extracts_block_text() {
        let editor_js = r#"{"blocks":[{"type":"paragraph","data":{"text":"Alcance"}},{"type":"paragraph","data":{"text":"ISO 27001"}}]}"#;
        assert_eq!(rich_text_plain(editor_js), "Alcance\nISO 27001");

        let inline = r#"[{"type":"paragraph","content":[{"type":"text","text":"Hola "},{"type":"text","text":"mundo"}]}]"#;
        assert_eq!(rich_text_plain(inline), "Hola mundo");
        assert_eq!(rich_text_plain("texto plano"), "texto plano");
    }
}
