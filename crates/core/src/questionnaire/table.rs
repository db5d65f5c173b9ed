use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::answer::AnswerValue;
use crate::domain::phase::{CellType, ColumnDef, TableConfig};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("row {index} is out of range for a table with {len} rows")]
    RowOutOfRange { index: usize, len: usize },
    #[error("column {index} is out of range for a table with {len} columns")]
    ColumnOutOfRange { index: usize, len: usize },
    #[error("`{value}` in column `{column}` is not a YYYY-MM-DD date")]
    InvalidDate { column: String, value: String },
}

/// Row controls offered for an editable table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableControls {
    pub can_add: bool,
    pub can_remove: bool,
}

/// Editing state of one TABLA answer.
///
/// Every row always has exactly one cell per column. Mutations on a read-only
/// editor return `Ok(false)` and change nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableEditor {
    columns: Vec<ColumnDef>,
    min_rows: usize,
    max_rows: usize,
    rows: Vec<Vec<String>>,
    read_only: bool,
}

impl TableEditor {
    pub fn new(config: &TableConfig, rows: &[Vec<String>], read_only: bool) -> Self {
        let width = config.columns.len();
        let min_rows = config.min_rows();
        let mut rows: Vec<Vec<String>> = rows
            .iter()
            .map(|row| {
                let mut row: Vec<String> = row.iter().take(width).cloned().collect();
                row.resize(width, String::new());
                row
            })
            .collect();

        // Stored tables shorter than `min_rows` are topped up with blank rows too.
        let seeded = min_rows.max(1);
        if rows.len() < seeded {
            rows.resize(seeded, vec![String::new(); width]);
        }

        Self {
            columns: config.columns.clone(),
            min_rows,
            max_rows: config.max_rows(),
            rows,
            read_only,
        }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// `None` when the table is read-only.
    pub fn controls(&self) -> Option<TableControls> {
        if self.read_only {
            return None;
        }
        Some(TableControls {
            can_add: self.rows.len() < self.max_rows,
            can_remove: self.rows.len() > self.min_rows,
        })
    }

    pub fn add_row(&mut self) -> bool {
        if self.read_only || self.rows.len() >= self.max_rows {
            return false;
        }
        self.rows.push(vec![String::new(); self.columns.len()]);
        true
    }

    pub fn remove_row(&mut self, index: usize) -> Result<bool, TableError> {
        if self.read_only {
            return Ok(false);
        }
        if index >= self.rows.len() {
            return Err(TableError::RowOutOfRange { index, len: self.rows.len() });
        }
        if self.rows.len() <= self.min_rows {
            return Ok(false);
        }
        self.rows.remove(index);
        Ok(true)
    }

    /// Date columns accept an empty cell or an ISO date.
    pub fn update_cell(
        &mut self,
        row: usize,
        column: usize,
        value: impl Into<String>,
    ) -> Result<bool, TableError> {
        if self.read_only {
            return Ok(false);
        }
        let len = self.rows.len();
        let width = self.columns.len();
        let Some(cells) = self.rows.get_mut(row) else {
            return Err(TableError::RowOutOfRange { index: row, len });
        };
        let Some(definition) = self.columns.get(column) else {
            return Err(TableError::ColumnOutOfRange { index: column, len: width });
        };

        let value = value.into();
        if definition.cell_type == CellType::Date
            && !value.trim().is_empty()
            && NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_err()
        {
            return Err(TableError::InvalidDate { column: definition.key.clone(), value });
        }

        cells[column] = value;
        Ok(true)
    }

    pub fn value(&self) -> AnswerValue {
        AnswerValue::Table(self.rows.clone())
    }

    pub fn into_value(self) -> AnswerValue {
        AnswerValue::Table(self.rows)
    }
}
