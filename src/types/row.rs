use serde::{Deserialize, Serialize};

use crate::types::{RowId, error::DatabaseError, field::Field, value::Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub row_id: Option<RowId>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            row_id: None,
            values,
        }
    }

    pub fn with_row_id(row_id: RowId, values: Vec<Value>) -> Self {
        Self {
            row_id: Some(row_id),
            values,
        }
    }

    pub fn get_value(&self, column_index: usize) -> Option<&Value> {
        self.values.get(column_index)
    }

    /// Looks a value up by column name against the field list the row was scanned with.
    pub fn get_by_name<'a>(&'a self, fields: &[Field], name: &str) -> Option<&'a Value> {
        fields
            .iter()
            .position(|f| f.is_named(name))
            .and_then(|i| self.values.get(i))
    }

    pub fn set_value(&mut self, column_index: usize, value: Value) -> Result<(), DatabaseError> {
        if column_index >= self.values.len() {
            return Err(DatabaseError::ColumnIndexOutOfRange {
                index: column_index,
                len: self.values.len(),
            });
        }
        self.values[column_index] = value;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
