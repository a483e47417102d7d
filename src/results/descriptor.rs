use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::types::LogicalType;

/// Kind of event a result descriptor applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    ResultSet,
    UpdateCount,
}

/// How a cursor is reduced to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    /// Every row, each read by the row reader.
    #[default]
    Rows,
    /// The first row, or empty.
    Row,
    /// The first column of every row.
    Column,
    /// The first column of the first row.
    Scalar,
}

impl ResultShape {
    #[must_use]
    pub fn from_name(name: &str) -> Option<ResultShape> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rows" | "list" => Some(ResultShape::Rows),
            "row" | "one" => Some(ResultShape::Row),
            "column" => Some(ResultShape::Column),
            "scalar" | "value" => Some(ResultShape::Scalar),
            _ => None,
        }
    }
}

/// Declares how one result event is named and converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDescriptor {
    pub kind: ResultKind,
    pub name: Option<String>,
    pub shape: ResultShape,
    pub logical_type: Option<LogicalType>,
    pub row_reader: Option<String>,
}

impl ResultDescriptor {
    #[must_use]
    pub fn result_set() -> Self {
        Self {
            kind: ResultKind::ResultSet,
            name: None,
            shape: ResultShape::Rows,
            logical_type: None,
            row_reader: None,
        }
    }

    #[must_use]
    pub fn update_count() -> Self {
        Self {
            kind: ResultKind::UpdateCount,
            ..Self::result_set()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_shape(mut self, shape: ResultShape) -> Self {
        self.shape = shape;
        self
    }

    /// Convert through the codec for `logical_type`. Plain logical types read the first
    /// column; [`LogicalType::Other`] names a row reader instead.
    #[must_use]
    pub fn with_logical_type(mut self, logical_type: LogicalType) -> Self {
        match logical_type {
            LogicalType::Other(reader) => self.row_reader = Some(reader),
            logical => {
                if self.shape == ResultShape::Rows {
                    self.shape = ResultShape::Column;
                }
                self.logical_type = Some(logical);
            }
        }
        self
    }

    #[must_use]
    pub fn with_row_reader(mut self, reader: impl Into<String>) -> Self {
        self.row_reader = Some(reader.into());
        self
    }
}

/// Descriptors in declaration order plus the one used for every other position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPlan {
    pub descriptors: Vec<ResultDescriptor>,
    pub default: Option<ResultDescriptor>,
}

impl ResultPlan {
    /// True when the template declared nothing about its results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty() && self.default.is_none()
    }

    /// Descriptor for the event at 1-based `position`: the declared one if its kind
    /// matches, else the default.
    #[must_use]
    pub fn descriptor_for(&self, position: usize, kind: ResultKind) -> Option<&ResultDescriptor> {
        position
            .checked_sub(1)
            .and_then(|idx| self.descriptors.get(idx))
            .filter(|descriptor| descriptor.kind == kind)
            .or_else(|| self.default.as_ref().filter(|descriptor| descriptor.kind == kind))
    }

    /// Row reader names referenced by any descriptor.
    pub fn row_readers(&self) -> impl Iterator<Item = &str> {
        self.descriptors
            .iter()
            .chain(self.default.iter())
            .filter_map(|descriptor| descriptor.row_reader.as_deref())
    }
}
