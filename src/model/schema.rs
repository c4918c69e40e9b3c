//! Column metadata and type information

use serde::{Deserialize, Serialize};

use super::table::CellValue;

/// Largest integer magnitude an `f64` holds exactly (2^53)
const MAX_EXACT_FLOAT_INT: u64 = 1 << 53;

/// Element type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    Null,
    Bool,
    Int,
    Float,
    String,
    Date,
    DateTime,
    Mixed,
}

impl Default for CellType {
    fn default() -> Self {
        CellType::Null
    }
}

impl CellType {
    /// Widen the type to accommodate another type
    pub fn widen(self, other: CellType) -> CellType {
        if self == other {
            return self;
        }

        match (self, other) {
            (CellType::Null, t) | (t, CellType::Null) => t,
            (CellType::Int, CellType::Float) | (CellType::Float, CellType::Int) => CellType::Float,
            (CellType::Date, CellType::DateTime) | (CellType::DateTime, CellType::Date) => {
                CellType::DateTime
            }
            _ => CellType::Mixed,
        }
    }

    /// Type of a single cell value
    pub fn of(value: &CellValue) -> CellType {
        match value {
            CellValue::Null => CellType::Null,
            CellValue::Bool(_) => CellType::Bool,
            CellValue::Int(_) => CellType::Int,
            CellValue::Float(_) => CellType::Float,
            CellValue::String(_) => CellType::String,
            CellValue::Date(_) => CellType::Date,
            CellValue::DateTime(_) => CellType::DateTime,
        }
    }

    /// Infer a column type from its values by widening
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> CellType {
        values
            .into_iter()
            .fold(CellType::Null, |acc, v| acc.widen(CellType::of(v)))
    }

    /// Whether a cell can be stored in a column of this type without loss
    pub fn admits(self, value: &CellValue) -> bool {
        match (self, CellType::of(value)) {
            (_, CellType::Null) => true,
            (CellType::Float, CellType::Int) => {
                matches!(value, CellValue::Int(i) if i.unsigned_abs() <= MAX_EXACT_FLOAT_INT)
            }
            (CellType::DateTime, CellType::Date) => true,
            (column, cell) => column == cell,
        }
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellType::Null => write!(f, "null"),
            CellType::Bool => write!(f, "bool"),
            CellType::Int => write!(f, "int"),
            CellType::Float => write!(f, "float"),
            CellType::String => write!(f, "string"),
            CellType::Date => write!(f, "date"),
            CellType::DateTime => write!(f, "datetime"),
            CellType::Mixed => write!(f, "mixed"),
        }
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column index (0-based position)
    pub index: usize,
    /// Element type shared by every cell of the column
    pub cell_type: CellType,
}

impl Column {
    /// Create a new untyped column with name and index
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            cell_type: CellType::Null,
        }
    }

    /// Create a column with a specified type
    pub fn with_type(name: impl Into<String>, index: usize, cell_type: CellType) -> Self {
        Self {
            name: name.into(),
            index,
            cell_type,
        }
    }
}
