use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engines::TableEngine;
use crate::errors::EngineError;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ClickHouseInt {
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Int256,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    UInt256,
}

impl fmt::Display for ClickHouseInt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ClickHouseFloat {
    Float32,
    Float64,
}

impl fmt::Display for ClickHouseFloat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Column types the crate knows how to render into CREATE TABLE text.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ClickHouseColumnType {
    String,
    Boolean,
    ClickhouseInt(ClickHouseInt),
    ClickhouseFloat(ClickHouseFloat),
    Decimal { precision: u8, scale: u8 },
    Date,
    DateTime,
    Uuid,
    Array(Box<ClickHouseColumnType>),
    Nullable(Box<ClickHouseColumnType>),
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClickHouseColumn {
    pub name: String,
    pub column_type: ClickHouseColumnType,
    pub default: Option<String>,
}

impl ClickHouseColumn {
    pub fn new(name: impl Into<String>, column_type: ClickHouseColumnType) -> Self {
        ClickHouseColumn {
            name: name.into(),
            column_type,
            default: None,
        }
    }
}

/// A table whose engine descriptor has been attached to its final column
/// set. Constructing the table is the single point where `attach` runs, so
/// a value of this type always carries a fully resolved engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseTable {
    pub name: String,
    pub columns: Vec<ClickHouseColumn>,
    pub engine: TableEngine,
}

impl ClickHouseTable {
    /// Finalizes table construction: binds the engine's symbolic column
    /// references against `columns`. Resolution failures abort construction
    /// and consume the engine descriptor.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ClickHouseColumn>,
        mut engine: TableEngine,
    ) -> Result<Self, EngineError> {
        let name = name.into();
        engine.attach(&name, &columns)?;
        Ok(ClickHouseTable {
            name,
            columns,
            engine,
        })
    }

    pub fn get_column(&self, name: &str) -> Option<&ClickHouseColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Wraps a column name in backticks for safe use in ClickHouse SQL queries
pub fn wrap_column_name(name: &str) -> String {
    format!("`{name}`")
}
