//! # ClickHouse engine clauses
//!
//! Models the `ENGINE = Name(params...)` fragment of ClickHouse CREATE
//! TABLE statements. Engine descriptors are declared with symbolic column
//! references before the table's column set is final, bound to the real
//! columns when the table is assembled, and then rendered into positional
//! DDL text.
//!
//! ## Features
//! - Two-phase declare/attach binding for column references
//! - MergeTree family (plain, Collapsing, Summing, and their Replicated forms)
//! - Buffer, Memory and Merge engines
//! - CREATE TABLE / DROP TABLE rendering
//!
//! ## Usage Example
//! ```rust
//! # fn main() -> Result<(), clickhouse_engines::EngineError> {
//! use clickhouse_engines::{
//!     ClickHouseColumn, ClickHouseColumnType, ClickHouseTable, KeyInput, MergeTree,
//!     MergeTreeOptions,
//! };
//!
//! let columns = vec![
//!     ClickHouseColumn::new("day", ClickHouseColumnType::Date),
//!     ClickHouseColumn::new("user_id", ClickHouseColumnType::String),
//! ];
//! let engine = MergeTree::new(
//!     "day",
//!     vec![KeyInput::from("day"), KeyInput::from("user_id")],
//!     MergeTreeOptions::default(),
//! )?;
//! let table = ClickHouseTable::new("events", columns, engine.into())?;
//!
//! let ddl = clickhouse_engines::queries::create_table_query("analytics", &table)?;
//! assert!(ddl.contains("ENGINE = MergeTree(`day`, (`day`, `user_id`), 8192)"));
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod engines;
pub mod errors;
pub mod escape;
pub mod model;
pub mod queries;

pub use binding::{ColumnRef, ColumnSpec, KeyExpressionList, KeyInput, KeyItem, SqlExpression};
pub use engines::{
    Buffer, CollapsingMergeTree, EngineParam, MergeTree, MergeTreeOptions, SummingMergeTree,
    TableEngine, DEFAULT_INDEX_GRANULARITY,
};
pub use errors::EngineError;
pub use escape::escape_string;
pub use model::{
    ClickHouseColumn, ClickHouseColumnType, ClickHouseFloat, ClickHouseInt, ClickHouseTable,
};
