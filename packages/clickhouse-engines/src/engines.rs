//! Engine descriptors for the `ENGINE = Name(params...)` clause.
//!
//! Every descriptor goes through the same two-phase life cycle: declared
//! with symbolic column references, then attached exactly once by table
//! construction, after which `name()` and `params()` may be read any number
//! of times. Parameter lists are positional; the ordering in each
//! `params()` implementation is the DDL syntax and must not change.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::binding::{ColumnRef, ColumnSpec, KeyExpressionList, KeyInput, KeyItem, SqlExpression};
use crate::errors::EngineError;
use crate::escape::escape_string;
use crate::model::{wrap_column_name, ClickHouseColumn};

pub const DEFAULT_INDEX_GRANULARITY: i64 = 8192;

/// One positional value of an engine clause.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EngineParam {
    /// Structural identifier (database or table name), spliced verbatim.
    Identifier(String),
    /// String literal, already escaped and quoted.
    StringLiteral(String),
    Int(i64),
    /// A resolved column reference.
    Column(ClickHouseColumn),
    /// Pass-through SQL expression.
    Expression(SqlExpression),
    /// Parenthesized positional group.
    Tuple(Vec<EngineParam>),
}

impl fmt::Display for EngineParam {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineParam::Identifier(name) => write!(f, "{name}"),
            EngineParam::StringLiteral(literal) => write!(f, "{literal}"),
            EngineParam::Int(value) => write!(f, "{value}"),
            EngineParam::Column(column) => write!(f, "{}", wrap_column_name(&column.name)),
            EngineParam::Expression(expression) => write!(f, "{expression}"),
            EngineParam::Tuple(items) => {
                write!(f, "({})", items.iter().join(", "))
            }
        }
    }
}

impl From<&KeyItem> for EngineParam {
    fn from(item: &KeyItem) -> Self {
        match item {
            KeyItem::Expression(expression) => EngineParam::Expression(expression.clone()),
            KeyItem::Column(column) => EngineParam::Column(column.clone()),
        }
    }
}

/// Coordinates of a replicated table in the coordination namespace.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Replication {
    pub zookeeper_path: String,
    pub replica_name: String,
}

/// Optional MergeTree settings, `Default` leaves everything off.
///
/// `replica_name` and `replica_table_path` are a pair: setting exactly one
/// of them is rejected at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeTreeOptions {
    pub sampling: Option<KeyInput>,
    pub index_granularity: Option<i64>,
    pub replica_name: Option<String>,
    pub replica_table_path: Option<String>,
}

/// Fields shared by the whole MergeTree family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeTreeCore {
    date_col: ColumnRef,
    key: KeyExpressionList,
    sampling: Option<KeyExpressionList>,
    index_granularity: i64,
    replication: Option<Replication>,
    table: Option<String>,
}

impl MergeTreeCore {
    fn new(
        date_col: ColumnSpec,
        key_expressions: Vec<KeyInput>,
        options: MergeTreeOptions,
    ) -> Result<Self, EngineError> {
        let replication = match (options.replica_table_path, options.replica_name) {
            (Some(zookeeper_path), Some(replica_name)) => Some(Replication {
                zookeeper_path,
                replica_name,
            }),
            (None, None) => None,
            (Some(_), None) | (None, Some(_)) => {
                return Err(EngineError::InvalidConfiguration {
                    message: "replica_table_path and replica_name must be set together"
                        .to_string(),
                })
            }
        };

        Ok(MergeTreeCore {
            date_col: ColumnRef::new(date_col),
            key: KeyExpressionList::new(key_expressions),
            sampling: options
                .sampling
                .map(|input| KeyExpressionList::new(vec![input])),
            index_granularity: options
                .index_granularity
                .unwrap_or(DEFAULT_INDEX_GRANULARITY),
            replication,
            table: None,
        })
    }

    fn attach(&mut self, table: &str, columns: &[ClickHouseColumn]) -> Result<(), EngineError> {
        if let Some(bound) = &self.table {
            return Err(EngineError::AlreadyAttached {
                table: bound.clone(),
            });
        }

        self.date_col.attach(table, columns)?;
        self.key.attach(table, columns)?;
        if let Some(sampling) = &mut self.sampling {
            sampling.attach(table, columns)?;
        }
        self.table = Some(table.to_string());
        Ok(())
    }

    fn params(&self) -> Result<Vec<EngineParam>, EngineError> {
        let mut params = Vec::new();

        if let Some(replication) = &self.replication {
            params.push(EngineParam::StringLiteral(escape_string(
                &replication.zookeeper_path,
            )));
            params.push(EngineParam::StringLiteral(escape_string(
                &replication.replica_name,
            )));
        }

        params.push(EngineParam::Column(self.date_col.column()?.clone()));

        if let Some(sampling) = &self.sampling {
            params.push(EngineParam::from(&sampling.rendered()?[0]));
        }

        params.push(EngineParam::Tuple(
            self.key.rendered()?.iter().map(EngineParam::from).collect(),
        ));
        params.push(EngineParam::Int(self.index_granularity));
        Ok(params)
    }

    fn is_replicated(&self) -> bool {
        self.replication.is_some()
    }

    fn family_name(&self, base: &str) -> String {
        if self.is_replicated() {
            format!("Replicated{base}")
        } else {
            base.to_string()
        }
    }
}

/// The base MergeTree engine: a date column, a composite key, an optional
/// sampling expression and the index granularity tuning constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeTree {
    core: MergeTreeCore,
}

impl MergeTree {
    pub fn new(
        date_col: impl Into<ColumnSpec>,
        key_expressions: Vec<KeyInput>,
        options: MergeTreeOptions,
    ) -> Result<Self, EngineError> {
        Ok(MergeTree {
            core: MergeTreeCore::new(date_col.into(), key_expressions, options)?,
        })
    }
}

/// MergeTree variant that collapses pairs of rows with opposite sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollapsingMergeTree {
    core: MergeTreeCore,
    sign_col: ColumnRef,
}

impl CollapsingMergeTree {
    pub fn new(
        date_col: impl Into<ColumnSpec>,
        key_expressions: Vec<KeyInput>,
        sign_col: impl Into<ColumnSpec>,
        options: MergeTreeOptions,
    ) -> Result<Self, EngineError> {
        Ok(CollapsingMergeTree {
            core: MergeTreeCore::new(date_col.into(), key_expressions, options)?,
            sign_col: ColumnRef::new(sign_col),
        })
    }
}

/// MergeTree variant that pre-aggregates numeric columns on merge. When no
/// summing columns are given, ClickHouse sums every numeric non-key column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummingMergeTree {
    core: MergeTreeCore,
    summing_cols: Option<KeyExpressionList>,
}

impl SummingMergeTree {
    pub fn new(
        date_col: impl Into<ColumnSpec>,
        key_expressions: Vec<KeyInput>,
        summing_cols: Option<Vec<KeyInput>>,
        options: MergeTreeOptions,
    ) -> Result<Self, EngineError> {
        Ok(SummingMergeTree {
            core: MergeTreeCore::new(date_col.into(), key_expressions, options)?,
            summing_cols: summing_cols.map(KeyExpressionList::new),
        })
    }
}

/// In-memory buffer flushing into a destination table once any of the
/// time/rows/bytes thresholds is crossed. All parameters are structural
/// identifiers or numbers, so nothing is escaped.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Buffer {
    pub database: String,
    pub table_name: String,
    pub num_layers: i64,
    pub min_time: i64,
    pub max_time: i64,
    pub min_rows: i64,
    pub max_rows: i64,
    pub min_bytes: i64,
    pub max_bytes: i64,
}

impl Buffer {
    pub fn new(database: impl Into<String>, table_name: impl Into<String>) -> Self {
        Buffer {
            database: database.into(),
            table_name: table_name.into(),
            num_layers: 16,
            min_time: 10,
            max_time: 100,
            min_rows: 10_000,
            max_rows: 1_000_000,
            min_bytes: 10_000_000,
            max_bytes: 100_000_000,
        }
    }
}

/// The closed set of supported engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TableEngine {
    MergeTree(MergeTree),
    CollapsingMergeTree(CollapsingMergeTree),
    SummingMergeTree(SummingMergeTree),
    Buffer(Buffer),
    Memory,
    Merge { db: String, regexp: String },
}

impl From<MergeTree> for TableEngine {
    fn from(engine: MergeTree) -> Self {
        TableEngine::MergeTree(engine)
    }
}

impl From<CollapsingMergeTree> for TableEngine {
    fn from(engine: CollapsingMergeTree) -> Self {
        TableEngine::CollapsingMergeTree(engine)
    }
}

impl From<SummingMergeTree> for TableEngine {
    fn from(engine: SummingMergeTree) -> Self {
        TableEngine::SummingMergeTree(engine)
    }
}

impl From<Buffer> for TableEngine {
    fn from(engine: Buffer) -> Self {
        TableEngine::Buffer(engine)
    }
}

impl TableEngine {
    /// The engine's DDL identifier. MergeTree-family names gain a
    /// `Replicated` prefix when replication coordinates are configured.
    pub fn name(&self) -> String {
        match self {
            TableEngine::MergeTree(engine) => engine.core.family_name("MergeTree"),
            TableEngine::CollapsingMergeTree(engine) => {
                engine.core.family_name("CollapsingMergeTree")
            }
            TableEngine::SummingMergeTree(engine) => engine.core.family_name("SummingMergeTree"),
            TableEngine::Buffer(_) => "Buffer".to_string(),
            TableEngine::Memory => "Memory".to_string(),
            TableEngine::Merge { .. } => "Merge".to_string(),
        }
    }

    /// Check if this engine is part of the MergeTree family
    pub fn is_merge_tree_family(&self) -> bool {
        matches!(
            self,
            TableEngine::MergeTree(_)
                | TableEngine::CollapsingMergeTree(_)
                | TableEngine::SummingMergeTree(_)
        )
    }

    /// Binds the descriptor and all its column references to `table`. Called
    /// exactly once by table construction; a second call fails. Engines
    /// without column references accept attach as a no-op.
    pub fn attach(
        &mut self,
        table: &str,
        columns: &[ClickHouseColumn],
    ) -> Result<(), EngineError> {
        debug!("Attaching {} engine to table '{}'", self.name(), table);
        match self {
            TableEngine::MergeTree(engine) => engine.core.attach(table, columns),
            TableEngine::CollapsingMergeTree(engine) => {
                engine.core.attach(table, columns)?;
                engine.sign_col.attach(table, columns)
            }
            TableEngine::SummingMergeTree(engine) => {
                engine.core.attach(table, columns)?;
                if let Some(summing_cols) = &mut engine.summing_cols {
                    summing_cols.attach(table, columns)?;
                }
                Ok(())
            }
            TableEngine::Buffer(_) | TableEngine::Memory | TableEngine::Merge { .. } => Ok(()),
        }
    }

    /// The ordered positional parameter list of the engine clause.
    /// Deterministic and side-effect free; callable any number of times
    /// after attach.
    pub fn params(&self) -> Result<Vec<EngineParam>, EngineError> {
        match self {
            TableEngine::MergeTree(engine) => engine.core.params(),
            TableEngine::CollapsingMergeTree(engine) => {
                let mut params = engine.core.params()?;
                params.push(EngineParam::Column(engine.sign_col.column()?.clone()));
                Ok(params)
            }
            TableEngine::SummingMergeTree(engine) => {
                let mut params = engine.core.params()?;
                if let Some(summing_cols) = &engine.summing_cols {
                    params.push(EngineParam::Tuple(
                        summing_cols
                            .rendered()?
                            .iter()
                            .map(EngineParam::from)
                            .collect(),
                    ));
                }
                Ok(params)
            }
            TableEngine::Buffer(buffer) => Ok(vec![
                EngineParam::Identifier(buffer.database.clone()),
                EngineParam::Identifier(buffer.table_name.clone()),
                EngineParam::Int(buffer.num_layers),
                EngineParam::Int(buffer.min_time),
                EngineParam::Int(buffer.max_time),
                EngineParam::Int(buffer.min_rows),
                EngineParam::Int(buffer.max_rows),
                EngineParam::Int(buffer.min_bytes),
                EngineParam::Int(buffer.max_bytes),
            ]),
            TableEngine::Memory => Ok(vec![]),
            TableEngine::Merge { db, regexp } => Ok(vec![
                EngineParam::Identifier(db.clone()),
                EngineParam::StringLiteral(escape_string(regexp)),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClickHouseColumnType, ClickHouseInt};

    fn columns() -> Vec<ClickHouseColumn> {
        vec![
            ClickHouseColumn::new("day", ClickHouseColumnType::Date),
            ClickHouseColumn::new(
                "user_id",
                ClickHouseColumnType::ClickhouseInt(ClickHouseInt::UInt64),
            ),
            ClickHouseColumn::new(
                "sign",
                ClickHouseColumnType::ClickhouseInt(ClickHouseInt::Int8),
            ),
            ClickHouseColumn::new(
                "amount",
                ClickHouseColumnType::ClickhouseInt(ClickHouseInt::UInt64),
            ),
        ]
    }

    fn attached(mut engine: TableEngine) -> TableEngine {
        engine.attach("events", &columns()).unwrap();
        engine
    }

    #[test]
    fn test_merge_tree_params_ordering() {
        let engine = attached(
            MergeTree::new(
                "day",
                vec![KeyInput::from("day"), KeyInput::from("user_id")],
                MergeTreeOptions::default(),
            )
            .unwrap()
            .into(),
        );

        let params = engine.params().unwrap();
        assert_eq!(params.len(), 3);
        assert!(matches!(&params[0], EngineParam::Column(c) if c.name == "day"));
        assert!(matches!(&params[1], EngineParam::Tuple(items) if items.len() == 2));
        assert_eq!(params[2], EngineParam::Int(8192));
    }

    #[test]
    fn test_merge_tree_with_sampling_and_granularity() {
        let engine = attached(
            MergeTree::new(
                "day",
                vec![KeyInput::from("user_id")],
                MergeTreeOptions {
                    sampling: Some(KeyInput::expr("intHash32(user_id)")),
                    index_granularity: Some(1024),
                    ..Default::default()
                },
            )
            .unwrap()
            .into(),
        );

        let params = engine.params().unwrap();
        assert_eq!(params.len(), 4);
        assert!(matches!(&params[0], EngineParam::Column(c) if c.name == "day"));
        assert!(matches!(
            &params[1],
            EngineParam::Expression(e) if e.as_str() == "intHash32(user_id)"
        ));
        assert!(matches!(&params[2], EngineParam::Tuple(_)));
        assert_eq!(params[3], EngineParam::Int(1024));
    }

    #[test]
    fn test_zero_and_negative_granularity_accepted() {
        for granularity in [0, -1] {
            let engine = attached(
                MergeTree::new(
                    "day",
                    vec![KeyInput::from("user_id")],
                    MergeTreeOptions {
                        index_granularity: Some(granularity),
                        ..Default::default()
                    },
                )
                .unwrap()
                .into(),
            );
            let params = engine.params().unwrap();
            assert_eq!(params.last(), Some(&EngineParam::Int(granularity)));
        }
    }

    #[test]
    fn test_replicated_merge_tree() {
        let engine = attached(
            MergeTree::new(
                "day",
                vec![KeyInput::from("user_id")],
                MergeTreeOptions {
                    replica_name: Some("r1".to_string()),
                    replica_table_path: Some("/clickhouse/tables/events".to_string()),
                    ..Default::default()
                },
            )
            .unwrap()
            .into(),
        );

        assert_eq!(engine.name(), "ReplicatedMergeTree");
        let params = engine.params().unwrap();
        assert_eq!(
            params[0],
            EngineParam::StringLiteral("'/clickhouse/tables/events'".to_string())
        );
        assert_eq!(params[1], EngineParam::StringLiteral("'r1'".to_string()));
        assert!(matches!(&params[2], EngineParam::Column(c) if c.name == "day"));
    }

    #[test]
    fn test_partial_replication_coordinates_rejected() {
        for (name, path) in [
            (Some("r1".to_string()), None),
            (None, Some("/p".to_string())),
        ] {
            let result = MergeTree::new(
                "day",
                vec![KeyInput::from("user_id")],
                MergeTreeOptions {
                    replica_name: name,
                    replica_table_path: path,
                    ..Default::default()
                },
            );
            assert!(matches!(
                result,
                Err(EngineError::InvalidConfiguration { .. })
            ));
        }
    }

    #[test]
    fn test_full_or_no_replication_coordinates_accepted() {
        assert!(MergeTree::new(
            "day",
            vec![KeyInput::from("user_id")],
            MergeTreeOptions::default(),
        )
        .is_ok());
        assert!(MergeTree::new(
            "day",
            vec![KeyInput::from("user_id")],
            MergeTreeOptions {
                replica_name: Some("r1".to_string()),
                replica_table_path: Some("/p".to_string()),
                ..Default::default()
            },
        )
        .is_ok());
    }

    #[test]
    fn test_params_before_attach_fails() {
        let engine: TableEngine = MergeTree::new(
            "day",
            vec![KeyInput::from("user_id")],
            MergeTreeOptions::default(),
        )
        .unwrap()
        .into();
        assert!(matches!(
            engine.params(),
            Err(EngineError::NotAttached { .. })
        ));
    }

    #[test]
    fn test_double_attach_fails() {
        let mut engine: TableEngine = MergeTree::new(
            "day",
            vec![KeyInput::from("user_id")],
            MergeTreeOptions::default(),
        )
        .unwrap()
        .into();
        engine.attach("events", &columns()).unwrap();
        let err = engine.attach("other", &columns()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::AlreadyAttached { ref table } if table == "events"
        ));
    }

    #[test]
    fn test_collapsing_appends_sign_column() {
        let base = attached(
            MergeTree::new(
                "day",
                vec![KeyInput::from("user_id")],
                MergeTreeOptions::default(),
            )
            .unwrap()
            .into(),
        );
        let collapsing = attached(
            CollapsingMergeTree::new(
                "day",
                vec![KeyInput::from("user_id")],
                "sign",
                MergeTreeOptions::default(),
            )
            .unwrap()
            .into(),
        );

        let base_params = base.params().unwrap();
        let collapsing_params = collapsing.params().unwrap();
        assert_eq!(collapsing.name(), "CollapsingMergeTree");
        assert_eq!(collapsing_params.len(), base_params.len() + 1);
        assert_eq!(&collapsing_params[..base_params.len()], &base_params[..]);
        assert!(matches!(
            collapsing_params.last().unwrap(),
            EngineParam::Column(c) if c.name == "sign"
        ));
    }

    #[test]
    fn test_summing_appends_tuple_only_when_given() {
        let base = attached(
            MergeTree::new(
                "day",
                vec![KeyInput::from("user_id")],
                MergeTreeOptions::default(),
            )
            .unwrap()
            .into(),
        );
        let without = attached(
            SummingMergeTree::new(
                "day",
                vec![KeyInput::from("user_id")],
                None,
                MergeTreeOptions::default(),
            )
            .unwrap()
            .into(),
        );
        let with = attached(
            SummingMergeTree::new(
                "day",
                vec![KeyInput::from("user_id")],
                Some(vec![KeyInput::from("amount")]),
                MergeTreeOptions::default(),
            )
            .unwrap()
            .into(),
        );

        let base_params = base.params().unwrap();
        assert_eq!(without.params().unwrap(), base_params);
        let with_params = with.params().unwrap();
        assert_eq!(with_params.len(), base_params.len() + 1);
        assert!(matches!(
            with_params.last().unwrap(),
            EngineParam::Tuple(items)
                if matches!(&items[0], EngineParam::Column(c) if c.name == "amount")
        ));
    }

    #[test]
    fn test_replicated_variant_names() {
        let options = MergeTreeOptions {
            replica_name: Some("r1".to_string()),
            replica_table_path: Some("/p".to_string()),
            ..Default::default()
        };
        let collapsing: TableEngine = CollapsingMergeTree::new(
            "day",
            vec![KeyInput::from("user_id")],
            "sign",
            options.clone(),
        )
        .unwrap()
        .into();
        let summing: TableEngine =
            SummingMergeTree::new("day", vec![KeyInput::from("user_id")], None, options)
                .unwrap()
                .into();

        assert_eq!(collapsing.name(), "ReplicatedCollapsingMergeTree");
        assert_eq!(summing.name(), "ReplicatedSummingMergeTree");
    }

    #[test]
    fn test_buffer_params() {
        let engine: TableEngine = Buffer::new("analytics", "events").into();
        assert_eq!(engine.name(), "Buffer");
        let params = engine.params().unwrap();
        assert_eq!(
            params,
            vec![
                EngineParam::Identifier("analytics".to_string()),
                EngineParam::Identifier("events".to_string()),
                EngineParam::Int(16),
                EngineParam::Int(10),
                EngineParam::Int(100),
                EngineParam::Int(10_000),
                EngineParam::Int(1_000_000),
                EngineParam::Int(10_000_000),
                EngineParam::Int(100_000_000),
            ]
        );
    }

    #[test]
    fn test_memory_params() {
        let engine = TableEngine::Memory;
        assert_eq!(engine.name(), "Memory");
        assert_eq!(engine.params().unwrap(), vec![]);
    }

    #[test]
    fn test_merge_params() {
        let engine = TableEngine::Merge {
            db: "analytics".to_string(),
            regexp: "events_.*".to_string(),
        };
        assert_eq!(engine.name(), "Merge");
        assert_eq!(
            engine.params().unwrap(),
            vec![
                EngineParam::Identifier("analytics".to_string()),
                EngineParam::StringLiteral(escape_string("events_.*")),
            ]
        );
    }

    #[test]
    fn test_merge_tree_family() {
        let merge_tree: TableEngine = MergeTree::new(
            "day",
            vec![KeyInput::from("user_id")],
            MergeTreeOptions::default(),
        )
        .unwrap()
        .into();
        assert!(merge_tree.is_merge_tree_family());
        assert!(!TableEngine::Memory.is_merge_tree_family());
        assert!(!TableEngine::Buffer(Buffer::new("db", "t")).is_merge_tree_family());
    }
}
