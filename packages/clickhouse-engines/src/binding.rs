//! Two-phase binding of symbolic column references.
//!
//! Engine descriptors are declared while the table is still being put
//! together, so they name columns symbolically. `attach` resolves those
//! references against the table's final column set; the read accessors fail
//! until that has happened.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::EngineError;
use crate::model::ClickHouseColumn;

/// An opaque SQL expression, passed through to the engine clause unchanged.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SqlExpression(String);

impl SqlExpression {
    pub fn new(expr: impl Into<String>) -> Self {
        SqlExpression(expr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqlExpression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A column reference as the user declared it: a bare name, or a column
/// handle built ahead of table assembly. Either way the reference is
/// resolved by name against the attached table.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ColumnSpec {
    Name(String),
    Handle(ClickHouseColumn),
}

impl ColumnSpec {
    pub fn name(&self) -> &str {
        match self {
            ColumnSpec::Name(name) => name,
            ColumnSpec::Handle(column) => &column.name,
        }
    }
}

impl From<&str> for ColumnSpec {
    fn from(name: &str) -> Self {
        ColumnSpec::Name(name.to_string())
    }
}

impl From<String> for ColumnSpec {
    fn from(name: String) -> Self {
        ColumnSpec::Name(name)
    }
}

impl From<ClickHouseColumn> for ColumnSpec {
    fn from(column: ClickHouseColumn) -> Self {
        ColumnSpec::Handle(column)
    }
}

/// A single symbolic column reference, bound once at attach time.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ColumnRef {
    declared: ColumnSpec,
    resolved: Option<ClickHouseColumn>,
}

impl ColumnRef {
    pub fn new(spec: impl Into<ColumnSpec>) -> Self {
        ColumnRef {
            declared: spec.into(),
            resolved: None,
        }
    }

    /// The name the reference was declared with.
    pub fn declared_name(&self) -> &str {
        self.declared.name()
    }

    pub(crate) fn attach(
        &mut self,
        table: &str,
        columns: &[ClickHouseColumn],
    ) -> Result<(), EngineError> {
        let name = self.declared.name();
        let column = lookup_column(name, table, columns)?;
        self.resolved = Some(column.clone());
        Ok(())
    }

    /// The resolved column. Fails until `attach` has run.
    pub fn column(&self) -> Result<&ClickHouseColumn, EngineError> {
        self.resolved.as_ref().ok_or(EngineError::NotAttached {
            accessor: "column",
        })
    }
}

/// One entry of a composite key as declared: either literal SQL or a column
/// reference. The classification is decided here, at construction, and
/// never re-derived later.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum KeyInput {
    Expression(SqlExpression),
    Column(ColumnSpec),
}

impl KeyInput {
    /// Literal SQL, e.g. a hash-bucket expression.
    pub fn expr(expression: impl Into<String>) -> Self {
        KeyInput::Expression(SqlExpression::new(expression))
    }

    pub fn column(spec: impl Into<ColumnSpec>) -> Self {
        KeyInput::Column(spec.into())
    }
}

impl From<SqlExpression> for KeyInput {
    fn from(expression: SqlExpression) -> Self {
        KeyInput::Expression(expression)
    }
}

impl From<&str> for KeyInput {
    fn from(name: &str) -> Self {
        KeyInput::Column(ColumnSpec::from(name))
    }
}

impl From<ClickHouseColumn> for KeyInput {
    fn from(column: ClickHouseColumn) -> Self {
        KeyInput::Column(ColumnSpec::from(column))
    }
}

/// One rendered slot of the key tuple: the original expression, or the
/// column the reference resolved to.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum KeyItem {
    Expression(SqlExpression),
    Column(ClickHouseColumn),
}

/// An ordered mix of SQL expressions and column references making up a
/// composite key. ClickHouse key tuples interleave literal SQL with plain
/// columns, so every entry keeps its declaration position through
/// resolution.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyExpressionList {
    inputs: Vec<KeyInput>,
    resolved: Vec<KeyItem>,
    attached: bool,
}

impl KeyExpressionList {
    pub fn new(inputs: Vec<KeyInput>) -> Self {
        KeyExpressionList {
            inputs,
            resolved: Vec::new(),
            attached: false,
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Resolves every column-shaped entry against `columns`, in declaration
    /// order. Resolution is all-or-nothing: a miss leaves the list
    /// unattached with no entry bound.
    pub(crate) fn attach(
        &mut self,
        table: &str,
        columns: &[ClickHouseColumn],
    ) -> Result<(), EngineError> {
        let mut resolved = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            match input {
                KeyInput::Expression(expression) => {
                    resolved.push(KeyItem::Expression(expression.clone()));
                }
                KeyInput::Column(spec) => {
                    let column = lookup_column(spec.name(), table, columns)?;
                    resolved.push(KeyItem::Column(column.clone()));
                }
            }
        }
        self.resolved = resolved;
        self.attached = true;
        Ok(())
    }

    /// The rendered slots, one per declared input, in declaration order.
    /// Fails until `attach` has run.
    pub fn rendered(&self) -> Result<&[KeyItem], EngineError> {
        if !self.attached {
            return Err(EngineError::NotAttached {
                accessor: "rendered",
            });
        }
        Ok(&self.resolved)
    }
}

fn lookup_column<'a>(
    name: &str,
    table: &str,
    columns: &'a [ClickHouseColumn],
) -> Result<&'a ClickHouseColumn, EngineError> {
    columns
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| EngineError::UnknownColumn {
            column: name.to_string(),
            table: table.to_string(),
        })
}
