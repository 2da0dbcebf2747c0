use handlebars::{no_escape, Handlebars};
use itertools::Itertools;
use serde_json::{json, Value};
use tracing::debug;

use crate::engines::TableEngine;
use crate::errors::{validate_identifier, EngineError};
use crate::model::{
    ClickHouseColumn, ClickHouseColumnType, ClickHouseFloat, ClickHouseInt, ClickHouseTable,
};

static CREATE_TABLE_TEMPLATE: &str = r#"
CREATE TABLE IF NOT EXISTS `{{db_name}}`.`{{table_name}}`
(
{{#each fields}} `{{field_name}}` {{{field_type}}}{{#if field_default}} DEFAULT {{{field_default}}}{{/if}}{{#unless @last}},{{/unless}}
{{/each}})
ENGINE = {{engine}}"#;

static DROP_TABLE_TEMPLATE: &str = r#"
DROP TABLE IF EXISTS `{{db_name}}`.`{{table_name}}`;
"#;

/// Renders the literal `Name(params...)` engine clause. Engines without
/// parameters render with empty parentheses.
pub fn engine_clause(engine: &TableEngine) -> Result<String, EngineError> {
    let params = engine.params()?;
    Ok(format!("{}({})", engine.name(), params.iter().join(", ")))
}

pub fn create_table_query(
    db_name: &str,
    table: &ClickHouseTable,
) -> Result<String, EngineError> {
    validate_identifier(db_name, "database name")?;
    validate_identifier(&table.name, "table name")?;
    debug!("Generating CREATE TABLE for `{}`.`{}`", db_name, table.name);

    let mut reg = Handlebars::new();
    reg.register_escape_fn(no_escape);

    let context = json!({
        "db_name": db_name,
        "table_name": table.name,
        "fields": build_field_context(&table.columns),
        "engine": engine_clause(&table.engine)?,
    });

    Ok(reg.render_template(CREATE_TABLE_TEMPLATE, &context)?)
}

pub fn drop_table_query(db_name: &str, table_name: &str) -> Result<String, EngineError> {
    validate_identifier(db_name, "database name")?;
    validate_identifier(table_name, "table name")?;

    let reg = Handlebars::new();

    let context = json!({
        "db_name": db_name,
        "table_name": table_name,
    });

    Ok(reg.render_template(DROP_TABLE_TEMPLATE, &context)?)
}

pub fn field_type_to_string(field_type: &ClickHouseColumnType) -> String {
    match field_type {
        ClickHouseColumnType::String => "String".to_string(),
        ClickHouseColumnType::Boolean => "Boolean".to_string(),
        ClickHouseColumnType::ClickhouseInt(int) => match int {
            ClickHouseInt::Int8
            | ClickHouseInt::Int16
            | ClickHouseInt::Int32
            | ClickHouseInt::Int64
            | ClickHouseInt::Int128
            | ClickHouseInt::Int256
            | ClickHouseInt::UInt8
            | ClickHouseInt::UInt16
            | ClickHouseInt::UInt32
            | ClickHouseInt::UInt64
            | ClickHouseInt::UInt128
            | ClickHouseInt::UInt256 => int.to_string(),
        },
        ClickHouseColumnType::ClickhouseFloat(float) => match float {
            ClickHouseFloat::Float32 | ClickHouseFloat::Float64 => float.to_string(),
        },
        ClickHouseColumnType::Decimal { precision, scale } => {
            format!("Decimal({precision}, {scale})")
        }
        ClickHouseColumnType::Date => "Date".to_string(),
        ClickHouseColumnType::DateTime => "DateTime('UTC')".to_string(),
        ClickHouseColumnType::Uuid => "UUID".to_string(),
        ClickHouseColumnType::Array(inner_type) => {
            format!("Array({})", field_type_to_string(inner_type))
        }
        ClickHouseColumnType::Nullable(inner_type) => {
            format!("Nullable({})", field_type_to_string(inner_type))
        }
    }
}

fn build_field_context(columns: &[ClickHouseColumn]) -> Vec<Value> {
    columns
        .iter()
        .map(|column| {
            json!({
                "field_name": column.name,
                "field_type": field_type_to_string(&column.column_type),
                "field_default": column.default,
            })
        })
        .collect()
}
