#[derive(Debug, thiserror::Error)]
#[error("failed to build engine clause")]
#[non_exhaustive]
pub enum EngineError {
    #[error("Engine - Invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
    #[error("Engine - Unknown column '{column}' in table '{table}'")]
    UnknownColumn {
        column: String,
        table: String,
    },
    #[error("Engine - '{accessor}' called before the engine was attached to a table")]
    NotAttached {
        accessor: &'static str,
    },
    #[error("Engine - engine is already attached to table '{table}'")]
    AlreadyAttached {
        table: String,
    },
    #[error("Engine - Invalid {identifier_type}: '{name}' - {reason}")]
    InvalidIdentifier {
        identifier_type: String,
        name: String,
        reason: String,
    },
    QueryRender(#[from] handlebars::RenderError),
}

/// Checks if a string is a valid ClickHouse identifier.
///
/// ClickHouse identifiers (database names, table names) must:
/// - Be non-empty
/// - Contain only alphanumeric characters and underscores
/// - Not start with a digit
///
/// This prevents SQL injection through the unquoted identifier positions of
/// the generated DDL.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.chars().next().unwrap().is_ascii_digit()
}

/// Validates that a string is a valid ClickHouse identifier, returning a
/// typed error on failure.
pub fn validate_identifier(name: &str, identifier_type: &str) -> Result<(), EngineError> {
    if is_valid_identifier(name) {
        return Ok(());
    }

    let reason = if name.is_empty() {
        "cannot be empty"
    } else if name.chars().next().unwrap().is_ascii_digit() {
        "cannot start with a digit"
    } else {
        "contains invalid characters (only alphanumeric and underscore allowed)"
    };

    Err(EngineError::InvalidIdentifier {
        identifier_type: identifier_type.to_string(),
        name: name.to_string(),
        reason: reason.to_string(),
    })
}
