//! String-literal escaping for values spliced into DDL text.

/// Quotes and escapes a raw string so it is safe to splice into DDL as a
/// ClickHouse string literal.
pub fn escape_string(s: &str) -> String {
    format!("'{}'", escape_ch_string(s))
}

fn escape_ch_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\\'")
}
