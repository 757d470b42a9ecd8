//! SQL identifier helpers.

/// Quote an identifier for SQLite, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Check that a name is a plain identifier: `[A-Za-z_][A-Za-z0-9_]*`
///
/// # Examples
/// ```
/// use castalia_results::utils::sql::is_plain_identifier;
///
/// assert!(is_plain_identifier("cellSize"));
/// assert!(!is_plain_identifier("cell size"));
/// assert!(!is_plain_identifier("2cells"));
/// ```
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
