//! Shared utilities.

pub mod sql;

pub use sql::{is_plain_identifier, quote_ident};
