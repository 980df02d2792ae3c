use thiserror::Error;

/// A value object rejected at construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("`{value}` is not a usable {field}")]
    Malformed { field: &'static str, value: String },
}
