/// Error Module
///
/// This module defines the error types for the data-access layer. Every
/// operation surfaces its failure through `DbError`; nothing is swallowed
/// on the way up to the caller, and debug logging never changes which
/// variant is returned.
use thiserror::Error;

/// Error type covering every failure the data-access layer can produce.
///
/// The variants follow the layer boundaries:
/// - Connection lifecycle (`Connection`, `NotConnected`)
/// - Schema definition and identifier validation (`Schema`)
/// - Transaction state machine (`InvalidTransactionState`)
/// - Statement execution (`Query`, which carries the offending SQL)
/// - Object mapping (`RowNotFound`, `Serialization`, `NoConstructor`,
///   `Construction`)
#[derive(Error, Debug)]
pub enum DbError {
    /// Transport or authentication failure while opening a connection
    #[error("connection error: {0}")]
    Connection(String),

    /// An operation other than `connect` was invoked while unconnected
    #[error("not connected to a database")]
    NotConnected,

    /// Malformed schema definition or invalid identifier
    #[error("schema error: {0}")]
    Schema(String),

    /// Transaction state machine violation (start while active, or
    /// commit/rollback while idle)
    #[error("invalid transaction state: {0}")]
    InvalidTransactionState(String),

    /// A statement the store rejected, surfaced with the SQL for diagnosis
    #[error("query error: {message} (statement: {statement})")]
    Query { statement: String, message: String },

    /// A row lookup that required exactly one match found none
    #[error("no row matched `{key}` = {value:?} in table `{table}`")]
    RowNotFound {
        table: String,
        key: String,
        value: String,
    },

    /// A bound field produced no value while writing an object
    #[error("serialization error: {0}")]
    Serialization(String),

    /// No (or more than one) row constructor registered for a type
    #[error("no usable row constructor: {0}")]
    NoConstructor(String),

    /// Type coercion or arity mismatch while rebuilding an object from a row
    #[error("construction error: {0}")]
    Construction(String),

    /// Configuration loading and validation errors
    #[error("configuration error: {0}")]
    Config(String),

    /// File system and I/O errors (export/import paths)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;
