// Core infrastructure modules
pub mod error;

// Data-access layer modules
pub mod config;
pub mod database;
pub mod driver;
pub mod mapper;
pub mod schema;
pub mod statement;

// Re-export the types most callers need
pub use database::{Database, TransactionState};
pub use driver::{ConnectionSpec, RowSet};
pub use error::{DbError, Result};
pub use mapper::{ConstructorArgs, EntityBinding, EntityBindingBuilder};
pub use schema::{Column, ColumnType, Table};
