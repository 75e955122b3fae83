/// Driver Layer
///
/// One live connection handle per driver instance, behind a small trait the
/// facade executes statements against. Two backends are provided:
///
/// - `sqlite`: the embedded, file-addressed store (rusqlite)
/// - `mysql`: the networked, host/port/credential-addressed store
///
/// Execution is synchronous and single-handled: every call blocks until the
/// store responds, and sharing one driver across threads must be serialized
/// by the caller.
use crate::error::Result;
use crate::statement::Statement;
use std::path::PathBuf;

pub mod mysql;
pub mod sqlite;

/// Addressing for the single owned connection: exactly one of an embedded
/// file store or a networked store.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionSpec {
    Embedded {
        path: PathBuf,
    },
    Networked {
        host: String,
        port: u16,
        username: String,
        password: String,
        database: String,
    },
}

/// Result rows shaped as strings, column-major headers plus row-major cells.
///
/// `None` cells are SQL NULLs. Keeping cells textual matches the layer's
/// contract: values cross the boundary as strings in both directions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RowSet {
    /// Number of rows in the set.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up a cell in one row by column name.
    pub fn cell<'a>(&'a self, row: usize, column: &str) -> Option<&'a str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }
}

/// A live connection to one store.
///
/// `execute`/`query` take pre-built statements whose parameters bind
/// positionally; the metadata operations hide per-store introspection
/// differences behind one shape.
pub trait Driver {
    /// Runs a statement that returns no rows; yields the affected row count.
    fn execute(&mut self, statement: &Statement) -> Result<usize>;

    /// Runs a statement and collects its result rows.
    fn query(&mut self, statement: &Statement) -> Result<RowSet>;

    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    /// Whether a table with this exact name exists.
    fn table_exists(&mut self, table: &str) -> Result<bool>;

    /// Names of all user tables.
    fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Per-column metadata with `Field`/`Type`/`Null`/`Key`/`Default`
    /// leading headers on every backend.
    fn describe_table(&mut self, table: &str) -> Result<RowSet>;

    /// Metadata for a single column: `describe_table` filtered by field name.
    fn describe_column(&mut self, table: &str, column: &str) -> Result<RowSet> {
        let described = self.describe_table(table)?;
        let rows = described
            .rows
            .iter()
            .filter(|row| row.first().and_then(|c| c.as_deref()) == Some(column))
            .cloned()
            .collect();
        Ok(RowSet {
            columns: described.columns,
            rows,
        })
    }

    /// Column names of a table, in declared order.
    fn column_names(&mut self, table: &str) -> Result<Vec<String>> {
        let described = self.describe_table(table)?;
        Ok(described
            .rows
            .iter()
            .filter_map(|row| row.first().and_then(|c| c.clone()))
            .collect())
    }
}

/// Opens the backend the spec addresses.
pub fn open(spec: &ConnectionSpec) -> Result<Box<dyn Driver>> {
    match spec {
        ConnectionSpec::Embedded { path } => {
            Ok(Box::new(sqlite::SqliteDriver::open(path)?))
        }
        ConnectionSpec::Networked {
            host,
            port,
            username,
            password,
            database,
        } => Ok(Box::new(mysql::MysqlDriver::open(
            host, *port, username, password, database,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rowset_cell_lookup() {
        let set = RowSet {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![Some("1".to_string()), Some("Alice".to_string())],
                vec![Some("2".to_string()), None],
            ],
        };
        assert_eq!(set.cell(0, "name"), Some("Alice"));
        assert_eq!(set.cell(1, "name"), None);
        assert_eq!(set.cell(0, "missing"), None);
        assert_eq!(set.len(), 2);
    }
}
