/// Embedded SQLite backend.
///
/// Owns one rusqlite connection opened from a file path (or ":memory:").
/// Schema metadata comes from `sqlite_master` and `PRAGMA table_info`,
/// reshaped to the same `Field`/`Type`/`Null`/`Key`/`Default` headers the
/// networked backend reports, so callers see one describe format.
use crate::driver::{Driver, RowSet};
use crate::error::{DbError, Result};
use crate::statement::Statement;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

pub struct SqliteDriver {
    conn: Connection,
}

impl SqliteDriver {
    /// Opens (creating if necessary) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::Connection(format!("failed to open {}: {e}", path.display())))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DbError::Connection(e.to_string()))?;
        debug!(path = %path.display(), "opened embedded store");
        Ok(SqliteDriver { conn })
    }

    fn query_err(statement: &str, error: rusqlite::Error) -> DbError {
        DbError::Query {
            statement: statement.to_string(),
            message: error.to_string(),
        }
    }

    fn cell_to_string(value: ValueRef<'_>) -> Option<String> {
        match value {
            ValueRef::Null => None,
            ValueRef::Integer(i) => Some(i.to_string()),
            ValueRef::Real(r) => Some(r.to_string()),
            ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl Driver for SqliteDriver {
    fn execute(&mut self, statement: &Statement) -> Result<usize> {
        self.conn
            .execute(
                &statement.sql,
                rusqlite::params_from_iter(statement.params.iter()),
            )
            .map_err(|e| Self::query_err(&statement.sql, e))
    }

    fn query(&mut self, statement: &Statement) -> Result<RowSet> {
        let mut stmt = self
            .conn
            .prepare(&statement.sql)
            .map_err(|e| Self::query_err(&statement.sql, e))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(statement.params.iter()))
            .map_err(|e| Self::query_err(&statement.sql, e))?;

        let mut collected = Vec::new();
        loop {
            match rows.next() {
                Ok(Some(row)) => {
                    let mut cells = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        let value = row
                            .get_ref(i)
                            .map_err(|e| Self::query_err(&statement.sql, e))?;
                        cells.push(Self::cell_to_string(value));
                    }
                    collected.push(cells);
                }
                Ok(None) => break,
                Err(e) => return Err(Self::query_err(&statement.sql, e)),
            }
        }

        Ok(RowSet {
            columns,
            rows: collected,
        })
    }

    fn begin(&mut self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN")
            .map_err(|e| Self::query_err("BEGIN", e))
    }

    fn commit(&mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| Self::query_err("COMMIT", e))
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| Self::query_err("ROLLBACK", e))
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        const SQL: &str = "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1";
        let mut stmt = self
            .conn
            .prepare(SQL)
            .map_err(|e| Self::query_err(SQL, e))?;
        stmt.exists([table]).map_err(|e| Self::query_err(SQL, e))
    }

    fn list_tables(&mut self) -> Result<Vec<String>> {
        const SQL: &str = "SELECT name FROM sqlite_master \
                           WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";
        let mut stmt = self
            .conn
            .prepare(SQL)
            .map_err(|e| Self::query_err(SQL, e))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Self::query_err(SQL, e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Self::query_err(SQL, e))?;
        Ok(names)
    }

    fn describe_table(&mut self, table: &str) -> Result<RowSet> {
        let mut rows = Vec::new();
        self.conn
            .pragma(None, "table_info", table, |row| {
                let name: String = row.get(1)?;
                let type_name: String = row.get(2)?;
                let notnull: bool = row.get(3)?;
                let default: Option<String> = row.get(4)?;
                let pk: i64 = row.get(5)?;
                rows.push(vec![
                    Some(name),
                    Some(type_name),
                    Some((if notnull { "NO" } else { "YES" }).to_string()),
                    Some((if pk > 0 { "PRI" } else { "" }).to_string()),
                    default,
                ]);
                Ok(())
            })
            .map_err(|e| Self::query_err("PRAGMA table_info", e))?;

        Ok(RowSet {
            columns: vec![
                "Field".to_string(),
                "Type".to_string(),
                "Null".to_string(),
                "Key".to_string(),
                "Default".to_string(),
            ],
            rows,
        })
    }
}
