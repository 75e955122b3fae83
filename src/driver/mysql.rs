/// Networked MySQL backend.
///
/// Owns one synchronous connection addressed by host/port/credentials.
/// Schema metadata comes from `information_schema` (parameterized), `SHOW
/// TABLES` and `DESCRIBE`; `DESCRIBE` already reports the
/// `Field`/`Type`/`Null`/`Key`/`Default` headers this layer standardizes on.
use crate::driver::{Driver, RowSet};
use crate::error::{DbError, Result};
use crate::statement::Statement;
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Params, Value};
use tracing::debug;

pub struct MysqlDriver {
    conn: Conn,
}

impl MysqlDriver {
    /// Opens a connection to the networked store.
    pub fn open(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        database: &str,
    ) -> Result<Self> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(host))
            .tcp_port(port)
            .user(Some(username))
            .pass(Some(password))
            .db_name(Some(database));
        let conn = Conn::new(opts).map_err(|e| {
            DbError::Connection(format!("failed to connect to {host}:{port}/{database}: {e}"))
        })?;
        debug!(host, port, database, "opened networked store");
        Ok(MysqlDriver { conn })
    }

    fn query_err(statement: &str, error: mysql::Error) -> DbError {
        DbError::Query {
            statement: statement.to_string(),
            message: error.to_string(),
        }
    }

    fn positional(params: &[String]) -> Params {
        Params::Positional(params.iter().map(|v| Value::from(v.as_str())).collect())
    }

    fn cell_to_string(value: &Value) -> Option<String> {
        match value {
            Value::NULL => None,
            Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Value::Int(i) => Some(i.to_string()),
            Value::UInt(u) => Some(u.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Double(d) => Some(d.to_string()),
            Value::Date(y, mo, d, h, mi, s, _us) => {
                if *h == 0 && *mi == 0 && *s == 0 {
                    Some(format!("{y:04}-{mo:02}-{d:02}"))
                } else {
                    Some(format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}"))
                }
            }
            Value::Time(negative, days, h, mi, s, _us) => {
                let sign = if *negative { "-" } else { "" };
                let hours = u32::from(*days) * 24 + u32::from(*h);
                Some(format!("{sign}{hours:02}:{mi:02}:{s:02}"))
            }
        }
    }

    fn run_query(&mut self, sql: &str, params: &[String]) -> Result<RowSet> {
        if params.is_empty() {
            let result = self
                .conn
                .query_iter(sql)
                .map_err(|e| Self::query_err(sql, e))?;
            Self::collect(sql, result)
        } else {
            let result = self
                .conn
                .exec_iter(sql, Self::positional(params))
                .map_err(|e| Self::query_err(sql, e))?;
            Self::collect(sql, result)
        }
    }

    fn collect<P: mysql::prelude::Protocol>(
        sql: &str,
        result: mysql::QueryResult<'_, '_, '_, P>,
    ) -> Result<RowSet> {
        let columns: Vec<String> = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();

        let mut rows = Vec::new();
        for row in result {
            let row = row.map_err(|e| Self::query_err(sql, e))?;
            let mut cells = Vec::with_capacity(row.len());
            for i in 0..row.len() {
                cells.push(row.as_ref(i).and_then(Self::cell_to_string));
            }
            rows.push(cells);
        }

        Ok(RowSet { columns, rows })
    }
}

impl Driver for MysqlDriver {
    fn execute(&mut self, statement: &Statement) -> Result<usize> {
        if statement.params.is_empty() {
            self.conn
                .query_drop(&statement.sql)
                .map_err(|e| Self::query_err(&statement.sql, e))?;
        } else {
            self.conn
                .exec_drop(&statement.sql, Self::positional(&statement.params))
                .map_err(|e| Self::query_err(&statement.sql, e))?;
        }
        Ok(self.conn.affected_rows() as usize)
    }

    fn query(&mut self, statement: &Statement) -> Result<RowSet> {
        self.run_query(&statement.sql, &statement.params)
    }

    fn begin(&mut self) -> Result<()> {
        self.conn
            .query_drop("START TRANSACTION")
            .map_err(|e| Self::query_err("START TRANSACTION", e))
    }

    fn commit(&mut self) -> Result<()> {
        self.conn
            .query_drop("COMMIT")
            .map_err(|e| Self::query_err("COMMIT", e))
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn
            .query_drop("ROLLBACK")
            .map_err(|e| Self::query_err("ROLLBACK", e))
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        const SQL: &str = "SELECT COUNT(*) FROM information_schema.tables \
                           WHERE table_schema = DATABASE() AND table_name = ?";
        let count: Option<u64> = self
            .conn
            .exec_first(SQL, (table,))
            .map_err(|e| Self::query_err(SQL, e))?;
        Ok(count.unwrap_or(0) > 0)
    }

    fn list_tables(&mut self) -> Result<Vec<String>> {
        const SQL: &str = "SHOW TABLES";
        self.conn
            .query(SQL)
            .map_err(|e| Self::query_err(SQL, e))
    }

    fn describe_table(&mut self, table: &str) -> Result<RowSet> {
        let sql = format!("DESCRIBE {}", crate::statement::quote_ident(table)?);
        self.run_query(&sql, &[])
    }
}
