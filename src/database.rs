/// Database Facade
///
/// Composes the statement builder, driver layer and object mapper into the
/// public operation set. One `Database` owns at most one live connection
/// handle plus the transaction state machine; instances are passed to
/// whoever needs them rather than held in a global.
///
/// The `debug` flag turns on per-operation `tracing` emission. Logging is
/// observational only and never changes which result an operation returns.
use crate::driver::{self, ConnectionSpec, Driver, RowSet};
use crate::error::{DbError, Result};
use crate::mapper::{BindingRegistry, EntityBinding};
use crate::schema::{Column, Table};
use crate::statement;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Rendering of a NULL cell in delimited files.
const NULL_MARKER: &str = "\\N";

/// Transaction lifecycle of the single owned connection.
///
/// `start_transaction` is only valid from `Idle`; `commit` and `rollback`
/// only from `Active`. Violations fail and leave the state unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    Active,
}

pub struct Database {
    spec: ConnectionSpec,
    debug: bool,
    driver: Option<Box<dyn Driver>>,
    transaction: TransactionState,
    bindings: BindingRegistry,
}

impl Database {
    /// A database addressed by an embedded store file.
    pub fn embedded(path: impl Into<std::path::PathBuf>) -> Self {
        Database::new(ConnectionSpec::Embedded { path: path.into() })
    }

    /// A database addressed by a networked store.
    pub fn networked(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Database::new(ConnectionSpec::Networked {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            database: database.into(),
        })
    }

    /// A database from an explicit connection spec, created unconnected.
    pub fn new(spec: ConnectionSpec) -> Self {
        Database {
            spec,
            debug: false,
            driver: None,
            transaction: TransactionState::Idle,
            bindings: BindingRegistry::new(),
        }
    }

    /// Enables or disables per-operation debug logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Registers a type's binding for `write_object`/`read_object`.
    pub fn register_binding<T: 'static>(&mut self, binding: EntityBinding<T>)
    where
        EntityBinding<T>: Send + Sync,
    {
        self.bindings.register(binding);
    }

    /// Opens the connection handle the spec addresses.
    ///
    /// Connecting while already connected replaces the old handle and
    /// resets the transaction state.
    pub fn connect(&mut self) -> Result<()> {
        let driver = driver::open(&self.spec)?;
        self.driver = Some(driver);
        self.transaction = TransactionState::Idle;
        if self.debug {
            debug!("connected");
        }
        Ok(())
    }

    /// Releases the connection handle. Subsequent operations fail with
    /// `NotConnected` until `connect` runs again.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.driver.take().is_none() {
            return Err(DbError::NotConnected);
        }
        self.transaction = TransactionState::Idle;
        if self.debug {
            debug!("disconnected");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.driver.is_some()
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.transaction
    }

    fn driver(&mut self) -> Result<&mut Box<dyn Driver>> {
        self.driver.as_mut().ok_or(DbError::NotConnected)
    }

    fn require_table(&mut self, table: &str) -> Result<()> {
        if self.driver()?.table_exists(table)? {
            Ok(())
        } else {
            Err(DbError::Schema(format!("no such table `{table}`")))
        }
    }

    /// Creates a table from its declarative schema, with column defaults
    /// inlined in the create statement.
    pub fn create_table(&mut self, table: &Table) -> Result<()> {
        let stmt = statement::create_table(table)?;
        if self.debug {
            debug!(table = %table.name, sql = %stmt.sql, "creating table");
        }
        self.driver()?.execute(&stmt)?;
        Ok(())
    }

    /// Drops a table; a no-op when the table does not exist.
    pub fn drop_table(&mut self, table: &str) -> Result<()> {
        if !self.driver()?.table_exists(table)? {
            return Ok(());
        }
        if self.debug {
            debug!(table, "dropping table");
        }
        self.driver()?.execute(&statement::drop_table(table)?)?;
        Ok(())
    }

    /// `DROP TABLE IF EXISTS`, delegated to the store.
    pub fn drop_table_if_exists(&mut self, table: &str) -> Result<()> {
        if self.debug {
            debug!(table, "dropping table if it exists");
        }
        self.driver()?
            .execute(&statement::drop_table_if_exists(table)?)?;
        Ok(())
    }

    pub fn table_exists(&mut self, table: &str) -> Result<bool> {
        self.driver()?.table_exists(table)
    }

    /// Inserts one row from ordered column/value pairs.
    ///
    /// The pair order drives both the column list and the placeholder
    /// bindings, so the two can never fall out of alignment.
    pub fn insert(&mut self, table: &str, pairs: &[(&str, &str)]) -> Result<()> {
        let stmt = statement::insert(table, pairs)?;
        if self.debug {
            debug!(table, sql = %stmt.sql, "inserting row");
        }
        self.driver()?.execute(&stmt)?;
        Ok(())
    }

    /// Point lookup of a single column, `Ok(None)` when no row matches.
    pub fn get(
        &mut self,
        table: &str,
        key: &str,
        value: &str,
        column: &str,
    ) -> Result<Option<String>> {
        let stmt = statement::select_column_where(table, key, value, column)?;
        if self.debug {
            debug!(table, key, value, column, "point lookup");
        }
        let rows = self.driver()?.query(&stmt)?;
        Ok(rows
            .rows
            .into_iter()
            .next()
            .and_then(|mut row| row.drain(..).next())
            .flatten())
    }

    pub fn row_exists(&mut self, table: &str, key: &str, value: &str) -> Result<bool> {
        let stmt = statement::row_exists(table, key, value)?;
        let rows = self.driver()?.query(&stmt)?;
        Ok(!rows.is_empty())
    }

    pub fn delete(&mut self, table: &str, key: &str, value: &str) -> Result<()> {
        let stmt = statement::delete(table, key, value)?;
        if self.debug {
            debug!(table, key, value, "deleting rows");
        }
        self.driver()?.execute(&stmt)?;
        Ok(())
    }

    /// Replaces the row(s) matching `key = value` with a freshly inserted
    /// row; a no-op when nothing matches.
    ///
    /// When no caller transaction is active the delete/insert pair runs in
    /// its own transaction, rolled back on failure, so callers never see
    /// the row half-replaced.
    pub fn replace(
        &mut self,
        table: &str,
        key: &str,
        value: &str,
        pairs: &[(&str, &str)],
    ) -> Result<()> {
        if !self.row_exists(table, key, value)? {
            return Ok(());
        }
        if self.debug {
            debug!(table, key, value, "replacing row");
        }
        let delete_stmt = statement::delete(table, key, value)?;
        let insert_stmt = statement::insert(table, pairs)?;

        let own_transaction = self.transaction == TransactionState::Idle;
        let driver = self.driver()?;
        if own_transaction {
            driver.begin()?;
        }
        let mut result = driver.execute(&delete_stmt).map(|_| ());
        if result.is_ok() {
            result = driver.execute(&insert_stmt).map(|_| ());
        }
        match result {
            Ok(_) => {
                if own_transaction {
                    driver.commit()?;
                }
                Ok(())
            }
            Err(e) => {
                if own_transaction {
                    driver.rollback()?;
                }
                Err(e)
            }
        }
    }

    pub fn update(
        &mut self,
        table: &str,
        key: &str,
        value: &str,
        column: &str,
        new_value: &str,
    ) -> Result<()> {
        let stmt = statement::update(table, key, value, column, new_value)?;
        if self.debug {
            debug!(table, key, value, column, "updating rows");
        }
        self.driver()?.execute(&stmt)?;
        Ok(())
    }

    pub fn add_column(&mut self, table: &str, column: &Column) -> Result<()> {
        self.require_table(table)?;
        if self.debug {
            debug!(table, column = %column.name, "adding column");
        }
        self.driver()?.execute(&statement::add_column(table, column)?)?;
        Ok(())
    }

    pub fn remove_column(&mut self, table: &str, column: &str) -> Result<()> {
        self.require_table(table)?;
        if self.debug {
            debug!(table, column, "removing column");
        }
        self.driver()?
            .execute(&statement::remove_column(table, column)?)?;
        Ok(())
    }

    pub fn rename_column(&mut self, table: &str, old_name: &str, new_name: &str) -> Result<()> {
        self.require_table(table)?;
        if self.debug {
            debug!(table, old_name, new_name, "renaming column");
        }
        self.driver()?
            .execute(&statement::rename_column(table, old_name, new_name)?)?;
        Ok(())
    }

    /// Changes a column's default after creation. Not every store supports
    /// this form of `ALTER`; an unsupported store rejects it as a query
    /// error carrying the statement.
    pub fn set_column_default_value(
        &mut self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<()> {
        self.require_table(table)?;
        if self.debug {
            debug!(table, column, "setting column default");
        }
        self.driver()?
            .execute(&statement::set_default_value(table, column, value)?)?;
        Ok(())
    }

    /// Swaps the table's primary key. Same store-support caveat as
    /// `set_column_default_value`.
    pub fn replace_primary_key(&mut self, table: &str, primary_key: &str) -> Result<()> {
        self.require_table(table)?;
        if self.debug {
            debug!(table, primary_key, "replacing primary key");
        }
        self.driver()?
            .execute(&statement::replace_primary_key(table, primary_key)?)?;
        Ok(())
    }

    /// Copies all rows of `copy_from` into `table`.
    pub fn copy_contents_to_table(&mut self, table: &str, copy_from: &str) -> Result<()> {
        self.require_table(table)?;
        self.require_table(copy_from)?;
        if self.debug {
            debug!(table, copy_from, "copying table contents");
        }
        self.driver()?
            .execute(&statement::copy_contents(table, copy_from)?)?;
        Ok(())
    }

    pub fn count_rows(&mut self, table: &str) -> Result<u64> {
        let stmt = statement::count_rows(table)?;
        let rows = self.driver()?.query(&stmt)?;
        let cell = rows
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|c| c.as_deref())
            .unwrap_or("0");
        cell.parse().map_err(|e| DbError::Query {
            statement: stmt.sql.clone(),
            message: format!("unreadable row count {cell:?}: {e}"),
        })
    }

    pub fn list_tables(&mut self) -> Result<Vec<String>> {
        self.driver()?.list_tables()
    }

    pub fn select_all(&mut self, table: &str) -> Result<RowSet> {
        let stmt = statement::select_all(table)?;
        self.driver()?.query(&stmt)
    }

    pub fn describe_table(&mut self, table: &str) -> Result<RowSet> {
        self.require_table(table)?;
        self.driver()?.describe_table(table)
    }

    pub fn describe_column(&mut self, table: &str, column: &str) -> Result<RowSet> {
        self.require_table(table)?;
        self.driver()?.describe_column(table, column)
    }

    /// Writes every row of a table to `path`, cells joined by `delimiter`,
    /// one row per line. NULL cells are written as `\N`.
    ///
    /// A cell containing the delimiter, a line break, or the NULL marker
    /// itself has no unambiguous rendering; exporting such a cell fails with
    /// `Serialization` before anything is written.
    pub fn export_to_delimited_file(
        &mut self,
        table: &str,
        path: impl AsRef<Path>,
        delimiter: &str,
    ) -> Result<()> {
        let rows = self.select_all(table)?;
        if self.debug {
            debug!(table, path = %path.as_ref().display(), rows = rows.len(), "exporting table");
        }
        let mut contents = String::new();
        for row in &rows.rows {
            let mut cells = Vec::with_capacity(row.len());
            for cell in row {
                match cell.as_deref() {
                    None => cells.push(NULL_MARKER),
                    Some(value) => {
                        if value.contains(delimiter)
                            || value.contains('\n')
                            || value.contains('\r')
                            || value == NULL_MARKER
                        {
                            return Err(DbError::Serialization(format!(
                                "cell {value:?} in table `{table}` cannot be rendered \
                                 unambiguously with delimiter {delimiter:?}"
                            )));
                        }
                        cells.push(value);
                    }
                }
            }
            contents.push_str(&cells.join(delimiter));
            contents.push('\n');
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Loads delimited rows from `path` into the table, binding every value
    /// as a parameter; `\N` fields become NULL. Returns the number of rows
    /// imported.
    ///
    /// Field order in the file must match the table's declared column order.
    /// The file is applied atomically: when no caller transaction is active
    /// the inserts run in their own transaction, rolled back when any line
    /// is misshapen or rejected by the store.
    pub fn import_from_file(
        &mut self,
        table: &str,
        path: impl AsRef<Path>,
        delimiter: &str,
    ) -> Result<u64> {
        self.require_table(table)?;
        let columns = self.driver()?.column_names(table)?;
        let contents = fs::read_to_string(&path)?;
        if self.debug {
            debug!(table, path = %path.as_ref().display(), "importing table");
        }

        let own_transaction = self.transaction == TransactionState::Idle;
        let driver = self.driver()?;
        if own_transaction {
            driver.begin()?;
        }
        match import_lines(driver.as_mut(), table, &columns, &contents, delimiter) {
            Ok(imported) => {
                if own_transaction {
                    driver.commit()?;
                }
                Ok(imported)
            }
            Err(e) => {
                if own_transaction {
                    driver.rollback()?;
                }
                Err(e)
            }
        }
    }

    /// Starts a transaction. Only valid while `Idle`.
    pub fn start_transaction(&mut self) -> Result<()> {
        if self.transaction == TransactionState::Active {
            return Err(DbError::InvalidTransactionState(
                "transaction already started".to_string(),
            ));
        }
        self.driver()?.begin()?;
        self.transaction = TransactionState::Active;
        if self.debug {
            debug!("started transaction");
        }
        Ok(())
    }

    /// Commits the active transaction. Only valid while `Active`.
    pub fn commit(&mut self) -> Result<()> {
        if self.transaction != TransactionState::Active {
            return Err(DbError::InvalidTransactionState(
                "no transaction to commit".to_string(),
            ));
        }
        self.driver()?.commit()?;
        self.transaction = TransactionState::Idle;
        if self.debug {
            debug!("committed transaction");
        }
        Ok(())
    }

    /// Rolls back the active transaction. Only valid while `Active`.
    pub fn rollback(&mut self) -> Result<()> {
        if self.transaction != TransactionState::Active {
            return Err(DbError::InvalidTransactionState(
                "no transaction to rollback".to_string(),
            ));
        }
        self.driver()?.rollback()?;
        self.transaction = TransactionState::Idle;
        if self.debug {
            debug!("rolled back transaction");
        }
        Ok(())
    }

    /// Writes a value to a table through its registered binding: harvests
    /// every bound field in declaration order and issues a single insert.
    pub fn write_object<T: 'static>(&mut self, table: &str, value: &T) -> Result<()> {
        let binding = self.bindings.get::<T>().ok_or_else(|| {
            DbError::Serialization(format!(
                "no binding registered for {}",
                std::any::type_name::<T>()
            ))
        })?;
        let pairs = binding.harvest(value)?;
        let borrowed: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let stmt = statement::insert(table, &borrowed)?;
        if self.debug {
            debug!(table, ty = std::any::type_name::<T>(), "writing object");
        }
        self.driver()?.execute(&stmt)?;
        Ok(())
    }

    /// Reads a value back from the row matching `key = value`, through the
    /// type's designated row constructor.
    ///
    /// Zero matching rows is an error; several matching rows take the
    /// first and log the ambiguity.
    pub fn read_object<T: 'static>(&mut self, table: &str, key: &str, value: &str) -> Result<T> {
        match self.bindings.get::<T>() {
            None => {
                return Err(DbError::NoConstructor(format!(
                    "no binding registered for {}",
                    std::any::type_name::<T>()
                )))
            }
            Some(binding) if !binding.has_constructor() => {
                return Err(DbError::NoConstructor(format!(
                    "no row constructor registered for {}",
                    std::any::type_name::<T>()
                )))
            }
            Some(_) => {}
        }

        let stmt = statement::select_where(table, key, value)?;
        if self.debug {
            debug!(table, key, value, ty = std::any::type_name::<T>(), "reading object");
        }
        let rows = self.driver()?.query(&stmt)?;
        if rows.is_empty() {
            return Err(DbError::RowNotFound {
                table: table.to_string(),
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        if rows.len() > 1 {
            warn!(
                table,
                key,
                value,
                matches = rows.len(),
                "expected a unique row; taking the first match"
            );
        }

        let binding = self.bindings.get::<T>().ok_or_else(|| {
            DbError::NoConstructor(format!(
                "no binding registered for {}",
                std::any::type_name::<T>()
            ))
        })?;
        binding.construct(&rows, 0)
    }
}

/// Parses and inserts delimited lines, one parameterized statement per line.
/// `\N` fields are left out of the insert so the column stays NULL.
fn import_lines(
    driver: &mut dyn Driver,
    table: &str,
    columns: &[String],
    contents: &str,
    delimiter: &str,
) -> Result<u64> {
    let mut imported = 0;
    for (number, line) in contents.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(delimiter).collect();
        if fields.len() != columns.len() {
            return Err(DbError::Schema(format!(
                "line {}: expected {} fields, found {}",
                number + 1,
                columns.len(),
                fields.len()
            )));
        }
        let pairs: Vec<(&str, &str)> = columns
            .iter()
            .map(String::as_str)
            .zip(fields.iter().copied())
            .filter(|(_, field)| *field != NULL_MARKER)
            .collect();
        if pairs.is_empty() {
            return Err(DbError::Schema(format!(
                "line {}: every field is NULL",
                number + 1
            )));
        }
        let stmt = statement::insert(table, &pairs)?;
        driver.execute(&stmt)?;
        imported += 1;
    }
    Ok(imported)
}
