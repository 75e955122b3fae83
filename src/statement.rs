/// Statement Builder
///
/// Translates high-level data operations into SQL text plus an ordered
/// parameter list. Two rules hold everywhere:
///
/// - Data values never appear in the SQL text; they travel as positional `?`
///   placeholders bound at execution time. The single exception is the
///   DEFAULT literal in DDL, where neither supported store binds parameters;
///   that literal is escaped by doubling single quotes.
/// - Identifiers (table and column names) are concatenated, but only after
///   validation against an allow-list of `[A-Za-z0-9_]`, and are always
///   backtick-quoted.
use crate::error::{DbError, Result};
use crate::schema::{Column, Table};
use std::collections::HashSet;

/// SQL text plus the ordered values bound to its placeholders.
///
/// The N-th placeholder in `sql` binds the N-th entry of `params`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<String>,
}

impl Statement {
    fn new(sql: String) -> Self {
        Statement {
            sql,
            params: Vec::new(),
        }
    }

    fn with_params(sql: String, params: Vec<String>) -> Self {
        Statement { sql, params }
    }
}

/// Validates an identifier against the allow-list and wraps it in backticks.
///
/// Rejecting anything outside `[A-Za-z0-9_]` means quoting and escape
/// characters can never ride along inside a concatenated identifier.
pub fn quote_ident(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(DbError::Schema("empty identifier".to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DbError::Schema(format!(
            "invalid identifier {name:?}: only ASCII letters, digits and '_' are allowed"
        )));
    }
    Ok(format!("`{name}`"))
}

/// Escapes a value for use as a literal DEFAULT clause in DDL.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Builds `CREATE TABLE` for the given schema.
///
/// Columns appear in the table's declared order; the primary-key clause, if
/// any, comes last. Fails with a schema error on an empty column list or a
/// duplicate column name.
pub fn create_table(table: &Table) -> Result<Statement> {
    if table.columns.is_empty() {
        return Err(DbError::Schema(format!(
            "table `{}` has no columns",
            table.name
        )));
    }

    let mut seen = HashSet::new();
    for column in &table.columns {
        if !seen.insert(column.name.as_str()) {
            return Err(DbError::Schema(format!(
                "duplicate column `{}` in table `{}`",
                column.name, table.name
            )));
        }
    }

    let mut defs = Vec::with_capacity(table.columns.len() + 1);
    for column in &table.columns {
        let mut def = format!("{} {}", quote_ident(&column.name)?, column.column_type.sql());
        if !column.allow_null {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default_value {
            def.push_str(" DEFAULT ");
            def.push_str(&quote_literal(default));
        }
        defs.push(def);
    }
    if let Some(pk) = &table.primary_key {
        defs.push(format!("PRIMARY KEY ({})", quote_ident(pk)?));
    }

    Ok(Statement::new(format!(
        "CREATE TABLE {} ({})",
        quote_ident(&table.name)?,
        defs.join(", ")
    )))
}

/// Builds `INSERT INTO t (k1, ...) VALUES (?, ...)` from ordered pairs.
///
/// Taking an ordered slice (rather than a map) makes it impossible for the
/// column list and the bound values to iterate in different orders: the N-th
/// placeholder always binds the N-th pair's value.
pub fn insert(table: &str, pairs: &[(&str, &str)]) -> Result<Statement> {
    if pairs.is_empty() {
        return Err(DbError::Schema(format!(
            "insert into `{table}` with no values"
        )));
    }

    let mut columns = Vec::with_capacity(pairs.len());
    let mut params = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        columns.push(quote_ident(key)?);
        params.push((*value).to_string());
    }
    let placeholders = vec!["?"; pairs.len()].join(", ");

    Ok(Statement::with_params(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table)?,
            columns.join(", "),
            placeholders
        ),
        params,
    ))
}

/// `SELECT * FROM t`.
pub fn select_all(table: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "SELECT * FROM {}",
        quote_ident(table)?
    )))
}

/// `SELECT * FROM t WHERE key = ?`.
pub fn select_where(table: &str, key: &str, value: &str) -> Result<Statement> {
    Ok(Statement::with_params(
        format!(
            "SELECT * FROM {} WHERE {} = ?",
            quote_ident(table)?,
            quote_ident(key)?
        ),
        vec![value.to_string()],
    ))
}

/// Point lookup of one column: `SELECT col FROM t WHERE key = ?`.
pub fn select_column_where(table: &str, key: &str, value: &str, column: &str) -> Result<Statement> {
    Ok(Statement::with_params(
        format!(
            "SELECT {} FROM {} WHERE {} = ?",
            quote_ident(column)?,
            quote_ident(table)?,
            quote_ident(key)?
        ),
        vec![value.to_string()],
    ))
}

/// `SELECT 1 FROM t WHERE key = ? LIMIT 1`, for existence checks.
pub fn row_exists(table: &str, key: &str, value: &str) -> Result<Statement> {
    Ok(Statement::with_params(
        format!(
            "SELECT 1 FROM {} WHERE {} = ? LIMIT 1",
            quote_ident(table)?,
            quote_ident(key)?
        ),
        vec![value.to_string()],
    ))
}

/// `SELECT COUNT(*) FROM t`.
pub fn count_rows(table: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "SELECT COUNT(*) FROM {}",
        quote_ident(table)?
    )))
}

/// `UPDATE t SET col = ? WHERE key = ?`.
pub fn update(
    table: &str,
    key: &str,
    value: &str,
    column: &str,
    new_value: &str,
) -> Result<Statement> {
    Ok(Statement::with_params(
        format!(
            "UPDATE {} SET {} = ? WHERE {} = ?",
            quote_ident(table)?,
            quote_ident(column)?,
            quote_ident(key)?
        ),
        vec![new_value.to_string(), value.to_string()],
    ))
}

/// `DELETE FROM t WHERE key = ?`.
pub fn delete(table: &str, key: &str, value: &str) -> Result<Statement> {
    Ok(Statement::with_params(
        format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_ident(table)?,
            quote_ident(key)?
        ),
        vec![value.to_string()],
    ))
}

/// `ALTER TABLE t ADD col type [NOT NULL] [DEFAULT ...]`.
pub fn add_column(table: &str, column: &Column) -> Result<Statement> {
    let mut sql = format!(
        "ALTER TABLE {} ADD {} {}",
        quote_ident(table)?,
        quote_ident(&column.name)?,
        column.column_type.sql()
    );
    if !column.allow_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default_value {
        sql.push_str(" DEFAULT ");
        sql.push_str(&quote_literal(default));
    }
    Ok(Statement::new(sql))
}

/// `ALTER TABLE t DROP COLUMN col`.
pub fn remove_column(table: &str, column: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table)?,
        quote_ident(column)?
    )))
}

/// `ALTER TABLE t RENAME COLUMN old TO new`.
pub fn rename_column(table: &str, old_name: &str, new_name: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        quote_ident(table)?,
        quote_ident(old_name)?,
        quote_ident(new_name)?
    )))
}

/// `ALTER TABLE t ALTER col SET DEFAULT 'value'`.
///
/// The default rides as an escaped literal: DDL statements accept no
/// placeholders on either supported store.
pub fn set_default_value(table: &str, column: &str, value: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "ALTER TABLE {} ALTER {} SET DEFAULT {}",
        quote_ident(table)?,
        quote_ident(column)?,
        quote_literal(value)
    )))
}

/// `ALTER TABLE t DROP PRIMARY KEY, ADD PRIMARY KEY (col)`.
pub fn replace_primary_key(table: &str, primary_key: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "ALTER TABLE {} DROP PRIMARY KEY, ADD PRIMARY KEY ({})",
        quote_ident(table)?,
        quote_ident(primary_key)?
    )))
}

/// `DROP TABLE t`.
pub fn drop_table(table: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "DROP TABLE {}",
        quote_ident(table)?
    )))
}

/// `DROP TABLE IF EXISTS t`.
pub fn drop_table_if_exists(table: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "DROP TABLE IF EXISTS {}",
        quote_ident(table)?
    )))
}

/// `INSERT INTO t SELECT * FROM source`.
pub fn copy_contents(table: &str, copy_from: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "INSERT INTO {} SELECT * FROM {}",
        quote_ident(table)?,
        quote_ident(copy_from)?
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn users_table() -> Table {
        Table::new("users")
            .add_column(Column::new("id", ColumnType::Int).not_null())
            .add_column(Column::new("name", ColumnType::Varchar(None)))
            .primary_key("id")
    }

    #[test]
    fn test_create_table_text() {
        let stmt = create_table(&users_table()).unwrap();
        assert_eq!(
            stmt.sql,
            "CREATE TABLE `users` (`id` INT NOT NULL, `name` VARCHAR(255), PRIMARY KEY (`id`))"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_create_table_without_primary_key_has_no_trailing_comma() {
        let table = Table::new("logs").add_column(Column::new("line", ColumnType::Text));
        let stmt = create_table(&table).unwrap();
        assert_eq!(stmt.sql, "CREATE TABLE `logs` (`line` TEXT)");
        assert!(!stmt.sql.contains(",)"));
        assert!(!stmt.sql.contains(", )"));
    }

    #[test]
    fn test_create_table_inlines_escaped_default() {
        let table = Table::new("items")
            .add_column(Column::new("label", ColumnType::Varchar(None)).default_value("it's"));
        let stmt = create_table(&table).unwrap();
        assert_eq!(
            stmt.sql,
            "CREATE TABLE `items` (`label` VARCHAR(255) DEFAULT 'it''s')"
        );
    }

    #[test]
    fn test_create_table_rejects_empty_column_list() {
        let result = create_table(&Table::new("empty"));
        match result {
            Err(DbError::Schema(msg)) => assert!(msg.contains("no columns")),
            other => panic!("expected Schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_create_table_rejects_duplicate_columns() {
        let table = Table::new("dup")
            .add_column(Column::new("a", ColumnType::Int))
            .add_column(Column::new("a", ColumnType::Text));
        assert!(matches!(create_table(&table), Err(DbError::Schema(_))));
    }

    #[test]
    fn test_insert_positional_alignment() {
        let stmt = insert("users", &[("id", "1"), ("name", "Alice"), ("age", "30")]).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO `users` (`id`, `name`, `age`) VALUES (?, ?, ?)"
        );
        assert_eq!(stmt.params, vec!["1", "Alice", "30"]);
    }

    #[test]
    fn test_insert_rejects_empty_pairs() {
        assert!(matches!(insert("users", &[]), Err(DbError::Schema(_))));
    }

    #[test]
    fn test_predicates_bind_values() {
        let stmt = delete("users", "id", "1; DROP TABLE users").unwrap();
        assert_eq!(stmt.sql, "DELETE FROM `users` WHERE `id` = ?");
        assert_eq!(stmt.params, vec!["1; DROP TABLE users"]);

        let stmt = update("users", "id", "1", "name", "Bob").unwrap();
        assert_eq!(stmt.sql, "UPDATE `users` SET `name` = ? WHERE `id` = ?");
        assert_eq!(stmt.params, vec!["Bob", "1"]);

        let stmt = select_column_where("users", "id", "1", "name").unwrap();
        assert_eq!(stmt.sql, "SELECT `name` FROM `users` WHERE `id` = ?");
        assert_eq!(stmt.params, vec!["1"]);
    }

    #[test]
    fn test_identifier_allow_list() {
        assert!(quote_ident("user_2").is_ok());
        for bad in ["", "na`me", "a b", "x;y", "it's", "names\\"] {
            assert!(
                matches!(quote_ident(bad), Err(DbError::Schema(_))),
                "identifier {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_ddl_statements() {
        let col = Column::new("age", ColumnType::Int).not_null().default_value("0");
        assert_eq!(
            add_column("users", &col).unwrap().sql,
            "ALTER TABLE `users` ADD `age` INT NOT NULL DEFAULT '0'"
        );
        assert_eq!(
            remove_column("users", "age").unwrap().sql,
            "ALTER TABLE `users` DROP COLUMN `age`"
        );
        assert_eq!(
            rename_column("users", "name", "full_name").unwrap().sql,
            "ALTER TABLE `users` RENAME COLUMN `name` TO `full_name`"
        );
        assert_eq!(
            set_default_value("users", "name", "n/a").unwrap().sql,
            "ALTER TABLE `users` ALTER `name` SET DEFAULT 'n/a'"
        );
        assert_eq!(
            replace_primary_key("users", "email").unwrap().sql,
            "ALTER TABLE `users` DROP PRIMARY KEY, ADD PRIMARY KEY (`email`)"
        );
        assert_eq!(
            drop_table_if_exists("users").unwrap().sql,
            "DROP TABLE IF EXISTS `users`"
        );
        assert_eq!(
            copy_contents("archive", "users").unwrap().sql,
            "INSERT INTO `archive` SELECT * FROM `users`"
        );
    }
}
