/// Schema Model
///
/// Pure value types describing a relational schema: `Table`, `Column` and
/// `ColumnType`. These carry no behavior beyond rendering a column type to
/// its SQL text; all validation (identifier characters, duplicate columns,
/// empty tables) happens in the statement builder so the model itself stays
/// a plain description.

/// Enumerated SQL column types, optionally parameterized by length.
///
/// Variable-length text types default to 255 when no length is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Boolean,
    /// Fixed-length text; length defaults to 255 when unspecified
    Char(Option<u32>),
    /// Variable-length text; length defaults to 255 when unspecified
    Varchar(Option<u32>),
    Text,
    Blob,
    Date,
    Time,
    DateTime,
    Timestamp,
}

impl ColumnType {
    /// Renders the type as it appears in DDL, e.g. `VARCHAR(255)`.
    pub fn sql(&self) -> String {
        match self {
            ColumnType::TinyInt => "TINYINT".to_string(),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Int => "INT".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Char(len) => format!("CHAR({})", len.unwrap_or(255)),
            ColumnType::Varchar(len) => format!("VARCHAR({})", len.unwrap_or(255)),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Blob => "BLOB".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::DateTime => "DATETIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }
}

/// A named, typed attribute of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    /// Whether the column accepts NULL; columns are nullable unless told otherwise
    pub allow_null: bool,
    /// Default value rendered as a literal DEFAULT clause in DDL
    pub default_value: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Column {
            name: name.into(),
            column_type,
            allow_null: true,
            default_value: None,
        }
    }

    /// Marks the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    /// Sets the column's default value.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// A named table with ordered columns and an optional primary key.
///
/// Column order is significant: it defines the column order of the emitted
/// `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
        }
    }

    /// Appends a column, preserving declaration order.
    pub fn add_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Designates the primary-key column by name.
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }
}
