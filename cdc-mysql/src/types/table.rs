use std::fmt;

/// A fully qualified MySQL table name: database (schema) plus table.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns the name quoted with backticks, escaping embedded backticks.
    pub fn as_quoted_identifier(&self) -> String {
        format!(
            "`{}`.`{}`",
            self.schema.replace('`', "``"),
            self.name.replace('`', "``")
        )
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Logical column type, parsed from `INFORMATION_SCHEMA.COLUMNS.DATA_TYPE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Decimal,
    Float,
    Double,
    Bit,
    Year,
    Date,
    Time,
    DateTime,
    Timestamp,
    Char,
    VarChar,
    Text,
    Binary,
    VarBinary,
    Blob,
    Enum,
    Set,
    Json,
    Geometry,
    /// A type this crate has no dedicated handling for, kept verbatim.
    Unknown(String),
}

impl DataType {
    pub fn parse(data_type: &str) -> DataType {
        match data_type.trim().to_lowercase().as_str() {
            "tinyint" => DataType::TinyInt,
            "smallint" => DataType::SmallInt,
            "mediumint" => DataType::MediumInt,
            "int" | "integer" => DataType::Int,
            "bigint" => DataType::BigInt,
            "decimal" | "numeric" => DataType::Decimal,
            "float" => DataType::Float,
            "double" | "real" => DataType::Double,
            "bit" => DataType::Bit,
            "year" => DataType::Year,
            "date" => DataType::Date,
            "time" => DataType::Time,
            "datetime" => DataType::DateTime,
            "timestamp" => DataType::Timestamp,
            "char" => DataType::Char,
            "varchar" => DataType::VarChar,
            "tinytext" | "text" | "mediumtext" | "longtext" => DataType::Text,
            "binary" => DataType::Binary,
            "varbinary" => DataType::VarBinary,
            "tinyblob" | "blob" | "mediumblob" | "longblob" => DataType::Blob,
            "enum" => DataType::Enum,
            "set" => DataType::Set,
            "json" => DataType::Json,
            "geometry" | "point" | "linestring" | "polygon" | "multipoint"
            | "multilinestring" | "multipolygon" | "geometrycollection" => DataType::Geometry,
            other => DataType::Unknown(other.to_string()),
        }
    }

    /// Whether values of this type are raw bytes rather than character data.
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            DataType::Binary | DataType::VarBinary | DataType::Blob | DataType::Geometry
        )
    }

    /// Storage width in bits of integer types.
    pub fn integer_bits(&self) -> Option<u32> {
        match self {
            DataType::TinyInt => Some(8),
            DataType::SmallInt => Some(16),
            DataType::MediumInt => Some(24),
            DataType::Int => Some(32),
            DataType::BigInt => Some(64),
            _ => None,
        }
    }
}

/// Role of a column in the table's indexes, from `COLUMN_KEY`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    #[default]
    None,
    Primary,
    Unique,
    Multiple,
}

impl ColumnKey {
    pub fn parse(column_key: &str) -> ColumnKey {
        match column_key.trim().to_uppercase().as_str() {
            "PRI" => ColumnKey::Primary,
            "UNI" => ColumnKey::Unique,
            "MUL" => ColumnKey::Multiple,
            _ => ColumnKey::None,
        }
    }
}

/// Schema of a single column as reported by `INFORMATION_SCHEMA.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    /// Full type declaration, e.g. `int(10) unsigned` or `enum('a','b')`.
    pub column_type: String,
    pub nullable: bool,
    pub key: ColumnKey,
    pub extra: String,
    pub collation: Option<String>,
    pub default: Option<String>,
    pub character_maximum_length: Option<i64>,
    pub character_octet_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
    pub datetime_precision: Option<i64>,
    /// Members of an `enum` column, in declaration order.
    pub enum_values: Vec<String>,
    /// Members of a `set` column, in bit order.
    pub set_values: Vec<String>,
}

impl ColumnSchema {
    /// Creates a nullable, non-key column with no extra metadata.
    pub fn new(name: impl Into<String>, data_type: DataType, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type,
            column_type: column_type.into(),
            nullable: true,
            key: ColumnKey::None,
            extra: String::new(),
            collation: None,
            default: None,
            character_maximum_length: None,
            character_octet_length: None,
            numeric_precision: None,
            numeric_scale: None,
            datetime_precision: None,
            enum_values: Vec::new(),
            set_values: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: ColumnKey) -> Self {
        if key == ColumnKey::Primary {
            self.nullable = false;
        }
        self.key = key;
        self
    }

    pub fn is_primary(&self) -> bool {
        self.key == ColumnKey::Primary
    }

    pub fn is_unsigned(&self) -> bool {
        self.column_type.to_lowercase().contains("unsigned")
    }
}

/// Complete schema of a table at one point of the replication stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: TableName,
    pub column_schemas: Vec<ColumnSchema>,
    /// `SHOW CREATE TABLE` output, empty when the table no longer exists.
    pub create_statement: String,
}

impl TableSchema {
    pub fn new(name: TableName, column_schemas: Vec<ColumnSchema>, create_statement: String) -> Self {
        Self {
            name,
            column_schemas,
            create_statement,
        }
    }

    pub fn num_columns(&self) -> usize {
        self.column_schemas.len()
    }

    /// Primary key column names in column order.
    pub fn primary_key_columns(&self) -> Vec<String> {
        self.column_schemas
            .iter()
            .filter(|column| column.is_primary())
            .map(|column| column.name.clone())
            .collect()
    }

    pub fn has_primary_keys(&self) -> bool {
        self.column_schemas.iter().any(ColumnSchema::is_primary)
    }
}

/// Splits the quoted member list of an `enum(...)` or `set(...)` declaration.
///
/// Accepts `'a','b c','it''s'` and returns `["a", "b c", "it's"]`. Both `''` and `\'`
/// escapes are honored.
pub fn parse_member_list(list: &str) -> Vec<String> {
    let mut members = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = list.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' if in_quotes => {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    current.push('\'');
                } else {
                    in_quotes = false;
                    members.push(std::mem::take(&mut current));
                }
            }
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '\'' => in_quotes = true,
            c if in_quotes => current.push(c),
            _ => {}
        }
    }

    members
}
