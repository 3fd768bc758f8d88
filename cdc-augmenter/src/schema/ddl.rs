//! Classification of replicated statements.
//!
//! Only the statement head is inspected: enough to tell transaction boundaries from
//! DDL and to find which tables a DDL statement touches.

use std::fmt;
use std::sync::LazyLock;

use cdc_mysql::types::TableName;
use regex::Regex;

static LEADING_COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*(?:/\*.*?\*/\s*)*").expect("valid regex"));

static TABLE_DDL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(create|alter|drop|rename|truncate)\s+(?:ignore\s+|online\s+)?table\s+(.*)$")
        .expect("valid regex")
});

static BARE_TRUNCATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^truncate\s+(.*)$").expect("valid regex"));

static TEMPORARY_TABLE_DDL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:create|drop)\s+temporary\s+table\b").expect("valid regex")
});

static VIEW_DDL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:create|alter|drop)\s+(?:or\s+replace\s+)?(?:(?:algorithm|definer|sql\s+security)\s*=?\s*\S+\s+)*view\b",
    )
    .expect("valid regex")
});

static DEFINER_DDL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:create|alter|drop)\s+(?:definer\s*=\s*\S+\s+)?(?:procedure|function|trigger|event)\b")
        .expect("valid regex")
});

static ANALYZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^analyze\s+(?:no_write_to_binlog\s+|local\s+)?table\b")
        .expect("valid regex")
});

static ALTER_RENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\brename\s+(?:to|as)?\s*(`(?:[^`]|``)+`(?:\.`(?:[^`]|``)+`)?|[\w$]+(?:\.[\w$]+)?)")
        .expect("valid regex")
});

/// Operation of a table DDL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlOperation {
    Create,
    Alter,
    Drop,
    Rename,
    Truncate,
}

impl fmt::Display for DdlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operation = match self {
            DdlOperation::Create => "CREATE",
            DdlOperation::Alter => "ALTER",
            DdlOperation::Drop => "DROP",
            DdlOperation::Rename => "RENAME",
            DdlOperation::Truncate => "TRUNCATE",
        };
        f.write_str(operation)
    }
}

/// Kind of a replicated statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    Begin,
    Commit,
    Rollback,
    /// DDL on regular tables, with every table whose definition it changes.
    Table {
        operation: DdlOperation,
        tables: Vec<TableName>,
    },
    TemporaryTable,
    View,
    /// Stored programs: procedures, functions, triggers and events.
    Definer,
    Analyze,
    /// Marker statements injected for position tracking, carry no schema change.
    PseudoGtid,
    Other,
}

impl QueryKind {
    /// Classifies `sql` executed with `database` as the default database.
    pub fn classify(database: &str, sql: &str) -> QueryKind {
        let statement = LEADING_COMMENTS.replace(sql, "");
        let statement = statement.trim();
        let head = statement
            .split(|c: char| c.is_whitespace() || c == ';')
            .next()
            .unwrap_or_default()
            .to_lowercase();

        match head.as_str() {
            "begin" => return QueryKind::Begin,
            "commit" => return QueryKind::Commit,
            "rollback" => return QueryKind::Rollback,
            _ => {}
        }

        if statement.to_lowercase().contains("_pseudo_gtid_") {
            return QueryKind::PseudoGtid;
        }
        if TEMPORARY_TABLE_DDL.is_match(statement) {
            return QueryKind::TemporaryTable;
        }
        if let Some(captures) = TABLE_DDL.captures(statement) {
            let operation = match captures[1].to_lowercase().as_str() {
                "create" => DdlOperation::Create,
                "alter" => DdlOperation::Alter,
                "drop" => DdlOperation::Drop,
                "rename" => DdlOperation::Rename,
                _ => DdlOperation::Truncate,
            };
            let tables = table_names(operation, &captures[2], database);

            return QueryKind::Table { operation, tables };
        }
        if let Some(captures) = BARE_TRUNCATE.captures(statement) {
            return QueryKind::Table {
                operation: DdlOperation::Truncate,
                tables: table_names(DdlOperation::Truncate, &captures[1], database),
            };
        }
        if VIEW_DDL.is_match(statement) {
            return QueryKind::View;
        }
        if DEFINER_DDL.is_match(statement) {
            return QueryKind::Definer;
        }
        if ANALYZE.is_match(statement) {
            return QueryKind::Analyze;
        }

        QueryKind::Other
    }

    /// Whether the statement has to be applied to the active schema.
    pub fn is_schema_change(&self) -> bool {
        matches!(
            self,
            QueryKind::Table { .. }
                | QueryKind::TemporaryTable
                | QueryKind::View
                | QueryKind::Definer
        )
    }

    /// Tables whose schema the statement changes. Empty for views and stored programs.
    pub fn affected_tables(&self) -> &[TableName] {
        match self {
            QueryKind::Table { tables, .. } => tables,
            _ => &[],
        }
    }
}

/// Extracts the tables affected by the remainder of a table DDL statement.
fn table_names(operation: DdlOperation, rest: &str, database: &str) -> Vec<TableName> {
    let mut rest = skip_if_exists(rest);
    let mut tables = Vec::new();

    match operation {
        DdlOperation::Drop | DdlOperation::Rename => loop {
            let Some((table, remaining)) = parse_table_name(rest, database) else {
                break;
            };
            tables.push(table);
            rest = remaining.trim_start();

            if operation == DdlOperation::Rename {
                if let Some(to_target) = strip_keyword(rest, "to") {
                    if let Some((target, remaining)) = parse_table_name(to_target, database) {
                        tables.push(target);
                        rest = remaining.trim_start();
                    }
                }
            }

            match rest.strip_prefix(',') {
                Some(next) => rest = next,
                None => break,
            }
        },
        DdlOperation::Create | DdlOperation::Alter | DdlOperation::Truncate => {
            if let Some((table, remaining)) = parse_table_name(rest, database) {
                tables.push(table);

                if operation == DdlOperation::Alter {
                    if let Some(captures) = ALTER_RENAME.captures(remaining) {
                        if let Some((target, _)) = parse_table_name(&captures[1], database) {
                            tables.push(target);
                        }
                    }
                }
            }
        }
    }

    tables
}

fn skip_if_exists(input: &str) -> &str {
    let input = input.trim_start();
    let Some(after_if) = strip_keyword(input, "if") else {
        return input;
    };
    let after_not = strip_keyword(after_if, "not").unwrap_or(after_if);

    strip_keyword(after_not, "exists").unwrap_or(input)
}

/// Strips a case-insensitive keyword followed by whitespace or the end of input.
fn strip_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let input = input.trim_start();
    let head = input.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }

    let rest = &input[keyword.len()..];
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || c == '`' => Some(rest.trim_start()),
        Some(_) => None,
    }
}

/// Parses `name`, `` `name` ``, `db.name` or `` `db`.`name` `` at the head of `input`.
fn parse_table_name<'a>(input: &'a str, database: &str) -> Option<(TableName, &'a str)> {
    let (first, rest) = parse_identifier(input.trim_start())?;
    if let Some(after_dot) = rest.strip_prefix('.') {
        let (second, rest) = parse_identifier(after_dot)?;
        return Some((TableName::new(first, second), rest));
    }

    Some((TableName::new(database, first), rest))
}

fn parse_identifier(input: &str) -> Option<(String, &str)> {
    if let Some(quoted) = input.strip_prefix('`') {
        let mut identifier = String::new();
        let mut chars = quoted.char_indices().peekable();
        while let Some((index, c)) = chars.next() {
            if c == '`' {
                if matches!(chars.peek(), Some((_, '`'))) {
                    chars.next();
                    identifier.push('`');
                } else {
                    return Some((identifier, &quoted[index + 1..]));
                }
            } else {
                identifier.push(c);
            }
        }
        return None;
    }

    let end = input
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }

    Some((input[..end].to_string(), &input[end..]))
}

/// Rewrites references to the replicated database into the active schema database.
///
/// Covers qualified names (`db.t`, `` `db`.`t` ``) and the `DATABASE`/`SCHEMA` targets of
/// database-level statements. Unqualified names resolve against the connection's
/// default database and are left alone.
pub fn rewrite_schema_name(statement: &str, from: &str, to: &str) -> String {
    if from.is_empty() || from == to {
        return statement.to_string();
    }

    let escaped = regex::escape(from);
    let pattern = format!(r"(?i)(`{escaped}`|\b{escaped}\b)(\s*\.)");
    let Ok(qualified) = Regex::new(&pattern) else {
        return statement.to_string();
    };

    qualified
        .replace_all(statement, |captures: &regex::Captures<'_>| {
            let quoted = captures[1].starts_with('`');
            let replacement = if quoted {
                format!("`{}`", to.replace('`', "``"))
            } else {
                to.to_string()
            };
            format!("{replacement}{}", &captures[2])
        })
        .into_owned()
}
