//! Dialect polymorphism for SQL emission.
//!
//! Clause semantics are dialect-invariant; only the lexical surface varies
//! (identifier quoting, literal syntax, type conversion of the selected
//! key-id column). Dialects are a small capability trait selected by backend
//! configuration; the compiler and aliaser never see them.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::dataspec::entity_spec::CodeMapping;

use super::errors::SqlGenError;

pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quote an identifier. The ANSI default leaves identifiers bare.
    fn quote_identifier(&self, ident: &str) -> String {
        ident.to_string()
    }

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn date_literal(&self, ts: &NaiveDateTime) -> String {
        format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S"))
    }

    /// Wrap the selected key-id column so key ids always arrive as text,
    /// whatever type the store uses for them.
    fn wrap_key_id(&self, column_ref: &str) -> String {
        format!("CAST({} AS CHAR)", column_ref)
    }

    fn supports_case_translation(&self) -> bool {
        true
    }

    /// Emit a `CASE col WHEN code THEN id … ELSE col END` expression that
    /// normalizes database-local codes to canonical ids inside the database.
    fn render_case(
        &self,
        column_ref: &str,
        mappings: &[CodeMapping],
    ) -> Result<String, SqlGenError> {
        if !self.supports_case_translation() {
            return Err(SqlGenError::UnsupportedCapability {
                dialect: self.name(),
                capability: "case translation",
            });
        }
        let mut sql = String::from("CASE ");
        sql.push_str(column_ref);
        for mapping in mappings {
            sql.push_str(" WHEN ");
            sql.push_str(&self.string_literal(&mapping.sql_code));
            sql.push_str(" THEN ");
            sql.push_str(&self.string_literal(&mapping.proposition_id));
        }
        sql.push_str(" ELSE ");
        sql.push_str(column_ref);
        sql.push_str(" END");
        Ok(sql)
    }
}

/// Config-selectable dialect, deserialized from the catalog document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    #[default]
    Ansi,
    Mysql,
    Postgres,
    Sqlite,
}

impl DialectKind {
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            DialectKind::Ansi => &AnsiDialect,
            DialectKind::Mysql => &MySqlDialect,
            DialectKind::Postgres => &PostgresDialect,
            DialectKind::Sqlite => &SqliteDialect,
        }
    }
}

pub struct AnsiDialect;

impl SqlDialect for AnsiDialect {
    fn name(&self) -> &'static str {
        "ansi"
    }
}

pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident)
    }

    fn wrap_key_id(&self, column_ref: &str) -> String {
        format!("CONVERT({}, CHAR)", column_ref)
    }
}

pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn date_literal(&self, ts: &NaiveDateTime) -> String {
        format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S"))
    }

    fn wrap_key_id(&self, column_ref: &str) -> String {
        format!("{}::varchar", column_ref)
    }
}

pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn wrap_key_id(&self, column_ref: &str) -> String {
        format!("CAST({} AS TEXT)", column_ref)
    }
}
