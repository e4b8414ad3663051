//! SQL spelling differences between supported sinks

use crate::record::ColumnKind;
use eyre::{Result, bail};

/// Largest number of bound parameters put in one statement
pub const MAX_BIND_PARAMS: usize = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Pick the dialect from a connection string's scheme
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default().to_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => bail!(
                "Unsupported connection string scheme '{}' (expected postgres or sqlite)",
                scheme
            ),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// `schema.table`, or just `table` where schemas don't apply
    pub fn qualify(self, schema: &str, table: &str) -> String {
        match self {
            Dialect::Postgres if !schema.is_empty() => {
                format!("{}.{}", quote(schema), quote(table))
            }
            _ => quote(table),
        }
    }

    pub fn column_type(self, kind: ColumnKind) -> &'static str {
        match kind {
            ColumnKind::Integer => "BIGINT",
            ColumnKind::Float => "DOUBLE PRECISION",
            ColumnKind::Text | ColumnKind::Category => "TEXT",
            ColumnKind::Timestamp => "TIMESTAMP",
        }
    }

    /// Placeholder for the `n`th (1-based) bound parameter of a column of `kind`.
    ///
    /// Timestamps are bound as text; Postgres casts them back.
    pub fn placeholder(self, n: usize, kind: ColumnKind) -> String {
        match (self, kind) {
            (Dialect::Postgres, ColumnKind::Timestamp) => format!("CAST(${} AS TIMESTAMP)", n),
            (Dialect::Postgres, _) => format!("${}", n),
            (Dialect::Sqlite, _) => "?".to_string(),
        }
    }

    pub fn truncate(self, qualified: &str) -> String {
        match self {
            Dialect::Postgres => format!("TRUNCATE TABLE {}", qualified),
            Dialect::Sqlite => format!("DELETE FROM {}", qualified),
        }
    }

    /// Query counting tables named by the bound (schema, table) or (table) parameters
    pub fn table_exists_query(self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = $2"
            }
            Dialect::Sqlite => "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        }
    }

    /// Rows per multi-row INSERT so that no statement exceeds [`MAX_BIND_PARAMS`]
    pub fn rows_per_statement(self, batch_size: usize, columns: usize) -> usize {
        let ceiling = MAX_BIND_PARAMS / columns.max(1);
        batch_size.clamp(1, ceiling.max(1))
    }
}

/// Double-quote an identifier
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
