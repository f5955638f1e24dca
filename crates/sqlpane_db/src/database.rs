//! Database façade: one provider, decoded table caches, a free-form query.
//!
//! Caches are rebuilt wholesale by [`Database::load_content`] and
//! [`Database::refresh_table`]; writes through the provider never patch them.

use std::sync::Arc;

use tracing::{info, warn};

use crate::assets::AssetResolver;
use crate::backend::ConnectionConfig;
use crate::codec::{decode_untyped, sniff_text_type, DecodeWarning};
use crate::error::{DbError, Result};
use crate::provider::{open_provider, DatabaseProvider};
use crate::statement::{self, StatementKind};
use crate::types::{DeclaredType, Engine, Row, TableSchema};

/// Rows sampled per column by [`Database::adopt_legacy_vector_columns`].
const SNIFF_SAMPLE_ROWS: usize = 50;

/// Decoded contents of one table.
#[derive(Debug, Clone)]
pub struct TableCache {
    pub name: String,
    pub schema: TableSchema,
    pub rows: Vec<Row>,
    /// Cells that decoded to a fallback value
    pub warnings: Vec<DecodeWarning>,
}

/// Result of [`Database::execute_query`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Rows { columns: Vec<String>, rows: Vec<Row> },
    Affected(u64),
}

pub struct Database {
    provider: Box<dyn DatabaseProvider>,
    tables: Vec<TableCache>,
    query: String,
    read_only: bool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("engine", &self.provider.engine())
            .field("tables", &self.tables.len())
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl Database {
    /// Open a provider for `config`. Nothing is loaded until
    /// [`load_content`](Self::load_content).
    pub fn open(config: ConnectionConfig, resolver: Arc<dyn AssetResolver>) -> Result<Self> {
        Ok(Self::new(open_provider(config, resolver)?))
    }

    pub fn new(provider: Box<dyn DatabaseProvider>) -> Self {
        Self {
            provider,
            tables: Vec::new(),
            query: String::new(),
            read_only: false,
        }
    }

    pub fn engine(&self) -> Engine {
        self.provider.engine()
    }

    /// Provider for reads.
    pub fn provider(&self) -> &dyn DatabaseProvider {
        self.provider.as_ref()
    }

    /// Provider for writes; `ReadOnly` in read-only mode.
    pub fn writer(&self) -> Result<&dyn DatabaseProvider> {
        if self.read_only {
            return Err(DbError::ReadOnly(
                "schema and row changes are disabled".to_string(),
            ));
        }
        Ok(self.provider.as_ref())
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Reload every table.
    pub fn load_content(&mut self) -> Result<()> {
        let names = self.provider.list_tables()?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            tables.push(self.load_table(&name)?);
        }
        let warnings: usize = tables.iter().map(|t| t.warnings.len()).sum();
        info!(
            engine = %self.provider.engine(),
            tables = tables.len(),
            warnings,
            "Loaded database content"
        );
        self.tables = tables;
        Ok(())
    }

    /// Reload one table; a table that no longer exists leaves the cache.
    pub fn refresh_table(&mut self, name: &str) -> Result<&TableCache> {
        let engine = self.provider.engine();
        let existing = self
            .tables
            .iter()
            .position(|t| engine.names_match(&t.name, name));

        let loaded = match self.load_table(name) {
            Ok(loaded) => loaded,
            Err(err) => {
                if let (Some(index), DbError::TableNotFound(_)) = (existing, &err) {
                    self.tables.remove(index);
                }
                return Err(err);
            }
        };

        let index = match existing {
            Some(index) => {
                self.tables[index] = loaded;
                index
            }
            None => {
                self.tables.push(loaded);
                self.tables.len() - 1
            }
        };
        Ok(&self.tables[index])
    }

    pub fn tables(&self) -> &[TableCache] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableCache> {
        let engine = self.provider.engine();
        self.tables.iter().find(|t| engine.names_match(&t.name, name))
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Run the current query.
    ///
    /// Row-returning statements yield decoded rows; anything else yields the
    /// affected-row count. In read-only mode only single read statements run.
    pub fn execute_query(&mut self) -> Result<QueryOutput> {
        let sql = self.query.trim().to_string();
        if sql.is_empty() {
            return Err(DbError::invalid_input("query is empty"));
        }
        if self.read_only {
            statement::validate_read_only(&sql).map_err(|e| DbError::ReadOnly(e.to_string()))?;
        }

        match statement::classify(&sql) {
            StatementKind::Query => {
                let raw = self.provider.query_raw(&sql)?;
                let columns = raw
                    .first()
                    .map(|row| row.column_names().to_vec())
                    .unwrap_or_default();
                let rows = raw
                    .iter()
                    .map(|row| {
                        row.column_names()
                            .iter()
                            .cloned()
                            .zip(row.values().iter().map(decode_untyped))
                            .collect()
                    })
                    .collect();
                Ok(QueryOutput::Rows { columns, rows })
            }
            StatementKind::Command => Ok(QueryOutput::Affected(self.provider.execute_raw(&sql)?)),
        }
    }

    /// Record vector types for untyped TEXT columns whose sampled values all
    /// look like vectors, then reload the table.
    ///
    /// For databases written before column types were recorded. Returns the
    /// adopted columns.
    pub fn adopt_legacy_vector_columns(&mut self, table: &str) -> Result<Vec<(String, DeclaredType)>> {
        let writer = self.writer()?;
        let schema = writer.get_columns(table)?;
        let sample = writer.fetch_rows(table, Some(SNIFF_SAMPLE_ROWS))?;

        let mut adopted = Vec::new();
        for (index, column) in schema.columns.iter().enumerate() {
            if !matches!(column.declared_type, DeclaredType::Text | DeclaredType::Varchar(_)) {
                continue;
            }
            let mut guess: Option<DeclaredType> = None;
            let mut consistent = true;
            for row in &sample {
                let Some(text) = row.get_raw(index).and_then(|v| v.as_text()) else {
                    continue;
                };
                if text.trim().is_empty() {
                    continue;
                }
                match (sniff_text_type(&text), &guess) {
                    (Some(found), None) => guess = Some(found),
                    (Some(found), Some(current)) if found == *current => {}
                    _ => {
                        consistent = false;
                        break;
                    }
                }
            }
            if let (true, Some(declared)) = (consistent, guess) {
                writer.record_column_type(table, &column.name, &declared)?;
                warn!(table, column = %column.name, declared_type = %declared, "Adopted legacy vector column");
                adopted.push((column.name.clone(), declared));
            }
        }

        self.refresh_table(table)?;
        Ok(adopted)
    }

    fn load_table(&self, name: &str) -> Result<TableCache> {
        let schema = self.provider.get_columns(name)?;
        let raw_rows = self.provider.fetch_rows(name, None)?;
        let codec = self.provider.codec();

        let mut warnings = Vec::new();
        let rows = raw_rows
            .iter()
            .enumerate()
            .map(|(i, raw)| codec.decode_row(&schema, raw, i, &mut warnings))
            .collect();

        Ok(TableCache {
            name: schema.table.clone(),
            schema,
            rows,
            warnings,
        })
    }
}
