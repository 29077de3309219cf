use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::error::OmicsError;
use crate::ingest::{self, LoadOptions, LoadReport, SourceReader};
use crate::query::{CannedQuery, QueryParams, QueryResult, run_query};
use crate::store::Database;

#[derive(Debug, Clone, Serialize)]
pub struct CreateResult {
    pub database: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub database: String,
    pub report: LoadReport,
    pub tables: Vec<TableEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TablesResult {
    pub database: String,
    pub tables: Vec<TableEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableEntry {
    pub name: String,
    pub rows: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub enum ProgressSinkKind {
    Create,
    Load,
    Query,
    Tables,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App {
    database: Database,
    label: String,
}

impl App {
    pub fn new(database: Database, label: impl Into<String>) -> Self {
        Self {
            database,
            label: label.into(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn create(&self, sink: &dyn ProgressSink) -> Result<CreateResult, OmicsError> {
        sink.event(ProgressEvent {
            message: format!("phase=Schema; creating tables in {}", self.label),
            elapsed: None,
        });
        self.database.create_schema()?;
        Ok(CreateResult {
            database: self.label.clone(),
            tables: self.database.tables()?,
        })
    }

    /// Loads every requested source inside one transaction and commits once
    /// at the end. Any error drops the transaction, so a failed run leaves
    /// the database as it was.
    pub fn load(
        &mut self,
        sources: &dyn SourceReader,
        options: &LoadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<LoadResult, OmicsError> {
        sink.event(ProgressEvent {
            message: "phase=Schema; ensuring tables".to_string(),
            elapsed: None,
        });
        self.database.create_schema()?;

        let start = Instant::now();
        let mut session = self.database.begin()?;
        let report = ingest::load(&mut session, sources, options, sink)?;

        sink.event(ProgressEvent {
            message: "phase=Commit; writing transaction".to_string(),
            elapsed: None,
        });
        session.commit()?;
        info!(
            database = %self.label,
            skipped = report.skipped.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "load committed"
        );

        Ok(LoadResult {
            database: self.label.clone(),
            report,
            tables: self.table_entries()?,
        })
    }

    pub fn query(
        &self,
        query: CannedQuery,
        params: &QueryParams,
        sink: &dyn ProgressSink,
    ) -> Result<QueryResult, OmicsError> {
        sink.event(ProgressEvent {
            message: format!("phase=Query; running query {}", query.number()),
            elapsed: None,
        });
        let start = Instant::now();
        let result = run_query(self.database.connection(), query, params)?;
        sink.event(ProgressEvent {
            message: format!("phase=Query; {} rows", result.rows.len()),
            elapsed: Some(start.elapsed()),
        });
        Ok(result)
    }

    pub fn tables(&self, sink: &dyn ProgressSink) -> Result<TablesResult, OmicsError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; listing tables in {}", self.label),
            elapsed: None,
        });
        Ok(TablesResult {
            database: self.label.clone(),
            tables: self.table_entries()?,
        })
    }

    fn table_entries(&self) -> Result<Vec<TableEntry>, OmicsError> {
        self.database
            .tables()?
            .into_iter()
            .map(|name| {
                let rows = self.database.row_count(&name)?;
                Ok(TableEntry { name, rows })
            })
            .collect()
    }
}
