use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

use crate::app::{
    CreateResult, LoadResult, ProgressEvent, ProgressSink, ProgressSinkKind, TablesResult,
};
use crate::query::QueryResult;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_create(result: &CreateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_load(result: &LoadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_query(result: &QueryResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_tables(result: &TablesResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable rendering for interactive use. Progress goes to stderr,
/// results to stdout.
pub struct TextOutput {
    kind: ProgressSinkKind,
}

impl TextOutput {
    pub fn new(kind: ProgressSinkKind) -> Self {
        Self { kind }
    }

    pub fn print_create(&self, result: &CreateResult) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "Schema ready in {}", result.database)?;
        for table in &result.tables {
            writeln!(out, "  {table}")?;
        }
        Ok(())
    }

    pub fn print_load(&self, result: &LoadResult) -> io::Result<()> {
        let mut out = io::stdout().lock();
        for skipped in &result.report.skipped {
            writeln!(
                out,
                "Skipping {} line {} ({}): {}",
                skipped.source, skipped.line_number, skipped.reason, skipped.line
            )?;
        }
        writeln!(out, "Loaded {}", result.database)?;
        for summary in &result.report.sources {
            let rows = &summary.rows;
            writeln!(
                out,
                "  {:<16} lines={:<8} skipped={:<6} subjects={} samples={} facts={}",
                summary.source.to_string(),
                summary.data_lines,
                summary.skipped,
                rows.subjects,
                rows.samples,
                rows.facts,
            )?;
            if rows.metabolites + rows.duplicate_metabolites + rows.links > 0 {
                writeln!(
                    out,
                    "  {:<16} metabolites={} (duplicates {}) links={}",
                    "",
                    rows.metabolites,
                    rows.duplicate_metabolites,
                    rows.links,
                )?;
            }
        }
        Ok(())
    }

    pub fn print_query(&self, result: &QueryResult) -> io::Result<()> {
        let mut out = io::stdout().lock();
        if result.is_empty() {
            writeln!(out, "No rows for: {}", result.title)?;
            return Ok(());
        }
        writeln!(out, "{}:", result.title)?;
        writeln!(out, "{}", result.columns.join("\t"))?;
        for row in &result.rows {
            let cells: Vec<String> = row.iter().map(render_cell).collect();
            writeln!(out, "{}", cells.join("\t"))?;
        }
        Ok(())
    }

    pub fn print_tables(&self, result: &TablesResult) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "Tables in {}:", result.database)?;
        for table in &result.tables {
            match table.rows {
                Some(rows) => writeln!(out, "  {:<20} {rows}", table.name)?,
                None => writeln!(out, "  {}", table.name)?,
            }
        }
        Ok(())
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        let prefix = match self.kind {
            ProgressSinkKind::Create => "create",
            ProgressSinkKind::Load => "load",
            ProgressSinkKind::Query => "query",
            ProgressSinkKind::Tables => "tables",
        };
        match event.elapsed {
            Some(elapsed) => eprintln!("[{prefix}] {} ({} ms)", event.message, elapsed.as_millis()),
            None => eprintln!("[{prefix}] {}", event.message),
        }
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "NA".to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
