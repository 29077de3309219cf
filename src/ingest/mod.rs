//! Streaming loaders that turn the cohort's delimited files into schema rows.
//!
//! Every loader reads its source once, record by record, and writes through a
//! [`RecordSink`]. Per-line problems become [`SkippedLine`] entries in the
//! [`LoadReport`]; anything else is returned as an error and aborts the load.

pub mod annotation;
pub mod subject;
pub mod wide;

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::time::Instant;

use camino::Utf8PathBuf;
use csv::StringRecord;
use serde::Serialize;
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::SourceKind;
use crate::error::OmicsError;
use crate::store::RecordSink;

pub use annotation::{AnnotationArityPolicy, load_annotations};
pub use subject::load_subjects;
pub use wide::load_wide;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SkipReason {
    InvalidSampleId,
    ColumnCount { expected: usize, found: usize },
    FieldCount { expected: usize, found: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InvalidSampleId => write!(f, "invalid sample id"),
            SkipReason::ColumnCount { expected, found } => {
                write!(f, "expected at most {expected} columns, found {found}")
            }
            SkipReason::FieldCount { expected, found } => {
                write!(f, "expected {expected} fields, found {found}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub source: SourceKind,
    pub line_number: usize,
    pub line: String,
    pub reason: SkipReason,
}

/// Rows written by one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub subjects: usize,
    pub samples: usize,
    pub facts: usize,
    pub metabolites: usize,
    pub duplicate_metabolites: usize,
    pub links: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source: SourceKind,
    pub data_lines: usize,
    pub skipped: usize,
    pub rows: RowCounts,
}

impl SourceSummary {
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            data_lines: 0,
            skipped: 0,
            rows: RowCounts::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub sources: Vec<SourceSummary>,
    pub skipped: Vec<SkippedLine>,
}

impl LoadReport {
    pub fn new() -> Self {
        Self {
            started_at: chrono::Utc::now().to_rfc3339(),
            ..Self::default()
        }
    }

    pub(crate) fn skip(
        &mut self,
        summary: &mut SourceSummary,
        line_number: usize,
        line: &str,
        reason: SkipReason,
    ) {
        warn!(source = %summary.source, line_number, %reason, "skipping line: {line}");
        summary.skipped += 1;
        self.skipped.push(SkippedLine {
            source: summary.source,
            line_number,
            line: line.to_string(),
            reason,
        });
    }

    pub fn summary(&self, source: SourceKind) -> Option<&SourceSummary> {
        self.sources.iter().find(|summary| summary.source == source)
    }

    pub fn skipped_for(&self, source: SourceKind) -> impl Iterator<Item = &SkippedLine> {
        self.skipped.iter().filter(move |line| line.source == source)
    }
}

/// Hands out a reader for each source of a load.
pub trait SourceReader {
    fn open(&self, source: SourceKind) -> Result<Box<dyn BufRead + '_>, OmicsError>;
}

/// Sources backed by files on disk.
#[derive(Debug, Clone)]
pub struct FileSources {
    paths: Vec<(SourceKind, Utf8PathBuf)>,
}

impl FileSources {
    pub fn new(paths: Vec<(SourceKind, Utf8PathBuf)>) -> Self {
        Self { paths }
    }

    pub fn path(&self, source: SourceKind) -> Option<&Utf8PathBuf> {
        self.paths
            .iter()
            .find(|(kind, _)| *kind == source)
            .map(|(_, path)| path)
    }
}

impl SourceReader for FileSources {
    fn open(&self, source: SourceKind) -> Result<Box<dyn BufRead + '_>, OmicsError> {
        let path = self
            .path(source)
            .ok_or_else(|| OmicsError::MissingInput(source.default_file_name().into()))?;
        if !path.as_std_path().exists() {
            return Err(OmicsError::MissingInput(path.clone().into_std_path_buf()));
        }
        let file = File::open(path.as_std_path()).map_err(|err| OmicsError::Io {
            source_name: path.to_string(),
            message: err.to_string(),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub sources: Vec<SourceKind>,
    pub annotation_arity: AnnotationArityPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sources: SourceKind::LOAD_ORDER.to_vec(),
            annotation_arity: AnnotationArityPolicy::default(),
        }
    }
}

/// Runs every requested loader, in order, against one sink.
///
/// Each source is opened, streamed and dropped before the next one is
/// opened. The caller owns the commit boundary: on error nothing here has
/// been committed.
pub fn load<S: RecordSink + ?Sized>(
    sink: &mut S,
    sources: &dyn SourceReader,
    options: &LoadOptions,
    progress: &dyn ProgressSink,
) -> Result<LoadReport, OmicsError> {
    let mut report = LoadReport::new();
    for &source in &options.sources {
        progress.event(ProgressEvent {
            message: format!("phase=Load; {source}"),
            elapsed: None,
        });
        let start = Instant::now();
        let reader = sources.open(source)?;
        let summary = ingest_source(sink, source, reader, options, &mut report)?;
        info!(
            %source,
            data_lines = summary.data_lines,
            skipped = summary.skipped,
            "source loaded"
        );
        progress.event(ProgressEvent {
            message: format!(
                "phase=Load; {source} done lines={} skipped={}",
                summary.data_lines, summary.skipped
            ),
            elapsed: Some(start.elapsed()),
        });
        report.sources.push(summary);
    }
    report.finished_at = Some(chrono::Utc::now().to_rfc3339());
    Ok(report)
}

pub fn ingest_source<S: RecordSink + ?Sized, R: Read>(
    sink: &mut S,
    source: SourceKind,
    reader: R,
    options: &LoadOptions,
    report: &mut LoadReport,
) -> Result<SourceSummary, OmicsError> {
    match (source, source.fact_table()) {
        (_, Some(table)) => load_wide(sink, table, reader, report),
        (SourceKind::Subjects, None) => load_subjects(sink, reader, report),
        (_, None) => load_annotations(sink, reader, options.annotation_arity, report),
    }
}

/// Reader for one delimited source. Fields are never quoted and rows may
/// have any width; each loader checks arity itself.
pub(crate) fn delimited_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(reader)
}

/// Header fields of a source, trimmed like any other row.
pub(crate) fn header_fields<R: Read>(
    reader: &mut csv::Reader<R>,
    source: SourceKind,
    delimiter: u8,
) -> Result<Vec<String>, OmicsError> {
    let header = reader.headers().map_err(|err| read_error(source, err))?;
    Ok(trimmed_fields(header, delimiter)
        .into_iter()
        .map(str::to_string)
        .collect())
}

/// Data records of a source with their line numbers; line 1 is the header.
pub(crate) fn data_records<R: Read>(
    reader: &mut csv::Reader<R>,
    source: SourceKind,
) -> impl Iterator<Item = Result<(usize, StringRecord), OmicsError>> {
    reader.records().map(move |record| {
        record
            .map(|record| {
                let line_number = record.position().map_or(0, |pos| pos.line() as usize);
                (line_number, record)
            })
            .map_err(|err| read_error(source, err))
    })
}

/// Fields of a record with the whitespace around the whole line removed.
/// For a whitespace delimiter that drops blank leading and trailing cells;
/// a blank line yields no fields.
pub(crate) fn trimmed_fields(record: &StringRecord, delimiter: u8) -> Vec<&str> {
    let mut fields: Vec<&str> = record.iter().collect();
    if delimiter.is_ascii_whitespace() {
        while fields.last().is_some_and(|field| field.trim().is_empty()) {
            fields.pop();
        }
        let leading = fields.iter().take_while(|field| field.trim().is_empty()).count();
        fields.drain(..leading);
    }
    if let Some(first) = fields.first_mut() {
        *first = first.trim_start();
    }
    if let Some(last) = fields.last_mut() {
        *last = last.trim_end();
    }
    if fields.len() == 1 && fields[0].is_empty() {
        fields.clear();
    }
    fields
}

/// The text of a record as it appears in a skip report.
pub(crate) fn record_line(fields: &[&str], delimiter: u8) -> String {
    fields.join(&char::from(delimiter).to_string())
}

fn read_error(source: SourceKind, err: csv::Error) -> OmicsError {
    OmicsError::Io {
        source_name: source.to_string(),
        message: err.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn fields_of(line: &str, delimiter: u8) -> Vec<String> {
        let record = StringRecord::from(line.split(char::from(delimiter)).collect::<Vec<_>>());
        trimmed_fields(&record, delimiter)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn tab_rows_lose_blank_edge_cells() {
        assert_eq!(fields_of(" A-1\t1\t\t ", b'\t'), vec!["A-1", "1"]);
        assert!(fields_of("\t \t", b'\t').is_empty());
    }

    #[test]
    fn comma_rows_keep_empty_fields() {
        assert_eq!(fields_of(" a,,b, ", b','), vec!["a", "", "b", ""]);
        assert!(fields_of("   ", b',').is_empty());
    }

    #[test]
    fn records_carry_their_line_numbers() {
        let mut reader = delimited_reader("h1,h2\n\"a,b\nc,d\n".as_bytes(), b',');
        let rows: Vec<(usize, Vec<String>)> = data_records(&mut reader, SourceKind::Subjects)
            .map(|record| {
                let (line_number, record) = record.unwrap();
                (line_number, record.iter().map(str::to_string).collect())
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                (2, vec!["\"a".to_string(), "b".to_string()]),
                (3, vec!["c".to_string(), "d".to_string()]),
            ]
        );
    }
}
