use std::io::Read;

use crate::domain::{FactRow, FactTable, Measurement, SampleKey};
use crate::error::OmicsError;
use crate::ingest::{
    LoadReport, SkipReason, SourceSummary, data_records, delimited_reader, header_fields,
    record_line, trimmed_fields,
};
use crate::store::RecordSink;

const DELIMITER: u8 = b'\t';

/// Loads a tab-delimited sample x entity matrix into `table`.
///
/// The header names the entity of every column after the first. Each data
/// line yields one fact row per value, and its sample is created with the
/// first of them. Lines whose sample id does not parse are skipped before
/// anything is written.
pub fn load_wide<S: RecordSink + ?Sized, R: Read>(
    sink: &mut S,
    table: FactTable,
    reader: R,
    report: &mut LoadReport,
) -> Result<SourceSummary, OmicsError> {
    let source = table.source();
    let mut summary = SourceSummary::new(source);
    let mut reader = delimited_reader(reader, DELIMITER);
    let header = header_fields(&mut reader, source, DELIMITER)?;

    for record in data_records(&mut reader, source) {
        let (line_number, record) = record?;
        let cells = trimmed_fields(&record, DELIMITER);
        let Some((&sample_id, values)) = cells.split_first() else {
            continue;
        };
        summary.data_lines += 1;

        let Some(sample) = SampleKey::parse(sample_id) else {
            let line = record_line(&cells, DELIMITER);
            report.skip(&mut summary, line_number, &line, SkipReason::InvalidSampleId);
            continue;
        };
        if cells.len() > header.len() {
            let reason = SkipReason::ColumnCount {
                expected: header.len(),
                found: cells.len(),
            };
            report.skip(&mut summary, line_number, &record_line(&cells, DELIMITER), reason);
            continue;
        }
        if values.is_empty() {
            continue;
        }

        if sink.insert_sample_if_absent(&sample)? {
            summary.rows.samples += 1;
        }
        let visit_id = table.carries_visit().then(|| sample.visit_id().to_string());
        for (entity_id, value) in header[1..].iter().zip(values) {
            sink.insert_fact(&FactRow {
                table,
                sample_id: sample.as_str().to_string(),
                entity_id: entity_id.clone(),
                abundance: Measurement::parse(value),
                visit_id: visit_id.clone(),
            })?;
            summary.rows.facts += 1;
        }
    }

    Ok(summary)
}
