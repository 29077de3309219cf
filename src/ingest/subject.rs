use std::io::Read;

use crate::domain::{Measurement, SourceKind, Subject};
use crate::error::OmicsError;
use crate::ingest::{
    LoadReport, SkipReason, SourceSummary, data_records, delimited_reader, record_line,
    trimmed_fields,
};
use crate::store::RecordSink;

pub const SUBJECT_FIELDS: usize = 7;

const DELIMITER: u8 = b',';

/// Loads the comma-delimited subject table.
///
/// Lines without exactly [`SUBJECT_FIELDS`] fields are skipped and reported.
/// Subjects are appended as they come: a repeated subject id gives a second
/// row.
pub fn load_subjects<S: RecordSink + ?Sized, R: Read>(
    sink: &mut S,
    reader: R,
    report: &mut LoadReport,
) -> Result<SourceSummary, OmicsError> {
    let mut summary = SourceSummary::new(SourceKind::Subjects);
    let mut reader = delimited_reader(reader, DELIMITER);

    for record in data_records(&mut reader, SourceKind::Subjects) {
        let (line_number, record) = record?;
        let fields = trimmed_fields(&record, DELIMITER);
        if fields.is_empty() {
            continue;
        }
        summary.data_lines += 1;

        let &[subject_id, race, sex, age, bmi, sspg, iris] = fields.as_slice() else {
            let reason = SkipReason::FieldCount {
                expected: SUBJECT_FIELDS,
                found: fields.len(),
            };
            report.skip(&mut summary, line_number, &record_line(&fields, DELIMITER), reason);
            continue;
        };

        sink.insert_subject(&Subject {
            subject_id: subject_id.to_string(),
            race: race.to_string(),
            sex: sex.to_string(),
            age: Measurement::parse(age),
            bmi: Measurement::parse(bmi),
            sspg: Measurement::parse(sspg),
            iris: iris.to_string(),
        })?;
        summary.rows.subjects += 1;
    }

    Ok(summary)
}
