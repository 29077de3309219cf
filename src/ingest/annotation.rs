use std::io::Read;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{Metabolite, PeakMetaboliteLink, SourceKind, normalize_metabolite_name};
use crate::error::OmicsError;
use crate::ingest::{
    LoadReport, SkipReason, SourceSummary, data_records, delimited_reader, record_line,
    trimmed_fields,
};
use crate::store::RecordSink;

pub const ANNOTATION_FIELDS: usize = 6;

const DELIMITER: u8 = b',';

/// What to do with an annotation line that does not have exactly
/// [`ANNOTATION_FIELDS`] fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationArityPolicy {
    /// Report the line and keep going, like the subject loader does.
    #[default]
    Skip,
    /// Fail the whole load; nothing from the run is committed.
    Abort,
}

/// Loads the metabolite annotation table, expanding `|`-joined names and
/// identifiers into one metabolite (and one peak link) per position.
///
/// Metabolites are keyed by `(peak_id, name)` and the first row for a key
/// wins. Links are appended for every position with a peak id and a name,
/// repeats included.
pub fn load_annotations<S: RecordSink + ?Sized, R: Read>(
    sink: &mut S,
    reader: R,
    policy: AnnotationArityPolicy,
    report: &mut LoadReport,
) -> Result<SourceSummary, OmicsError> {
    let mut summary = SourceSummary::new(SourceKind::Annotations);
    let mut reader = delimited_reader(reader, DELIMITER);

    for record in data_records(&mut reader, SourceKind::Annotations) {
        let (line_number, record) = record?;
        let fields = trimmed_fields(&record, DELIMITER);
        if fields.is_empty() {
            continue;
        }
        summary.data_lines += 1;

        let &[peak_id, names, kegg_ids, hmdb_ids, chemical_class, pathway] = fields.as_slice()
        else {
            let line = record_line(&fields, DELIMITER);
            match policy {
                AnnotationArityPolicy::Skip => {
                    let reason = SkipReason::FieldCount {
                        expected: ANNOTATION_FIELDS,
                        found: fields.len(),
                    };
                    report.skip(&mut summary, line_number, &line, reason);
                    continue;
                }
                AnnotationArityPolicy::Abort => {
                    return Err(OmicsError::MalformedAnnotation {
                        line_number,
                        found: fields.len(),
                        line,
                    });
                }
            }
        };

        let peak_id = peak_id.trim();
        let names = split_multi(names);
        let kegg_ids = split_multi(kegg_ids);
        let hmdb_ids = split_multi(hmdb_ids);

        for (index, raw_name) in names.iter().enumerate() {
            let name = raw_name
                .map(normalize_metabolite_name)
                .filter(|name| !name.is_empty());
            let metabolite = Metabolite {
                peak_id: peak_id.to_string(),
                name: name.clone(),
                kegg_id: position(&kegg_ids, index),
                hmdb_id: position(&hmdb_ids, index),
                chemical_class: chemical_class.to_string(),
                pathway: pathway.to_string(),
            };
            if sink.insert_metabolite_if_absent(&metabolite)? {
                summary.rows.metabolites += 1;
            } else {
                summary.rows.duplicate_metabolites += 1;
            }

            if let Some(name) = name.filter(|_| !peak_id.is_empty()) {
                sink.insert_link(&PeakMetaboliteLink {
                    peak_id: peak_id.to_string(),
                    metabolite_name: name,
                })?;
                summary.rows.links += 1;
            }
        }
    }

    Ok(summary)
}

/// Splits a `|`-joined field. An empty field still yields one (absent)
/// position so every annotation line produces at least one metabolite.
fn split_multi(field: &str) -> Vec<Option<&str>> {
    if field.is_empty() {
        return vec![None];
    }
    field
        .split('|')
        .map(|value| (!value.is_empty()).then_some(value))
        .collect()
}

fn position(values: &[Option<&str>], index: usize) -> Option<String> {
    values.get(index).copied().flatten().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;

    use super::*;
    use crate::ingest::testing::MemorySink;

    const HEADER: &str = "PeakID,Metabolite,KEGG,HMDB,ChemicalClass,Pathway\n";

    fn run(
        body: &str,
        policy: AnnotationArityPolicy,
    ) -> Result<(MemorySink, LoadReport), OmicsError> {
        let mut sink = MemorySink::default();
        let mut report = LoadReport::new();
        let input = format!("{HEADER}{body}");
        load_annotations(&mut sink, Cursor::new(input), policy, &mut report)?;
        Ok((sink, report))
    }

    fn metabolite(peak: &str, name: &str, kegg: Option<&str>, hmdb: Option<&str>) -> Metabolite {
        Metabolite {
            peak_id: peak.to_string(),
            name: Some(name.to_string()),
            kegg_id: kegg.map(str::to_string),
            hmdb_id: hmdb.map(str::to_string),
            chemical_class: "Sugars".to_string(),
            pathway: "Glycolysis".to_string(),
        }
    }

    #[test]
    fn fans_out_parallel_lists() {
        let (sink, report) = run(
            "PK1,Glucose(2)|Fructose,K1|K2,H1|,Sugars,Glycolysis\n",
            AnnotationArityPolicy::Skip,
        )
        .unwrap();

        assert_eq!(
            sink.metabolites,
            vec![
                metabolite("PK1", "Glucose", Some("K1"), Some("H1")),
                metabolite("PK1", "Fructose", Some("K2"), None),
            ]
        );
        let links: Vec<_> = sink
            .links
            .iter()
            .map(|link| (link.peak_id.as_str(), link.metabolite_name.as_str()))
            .collect();
        assert_eq!(links, vec![("PK1", "Glucose"), ("PK1", "Fructose")]);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn short_identifier_lists_map_to_absent() {
        let (sink, _) =
            run("PK1,A|B|C,K1,,Sugars,Glycolysis\n", AnnotationArityPolicy::Skip).unwrap();
        assert_eq!(sink.metabolites.len(), 3);
        assert_eq!(sink.metabolites[0].kegg_id.as_deref(), Some("K1"));
        assert_eq!(sink.metabolites[1].kegg_id, None);
        assert_eq!(sink.metabolites[2].kegg_id, None);
        assert!(sink.metabolites.iter().all(|m| m.hmdb_id.is_none()));
    }

    #[test]
    fn first_metabolite_for_a_key_wins_but_links_repeat() {
        let (sink, report) = run(
            "PK1,Glucose,K1,H1,Sugars,Glycolysis\nPK1,Glucose (3),K9,H9,Other,Other\n",
            AnnotationArityPolicy::Skip,
        )
        .unwrap();

        assert_eq!(
            sink.metabolites,
            vec![metabolite("PK1", "Glucose", Some("K1"), Some("H1"))]
        );
        assert_eq!(sink.links.len(), 2);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn empty_name_field_gives_one_unnamed_metabolite_and_no_link() {
        let (sink, _) = run("PK2,,,,Lipids,\n", AnnotationArityPolicy::Skip).unwrap();
        assert_eq!(sink.metabolites.len(), 1);
        assert_eq!(sink.metabolites[0].name, None);
        assert_eq!(sink.metabolites[0].pathway, "");
        assert!(sink.links.is_empty());
    }

    #[test]
    fn malformed_line_is_skipped_by_default() {
        let (sink, report) = run(
            "PK1,Glucose,K1\nPK2,Lactate,K2,H2,Acids,TCA\n",
            AnnotationArityPolicy::Skip,
        )
        .unwrap();
        assert_eq!(sink.metabolites.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_matches!(
            report.skipped[0].reason,
            SkipReason::FieldCount {
                expected: 6,
                found: 3
            }
        );
    }

    #[test]
    fn malformed_line_aborts_under_abort_policy() {
        let err = run(
            "PK1,Glucose,K1,H1,Sugars,Glycolysis,extra\n",
            AnnotationArityPolicy::Abort,
        )
        .unwrap_err();
        assert_matches!(
            err,
            OmicsError::MalformedAnnotation {
                line_number: 2,
                found: 7,
                ..
            }
        );
    }

    #[test]
    fn skipped_lines_keep_their_file_line_numbers() {
        let (_, report) = run(
            "PK1,Glucose,K1,H1,Sugars,Glycolysis\r\nPK2,broken\r\n",
            AnnotationArityPolicy::Skip,
        )
        .unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line_number, 3);
        assert_eq!(report.skipped[0].line, "PK2,broken");
    }
}
