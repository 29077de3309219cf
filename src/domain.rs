use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::OmicsError;

static SAMPLE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z0-9]+)-([A-Za-z0-9_]+)$").expect("sample id pattern"));

static NAME_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\d+\)$").expect("metabolite suffix pattern"));

/// A sample identifier of the form `SUBJECT-VISIT`, decomposed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleKey {
    sample_id: String,
    subject_id: String,
    visit_id: String,
}

impl SampleKey {
    /// Returns `None` when `value` does not match the sample id pattern.
    /// The input is taken verbatim: no trimming, no case folding.
    pub fn parse(value: &str) -> Option<Self> {
        let captures = SAMPLE_ID_RE.captures(value)?;
        Some(Self {
            sample_id: value.to_string(),
            subject_id: captures[1].to_string(),
            visit_id: captures[2].to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.sample_id
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn visit_id(&self) -> &str {
        &self.visit_id
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sample_id)
    }
}

impl FromStr for SampleKey {
    type Err = OmicsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| OmicsError::InvalidSampleId(value.to_string()))
    }
}

/// Strips a trailing `(<digits>)` from a metabolite name and trims it.
///
/// Stripping repeats until the name is stable, so `normalize(normalize(x))`
/// always equals `normalize(x)` (e.g. `"x(1)(2)"` and `"Glucose (2) "`).
pub fn normalize_metabolite_name(raw: &str) -> String {
    let mut current = raw;
    loop {
        let next = match NAME_SUFFIX_RE.find(current) {
            Some(found) => current[..found.start()].trim(),
            None => current.trim(),
        };
        if next == current {
            return next.to_string();
        }
        current = next;
    }
}

/// A value read from a numeric column. Source files mix numbers, the
/// `NA` sentinel and the occasional free text; all three are kept apart
/// so consumers decide how to coerce.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Measurement {
    Numeric(f64),
    Missing,
    Raw(String),
}

impl Measurement {
    pub const MISSING_SENTINEL: &'static str = "NA";

    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == Self::MISSING_SENTINEL {
            return Measurement::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Measurement::Numeric(value),
            _ => Measurement::Raw(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Measurement::Numeric(value) => Some(*value),
            Measurement::Missing | Measurement::Raw(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Measurement::Missing)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Numeric(value) => write!(f, "{value}"),
            Measurement::Missing => write!(f, "{}", Self::MISSING_SENTINEL),
            Measurement::Raw(text) => write!(f, "{text}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactTable {
    Metabolomics,
    Proteomics,
    Transcriptomics,
}

impl FactTable {
    pub fn table_name(self) -> &'static str {
        match self {
            FactTable::Metabolomics => "Metabolomics",
            FactTable::Proteomics => "Proteomics",
            FactTable::Transcriptomics => "Transcriptomics",
        }
    }

    /// Only the proteomics table keeps a copy of the visit id.
    pub fn carries_visit(self) -> bool {
        matches!(self, FactTable::Proteomics)
    }

    pub fn source(self) -> SourceKind {
        match self {
            FactTable::Metabolomics => SourceKind::Metabolomics,
            FactTable::Proteomics => SourceKind::Proteomics,
            FactTable::Transcriptomics => SourceKind::Transcriptomics,
        }
    }
}

impl fmt::Display for FactTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Metabolomics,
    Subjects,
    Proteomics,
    Transcriptomics,
    Annotations,
}

impl SourceKind {
    /// Order in which a full load visits the sources.
    pub const LOAD_ORDER: [SourceKind; 5] = [
        SourceKind::Metabolomics,
        SourceKind::Subjects,
        SourceKind::Proteomics,
        SourceKind::Transcriptomics,
        SourceKind::Annotations,
    ];

    pub fn default_file_name(self) -> &'static str {
        match self {
            SourceKind::Metabolomics => "HMP_metabolome_abundance.tsv",
            SourceKind::Subjects => "Subject.csv",
            SourceKind::Proteomics => "HMP_proteome_abundance.tsv",
            SourceKind::Transcriptomics => "HMP_transcriptome_abundance.tsv",
            SourceKind::Annotations => "HMP_metabolome_annotation.csv",
        }
    }

    pub fn fact_table(self) -> Option<FactTable> {
        match self {
            SourceKind::Metabolomics => Some(FactTable::Metabolomics),
            SourceKind::Proteomics => Some(FactTable::Proteomics),
            SourceKind::Transcriptomics => Some(FactTable::Transcriptomics),
            SourceKind::Subjects | SourceKind::Annotations => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Metabolomics => write!(f, "metabolomics"),
            SourceKind::Subjects => write!(f, "subjects"),
            SourceKind::Proteomics => write!(f, "proteomics"),
            SourceKind::Transcriptomics => write!(f, "transcriptomics"),
            SourceKind::Annotations => write!(f, "annotations"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subject {
    pub subject_id: String,
    pub race: String,
    pub sex: String,
    pub age: Measurement,
    pub bmi: Measurement,
    pub sspg: Measurement,
    pub iris: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactRow {
    pub table: FactTable,
    pub sample_id: String,
    pub entity_id: String,
    pub abundance: Measurement,
    pub visit_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metabolite {
    pub peak_id: String,
    pub name: Option<String>,
    pub kegg_id: Option<String>,
    pub hmdb_id: Option<String>,
    pub chemical_class: String,
    pub pathway: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeakMetaboliteLink {
    pub peak_id: String,
    pub metabolite_name: String,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_sample_key_valid() {
        let key = SampleKey::parse("ZNQOVZV-1011").unwrap();
        assert_eq!(key.subject_id(), "ZNQOVZV");
        assert_eq!(key.visit_id(), "1011");
        assert_eq!(key.as_str(), "ZNQOVZV-1011");
    }

    #[test]
    fn parse_sample_key_visit_allows_lowercase_and_underscore() {
        let key = SampleKey::parse("ABC123-v1_rep").unwrap();
        assert_eq!(key.subject_id(), "ABC123");
        assert_eq!(key.visit_id(), "v1_rep");
    }

    #[test]
    fn parse_sample_key_rejects_lowercase_subject() {
        assert!(SampleKey::parse("abc-V1").is_none());
    }

    #[test]
    fn parse_sample_key_rejects_missing_separator_and_padding() {
        assert!(SampleKey::parse("ABC123").is_none());
        assert!(SampleKey::parse(" ABC-V1").is_none());
        assert!(SampleKey::parse("ABC-V1-2").is_none());
        assert!(SampleKey::parse("ABC-").is_none());
    }

    #[test]
    fn from_str_reports_invalid_id() {
        let err = "bad_id".parse::<SampleKey>().unwrap_err();
        assert_matches!(err, OmicsError::InvalidSampleId(id) if id == "bad_id");
    }

    #[test]
    fn normalize_strips_numeric_suffix() {
        assert_eq!(normalize_metabolite_name("Glucose (2)"), "Glucose");
        assert_eq!(normalize_metabolite_name("Glucose(2)"), "Glucose");
        assert_eq!(normalize_metabolite_name("Lactate"), "Lactate");
        assert_eq!(normalize_metabolite_name("  Lactate  "), "Lactate");
        assert_eq!(normalize_metabolite_name("Glucose (2) "), "Glucose");
        assert_eq!(normalize_metabolite_name("x(1)(2)"), "x");
    }

    #[test]
    fn normalize_keeps_inner_and_non_numeric_parens() {
        assert_eq!(normalize_metabolite_name("PC(36:4)"), "PC(36:4)");
        assert_eq!(normalize_metabolite_name("A (1) B"), "A (1) B");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["Glucose (2)", "x(1)(2)", " Lactate ", "", "(3)", "C (4) "] {
            let once = normalize_metabolite_name(raw);
            assert_eq!(normalize_metabolite_name(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn measurement_variants() {
        assert_eq!(Measurement::parse("1.5"), Measurement::Numeric(1.5));
        assert_eq!(Measurement::parse("NA"), Measurement::Missing);
        assert_eq!(Measurement::parse(""), Measurement::Missing);
        assert_eq!(Measurement::parse("n/a"), Measurement::Raw("n/a".to_string()));
        assert_eq!(Measurement::parse("inf"), Measurement::Raw("inf".to_string()));
    }

    #[test]
    fn fact_table_routing() {
        assert!(FactTable::Proteomics.carries_visit());
        assert!(!FactTable::Metabolomics.carries_visit());
        assert_eq!(SourceKind::Transcriptomics.fact_table(), Some(FactTable::Transcriptomics));
        assert_eq!(SourceKind::Subjects.fact_table(), None);
    }
}
