//! The fixed analytical queries run against a loaded database.
//!
//! Numeric columns hold REAL for numbers, NULL for the `NA` sentinel and
//! TEXT for anything else, so numeric filters check `typeof` first.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ToSql};
use serde::Serialize;
use serde_json::Value;

use crate::error::OmicsError;

pub const DEFAULT_VISIT_SUBJECT: &str = "ZNQOVZV";
pub const DEFAULT_TRANSCRIPT_SUBJECT: &str = "ZOZOW1T";
pub const DEFAULT_TRANSCRIPT: &str = "A1BG";
pub const DEFAULT_PEAKS: [&str; 4] = [
    "nHILIC_121.0505_3.5",
    "nHILIC_130.0872_6.3",
    "nHILIC_133.0506_2.3",
    "nHILIC_133.0506_4.4",
];

const IS_NUMBER: &str = "IN ('integer', 'real')";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedQuery {
    SubjectsOverSeventy,
    FemaleNormalBmi,
    SubjectVisits,
    InsulinResistantWithMetabolomics,
    PeakKeggIds,
    AgeStatistics,
    PathwayAnnotationCounts,
    MaxTranscriptAbundance,
    AgeBmiScatter,
}

impl CannedQuery {
    pub const ALL: [CannedQuery; 9] = [
        CannedQuery::SubjectsOverSeventy,
        CannedQuery::FemaleNormalBmi,
        CannedQuery::SubjectVisits,
        CannedQuery::InsulinResistantWithMetabolomics,
        CannedQuery::PeakKeggIds,
        CannedQuery::AgeStatistics,
        CannedQuery::PathwayAnnotationCounts,
        CannedQuery::MaxTranscriptAbundance,
        CannedQuery::AgeBmiScatter,
    ];

    pub fn number(self) -> u8 {
        match self {
            CannedQuery::SubjectsOverSeventy => 1,
            CannedQuery::FemaleNormalBmi => 2,
            CannedQuery::SubjectVisits => 3,
            CannedQuery::InsulinResistantWithMetabolomics => 4,
            CannedQuery::PeakKeggIds => 5,
            CannedQuery::AgeStatistics => 6,
            CannedQuery::PathwayAnnotationCounts => 7,
            CannedQuery::MaxTranscriptAbundance => 8,
            CannedQuery::AgeBmiScatter => 9,
        }
    }

    pub fn title(self, params: &QueryParams) -> String {
        match self {
            CannedQuery::SubjectsOverSeventy => "Subjects with AGE > 70".to_string(),
            CannedQuery::FemaleNormalBmi => {
                "Subjects with Sex = 'F' and BMI between 18.5 and 24.9".to_string()
            }
            CannedQuery::SubjectVisits => {
                format!("Visit IDs for subject '{}'", params.visit_subject())
            }
            CannedQuery::InsulinResistantWithMetabolomics => {
                "Distinct insulin-resistant subjects with metabolomics samples".to_string()
            }
            CannedQuery::PeakKeggIds => "Unique KEGG IDs for the selected peaks".to_string(),
            CannedQuery::AgeStatistics => "Minimum, maximum and average age".to_string(),
            CannedQuery::PathwayAnnotationCounts => {
                "Pathways with at least 10 annotations".to_string()
            }
            CannedQuery::MaxTranscriptAbundance => format!(
                "Maximum abundance of transcript '{}' for subject '{}'",
                params.transcript(),
                params.transcript_subject()
            ),
            CannedQuery::AgeBmiScatter => "Age vs BMI".to_string(),
        }
    }
}

impl TryFrom<u8> for CannedQuery {
    type Error = OmicsError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|query| query.number() == number)
            .ok_or(OmicsError::UnknownQuery(number))
    }
}

/// Overrides for the subjects, transcript and peaks the queries look at.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub subject: Option<String>,
    pub transcript: Option<String>,
    pub peaks: Vec<String>,
}

impl QueryParams {
    fn visit_subject(&self) -> &str {
        self.subject.as_deref().unwrap_or(DEFAULT_VISIT_SUBJECT)
    }

    fn transcript_subject(&self) -> &str {
        self.subject.as_deref().unwrap_or(DEFAULT_TRANSCRIPT_SUBJECT)
    }

    fn transcript(&self) -> &str {
        self.transcript.as_deref().unwrap_or(DEFAULT_TRANSCRIPT)
    }

    fn peaks(&self) -> Vec<String> {
        if self.peaks.is_empty() {
            DEFAULT_PEAKS.iter().map(|peak| peak.to_string()).collect()
        } else {
            self.peaks.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: u8,
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.rows.iter().all(|row| row.iter().all(Value::is_null))
    }
}

pub fn run_query(
    conn: &Connection,
    query: CannedQuery,
    params: &QueryParams,
) -> Result<QueryResult, OmicsError> {
    let (columns, rows) = match query {
        CannedQuery::SubjectsOverSeventy => select(
            conn,
            &format!(
                "SELECT Subject_ID, AGE FROM Subject
                 WHERE typeof(AGE) {IS_NUMBER} AND AGE > 70"
            ),
            &[],
        )?,
        CannedQuery::FemaleNormalBmi => select(
            conn,
            &format!(
                "SELECT Subject_ID FROM Subject
                 WHERE Sex = 'F' AND typeof(BMI) {IS_NUMBER} AND BMI BETWEEN 18.5 AND 24.9
                 ORDER BY Subject_ID DESC"
            ),
            &[],
        )?,
        CannedQuery::SubjectVisits => select(
            conn,
            "SELECT VisitID FROM Sample WHERE SubjectID = ?1
             GROUP BY VisitID ORDER BY MIN(rowid)",
            &[&params.visit_subject()],
        )?,
        CannedQuery::InsulinResistantWithMetabolomics => select(
            conn,
            "SELECT DISTINCT S.SubjectID
             FROM Sample S
             JOIN Subject SU ON S.SubjectID = SU.Subject_ID
             JOIN Metabolomics M ON S.SampleID = M.SampleID
             WHERE SU.IRIS = 'IR'",
            &[],
        )?,
        CannedQuery::PeakKeggIds => {
            let peaks = params.peaks();
            let placeholders = (1..=peaks.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>()
                .join(", ");
            let bound: Vec<&dyn ToSql> = peaks.iter().map(|peak| peak as &dyn ToSql).collect();
            select(
                conn,
                &format!(
                    "SELECT DISTINCT M.KEGG_ID
                     FROM PeakMetaboliteLink PML
                     JOIN Metabolite M ON PML.MetaboliteID = M.Name
                     WHERE PML.PeakID IN ({placeholders})"
                ),
                &bound,
            )?
        }
        CannedQuery::AgeStatistics => select(
            conn,
            &format!(
                "SELECT MIN(AGE), MAX(AGE), AVG(AGE) FROM Subject WHERE typeof(AGE) {IS_NUMBER}"
            ),
            &[],
        )?,
        CannedQuery::PathwayAnnotationCounts => select(
            conn,
            "SELECT Pathway, COUNT(*) AS AnnotationCount
             FROM Metabolite
             WHERE Pathway IS NOT NULL AND Pathway != ''
             GROUP BY Pathway
             HAVING COUNT(*) >= 10
             ORDER BY AnnotationCount DESC",
            &[],
        )?,
        CannedQuery::MaxTranscriptAbundance => select(
            conn,
            &format!(
                "SELECT MAX(T.Abundance) AS MaxAbundance
                 FROM Transcriptomics T
                 JOIN Sample S ON T.SampleID = S.SampleID
                 WHERE S.SubjectID = ?1 AND T.EntityID = ?2 AND typeof(T.Abundance) {IS_NUMBER}"
            ),
            &[&params.transcript_subject(), &params.transcript()],
        )?,
        CannedQuery::AgeBmiScatter => age_bmi_points(conn)?,
    };

    Ok(QueryResult {
        query: query.number(),
        title: query.title(params),
        columns,
        rows,
    })
}

/// Points for the age/BMI scatter plot. Text that parses as a number is
/// coerced; anything else drops the point.
fn age_bmi_points(conn: &Connection) -> Result<(Vec<String>, Vec<Vec<Value>>), OmicsError> {
    let mut stmt = conn.prepare("SELECT AGE, BMI FROM Subject")?;
    let mut rows = stmt.query([])?;
    let mut points = Vec::new();
    while let Some(row) = rows.next()? {
        let age = coerce_f64(row.get_ref(0)?);
        let bmi = coerce_f64(row.get_ref(1)?);
        if let (Some(age), Some(bmi)) = (age, bmi) {
            points.push(vec![Value::from(age), Value::from(bmi)]);
        }
    }
    Ok((vec!["AGE".to_string(), "BMI".to_string()], points))
}

fn select(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<(Vec<String>, Vec<Vec<Value>>), OmicsError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let width = columns.len();
    let mut rows = stmt.query(params)?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(width);
        for index in 0..width {
            record.push(json_value(row.get_ref(index)?));
        }
        values.push(record);
    }
    Ok((columns, values))
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::from(number),
        ValueRef::Real(number) => Value::from(number),
        ValueRef::Text(text) => Value::from(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::from(format!("<{} bytes>", bytes.len())),
    }
}

fn coerce_f64(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Integer(number) => Some(number as f64),
        ValueRef::Real(number) => Some(number),
        ValueRef::Text(text) => std::str::from_utf8(text)
            .ok()
            .and_then(|text| text.trim().parse::<f64>().ok())
            .filter(|number| number.is_finite()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}
