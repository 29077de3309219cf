use camino::Utf8Path;
use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::{Connection, Transaction, params};
use tracing::debug;

use crate::domain::{
    FactRow, FactTable, Measurement, Metabolite, PeakMetaboliteLink, SampleKey, Subject,
};
use crate::error::OmicsError;

/// Tables created by [`Database::create_schema`], in creation order.
pub const SCHEMA_TABLES: [&str; 7] = [
    "Subject",
    "Sample",
    "Metabolite",
    "Metabolomics",
    "Proteomics",
    "Transcriptomics",
    "PeakMetaboliteLink",
];

// Foreign keys are declared for consumers of the schema but not enforced:
// samples may arrive before their subject, and Subject_ID is not unique.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS "Subject" (
    "Subject_ID" TEXT,
    "Race" TEXT,
    "Sex" TEXT,
    "AGE" NUMERIC,
    "BMI" REAL,
    "SSPG" REAL,
    "IRIS" TEXT
);
CREATE TABLE IF NOT EXISTS "Sample" (
    "SampleID" TEXT PRIMARY KEY,
    "SubjectID" TEXT NOT NULL,
    "VisitID" TEXT NOT NULL,
    FOREIGN KEY ("SubjectID") REFERENCES "Subject" ("Subject_ID")
);
CREATE TABLE IF NOT EXISTS "Metabolite" (
    "PeakID" TEXT,
    "Name" TEXT,
    "KEGG_ID" TEXT,
    "HMDB_ID" TEXT,
    "Class" TEXT,
    "Pathway" TEXT,
    UNIQUE ("PeakID", "Name")
);
CREATE TABLE IF NOT EXISTS "Metabolomics" (
    "SampleID" TEXT NOT NULL,
    "PeakID" TEXT NOT NULL,
    "Abundance" REAL,
    FOREIGN KEY ("SampleID") REFERENCES "Sample" ("SampleID")
);
CREATE TABLE IF NOT EXISTS "Proteomics" (
    "SampleID" TEXT NOT NULL,
    "EntityID" TEXT NOT NULL,
    "Abundance" REAL,
    "VisitID" TEXT,
    FOREIGN KEY ("SampleID") REFERENCES "Sample" ("SampleID")
);
CREATE TABLE IF NOT EXISTS "Transcriptomics" (
    "SampleID" TEXT NOT NULL,
    "EntityID" TEXT NOT NULL,
    "Abundance" REAL,
    FOREIGN KEY ("SampleID") REFERENCES "Sample" ("SampleID")
);
CREATE TABLE IF NOT EXISTS "PeakMetaboliteLink" (
    "PeakID" TEXT NOT NULL,
    "MetaboliteID" TEXT NOT NULL,
    FOREIGN KEY ("PeakID") REFERENCES "Metabolomics" ("PeakID"),
    FOREIGN KEY ("MetaboliteID") REFERENCES "Metabolite" ("Name")
);
"#;

/// Write side of the schema, as seen by the loaders.
///
/// The `_if_absent` methods return `true` when a row was written and
/// `false` when an existing row with the same natural key won.
pub trait RecordSink {
    fn insert_subject(&mut self, subject: &Subject) -> Result<(), OmicsError>;
    fn insert_sample_if_absent(&mut self, sample: &SampleKey) -> Result<bool, OmicsError>;
    fn insert_fact(&mut self, row: &FactRow) -> Result<(), OmicsError>;
    fn insert_metabolite_if_absent(&mut self, metabolite: &Metabolite) -> Result<bool, OmicsError>;
    fn insert_link(&mut self, link: &PeakMetaboliteLink) -> Result<(), OmicsError>;
}

impl ToSql for Measurement {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Measurement::Numeric(value) => Ok(ToSqlOutput::from(*value)),
            Measurement::Missing => Ok(ToSqlOutput::from(rusqlite::types::Null)),
            Measurement::Raw(text) => Ok(ToSqlOutput::from(text.as_str())),
        }
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Utf8Path) -> Result<Self, OmicsError> {
        let conn = Connection::open(path.as_std_path())?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, OmicsError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, OmicsError> {
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn create_schema(&self) -> Result<(), OmicsError> {
        debug!("creating schema if absent");
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    pub fn tables(&self) -> Result<Vec<String>, OmicsError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Row count for one of [`SCHEMA_TABLES`]; `None` for any other name.
    pub fn row_count(&self, table: &str) -> Result<Option<u64>, OmicsError> {
        if !SCHEMA_TABLES.contains(&table) {
            return Ok(None);
        }
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))?;
        Ok(Some(count.max(0) as u64))
    }

    /// Opens the single transaction a load writes into. Nothing is visible
    /// to other connections until [`LoadSession::commit`]; dropping the
    /// session without committing rolls everything back.
    pub fn begin(&mut self) -> Result<LoadSession<'_>, OmicsError> {
        let tx = self.conn.transaction()?;
        Ok(LoadSession { tx })
    }
}

pub struct LoadSession<'conn> {
    tx: Transaction<'conn>,
}

impl LoadSession<'_> {
    pub fn commit(self) -> Result<(), OmicsError> {
        self.tx.commit()?;
        Ok(())
    }
}

impl RecordSink for LoadSession<'_> {
    fn insert_subject(&mut self, subject: &Subject) -> Result<(), OmicsError> {
        self.tx
            .prepare_cached(
                "INSERT INTO Subject (Subject_ID, Race, Sex, AGE, BMI, SSPG, IRIS)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?
            .execute(params![
                subject.subject_id,
                subject.race,
                subject.sex,
                subject.age,
                subject.bmi,
                subject.sspg,
                subject.iris,
            ])?;
        Ok(())
    }

    fn insert_sample_if_absent(&mut self, sample: &SampleKey) -> Result<bool, OmicsError> {
        let written = self
            .tx
            .prepare_cached(
                "INSERT OR IGNORE INTO Sample (SampleID, SubjectID, VisitID) VALUES (?1, ?2, ?3)",
            )?
            .execute(params![sample.as_str(), sample.subject_id(), sample.visit_id()])?;
        Ok(written > 0)
    }

    fn insert_fact(&mut self, row: &FactRow) -> Result<(), OmicsError> {
        match row.table {
            FactTable::Metabolomics => self
                .tx
                .prepare_cached(
                    "INSERT INTO Metabolomics (SampleID, PeakID, Abundance) VALUES (?1, ?2, ?3)",
                )?
                .execute(params![row.sample_id, row.entity_id, row.abundance])?,
            FactTable::Proteomics => self
                .tx
                .prepare_cached(
                    "INSERT INTO Proteomics (SampleID, EntityID, Abundance, VisitID)
                     VALUES (?1, ?2, ?3, ?4)",
                )?
                .execute(params![row.sample_id, row.entity_id, row.abundance, row.visit_id])?,
            FactTable::Transcriptomics => self
                .tx
                .prepare_cached(
                    "INSERT INTO Transcriptomics (SampleID, EntityID, Abundance)
                     VALUES (?1, ?2, ?3)",
                )?
                .execute(params![row.sample_id, row.entity_id, row.abundance])?,
        };
        Ok(())
    }

    fn insert_metabolite_if_absent(&mut self, metabolite: &Metabolite) -> Result<bool, OmicsError> {
        let written = self
            .tx
            .prepare_cached(
                "INSERT OR IGNORE INTO Metabolite (PeakID, Name, KEGG_ID, HMDB_ID, Class, Pathway)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?
            .execute(params![
                metabolite.peak_id,
                metabolite.name,
                metabolite.kegg_id,
                metabolite.hmdb_id,
                metabolite.chemical_class,
                metabolite.pathway,
            ])?;
        Ok(written > 0)
    }

    fn insert_link(&mut self, link: &PeakMetaboliteLink) -> Result<(), OmicsError> {
        self.tx
            .prepare_cached(
                "INSERT INTO PeakMetaboliteLink (PeakID, MetaboliteID) VALUES (?1, ?2)",
            )?
            .execute(params![link.peak_id, link.metabolite_name])?;
        Ok(())
    }
}
