mod common;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use omics_db::app::App;
use omics_db::config::ConfigLoader;
use omics_db::domain::SourceKind;
use omics_db::error::OmicsError;
use omics_db::ingest::{AnnotationArityPolicy, LoadOptions, SkipReason};
use omics_db::store::Database;

use common::{MemorySources, NoopSink};

fn memory_app() -> App {
    App::new(Database::open_in_memory().unwrap(), ":memory:")
}

fn count(app: &App, table: &str) -> u64 {
    app.database().row_count(table).unwrap().unwrap()
}

#[test]
fn load_writes_every_table_and_reports_skips() {
    let mut app = memory_app();
    let result = app
        .load(&MemorySources::cohort(), &LoadOptions::default(), &NoopSink)
        .unwrap();

    assert_eq!(count(&app, "Sample"), 5);
    assert_eq!(count(&app, "Subject"), 3);
    assert_eq!(count(&app, "Metabolomics"), 6);
    assert_eq!(count(&app, "Proteomics"), 2);
    assert_eq!(count(&app, "Transcriptomics"), 4);
    assert_eq!(count(&app, "Metabolite"), 3);
    assert_eq!(count(&app, "PeakMetaboliteLink"), 4);

    let skipped: Vec<_> = result
        .report
        .skipped
        .iter()
        .map(|line| (line.source, line.line.as_str()))
        .collect();
    assert_eq!(
        skipped,
        vec![
            (SourceKind::Metabolomics, "bad_id\t1\t2"),
            (SourceKind::Subjects, "XXXX,C,F,65,20.0"),
            (SourceKind::Annotations, "broken,line"),
        ]
    );
    assert_eq!(result.report.sources.len(), 5);
    assert!(result.report.finished_at.is_some());

    let annotations = result.report.summary(SourceKind::Annotations).unwrap();
    assert_eq!(annotations.rows.metabolites, 3);
    assert_eq!(annotations.rows.duplicate_metabolites, 1);
    assert_eq!(annotations.rows.links, 4);
}

#[test]
fn samples_are_created_once_by_the_first_loader() {
    let sources = MemorySources::default()
        .with(SourceKind::Metabolomics, "SampleID\tP1\nNEW1-V1\t1\n")
        .with(SourceKind::Proteomics, "SampleID\tE1\nNEW1-V1\t2\n");
    let options = LoadOptions {
        sources: vec![SourceKind::Metabolomics, SourceKind::Proteomics],
        ..LoadOptions::default()
    };

    let mut app = memory_app();
    let result = app.load(&sources, &options, &NoopSink).unwrap();

    assert_eq!(count(&app, "Sample"), 1);
    assert_eq!(count(&app, "Metabolomics"), 1);
    assert_eq!(count(&app, "Proteomics"), 1);
    assert_eq!(
        result.report.summary(SourceKind::Metabolomics).unwrap().rows.samples,
        1
    );
    assert_eq!(
        result.report.summary(SourceKind::Proteomics).unwrap().rows.samples,
        0
    );

    let (subject, visit): (String, String) = app
        .database()
        .connection()
        .query_row(
            "SELECT SubjectID, VisitID FROM Sample WHERE SampleID = 'NEW1-V1'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!((subject.as_str(), visit.as_str()), ("NEW1", "V1"));

    let proteomics_visit: String = app
        .database()
        .connection()
        .query_row("SELECT VisitID FROM Proteomics", [], |row| row.get(0))
        .unwrap();
    assert_eq!(proteomics_visit, "V1");
}

#[test]
fn duplicate_metabolite_keeps_first_annotation() {
    let mut app = memory_app();
    app.load(&MemorySources::cohort(), &LoadOptions::default(), &NoopSink)
        .unwrap();

    let (kegg, hmdb, class, pathway): (String, String, String, String) = app
        .database()
        .connection()
        .query_row(
            "SELECT KEGG_ID, HMDB_ID, Class, Pathway FROM Metabolite
             WHERE PeakID = 'nHILIC_121.0505_3.5' AND Name = 'Glucose'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();
    assert_eq!(kegg, "C00031");
    assert_eq!(hmdb, "HMDB0000122");
    assert_eq!(class, "Sugars");
    assert_eq!(pathway, "Glycolysis");

    let fructose_hmdb: Option<String> = app
        .database()
        .connection()
        .query_row(
            "SELECT HMDB_ID FROM Metabolite WHERE Name = 'Fructose'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(fructose_hmdb, None);
}

#[test]
fn failed_load_commits_nothing() {
    let mut app = memory_app();
    let options = LoadOptions {
        annotation_arity: AnnotationArityPolicy::Abort,
        ..LoadOptions::default()
    };

    let err = app
        .load(&MemorySources::cohort(), &options, &NoopSink)
        .unwrap_err();
    assert_matches!(err, OmicsError::MalformedAnnotation { line_number: 5, .. });

    for table in ["Sample", "Subject", "Metabolomics", "Metabolite", "PeakMetaboliteLink"] {
        assert_eq!(count(&app, table), 0, "{table} should be empty");
    }
}

#[test]
fn missing_source_aborts_the_load() {
    let sources = MemorySources::default().with(SourceKind::Metabolomics, common::METABOLOMICS);
    let mut app = memory_app();
    let err = app
        .load(&sources, &LoadOptions::default(), &NoopSink)
        .unwrap_err();
    assert_matches!(err, OmicsError::MissingInput(_));
    assert_eq!(count(&app, "Metabolomics"), 0);
}

#[test]
fn load_from_files_persists_after_commit() {
    let temp = tempfile::tempdir().unwrap();
    let data_dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    for (source, text) in [
        (SourceKind::Metabolomics, common::METABOLOMICS),
        (SourceKind::Subjects, common::SUBJECTS),
        (SourceKind::Proteomics, common::PROTEOMICS),
        (SourceKind::Transcriptomics, common::TRANSCRIPTOMICS),
        (SourceKind::Annotations, common::ANNOTATIONS),
    ] {
        std::fs::write(data_dir.join(source.default_file_name()), text).unwrap();
    }
    let config_path = data_dir.join("omics-db.json");
    std::fs::write(&config_path, r#"{ "schema_version": 1 }"#).unwrap();

    let config =
        ConfigLoader::resolve(Some(config_path.as_str()), Some(data_dir.as_str())).unwrap();
    let db_path = data_dir.join("cohort.db");
    {
        let mut app = App::new(Database::open(&db_path).unwrap(), db_path.as_str());
        let options = LoadOptions {
            annotation_arity: config.annotation_arity,
            ..LoadOptions::default()
        };
        let result = app
            .load(&config.file_sources(), &options, &NoopSink)
            .unwrap();
        assert_eq!(result.report.skipped.len(), 3);
        assert_matches!(
            result.report.skipped[1].reason,
            SkipReason::FieldCount {
                expected: 7,
                found: 5
            }
        );
    }

    let reopened = App::new(Database::open(&db_path).unwrap(), db_path.as_str());
    assert_eq!(count(&reopened, "Sample"), 5);
    let tables = reopened.tables(&NoopSink).unwrap();
    assert_eq!(tables.tables.len(), 7);
    assert!(tables.tables.iter().all(|table| table.rows.is_some()));
}

#[test]
fn create_is_idempotent() {
    let app = memory_app();
    let first = app.create(&NoopSink).unwrap();
    let second = app.create(&NoopSink).unwrap();
    assert_eq!(first.tables, second.tables);
    assert_eq!(first.tables.len(), 7);
}
