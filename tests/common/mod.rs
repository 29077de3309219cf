#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, Cursor};

use omics_db::app::{ProgressEvent, ProgressSink};
use omics_db::domain::SourceKind;
use omics_db::error::OmicsError;
use omics_db::ingest::SourceReader;

pub const METABOLOMICS: &str = "SampleID\tnHILIC_121.0505_3.5\tnHILIC_130.0872_6.3
ZNQOVZV-1011\t1.5\t2.0
ZNQOVZV-1012\t1.0\tNA
ZOZOW1T-1001\t3.0\t4.0
bad_id\t1\t2
";

pub const SUBJECTS: &str = "SubjectID,Race,Sex,Age,BMI,SSPG,IRIS
ZNQOVZV,C,F,72,23.1,NA,IR
ZOZOW1T,A,M,NA,28.4,150,IS
XXXX,C,F,65,20.0
YYYY,B,F,45,19.5,120,Unknown
";

pub const PROTEOMICS: &str = "SampleID\tP1
ZNQOVZV-1011\t10
ZNQOVZV-2000\t11
";

pub const TRANSCRIPTOMICS: &str = "SampleID\tA1BG\tA2M
ZOZOW1T-1001\t5.5\t1
ZOZOW1T-1002\t7.25\tfoo
";

pub const ANNOTATIONS: &str = "PeakID,Metabolite,KEGG,HMDB,ChemicalClass,Pathway
nHILIC_121.0505_3.5,Glucose(2)|Fructose,C00031|C00095,HMDB0000122|,Sugars,Glycolysis
nHILIC_130.0872_6.3,Lactate,C00186,HMDB0000190,Acids,Pyruvate
nHILIC_121.0505_3.5,Glucose,C99999,HMDB9,Other,Other
broken,line
";

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

/// Source texts held in memory, keyed by source.
#[derive(Default)]
pub struct MemorySources {
    texts: HashMap<SourceKind, String>,
}

impl MemorySources {
    pub fn cohort() -> Self {
        Self::default()
            .with(SourceKind::Metabolomics, METABOLOMICS)
            .with(SourceKind::Subjects, SUBJECTS)
            .with(SourceKind::Proteomics, PROTEOMICS)
            .with(SourceKind::Transcriptomics, TRANSCRIPTOMICS)
            .with(SourceKind::Annotations, ANNOTATIONS)
    }

    pub fn with(mut self, source: SourceKind, text: &str) -> Self {
        self.texts.insert(source, text.to_string());
        self
    }
}

impl SourceReader for MemorySources {
    fn open(&self, source: SourceKind) -> Result<Box<dyn BufRead + '_>, OmicsError> {
        let text = self
            .texts
            .get(&source)
            .ok_or_else(|| OmicsError::MissingInput(source.default_file_name().into()))?;
        Ok(Box::new(Cursor::new(text.as_bytes())))
    }
}
