use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::SourceKind;
use crate::error::OmicsError;
use crate::ingest::{AnnotationArityPolicy, FileSources};

pub const DEFAULT_CONFIG_FILE: &str = "omics-db.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub sources: SourcePaths,
    #[serde(default)]
    pub annotation_arity: Option<AnnotationArityPolicy>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SourcePaths {
    #[serde(default)]
    pub metabolomics: Option<String>,
    #[serde(default)]
    pub subjects: Option<String>,
    #[serde(default)]
    pub proteomics: Option<String>,
    #[serde(default)]
    pub transcriptomics: Option<String>,
    #[serde(default)]
    pub annotations: Option<String>,
}

impl SourcePaths {
    fn get(&self, source: SourceKind) -> Option<&str> {
        match source {
            SourceKind::Metabolomics => self.metabolomics.as_deref(),
            SourceKind::Subjects => self.subjects.as_deref(),
            SourceKind::Proteomics => self.proteomics.as_deref(),
            SourceKind::Transcriptomics => self.transcriptomics.as_deref(),
            SourceKind::Annotations => self.annotations.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub data_dir: Utf8PathBuf,
    /// One path per source, in load order. Relative entries are already
    /// joined onto `data_dir`.
    pub sources: Vec<(SourceKind, Utf8PathBuf)>,
    pub annotation_arity: AnnotationArityPolicy,
}

impl ResolvedConfig {
    pub fn path(&self, source: SourceKind) -> Option<&Utf8PathBuf> {
        self.sources
            .iter()
            .find(|(kind, _)| *kind == source)
            .map(|(_, path)| path)
    }

    pub fn file_sources(&self) -> FileSources {
        FileSources::new(self.sources.clone())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `omics-db.json` in the working directory when no
    /// path is given. Only the implicit file may be absent, in which case
    /// the built-in defaults apply.
    pub fn resolve(
        path: Option<&str>,
        data_dir_override: Option<&str>,
    ) -> Result<ResolvedConfig, OmicsError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| OmicsError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| OmicsError::ConfigParse(err.to_string()))?
        } else if path.is_some() {
            return Err(OmicsError::MissingConfig(config_path));
        } else {
            Config::default()
        };

        let mut resolved = Self::resolve_config(config)?;
        if let Some(dir) = data_dir_override {
            resolved = Self::rebase(resolved, Utf8PathBuf::from(dir));
        }
        Ok(resolved)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, OmicsError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(OmicsError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }
        let data_dir = Utf8PathBuf::from(config.data_dir.as_deref().unwrap_or("."));

        let sources = SourceKind::LOAD_ORDER
            .iter()
            .map(|&source| {
                let name = config
                    .sources
                    .get(source)
                    .unwrap_or_else(|| source.default_file_name());
                (source, data_dir.join(name))
            })
            .collect();

        Ok(ResolvedConfig {
            schema_version,
            data_dir,
            sources,
            annotation_arity: config.annotation_arity.unwrap_or_default(),
        })
    }

    fn rebase(resolved: ResolvedConfig, data_dir: Utf8PathBuf) -> ResolvedConfig {
        let sources = resolved
            .sources
            .into_iter()
            .map(|(source, path)| {
                let relative = path
                    .strip_prefix(&resolved.data_dir)
                    .map(|rest| rest.to_path_buf())
                    .unwrap_or(path);
                (source, data_dir.join(relative))
            })
            .collect();
        ResolvedConfig {
            data_dir,
            sources,
            ..resolved
        }
    }
}
