use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_MIN_LENGTH;
use crate::error::IngestError;
use crate::remote::Location;

pub const CONFIG_FILE_NAME: &str = "ncov-ingest.json";
pub const DEFAULT_DIFF_KEY: &str = "gisaid_epi_isl";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub diff_key: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub annotations: Option<String>,
    #[serde(default)]
    pub sequences: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub diff_report: Option<String>,
    #[serde(default)]
    pub added_rows: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub input: Location,
    pub annotations: Utf8PathBuf,
    pub sequences: Utf8PathBuf,
    pub metadata: Utf8PathBuf,
    pub additional_info: Utf8PathBuf,
    pub diff_report: Utf8PathBuf,
    pub added_rows: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub base_dir: Utf8PathBuf,
    pub paths: ResolvedPaths,
    pub min_length: usize,
    pub diff_key: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `ncov-ingest.json` under `base_dir` when present, or
    /// falls back to the built-in defaults.
    pub fn resolve(base_dir: &Utf8Path, path: Option<&str>) -> Result<ResolvedConfig, IngestError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => base_dir.join(CONFIG_FILE_NAME),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            tracing::debug!("no {CONFIG_FILE_NAME} in {base_dir}, using defaults");
            return Self::resolve_config(base_dir, Config::default());
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| IngestError::ConfigRead(config_path.clone().into_std_path_buf()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| IngestError::ConfigParse(err.to_string()))?;
        tracing::debug!("loaded config from {config_path}");

        Self::resolve_config(base_dir, config)
    }

    pub fn resolve_config(
        base_dir: &Utf8Path,
        config: Config,
    ) -> Result<ResolvedConfig, IngestError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(IngestError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let paths = config.paths;
        let local = |value: Option<String>, default: &str| {
            let path = Utf8PathBuf::from(value.unwrap_or_else(|| default.to_string()));
            if path.is_relative() {
                base_dir.join(path)
            } else {
                path
            }
        };
        let input = paths
            .input
            .as_deref()
            .unwrap_or(default_paths::INPUT)
            .parse::<Location>()?
            .rooted_at(base_dir);

        Ok(ResolvedConfig {
            schema_version,
            base_dir: base_dir.to_path_buf(),
            paths: ResolvedPaths {
                input,
                annotations: local(paths.annotations, default_paths::ANNOTATIONS),
                sequences: local(paths.sequences, default_paths::SEQUENCES),
                metadata: local(paths.metadata, default_paths::METADATA),
                additional_info: local(paths.additional_info, default_paths::ADDITIONAL_INFO),
                diff_report: local(paths.diff_report, default_paths::DIFF_REPORT),
                added_rows: local(paths.added_rows, default_paths::ADDED_ROWS),
            },
            min_length: config.min_length.unwrap_or(DEFAULT_MIN_LENGTH),
            diff_key: config
                .diff_key
                .unwrap_or_else(|| DEFAULT_DIFF_KEY.to_string()),
        })
    }
}

pub mod default_paths {
    pub const INPUT: &str = "data/gisaid.ndjson";
    pub const ANNOTATIONS: &str = "source-data/gisaid_annotations.tsv";
    pub const SEQUENCES: &str = "data/gisaid/sequences.fasta";
    pub const METADATA: &str = "data/gisaid/metadata.tsv";
    pub const ADDITIONAL_INFO: &str = "data/gisaid/additional_info.tsv";
    pub const DIFF_REPORT: &str = "data/gisaid/metadata-changes.txt";
    pub const ADDED_ROWS: &str = "data/gisaid/metadata-additions.tsv";
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub token: String,
    pub channels: String,
}

impl NotifyConfig {
    pub fn from_env() -> Result<Self, IngestError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, IngestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| IngestError::MissingEnv(key.to_string()))
        };
        Ok(Self {
            token: require("SLACK_TOKEN")?,
            channels: require("SLACK_CHANNELS")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_are_rooted_at_base_dir() {
        let base = Utf8Path::new("/work/ncov");
        let resolved = ConfigLoader::resolve_config(base, Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.min_length, DEFAULT_MIN_LENGTH);
        assert_eq!(resolved.diff_key, "gisaid_epi_isl");
        assert_eq!(
            resolved.paths.input,
            Location::Local(Utf8PathBuf::from("/work/ncov/data/gisaid.ndjson"))
        );
        assert_eq!(
            resolved.paths.metadata,
            Utf8PathBuf::from("/work/ncov/data/gisaid/metadata.tsv")
        );
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let config = Config {
            schema_version: Some(2),
            ..Config::default()
        };
        assert_matches!(
            ConfigLoader::resolve_config(Utf8Path::new("."), config),
            Err(IngestError::ConfigParse(_))
        );
    }

    #[test]
    fn notify_config_requires_token() {
        let err = NotifyConfig::from_lookup(|key| {
            (key == "SLACK_CHANNELS").then(|| "#ncov-gisaid-updates".to_string())
        })
        .unwrap_err();
        assert_matches!(err, IngestError::MissingEnv(key) if key == "SLACK_TOKEN");
    }
}
