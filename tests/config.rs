use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use ncov_ingest::config::{ConfigLoader, NotifyConfig};
use ncov_ingest::error::IngestError;
use ncov_ingest::remote::Location;

fn base(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}

#[test]
fn config_file_overrides_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let base = base(&temp);
    std::fs::write(
        base.join("ncov-ingest.json").as_std_path(),
        r#"{
            "schema_version": 1,
            "paths": {
                "input": "s3://nextstrain-ncov-private/gisaid.ndjson.gz",
                "metadata": "out/metadata.tsv",
                "sequences": "/abs/sequences.fasta"
            },
            "min_length": 27000
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(&base, None).unwrap();
    assert_eq!(
        resolved.paths.input,
        Location::S3("s3://nextstrain-ncov-private/gisaid.ndjson.gz".to_string())
    );
    assert_eq!(resolved.paths.metadata, base.join("out/metadata.tsv"));
    assert_eq!(resolved.paths.sequences, Utf8PathBuf::from("/abs/sequences.fasta"));
    assert_eq!(
        resolved.paths.additional_info,
        base.join("data/gisaid/additional_info.tsv")
    );
    assert_eq!(resolved.min_length, 27_000);
}

#[test]
fn missing_default_config_uses_builtins() {
    let temp = tempfile::tempdir().unwrap();
    let base = base(&temp);
    let resolved = ConfigLoader::resolve(&base, None).unwrap();
    assert_eq!(resolved.min_length, 15_000);
    assert_eq!(
        resolved.paths.annotations,
        base.join("source-data/gisaid_annotations.tsv")
    );
}

#[test]
fn explicit_config_must_exist() {
    let err = ConfigLoader::resolve(Utf8Path::new("/nonexistent"), Some("/nonexistent/x.json"))
        .unwrap_err();
    assert_matches!(err, IngestError::ConfigRead(_));
}

#[test]
fn malformed_config_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let base = base(&temp);
    let path = base.join("custom.json");
    std::fs::write(path.as_std_path(), "{ not json").unwrap();
    let err = ConfigLoader::resolve(&base, Some(path.as_str())).unwrap_err();
    assert_matches!(err, IngestError::ConfigParse(_));
}

#[test]
fn notify_config_reads_both_variables() {
    let config = NotifyConfig::from_lookup(|key| match key {
        "SLACK_TOKEN" => Some(" xoxb-test ".to_string()),
        "SLACK_CHANNELS" => Some("#ncov-gisaid-updates".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.token, "xoxb-test");
    assert_eq!(config.channels, "#ncov-gisaid-updates");

    let err = NotifyConfig::from_lookup(|key| (key == "SLACK_TOKEN").then(|| "t".to_string()))
        .unwrap_err();
    assert_matches!(err, IngestError::MissingEnv(key) if key == "SLACK_CHANNELS");
}
