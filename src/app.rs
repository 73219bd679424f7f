use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::annotations::{self, Annotation};
use crate::backfill::backfill;
use crate::clean::clean_all;
use crate::config::ResolvedConfig;
use crate::dedup::deduplicate;
use crate::diff::{MetadataDiff, Table, diff_tables};
use crate::domain::{METADATA_COLUMNS, Record};
use crate::error::IngestError;
use crate::loader::{self, SourceRecord};
use crate::normalize::normalize;
use crate::notify::{Notifier, upload_path};
use crate::remote::{Location, SnapshotFetcher, materialize};
use crate::validate::{self, ValidationReport};
use crate::writer;

#[derive(Debug, Clone, Serialize)]
pub struct TransformResult {
    pub input: String,
    pub records_read: usize,
    pub dropped_short: usize,
    pub duplicates_removed: usize,
    pub annotations_applied: usize,
    pub records_written: usize,
    pub sequences: String,
    pub metadata: String,
    pub additional_info: String,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub path: String,
    pub report: ValidationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffResult {
    pub previous: String,
    pub current: String,
    pub key: String,
    pub summary: String,
    pub rows_added: usize,
    pub rows_removed: usize,
    pub rows_changed: usize,
    pub report: String,
    pub notified: bool,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddedRowsResult {
    pub previous: String,
    pub current: String,
    pub output: String,
    pub rows_added: usize,
    pub notified: bool,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotifyResult {
    pub kind: String,
    pub target: Option<String>,
}

#[derive(Debug, Clone)]
pub enum NotifyRequest {
    Message(String),
    File { path: String, title: Option<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CurationCounts {
    pub records_read: usize,
    pub dropped_short: usize,
    pub duplicates_removed: usize,
    pub annotations_applied: usize,
}

#[derive(Debug, Clone, Copy)]
pub enum ProgressSinkKind {
    Transform,
    Check,
    Diff,
    Notify,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn phase(sink: &dyn ProgressSink, message: String, started: Option<Instant>) {
    sink.event(ProgressEvent {
        message,
        elapsed: started.map(|started| started.elapsed()),
    });
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn curate(
    sources: &[SourceRecord],
    annotations: &[Annotation],
    min_length: usize,
    sink: &dyn ProgressSink,
) -> Result<(Vec<Record>, CurationCounts), IngestError> {
    let started = Instant::now();
    let normalized = normalize(sources, min_length)?;
    phase(
        sink,
        format!(
            "phase=Normalize; kept {} of {} records",
            normalized.records.len(),
            sources.len()
        ),
        Some(started),
    );

    let before = normalized.records.len();
    let mut records = deduplicate(normalized.records);
    let duplicates_removed = before - records.len();
    phase(
        sink,
        format!("phase=Deduplicate; removed {duplicates_removed} duplicates"),
        Some(started),
    );

    clean_all(&mut records);
    phase(sink, "phase=Clean; fields cleaned".to_string(), Some(started));

    let annotations_applied = annotations::apply(&mut records, annotations);
    phase(
        sink,
        format!("phase=Annotate; {annotations_applied} updates"),
        Some(started),
    );

    backfill(&mut records);
    phase(sink, "phase=Backfill; exposure filled".to_string(), Some(started));

    Ok((
        records,
        CurationCounts {
            records_read: sources.len(),
            dropped_short: normalized.dropped_short,
            duplicates_removed,
            annotations_applied,
        },
    ))
}

pub fn check_annotations(
    path: &Path,
    sink: &dyn ProgressSink,
) -> Result<CheckResult, IngestError> {
    phase(sink, format!("phase=Check; validating {}", path.display()), None);
    let annotations = annotations::load_annotations(path)?;
    let report = validate::validate(&annotations)?;
    Ok(CheckResult {
        path: path.display().to_string(),
        report,
    })
}

pub struct App<F: SnapshotFetcher, N: Notifier> {
    fetcher: F,
    notifier: Option<N>,
}

impl<F: SnapshotFetcher, N: Notifier> App<F, N> {
    pub fn new(fetcher: F, notifier: Option<N>) -> Self {
        Self { fetcher, notifier }
    }

    fn notifier(&self) -> Result<&N, IngestError> {
        self.notifier
            .as_ref()
            .ok_or_else(|| IngestError::MissingEnv("SLACK_TOKEN".to_string()))
    }

    pub fn transform(
        &self,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<TransformResult, IngestError> {
        let paths = &config.paths;
        phase(sink, format!("phase=Load; reading {}", paths.input), None);
        let input = materialize(&self.fetcher, &paths.input)?;
        let sources = loader::load_path(input.path())?;

        let annotations = if paths.annotations.as_std_path().exists() {
            annotations::load_annotations(paths.annotations.as_std_path())?
        } else {
            tracing::warn!("no annotations at {}, skipping overlay", paths.annotations);
            Vec::new()
        };

        let (records, counts) = curate(&sources, &annotations, config.min_length, sink)?;

        phase(sink, "phase=Write; writing outputs".to_string(), None);
        let staged = vec![
            writer::stage_fasta(&records, paths.sequences.as_std_path())?,
            writer::stage_table(&records, &METADATA_COLUMNS, paths.metadata.as_std_path())?,
            writer::stage_additional_info(&records, paths.additional_info.as_std_path())?,
        ];
        writer::commit(staged)?;

        Ok(TransformResult {
            input: paths.input.to_string(),
            records_read: counts.records_read,
            dropped_short: counts.dropped_short,
            duplicates_removed: counts.duplicates_removed,
            annotations_applied: counts.annotations_applied,
            records_written: records.len(),
            sequences: paths.sequences.to_string(),
            metadata: paths.metadata.to_string(),
            additional_info: paths.additional_info.to_string(),
            generated_at: timestamp(),
        })
    }

    fn load_diff(
        &self,
        previous: &Location,
        current: &Path,
        key: &str,
        sink: &dyn ProgressSink,
    ) -> Result<MetadataDiff, IngestError> {
        phase(sink, format!("phase=Fetch; previous snapshot {previous}"), None);
        let snapshot = materialize(&self.fetcher, previous)?;
        let previous_table = Table::read_path(snapshot.path())?;
        let current_table = Table::read_path(current)?;
        let diff = diff_tables(&previous_table, &current_table, key)?;
        phase(sink, format!("phase=Diff; {}", diff.summary()), None);
        Ok(diff)
    }

    pub fn diff(
        &self,
        previous: &Location,
        current: &Path,
        key: &str,
        output: &Path,
        notify: bool,
        sink: &dyn ProgressSink,
    ) -> Result<DiffResult, IngestError> {
        let diff = self.load_diff(previous, current, key, sink)?;
        let report = diff.render_report();
        writer::write_atomic(output, report.as_bytes())?;

        let mut notified = false;
        if notify && !diff.is_empty() {
            upload_path(self.notifier()?, output, Some("Metadata changes"))?;
            notified = true;
        }

        Ok(DiffResult {
            previous: previous.to_string(),
            current: current.display().to_string(),
            key: key.to_string(),
            summary: diff.summary(),
            rows_added: diff.added.len(),
            rows_removed: diff.removed.len(),
            rows_changed: diff.changed.len(),
            report: output.display().to_string(),
            notified,
            generated_at: timestamp(),
        })
    }

    pub fn added_rows(
        &self,
        previous: &Location,
        current: &Path,
        key: &str,
        output: &Path,
        notify: bool,
        sink: &dyn ProgressSink,
    ) -> Result<AddedRowsResult, IngestError> {
        let diff = self.load_diff(previous, current, key, sink)?;
        let mut buffer = Vec::new();
        let rows_added = diff
            .write_added_rows(&mut buffer)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        writer::write_atomic(output, &buffer)?;

        let mut notified = false;
        if notify && rows_added > 0 {
            upload_path(self.notifier()?, output, Some("New records"))?;
            notified = true;
        }

        Ok(AddedRowsResult {
            previous: previous.to_string(),
            current: current.display().to_string(),
            output: output.display().to_string(),
            rows_added,
            notified,
            generated_at: timestamp(),
        })
    }

    pub fn notify(
        &self,
        request: NotifyRequest,
        sink: &dyn ProgressSink,
    ) -> Result<NotifyResult, IngestError> {
        let notifier = self.notifier()?;
        match request {
            NotifyRequest::Message(text) => {
                phase(sink, "phase=Notify; posting message".to_string(), None);
                notifier.post_message(&text)?;
                Ok(NotifyResult {
                    kind: "message".to_string(),
                    target: None,
                })
            }
            NotifyRequest::File { path, title } => {
                phase(sink, format!("phase=Notify; uploading {path}"), None);
                upload_path(notifier, Path::new(&path), title.as_deref())?;
                Ok(NotifyResult {
                    kind: "file".to_string(),
                    target: Some(path),
                })
            }
        }
    }
}
