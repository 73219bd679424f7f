use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("invalid input source: {0}")]
    InvalidSource(String),

    #[error("malformed record on line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    #[error("record on line {line} has no {field}")]
    MissingField { line: usize, field: &'static str },

    #[error("malformed annotation on line {line}: {message}")]
    MalformedAnnotation { line: usize, message: String },

    #[error("duplicate annotations found:\n{0}")]
    #[diagnostic(help("each strain may define a trait only once"))]
    DuplicateAnnotations(String),

    #[error("annotation validation failed:\n{0}")]
    InvalidAnnotations(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("missing required environment variable {0}")]
    #[diagnostic(help("export {0} before running this command"))]
    MissingEnv(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("malformed table {path}: {message}")]
    Table { path: String, message: String },

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("external command failed: {0}")]
    ToolFailed(String),

    #[error("download failed: {0}")]
    DownloadHttp(String),

    #[error("download returned status {status}: {message}")]
    DownloadStatus { status: u16, message: String },

    #[error("notification request failed: {0}")]
    NotifyHttp(String),

    #[error("notification rejected: {0}")]
    NotifyRejected(String),
}
