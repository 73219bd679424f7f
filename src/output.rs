use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    AddedRowsResult, CheckResult, DiffResult, NotifyResult, ProgressEvent, ProgressSink,
    ProgressSinkKind, TransformResult,
};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_transform(result: &TransformResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_check(result: &CheckResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_diff(result: &DiffResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_added_rows(result: &AddedRowsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_notify(result: &NotifyResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct LogSink {
    kind: ProgressSinkKind,
}

impl LogSink {
    pub fn new(kind: ProgressSinkKind) -> Self {
        Self { kind }
    }
}

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(
                "[{:?}] {} ({:.1}s)",
                self.kind,
                event.message,
                elapsed.as_secs_f64()
            ),
            None => tracing::info!("[{:?}] {}", self.kind, event.message),
        }
    }
}
