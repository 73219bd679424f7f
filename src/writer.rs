use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::{ADDITIONAL_INFO_COLUMNS, Column, NULL_MARKER, Record};
use crate::error::IngestError;

fn fs_err(path: &Path, err: impl std::fmt::Display) -> IngestError {
    IngestError::Filesystem(format!("{}: {err}", path.display()))
}

/// Output written to a temp file beside its destination. Nothing appears at
/// the destination until `commit`; dropping it removes the temp file.
#[derive(Debug)]
pub struct StagedFile {
    dest: PathBuf,
    temp: NamedTempFile,
}

impl StagedFile {
    pub fn new(dest: &Path) -> Result<Self, IngestError> {
        let parent = match dest.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            Some(parent) => parent,
            None => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|err| fs_err(parent, err))?;
        let temp = tempfile::Builder::new()
            .prefix(".ncov-ingest-")
            .tempfile_in(parent)
            .map_err(|err| fs_err(parent, err))?;
        Ok(Self {
            dest: dest.to_path_buf(),
            temp,
        })
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    fn writer(&mut self) -> BufWriter<&mut fs::File> {
        BufWriter::new(self.temp.as_file_mut())
    }
}

/// Moves every staged file into place. Destinations are checked before the
/// first rename so a bad path leaves all of them untouched.
pub fn commit(staged: Vec<StagedFile>) -> Result<(), IngestError> {
    for file in &staged {
        if file.dest.is_dir() {
            return Err(fs_err(&file.dest, "destination is a directory"));
        }
    }
    for file in staged {
        let StagedFile { dest, temp } = file;
        temp.persist(&dest).map_err(|err| fs_err(&dest, err))?;
    }
    Ok(())
}

pub fn write_fasta<W: Write>(records: &[Record], mut out: W) -> std::io::Result<()> {
    for record in records {
        writeln!(out, ">{}", record.strain)?;
        writeln!(out, "{}", record.sequence)?;
    }
    out.flush()
}

/// Absent values become `?`. Sequences are never part of a table.
pub fn write_table<W: Write>(
    records: &[Record],
    columns: &[Column],
    out: W,
) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(out);
    writer.write_record(columns.iter().map(Column::as_str))?;
    for record in records {
        writer.write_record(columns.iter().map(|column| {
            record
                .get(*column)
                .unwrap_or_else(|| NULL_MARKER.to_string())
        }))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn stage_fasta(records: &[Record], path: &Path) -> Result<StagedFile, IngestError> {
    tracing::info!("writing {} sequences to {}", records.len(), path.display());
    let mut staged = StagedFile::new(path)?;
    write_fasta(records, staged.writer()).map_err(|err| fs_err(path, err))?;
    Ok(staged)
}

pub fn stage_table(
    records: &[Record],
    columns: &[Column],
    path: &Path,
) -> Result<StagedFile, IngestError> {
    tracing::info!("writing {} rows to {}", records.len(), path.display());
    let mut staged = StagedFile::new(path)?;
    write_table(records, columns, staged.writer()).map_err(|err| fs_err(path, err))?;
    Ok(staged)
}

pub fn stage_additional_info(records: &[Record], path: &Path) -> Result<StagedFile, IngestError> {
    stage_table(records, &ADDITIONAL_INFO_COLUMNS, path)
}

pub fn stage_bytes(content: &[u8], path: &Path) -> Result<StagedFile, IngestError> {
    let mut staged = StagedFile::new(path)?;
    let mut out = staged.writer();
    out.write_all(content)
        .and_then(|()| out.flush())
        .map_err(|err| fs_err(path, err))?;
    drop(out);
    Ok(staged)
}

pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), IngestError> {
    commit(vec![stage_bytes(content, path)?])
}
