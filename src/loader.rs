use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::bufread::MultiGzDecoder;
use serde::Deserialize;
use serde_json::Value;

use crate::error::IngestError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub covv_virus_name: Option<Value>,
    #[serde(default)]
    pub covv_accession_id: Option<Value>,
    #[serde(default)]
    pub covv_collection_date: Option<Value>,
    #[serde(default)]
    pub covv_subm_date: Option<Value>,
    #[serde(default)]
    pub covv_host: Option<Value>,
    #[serde(default)]
    pub covv_patient_age: Option<Value>,
    #[serde(default)]
    pub covv_gender: Option<Value>,
    #[serde(default)]
    pub covv_orig_lab: Option<Value>,
    #[serde(default)]
    pub covv_subm_lab: Option<Value>,
    #[serde(default)]
    pub covv_authors: Option<Value>,
    #[serde(default)]
    pub covv_location: Option<Value>,
    #[serde(default)]
    pub covv_add_host_info: Option<Value>,
    #[serde(default)]
    pub covv_add_location: Option<Value>,
    #[serde(default)]
    pub sequence: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub line: usize,
    pub raw: RawRecord,
}

/// Compression is detected from the magic bytes, so downloaded temp files
/// without a `.gz` suffix work too.
pub fn open_read_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>, IngestError> {
    let file = File::open(path)
        .map_err(|err| IngestError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut reader = BufReader::new(file);
    let is_gzip = reader
        .fill_buf()
        .map_err(|err| IngestError::Filesystem(format!("read {}: {err}", path.display())))?
        .starts_with(&GZIP_MAGIC);
    if is_gzip {
        tracing::debug!("opening {} as gzip", path.display());
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        tracing::debug!("opening {} as plain text", path.display());
        Ok(Box::new(reader))
    }
}

pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<SourceRecord>, IngestError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|err| IngestError::MalformedRecord {
            line: line_no,
            message: err.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawRecord =
            serde_json::from_str(&line).map_err(|err| IngestError::MalformedRecord {
                line: line_no,
                message: err.to_string(),
            })?;
        records.push(SourceRecord { line: line_no, raw });
    }
    tracing::info!("loaded {} raw records", records.len());
    Ok(records)
}

pub fn load_path(path: &Path) -> Result<Vec<SourceRecord>, IngestError> {
    read_records(open_read_maybe_gz(path)?)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use assert_matches::assert_matches;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn reads_lines_and_skips_blanks() {
        let input = "{\"covv_virus_name\":\"hCoV-19/A/1/2020\"}\n\n{\"covv_accession_id\":\"EPI_ISL_2\",\"extra\":1}\n";
        let records = read_records(Cursor::new(input)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].line, 1);
        assert_eq!(records[1].line, 3);
        assert!(records[1].raw.covv_virus_name.is_none());
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let input = "{}\n{not json\n";
        let err = read_records(Cursor::new(input)).unwrap_err();
        assert_matches!(err, IngestError::MalformedRecord { line: 2, .. });
    }

    #[test]
    fn gzip_input_is_detected_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(b"{\"covv_accession_id\":\"EPI_ISL_1\"}\n")
            .unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let records = load_path(&path).unwrap();
        assert_eq!(records.len(), 1);
    }
}
