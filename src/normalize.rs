use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::domain::{Accession, Record};
use crate::error::IngestError;
use crate::loader::{RawRecord, SourceRecord};

static STRAIN_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^[hn]CoV-19/").unwrap());

#[derive(Debug, Clone)]
pub struct Normalized {
    pub records: Vec<Record>,
    pub dropped_short: usize,
}

/// Strips one leading `hCoV-19/` or `nCoV-19/` (any case) and every whitespace
/// character from a GISAID virus name.
pub fn derive_strain(virus_name: &str) -> String {
    STRAIN_PREFIX
        .replacen(virus_name, 1, "")
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect()
}

pub fn normalize_text(value: &str) -> String {
    value.nfc().collect::<String>().trim().to_string()
}

pub fn clean_sequence(value: &str) -> String {
    value.chars().filter(|ch| *ch != '\n' && *ch != '\r').collect()
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(raw) => Some(normalize_text(raw)),
        other => Some(normalize_text(&other.to_string())),
    }
}

pub fn normalize_record(source: &SourceRecord) -> Result<Record, IngestError> {
    let raw: &RawRecord = &source.raw;
    let virus_name = text(raw.covv_virus_name.as_ref())
        .filter(|name| !name.is_empty())
        .ok_or(IngestError::MissingField {
            line: source.line,
            field: "covv_virus_name",
        })?;
    let accession: Accession = text(raw.covv_accession_id.as_ref())
        .filter(|id| !id.is_empty())
        .ok_or(IngestError::MissingField {
            line: source.line,
            field: "covv_accession_id",
        })?
        .parse()?;

    let mut record = Record::new(derive_strain(&virus_name), accession);
    record.date = text(raw.covv_collection_date.as_ref());
    record.date_submitted = text(raw.covv_subm_date.as_ref());
    record.host = text(raw.covv_host.as_ref());
    record.age = text(raw.covv_patient_age.as_ref());
    record.sex = text(raw.covv_gender.as_ref());
    record.originating_lab = text(raw.covv_orig_lab.as_ref());
    record.submitting_lab = text(raw.covv_subm_lab.as_ref());
    record.authors = text(raw.covv_authors.as_ref());
    record.location = text(raw.covv_location.as_ref());
    record.additional_host_info = text(raw.covv_add_host_info.as_ref());
    record.additional_location_info = text(raw.covv_add_location.as_ref());

    let sequence = match raw.sequence.as_ref() {
        Some(Value::String(seq)) => clean_sequence(seq.trim()),
        _ => String::new(),
    };
    record.length = sequence.chars().count();
    record.sequence = sequence;
    Ok(record)
}

pub fn normalize(sources: &[SourceRecord], min_length: usize) -> Result<Normalized, IngestError> {
    let mut records = Vec::with_capacity(sources.len());
    let mut dropped_short = 0;
    for source in sources {
        let record = normalize_record(source)?;
        if record.length < min_length {
            tracing::debug!(
                "dropping {} ({}): length {} below {}",
                record.strain,
                record.accession,
                record.length,
                min_length
            );
            dropped_short += 1;
            continue;
        }
        records.push(record);
    }
    tracing::info!(
        "normalized {} records, dropped {} short sequences",
        records.len(),
        dropped_short
    );
    Ok(Normalized {
        records,
        dropped_short,
    })
}
