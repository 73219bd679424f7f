use std::collections::HashMap;
use std::io::Cursor;

use assert_matches::assert_matches;

use ncov_ingest::app::curate;
use ncov_ingest::dedup::deduplicate;
use ncov_ingest::domain::{Accession, Column};
use ncov_ingest::error::IngestError;
use ncov_ingest::loader::read_records;
use ncov_ingest::normalize::derive_strain;
use ncov_ingest::output::JsonOutput;

#[test]
fn parse_accession_valid() {
    let acc: Accession = "EPI_ISL_402124".parse().unwrap();
    assert_eq!(acc.as_str(), "EPI_ISL_402124");
}

#[test]
fn parse_accession_invalid() {
    assert_matches!("".parse::<Accession>(), Err(IngestError::InvalidSource(_)));
}

#[test]
fn parse_column() {
    assert_eq!("division_exposure".parse::<Column>().unwrap(), Column::DivisionExposure);
    assert!(!Column::GisaidEpiIsl.is_curatable());
    assert_matches!("pangolin_lineage".parse::<Column>(), Err(IngestError::UnknownColumn(_)));
}

#[test]
fn strain_derivation_round_trip() {
    let once = derive_strain("hCoV-19/South Africa/NHLS-UCT-GS-1234/2020");
    assert_eq!(once, "SouthAfrica/NHLS-UCT-GS-1234/2020");
    assert_eq!(derive_strain(&once), once);
}

/// A record survives iff it is long enough and no same-strain record is
/// longer, or equally long with an earlier accession.
#[test]
fn survivors_match_length_and_dedup_rule() {
    let inputs = [
        ("hCoV-19/A/1/2020", "EPI_ISL_5", 16_000),
        ("hCoV-19/A/1/2020", "EPI_ISL_12", 16_000),
        ("hCoV-19/A/1/2020", "EPI_ISL_3", 15_500),
        ("hCoV-19/B/1/2020", "EPI_ISL_20", 14_999),
        ("hCoV-19/B/1/2020", "EPI_ISL_21", 15_000),
        ("hCoV-19/C/1/2020", "EPI_ISL_30", 100),
        ("nCoV-19/ D /1/2020", "EPI_ISL_40", 29_903),
        ("hCoV-19/D/1/2020", "EPI_ISL_41", 29_900),
    ];
    let ndjson: String = inputs
        .iter()
        .map(|(name, acc, len)| {
            serde_json::json!({
                "covv_virus_name": name,
                "covv_accession_id": acc,
                "sequence": "N".repeat(*len),
            })
            .to_string()
                + "\n"
        })
        .collect();
    let sources = read_records(Cursor::new(ndjson)).unwrap();
    let (records, counts) = curate(&sources, &[], 15_000, &JsonOutput).unwrap();

    let survivors: HashMap<&str, &str> = records
        .iter()
        .map(|record| (record.strain.as_str(), record.accession.as_str()))
        .collect();
    assert_eq!(survivors.len(), 3);
    assert_eq!(survivors["A/1/2020"], "EPI_ISL_5");
    assert_eq!(survivors["B/1/2020"], "EPI_ISL_21");
    assert_eq!(survivors["D/1/2020"], "EPI_ISL_40");
    assert!(!survivors.contains_key("C/1/2020"));
    assert_eq!(counts.dropped_short, 2);
    assert_eq!(counts.duplicates_removed, 3);

    assert_eq!(deduplicate(records.clone()), records);
}
