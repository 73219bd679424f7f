use std::cmp::Reverse;

use crate::domain::Record;

// Longest sequence wins, then the smallest accession.
pub fn deduplicate(mut records: Vec<Record>) -> Vec<Record> {
    let before = records.len();
    records.sort_by(|a, b| {
        (&a.strain, Reverse(a.length), &a.accession).cmp(&(&b.strain, Reverse(b.length), &b.accession))
    });
    records.dedup_by(|later, kept| later.strain == kept.strain);
    tracing::info!(
        "deduplicated {} records into {} strains",
        before,
        records.len()
    );
    records
}
