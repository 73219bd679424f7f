use crate::domain::Record;

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|value| value.trim().is_empty())
}

/// Fills blank divisions from the country, then every blank exposure field
/// from its geography counterpart. Values set by annotations are kept.
pub fn backfill(records: &mut [Record]) {
    let mut filled = 0usize;
    for record in records.iter_mut() {
        if is_blank(&record.division) && record.country.is_some() {
            record.division = record.country.clone();
        }
        let pairs = [
            (&mut record.region_exposure, &record.region),
            (&mut record.country_exposure, &record.country),
            (&mut record.division_exposure, &record.division),
        ];
        for (exposure, source) in pairs {
            if is_blank(exposure) && source.is_some() {
                *exposure = source.clone();
                filled += 1;
            }
        }
    }
    tracing::debug!("backfilled {} exposure fields", filled);
}
