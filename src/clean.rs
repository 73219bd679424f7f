use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{NULL_MARKER, Record};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static LOCATION_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*/\s*").unwrap());
static AUTHOR_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;，；]|\band\b|&").unwrap());
static AGE_DECADE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+'?s$").unwrap());
static AGE_YEARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*years?$").unwrap());
static AGE_MONTHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*months?$").unwrap());

const LAB_SPELLING_FIXES: [(&str, &str); 2] = [("Contorl", "Control"), ("Dieases", "Disease")];

// Uninterpretable values become `?` or are left alone; nothing here fails.
pub fn clean_all(records: &mut [Record]) {
    split_geography(records);
    clean_labs(records);
    abbreviate_authors(records);
    normalize_ages(records);
    normalize_sexes(records);
}

pub fn collapse_whitespace(value: &str) -> String {
    WHITESPACE.replace_all(value.trim(), " ").into_owned()
}

/// `"North America / USA / California / "` into its four positional parts.
/// The fourth part keeps any further segments.
pub fn split_location(
    location: &str,
) -> (Option<String>, Option<String>, Option<String>, Option<String>) {
    let mut parts = LOCATION_SEPARATOR
        .splitn(location.trim(), 4)
        .map(|part| part.trim().to_string());
    let region = parts.next();
    let country = parts.next();
    let division = parts.next();
    let place = parts
        .next()
        .map(|rest| LOCATION_SEPARATOR.replace_all(&rest, "/").into_owned());
    (region, country, division, place)
}

pub fn split_geography(records: &mut [Record]) {
    for record in records.iter_mut() {
        let Some(location) = record.location.take() else {
            continue;
        };
        let (region, country, division, place) = split_location(&location);
        record.region = region;
        record.country = country;
        record.division = division;
        record.location = place;
    }
}

pub fn clean_lab_name(value: &str) -> String {
    let mut cleaned = collapse_whitespace(value);
    for (wrong, right) in LAB_SPELLING_FIXES {
        cleaned = cleaned.replace(wrong, right);
    }
    cleaned
}

pub fn clean_labs(records: &mut [Record]) {
    for record in records.iter_mut() {
        for lab in [&mut record.originating_lab, &mut record.submitting_lab] {
            if let Some(value) = lab.as_deref() {
                *lab = Some(clean_lab_name(value));
            }
        }
    }
}

/// First listed author plus `" et al"`, or `None` if no name is left.
pub fn abbreviate_author_list(value: &str) -> Option<String> {
    let collapsed = collapse_whitespace(value);
    AUTHOR_SEPARATOR
        .split(&collapsed)
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(|first| format!("{first} et al"))
}

pub fn abbreviate_authors(records: &mut [Record]) {
    for record in records.iter_mut() {
        if let Some(authors) = record.authors.as_deref() {
            record.authors = abbreviate_author_list(authors);
        }
    }
}

pub fn normalize_age(value: &str) -> String {
    let value = value.trim();
    if AGE_DECADE.is_match(value) {
        return NULL_MARKER.to_string();
    }
    if let Some(caps) = AGE_MONTHS.captures(value) {
        return match caps[1].parse::<f64>() {
            Ok(months) => format_fraction(months / 12.0),
            Err(_) => NULL_MARKER.to_string(),
        };
    }
    let value = AGE_YEARS
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map_or(value, |years| years.as_str());
    if value == "0" {
        return NULL_MARKER.to_string();
    }
    match value.parse::<f64>() {
        Ok(age) if age.is_finite() && age >= 0.0 => format!("{}", age.trunc() as u64),
        _ => NULL_MARKER.to_string(),
    }
}

fn format_fraction(value: f64) -> String {
    let formatted = format!("{value:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

pub fn normalize_ages(records: &mut [Record]) {
    for record in records.iter_mut() {
        if let Some(age) = record.age.as_deref() {
            record.age = Some(normalize_age(age));
        }
    }
}

pub fn normalize_sex(value: &str) -> String {
    match value.trim().to_lowercase().as_str() {
        "male" | "m" => "Male".to_string(),
        "female" | "f" => "Female".to_string(),
        "" | "?" | "unknown" | "na" | "n/a" | "none" | "not provided" => NULL_MARKER.to_string(),
        _ => value.to_string(),
    }
}

pub fn normalize_sexes(records: &mut [Record]) {
    for record in records.iter_mut() {
        if let Some(sex) = record.sex.as_deref() {
            record.sex = Some(normalize_sex(sex));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_splits_into_four_parts() {
        let (region, country, division, place) =
            split_location("North America / USA / California / ");
        assert_eq!(region.as_deref(), Some("North America"));
        assert_eq!(country.as_deref(), Some("USA"));
        assert_eq!(division.as_deref(), Some("California"));
        assert_eq!(place.as_deref(), Some(""));
    }

    #[test]
    fn location_missing_parts_are_none() {
        let (region, country, division, place) = split_location("Europe/Spain");
        assert_eq!(region.as_deref(), Some("Europe"));
        assert_eq!(country.as_deref(), Some("Spain"));
        assert_eq!(division, None);
        assert_eq!(place, None);
    }

    #[test]
    fn location_keeps_extra_segments() {
        let (_, _, division, place) =
            split_location("Europe / Germany / Bavaria / Munich / Schwabing");
        assert_eq!(division.as_deref(), Some("Bavaria"));
        assert_eq!(place.as_deref(), Some("Munich/Schwabing"));
    }

    #[test]
    fn lab_names_are_fixed() {
        assert_eq!(
            clean_lab_name("Centers for  Disease Contorl\tand Prevention"),
            "Centers for Disease Control and Prevention"
        );
        assert_eq!(
            clean_lab_name("Institute of Infectious Dieases"),
            "Institute of Infectious Disease"
        );
    }

    #[test]
    fn authors_keep_first_entry() {
        assert_eq!(
            abbreviate_author_list("Smith J, Doe A, Roe B").as_deref(),
            Some("Smith J et al")
        );
        assert_eq!(
            abbreviate_author_list("Li  Wei；Wang Fang").as_deref(),
            Some("Li Wei et al")
        );
        assert_eq!(
            abbreviate_author_list("Alice Anderson and Bob").as_deref(),
            Some("Alice Anderson et al")
        );
        assert_eq!(
            abbreviate_author_list("Smith & Jones").as_deref(),
            Some("Smith et al")
        );
        assert_eq!(abbreviate_author_list("Solo").as_deref(), Some("Solo et al"));
        assert_eq!(abbreviate_author_list(" , "), None);
    }

    #[test]
    fn ages_are_normalized() {
        assert_eq!(normalize_age("60s"), "?");
        assert_eq!(normalize_age("50's"), "?");
        assert_eq!(normalize_age("45 years"), "45");
        assert_eq!(normalize_age("6 months"), "0.5");
        assert_eq!(normalize_age("7 months"), "0.58");
        assert_eq!(normalize_age("0"), "?");
        assert_eq!(normalize_age("unknown"), "?");
        assert_eq!(normalize_age("33.0"), "33");
        assert_eq!(normalize_age("71"), "71");
    }

    #[test]
    fn sexes_are_normalized() {
        assert_eq!(normalize_sex("male"), "Male");
        assert_eq!(normalize_sex("M"), "Male");
        assert_eq!(normalize_sex("FEMALE"), "Female");
        assert_eq!(normalize_sex("unknown"), "?");
        assert_eq!(normalize_sex("N/A"), "?");
        assert_eq!(normalize_sex(""), "?");
        assert_eq!(normalize_sex("Hermaphrodite"), "Hermaphrodite");
    }

    #[test]
    fn clean_all_applies_every_pass() {
        let mut record = Record::new("A", "EPI_ISL_1".parse().unwrap());
        record.location = Some("Asia / Japan / Tokyo".to_string());
        record.authors = Some("Tanaka, Sato".to_string());
        record.age = Some("30 years".to_string());
        record.sex = Some("f".to_string());
        let mut records = vec![record];
        clean_all(&mut records);
        let record = &records[0];
        assert_eq!(record.region.as_deref(), Some("Asia"));
        assert_eq!(record.division.as_deref(), Some("Tokyo"));
        assert_eq!(record.location, None);
        assert_eq!(record.authors.as_deref(), Some("Tanaka et al"));
        assert_eq!(record.age.as_deref(), Some("30"));
        assert_eq!(record.sex.as_deref(), Some("Female"));
    }
}
