use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

pub const NULL_MARKER: &str = "?";

/// Records with fewer bases than this are dropped by the normalizer.
pub const DEFAULT_MIN_LENGTH: usize = 15_000;

pub const GISAID_URL: &str = "https://www.gisaid.org";

/// Ordering compares the alphabetic prefix, then the trailing digits by
/// numeric value, so `EPI_ISL_9 < EPI_ISL_10`. Deduplication treats the
/// smaller accession as the earlier submission; GISAID hands out accessions
/// in increasing order but nothing here checks that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn sort_key(&self) -> (&str, usize, &str) {
        let split = self
            .0
            .rfind(|ch: char| !ch.is_ascii_digit())
            .map(|idx| idx + self.0[idx..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        let (prefix, digits) = self.0.split_at(split);
        let digits = digits.trim_start_matches('0');
        (prefix, digits.len(), digits)
    }
}

impl Ord for Accession {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Accession {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IngestError::InvalidSource(
                "empty accession id".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub strain: String,
    pub accession: Accession,
    pub virus: Option<String>,
    pub genbank_accession: Option<String>,
    pub date: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub division: Option<String>,
    pub location: Option<String>,
    pub region_exposure: Option<String>,
    pub country_exposure: Option<String>,
    pub division_exposure: Option<String>,
    pub segment: Option<String>,
    pub length: usize,
    pub host: Option<String>,
    pub age: Option<String>,
    pub sex: Option<String>,
    pub originating_lab: Option<String>,
    pub submitting_lab: Option<String>,
    pub authors: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub date_submitted: Option<String>,
    pub additional_host_info: Option<String>,
    pub additional_location_info: Option<String>,
    pub sequence: String,
}

impl Record {
    pub fn new(strain: impl Into<String>, accession: Accession) -> Self {
        Self {
            strain: strain.into(),
            accession,
            virus: Some("ncov".to_string()),
            genbank_accession: Some(NULL_MARKER.to_string()),
            date: None,
            region: None,
            country: None,
            division: None,
            location: None,
            region_exposure: None,
            country_exposure: None,
            division_exposure: None,
            segment: Some("genome".to_string()),
            length: 0,
            host: None,
            age: None,
            sex: None,
            originating_lab: None,
            submitting_lab: None,
            authors: None,
            url: Some(GISAID_URL.to_string()),
            title: Some(NULL_MARKER.to_string()),
            date_submitted: None,
            additional_host_info: None,
            additional_location_info: None,
            sequence: String::new(),
        }
    }

    pub fn get(&self, column: Column) -> Option<String> {
        match column {
            Column::Strain => Some(self.strain.clone()),
            Column::GisaidEpiIsl => Some(self.accession.to_string()),
            Column::Length => Some(self.length.to_string()),
            other => self.text_field(other).and_then(|field| field.clone()),
        }
    }

    /// Overwrites one column. Only the key and computed columns can fail.
    pub fn set(&mut self, column: Column, value: String) -> Result<(), IngestError> {
        match column {
            Column::Strain => self.strain = value,
            Column::GisaidEpiIsl => self.accession = value.parse()?,
            Column::Length => {
                self.length = value.trim().parse().map_err(|_| {
                    IngestError::UnknownColumn(format!("length is not a number: {value}"))
                })?;
            }
            other => {
                if let Some(field) = self.text_field_mut(other) {
                    *field = Some(value);
                }
            }
        }
        Ok(())
    }

    fn text_field(&self, column: Column) -> Option<&Option<String>> {
        let field = match column {
            Column::Virus => &self.virus,
            Column::GenbankAccession => &self.genbank_accession,
            Column::Date => &self.date,
            Column::Region => &self.region,
            Column::Country => &self.country,
            Column::Division => &self.division,
            Column::Location => &self.location,
            Column::RegionExposure => &self.region_exposure,
            Column::CountryExposure => &self.country_exposure,
            Column::DivisionExposure => &self.division_exposure,
            Column::Segment => &self.segment,
            Column::Host => &self.host,
            Column::Age => &self.age,
            Column::Sex => &self.sex,
            Column::OriginatingLab => &self.originating_lab,
            Column::SubmittingLab => &self.submitting_lab,
            Column::Authors => &self.authors,
            Column::Url => &self.url,
            Column::Title => &self.title,
            Column::DateSubmitted => &self.date_submitted,
            Column::AdditionalHostInfo => &self.additional_host_info,
            Column::AdditionalLocationInfo => &self.additional_location_info,
            Column::Strain | Column::GisaidEpiIsl | Column::Length => return None,
        };
        Some(field)
    }

    fn text_field_mut(&mut self, column: Column) -> Option<&mut Option<String>> {
        let field = match column {
            Column::Virus => &mut self.virus,
            Column::GenbankAccession => &mut self.genbank_accession,
            Column::Date => &mut self.date,
            Column::Region => &mut self.region,
            Column::Country => &mut self.country,
            Column::Division => &mut self.division,
            Column::Location => &mut self.location,
            Column::RegionExposure => &mut self.region_exposure,
            Column::CountryExposure => &mut self.country_exposure,
            Column::DivisionExposure => &mut self.division_exposure,
            Column::Segment => &mut self.segment,
            Column::Host => &mut self.host,
            Column::Age => &mut self.age,
            Column::Sex => &mut self.sex,
            Column::OriginatingLab => &mut self.originating_lab,
            Column::SubmittingLab => &mut self.submitting_lab,
            Column::Authors => &mut self.authors,
            Column::Url => &mut self.url,
            Column::Title => &mut self.title,
            Column::DateSubmitted => &mut self.date_submitted,
            Column::AdditionalHostInfo => &mut self.additional_host_info,
            Column::AdditionalLocationInfo => &mut self.additional_location_info,
            Column::Strain | Column::GisaidEpiIsl | Column::Length => return None,
        };
        Some(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Strain,
    Virus,
    GisaidEpiIsl,
    GenbankAccession,
    Date,
    Region,
    Country,
    Division,
    Location,
    RegionExposure,
    CountryExposure,
    DivisionExposure,
    Segment,
    Length,
    Host,
    Age,
    Sex,
    OriginatingLab,
    SubmittingLab,
    Authors,
    Url,
    Title,
    DateSubmitted,
    AdditionalHostInfo,
    AdditionalLocationInfo,
}

pub const METADATA_COLUMNS: [Column; 23] = [
    Column::Strain,
    Column::Virus,
    Column::GisaidEpiIsl,
    Column::GenbankAccession,
    Column::Date,
    Column::Region,
    Column::Country,
    Column::Division,
    Column::Location,
    Column::RegionExposure,
    Column::CountryExposure,
    Column::DivisionExposure,
    Column::Segment,
    Column::Length,
    Column::Host,
    Column::Age,
    Column::Sex,
    Column::OriginatingLab,
    Column::SubmittingLab,
    Column::Authors,
    Column::Url,
    Column::Title,
    Column::DateSubmitted,
];

pub const ADDITIONAL_INFO_COLUMNS: [Column; 4] = [
    Column::GisaidEpiIsl,
    Column::Strain,
    Column::AdditionalHostInfo,
    Column::AdditionalLocationInfo,
];

const ALL_COLUMNS: [Column; 25] = [
    Column::Strain,
    Column::Virus,
    Column::GisaidEpiIsl,
    Column::GenbankAccession,
    Column::Date,
    Column::Region,
    Column::Country,
    Column::Division,
    Column::Location,
    Column::RegionExposure,
    Column::CountryExposure,
    Column::DivisionExposure,
    Column::Segment,
    Column::Length,
    Column::Host,
    Column::Age,
    Column::Sex,
    Column::OriginatingLab,
    Column::SubmittingLab,
    Column::Authors,
    Column::Url,
    Column::Title,
    Column::DateSubmitted,
    Column::AdditionalHostInfo,
    Column::AdditionalLocationInfo,
];

impl Column {
    pub fn all() -> &'static [Column] {
        &ALL_COLUMNS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Strain => "strain",
            Column::Virus => "virus",
            Column::GisaidEpiIsl => "gisaid_epi_isl",
            Column::GenbankAccession => "genbank_accession",
            Column::Date => "date",
            Column::Region => "region",
            Column::Country => "country",
            Column::Division => "division",
            Column::Location => "location",
            Column::RegionExposure => "region_exposure",
            Column::CountryExposure => "country_exposure",
            Column::DivisionExposure => "division_exposure",
            Column::Segment => "segment",
            Column::Length => "length",
            Column::Host => "host",
            Column::Age => "age",
            Column::Sex => "sex",
            Column::OriginatingLab => "originating_lab",
            Column::SubmittingLab => "submitting_lab",
            Column::Authors => "authors",
            Column::Url => "url",
            Column::Title => "title",
            Column::DateSubmitted => "date_submitted",
            Column::AdditionalHostInfo => "additional_host_info",
            Column::AdditionalLocationInfo => "additional_location_info",
        }
    }

    /// Whether curators may override this column through annotations.
    /// The accession is the overlay key and length is computed.
    pub fn is_curatable(&self) -> bool {
        !matches!(self, Column::GisaidEpiIsl | Column::Length)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Column {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        ALL_COLUMNS
            .iter()
            .copied()
            .find(|column| column.as_str() == trimmed)
            .ok_or_else(|| IngestError::UnknownColumn(value.to_string()))
    }
}
