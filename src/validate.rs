use std::collections::BTreeMap;

use serde::Serialize;

use crate::annotations::Annotation;
use crate::domain::Column;
use crate::error::IngestError;

pub type Pivot = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub annotations: usize,
    pub strains: usize,
    pub traits: Vec<String>,
}

pub fn allowed_traits() -> Vec<&'static str> {
    Column::all()
        .iter()
        .filter(|column| column.is_curatable())
        .map(Column::as_str)
        .collect()
}

/// Long-to-wide reshape. Fails if a strain defines a trait more than once,
/// listing every offending pair with the lines it appears on.
pub fn pivot(annotations: &[Annotation]) -> Result<Pivot, IngestError> {
    let mut seen: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();
    for annotation in annotations {
        seen.entry((annotation.strain.as_str(), annotation.column.as_str()))
            .or_default()
            .push(annotation.line);
    }
    let duplicates: Vec<String> = seen
        .iter()
        .filter(|(_, lines)| lines.len() > 1)
        .map(|((strain, name), lines)| {
            let lines = lines
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("  {strain}\t{name}\t(lines {lines})")
        })
        .collect();
    if !duplicates.is_empty() {
        return Err(IngestError::DuplicateAnnotations(duplicates.join("\n")));
    }

    let mut pivot = Pivot::new();
    for annotation in annotations {
        pivot
            .entry(annotation.strain.clone())
            .or_default()
            .insert(annotation.column.clone(), annotation.value.clone());
    }
    Ok(pivot)
}

fn has_value(traits: &BTreeMap<String, String>, column: Column) -> bool {
    traits
        .get(column.as_str())
        .is_some_and(|value| !value.trim().is_empty())
}

pub fn find_violations(pivot: &Pivot) -> Vec<String> {
    let allowed = allowed_traits();
    let mut violations = Vec::new();

    let mut unknown: Vec<&str> = pivot
        .values()
        .flat_map(|traits| traits.keys())
        .map(String::as_str)
        .filter(|name| !allowed.iter().any(|known| known == name))
        .collect();
    unknown.sort_unstable();
    unknown.dedup();
    if !unknown.is_empty() {
        violations.push(format!("unrecognized traits: {}", unknown.join(", ")));
    }

    for (strain, traits) in pivot {
        if has_value(traits, Column::DivisionExposure)
            && !has_value(traits, Column::CountryExposure)
        {
            violations.push(format!(
                "{strain}: division_exposure is set without country_exposure"
            ));
        }
        if has_value(traits, Column::CountryExposure) && !has_value(traits, Column::RegionExposure)
        {
            violations.push(format!(
                "{strain}: country_exposure is set without region_exposure"
            ));
        }
    }
    violations
}

pub fn validate(annotations: &[Annotation]) -> Result<ValidationReport, IngestError> {
    let pivot = pivot(annotations)?;
    let violations = find_violations(&pivot);
    if !violations.is_empty() {
        for violation in &violations {
            tracing::error!("{violation}");
        }
        return Err(IngestError::InvalidAnnotations(violations.join("\n")));
    }
    let mut traits: Vec<String> = pivot
        .values()
        .flat_map(|traits| traits.keys().cloned())
        .collect();
    traits.sort_unstable();
    traits.dedup();
    tracing::info!(
        "{} annotations for {} strains passed validation",
        annotations.len(),
        pivot.len()
    );
    Ok(ValidationReport {
        annotations: annotations.len(),
        strains: pivot.len(),
        traits,
    })
}
