use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::domain::{Column, Record};
use crate::error::IngestError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub line: usize,
    pub strain: String,
    pub accession: String,
    pub column: String,
    pub value: String,
}

/// Blank and comment-only lines are skipped. Other lines need exactly four
/// tab-separated fields once blank trailing fields are dropped.
pub fn parse_annotations(content: &str) -> Result<Vec<Annotation>, IngestError> {
    let mut annotations = Vec::new();
    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = match raw_line.find('#') {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        };
        if line.trim().is_empty() {
            continue;
        }
        let mut fields: Vec<&str> = line.split('\t').collect();
        while fields.len() > 4 && fields.last().is_some_and(|field| field.trim().is_empty()) {
            fields.pop();
        }
        let [strain, accession, column, value] = fields.as_slice() else {
            return Err(IngestError::MalformedAnnotation {
                line: line_no,
                message: format!("expected 4 tab-separated fields, found {}", fields.len()),
            });
        };
        annotations.push(Annotation {
            line: line_no,
            strain: strain.trim().to_string(),
            accession: accession.trim().to_string(),
            column: column.trim().to_string(),
            value: value.trim_end().to_string(),
        });
    }
    Ok(annotations)
}

pub fn load_annotations(path: &Path) -> Result<Vec<Annotation>, IngestError> {
    let content = fs::read_to_string(path)
        .map_err(|err| IngestError::Filesystem(format!("read {}: {err}", path.display())))?;
    let annotations = parse_annotations(&content)?;
    tracing::info!(
        "loaded {} annotations from {}",
        annotations.len(),
        path.display()
    );
    Ok(annotations)
}

/// Applies annotations in file order, so later rows win. Returns the number
/// of cell updates made.
pub fn apply(records: &mut [Record], annotations: &[Annotation]) -> usize {
    let mut by_accession: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        by_accession
            .entry(record.accession.to_string())
            .or_default()
            .push(idx);
    }

    let mut updates = 0;
    for annotation in annotations {
        let column = match annotation.column.parse::<Column>() {
            Ok(column) if column.is_curatable() => column,
            _ => {
                tracing::warn!(
                    "line {}: cannot annotate column {:?} for {}",
                    annotation.line,
                    annotation.column,
                    annotation.accession
                );
                continue;
            }
        };
        let Some(rows) = by_accession.get(&annotation.accession) else {
            tracing::debug!(
                "line {}: no record with accession {}",
                annotation.line,
                annotation.accession
            );
            continue;
        };
        for &row in rows {
            if let Err(err) = records[row].set(column, annotation.value.clone()) {
                tracing::warn!("line {}: {err}", annotation.line);
                continue;
            }
            updates += 1;
        }
    }
    tracing::info!("applied {} annotation updates", updates);
    updates
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn comments_are_stripped() {
        let content = "# header comment\n\
                       USA/1\tEPI_ISL_1\thost\tFelis catus  # cat\n\
                       \n\
                       USA/2\tEPI_ISL_2\tage\t42\n";
        let annotations = parse_annotations(content).unwrap();
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].line, 2);
        assert_eq!(annotations[0].value, "Felis catus");
        assert_eq!(annotations[1].column, "age");
    }

    #[test]
    fn value_keeps_leading_whitespace() {
        let annotations = parse_annotations("A\tEPI_ISL_1\ttitle\t  spaced  \n").unwrap();
        assert_eq!(annotations[0].value, "  spaced");
    }

    #[test]
    fn trailing_tab_before_comment_is_ignored() {
        let annotations = parse_annotations(
            "USA/1\tEPI_ISL_1\thost\tCat\t# seen in report\n\
             USA/2\tEPI_ISL_2\tsex\tFemale\t\n\
             USA/3\tEPI_ISL_3\tage\t\n",
        )
        .unwrap();
        assert_eq!(annotations.len(), 3);
        assert_eq!(annotations[0].value, "Cat");
        assert_eq!(annotations[1].value, "Female");
        assert_eq!(annotations[2].value, "");
    }

    #[test]
    fn wrong_field_count_is_an_error() {
        let err = parse_annotations("A\tEPI_ISL_1\thost\n").unwrap_err();
        assert_matches!(err, IngestError::MalformedAnnotation { line: 1, .. });
        let err = parse_annotations("A\tEPI_ISL_1\thost\tCat\textra\n").unwrap_err();
        assert_matches!(err, IngestError::MalformedAnnotation { line: 1, .. });
    }

    #[test]
    fn later_rows_win_and_match_by_accession() {
        let mut records = vec![
            Record::new("Readable/Name", "EPI_ISL_1".parse().unwrap()),
            Record::new("Other", "EPI_ISL_2".parse().unwrap()),
        ];
        let annotations = parse_annotations(
            "Wrong/Name\tEPI_ISL_1\thost\tDog\n\
             Wrong/Name\tEPI_ISL_1\thost\tCat\n\
             X\tEPI_ISL_404\thost\tBat\n\
             X\tEPI_ISL_2\tlineage\tB.1\n",
        )
        .unwrap();
        let updates = apply(&mut records, &annotations);
        assert_eq!(updates, 2);
        assert_eq!(records[0].host.as_deref(), Some("Cat"));
        assert_eq!(records[1].host, None);
    }
}
