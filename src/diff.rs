use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::io::{BufRead, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::IngestError;
use crate::loader::open_read_maybe_gz;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read<R: BufRead>(reader: R, name: &str) -> Result<Self, IngestError> {
        let table_err = |err: csv::Error| IngestError::Table {
            path: name.to_string(),
            message: err.to_string(),
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(table_err)?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(table_err)?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn read_path(path: &Path) -> Result<Self, IngestError> {
        Self::read(open_read_maybe_gz(path)?, &path.display().to_string())
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    fn index_by(&self, key: usize) -> HashMap<&str, usize> {
        let mut index = HashMap::with_capacity(self.rows.len());
        for (row_idx, row) in self.rows.iter().enumerate() {
            if index.insert(row[key].as_str(), row_idx).is_some() {
                tracing::warn!("duplicate key {:?}; keeping the last row", row[key]);
            }
        }
        index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub column: String,
    pub previous: String,
    pub current: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedRow {
    pub key: String,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataDiff {
    pub key: String,
    pub headers: Vec<String>,
    pub columns_added: Vec<String>,
    pub columns_removed: Vec<String>,
    pub added: Vec<Vec<String>>,
    pub removed: Vec<Vec<String>>,
    pub changed: Vec<ChangedRow>,
    #[serde(skip)]
    previous_headers: Vec<String>,
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Rows are matched on the `key` column. Added and changed rows follow the
/// current table's order, removed rows the previous table's.
pub fn diff_tables(previous: &Table, current: &Table, key: &str) -> Result<MetadataDiff, IngestError> {
    let missing_key = |which: &str| IngestError::Table {
        path: which.to_string(),
        message: format!("no {key} column"),
    };
    let prev_key = previous.column(key).ok_or_else(|| missing_key("previous"))?;
    let cur_key = current.column(key).ok_or_else(|| missing_key("current"))?;

    let prev_columns: BTreeSet<&str> = previous.headers.iter().map(String::as_str).collect();
    let cur_columns: BTreeSet<&str> = current.headers.iter().map(String::as_str).collect();
    let shared: Vec<(&str, usize, usize)> = current
        .headers
        .iter()
        .enumerate()
        .filter_map(|(cur_idx, name)| {
            previous
                .column(name)
                .map(|prev_idx| (name.as_str(), prev_idx, cur_idx))
        })
        .filter(|(name, _, _)| *name != key)
        .collect();

    let prev_index = previous.index_by(prev_key);
    let cur_index = current.index_by(cur_key);

    let mut added = Vec::new();
    let mut changed = Vec::new();
    for (row_idx, row) in current.rows.iter().enumerate() {
        let id = row[cur_key].as_str();
        if cur_index.get(id) != Some(&row_idx) {
            continue;
        }
        let Some(&prev_row) = prev_index.get(id) else {
            added.push(row.clone());
            continue;
        };
        let old = &previous.rows[prev_row];
        let changes: Vec<FieldChange> = shared
            .iter()
            .filter(|(_, prev_idx, cur_idx)| old[*prev_idx] != row[*cur_idx])
            .map(|(name, prev_idx, cur_idx)| FieldChange {
                column: name.to_string(),
                previous: old[*prev_idx].clone(),
                current: row[*cur_idx].clone(),
            })
            .collect();
        if !changes.is_empty() {
            changed.push(ChangedRow {
                key: id.to_string(),
                changes,
            });
        }
    }

    let removed = previous
        .rows
        .iter()
        .enumerate()
        .filter(|(row_idx, row)| {
            let id = row[prev_key].as_str();
            prev_index.get(id) == Some(row_idx) && !cur_index.contains_key(id)
        })
        .map(|(_, row)| row.clone())
        .collect();

    Ok(MetadataDiff {
        key: key.to_string(),
        headers: current.headers.clone(),
        columns_added: cur_columns
            .difference(&prev_columns)
            .map(|name| name.to_string())
            .collect(),
        columns_removed: prev_columns
            .difference(&cur_columns)
            .map(|name| name.to_string())
            .collect(),
        added,
        removed,
        changed,
        previous_headers: previous.headers.clone(),
    })
}

impl MetadataDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.columns_added.is_empty()
            && self.columns_removed.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.columns_added.is_empty() {
            parts.push(format!("{} added", plural(self.columns_added.len(), "column")));
        }
        if !self.columns_removed.is_empty() {
            parts.push(format!(
                "{} removed",
                plural(self.columns_removed.len(), "column")
            ));
        }
        if !self.changed.is_empty() {
            parts.push(format!("{} changed", plural(self.changed.len(), "row")));
        }
        if !self.added.is_empty() {
            parts.push(format!("{} added", plural(self.added.len(), "row")));
        }
        if !self.removed.is_empty() {
            parts.push(format!("{} removed", plural(self.removed.len(), "row")));
        }
        parts.join(", ")
    }

    pub fn render_report(&self) -> String {
        let mut out = String::new();
        if self.is_empty() {
            return out;
        }
        let _ = writeln!(out, "{}", self.summary());
        if !self.columns_added.is_empty() {
            let _ = writeln!(out, "\n{} added\n", plural(self.columns_added.len(), "column"));
            for column in &self.columns_added {
                let _ = writeln!(out, "  {column}");
            }
        }
        if !self.columns_removed.is_empty() {
            let _ = writeln!(
                out,
                "\n{} removed\n",
                plural(self.columns_removed.len(), "column")
            );
            for column in &self.columns_removed {
                let _ = writeln!(out, "  {column}");
            }
        }
        if !self.changed.is_empty() {
            let _ = writeln!(out, "\n{} changed\n", plural(self.changed.len(), "row"));
            for row in &self.changed {
                let _ = writeln!(out, "  {}: {}", self.key, row.key);
                for change in &row.changes {
                    let _ = writeln!(
                        out,
                        "    {}: {:?} => {:?}",
                        change.column, change.previous, change.current
                    );
                }
                out.push('\n');
            }
        }
        for (label, rows, headers) in [
            ("added", &self.added, &self.headers),
            ("removed", &self.removed, &self.previous_headers),
        ] {
            if rows.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n{} {label}\n", plural(rows.len(), "row"));
            for row in rows {
                for (name, value) in headers.iter().zip(row) {
                    let _ = writeln!(out, "  {name}: {value}");
                }
                out.push('\n');
            }
        }
        out
    }

    /// Writes the added rows as TSV with the current header. Nothing at all is
    /// written when no rows were added.
    pub fn write_added_rows<W: Write>(&self, out: W) -> Result<usize, csv::Error> {
        if self.added.is_empty() {
            return Ok(0);
        }
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(out);
        writer.write_record(&self.headers)?;
        for row in &self.added {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(self.added.len())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn table(text: &str) -> Table {
        Table::read(Cursor::new(text.to_string()), "test").unwrap()
    }

    #[test]
    fn detects_added_removed_and_changed() {
        let previous = table(
            "strain\tgisaid_epi_isl\thost\n\
             A\tEPI_ISL_1\tHuman\n\
             B\tEPI_ISL_2\tHuman\n\
             C\tEPI_ISL_3\tHuman\n",
        );
        let current = table(
            "strain\tgisaid_epi_isl\thost\n\
             A\tEPI_ISL_1\tHuman\n\
             B\tEPI_ISL_2\tMink\n\
             D\tEPI_ISL_4\tHuman\n",
        );
        let diff = diff_tables(&previous, &current, "gisaid_epi_isl").unwrap();
        assert_eq!(diff.added, vec![vec!["D", "EPI_ISL_4", "Human"]]);
        assert_eq!(diff.removed, vec![vec!["C", "EPI_ISL_3", "Human"]]);
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].key, "EPI_ISL_2");
        assert_eq!(
            diff.changed[0].changes,
            vec![FieldChange {
                column: "host".to_string(),
                previous: "Human".to_string(),
                current: "Mink".to_string(),
            }]
        );
        assert_eq!(diff.summary(), "1 row changed, 1 row added, 1 row removed");
        let report = diff.render_report();
        assert!(report.contains("host: \"Human\" => \"Mink\""));
        assert!(report.contains("strain: D"));
    }

    #[test]
    fn identical_tables_have_empty_diff() {
        let text = "strain\tgisaid_epi_isl\nA\tEPI_ISL_1\n";
        let diff = diff_tables(&table(text), &table(text), "gisaid_epi_isl").unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.render_report(), "");
    }

    #[test]
    fn column_changes_are_reported() {
        let previous = table("gisaid_epi_isl\tage\nEPI_ISL_1\t3\n");
        let current = table("gisaid_epi_isl\tsex\nEPI_ISL_1\tMale\n");
        let diff = diff_tables(&previous, &current, "gisaid_epi_isl").unwrap();
        assert_eq!(diff.columns_added, vec!["sex"]);
        assert_eq!(diff.columns_removed, vec!["age"]);
        assert!(diff.changed.is_empty());
    }

    #[test]
    fn added_rows_tsv_has_header_only_when_nonempty() {
        let previous = table("gisaid_epi_isl\thost\nEPI_ISL_1\tHuman\n");
        let current = table("gisaid_epi_isl\thost\nEPI_ISL_1\tHuman\nEPI_ISL_2\tCat\n");

        let diff = diff_tables(&previous, &current, "gisaid_epi_isl").unwrap();
        let mut out = Vec::new();
        assert_eq!(diff.write_added_rows(&mut out).unwrap(), 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "gisaid_epi_isl\thost\nEPI_ISL_2\tCat\n"
        );

        let diff = diff_tables(&current, &current, "gisaid_epi_isl").unwrap();
        let mut out = Vec::new();
        assert_eq!(diff.write_added_rows(&mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let previous = table("strain\nA\n");
        assert!(diff_tables(&previous, &previous, "gisaid_epi_isl").is_err());
    }
}
