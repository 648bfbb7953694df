use crate::error::{AnalysisError, Result};

use super::model::{Record, Table, Value};

// ---------------------------------------------------------------------------
// Row-shape transforms on generic tables
// ---------------------------------------------------------------------------

/// Split `column` on `sep` and emit one row per element, copying the other
/// cells. Non-string cells pass through unchanged; an empty string yields a
/// single Null row so no input row disappears.
///
/// Used to turn `"P1;P2"` protein groups into unique (peptide, protein) pairs.
pub fn explode(table: &Table, column: &str, sep: &str) -> Result<Table> {
    table.require_columns(&[column])?;
    if sep.is_empty() {
        return Err(AnalysisError::invalid_parameter("sep", "separator must not be empty"));
    }

    let mut rows = Vec::with_capacity(table.len());
    for record in &table.rows {
        match record.get(column) {
            Some(Value::String(s)) => {
                let parts: Vec<&str> = s.split(sep).map(str::trim).filter(|p| !p.is_empty()).collect();
                if parts.is_empty() {
                    rows.push(with_cell(record, column, Value::Null));
                }
                for part in parts {
                    rows.push(with_cell(record, column, Value::from(part)));
                }
            }
            _ => rows.push(record.clone()),
        }
    }

    log::debug!("explode '{column}': {} rows -> {} rows", table.len(), rows.len());
    Ok(Table::new(table.name.clone(), table.column_names.clone(), rows))
}

/// Map every cell of `column` through `update`. The first failure aborts the
/// whole call; no partial table is returned.
pub fn update_column<F>(table: &Table, column: &str, update: F) -> Result<Table>
where
    F: Fn(&Value) -> Result<Value>,
{
    table.require_columns(&[column])?;
    let rows = table
        .rows
        .iter()
        .map(|record| {
            let updated = update(record.get(column).unwrap_or(&Value::Null))?;
            Ok(with_cell(record, column, updated))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Table::new(table.name.clone(), table.column_names.clone(), rows))
}

/// Return a copy without the rows that hold a null in any of `columns`.
pub fn drop_nulls(table: &Table, columns: &[&str]) -> Result<Table> {
    table.require_columns(columns)?;
    let rows: Vec<Record> = table
        .rows
        .iter()
        .filter(|record| {
            columns
                .iter()
                .all(|c| record.get(*c).is_some_and(|v| !v.is_null()))
        })
        .cloned()
        .collect();
    if rows.len() < table.len() {
        log::debug!(
            "dropped {} rows with nulls from '{}'",
            table.len() - rows.len(),
            table.name
        );
    }
    Ok(Table::new(table.name.clone(), table.column_names.clone(), rows))
}

fn with_cell(record: &Record, column: &str, value: Value) -> Record {
    let mut out = record.clone();
    out.insert(column.to_string(), value);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, Value)]) -> Table {
        let records = rows
            .iter()
            .map(|(pep, prot)| {
                let mut r = Record::new();
                r.insert("Peptide".into(), Value::from(*pep));
                r.insert("Protein".into(), prot.clone());
                r
            })
            .collect();
        Table::from_records("peptides", records)
    }

    #[test]
    fn explode_splits_protein_groups() {
        let t = table(&[("AAK", Value::from("P1;P2")), ("CCR", Value::from("P3"))]);
        let out = explode(&t, "Protein", ";").unwrap();
        let proteins: Vec<_> = (0..out.len()).map(|i| out.key(i, "Protein").unwrap()).collect();
        assert_eq!(proteins, vec!["P1", "P2", "P3"]);
        assert_eq!(out.key(1, "Peptide").as_deref(), Some("AAK"));
        // input untouched
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn explode_keeps_nulls_and_empty_strings() {
        let t = table(&[("AAK", Value::Null), ("CCR", Value::from(""))]);
        let out = explode(&t, "Protein", ";").unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.value(1, "Protein").is_null());
    }

    #[test]
    fn update_column_maps_cells() {
        let t = table(&[("AAK", Value::from("p1"))]);
        let out = update_column(&t, "Protein", |v| Ok(Value::from(v.to_string().to_uppercase()))).unwrap();
        assert_eq!(out.key(0, "Protein").as_deref(), Some("P1"));
    }

    #[test]
    fn update_column_requires_the_column() {
        let t = table(&[("AAK", Value::from("p1"))]);
        let err = update_column(&t, "Gene", |v| Ok(v.clone())).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingColumn { ref column, .. } if column == "Gene"));
    }

    #[test]
    fn drop_nulls_filters_rows() {
        let t = table(&[("AAK", Value::Null), ("CCR", Value::from("P3"))]);
        let out = drop_nulls(&t, &["Protein"]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.key(0, "Peptide").as_deref(), Some("CCR"));
    }
}
