use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value as JsonValue};

use crate::algorithms::{EnrichmentScoreTable, ProteinHitTable};

use super::model::Frame;

// ---------------------------------------------------------------------------
// Tabular – anything that can be written as header + string rows
// ---------------------------------------------------------------------------

/// A result table flattened to a header and rows of cells. `None` cells are
/// written empty (CSV) or as `null` (JSON).
pub trait Tabular {
    fn header(&self) -> Vec<String>;
    fn records(&self) -> Vec<Vec<Option<JsonValue>>>;
}

impl<T: Clone + Into<JsonValue>> Tabular for Frame<T> {
    fn header(&self) -> Vec<String> {
        std::iter::once("Peptide".to_string())
            .chain(self.samples().iter().cloned())
            .collect()
    }

    fn records(&self) -> Vec<Vec<Option<JsonValue>>> {
        self.rows()
            .map(|(key, cells)| {
                std::iter::once(Some(JsonValue::from(key)))
                    .chain(cells.iter().map(|c| c.clone().map(Into::into)))
                    .collect()
            })
            .collect()
    }
}

impl Tabular for ProteinHitTable {
    /// `Protein, NumPeptides, <sample> hits..., <sample> fraction...`
    fn header(&self) -> Vec<String> {
        let mut header = vec!["Protein".to_string(), "NumPeptides".to_string()];
        header.extend(self.samples.iter().map(|s| format!("{s} hits")));
        header.extend(self.samples.iter().map(|s| format!("{s} fraction")));
        header
    }

    fn records(&self) -> Vec<Vec<Option<JsonValue>>> {
        self.rows
            .iter()
            .map(|r| {
                let mut row = vec![
                    Some(JsonValue::from(r.protein.as_str())),
                    Some(JsonValue::from(r.num_peptides)),
                ];
                row.extend(r.hits.iter().map(|&h| Some(JsonValue::from(h))));
                row.extend(r.fractions.iter().map(|&f| Some(JsonValue::from(f))));
                row
            })
            .collect()
    }
}

impl Tabular for EnrichmentScoreTable {
    fn header(&self) -> Vec<String> {
        ["Main location", "Observed count", "Observed fraction", "Expected fraction", "Enrichment score"]
            .map(String::from)
            .to_vec()
    }

    fn records(&self) -> Vec<Vec<Option<JsonValue>>> {
        self.rows
            .iter()
            .map(|r| {
                vec![
                    Some(JsonValue::from(r.location.as_str())),
                    Some(JsonValue::from(r.observed_count)),
                    Some(JsonValue::from(r.observed_fraction)),
                    Some(JsonValue::from(r.expected_fraction)),
                    Some(JsonValue::from(r.score)),
                ]
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write a result table, dispatching by extension (`.csv`, `.tsv`, `.json`).
/// An unsupported extension is rejected before the file is created.
pub fn write_table(path: &Path, table: &dyn Tabular) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let delimiter = match ext.as_str() {
        "csv" => Some(b','),
        "tsv" | "txt" => Some(b'\t'),
        "json" => None,
        other => bail!("Unsupported output extension: .{other}"),
    };

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let writer = std::io::BufWriter::new(file);
    let written = match delimiter {
        Some(d) => write_delimited(writer, table, d),
        None => write_json(writer, table),
    };
    let n_rows = written.with_context(|| format!("writing {}", path.display()))?;

    log::info!("wrote {n_rows} rows to {}", path.display());
    Ok(())
}

/// Header line plus one line per record. Returns the number of records.
pub fn write_delimited<W: Write>(writer: W, table: &dyn Tabular, delimiter: u8) -> Result<usize> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    csv_writer.write_record(table.header())?;
    let records = table.records();
    for record in &records {
        csv_writer.write_record(record.iter().map(|cell| match cell {
            None | Some(JsonValue::Null) => String::new(),
            Some(JsonValue::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }))?;
    }
    csv_writer.flush()?;
    Ok(records.len())
}

/// Records-oriented JSON, the same shape the loader reads back.
pub fn write_json<W: Write>(writer: W, table: &dyn Tabular) -> Result<usize> {
    let header = table.header();
    let records: Vec<JsonValue> = table
        .records()
        .into_iter()
        .map(|cells| {
            let obj: Map<String, JsonValue> = header
                .iter()
                .cloned()
                .zip(cells.into_iter().map(|c| c.unwrap_or(JsonValue::Null)))
                .collect();
            JsonValue::Object(obj)
        })
        .collect();
    serde_json::to_writer_pretty(writer, &records)?;
    Ok(records.len())
}
