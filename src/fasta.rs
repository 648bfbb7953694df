//! UniProt FASTA header parsing, used to normalise protein identifiers
//! before they become table keys.

use crate::data::model::Value;
use crate::error::{AnalysisError, Result};

const HEADER_FORMAT: &str = "It needs to follow the format: db|UniqueIdentifier|EntryName.";
const ENTRY_FORMAT: &str = "It needs to follow the format: ProteinName_SpeciesName.";

/// The three `|`-separated fields of a UniProt header such as
/// `sp|A0A096LP01|SIM26_HUMAN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaHeader {
    pub db: String,
    pub unique_identifier: String,
    pub entry_name: String,
}

pub fn parse_fasta_header(fasta_header: &str) -> Result<FastaHeader> {
    let fields: Vec<&str> = fasta_header.split('|').collect();
    let [db, unique_identifier, entry_name] = fields.as_slice() else {
        return Err(invalid(
            fasta_header,
            format!("expected 3 fields, got {}. {HEADER_FORMAT}", fields.len()),
        ));
    };
    if [db, unique_identifier, entry_name].iter().any(|f| f.is_empty()) {
        return Err(invalid(fasta_header, HEADER_FORMAT.to_string()));
    }
    Ok(FastaHeader {
        db: db.to_string(),
        unique_identifier: unique_identifier.to_string(),
        entry_name: entry_name.to_string(),
    })
}

/// Split the entry name `PROTEIN_SPECIES` into `(protein, species)`.
pub fn parse_fasta_header_uniprot_entry(fasta_header: &str) -> Result<(String, String)> {
    let header = parse_fasta_header(fasta_header)?;
    let fields: Vec<&str> = header.entry_name.split('_').collect();
    let [protein, species] = fields.as_slice() else {
        return Err(invalid(
            fasta_header,
            format!("expected 2 entry name fields, got {}. {ENTRY_FORMAT}", fields.len()),
        ));
    };
    if protein.is_empty() || species.is_empty() {
        return Err(invalid(fasta_header, ENTRY_FORMAT.to_string()));
    }
    Ok((protein.to_string(), species.to_string()))
}

/// The protein name of a UniProt header, e.g. `SIM26`.
pub fn parse_fasta_header_uniprot_protein(fasta_header: &str) -> Result<String> {
    parse_fasta_header_uniprot_entry(fasta_header).map(|(protein, _)| protein)
}

/// Cell-level adapter for [`crate::data::filter::update_column`]: string
/// headers become protein names, nulls stay null.
pub fn protein_name_cell(value: &Value) -> Result<Value> {
    match value {
        Value::String(s) => parse_fasta_header_uniprot_protein(s).map(Value::String),
        v if v.is_null() => Ok(Value::Null),
        other => Err(invalid(&other.to_string(), "not a text header".to_string())),
    }
}

fn invalid(header: &str, reason: String) -> AnalysisError {
    AnalysisError::InvalidFastaHeader {
        header: header.to_string(),
        reason,
    }
}
