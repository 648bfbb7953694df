use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::LocationColumns;
use crate::data::model::Table;
use crate::error::{AnalysisError, Result};

/// Allowed deviation of the expected fractions' sum from 1.
pub const FRACTION_SUM_TOLERANCE: f64 = 1e-6;

/// Enrichment of one subcellular location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationEnrichment {
    pub location: String,
    pub observed_count: usize,
    pub observed_fraction: f64,
    pub expected_fraction: f64,
    /// `observed_fraction / expected_fraction`.
    pub score: f64,
}

/// One row per location, in the expected table's order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnrichmentScoreTable {
    pub rows: Vec<LocationEnrichment>,
}

impl EnrichmentScoreTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, location: &str) -> Option<&LocationEnrichment> {
        self.rows.iter().find(|r| r.location == location)
    }

    pub fn score(&self, location: &str) -> Option<f64> {
        self.get(location).map(|r| r.score)
    }
}

/// Score each location by how over-represented it is among the proteins.
///
/// A location observed in `proteins_with_locations` but missing from
/// `expected_fractions_of_locations` is an error; an expected location that
/// is never observed scores 0.
pub fn subcellular_enrichment_scores(
    proteins_with_locations: &Table,
    expected_fractions_of_locations: &Table,
    columns: &LocationColumns,
) -> Result<EnrichmentScoreTable> {
    let expected = read_expected_fractions(expected_fractions_of_locations, columns)?;
    let (counts, total) = count_locations(proteins_with_locations, columns)?;

    let known: HashSet<&str> = expected.iter().map(|(loc, _)| loc.as_str()).collect();
    if let Some(unknown) = counts.keys().find(|loc| !known.contains(loc.as_str())) {
        return Err(AnalysisError::MissingKey {
            table: expected_fractions_of_locations.name.clone(),
            key: unknown.clone(),
        });
    }

    let rows = expected
        .into_iter()
        .map(|(location, expected_fraction)| {
            let observed_count = counts.get(&location).copied().unwrap_or(0);
            let observed_fraction = observed_count as f64 / total as f64;
            LocationEnrichment {
                score: observed_fraction / expected_fraction,
                location,
                observed_count,
                observed_fraction,
                expected_fraction,
            }
        })
        .collect::<Vec<_>>();

    log::debug!(
        "enrichment: {total} proteins over {} observed locations, {} scored",
        counts.len(),
        rows.len()
    );
    Ok(EnrichmentScoreTable { rows })
}

/// Location → expected fraction, in table order, after validation.
fn read_expected_fractions(table: &Table, columns: &LocationColumns) -> Result<Vec<(String, f64)>> {
    table.require_columns(&[columns.location.as_str(), columns.expected_fraction.as_str()])?;
    if table.is_empty() {
        return Err(AnalysisError::EmptyTable(table.name.clone()));
    }

    let invalid = |row: usize, column: &str, reason: String| AnalysisError::InvalidValue {
        table: table.name.clone(),
        column: column.to_string(),
        row,
        reason,
    };

    let mut seen = HashSet::new();
    let mut expected = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let location = table
            .key(row, &columns.location)
            .ok_or_else(|| invalid(row, &columns.location, "location is missing".to_string()))?;
        if !seen.insert(location.clone()) {
            return Err(AnalysisError::DuplicateIndex {
                table: table.name.clone(),
                key: location,
            });
        }
        let fraction = match table.number(row, &columns.expected_fraction)? {
            Some(f) if f.is_finite() && f > 0.0 => f,
            Some(f) => {
                return Err(invalid(
                    row,
                    &columns.expected_fraction,
                    format!("expected fraction must be positive, got {f}"),
                ))
            }
            None => {
                return Err(invalid(
                    row,
                    &columns.expected_fraction,
                    "expected fraction is missing".to_string(),
                ))
            }
        };
        expected.push((location, fraction));
    }

    let sum: f64 = expected.iter().map(|(_, f)| f).sum();
    if (sum - 1.0).abs() > FRACTION_SUM_TOLERANCE {
        return Err(AnalysisError::InvalidValue {
            table: table.name.clone(),
            column: columns.expected_fraction.clone(),
            row: table.len() - 1,
            reason: format!("expected fractions sum to {sum}, not 1"),
        });
    }
    Ok(expected)
}

/// Distinct proteins per location and overall. Without a protein column
/// every row counts as one protein.
fn count_locations(table: &Table, columns: &LocationColumns) -> Result<(BTreeMap<String, usize>, usize)> {
    let mut required = vec![columns.location.as_str()];
    if let Some(protein_col) = &columns.protein {
        required.push(protein_col.as_str());
    }
    table.require_columns(&required)?;

    let mut members: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut all = BTreeSet::new();
    let mut skipped = 0usize;
    for row in 0..table.len() {
        let Some(location) = table.key(row, &columns.location) else {
            skipped += 1;
            continue;
        };
        let protein = match &columns.protein {
            Some(col) => match table.key(row, col) {
                Some(p) => p,
                None => {
                    skipped += 1;
                    continue;
                }
            },
            None => row.to_string(),
        };
        all.insert(protein.clone());
        members.entry(location).or_default().insert(protein);
    }
    if skipped > 0 {
        log::warn!("{skipped} rows of '{}' lack a location or protein and were skipped", table.name);
    }
    if all.is_empty() {
        return Err(AnalysisError::EmptyTable(table.name.clone()));
    }

    let counts = members.into_iter().map(|(loc, ps)| (loc, ps.len())).collect();
    Ok((counts, all.len()))
}
