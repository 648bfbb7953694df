use std::collections::{BTreeMap, BTreeSet};

use crate::config::PeptideColumns;
use crate::data::model::{IntensityTable, OutlierFlagTable, Table};
use crate::error::{AnalysisError, Result};
use crate::transform::Pipeline;

use super::outliers::{OutlierDetector, Outliers};

// ---------------------------------------------------------------------------
// PeptideProteinMap
// ---------------------------------------------------------------------------

/// Unique (peptide, protein) pairs plus the evidence count of each protein.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeptideProteinMap {
    proteins_by_peptide: BTreeMap<String, BTreeSet<String>>,
    num_peptides: BTreeMap<String, usize>,
}

impl PeptideProteinMap {
    /// Extract the mapping from a peptide table.
    ///
    /// Rows with a null peptide are skipped, as [`pivot_intensities`] skips
    /// them. A peptide with a null protein is an error. When
    /// `columns.num_peptides` is set, that column supplies the count of each
    /// protein and every row of a protein must agree on it; otherwise the
    /// distinct mapped peptides are counted.
    pub fn from_table(peptide_df: &Table, columns: &PeptideColumns) -> Result<Self> {
        let mut required = vec![columns.peptide.as_str(), columns.protein.as_str()];
        if let Some(count_col) = &columns.num_peptides {
            required.push(count_col.as_str());
        }
        peptide_df.require_columns(&required)?;

        let mut map = PeptideProteinMap::default();
        let mut skipped = 0usize;
        for row in 0..peptide_df.len() {
            let Some(peptide) = peptide_df.key(row, &columns.peptide) else {
                skipped += 1;
                continue;
            };
            let protein = peptide_df
                .key(row, &columns.protein)
                .ok_or_else(|| AnalysisError::InvalidValue {
                    table: peptide_df.name.clone(),
                    column: columns.protein.clone(),
                    row,
                    reason: format!("peptide '{peptide}' has no protein"),
                })?;

            if let Some(count_col) = &columns.num_peptides {
                let count = read_count(peptide_df, row, count_col)?;
                match map.num_peptides.get(&protein) {
                    Some(&known) if known != count => {
                        return Err(AnalysisError::InvalidValue {
                            table: peptide_df.name.clone(),
                            column: count_col.clone(),
                            row,
                            reason: format!(
                                "protein '{protein}' has peptide count {count} here but {known} earlier"
                            ),
                        });
                    }
                    Some(_) => {}
                    None => {
                        map.num_peptides.insert(protein.clone(), count);
                    }
                }
            }
            map.proteins_by_peptide
                .entry(peptide)
                .or_default()
                .insert(protein);
        }
        if skipped > 0 {
            log::warn!(
                "{skipped} rows of '{}' have no peptide and were not mapped",
                peptide_df.name
            );
        }

        if columns.num_peptides.is_none() {
            for proteins in map.proteins_by_peptide.values() {
                for protein in proteins {
                    *map.num_peptides.entry(protein.clone()).or_default() += 1;
                }
            }
        }
        Ok(map)
    }

    pub fn proteins_of(&self, peptide: &str) -> Option<&BTreeSet<String>> {
        self.proteins_by_peptide.get(peptide)
    }

    pub fn num_peptides(&self, protein: &str) -> Option<usize> {
        self.num_peptides.get(protein).copied()
    }

    pub fn n_proteins(&self) -> usize {
        self.num_peptides.len()
    }
}

fn read_count(table: &Table, row: usize, column: &str) -> Result<usize> {
    let invalid = |reason: String| AnalysisError::InvalidValue {
        table: table.name.clone(),
        column: column.to_string(),
        row,
        reason,
    };
    match table.number(row, column)? {
        Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
        Some(v) => Err(invalid(format!("peptide count {v} is not a non-negative integer"))),
        None => Err(invalid("peptide count is missing".to_string())),
    }
}

// ---------------------------------------------------------------------------
// ProteinHitTable
// ---------------------------------------------------------------------------

/// Outlier evidence of one protein.
#[derive(Debug, Clone, PartialEq)]
pub struct ProteinHit {
    pub protein: String,
    pub num_peptides: usize,
    /// Per sample: peptides of this protein flagged as outliers.
    pub hits: Vec<usize>,
    /// Per sample: `hits / num_peptides`.
    pub fractions: Vec<f64>,
}

/// One row per protein, sorted by protein identifier; sample order follows
/// the outlier table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProteinHitTable {
    pub samples: Vec<String>,
    pub rows: Vec<ProteinHit>,
}

impl ProteinHitTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, protein: &str) -> Option<&ProteinHit> {
        self.rows.iter().find(|r| r.protein == protein)
    }

    pub fn proteins(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.protein.as_str())
    }
}

/// Aggregate peptide outlier flags into protein hit counts.
///
/// Proteins with fewer than `min_peptides` peptides are left out entirely.
/// Of the rest, every protein with at least one peptide in
/// `outlier_peptide_intensities` gets a row. A peptide that `peptide_df`
/// does not map is a data-contract error.
pub fn get_hits_for_proteins(
    outlier_peptide_intensities: &OutlierFlagTable,
    peptide_df: &Table,
    columns: &PeptideColumns,
    min_peptides: usize,
) -> Result<ProteinHitTable> {
    let mapping = PeptideProteinMap::from_table(peptide_df, columns)?;
    aggregate_hits(outlier_peptide_intensities, &mapping, min_peptides, &peptide_df.name)
}

/// [`get_hits_for_proteins`] with an already-built mapping.
pub fn aggregate_hits(
    outliers: &OutlierFlagTable,
    mapping: &PeptideProteinMap,
    min_peptides: usize,
    mapping_name: &str,
) -> Result<ProteinHitTable> {
    let n_samples = outliers.n_samples();
    let mut hits: BTreeMap<&str, Vec<usize>> = BTreeMap::new();

    for (peptide, flags) in outliers.rows() {
        let proteins = mapping
            .proteins_of(peptide)
            .ok_or_else(|| AnalysisError::MissingKey {
                table: mapping_name.to_string(),
                key: peptide.to_string(),
            })?;
        for protein in proteins {
            if mapping.num_peptides(protein).unwrap_or(0) < min_peptides {
                continue;
            }
            let counts = hits
                .entry(protein.as_str())
                .or_insert_with(|| vec![0; n_samples]);
            for (count, flag) in counts.iter_mut().zip(flags) {
                if *flag == Some(true) {
                    *count += 1;
                }
            }
        }
    }

    let rows: Vec<ProteinHit> = hits
        .into_iter()
        .map(|(protein, hits)| {
            let num_peptides = mapping.num_peptides(protein).unwrap_or(0);
            let fractions = hits
                .iter()
                .map(|&h| if num_peptides == 0 { 0.0 } else { h as f64 / num_peptides as f64 })
                .collect();
            ProteinHit {
                protein: protein.to_string(),
                num_peptides,
                hits,
                fractions,
            }
        })
        .collect();

    log::debug!(
        "hit aggregation: {} peptides -> {} proteins with >= {min_peptides} peptides (of {} mapped)",
        outliers.len(),
        rows.len(),
        mapping.n_proteins()
    );
    Ok(ProteinHitTable {
        samples: outliers.samples().to_vec(),
        rows,
    })
}

// ---------------------------------------------------------------------------
// Preparation: long peptide table → peptide × sample intensities
// ---------------------------------------------------------------------------

/// Pivot the long peptide table into a peptide × sample intensity table.
///
/// Duplicate (peptide, sample) measurements are averaged; null intensities
/// are skipped. Rows and columns come out sorted.
pub fn pivot_intensities(peptide_df: &Table, columns: &PeptideColumns) -> Result<IntensityTable> {
    peptide_df.require_columns(&[
        columns.peptide.as_str(),
        columns.sample.as_str(),
        columns.intensity.as_str(),
    ])?;

    let mut sums: BTreeMap<String, BTreeMap<String, (f64, usize)>> = BTreeMap::new();
    let mut samples: BTreeSet<String> = BTreeSet::new();
    for row in 0..peptide_df.len() {
        let (Some(peptide), Some(sample)) = (
            peptide_df.key(row, &columns.peptide),
            peptide_df.key(row, &columns.sample),
        ) else {
            continue;
        };
        samples.insert(sample.clone());
        let Some(intensity) = peptide_df.number(row, &columns.intensity)? else {
            sums.entry(peptide).or_default();
            continue;
        };
        let cell = sums.entry(peptide).or_default().entry(sample).or_insert((0.0, 0));
        cell.0 += intensity;
        cell.1 += 1;
    }

    let samples: Vec<String> = samples.into_iter().collect();
    let mut index = Vec::with_capacity(sums.len());
    let mut values = Vec::with_capacity(sums.len());
    for (peptide, by_sample) in sums {
        values.push(
            samples
                .iter()
                .map(|s| by_sample.get(s).map(|(sum, n)| sum / *n as f64))
                .collect(),
        );
        index.push(peptide);
    }
    IntensityTable::from_values(index, samples, values)
}

// ---------------------------------------------------------------------------
// hit_selection – the full peptide → protein pipeline
// ---------------------------------------------------------------------------

/// Result of [`hit_selection`].
#[derive(Debug, Clone, PartialEq)]
pub enum HitSelection {
    Combined(ProteinHitTable),
    Split {
        above: ProteinHitTable,
        below: ProteinHitTable,
    },
}

/// Builder for the pivot → preprocess → detect → aggregate pipeline.
#[derive(Debug, Clone, Default)]
pub struct HitSelector {
    columns: PeptideColumns,
    preprocessing: Pipeline,
    detector: OutlierDetector,
    min_peptides: usize,
    split_above_below: bool,
}

impl HitSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: PeptideColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn preprocessing(mut self, pipeline: Pipeline) -> Self {
        self.preprocessing = pipeline;
        self
    }

    pub fn std_multiplier(mut self, k: f64) -> Result<Self> {
        self.detector = OutlierDetector::new(k)?;
        Ok(self)
    }

    pub fn min_peptides(mut self, min_peptides: usize) -> Self {
        self.min_peptides = min_peptides;
        self
    }

    pub fn split_above_below(mut self, split: bool) -> Self {
        self.split_above_below = split;
        self
    }

    /// Run the whole pipeline on a long peptide table.
    pub fn run(&self, peptide_df: &Table) -> Result<HitSelection> {
        self.run_with_mapping(peptide_df, peptide_df)
    }

    /// Run the pipeline with the peptide→protein mapping taken from a
    /// separate table, e.g. a spectral-library export.
    pub fn run_with_mapping(&self, peptide_df: &Table, mapping_df: &Table) -> Result<HitSelection> {
        let mapping = PeptideProteinMap::from_table(mapping_df, &self.columns)?;
        let intensities = pivot_intensities(peptide_df, &self.columns)?;
        let intensities = self.preprocessing.apply(&intensities);
        let aggregate = |flags: &OutlierFlagTable| {
            aggregate_hits(flags, &mapping, self.min_peptides, &mapping_df.name)
        };

        match self.detector.run(&intensities, self.split_above_below) {
            Outliers::Combined(flags) => Ok(HitSelection::Combined(aggregate(&flags)?)),
            Outliers::Split { above, below } => Ok(HitSelection::Split {
                above: aggregate(&above)?,
                below: aggregate(&below)?,
            }),
        }
    }
}

/// Pivot, detect outliers and aggregate to proteins in one call, with the
/// default multiplier and no preprocessing.
pub fn hit_selection(
    peptide_df: &Table,
    columns: &PeptideColumns,
    min_peptides: usize,
    split_above_below: bool,
) -> Result<HitSelection> {
    HitSelector::new()
        .columns(columns.clone())
        .min_peptides(min_peptides)
        .split_above_below(split_above_below)
        .run(peptide_df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Record, Value};

    fn long_table(rows: &[(&str, &str, &str, Option<f64>)]) -> Table {
        let records = rows
            .iter()
            .map(|(pep, prot, sample, intensity)| {
                let mut r = Record::new();
                r.insert("Peptide".into(), Value::from(*pep));
                r.insert("Protein".into(), Value::from(*prot));
                r.insert("Sample".into(), Value::from(*sample));
                r.insert("Intensity".into(), Value::from(*intensity));
                r
            })
            .collect();
        Table::from_records("peptides", records)
    }

    fn flags(rows: &[(&str, Vec<Option<bool>>)]) -> OutlierFlagTable {
        let n = rows[0].1.len();
        OutlierFlagTable::new(
            rows.iter().map(|(k, _)| k.to_string()).collect(),
            (1..=n).map(|j| format!("S{j}")).collect(),
            rows.iter().map(|(_, v)| v.clone()).collect(),
        )
        .unwrap()
    }

    fn mapping_table(pairs: &[(&str, &str)]) -> Table {
        let rows: Vec<_> = pairs.iter().map(|(pep, prot)| (*pep, *prot, "S1", None)).collect();
        long_table(&rows)
    }

    #[test]
    fn min_peptides_excludes_thin_proteins() {
        let outliers = flags(&[
            ("a1", vec![Some(true)]),
            ("a2", vec![Some(true)]),
            ("a3", vec![Some(false)]),
            ("b1", vec![Some(true)]),
        ]);
        let peptides = mapping_table(&[("a1", "ProtA"), ("a2", "ProtA"), ("a3", "ProtA"), ("b1", "ProtB")]);
        let hits = get_hits_for_proteins(&outliers, &peptides, &PeptideColumns::default(), 2).unwrap();
        assert_eq!(hits.proteins().collect::<Vec<_>>(), vec!["ProtA"]);
        let a = hits.get("ProtA").unwrap();
        assert_eq!(a.num_peptides, 3);
        assert_eq!(a.hits, vec![2]);
        assert!((a.fractions[0] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn rows_sorted_by_protein() {
        let outliers = flags(&[("p1", vec![Some(true), None]), ("p2", vec![Some(false), Some(true)])]);
        let peptides = mapping_table(&[("p1", "Zeta"), ("p2", "Alpha")]);
        let hits = get_hits_for_proteins(&outliers, &peptides, &PeptideColumns::default(), 1).unwrap();
        assert_eq!(hits.proteins().collect::<Vec<_>>(), vec!["Alpha", "Zeta"]);
        assert_eq!(hits.get("Zeta").unwrap().hits, vec![1, 0]);
        assert_eq!(hits.samples, vec!["S1", "S2"]);
    }

    #[test]
    fn shared_peptide_counts_for_every_protein() {
        let outliers = flags(&[("p1", vec![Some(true)])]);
        let peptides = mapping_table(&[("p1", "A"), ("p1", "B")]);
        let hits = get_hits_for_proteins(&outliers, &peptides, &PeptideColumns::default(), 1).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.rows.iter().all(|r| r.hits == vec![1]));
    }

    #[test]
    fn unmapped_peptide_is_an_error() {
        let outliers = flags(&[("p1", vec![Some(true)]), ("ghost", vec![Some(false)])]);
        let peptides = mapping_table(&[("p1", "A")]);
        let err = get_hits_for_proteins(&outliers, &peptides, &PeptideColumns::default(), 1).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::MissingKey {
                table: "peptides".into(),
                key: "ghost".into()
            }
        );
    }

    #[test]
    fn missing_protein_column_is_reported() {
        let outliers = flags(&[("p1", vec![Some(true)])]);
        let columns = PeptideColumns {
            protein: "ProteinAccession".into(),
            ..PeptideColumns::default()
        };
        let err = get_hits_for_proteins(&outliers, &mapping_table(&[("p1", "A")]), &columns, 1).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingColumn { ref column, .. } if column == "ProteinAccession"));
    }

    #[test]
    fn precomputed_peptide_counts_are_used() {
        let mut records = Vec::new();
        for (pep, prot, n) in [("p1", "A", 5i64), ("p2", "B", 1)] {
            let mut r = Record::new();
            r.insert("Peptide".into(), Value::from(pep));
            r.insert("Protein".into(), Value::from(prot));
            r.insert("NumPeptides".into(), Value::Integer(n));
            records.push(r);
        }
        let peptides = Table::from_records("peptides", records);
        let columns = PeptideColumns {
            num_peptides: Some("NumPeptides".into()),
            ..PeptideColumns::default()
        };
        let outliers = flags(&[("p1", vec![Some(true)]), ("p2", vec![Some(true)])]);
        let hits = get_hits_for_proteins(&outliers, &peptides, &columns, 2).unwrap();
        assert_eq!(hits.proteins().collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(hits.get("A").unwrap().fractions, vec![0.2]);
    }

    #[test]
    fn conflicting_peptide_counts_are_rejected() {
        let mut records = Vec::new();
        for (pep, n) in [("p1", 5i64), ("p2", 1)] {
            let mut r = Record::new();
            r.insert("Peptide".into(), Value::from(pep));
            r.insert("Protein".into(), Value::from("A"));
            r.insert("NumPeptides".into(), Value::Integer(n));
            records.push(r);
        }
        let peptides = Table::from_records("peptides", records);
        let columns = PeptideColumns {
            num_peptides: Some("NumPeptides".into()),
            ..PeptideColumns::default()
        };
        let outliers = flags(&[("p1", vec![Some(true)]), ("p2", vec![Some(true)])]);
        let err = get_hits_for_proteins(&outliers, &peptides, &columns, 2).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidValue { ref column, row: 1, .. } if column == "NumPeptides"
        ));
    }

    #[test]
    fn repeated_equal_peptide_counts_are_accepted() {
        let mut records = Vec::new();
        for pep in ["p1", "p2"] {
            let mut r = Record::new();
            r.insert("Peptide".into(), Value::from(pep));
            r.insert("Protein".into(), Value::from("A"));
            r.insert("NumPeptides".into(), Value::Integer(4));
            records.push(r);
        }
        let columns = PeptideColumns {
            num_peptides: Some("NumPeptides".into()),
            ..PeptideColumns::default()
        };
        let map = PeptideProteinMap::from_table(&Table::from_records("peptides", records), &columns).unwrap();
        assert_eq!(map.num_peptides("A"), Some(4));
    }

    #[test]
    fn peptide_without_protein_is_rejected() {
        let mut t = long_table(&[
            ("p1", "A", "S1", Some(1.0)),
            ("p1", "A", "S2", Some(2.0)),
            ("x", "A", "S1", Some(3.0)),
            ("x", "A", "S2", Some(4.0)),
        ]);
        for r in t.rows.iter_mut().filter(|r| r.get("Peptide") == Some(&Value::from("x"))) {
            r.insert("Protein".into(), Value::Null);
        }
        let err = hit_selection(&t, &PeptideColumns::default(), 1, false).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidValue { ref table, ref column, row: 2, .. }
                if table == "peptides" && column == "Protein"
        ));
    }

    #[test]
    fn rows_without_peptide_are_skipped_everywhere() {
        let mut t = long_table(&[
            ("p1", "A", "S1", Some(1.0)),
            ("p1", "A", "S2", Some(2.0)),
            ("gone", "B", "S1", Some(3.0)),
        ]);
        t.rows[2].insert("Peptide".into(), Value::Null);
        let HitSelection::Combined(hits) = hit_selection(&t, &PeptideColumns::default(), 1, false).unwrap() else {
            panic!("expected combined result");
        };
        assert_eq!(hits.proteins().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn pivot_averages_duplicates_and_sorts() {
        let t = long_table(&[
            ("pB", "X", "S2", Some(4.0)),
            ("pA", "X", "S1", Some(1.0)),
            ("pA", "X", "S1", Some(3.0)),
            ("pB", "X", "S1", None),
        ]);
        let pivot = pivot_intensities(&t, &PeptideColumns::default()).unwrap();
        assert_eq!(pivot.index(), &["pA", "pB"]);
        assert_eq!(pivot.samples(), &["S1", "S2"]);
        assert_eq!(pivot.row("pA").unwrap(), &[Some(2.0), None]);
        assert_eq!(pivot.row("pB").unwrap(), &[None, Some(4.0)]);
    }

    #[test]
    fn hit_selection_split_reports_direction() {
        let mut rows = Vec::new();
        for (sample, hi, lo) in [("S1", 10.0, 100.0), ("S2", 12.0, 98.0), ("S3", 11.0, 101.0), ("S4", 50.0, 5.0)] {
            rows.push(("up1", "Up", sample, Some(hi)));
            rows.push(("down1", "Down", sample, Some(lo)));
        }
        let t = long_table(&rows);
        let HitSelection::Split { above, below } =
            hit_selection(&t, &PeptideColumns::default(), 1, true).unwrap()
        else {
            panic!("expected split result");
        };
        assert_eq!(above.get("Up").unwrap().hits, vec![0, 0, 0, 1]);
        assert_eq!(above.get("Down").unwrap().hits, vec![0, 0, 0, 0]);
        assert_eq!(below.get("Down").unwrap().hits, vec![0, 0, 0, 1]);
    }

    #[test]
    fn selector_rejects_bad_multiplier() {
        assert!(HitSelector::new().std_multiplier(-2.0).is_err());
    }
}
