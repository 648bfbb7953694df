use peptide_hits::algorithms::{
    detect_outliers, get_hits_for_proteins, subcellular_enrichment_scores, OutlierDetector,
};
use peptide_hits::config::{LocationColumns, PeptideColumns};
use peptide_hits::data::model::{IntensityTable, OutlierFlagTable, Record, Table, Value};
use proptest::prelude::*;

fn intensity_rows() -> impl Strategy<Value = Vec<Vec<Option<f64>>>> {
    (1usize..6).prop_flat_map(|n_samples| {
        prop::collection::vec(
            prop::collection::vec(prop::option::weighted(0.85, 1.0f64..1e6), n_samples),
            1..12,
        )
    })
}

fn table(rows: Vec<Vec<Option<f64>>>) -> IntensityTable {
    let n = rows[0].len();
    IntensityTable::from_values(
        (0..rows.len()).map(|i| format!("pep{i}")).collect(),
        (0..n).map(|j| format!("S{j}")).collect(),
        rows,
    )
    .unwrap()
}

/// Straightforward reference: mean and n-1 standard deviation per row.
fn reference_flags(row: &[Option<f64>], k: f64) -> Vec<Option<bool>> {
    let present: Vec<f64> = row.iter().flatten().copied().collect();
    let n = present.len() as f64;
    row.iter()
        .map(|cell| {
            let v = (*cell)?;
            if present.len() < 2 || present.iter().all(|&x| x == present[0]) {
                return Some(false);
            }
            let mean = present.iter().sum::<f64>() / n;
            let var = present.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            let sd = var.sqrt();
            Some(v > mean + k * sd || v < mean - k * sd)
        })
        .collect()
}

fn mapping(pairs: &[(String, String)]) -> Table {
    let records = pairs
        .iter()
        .map(|(pep, prot)| {
            let mut r = Record::new();
            r.insert("Peptide".into(), Value::from(pep.as_str()));
            r.insert("Protein".into(), Value::from(prot.as_str()));
            r
        })
        .collect();
    Table::from_records("peptides", records)
}

proptest! {
    #[test]
    fn flags_match_reference(rows in intensity_rows(), k in 0.5f64..3.0) {
        let t = table(rows.clone());
        let flags = OutlierDetector::new(k).unwrap().detect(&t);
        for (i, row) in rows.iter().enumerate() {
            prop_assert_eq!(flags.row_at(i).to_vec(), reference_flags(row, k));
        }
    }

    #[test]
    fn constant_rows_never_flag(
        value in 1e-6f64..1e9,
        n in 2usize..9,
        k in 0.01f64..3.0,
    ) {
        let t = table(vec![vec![Some(value); n]]);
        let detector = OutlierDetector::new(k).unwrap();
        prop_assert_eq!(detector.detect(&t).count_flagged(), 0);
        let (above, below) = detector.detect_split(&t);
        prop_assert_eq!(above.count_flagged() + below.count_flagged(), 0);
    }

    #[test]
    fn split_union_equals_combined(rows in intensity_rows()) {
        let t = table(rows);
        let combined = detect_outliers(&t, false).into_combined().unwrap();
        let recombined = detect_outliers(&t, true).into_combined().unwrap();
        prop_assert_eq!(combined, recombined);
    }

    #[test]
    fn missing_cells_never_flagged(rows in intensity_rows()) {
        let t = table(rows.clone());
        let flags = detect_outliers(&t, false).into_combined().unwrap();
        for (i, row) in rows.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                prop_assert_eq!(cell.is_none(), flags.row_at(i)[j].is_none());
            }
        }
    }

    #[test]
    fn raising_min_peptides_never_adds_proteins(
        assignment in prop::collection::vec(0usize..6, 1..30),
        flagged in prop::collection::vec(any::<bool>(), 30),
        low in 0usize..5,
        step in 0usize..4,
    ) {
        let pairs: Vec<(String, String)> = assignment
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("pep{i}"), format!("prot{p}")))
            .collect();
        let flags = OutlierFlagTable::new(
            pairs.iter().map(|(pep, _)| pep.clone()).collect(),
            vec!["S1".to_string()],
            (0..pairs.len()).map(|i| vec![Some(flagged[i])]).collect(),
        ).unwrap();
        let df = mapping(&pairs);
        let columns = PeptideColumns::default();

        let loose = get_hits_for_proteins(&flags, &df, &columns, low).unwrap();
        let strict = get_hits_for_proteins(&flags, &df, &columns, low + step).unwrap();
        prop_assert!(strict.len() <= loose.len());
        for row in &strict.rows {
            prop_assert!(row.num_peptides >= low + step);
            prop_assert!(loose.get(&row.protein).is_some());
        }
    }

    #[test]
    fn weighted_scores_reproduce_observed_total(counts in prop::collection::vec(0usize..50, 2..6)) {
        prop_assume!(counts.iter().sum::<usize>() > 0);
        let n = counts.len();
        let mut proteins = Vec::new();
        let mut expected = Vec::new();
        for (l, &count) in counts.iter().enumerate() {
            for i in 0..count {
                let mut r = Record::new();
                r.insert("Protein".into(), Value::from(format!("L{l}P{i}")));
                r.insert("Main location".into(), Value::from(format!("L{l}")));
                proteins.push(r);
            }
            let mut e = Record::new();
            e.insert("Main location".into(), Value::from(format!("L{l}")));
            e.insert("Expected fraction".into(), Value::Float(1.0 / n as f64));
            expected.push(e);
        }
        let scores = subcellular_enrichment_scores(
            &Table::from_records("proteins", proteins),
            &Table::from_records("expected", expected),
            &LocationColumns::default(),
        ).unwrap();
        let total: f64 = scores.rows.iter().map(|r| r.score * r.expected_fraction).sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
        prop_assert_eq!(scores.len(), n);
    }
}
