//! Intensity-table transforms.
//!
//! Every transform is a pure `&IntensityTable -> IntensityTable` function.
//! Modes are closed enums; parsing an unknown mode name fails with
//! [`AnalysisError::InvalidParameter`] listing the accepted names.
//! [`Pipeline`] chains transforms explicitly, in order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::algorithms::stats::{mean, median, present};
use crate::data::model::IntensityTable;
use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Log scaling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogBase {
    Ten,
    Two,
    Natural,
}

impl LogBase {
    fn apply(self, x: f64) -> f64 {
        match self {
            LogBase::Ten => x.log10(),
            LogBase::Two => x.log2(),
            LogBase::Natural => x.ln(),
        }
    }
}

/// Log-transform every present value.
///
/// Values below 1 would go negative (or to -inf at zero): with
/// `filter_outliers` they become missing, otherwise they are clamped to 1.
pub fn log_scaling(table: &IntensityTable, base: LogBase, filter_outliers: bool) -> IntensityTable {
    table.map_rows(|row| {
        row.iter()
            .map(|cell| {
                let v = (*cell)?;
                if v < 1.0 {
                    if filter_outliers {
                        return None;
                    }
                    return Some(base.apply(1.0));
                }
                Some(base.apply(v))
            })
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Per column `(x - min) / (max - min)`.
    #[serde(rename = "minmax")]
    MinMax,
    /// Divide by the row sum.
    Row,
    /// Divide by the column sum.
    Column,
    /// Divide by the column median.
    MedianColumn,
    /// Quantile normalisation across columns.
    QuantileColumn,
}

impl Normalization {
    pub const ALL: [Normalization; 5] = [
        Normalization::MinMax,
        Normalization::Row,
        Normalization::Column,
        Normalization::MedianColumn,
        Normalization::QuantileColumn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Normalization::MinMax => "minmax",
            Normalization::Row => "row",
            Normalization::Column => "column",
            Normalization::MedianColumn => "median_column",
            Normalization::QuantileColumn => "quantile_column",
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Normalization {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        Normalization::ALL
            .into_iter()
            .find(|n| n.name() == s)
            .ok_or_else(|| unknown_mode("how", s, Normalization::ALL.map(Normalization::name)))
    }
}

/// Normalise `table` by the chosen mode. Non-finite results (division by a
/// zero sum or span) become missing.
pub fn normalize(table: &IntensityTable, how: Normalization) -> IntensityTable {
    let out = match how {
        Normalization::MinMax => {
            let bounds: Vec<Option<(f64, f64)>> = column_values(table)
                .iter()
                .map(|col| {
                    let min = col.iter().copied().reduce(f64::min)?;
                    let max = col.iter().copied().reduce(f64::max)?;
                    Some((min, max))
                })
                .collect();
            scale_columns(table, |j, x| {
                bounds[j].map_or(f64::NAN, |(min, max)| (x - min) / (max - min))
            })
        }
        Normalization::Row => table.map_rows(|row| {
            let sum: f64 = row.iter().flatten().sum();
            row.iter().map(|c| c.map(|x| x / sum)).collect()
        }),
        Normalization::Column => {
            let sums: Vec<f64> = column_values(table).iter().map(|c| c.iter().sum()).collect();
            scale_columns(table, |j, x| x / sums[j])
        }
        Normalization::MedianColumn => {
            let medians: Vec<Option<f64>> = column_values(table).iter().map(|c| median(c)).collect();
            scale_columns(table, |j, x| medians[j].map_or(f64::NAN, |m| x / m))
        }
        Normalization::QuantileColumn => quantile_normalize(table),
    };
    drop_non_finite(&out)
}

/// Replace each value by the mean, across columns, of the values holding
/// the same rank. Ties share their lowest rank.
fn quantile_normalize(table: &IntensityTable) -> IntensityTable {
    let mut sorted_columns = column_values(table);
    for col in &mut sorted_columns {
        col.sort_by(f64::total_cmp);
    }
    let depth = sorted_columns.iter().map(Vec::len).max().unwrap_or(0);
    let rank_means: Vec<f64> = (0..depth)
        .map(|r| {
            let at_rank: Vec<f64> = sorted_columns.iter().filter_map(|c| c.get(r).copied()).collect();
            mean(&at_rank).unwrap_or(f64::NAN)
        })
        .collect();

    scale_columns(table, |j, x| {
        let rank = sorted_columns[j].partition_point(|v| *v < x);
        rank_means[rank]
    })
}

// ---------------------------------------------------------------------------
// Row sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatistic {
    Max,
    Min,
    Median,
    Mean,
    Sum,
}

impl RowStatistic {
    pub const ALL: [RowStatistic; 5] = [
        RowStatistic::Max,
        RowStatistic::Min,
        RowStatistic::Median,
        RowStatistic::Mean,
        RowStatistic::Sum,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RowStatistic::Max => "max",
            RowStatistic::Min => "min",
            RowStatistic::Median => "median",
            RowStatistic::Mean => "mean",
            RowStatistic::Sum => "sum",
        }
    }

    fn compute(self, values: &[f64]) -> Option<f64> {
        match self {
            RowStatistic::Max => values.iter().copied().reduce(f64::max),
            RowStatistic::Min => values.iter().copied().reduce(f64::min),
            RowStatistic::Median => median(values),
            RowStatistic::Mean => mean(values),
            RowStatistic::Sum if values.is_empty() => None,
            RowStatistic::Sum => Some(values.iter().sum()),
        }
    }
}

impl FromStr for RowStatistic {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        RowStatistic::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| unknown_mode("how", s, RowStatistic::ALL.map(RowStatistic::name)))
    }
}

/// Reorder rows by a per-row statistic. The sort is stable and rows with no
/// present value always go last.
pub fn sort_row_values(
    table: &IntensityTable,
    how: RowStatistic,
    use_absolute_values: bool,
    ascending: bool,
) -> IntensityTable {
    let keys: Vec<Option<f64>> = table
        .rows()
        .map(|(_, row)| {
            let mut values = present(row);
            if use_absolute_values {
                values.iter_mut().for_each(|v| *v = v.abs());
            }
            how.compute(&values)
        })
        .collect();

    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by(|&a, &b| match (keys[a], keys[b]) {
        (Some(x), Some(y)) if ascending => x.total_cmp(&y),
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    table.select_rows(&order)
}

// ---------------------------------------------------------------------------
// Missing-value removal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Rows,
    Columns,
}

/// Drop every row (or column) that holds at least one missing cell.
pub fn dropna(table: &IntensityTable, axis: Axis) -> IntensityTable {
    match axis {
        Axis::Rows => {
            let keep: Vec<usize> = table
                .rows()
                .enumerate()
                .filter(|(_, (_, row))| row.iter().all(Option::is_some))
                .map(|(i, _)| i)
                .collect();
            table.select_rows(&keep)
        }
        Axis::Columns => {
            let keep: Vec<usize> = (0..table.n_samples())
                .filter(|&j| table.rows().all(|(_, row)| row[j].is_some()))
                .collect();
            table.select_columns(&keep)
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// One preprocessing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    LogScale {
        base: LogBase,
        #[serde(default = "default_true")]
        filter_outliers: bool,
    },
    Normalize {
        how: Normalization,
    },
    SortRows {
        how: RowStatistic,
        #[serde(default)]
        use_absolute_values: bool,
        #[serde(default)]
        ascending: bool,
    },
    DropMissing {
        axis: Axis,
    },
}

fn default_true() -> bool {
    true
}

impl Step {
    pub fn apply(&self, table: &IntensityTable) -> IntensityTable {
        match *self {
            Step::LogScale { base, filter_outliers } => log_scaling(table, base, filter_outliers),
            Step::Normalize { how } => normalize(table, how),
            Step::SortRows {
                how,
                use_absolute_values,
                ascending,
            } => sort_row_values(table, how, use_absolute_values, ascending),
            Step::DropMissing { axis } => dropna(table, axis),
        }
    }
}

/// An ordered list of [`Step`]s applied one after another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn then(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order on a fresh copy; the input is never modified.
    pub fn apply(&self, table: &IntensityTable) -> IntensityTable {
        self.steps.iter().fold(table.clone(), |acc, step| {
            log::debug!("preprocessing step {step:?} on {} rows", acc.len());
            step.apply(&acc)
        })
    }
}

// -- helpers --

fn unknown_mode<const N: usize>(name: &'static str, value: &str, accepted: [&str; N]) -> AnalysisError {
    AnalysisError::invalid_parameter(
        name,
        format!("unsupported value '{value}', expected one of: {}", accepted.join(", ")),
    )
}

/// Present values of each column.
fn column_values(table: &IntensityTable) -> Vec<Vec<f64>> {
    let mut cols = vec![Vec::new(); table.n_samples()];
    for (_, row) in table.rows() {
        for (j, cell) in row.iter().enumerate() {
            if let Some(v) = cell {
                cols[j].push(*v);
            }
        }
    }
    cols
}

fn scale_columns(table: &IntensityTable, f: impl Fn(usize, f64) -> f64) -> IntensityTable {
    table.map_rows(|row| {
        row.iter()
            .enumerate()
            .map(|(j, c)| c.map(|x| f(j, x)))
            .collect()
    })
}

fn drop_non_finite(table: &IntensityTable) -> IntensityTable {
    table.map_rows(|row| row.iter().map(|c| c.filter(|x| x.is_finite())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(values: Vec<Vec<Option<f64>>>) -> IntensityTable {
        let index = (0..values.len()).map(|i| format!("r{i}")).collect();
        let samples = (0..values[0].len()).map(|j| format!("s{j}")).collect();
        IntensityTable::from_values(index, samples, values).unwrap()
    }

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn log_scaling_filters_values_below_one() {
        let t = table(vec![vec![Some(25.0), Some(0.0)], vec![Some(100.0), Some(42.0)]]);
        let out = log_scaling(&t, LogBase::Ten, true);
        assert_eq!(out.row_at(0)[1], None);
        assert!(approx(out.row_at(1)[0], 2.0));
    }

    #[test]
    fn log_scaling_clamps_without_filter() {
        let t = table(vec![vec![Some(0.0), Some(8.0)]]);
        let out = log_scaling(&t, LogBase::Two, false);
        assert!(approx(out.row_at(0)[0], 0.0));
        assert!(approx(out.row_at(0)[1], 3.0));
    }

    #[test]
    fn unknown_normalization_is_rejected() {
        let err = "nonexisting".parse::<Normalization>().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { name: "how", .. }));
        assert!(err.to_string().contains("quantile_column"));
        assert_eq!("median_column".parse::<Normalization>().unwrap(), Normalization::MedianColumn);
    }

    #[test]
    fn unknown_row_statistic_is_rejected() {
        assert!("nonexisting".parse::<RowStatistic>().is_err());
        assert_eq!("sum".parse::<RowStatistic>().unwrap(), RowStatistic::Sum);
    }

    #[test]
    fn minmax_spans_zero_to_one() {
        let t = table(vec![vec![Some(1.0)], vec![Some(3.0)], vec![Some(5.0)]]);
        let out = normalize(&t, Normalization::MinMax);
        let col: Vec<Option<f64>> = out.rows().map(|(_, r)| r[0]).collect();
        assert_eq!(col, vec![Some(0.0), Some(0.5), Some(1.0)]);
    }

    #[test]
    fn row_and_column_sums_to_one() {
        let t = table(vec![vec![Some(1.0), Some(3.0)], vec![Some(2.0), Some(1.0)]]);
        let rows = normalize(&t, Normalization::Row);
        assert_eq!(rows.row_at(0), &[Some(0.25), Some(0.75)]);
        let cols = normalize(&t, Normalization::Column);
        assert_eq!(cols.row_at(0), &[Some(1.0 / 3.0), Some(0.75)]);
    }

    #[test]
    fn median_column_divides_by_median() {
        let t = table(vec![vec![Some(2.0)], vec![Some(4.0)], vec![Some(8.0)]]);
        let out = normalize(&t, Normalization::MedianColumn);
        assert_eq!(out.row_at(2), &[Some(2.0)]);
    }

    #[test]
    fn quantile_normalization_equalizes_distributions() {
        // classic textbook example
        let t = table(vec![
            vec![Some(5.0), Some(4.0), Some(3.0)],
            vec![Some(2.0), Some(1.0), Some(4.0)],
            vec![Some(3.0), Some(4.0), Some(6.0)],
            vec![Some(4.0), Some(2.0), Some(8.0)],
        ]);
        let out = normalize(&t, Normalization::QuantileColumn);
        // rank means: 2.0, 3.0, 4.6667, 5.6667; ties in column 1 share rank 3
        assert!(approx(out.row_at(0)[0], 17.0 / 3.0));
        assert!(approx(out.row_at(1)[0], 2.0));
        assert!(approx(out.row_at(0)[1], 14.0 / 3.0));
        assert!(approx(out.row_at(2)[1], 14.0 / 3.0));
        assert!(approx(out.row_at(3)[2], 17.0 / 3.0));
    }

    #[test]
    fn sort_rows_puts_empty_rows_last() {
        let t = table(vec![
            vec![Some(1.0), Some(9.0)],
            vec![None, None],
            vec![Some(-20.0), Some(2.0)],
        ]);
        let desc = sort_row_values(&t, RowStatistic::Max, false, false);
        assert_eq!(desc.index(), &["r0", "r2", "r1"]);
        let abs_desc = sort_row_values(&t, RowStatistic::Max, true, false);
        assert_eq!(abs_desc.index(), &["r2", "r0", "r1"]);
        let asc = sort_row_values(&t, RowStatistic::Sum, false, true);
        assert_eq!(asc.index(), &["r2", "r0", "r1"]);
    }

    #[test]
    fn dropna_by_axis() {
        let t = table(vec![vec![Some(1.0), None], vec![Some(2.0), Some(3.0)]]);
        assert_eq!(dropna(&t, Axis::Rows).index(), &["r1"]);
        assert_eq!(dropna(&t, Axis::Columns).samples(), &["s0"]);
    }

    #[test]
    fn pipeline_applies_in_order_without_touching_input() {
        let t = table(vec![vec![Some(10.0), Some(1000.0)]]);
        let pipeline = Pipeline::new()
            .then(Step::LogScale {
                base: LogBase::Ten,
                filter_outliers: true,
            })
            .then(Step::Normalize {
                how: Normalization::Row,
            });
        let out = pipeline.apply(&t);
        assert!(approx(out.row_at(0)[0], 0.25));
        assert!(approx(out.row_at(0)[1], 0.75));
        assert_eq!(t.row_at(0), &[Some(10.0), Some(1000.0)]);
    }
}
