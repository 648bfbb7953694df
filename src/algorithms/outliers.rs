use crate::data::model::{IntensityTable, OutlierFlagTable};
use crate::error::{AnalysisError, Result};

use super::stats::{mean, present, sample_std_dev};

/// Default multiplier `k` of the `mean ± k·sd` band.
pub const DEFAULT_STD_MULTIPLIER: f64 = 1.0;

/// Mean and sample standard deviation of a row's present values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl RowStats {
    /// `None` for rows with fewer than two present values.
    ///
    /// A constant row gets exactly `mean = value, std_dev = 0`; summing it
    /// would leave a rounding residue in both.
    pub fn from_cells(cells: &[Option<f64>]) -> Option<Self> {
        let values = present(cells);
        let std_dev = sample_std_dev(&values)?;
        let first = values[0];
        if values.iter().all(|&v| v == first) {
            return Some(RowStats {
                mean: first,
                std_dev: 0.0,
            });
        }
        Some(RowStats {
            mean: mean(&values)?,
            std_dev,
        })
    }
}

/// Outlier flags, either as one table or split by direction.
#[derive(Debug, Clone, PartialEq)]
pub enum Outliers {
    Combined(OutlierFlagTable),
    Split {
        above: OutlierFlagTable,
        below: OutlierFlagTable,
    },
}

impl Outliers {
    /// Collapse to a single table; split results are OR-ed together.
    pub fn into_combined(self) -> Result<OutlierFlagTable> {
        match self {
            Outliers::Combined(t) => Ok(t),
            Outliers::Split { above, below } => above.union(&below),
        }
    }
}

/// Flags peptide intensities outside `mean ± k·sd` of their own row.
///
/// Rows with fewer than two present values cannot have a spread and are
/// flagged `false` throughout. Missing cells stay missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierDetector {
    std_multiplier: f64,
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self {
            std_multiplier: DEFAULT_STD_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Above,
    Below,
    Either,
}

impl OutlierDetector {
    pub fn new(std_multiplier: f64) -> Result<Self> {
        if !std_multiplier.is_finite() || std_multiplier <= 0.0 {
            return Err(AnalysisError::invalid_parameter(
                "std_multiplier",
                format!("must be a positive finite number, got {std_multiplier}"),
            ));
        }
        Ok(Self { std_multiplier })
    }

    /// Single flag table: `true` where a value leaves the band either way.
    pub fn detect(&self, intensities: &IntensityTable) -> OutlierFlagTable {
        self.flag(intensities, Direction::Either)
    }

    /// Separate tables for values above and below the band. Both keep every
    /// input row.
    pub fn detect_split(&self, intensities: &IntensityTable) -> (OutlierFlagTable, OutlierFlagTable) {
        (
            self.flag(intensities, Direction::Above),
            self.flag(intensities, Direction::Below),
        )
    }

    pub fn run(&self, intensities: &IntensityTable, split_above_below: bool) -> Outliers {
        if split_above_below {
            let (above, below) = self.detect_split(intensities);
            Outliers::Split { above, below }
        } else {
            Outliers::Combined(self.detect(intensities))
        }
    }

    fn flag(&self, intensities: &IntensityTable, direction: Direction) -> OutlierFlagTable {
        let mut sparse_rows = 0usize;
        let flags = intensities.map_rows(|row| {
            let stats = RowStats::from_cells(row);
            if stats.is_none() {
                sparse_rows += 1;
            }
            row.iter()
                .map(|cell| {
                    let v = (*cell)?;
                    Some(stats.is_some_and(|s| self.is_outlier(v, &s, direction)))
                })
                .collect()
        });
        log::debug!(
            "outlier detection ({direction:?}, k={}): {} rows, {} flagged cells, {} rows too sparse",
            self.std_multiplier,
            intensities.len(),
            flags.count_flagged(),
            sparse_rows
        );
        flags
    }

    fn is_outlier(&self, value: f64, stats: &RowStats, direction: Direction) -> bool {
        // no spread, no outliers
        if stats.std_dev == 0.0 {
            return false;
        }
        let band = self.std_multiplier * stats.std_dev;
        let above = value > stats.mean + band;
        let below = value < stats.mean - band;
        match direction {
            Direction::Above => above,
            Direction::Below => below,
            Direction::Either => above || below,
        }
    }
}

/// Detect outliers with the default multiplier.
pub fn detect_outliers(peptide_intensities: &IntensityTable, split_above_below: bool) -> Outliers {
    OutlierDetector::default().run(peptide_intensities, split_above_below)
}
