/// Data layer: core table types, loading, reshaping, and writing.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  explode / update / drop nulls → Table
///   └──────────┘
///        │
///        ▼
///   ┌───────────────┐
///   │ IntensityTable │  peptide × sample, built by algorithms::pivot_intensities
///   └───────────────┘
///        │   (algorithms)
///        ▼
///   ┌──────────┐
///   │  writer   │  Tabular result → .csv / .tsv / .json
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod writer;
