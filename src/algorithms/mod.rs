//! Statistical core: peptide outliers, protein hits, location enrichment.
//!
//! ```text
//!  long peptide Table ──pivot_intensities──► IntensityTable
//!                                                │  OutlierDetector
//!                                                ▼
//!  PeptideProteinMap ──────────────► OutlierFlagTable ──aggregate_hits──► ProteinHitTable
//!
//!  protein/location Table + expected Table ──subcellular_enrichment_scores──► EnrichmentScoreTable
//! ```
//!
//! All functions are pure: inputs are borrowed, outputs are new tables.

pub mod enrichment;
pub mod hits;
pub mod outliers;
pub mod stats;

pub use enrichment::{subcellular_enrichment_scores, EnrichmentScoreTable, LocationEnrichment};
pub use hits::{
    aggregate_hits, get_hits_for_proteins, hit_selection, pivot_intensities, HitSelection,
    HitSelector, PeptideProteinMap, ProteinHit, ProteinHitTable,
};
pub use outliers::{detect_outliers, OutlierDetector, Outliers, RowStats, DEFAULT_STD_MULTIPLIER};
