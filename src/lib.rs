//! # peptide-hits
//!
//! Statistical building blocks for proteomics quantification:
//!
//! - [`algorithms::outliers`] - flag replicate intensities outside `mean ± k·sd` of their peptide row
//! - [`algorithms::hits`] - aggregate outlier peptides into protein hit counts with a minimum-evidence filter
//! - [`algorithms::enrichment`] - score subcellular locations against an expected background
//! - [`transform`] - log scaling, normalisation, row sorting and missing-value removal
//! - [`fasta`] - UniProt header parsing for protein identifiers
//! - [`data`] - generic tables plus CSV / JSON / Parquet loading and writing
//!
//! ```no_run
//! use peptide_hits::algorithms::{hit_selection, HitSelection};
//! use peptide_hits::config::PeptideColumns;
//! use peptide_hits::data::loader::load_file;
//!
//! let peptides = load_file("peptides.parquet".as_ref()).unwrap();
//! if let HitSelection::Combined(hits) =
//!     hit_selection(&peptides, &PeptideColumns::default(), 2, false).unwrap()
//! {
//!     println!("{} proteins", hits.len());
//! }
//! ```

pub mod algorithms;
pub mod config;
pub mod data;
pub mod error;
pub mod fasta;
pub mod transform;

pub use error::{AnalysisError, Result};
