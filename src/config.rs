use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::algorithms::outliers::DEFAULT_STD_MULTIPLIER;
use crate::transform::Pipeline;

// ---------------------------------------------------------------------------
// Column naming
// ---------------------------------------------------------------------------

/// Column names of the long-format peptide table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeptideColumns {
    pub peptide: String,
    pub protein: String,
    pub sample: String,
    pub intensity: String,
    /// Precomputed peptides-per-protein column. When `None` the count is
    /// derived from the distinct (peptide, protein) pairs.
    pub num_peptides: Option<String>,
}

impl Default for PeptideColumns {
    fn default() -> Self {
        Self {
            peptide: "Peptide".to_string(),
            protein: "Protein".to_string(),
            sample: "Sample".to_string(),
            intensity: "Intensity".to_string(),
            num_peptides: None,
        }
    }
}

/// Column names of the location annotation and expected-fraction tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationColumns {
    /// When set, distinct proteins are counted instead of rows.
    pub protein: Option<String>,
    pub location: String,
    pub expected_fraction: String,
}

impl Default for LocationColumns {
    fn default() -> Self {
        Self {
            protein: Some("Protein".to_string()),
            location: "Main location".to_string(),
            expected_fraction: "Expected fraction".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// AnalysisConfig – everything the CLI can be told through a file
// ---------------------------------------------------------------------------

/// Analysis settings, loadable from a JSON file:
///
/// ```json
/// {
///   "peptide_columns": { "peptide": "PeptideSeq", "protein": "ProteinAccession" },
///   "std_multiplier": 1.5,
///   "min_peptides": 2,
///   "preprocessing": [ { "step": "log_scale", "base": "ten", "filter_outliers": true } ]
/// }
/// ```
///
/// Missing keys fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub peptide_columns: PeptideColumns,
    pub location_columns: LocationColumns,
    pub std_multiplier: f64,
    pub min_peptides: usize,
    pub preprocessing: Pipeline,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            peptide_columns: PeptideColumns::default(),
            location_columns: LocationColumns::default(),
            std_multiplier: DEFAULT_STD_MULTIPLIER,
            min_peptides: 1,
            preprocessing: Pipeline::default(),
        }
    }
}

impl AnalysisConfig {
    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise start from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
