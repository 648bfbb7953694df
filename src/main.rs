use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use peptide_hits::algorithms::{
    pivot_intensities, subcellular_enrichment_scores, HitSelection, HitSelector, OutlierDetector,
    Outliers,
};
use peptide_hits::config::{AnalysisConfig, PeptideColumns};
use peptide_hits::data::filter::{drop_nulls, explode, update_column};
use peptide_hits::data::loader::load_file;
use peptide_hits::data::model::Table;
use peptide_hits::data::writer::{write_table, Tabular};
use peptide_hits::fasta::protein_name_cell;

/// Outlier-based protein hit calling and subcellular enrichment scoring.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// JSON analysis config (column names, multiplier, preprocessing).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Flag peptide intensities that deviate from their row.
    Outliers {
        #[command(flatten)]
        io: InputOutput,
        #[command(flatten)]
        detection: DetectionArgs,
    },
    /// Aggregate outlier peptides into protein hits.
    Hits {
        #[command(flatten)]
        io: InputOutput,
        #[command(flatten)]
        detection: DetectionArgs,
        /// Minimum peptides per protein.
        #[arg(long)]
        min_peptides: Option<usize>,
        /// Separate peptide→protein mapping table.
        #[arg(long, value_name = "FILE")]
        mapping: Option<PathBuf>,
        /// Split protein groups such as "P1;P2" on this separator.
        #[arg(long, value_name = "SEP")]
        explode: Option<String>,
        /// Protein column holds UniProt FASTA headers; reduce them to protein names.
        #[arg(long)]
        fasta_headers: bool,
    },
    /// Score subcellular locations against expected fractions.
    Enrichment {
        #[command(flatten)]
        io: InputOutput,
        /// Table of expected location fractions.
        #[arg(long, value_name = "FILE")]
        expected: PathBuf,
    },
}

#[derive(Debug, Args)]
struct InputOutput {
    /// Input table (.parquet, .csv, .tsv, .json).
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,
    /// Output table (.csv, .tsv, .json).
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct DetectionArgs {
    /// Multiplier k of the mean ± k·sd band.
    #[arg(long)]
    std_multiplier: Option<f64>,
    /// Write separate tables for outliers above and below the band.
    #[arg(long)]
    split: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = AnalysisConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Outliers { io, detection } => {
            apply_detection_overrides(&mut config, &detection);
            run_outliers(&config, &io, detection.split)
        }
        Command::Hits {
            io,
            detection,
            min_peptides,
            mapping,
            explode: sep,
            fasta_headers,
        } => {
            apply_detection_overrides(&mut config, &detection);
            if let Some(n) = min_peptides {
                config.min_peptides = n;
            }
            let options = MappingOptions {
                path: mapping,
                explode: sep,
                fasta_headers,
            };
            run_hits(&config, &io, detection.split, &options)
        }
        Command::Enrichment { io, expected } => run_enrichment(&config, &io, &expected),
    }
}

fn apply_detection_overrides(config: &mut AnalysisConfig, detection: &DetectionArgs) {
    if let Some(k) = detection.std_multiplier {
        config.std_multiplier = k;
    }
}

fn run_outliers(config: &AnalysisConfig, io: &InputOutput, split: bool) -> Result<()> {
    let detector = OutlierDetector::new(config.std_multiplier)?;
    let peptides = load_file(&io.input)?;
    let intensities = pivot_intensities(&peptides, &config.peptide_columns)?;
    let intensities = config.preprocessing.apply(&intensities);

    match detector.run(&intensities, split) {
        Outliers::Combined(flags) => write_table(&io.output, &flags),
        Outliers::Split { above, below } => write_split(&io.output, &above, &below),
    }
}

struct MappingOptions {
    path: Option<PathBuf>,
    explode: Option<String>,
    fasta_headers: bool,
}

fn run_hits(config: &AnalysisConfig, io: &InputOutput, split: bool, options: &MappingOptions) -> Result<()> {
    let selector = HitSelector::new()
        .columns(config.peptide_columns.clone())
        .preprocessing(config.preprocessing.clone())
        .std_multiplier(config.std_multiplier)?
        .min_peptides(config.min_peptides)
        .split_above_below(split);

    let peptides = load_file(&io.input)?;
    let mapping = match &options.path {
        Some(path) => load_file(path)?,
        None => peptides.clone(),
    };
    let mapping = prepare_mapping(mapping, &config.peptide_columns, options)?;

    match selector.run_with_mapping(&peptides, &mapping)? {
        HitSelection::Combined(hits) => write_table(&io.output, &hits),
        HitSelection::Split { above, below } => write_split(&io.output, &above, &below),
    }
}

/// Explode protein groups and normalise FASTA headers. A separate mapping
/// file usually annotates more peptides than were measured, so its rows
/// without a peptide or protein are dropped rather than treated as errors.
fn prepare_mapping(mut mapping: Table, columns: &PeptideColumns, options: &MappingOptions) -> Result<Table> {
    let protein_column = columns.protein.as_str();
    if let Some(sep) = &options.explode {
        mapping = explode(&mapping, protein_column, sep)?;
    }
    if options.path.is_some() {
        mapping = drop_nulls(&mapping, &[columns.peptide.as_str(), protein_column])?;
    }
    if options.fasta_headers {
        mapping = update_column(&mapping, protein_column, protein_name_cell)
            .context("normalising FASTA headers")?;
    }
    Ok(mapping)
}

fn run_enrichment(config: &AnalysisConfig, io: &InputOutput, expected: &Path) -> Result<()> {
    let proteins = load_file(&io.input)?;
    let expected = load_file(expected)?;
    let scores = subcellular_enrichment_scores(&proteins, &expected, &config.location_columns)?;
    for row in &scores.rows {
        log::info!("{}: {:.3}", row.location, row.score);
    }
    write_table(&io.output, &scores)
}

/// `hits.csv` → `hits_above.csv` + `hits_below.csv`.
fn write_split(output: &Path, above: &dyn Tabular, below: &dyn Tabular) -> Result<()> {
    write_table(&suffixed(output, "above"), above)?;
    write_table(&suffixed(output, "below"), below)
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{suffix}.{ext}"),
        None => format!("{stem}_{suffix}"),
    };
    path.with_file_name(name)
}
