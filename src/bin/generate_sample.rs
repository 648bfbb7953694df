//! Write a synthetic dataset for trying the `peptide-hits` CLI:
//!
//! * `sample_peptides.parquet` – long peptide table (Peptide, Protein, Sample, Intensity)
//! * `sample_locations.csv` – one main location per protein
//! * `sample_expected_fractions.csv` – background location fractions

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const SAMPLES: [&str; 6] = ["Ctrl_1", "Ctrl_2", "Ctrl_3", "Drug_1", "Drug_2", "Drug_3"];
const LOCATIONS: [(&str, f64); 4] = [
    ("Nucleoplasm", 0.35),
    ("Cytosol", 0.35),
    ("Mitochondria", 0.2),
    ("Plasma membrane", 0.1),
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn peptide_sequence(rng: &mut SimpleRng) -> String {
    const RESIDUES: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";
    let len = 7 + rng.below(9);
    let mut seq: String = (0..len)
        .map(|_| RESIDUES[rng.below(RESIDUES.len())] as char)
        .collect();
    // tryptic C-terminus
    seq.push(if rng.next_f64() < 0.5 { 'K' } else { 'R' });
    seq
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    let mut peptides: Vec<String> = Vec::new();
    let mut proteins: Vec<String> = Vec::new();
    let mut samples: Vec<&str> = Vec::new();
    let mut intensities: Vec<Option<f64>> = Vec::new();

    let mut locations = csv::Writer::from_path("sample_locations.csv")
        .context("creating sample_locations.csv")?;
    locations.write_record(["Protein", "Main location"])?;

    for p in 0..40 {
        let protein = format!("PROT{p:03}");
        // every fifth protein responds to the drug
        let responder = p % 5 == 0;
        let location = LOCATIONS[if responder { 0 } else { rng.below(LOCATIONS.len()) }].0;
        locations.write_record([protein.as_str(), location])?;

        for _ in 0..(1 + rng.below(5)) {
            let sequence = peptide_sequence(&mut rng);
            let baseline = rng.gauss(20.0, 2.0).exp2();
            for (j, &sample) in SAMPLES.iter().enumerate() {
                let mut value = baseline * rng.gauss(1.0, 0.05);
                if responder && j == SAMPLES.len() - 1 {
                    value *= 8.0;
                }
                // ~5% missing, as in real DIA runs
                let cell = (rng.next_f64() >= 0.05).then_some(value);
                peptides.push(sequence.clone());
                proteins.push(protein.clone());
                samples.push(sample);
                intensities.push(cell);
            }
        }
    }
    locations.flush()?;

    let mut expected = csv::Writer::from_path("sample_expected_fractions.csv")
        .context("creating sample_expected_fractions.csv")?;
    expected.write_record(["Main location", "Expected fraction"])?;
    for (location, fraction) in LOCATIONS {
        expected.write_record([location.to_string(), fraction.to_string()])?;
    }
    expected.flush()?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("Peptide", DataType::Utf8, false),
        Field::new("Protein", DataType::Utf8, false),
        Field::new("Sample", DataType::Utf8, false),
        Field::new("Intensity", DataType::Float64, true),
    ]));

    let n_rows = peptides.len();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(peptides)),
            Arc::new(StringArray::from(proteins)),
            Arc::new(StringArray::from(samples)),
            Arc::new(Float64Array::from(intensities)),
        ],
    )
    .context("building record batch")?;

    let output_path = "sample_peptides.parquet";
    let file = std::fs::File::create(output_path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;

    let preview = arrow::util::pretty::pretty_format_batches(&[batch.slice(0, SAMPLES.len().min(n_rows))])
        .context("formatting preview")?;
    println!("{preview}");

    println!(
        "Wrote {n_rows} peptide measurements over {} samples to {output_path}",
        SAMPLES.len()
    );
    Ok(())
}
