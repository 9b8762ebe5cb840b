use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use mzjoin::{IsotopeComparisonParameters, JoinParameters};

/// mzjoin command-line parameters.
///
/// Alignment settings come from `--params` (a JSON `JoinParameters` document) or
/// the library defaults; any flag given on the command line overrides that value.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mzjoin",
    about = "Join LC-MS feature tables from several runs into one aligned feature list",
    version
)]
pub struct Parameters {
    // ── Input / output ──────────────────────────────────────────────────
    /// Feature tables (JSON), in alignment order
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Output file for the aligned feature list
    #[arg(short, long, default_value = "aligned.json")]
    pub output: PathBuf,

    /// Pretty-print the output JSON
    #[arg(long)]
    pub pretty: bool,

    /// JSON file with join parameters
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Number of worker threads (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    // ── Overrides ───────────────────────────────────────────────────────
    /// Name of the aligned feature list
    #[arg(long)]
    pub name: Option<String>,

    /// Absolute m/z tolerance
    #[arg(long = "mz-tol")]
    pub mz_tol: Option<f64>,

    /// Relative m/z tolerance in ppm
    #[arg(long = "mz-ppm")]
    pub mz_ppm: Option<f64>,

    /// Absolute retention time tolerance
    #[arg(long = "rt-tol")]
    pub rt_tol: Option<f64>,

    /// Relative retention time tolerance, as a fraction
    #[arg(long = "rt-rel")]
    pub rt_rel: Option<f64>,

    /// Weight of the m/z closeness term
    #[arg(long = "mz-weight")]
    pub mz_weight: Option<f64>,

    /// Weight of the retention time closeness term
    #[arg(long = "rt-weight")]
    pub rt_weight: Option<f64>,

    /// Only join features with the same (known) charge
    #[arg(long = "same-charge")]
    pub same_charge: bool,

    /// Only join features sharing an identity annotation
    #[arg(long = "same-id")]
    pub same_id: bool,

    /// Enable isotope pattern comparison with this weight
    #[arg(long = "isotope-weight")]
    pub isotope_weight: Option<f64>,

    /// Minimum isotope pattern similarity for a match (0 disables the gate)
    #[arg(long = "isotope-min-score")]
    pub isotope_min_score: Option<f64>,

    /// Seed the aligned list with the largest table instead of the first
    #[arg(long = "seed-largest")]
    pub seed_largest: bool,
}

impl Parameters {
    /// Load `--params` (or the defaults), apply the flag overrides and validate.
    pub fn join_parameters(&self) -> anyhow::Result<JoinParameters> {
        let mut jp = match &self.params {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading parameter file {}", path.display()))?;
                serde_json::from_str::<JoinParameters>(&text)
                    .with_context(|| format!("parsing parameter file {}", path.display()))?
            }
            None => JoinParameters::default(),
        };

        if let Some(name) = &self.name {
            jp.name = name.clone();
        }
        if let Some(v) = self.mz_tol {
            jp.mz_tolerance.absolute = v;
        }
        if let Some(v) = self.mz_ppm {
            jp.mz_tolerance.relative = v;
        }
        if let Some(v) = self.rt_tol {
            jp.rt_tolerance.absolute = v;
        }
        if let Some(v) = self.rt_rel {
            jp.rt_tolerance.relative = v;
        }
        if let Some(v) = self.mz_weight {
            jp.mz_weight = v;
        }
        if let Some(v) = self.rt_weight {
            jp.rt_weight = v;
        }
        jp.require_same_charge |= self.same_charge;
        jp.require_same_identity |= self.same_id;
        jp.seed_with_largest |= self.seed_largest;

        if self.isotope_weight.is_some() || self.isotope_min_score.is_some() {
            let iso = jp.isotope.get_or_insert_with(IsotopeComparisonParameters::default);
            if let Some(w) = self.isotope_weight {
                iso.weight = w;
            }
            if let Some(s) = self.isotope_min_score {
                iso.min_score = s;
            }
        }

        jp.validate()?;
        Ok(jp)
    }

    /// Checks that do not need the file system beyond the paths themselves.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.inputs.is_empty() {
            bail!("at least one feature table is required");
        }
        if self.inputs.iter().any(|p| p == &self.output) {
            bail!("output {} would overwrite an input table", self.output.display());
        }
        Ok(())
    }
}
