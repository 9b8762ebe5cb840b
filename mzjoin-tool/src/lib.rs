pub mod io;
pub mod params;

use log::{debug, info};
use rayon::prelude::*;

use mzjoin::{FeatureTable, JoinAligner};

use crate::params::Parameters;

/// Read all inputs, align them and write the aligned feature list.
pub fn run(params: &Parameters) -> anyhow::Result<()> {
    params.validate()?;
    let join = params.join_parameters()?;

    info!("mzjoin v{}", env!("CARGO_PKG_VERSION"));
    info!("m/z tolerance: {}, weight {}", join.mz_tolerance, join.mz_weight);
    info!("RT tolerance: {}, weight {}", join.rt_tolerance, join.rt_weight);

    if params.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(params.threads)
            .build_global()?;
    }
    info!("threads: {}", rayon::current_num_threads());

    let tables = params
        .inputs
        .par_iter()
        .map(|path| io::read_feature_table(path))
        .collect::<anyhow::Result<Vec<FeatureTable>>>()?;
    for (path, table) in params.inputs.iter().zip(&tables) {
        let runs = table.runs().into_iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ");
        debug!("{}: '{}', {} features from runs [{}]", path.display(), table.name, table.len(), runs);
    }
    info!(
        "read {} feature tables with {} features",
        tables.len(),
        tables.iter().map(FeatureTable::len).sum::<usize>()
    );

    let mut aligner = JoinAligner::new(join)?;
    let outcome = aligner.align(tables);
    info!(
        "{} rows, {} matches, {} features excluded",
        outcome.table.len(),
        outcome.report.matches(),
        outcome.report.excluded.len()
    );

    io::write_aligned_table(&params.output, &outcome.table, &outcome.report, params.pretty)?;
    info!("wrote {}", params.output.display());
    Ok(())
}
