use rayon::prelude::*;

use crate::error::PipelineError;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::program::Program;

/// Best phase order found by [`best_phases`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuning {
    pub phases: Vec<i64>,
    pub output: i64,
}

/// Every ordering of `values`, in lexicographic order of positions.
pub fn permutations(values: &[i64]) -> Vec<Vec<i64>> {
    if values.is_empty() {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for (i, &head) in values.iter().enumerate() {
        let mut rest = values.to_vec();
        rest.remove(i);
        for tail in permutations(&rest) {
            let mut order = Vec::with_capacity(values.len());
            order.push(head);
            order.extend(tail);
            out.push(order);
        }
    }
    out
}

/// Try every ordering of `values` as the phase settings of a uniform
/// pipeline and return the one with the largest output.
///
/// Each candidate network is independent, so they run in parallel via
/// rayon; each network still spawns one thread per stage.
pub fn best_phases(
    program: &Program,
    values: &[i64],
    config: &PipelineConfig,
) -> Result<Tuning, PipelineError> {
    let runs = permutations(values)
        .into_par_iter()
        .map(|phases| -> Result<Tuning, PipelineError> {
            let outcome = Pipeline::uniform(program, &phases, config.clone()).run()?;
            Ok(Tuning {
                phases,
                output: outcome.output,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    runs.into_iter()
        .max_by_key(|t| t.output)
        .ok_or(PipelineError::Empty)
}
