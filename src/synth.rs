// SPDX-License-Identifier: Apache-2.0

//! Top-level synthesis drivers: try skeletons of increasing size until one
//! realizes the specification, serially or across worker threads.

use crate::cegar::{self, RefineOutcome};
use crate::chain::Chain;
use crate::dag_gen::{self, FilterMode};
use crate::encode::Encoder;
use crate::extract;
use crate::iso;
use crate::partial_dag::PartialDag;
use crate::sat::{CnfSolver, SolveOutcome, VarisatSolver};
use crate::spec::SynthSpec;
use std::sync::{Mutex, mpsc};

#[derive(Debug)]
pub enum SynthOutcome {
    Solved(Chain),
    /// No admissible chain exists within the size bounds.
    Infeasible,
    /// A solve budget ran out before the search could decide.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthMode {
    /// Encode the full truth table up front.
    Direct,
    /// Counterexample-guided refinement.
    Cegar,
}

#[derive(Debug, Clone)]
pub struct SynthOptions {
    pub mode: SynthMode,
    pub filter: FilterMode,
    /// Deduplicate isomorphic skeletons before solving.
    pub dedupe: bool,
    /// Largest chain size the search will try.
    pub max_steps: usize,
    /// Worker threads for the parallel driver; `None` = one per core.
    pub num_threads: Option<usize>,
}

impl Default for SynthOptions {
    fn default() -> Self {
        SynthOptions {
            mode: SynthMode::Direct,
            filter: FilterMode::NoReapply,
            dedupe: true,
            max_steps: 12,
            num_threads: None,
        }
    }
}

/// The zero-step chain for a specification whose outputs are all trivial.
fn trivial_chain(spec: &SynthSpec) -> Chain {
    let mut chain = Chain::new(spec.num_inputs(), spec.num_outputs(), 0);
    for h in 0..spec.num_outputs() {
        chain.set_output(
            h,
            (spec.trivial_ref(h) << 1) | spec.output_inverted(h) as u32,
        );
    }
    chain
}

/// Tries to realize the specification on one skeleton.
pub fn synthesize_with_dag(
    spec: &SynthSpec,
    dag: &PartialDag,
    solver: &mut impl CnfSolver,
    mode: SynthMode,
) -> SynthOutcome {
    if spec.num_nontrivial() == 0 {
        return SynthOutcome::Solved(trivial_chain(spec));
    }
    solver.restart();
    match mode {
        SynthMode::Direct => {
            let encoder = Encoder::new_direct(spec, dag, solver);
            if !encoder.encode(solver) {
                return SynthOutcome::Infeasible;
            }
            match solver.solve(spec.conflict_limit) {
                SolveOutcome::Sat => {
                    let chain = extract::extract_chain(spec, dag, encoder.vars(), solver);
                    SynthOutcome::Solved(chain)
                }
                SolveOutcome::Unsat => SynthOutcome::Infeasible,
                SolveOutcome::Timeout => SynthOutcome::TimedOut,
            }
        }
        SynthMode::Cegar => match cegar::refine(spec, dag, solver) {
            RefineOutcome::Solved(chain) => SynthOutcome::Solved(chain),
            RefineOutcome::Exhausted => SynthOutcome::Infeasible,
            RefineOutcome::TimedOut => SynthOutcome::TimedOut,
        },
    }
}

/// Tries each pre-generated skeleton in order.
pub fn synthesize_from_dags(
    spec: &SynthSpec,
    dags: &[PartialDag],
    solver: &mut impl CnfSolver,
    mode: SynthMode,
) -> SynthOutcome {
    if spec.num_nontrivial() == 0 {
        return SynthOutcome::Solved(trivial_chain(spec));
    }
    for dag in dags {
        match synthesize_with_dag(spec, dag, solver, mode) {
            SynthOutcome::Infeasible => continue,
            decided => return decided,
        }
    }
    SynthOutcome::Infeasible
}

/// Size-increasing serial search for a minimum chain.
pub fn synthesize(spec: &SynthSpec, opts: &SynthOptions) -> SynthOutcome {
    if spec.num_nontrivial() == 0 {
        return SynthOutcome::Solved(trivial_chain(spec));
    }
    let mut solver = VarisatSolver::new();
    for size in spec.initial_steps..=opts.max_steps {
        log::info!("trying chains of {} steps", size);
        let dags = skeletons_of_size(size, opts);
        for dag in dags {
            match synthesize_with_dag(spec, &dag, &mut solver, opts.mode) {
                SynthOutcome::Infeasible => continue,
                decided => return decided,
            }
        }
    }
    SynthOutcome::Infeasible
}

fn skeletons_of_size(size: usize, opts: &SynthOptions) -> Vec<PartialDag> {
    let generated: Vec<PartialDag> = dag_gen::generate(size, opts.filter).collect();
    let total = generated.len();
    let dags = if opts.dedupe { iso::dedupe(generated) } else { generated };
    log::debug!("size {}: {} skeletons ({} generated)", size, dags.len(), total);
    dags
}

struct SharedBest {
    size: usize,
    chain: Option<Chain>,
    timed_out_below: Option<usize>,
}

/// Parallel search: a generator thread feeds skeletons of increasing size
/// to workers that each own a private solver. Workers consult the shared
/// best size before and after every solve and abandon skeletons that can
/// no longer improve on it.
pub fn synthesize_parallel(spec: &SynthSpec, opts: &SynthOptions) -> SynthOutcome {
    if spec.num_nontrivial() == 0 {
        return SynthOutcome::Solved(trivial_chain(spec));
    }
    let num_threads = opts
        .num_threads
        .unwrap_or_else(num_cpus::get)
        .max(1);
    let best = Mutex::new(SharedBest {
        size: usize::MAX,
        chain: None,
        timed_out_below: None,
    });
    let (tx, rx) = mpsc::sync_channel::<PartialDag>(num_threads * 3);
    let rx = Mutex::new(rx);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            'generate: for size in spec.initial_steps..=opts.max_steps {
                if best.lock().unwrap().size <= size {
                    break;
                }
                for dag in skeletons_of_size(size, opts) {
                    if best.lock().unwrap().size <= size {
                        break 'generate;
                    }
                    if tx.send(dag).is_err() {
                        break 'generate;
                    }
                }
            }
            drop(tx);
        });

        for _ in 0..num_threads {
            scope.spawn(|| {
                let mut solver = VarisatSolver::new();
                loop {
                    let Ok(dag) = rx.lock().unwrap().recv() else {
                        return;
                    };
                    let size = dag.num_steps();
                    if best.lock().unwrap().size <= size {
                        continue;
                    }
                    match synthesize_with_dag(spec, &dag, &mut solver, opts.mode) {
                        SynthOutcome::Solved(chain) => {
                            let mut best = best.lock().unwrap();
                            if size < best.size {
                                best.size = size;
                                best.chain = Some(chain);
                            }
                        }
                        SynthOutcome::TimedOut => {
                            let mut best = best.lock().unwrap();
                            let below = best.timed_out_below.get_or_insert(size);
                            *below = (*below).min(size);
                        }
                        SynthOutcome::Infeasible => {}
                    }
                }
            });
        }
    });

    let SharedBest {
        size,
        chain,
        timed_out_below,
    } = best.into_inner().unwrap();
    match (chain, timed_out_below) {
        // A timeout on a smaller skeleton leaves minimality undecided.
        (Some(_), Some(below)) if below < size => SynthOutcome::TimedOut,
        (Some(chain), _) => SynthOutcome::Solved(chain),
        (None, Some(_)) => SynthOutcome::TimedOut,
        (None, None) => SynthOutcome::Infeasible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::Tt;

    #[test]
    fn test_xor_needs_exactly_one_step() {
        let spec = SynthSpec::new(vec![Tt::from_u64(2, 0b0110)]).unwrap();
        match synthesize(&spec, &SynthOptions::default()) {
            SynthOutcome::Solved(chain) => {
                assert_eq!(chain.num_steps(), 1);
                assert_eq!(chain.simulate(), vec![Tt::from_u64(2, 0b0110)]);
            }
            other => panic!("expected a solution, got {:?}", other),
        }
    }

    #[test]
    fn test_trivial_spec_short_circuits() {
        let spec = SynthSpec::new(vec![Tt::nth_var(3, 1), Tt::zero(3)]).unwrap();
        match synthesize(&spec, &SynthOptions::default()) {
            SynthOutcome::Solved(chain) => {
                assert_eq!(chain.num_steps(), 0);
                assert_eq!(
                    chain.simulate(),
                    vec![Tt::nth_var(3, 1), Tt::zero(3)]
                );
            }
            other => panic!("expected a trivial chain, got {:?}", other),
        }
    }

    #[test]
    fn test_infeasible_within_bounds() {
        // Majority needs 4 steps; cap the search below that.
        let spec = SynthSpec::new(vec![Tt::from_u64(3, 0xe8)]).unwrap();
        let opts = SynthOptions {
            max_steps: 2,
            ..SynthOptions::default()
        };
        assert!(matches!(synthesize(&spec, &opts), SynthOutcome::Infeasible));
    }
}
