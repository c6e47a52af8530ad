// SPDX-License-Identifier: Apache-2.0

//! Counterexample-guided refinement: solve with structural clauses only,
//! simulate the candidate circuit the model describes, and commit clauses
//! for one mismatching truth-table row at a time.
//!
//! Simulating a candidate is plain bit-vector arithmetic, so each round
//! costs far less than materializing all `2^n` rows as clauses up front;
//! rows the structural constraints already get right are never encoded.
//! A committed row can never mismatch again, which bounds the loop at
//! `2^n - 1` commits per skeleton.

use crate::chain::Chain;
use crate::encode::Encoder;
use crate::extract;
use crate::partial_dag::PartialDag;
use crate::sat::{CnfSolver, SolveOutcome};
use crate::spec::SynthSpec;
use crate::tt::Tt;

/// Terminal result of refining one skeleton.
#[derive(Debug)]
pub enum RefineOutcome {
    Solved(Chain),
    /// The skeleton cannot realize the specification.
    Exhausted,
    /// The solve budget ran out; the skeleton remains undecided.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Solving,
    Simulating,
    /// Carries the mismatching row to encode next.
    Committing(usize),
}

/// Runs the refinement loop for one skeleton on a fresh solver.
pub fn refine(spec: &SynthSpec, dag: &PartialDag, solver: &mut impl CnfSolver) -> RefineOutcome {
    let encoder = Encoder::new_cegar(spec, dag, solver);
    if !encoder.encode_structural(solver) {
        return RefineOutcome::Exhausted;
    }

    let mut committed = vec![false; spec.num_rows()];
    let mut commits = 0usize;
    let mut state = State::Solving;
    loop {
        state = match state {
            State::Solving => match solver.solve(spec.conflict_limit) {
                SolveOutcome::Unsat => {
                    log::debug!("skeleton exhausted after {} commits", commits);
                    return RefineOutcome::Exhausted;
                }
                SolveOutcome::Timeout => return RefineOutcome::TimedOut,
                SolveOutcome::Sat => State::Simulating,
            },
            State::Simulating => match first_mismatch(spec, dag, &encoder, solver) {
                None => {
                    let chain = extract::extract_chain(spec, dag, encoder.vars(), solver);
                    log::debug!("refinement converged after {} commits", commits);
                    return RefineOutcome::Solved(chain);
                }
                Some(row) => State::Committing(row),
            },
            State::Committing(row) => {
                assert!(!committed[row], "row {} committed twice", row);
                committed[row] = true;
                commits += 1;
                debug_assert!(commits <= spec.num_rows());
                log::trace!("committing counterexample row {}", row);
                encoder.emit_row(solver, row);
                State::Solving
            }
        };
    }
}

/// Simulates the candidate circuit in the current model and returns the
/// first encoder row where some nontrivial output misses its target.
fn first_mismatch(
    spec: &SynthSpec,
    dag: &PartialDag,
    encoder: &Encoder,
    solver: &impl CnfSolver,
) -> Option<usize> {
    let n = spec.num_inputs();
    let vars = encoder.vars();
    let mut node_tts: Vec<Tt> = (0..n).map(|i| Tt::nth_var(n, i)).collect();
    for i in 0..dag.num_steps() {
        let op = extract::decode_step_op(solver, vars, i);
        let [a, b] = extract::decode_step_operands(solver, vars, i);
        node_tts.push(op.apply(&node_tts[a], &node_tts[b]));
    }

    let mut first: Option<usize> = None;
    for h in 0..spec.num_nontrivial() {
        let step = extract::decode_output_step(solver, vars, dag.num_steps(), h);
        let got = &node_tts[n + step];
        let target = spec.normalized_target(spec.nontrivial_output(h));
        let mask = spec.dont_care_mask(spec.nontrivial_output(h));
        if let Some(row) = got.first_difference(target, Some(mask)) {
            // Row 0 cannot mismatch: both sides are normal.
            debug_assert!(row > 0);
            let t = row - 1;
            first = Some(first.map_or(t, |f| f.min(t)));
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partial_dag::Fanin;
    use crate::sat::VarisatSolver;
    use crate::tt::Tt;

    #[test]
    fn test_refine_solves_xor_on_single_step() {
        let target = Tt::from_u64(2, 0b0110);
        let spec = SynthSpec::new(vec![target.clone()]).unwrap();
        let dag = PartialDag::new(vec![[Fanin::Free, Fanin::Free]]).unwrap();
        let mut solver = VarisatSolver::new();
        match refine(&spec, &dag, &mut solver) {
            RefineOutcome::Solved(chain) => {
                assert_eq!(chain.simulate(), vec![target]);
            }
            other => panic!("expected a solution, got {:?}", other),
        }
    }

    #[test]
    fn test_refine_exhausts_infeasible_skeleton() {
        let and3 = &(&Tt::nth_var(3, 0) & &Tt::nth_var(3, 1)) & &Tt::nth_var(3, 2);
        let spec = SynthSpec::new(vec![and3]).unwrap();
        let dag = PartialDag::new(vec![[Fanin::Free, Fanin::Free]]).unwrap();
        let mut solver = VarisatSolver::new();
        assert!(matches!(
            refine(&spec, &dag, &mut solver),
            RefineOutcome::Exhausted
        ));
    }
}
