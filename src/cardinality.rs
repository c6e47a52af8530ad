// SPDX-License-Identifier: Apache-2.0

//! A reusable counting-circuit sub-compiler.
//!
//! Builds a monotone counter over a list of input variables using
//! caller-supplied result variables, then pins the final count. The counter
//! tracks three states per prefix position: "none chosen yet", "exactly
//! one chosen", and "two or more chosen". The incremental synthesis mode
//! uses it to force exactly one operand binding per step; without it,
//! several bindings consistent with a partial truth table can keep the
//! refinement loop from converging.

use crate::sat::{CnfSolver, Lit, Var};

/// Result variables per counter position.
pub const RES_PER_POSITION: usize = 3;

/// Emits clauses forcing exactly one of `inputs` to be true.
///
/// `results` must hold `RES_PER_POSITION * (inputs.len() + 1)` fresh
/// variables; position `p` uses `results[3p..3p + 3]` as its
/// (none, one, two-or-more) state bits.
pub fn encode_exactly_one(solver: &mut impl CnfSolver, inputs: &[Var], results: &[Var]) {
    assert_eq!(results.len(), RES_PER_POSITION * (inputs.len() + 1));
    let none = |p: usize| results[RES_PER_POSITION * p];
    let one = |p: usize| results[RES_PER_POSITION * p + 1];
    let many = |p: usize| results[RES_PER_POSITION * p + 2];

    // Before any input: count is zero.
    solver.add_clause(&[Lit::positive(none(0))]);
    solver.add_clause(&[Lit::negative(one(0))]);
    solver.add_clause(&[Lit::negative(many(0))]);

    for (p, &input) in inputs.iter().enumerate() {
        let s = Lit::positive(input);
        let (z, o, m) = (
            Lit::positive(none(p)),
            Lit::positive(one(p)),
            Lit::positive(many(p)),
        );
        let (z2, o2, m2) = (
            Lit::positive(none(p + 1)),
            Lit::positive(one(p + 1)),
            Lit::positive(many(p + 1)),
        );

        // none' <-> none & !s
        solver.add_clause(&[!z2, z]);
        solver.add_clause(&[!z2, !s]);
        solver.add_clause(&[z2, !z, s]);

        // one' <-> (one & !s) | (none & s)
        solver.add_clause(&[!o2, o, z]);
        solver.add_clause(&[!o2, o, s]);
        solver.add_clause(&[!o2, !s, z]);
        solver.add_clause(&[o2, !o, s]);
        solver.add_clause(&[o2, !z, !s]);

        // many' <-> many | (one & s)
        solver.add_clause(&[!m2, m, o]);
        solver.add_clause(&[!m2, m, s]);
        solver.add_clause(&[m2, !m]);
        solver.add_clause(&[m2, !o, !s]);
    }

    // Final count is exactly one.
    solver.add_clause(&[Lit::positive(one(inputs.len()))]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::{SolveOutcome, VarisatSolver};

    /// Enumerates all models over the input variables by blocking each one.
    fn input_models(num_inputs: usize) -> Vec<Vec<bool>> {
        let mut solver = VarisatSolver::new();
        let total = num_inputs + RES_PER_POSITION * (num_inputs + 1);
        solver.set_var_count(total);
        let inputs: Vec<Var> = (0..num_inputs).map(Var::from_index).collect();
        let results: Vec<Var> = (num_inputs..total).map(Var::from_index).collect();
        encode_exactly_one(&mut solver, &inputs, &results);

        let mut models = Vec::new();
        while solver.solve(0) == SolveOutcome::Sat {
            let model: Vec<bool> = inputs.iter().map(|&v| solver.var_value(v)).collect();
            let block: Vec<Lit> = inputs
                .iter()
                .zip(&model)
                .map(|(&v, &b)| Lit::equals(v, !b))
                .collect();
            solver.add_clause(&block);
            models.push(model);
        }
        models
    }

    #[test]
    fn test_exactly_one_models() {
        for n in 1..=4 {
            let mut models = input_models(n);
            models.sort();
            assert_eq!(models.len(), n, "n = {}", n);
            for model in &models {
                assert_eq!(model.iter().filter(|&&b| b).count(), 1);
            }
        }
    }
}
