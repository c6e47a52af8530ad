// SPDX-License-Identifier: Apache-2.0

//! The solver seam: the engine only ever talks to a SAT backend through
//! [`CnfSolver`], so solving stays external and tests can instrument it.
//!
//! The shipped backend wraps `varisat`, which supports the incremental
//! add-clause/re-solve pattern the refinement loop relies on.

use std::fmt;
use std::ops::Not;

/// A 0-based SAT variable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(u32);

impl Var {
    pub fn from_index(index: usize) -> Var {
        Var(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A literal: a variable with a polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lit {
    var: Var,
    negated: bool,
}

impl Lit {
    pub fn positive(var: Var) -> Lit {
        Lit { var, negated: false }
    }

    pub fn negative(var: Var) -> Lit {
        Lit { var, negated: true }
    }

    /// The literal that is true exactly when `var` has `value`.
    pub fn equals(var: Var, value: bool) -> Lit {
        Lit { var, negated: !value }
    }

    /// The literal that is true exactly when `var` differs from `value`.
    pub fn differs(var: Var, value: bool) -> Lit {
        Lit { var, negated: value }
    }

    pub fn var(self) -> Var {
        self.var
    }

    pub fn is_negated(self) -> bool {
        self.negated
    }
}

impl Not for Lit {
    type Output = Lit;
    fn not(self) -> Lit {
        Lit {
            var: self.var,
            negated: !self.negated,
        }
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", if self.negated { "!" } else { "" }, self.var.0)
    }
}

/// Outcome of one `solve` call. `Timeout` means the budget ran out before a
/// verdict; it must never be conflated with `Unsat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    Sat,
    Unsat,
    Timeout,
}

/// The add-clause / solve / read-model surface the engine compiles against.
pub trait CnfSolver {
    /// Declares the variable universe `0..n`.
    fn set_var_count(&mut self, n: usize);

    fn add_clause(&mut self, lits: &[Lit]);

    /// Runs the solver under a conflict budget (0 = unbounded). Backends
    /// without budget support may run to completion and never report
    /// `Timeout`.
    fn solve(&mut self, conflict_budget: u64) -> SolveOutcome;

    /// Value of `v` in the model of the last `Sat` outcome.
    fn var_value(&self, v: Var) -> bool;

    fn clause_count(&self) -> usize;

    /// Drops all clauses and the model; variables must be re-declared.
    fn restart(&mut self);
}

/// [`CnfSolver`] backed by an incremental `varisat` instance.
pub struct VarisatSolver<'a> {
    solver: varisat::Solver<'a>,
    num_vars: usize,
    num_clauses: usize,
    model: Vec<bool>,
}

impl VarisatSolver<'_> {
    pub fn new() -> Self {
        VarisatSolver {
            solver: varisat::Solver::new(),
            num_vars: 0,
            num_clauses: 0,
            model: Vec::new(),
        }
    }
}

impl Default for VarisatSolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl CnfSolver for VarisatSolver<'_> {
    fn set_var_count(&mut self, n: usize) {
        self.num_vars = n;
    }

    fn add_clause(&mut self, lits: &[Lit]) {
        use varisat::ExtendFormula;
        let mapped: Vec<varisat::Lit> = lits
            .iter()
            .map(|lit| {
                debug_assert!(lit.var().index() < self.num_vars);
                let var = varisat::Var::from_index(lit.var().index());
                if lit.is_negated() {
                    varisat::Lit::negative(var)
                } else {
                    varisat::Lit::positive(var)
                }
            })
            .collect();
        self.solver.add_clause(&mapped);
        self.num_clauses += 1;
    }

    fn solve(&mut self, conflict_budget: u64) -> SolveOutcome {
        // varisat exposes no conflict budget; it always runs to a verdict.
        if conflict_budget > 0 {
            log::trace!("conflict budget {} not enforced by varisat", conflict_budget);
        }
        match self.solver.solve() {
            Ok(true) => {
                self.model = vec![false; self.num_vars];
                let model = self.solver.model().expect("model available after Sat");
                for lit in model {
                    let idx = lit.var().index();
                    if idx < self.num_vars {
                        self.model[idx] = lit.is_positive();
                    }
                }
                SolveOutcome::Sat
            }
            Ok(false) => SolveOutcome::Unsat,
            Err(e) => panic!("solver error: {:?}", e),
        }
    }

    fn var_value(&self, v: Var) -> bool {
        self.model.get(v.index()).copied().unwrap_or(false)
    }

    fn clause_count(&self) -> usize {
        self.num_clauses
    }

    fn restart(&mut self) {
        self.solver = varisat::Solver::new();
        self.num_vars = 0;
        self.num_clauses = 0;
        self.model.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lit_helpers() {
        let v = Var::from_index(3);
        assert_eq!(Lit::equals(v, true), Lit::positive(v));
        assert_eq!(Lit::equals(v, false), Lit::negative(v));
        assert_eq!(Lit::differs(v, true), Lit::negative(v));
        assert_eq!(!Lit::positive(v), Lit::negative(v));
    }

    #[test]
    fn test_varisat_basic_solve() {
        let mut solver = VarisatSolver::new();
        solver.set_var_count(2);
        let a = Var::from_index(0);
        let b = Var::from_index(1);
        solver.add_clause(&[Lit::positive(a), Lit::positive(b)]);
        solver.add_clause(&[Lit::negative(a)]);
        assert_eq!(solver.solve(0), SolveOutcome::Sat);
        assert!(!solver.var_value(a));
        assert!(solver.var_value(b));
        assert_eq!(solver.clause_count(), 2);
    }

    #[test]
    fn test_varisat_unsat_and_restart() {
        let mut solver = VarisatSolver::new();
        solver.set_var_count(1);
        let a = Var::from_index(0);
        solver.add_clause(&[Lit::positive(a)]);
        solver.add_clause(&[Lit::negative(a)]);
        assert_eq!(solver.solve(0), SolveOutcome::Unsat);
        solver.restart();
        solver.set_var_count(1);
        solver.add_clause(&[Lit::positive(a)]);
        assert_eq!(solver.solve(0), SolveOutcome::Sat);
    }

    #[test]
    fn test_incremental_refinement() {
        let mut solver = VarisatSolver::new();
        solver.set_var_count(2);
        let a = Var::from_index(0);
        let b = Var::from_index(1);
        solver.add_clause(&[Lit::positive(a), Lit::positive(b)]);
        assert_eq!(solver.solve(0), SolveOutcome::Sat);
        solver.add_clause(&[Lit::negative(a)]);
        assert_eq!(solver.solve(0), SolveOutcome::Sat);
        assert!(solver.var_value(b));
        solver.add_clause(&[Lit::negative(b)]);
        assert_eq!(solver.solve(0), SolveOutcome::Unsat);
    }
}
