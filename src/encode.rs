// SPDX-License-Identifier: Apache-2.0

//! The CNF compiler: turns one (specification, skeleton) pair into clause
//! families pushed at a [`CnfSolver`].
//!
//! Encoding conventions:
//! - Every step computes a normal 2-input function; its three operator
//!   variables are the gate truth-table bits 1..=3, bit 0 being implicitly
//!   zero. Simulation therefore only covers table rows `1..2^n`, and
//!   encoder row `t` is the operand assignment `t + 1`.
//! - A selection variable pins a step to one operand binding from
//!   [`VarSpace::bindings`]; fixed bindings compile to static row bits
//!   that can discharge a clause at compile time.
//!
//! `encode` (direct mode) emits the structural families plus every
//! simulation row up front; `encode_structural` (incremental mode) leaves
//! the rows to the refinement loop, which feeds them back through
//! `emit_row` one counterexample at a time.

use crate::cardinality;
use crate::partial_dag::PartialDag;
use crate::sat::{CnfSolver, Lit};
use crate::spec::SynthSpec;
use crate::tt::Gate2;
use crate::var_space::{OP_VARS_PER_STEP, VarSpace};

pub struct Encoder<'a> {
    spec: &'a SynthSpec,
    dag: &'a PartialDag,
    vars: VarSpace,
}

impl<'a> Encoder<'a> {
    /// Builds the variable space for direct (one-shot) encoding and
    /// declares it to the solver.
    pub fn new_direct(spec: &'a SynthSpec, dag: &'a PartialDag, solver: &mut impl CnfSolver) -> Self {
        Self::new(spec, dag, solver, false)
    }

    /// Builds the variable space for incremental encoding, including the
    /// cardinality-result block.
    pub fn new_cegar(spec: &'a SynthSpec, dag: &'a PartialDag, solver: &mut impl CnfSolver) -> Self {
        Self::new(spec, dag, solver, true)
    }

    fn new(
        spec: &'a SynthSpec,
        dag: &'a PartialDag,
        solver: &mut impl CnfSolver,
        with_cardinality: bool,
    ) -> Self {
        let vars = VarSpace::build(spec, dag, with_cardinality);
        solver.set_var_count(vars.var_count());
        log::debug!(
            "encoding {} steps, {} vars ({} rows)",
            dag.num_steps(),
            vars.var_count(),
            spec.num_rows()
        );
        Encoder { spec, dag, vars }
    }

    pub fn vars(&self) -> &VarSpace {
        &self.vars
    }

    /// Emits the complete direct-mode encoding. Returns false when a
    /// family detects a contradiction while compiling; the caller discards
    /// the solver state and moves on to another skeleton.
    pub fn encode(&self, solver: &mut impl CnfSolver) -> bool {
        self.fanin_clauses(solver);
        for t in 0..self.spec.num_rows() {
            self.emit_row(solver, t);
        }
        self.output_choice_clauses(solver);
        if !self.operator_set_clauses(solver) {
            return false;
        }
        if self.spec.add_noreapply_clauses {
            self.noreapply_clauses(solver);
        }
        if self.spec.add_symmetry_clauses {
            self.symmetry_clauses(solver);
        }
        if self.spec.require_all_inputs && !self.all_inputs_clauses(solver) {
            return false;
        }
        true
    }

    /// Emits only the row-independent families; simulation rows are added
    /// later through `emit_row`.
    pub fn encode_structural(&self, solver: &mut impl CnfSolver) -> bool {
        self.cardinality_clauses(solver);
        self.fanin_clauses(solver);
        self.output_choice_clauses(solver);
        if !self.operator_set_clauses(solver) {
            return false;
        }
        if self.spec.add_noreapply_clauses {
            self.noreapply_clauses(solver);
        }
        if self.spec.add_symmetry_clauses {
            self.symmetry_clauses(solver);
        }
        if self.spec.require_all_inputs && !self.all_inputs_clauses(solver) {
            return false;
        }
        true
    }

    /// Every step with a free slot takes at least one of its bindings.
    fn fanin_clauses(&self, solver: &mut impl CnfSolver) {
        for i in 0..self.dag.num_steps() {
            let count = self.vars.sel_count(i);
            if count == 0 {
                continue;
            }
            let lits: Vec<Lit> = (0..count).map(|c| Lit::positive(self.vars.sel(i, c))).collect();
            solver.add_clause(&lits);
        }
    }

    /// Simulation and output-consistency clauses for encoder row `t`.
    pub fn emit_row(&self, solver: &mut impl CnfSolver, t: usize) {
        for i in 0..self.dag.num_steps() {
            let has_sel = self.vars.sel_count(i) > 0;
            for (choice, &[j, k]) in self.vars.bindings(i).iter().enumerate() {
                let sel = has_sel.then(|| self.vars.sel(i, choice));
                for &(a, b, c) in &[
                    (false, false, true),
                    (false, true, false),
                    (false, true, true),
                    (true, false, false),
                    (true, false, true),
                    (true, true, false),
                    (true, true, true),
                ] {
                    self.simulation_clause(solver, t, i, j, k, a, b, c, sel);
                }
            }
        }
        self.output_row_clauses(solver, t);
    }

    /// One implication tying step `i`'s simulation bit on row `t` to its
    /// operator bit, for operand values `(b, c)` and step value `a`.
    ///
    /// The (a, b, c) = (0, 0, 0) case needs no clause: a normal operator
    /// already fixes the gate output to 0 on the all-zero operand row.
    #[allow(clippy::too_many_arguments)]
    fn simulation_clause(
        &self,
        solver: &mut impl CnfSolver,
        t: usize,
        i: usize,
        j: usize,
        k: usize,
        a: bool,
        b: bool,
        c: bool,
        sel: Option<crate::sat::Var>,
    ) {
        let n = self.spec.num_inputs();
        let mut lits: Vec<Lit> = Vec::with_capacity(5);

        // Operand literals become static bits for primary inputs; a
        // mismatch with the wanted value discharges the whole clause.
        if j < n {
            if input_row_bit(j, t) != b {
                return;
            }
        } else {
            lits.push(Lit::differs(self.vars.sim(j - n, t), b));
        }
        if k < n {
            if input_row_bit(k, t) != c {
                return;
            }
        } else {
            lits.push(Lit::differs(self.vars.sim(k - n, t), c));
        }

        if let Some(sel) = sel {
            lits.push(Lit::negative(sel));
        }
        lits.push(Lit::differs(self.vars.sim(i, t), a));
        if b || c {
            let minterm = ((c as usize) << 1) | b as usize;
            lits.push(Lit::equals(self.vars.op(i, minterm - 1), a));
        }
        solver.add_clause(&lits);
    }

    /// Output-consistency clauses for row `t`: a step driving an output
    /// must match that output's target bit unless the row is a don't-care.
    fn output_row_clauses(&self, solver: &mut impl CnfSolver, t: usize) {
        for h in 0..self.spec.num_nontrivial() {
            if self.spec.is_dont_care(h, t) {
                continue;
            }
            let target = self.spec.target_bit(h, t);
            for i in self.eligible_output_steps() {
                solver.add_clause(&[
                    Lit::negative(self.vars.out(h, i)),
                    Lit::equals(self.vars.sim(i, t), target),
                ]);
            }
        }
    }

    /// Each nontrivial output selects exactly one eligible step, and the
    /// final step drives at least one output.
    fn output_choice_clauses(&self, solver: &mut impl CnfSolver) {
        if self.spec.num_nontrivial() == 0 || self.dag.num_steps() == 0 {
            return;
        }
        let eligible: Vec<usize> = self.eligible_output_steps().collect();
        for h in 0..self.spec.num_nontrivial() {
            for i in 0..self.eligible_output_steps().start {
                solver.add_clause(&[Lit::negative(self.vars.out(h, i))]);
            }
            let lits: Vec<Lit> = eligible
                .iter()
                .map(|&i| Lit::positive(self.vars.out(h, i)))
                .collect();
            solver.add_clause(&lits);
            for (x, &i) in eligible.iter().enumerate() {
                for &ip in &eligible[x + 1..] {
                    solver.add_clause(&[
                        Lit::negative(self.vars.out(h, i)),
                        Lit::negative(self.vars.out(h, ip)),
                    ]);
                }
            }
        }
        let last = self.dag.num_steps() - 1;
        let lits: Vec<Lit> = (0..self.spec.num_nontrivial())
            .map(|h| Lit::positive(self.vars.out(h, last)))
            .collect();
        solver.add_clause(&lits);
    }

    fn eligible_output_steps(&self) -> std::ops::Range<usize> {
        let steps = self.dag.num_steps();
        let window = self.spec.output_window.unwrap_or(steps).min(steps);
        steps - window..steps
    }

    /// Operator constraints: either the declared restriction, or the
    /// non-triviality family that forbids constant zero and projections.
    /// Returns false when the restriction admits no representable gate.
    fn operator_set_clauses(&self, solver: &mut impl CnfSolver) -> bool {
        match self.spec.normal_allowed_ops() {
            Some(allowed) => self.restricted_operator_clauses(solver, &allowed),
            None => {
                self.nontrivial_operator_clauses(solver);
                true
            }
        }
    }

    fn nontrivial_operator_clauses(&self, solver: &mut impl CnfSolver) {
        for i in 0..self.dag.num_steps() {
            let op = |bit: usize| self.vars.op(i, bit);
            // Constant zero.
            solver.add_clause(&[
                Lit::positive(op(0)),
                Lit::positive(op(1)),
                Lit::positive(op(2)),
            ]);
            // Projection onto the second operand.
            solver.add_clause(&[
                Lit::positive(op(0)),
                Lit::negative(op(1)),
                Lit::negative(op(2)),
            ]);
            // Projection onto the first operand.
            solver.add_clause(&[
                Lit::negative(op(0)),
                Lit::positive(op(1)),
                Lit::negative(op(2)),
            ]);
        }
    }

    fn restricted_operator_clauses(&self, solver: &mut impl CnfSolver, allowed: &[Gate2]) -> bool {
        if allowed.is_empty() {
            log::debug!("operator restriction admits no normal gate");
            return false;
        }
        if let [only] = allowed {
            for i in 0..self.dag.num_steps() {
                for bit in 0..OP_VARS_PER_STEP {
                    solver.add_clause(&[Lit::equals(self.vars.op(i, bit), only.get_bit(bit + 1))]);
                }
            }
            return true;
        }
        for bits in (0u8..16).step_by(2) {
            let gate = Gate2::from_bits(bits);
            if allowed.contains(&gate) {
                continue;
            }
            for i in 0..self.dag.num_steps() {
                let lits: Vec<Lit> = (0..OP_VARS_PER_STEP)
                    .map(|bit| Lit::differs(self.vars.op(i, bit), gate.get_bit(bit + 1)))
                    .collect();
                solver.add_clause(&lits);
            }
        }
        true
    }

    /// Binding-level redundancy cuts: a later step must not recombine an
    /// earlier step with one of that step's own operands (depth 2), and
    /// two steps with identical operand pairs must not feed a common
    /// consumer (depth 3).
    fn noreapply_clauses(&self, solver: &mut impl CnfSolver) {
        let n = self.spec.num_inputs();
        let steps = self.dag.num_steps();
        for i in 0..steps {
            let sel_i = self.vars.sel_count(i) > 0;
            for (ci, &[j, k]) in self.vars.bindings(i).iter().enumerate() {
                let lit_i = sel_i.then(|| Lit::negative(self.vars.sel(i, ci)));
                for ip in i + 1..steps {
                    let sel_ip = self.vars.sel_count(ip) > 0;
                    for (cip, &[jp, kp]) in self.vars.bindings(ip).iter().enumerate() {
                        let lit_ip = sel_ip.then(|| Lit::negative(self.vars.sel(ip, cip)));
                        if kp == n + i && (jp == j || jp == k) {
                            let lits: Vec<Lit> = [lit_i, lit_ip].into_iter().flatten().collect();
                            if lits.len() > 1 {
                                solver.add_clause(&lits);
                            }
                        }
                        for ipp in ip + 1..steps {
                            let sel_ipp = self.vars.sel_count(ipp) > 0;
                            for (cipp, &[jpp, kpp]) in
                                self.vars.bindings(ipp).iter().enumerate()
                            {
                                if j == jp && k == kp && jpp == n + i && kpp == n + ip {
                                    let lit_ipp =
                                        sel_ipp.then(|| Lit::negative(self.vars.sel(ipp, cipp)));
                                    let lits: Vec<Lit> = [lit_i, lit_ip, lit_ipp]
                                        .into_iter()
                                        .flatten()
                                        .collect();
                                    if lits.len() > 1 {
                                        solver.add_clause(&lits);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// For every input pair (p, q) the targets are symmetric in, force q to
    /// appear at a step only if p already appears at an earlier one.
    fn symmetry_clauses(&self, solver: &mut impl CnfSolver) {
        let n = self.spec.num_inputs();
        for q in 1..n {
            for p in 0..q {
                if !self.spec.symmetric_in(p, q) {
                    continue;
                }
                log::trace!("breaking symmetry between inputs {} and {}", p, q);
                for i in 1..self.dag.num_steps() {
                    if self.vars.sel_count(i) == 0 {
                        continue;
                    }
                    for (c, &[j, k]) in self.vars.bindings(i).iter().enumerate() {
                        // Bindings that use q but not p.
                        if !(j == q || k == q) || j == p {
                            continue;
                        }
                        let mut lits = vec![Lit::negative(self.vars.sel(i, c))];
                        for ip in 0..i {
                            for (cp, &[jp, kp]) in self.vars.bindings(ip).iter().enumerate() {
                                if self.vars.sel_count(ip) > 0 && (jp == p || kp == p) {
                                    lits.push(Lit::positive(self.vars.sel(ip, cp)));
                                }
                            }
                        }
                        solver.add_clause(&lits);
                    }
                }
            }
        }
    }

    /// Every primary input must be selected by some step. Returns false
    /// when an input cannot possibly be used on this skeleton.
    fn all_inputs_clauses(&self, solver: &mut impl CnfSolver) -> bool {
        let n = self.spec.num_inputs();
        for input in 0..n {
            let mut fixed_use = false;
            let mut lits = Vec::new();
            for i in 0..self.dag.num_steps() {
                let has_sel = self.vars.sel_count(i) > 0;
                for (c, &[j, k]) in self.vars.bindings(i).iter().enumerate() {
                    if j != input && k != input {
                        continue;
                    }
                    if has_sel {
                        lits.push(Lit::positive(self.vars.sel(i, c)));
                    } else {
                        fixed_use = true;
                    }
                }
            }
            if fixed_use {
                continue;
            }
            if lits.is_empty() {
                log::debug!("input {} cannot be used on this skeleton", input);
                return false;
            }
            solver.add_clause(&lits);
        }
        true
    }

    /// Exactly-one binding per free-slot step, via the counting circuit.
    fn cardinality_clauses(&self, solver: &mut impl CnfSolver) {
        for i in 0..self.dag.num_steps() {
            let count = self.vars.sel_count(i);
            if count == 0 {
                continue;
            }
            let inputs: Vec<_> = (0..count).map(|c| self.vars.sel(i, c)).collect();
            let results: Vec<_> = (0..cardinality::RES_PER_POSITION * (count + 1))
                .map(|idx| self.vars.res(i, idx))
                .collect();
            cardinality::encode_exactly_one(solver, &inputs, &results);
        }
    }
}

/// Value of primary input `j` on encoder row `t` (table row `t + 1`).
fn input_row_bit(j: usize, t: usize) -> bool {
    ((t + 1) >> j) & 1 == 1
}
