// SPDX-License-Identifier: Apache-2.0

//! Allocation of SAT variables for one (specification, skeleton) pair.
//!
//! The variable range is partitioned into disjoint contiguous blocks:
//! selection, cardinality-result (incremental mode only), operator, output
//! and simulation variables. All offset arithmetic lives here; the rest of
//! the engine asks for typed handles by `(kind, step, index)`.
//!
//! The builder also fixes the candidate operand bindings of every step
//! once: selection variable `sel(i, c)` stands for "step `i` uses binding
//! `bindings(i)[c]`". Operands are in the combined index space `0..n` =
//! primary inputs, `n + s` = step `s`. Free slots only ever bind to
//! primary inputs.

use crate::partial_dag::{Fanin, PartialDag};
use crate::sat::Var;
use crate::spec::SynthSpec;

/// Operator variables per step: the gate's truth-table bits 1..=3 (bit 0 is
/// fixed to zero, operators are normal).
pub const OP_VARS_PER_STEP: usize = 3;

#[derive(Debug)]
pub struct VarSpace {
    num_inputs: usize,
    num_steps: usize,
    num_rows: usize,
    num_nontriv: usize,
    bindings: Vec<Vec<[usize; 2]>>,
    sel_counts: Vec<usize>,
    sel_offsets: Vec<usize>,
    res_offsets: Option<Vec<usize>>,
    op_offset: usize,
    out_offset: usize,
    sim_offset: usize,
    total: usize,
}

impl VarSpace {
    pub fn build(spec: &SynthSpec, dag: &PartialDag, with_cardinality: bool) -> VarSpace {
        let n = spec.num_inputs();
        let num_steps = dag.num_steps();

        let mut bindings = Vec::with_capacity(num_steps);
        let mut sel_counts = Vec::with_capacity(num_steps);
        for i in 0..num_steps {
            let step_bindings = step_bindings(dag, i, n);
            sel_counts.push(if dag.free_slots(i) > 0 {
                step_bindings.len()
            } else {
                0
            });
            bindings.push(step_bindings);
        }

        let mut cursor = 0;
        let sel_offsets = sel_counts
            .iter()
            .map(|&count| {
                let offset = cursor;
                cursor += count;
                offset
            })
            .collect();

        let res_offsets = with_cardinality.then(|| {
            sel_counts
                .iter()
                .map(|&count| {
                    let offset = cursor;
                    if count > 0 {
                        cursor += 3 * (count + 1);
                    }
                    offset
                })
                .collect()
        });

        let op_offset = cursor;
        cursor += num_steps * OP_VARS_PER_STEP;
        let out_offset = cursor;
        cursor += spec.num_nontrivial() * num_steps;
        let sim_offset = cursor;
        cursor += num_steps * spec.num_rows();

        VarSpace {
            num_inputs: n,
            num_steps,
            num_rows: spec.num_rows(),
            num_nontriv: spec.num_nontrivial(),
            bindings,
            sel_counts,
            sel_offsets,
            res_offsets,
            op_offset,
            out_offset,
            sim_offset,
            total: cursor,
        }
    }

    pub fn var_count(&self) -> usize {
        self.total
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Candidate operand pairs of step `i`. A fixed step has exactly one.
    pub fn bindings(&self, i: usize) -> &[[usize; 2]] {
        &self.bindings[i]
    }

    /// Number of selection variables of step `i` (0 for a fixed step).
    pub fn sel_count(&self, i: usize) -> usize {
        self.sel_counts[i]
    }

    pub fn sel(&self, i: usize, choice: usize) -> Var {
        debug_assert!(choice < self.sel_counts[i]);
        Var::from_index(self.sel_offsets[i] + choice)
    }

    /// Cardinality-result variable `idx` of step `i`; the block holds
    /// `3 * (sel_count + 1)` variables per free-slot step.
    pub fn res(&self, i: usize, idx: usize) -> Var {
        let offsets = self
            .res_offsets
            .as_ref()
            .expect("cardinality block not allocated");
        debug_assert!(self.sel_counts[i] > 0);
        debug_assert!(idx < 3 * (self.sel_counts[i] + 1));
        Var::from_index(offsets[i] + idx)
    }

    /// Operator variable for truth-table bit `bit + 1` of step `i`.
    pub fn op(&self, i: usize, bit: usize) -> Var {
        debug_assert!(bit < OP_VARS_PER_STEP);
        Var::from_index(self.op_offset + i * OP_VARS_PER_STEP + bit)
    }

    /// Output-selection variable: nontrivial output `h` driven by step `i`.
    pub fn out(&self, h: usize, i: usize) -> Var {
        debug_assert!(h < self.num_nontriv);
        debug_assert!(i < self.num_steps);
        Var::from_index(self.out_offset + h * self.num_steps + i)
    }

    /// Simulation variable: output bit of step `i` on encoder row `t`.
    pub fn sim(&self, i: usize, t: usize) -> Var {
        debug_assert!(t < self.num_rows);
        Var::from_index(self.sim_offset + i * self.num_rows + t)
    }
}

/// The operand pairs step `i` can take, in selection-variable order.
fn step_bindings(dag: &PartialDag, i: usize, n: usize) -> Vec<[usize; 2]> {
    let resolve = |fanin: Fanin| match fanin {
        Fanin::Input(idx) => idx,
        Fanin::Step(s) => n + s,
        Fanin::Free => unreachable!("free slot has no fixed operand"),
    };
    let [a, b] = dag.step(i);
    match dag.free_slots(i) {
        2 => {
            let mut pairs = Vec::with_capacity(n * (n - 1) / 2);
            for k in 1..n {
                for j in 0..k {
                    pairs.push([j, k]);
                }
            }
            pairs
        }
        1 => {
            let fixed = resolve(b);
            (0..n).map(|j| [j, fixed]).collect()
        }
        _ => vec![[resolve(a), resolve(b)]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partial_dag::Fanin;
    use crate::tt::Tt;

    fn three_step_dag() -> PartialDag {
        PartialDag::new(vec![
            [Fanin::Free, Fanin::Free],
            [Fanin::Free, Fanin::Step(0)],
            [Fanin::Step(0), Fanin::Step(1)],
        ])
        .unwrap()
    }

    fn spec3() -> SynthSpec {
        SynthSpec::new(vec![Tt::from_u64(3, 0xe8)]).unwrap()
    }

    #[test]
    fn test_binding_counts() {
        let spec = spec3();
        let vars = VarSpace::build(&spec, &three_step_dag(), false);
        assert_eq!(vars.sel_count(0), 3); // C(3, 2)
        assert_eq!(vars.sel_count(1), 3); // one free slot
        assert_eq!(vars.sel_count(2), 0); // fully fixed
        assert_eq!(vars.bindings(2), &[[3, 4]]);
    }

    #[test]
    fn test_blocks_are_disjoint_and_cover_range() {
        let spec = spec3();
        let vars = VarSpace::build(&spec, &three_step_dag(), true);
        let mut seen = vec![false; vars.var_count()];
        let mut mark = |v: Var| {
            assert!(!seen[v.index()], "overlap at {}", v.index());
            seen[v.index()] = true;
        };
        for i in 0..3 {
            for c in 0..vars.sel_count(i) {
                mark(vars.sel(i, c));
            }
            if vars.sel_count(i) > 0 {
                for idx in 0..3 * (vars.sel_count(i) + 1) {
                    mark(vars.res(i, idx));
                }
            }
            for bit in 0..OP_VARS_PER_STEP {
                mark(vars.op(i, bit));
            }
            for t in 0..spec.num_rows() {
                mark(vars.sim(i, t));
            }
        }
        for h in 0..spec.num_nontrivial() {
            for i in 0..3 {
                mark(vars.out(h, i));
            }
        }
        assert!(seen.iter().all(|&b| b), "gap in the variable range");
    }

    #[test]
    fn test_rebuild_is_identical() {
        let spec = spec3();
        let dag = three_step_dag();
        let a = VarSpace::build(&spec, &dag, true);
        let b = VarSpace::build(&spec, &dag, true);
        assert_eq!(a.var_count(), b.var_count());
        assert_eq!(a.sel(1, 2), b.sel(1, 2));
        assert_eq!(a.sim(2, 5), b.sim(2, 5));
    }
}
