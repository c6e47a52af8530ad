// SPDX-License-Identifier: Apache-2.0

//! Decoding a satisfying assignment back into a concrete chain.

use crate::chain::Chain;
use crate::partial_dag::PartialDag;
use crate::sat::CnfSolver;
use crate::spec::SynthSpec;
use crate::tt::Gate2;
use crate::var_space::{OP_VARS_PER_STEP, VarSpace};

/// The 2-input function step `i` computes in the model.
pub fn decode_step_op(solver: &impl CnfSolver, vars: &VarSpace, i: usize) -> Gate2 {
    let mut bits = 0u8;
    for bit in 0..OP_VARS_PER_STEP {
        if solver.var_value(vars.op(i, bit)) {
            bits |= 1 << (bit + 1);
        }
    }
    Gate2::from_bits(bits)
}

/// The operand pair step `i` uses in the model: the fixed binding, or the
/// first selected one.
pub fn decode_step_operands(solver: &impl CnfSolver, vars: &VarSpace, i: usize) -> [usize; 2] {
    if vars.sel_count(i) == 0 {
        return vars.bindings(i)[0];
    }
    for (choice, &binding) in vars.bindings(i).iter().enumerate() {
        if solver.var_value(vars.sel(i, choice)) {
            return binding;
        }
    }
    panic!("model selects no binding for step {}", i);
}

/// The step driving the `h`-th nontrivial output in the model.
pub fn decode_output_step(
    solver: &impl CnfSolver,
    vars: &VarSpace,
    num_steps: usize,
    h: usize,
) -> usize {
    for i in 0..num_steps {
        if solver.var_value(vars.out(h, i)) {
            return i;
        }
    }
    panic!("model selects no step for output {}", h);
}

/// Assembles the chain a satisfying assignment describes. Trivial outputs
/// come straight from the specification tags; the rest read their selected
/// step from the model.
pub fn extract_chain(
    spec: &SynthSpec,
    dag: &PartialDag,
    vars: &VarSpace,
    solver: &impl CnfSolver,
) -> Chain {
    let n = spec.num_inputs();
    let mut chain = Chain::new(n, spec.num_outputs(), dag.num_steps());
    for i in 0..dag.num_steps() {
        let op = decode_step_op(solver, vars, i);
        let operands = decode_step_operands(solver, vars, i);
        log::debug!("step {} computes {} on {:?}", i, op, operands);
        chain.set_step(i, operands, op);
    }

    let mut nontriv_count = 0;
    for h in 0..spec.num_outputs() {
        let inv = spec.output_inverted(h) as u32;
        if spec.is_trivial_output(h) {
            chain.set_output(h, (spec.trivial_ref(h) << 1) | inv);
            continue;
        }
        let step = decode_output_step(solver, vars, dag.num_steps(), nontriv_count);
        nontriv_count += 1;
        chain.set_output(h, (((n + 1 + step) as u32) << 1) | inv);
    }
    chain
}
