// SPDX-License-Identifier: Apache-2.0

//! The synthesized circuit: an ordered list of 2-input gate steps plus the
//! output wiring.
//!
//! Step operands live in a combined index space: `0..n` are the primary
//! inputs, `n + i` is step `i`. Output references use a separate numbering
//! with a constant slot: encoded as `(node_ref << 1) | inversion` where
//! `node_ref` 0 is constant false, `1..=n` the inputs, and `n + 1 + i` step
//! `i`.

use crate::tt::{Gate2, Tt};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct ChainStep {
    pub operands: [usize; 2],
    pub op: Gate2,
}

#[derive(Debug, Clone, Serialize)]
pub struct Chain {
    num_inputs: usize,
    steps: Vec<ChainStep>,
    outputs: Vec<u32>,
}

impl Chain {
    pub fn new(num_inputs: usize, num_outputs: usize, num_steps: usize) -> Self {
        Chain {
            num_inputs,
            steps: vec![
                ChainStep {
                    operands: [0, 0],
                    op: Gate2::ZERO,
                };
                num_steps
            ],
            outputs: vec![0; num_outputs],
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, i: usize) -> &ChainStep {
        &self.steps[i]
    }

    pub fn set_step(&mut self, i: usize, operands: [usize; 2], op: Gate2) {
        debug_assert!(
            operands
                .iter()
                .all(|&o| o < self.num_inputs + i),
            "step {} refers forward: {:?}",
            i,
            operands
        );
        self.steps[i] = ChainStep { operands, op };
    }

    pub fn set_output(&mut self, h: usize, encoded_ref: u32) {
        self.outputs[h] = encoded_ref;
    }

    pub fn output(&self, h: usize) -> u32 {
        self.outputs[h]
    }

    /// Decodes output `h` into its node reference and inversion flag.
    pub fn output_ref(&self, h: usize) -> (usize, bool) {
        let enc = self.outputs[h];
        ((enc >> 1) as usize, enc & 1 == 1)
    }

    /// Evaluates every node as a truth table and returns the output tables.
    pub fn simulate(&self) -> Vec<Tt> {
        let n = self.num_inputs;
        let mut node_tts: Vec<Tt> = (0..n).map(|i| Tt::nth_var(n, i)).collect();
        for step in &self.steps {
            let tt = step.op.apply(&node_tts[step.operands[0]], &node_tts[step.operands[1]]);
            node_tts.push(tt);
        }
        (0..self.outputs.len())
            .map(|h| {
                let (node_ref, inverted) = self.output_ref(h);
                let tt = if node_ref == 0 {
                    Tt::zero(n)
                } else if node_ref <= n {
                    Tt::nth_var(n, node_ref - 1)
                } else {
                    node_tts[node_ref - 1].clone()
                };
                if inverted { !&tt } else { tt }
            })
            .collect()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            let name = |o: usize| {
                if o < self.num_inputs {
                    format!("x{}", o)
                } else {
                    format!("s{}", o - self.num_inputs)
                }
            };
            writeln!(
                f,
                "s{} = {}({}, {})",
                i,
                step.op,
                name(step.operands[0]),
                name(step.operands[1])
            )?;
        }
        for h in 0..self.outputs.len() {
            let (node_ref, inverted) = self.output_ref(h);
            let name = if node_ref == 0 {
                "0".to_string()
            } else if node_ref <= self.num_inputs {
                format!("x{}", node_ref - 1)
            } else {
                format!("s{}", node_ref - self.num_inputs - 1)
            };
            writeln!(f, "o{} = {}{}", h, if inverted { "!" } else { "" }, name)?;
        }
        Ok(())
    }
}
