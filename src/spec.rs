// SPDX-License-Identifier: Apache-2.0

//! The synthesis target: one or more output truth tables plus the knobs that
//! control which clause families the encoder emits.
//!
//! Targets are normalized at construction: every output function is made
//! "normal" (value 0 on the all-zero input row) by complementing it and
//! recording the inversion, and outputs that are a constant or a bare input
//! are tagged trivial so the search never sees them. Row 0 of a normal
//! function is fixed, so clause emission only covers rows `1..2^n`; row
//! index `t` throughout the encoder refers to table row `t + 1`.

use crate::tt::{Gate2, MAX_INPUTS, Tt};
use std::fmt;

#[derive(Debug, Clone)]
pub struct SynthSpec {
    num_inputs: usize,
    /// Normalized targets, one per output, in declaration order.
    normalized: Vec<Tt>,
    dont_cares: Vec<Tt>,
    out_inv: u32,
    triv_flag: u32,
    /// Chain node reference for each trivial output (0 = constant false,
    /// `i + 1` = input `i`).
    triv_refs: Vec<u32>,
    /// Output positions that actually need synthesis.
    nontriv: Vec<usize>,

    /// Restricts every step to one of these 2-input functions. When unset,
    /// the non-triviality family applies instead.
    pub allowed_ops: Option<Vec<Gate2>>,
    pub add_noreapply_clauses: bool,
    pub add_symmetry_clauses: bool,
    /// Require every primary input to feed at least one step.
    pub require_all_inputs: bool,
    /// Number of trailing steps eligible to drive outputs; `None` = all.
    pub output_window: Option<usize>,
    /// Conflict budget handed to every `solve` call; 0 = unbounded.
    pub conflict_limit: u64,
    /// Chain size the size-increasing search starts from.
    pub initial_steps: usize,
}

impl SynthSpec {
    pub fn new(targets: Vec<Tt>) -> Result<Self, SpecError> {
        let Some(first) = targets.first() else {
            return Err(SpecError::NoOutputs);
        };
        let num_inputs = first.num_vars();
        if num_inputs < 2 {
            return Err(SpecError::TooFewInputs(num_inputs));
        }
        if num_inputs > MAX_INPUTS {
            return Err(SpecError::TooManyInputs(num_inputs));
        }
        if targets.len() > 32 {
            return Err(SpecError::TooManyOutputs(targets.len()));
        }
        if targets.iter().any(|t| t.num_vars() != num_inputs) {
            return Err(SpecError::MixedArity);
        }

        let mut spec = SynthSpec {
            num_inputs,
            normalized: Vec::with_capacity(targets.len()),
            dont_cares: vec![Tt::zero(num_inputs); targets.len()],
            out_inv: 0,
            triv_flag: 0,
            triv_refs: vec![0; targets.len()],
            nontriv: Vec::new(),
            allowed_ops: None,
            add_noreapply_clauses: true,
            add_symmetry_clauses: true,
            require_all_inputs: false,
            output_window: None,
            conflict_limit: 0,
            initial_steps: 1,
        };
        for (h, tt) in targets.into_iter().enumerate() {
            spec.normalize_output(h, tt);
        }
        Ok(spec)
    }

    pub fn with_dont_cares(mut self, dont_cares: Vec<Tt>) -> Result<Self, SpecError> {
        if dont_cares.len() != self.normalized.len()
            || dont_cares.iter().any(|t| t.num_vars() != self.num_inputs)
        {
            return Err(SpecError::MixedArity);
        }
        self.dont_cares = dont_cares;
        Ok(self)
    }

    fn normalize_output(&mut self, h: usize, tt: Tt) {
        let f = if tt.get(0) {
            self.out_inv |= 1 << h;
            !&tt
        } else {
            tt
        };
        if f.is_zero() {
            self.triv_flag |= 1 << h;
            self.triv_refs[h] = 0;
        } else if let Some(i) =
            (0..self.num_inputs).find(|&i| f == Tt::nth_var(self.num_inputs, i))
        {
            self.triv_flag |= 1 << h;
            self.triv_refs[h] = i as u32 + 1;
        } else {
            self.nontriv.push(h);
        }
        self.normalized.push(f);
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.normalized.len()
    }

    pub fn num_nontrivial(&self) -> usize {
        self.nontriv.len()
    }

    /// Row count the encoder iterates over (table rows `1..2^n`).
    pub fn num_rows(&self) -> usize {
        (1usize << self.num_inputs) - 1
    }

    /// Output position of the `h`-th nontrivial output.
    pub fn nontrivial_output(&self, h: usize) -> usize {
        self.nontriv[h]
    }

    pub fn is_trivial_output(&self, h: usize) -> bool {
        (self.triv_flag >> h) & 1 == 1
    }

    pub fn trivial_ref(&self, h: usize) -> u32 {
        debug_assert!(self.is_trivial_output(h));
        self.triv_refs[h]
    }

    pub fn output_inverted(&self, h: usize) -> bool {
        (self.out_inv >> h) & 1 == 1
    }

    /// Normalized table of output position `h`.
    pub fn normalized_target(&self, h: usize) -> &Tt {
        &self.normalized[h]
    }

    pub fn dont_care_mask(&self, h: usize) -> &Tt {
        &self.dont_cares[h]
    }

    /// Normalized target bit of the `h`-th nontrivial output at encoder row
    /// `t` (table row `t + 1`).
    pub fn target_bit(&self, h: usize, t: usize) -> bool {
        self.normalized[self.nontriv[h]].get(t + 1)
    }

    /// Whether encoder row `t` is a don't-care for the `h`-th nontrivial
    /// output.
    pub fn is_dont_care(&self, h: usize, t: usize) -> bool {
        self.dont_cares[self.nontriv[h]].get(t + 1)
    }

    /// True when every nontrivial target (and its don't-care mask) is
    /// invariant under exchanging inputs `p` and `q`.
    pub fn symmetric_in(&self, p: usize, q: usize) -> bool {
        self.nontriv.iter().all(|&h| {
            self.normalized[h].swap_vars(p, q) == self.normalized[h]
                && self.dont_cares[h].swap_vars(p, q) == self.dont_cares[h]
        })
    }

    /// The operator set the encoder enforces: the declared restriction
    /// filtered to representable (normal) functions, or `None` when
    /// unrestricted.
    pub fn normal_allowed_ops(&self) -> Option<Vec<Gate2>> {
        self.allowed_ops
            .as_ref()
            .map(|ops| ops.iter().copied().filter(|op| op.is_normal()).collect())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SpecError {
    NoOutputs,
    TooFewInputs(usize),
    TooManyInputs(usize),
    TooManyOutputs(usize),
    MixedArity,
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::NoOutputs => write!(f, "specification has no outputs"),
            SpecError::TooFewInputs(n) => write!(f, "specification has {} inputs, need >= 2", n),
            SpecError::TooManyInputs(n) => {
                write!(f, "specification has {} inputs, max is {}", n, MAX_INPUTS)
            }
            SpecError::TooManyOutputs(n) => {
                write!(f, "specification has {} outputs, max is 32", n)
            }
            SpecError::MixedArity => write!(f, "output tables disagree on the input count"),
        }
    }
}

impl std::error::Error for SpecError {}
