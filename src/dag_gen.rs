// SPDX-License-Identifier: Apache-2.0

//! Backtracking enumeration of partial DAGs of a given size.
//!
//! The search assigns one operand pair per step, depth first. Pair values
//! use the search's own numbering: 0 stands for a free (primary-input)
//! slot and `v >= 1` for the step at level `v - 1`. Step 0 is always
//! `(0, 0)`.
//!
//! All search-state mutation (coverage counters, disable entries) goes
//! through an undo log; backtracking replays the log backwards, so apply
//! and undo cannot drift apart.

use crate::partial_dag::{Fanin, PartialDag};
use std::collections::HashMap;

/// Admissibility filter for generated DAGs. Each mode accepts a subset of
/// what the previous one accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterMode {
    /// Acyclicity only.
    Tuples,
    /// Every non-final step must feed some later step.
    Connected,
    /// Operand pairs must be co-lexicographically non-decreasing across
    /// consecutive steps.
    Colex,
    /// Additionally rules out pairs that would re-derive an earlier step's
    /// operands through that step itself.
    NoReapply,
}

enum Change {
    Covered(usize),
    Disabled(usize, usize, usize),
}

struct Frame {
    level: usize,
    cands: std::vec::IntoIter<(usize, usize)>,
    /// Undo-log mark for the candidate currently applied at this level.
    mark: Option<usize>,
}

/// Lazy stream of admissible partial DAGs, driven by the consumer.
pub struct DagGenerator {
    size: usize,
    mode: FilterMode,
    js: Vec<usize>,
    ks: Vec<usize>,
    /// Coverage count per pair value (index 0, the free-slot class, is
    /// tracked but never checked).
    covered: Vec<u32>,
    /// Disabled (level, j, k) triples with multiplicity.
    disabled: HashMap<(usize, usize, usize), u32>,
    log: Vec<Change>,
    stack: Vec<Frame>,
    emitted_single: bool,
    done: bool,
}

impl DagGenerator {
    pub fn new(size: usize, mode: FilterMode) -> Self {
        let mut generator = DagGenerator {
            size,
            mode,
            js: vec![0; size],
            ks: vec![0; size],
            covered: vec![0; size + 1],
            disabled: HashMap::new(),
            log: Vec::new(),
            stack: Vec::new(),
            emitted_single: false,
            done: size == 0,
        };
        if size > 1 {
            let cands = generator.candidates(1);
            generator.stack.push(Frame {
                level: 1,
                cands: cands.into_iter(),
                mark: None,
            });
        }
        generator
    }

    /// Candidate operand pairs for `level`, in search order.
    fn candidates(&self, level: usize) -> Vec<(usize, usize)> {
        let mut cands = vec![(0, 0)];
        match self.mode {
            FilterMode::Tuples | FilterMode::Connected => {
                for k in 1..=level {
                    for j in 0..k {
                        cands.push((j, k));
                    }
                }
            }
            FilterMode::Colex | FilterMode::NoReapply => {
                let (prev_j, prev_k) = (self.js[level - 1], self.ks[level - 1]);
                let start_j = prev_j;
                let start_k = if prev_j == prev_k { prev_k + 1 } else { prev_k };
                for j in start_j..start_k {
                    cands.push((j, start_k));
                }
                for k in start_k + 1..=level {
                    for j in 0..k {
                        cands.push((j, k));
                    }
                }
            }
        }
        cands
    }

    fn apply(&mut self, level: usize, j: usize, k: usize) {
        self.js[level] = j;
        self.ks[level] = k;
        if k == 0 {
            return;
        }
        if self.mode >= FilterMode::Connected {
            self.covered[j] += 1;
            self.covered[k] += 1;
            self.log.push(Change::Covered(j));
            self.log.push(Change::Covered(k));
        }
        if self.mode == FilterMode::NoReapply {
            // Committing pair (j, k) here means a later step must not pick
            // (j, this) or (k, this): it would recombine this step with one
            // of its own operands. Free slots carry no identity, so only
            // concrete operands get an entry.
            let this = level + 1;
            for later in level + 1..self.size {
                for &operand in &[j, k] {
                    if operand == 0 {
                        continue;
                    }
                    *self.disabled.entry((later, operand, this)).or_insert(0) += 1;
                    self.log.push(Change::Disabled(later, operand, this));
                }
            }
        }
    }

    fn undo_to(&mut self, mark: usize) {
        while self.log.len() > mark {
            match self.log.pop().unwrap() {
                Change::Covered(v) => self.covered[v] -= 1,
                Change::Disabled(level, j, k) => {
                    let entry = self.disabled.get_mut(&(level, j, k)).unwrap();
                    *entry -= 1;
                    if *entry == 0 {
                        self.disabled.remove(&(level, j, k));
                    }
                }
            }
        }
    }

    fn is_disabled(&self, level: usize, j: usize, k: usize) -> bool {
        self.disabled.contains_key(&(level, j, k))
    }

    /// Connectivity: every step except the last must be used.
    fn admissible(&self) -> bool {
        self.mode < FilterMode::Connected || (1..self.size).all(|v| self.covered[v] > 0)
    }

    fn snapshot(&self) -> PartialDag {
        let steps = (0..self.size)
            .map(|i| {
                let to_fanin = |v: usize| {
                    if v == 0 { Fanin::Free } else { Fanin::Step(v - 1) }
                };
                [to_fanin(self.js[i]), to_fanin(self.ks[i])]
            })
            .collect();
        PartialDag::new(steps).expect("search emits only valid DAGs")
    }
}

impl Iterator for DagGenerator {
    type Item = PartialDag;

    fn next(&mut self) -> Option<PartialDag> {
        if self.done {
            return None;
        }
        if self.size == 1 {
            self.done = true;
            if self.emitted_single {
                return None;
            }
            self.emitted_single = true;
            return Some(self.snapshot());
        }
        loop {
            let Some(mut top) = self.stack.pop() else {
                self.done = true;
                return None;
            };
            if let Some(mark) = top.mark.take() {
                self.undo_to(mark);
            }
            let Some((j, k)) = top.cands.next() else {
                continue;
            };
            let level = top.level;
            if self.mode == FilterMode::NoReapply && k != 0 && self.is_disabled(level, j, k) {
                self.stack.push(top);
                continue;
            }
            top.mark = Some(self.log.len());
            self.apply(level, j, k);
            self.stack.push(top);
            if level + 1 == self.size {
                if self.admissible() {
                    return Some(self.snapshot());
                }
            } else {
                let cands = self.candidates(level + 1);
                self.stack.push(Frame {
                    level: level + 1,
                    cands: cands.into_iter(),
                    mark: None,
                });
            }
        }
    }
}

/// Enumerates DAGs of the given size under `mode`.
pub fn generate(size: usize, mode: FilterMode) -> DagGenerator {
    DagGenerator::new(size, mode)
}

/// Counts DAGs of the given size under `mode` without keeping them.
pub fn count(size: usize, mode: FilterMode) -> u64 {
    generate(size, mode).count() as u64
}
