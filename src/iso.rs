// SPDX-License-Identifier: Apache-2.0

//! Structural deduplication of partial DAGs.
//!
//! A skeleton is viewed as a directed graph: every fixed step fanin
//! contributes an edge from the referenced step to the consumer; free slots
//! contribute none. Two skeletons are isomorphic iff their canonical forms
//! are identical, so a single hash-set pass deduplicates a whole batch with
//! one canonicalization per skeleton.
//!
//! Canonical labeling: vertices are first partitioned by an iterated
//! degree-signature refinement, then the lexicographically smallest
//! adjacency encoding over all partition-respecting orderings is taken.
//! Skeleton graphs are tiny (at most a dozen or so vertices), so the
//! residual permutation search after refinement is cheap.

use crate::partial_dag::{Fanin, PartialDag};
use std::collections::{BTreeMap, HashSet};

/// Isomorphism-invariant fingerprint of a skeleton. Comparable and
/// hashable; equal forms mean isomorphic skeletons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalForm {
    size: usize,
    /// Per-vertex non-edge invariants in canonical order.
    invariants: Vec<(usize, usize)>,
    /// Adjacency rows in canonical order, one bit set per out-edge.
    rows: Vec<u64>,
}

struct Digraph {
    size: usize,
    /// out_edges[u] = targets of u, as a bit set.
    out_edges: Vec<u64>,
    in_edges: Vec<u64>,
    /// (free slot count, fixed input-fanin count) per vertex.
    invariants: Vec<(usize, usize)>,
}

fn build_digraph(dag: &PartialDag) -> Digraph {
    let size = dag.num_steps();
    assert!(size <= 64, "canonical labeling supports at most 64 steps");
    let mut graph = Digraph {
        size,
        out_edges: vec![0; size],
        in_edges: vec![0; size],
        invariants: vec![(0, 0); size],
    };
    for i in 0..size {
        let mut free = 0;
        let mut inputs = 0;
        for fanin in dag.step(i) {
            match fanin {
                Fanin::Free => free += 1,
                Fanin::Input(_) => inputs += 1,
                Fanin::Step(s) => {
                    graph.out_edges[s] |= 1 << i;
                    graph.in_edges[i] |= 1 << s;
                }
            }
        }
        graph.invariants[i] = (free, inputs);
    }
    graph
}

/// Partitions vertices into ordered classes by iterated signature
/// refinement. The class order is itself canonical: classes are sorted by
/// their signatures at every round.
fn refine_classes(graph: &Digraph) -> Vec<Vec<usize>> {
    let mut class_of: Vec<usize> = vec![0; graph.size];
    // Initial signature: local invariants and degrees.
    let mut classes = sort_into_classes(graph, |v| {
        (
            graph.invariants[v],
            graph.out_edges[v].count_ones(),
            graph.in_edges[v].count_ones(),
            0usize,
            Vec::new(),
            Vec::new(),
        )
    });
    loop {
        for (c, members) in classes.iter().enumerate() {
            for &v in members {
                class_of[v] = c;
            }
        }
        let refined = sort_into_classes(graph, |v| {
            let mut out_sig: Vec<usize> =
                bits(graph.out_edges[v]).map(|w| class_of[w]).collect();
            out_sig.sort_unstable();
            let mut in_sig: Vec<usize> = bits(graph.in_edges[v]).map(|w| class_of[w]).collect();
            in_sig.sort_unstable();
            (
                graph.invariants[v],
                graph.out_edges[v].count_ones(),
                graph.in_edges[v].count_ones(),
                class_of[v],
                out_sig,
                in_sig,
            )
        });
        if refined.len() == classes.len() {
            return refined;
        }
        classes = refined;
    }
}

type Signature = (
    (usize, usize),
    u32,
    u32,
    usize,
    Vec<usize>,
    Vec<usize>,
);

fn sort_into_classes(graph: &Digraph, sig: impl Fn(usize) -> Signature) -> Vec<Vec<usize>> {
    let mut by_sig: BTreeMap<Signature, Vec<usize>> = BTreeMap::new();
    for v in 0..graph.size {
        by_sig.entry(sig(v)).or_default().push(v);
    }
    by_sig.into_values().collect()
}

/// Minimizes the adjacency encoding over all orderings that keep each
/// refinement class contiguous and in class order.
fn minimize(graph: &Digraph, classes: &[Vec<usize>]) -> CanonicalForm {
    let mut best: Option<CanonicalForm> = None;
    let mut perm: Vec<usize> = Vec::with_capacity(graph.size);
    let mut scratch: Vec<Vec<usize>> = classes.to_vec();
    permute_classes(graph, &mut scratch, 0, &mut perm, &mut best);
    best.expect("at least one ordering exists")
}

fn permute_classes(
    graph: &Digraph,
    classes: &mut [Vec<usize>],
    class_idx: usize,
    perm: &mut Vec<usize>,
    best: &mut Option<CanonicalForm>,
) {
    if class_idx == classes.len() {
        let form = encode(graph, perm);
        if best.as_ref().is_none_or(|b| form < *b) {
            *best = Some(form);
        }
        return;
    }
    permute_within(graph, classes, class_idx, 0, perm, best);
}

/// Enumerates orderings of class `class_idx` by rotating each remaining
/// element to position `pos`, then recurses into the next class.
fn permute_within(
    graph: &Digraph,
    classes: &mut [Vec<usize>],
    class_idx: usize,
    pos: usize,
    perm: &mut Vec<usize>,
    best: &mut Option<CanonicalForm>,
) {
    if pos == classes[class_idx].len() {
        permute_classes(graph, classes, class_idx + 1, perm, best);
        return;
    }
    for i in pos..classes[class_idx].len() {
        classes[class_idx].swap(pos, i);
        perm.push(classes[class_idx][pos]);
        permute_within(graph, classes, class_idx, pos + 1, perm, best);
        perm.pop();
        classes[class_idx].swap(pos, i);
    }
}

/// Adjacency encoding of the graph under `perm` (old vertex at position
/// `new`), plus the reordered invariants.
fn encode(graph: &Digraph, perm: &[usize]) -> CanonicalForm {
    let mut new_index = vec![0usize; graph.size];
    for (new, &old) in perm.iter().enumerate() {
        new_index[old] = new;
    }
    let mut rows = vec![0u64; graph.size];
    for (new, &old) in perm.iter().enumerate() {
        for w in bits(graph.out_edges[old]) {
            rows[new] |= 1 << new_index[w];
        }
    }
    CanonicalForm {
        size: graph.size,
        invariants: perm.iter().map(|&old| graph.invariants[old]).collect(),
        rows,
    }
}

fn bits(mut word: u64) -> impl Iterator<Item = usize> {
    std::iter::from_fn(move || {
        if word == 0 {
            None
        } else {
            let i = word.trailing_zeros() as usize;
            word &= word - 1;
            Some(i)
        }
    })
}

/// Computes the canonical form of a skeleton.
pub fn canonical_form(dag: &PartialDag) -> CanonicalForm {
    let graph = build_digraph(dag);
    let classes = refine_classes(&graph);
    minimize(&graph, &classes)
}

pub fn are_isomorphic(a: &PartialDag, b: &PartialDag) -> bool {
    a.num_steps() == b.num_steps() && canonical_form(a) == canonical_form(b)
}

/// Removes structural duplicates, keeping the first representative of each
/// isomorphism class in input order.
pub fn dedupe(dags: Vec<PartialDag>) -> Vec<PartialDag> {
    let mut seen: HashSet<CanonicalForm> = HashSet::with_capacity(dags.len());
    dags.into_iter()
        .filter(|dag| seen.insert(canonical_form(dag)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag_gen::{FilterMode, generate};

    fn dag(pairs: &[(usize, usize)]) -> PartialDag {
        let steps = pairs
            .iter()
            .map(|&(j, k)| {
                let to_fanin = |v: usize| {
                    if v == 0 { Fanin::Free } else { Fanin::Step(v - 1) }
                };
                [to_fanin(j), to_fanin(k)]
            })
            .collect();
        PartialDag::new(steps).unwrap()
    }

    #[test]
    fn test_relabeled_dags_are_isomorphic() {
        // Two chains that differ only in which of the two root steps feeds
        // the third step first.
        let a = dag(&[(0, 0), (0, 0), (0, 1), (2, 3)]);
        let b = dag(&[(0, 0), (0, 0), (0, 2), (1, 3)]);
        assert!(are_isomorphic(&a, &b));
        assert_eq!(canonical_form(&a), canonical_form(&b));
    }

    #[test]
    fn test_structurally_different_dags_are_not_isomorphic() {
        let a = dag(&[(0, 0), (0, 1), (0, 2)]);
        let b = dag(&[(0, 0), (0, 1), (1, 2)]);
        assert!(!are_isomorphic(&a, &b));
    }

    #[test]
    fn test_free_slot_counts_distinguish() {
        // Same edge structure, different free-slot profile.
        let a = dag(&[(0, 0), (0, 1)]);
        let b = PartialDag::new(vec![
            [Fanin::Free, Fanin::Free],
            [Fanin::Input(0), Fanin::Step(0)],
        ])
        .unwrap();
        assert!(!are_isomorphic(&a, &b));
    }

    #[test]
    fn test_dedupe_idempotent() {
        let dags: Vec<PartialDag> = generate(4, FilterMode::Colex).collect();
        let once = dedupe(dags);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_dedupe_removes_known_duplicates() {
        let a = dag(&[(0, 0), (0, 0), (0, 1), (2, 3)]);
        let b = dag(&[(0, 0), (0, 0), (0, 2), (1, 3)]);
        let deduped = dedupe(vec![a.clone(), b]);
        assert_eq!(deduped, vec![a]);
    }

    #[test]
    fn test_dedupe_never_shrinks_below_classes() {
        // Dedupe of generator output keeps at least one DAG per size and
        // never returns an empty set for a nonempty input.
        for size in 1..=4 {
            let dags: Vec<PartialDag> = generate(size, FilterMode::NoReapply).collect();
            let n = dags.len();
            let deduped = dedupe(dags);
            assert!(!deduped.is_empty());
            assert!(deduped.len() <= n);
        }
    }
}
