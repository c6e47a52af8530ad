// SPDX-License-Identifier: Apache-2.0

//! Pre-generated skeleton files: round trips and the file-driven search.

use minsynth::dag_gen::{self, FilterMode};
use minsynth::iso;
use minsynth::partial_dag::{PartialDag, SkeletonIoError};
use minsynth::sat::VarisatSolver;
use minsynth::spec::SynthSpec;
use minsynth::synth::{self, SynthMode, SynthOutcome};
use minsynth::tt::Tt;

#[test]
fn test_generated_skeletons_round_trip() {
    for size in 1..=4 {
        let dags: Vec<PartialDag> = dag_gen::generate(size, FilterMode::NoReapply).collect();
        let mut buf = Vec::new();
        PartialDag::write_all(&mut buf, &dags, 3).unwrap();
        let back = PartialDag::read_all(&buf[..], 3).unwrap();
        assert_eq!(back, dags, "size {}", size);
    }
}

#[test]
fn test_deduped_stream_drives_synthesis() {
    // Write skeletons of sizes 1..=4 into one stream, then let the
    // file-driven search find the majority chain.
    let mut dags = Vec::new();
    for size in 1..=4 {
        dags.extend(iso::dedupe(
            dag_gen::generate(size, FilterMode::NoReapply).collect(),
        ));
    }
    let mut buf = Vec::new();
    PartialDag::write_all(&mut buf, &dags, 3).unwrap();
    let loaded = PartialDag::read_all(&buf[..], 3).unwrap();

    let target = Tt::from_u64(3, 0xe8);
    let spec = SynthSpec::new(vec![target.clone()]).unwrap();
    let mut solver = VarisatSolver::new();
    match synth::synthesize_from_dags(&spec, &loaded, &mut solver, SynthMode::Direct) {
        SynthOutcome::Solved(chain) => {
            assert_eq!(chain.num_steps(), 4);
            assert_eq!(chain.simulate(), vec![target]);
        }
        other => panic!("expected a solution, got {:?}", other),
    }
}

#[test]
fn test_corrupt_stream_reports_truncation() {
    let dags: Vec<PartialDag> = dag_gen::generate(3, FilterMode::Colex).collect();
    let mut buf = Vec::new();
    PartialDag::write_all(&mut buf, &dags, 3).unwrap();
    // Chop the stream mid-record at every possible offset.
    for cut in 1..4 * (1 + 2 * 3) {
        let truncated = &buf[..buf.len() - cut];
        match PartialDag::read_all(truncated, 3) {
            Err(SkeletonIoError::Truncated) => {}
            Ok(dags_read) => {
                // Cuts at a record boundary legitimately parse short.
                assert!(dags_read.len() < dags.len());
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
}
