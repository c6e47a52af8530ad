// SPDX-License-Identifier: Apache-2.0

//! Refinement-loop behavior on functions known to stress it.

use minsynth::cegar::{self, RefineOutcome};
use minsynth::dag_gen::{self, FilterMode};
use minsynth::sat::{CnfSolver, VarisatSolver};
use minsynth::spec::SynthSpec;
use minsynth::synth::{self, SynthMode, SynthOptions, SynthOutcome};
use minsynth::tt::Tt;

/// The 4-input function 127: multiple operand bindings stay consistent
/// with small committed-row sets, so this converges only because the
/// cardinality circuit pins one binding per step.
#[test]
fn test_cegar_tt_127_converges() {
    let _ = env_logger::builder().is_test(true).try_init();
    let target = Tt::from_u64(4, 127);
    let spec = SynthSpec::new(vec![target.clone()]).unwrap();
    let opts = SynthOptions {
        mode: SynthMode::Cegar,
        ..SynthOptions::default()
    };
    match synth::synthesize(&spec, &opts) {
        SynthOutcome::Solved(chain) => {
            // Depends on all four inputs, so two steps cannot reach it; a
            // three-step chain (two ANDs and an OR, inverted) exists.
            assert_eq!(chain.num_steps(), 3);
            assert_eq!(chain.simulate(), vec![target]);
        }
        other => panic!("expected a solution, got {:?}", other),
    }
}

#[test]
fn test_cegar_and_direct_agree_on_minimal_size() {
    for value in [0x6au64, 0x96, 0xe8, 0x1e, 0x42] {
        let target = Tt::from_u64(3, value);
        let spec = SynthSpec::new(vec![target.clone()]).unwrap();
        let direct = SynthOptions {
            mode: SynthMode::Direct,
            ..SynthOptions::default()
        };
        let cegar = SynthOptions {
            mode: SynthMode::Cegar,
            ..SynthOptions::default()
        };
        let a = match synth::synthesize(&spec, &direct) {
            SynthOutcome::Solved(chain) => chain,
            other => panic!("direct failed on {:#x}: {:?}", value, other),
        };
        let b = match synth::synthesize(&spec, &cegar) {
            SynthOutcome::Solved(chain) => chain,
            other => panic!("cegar failed on {:#x}: {:?}", value, other),
        };
        assert_eq!(a.num_steps(), b.num_steps(), "target {:#x}", value);
        assert_eq!(a.simulate(), b.simulate(), "target {:#x}", value);
        assert_eq!(b.simulate(), vec![target]);
    }
}

/// Every skeleton either refines to a correct chain or is exhausted; no
/// skeleton may loop past the row budget (the loop asserts internally).
#[test]
fn test_refine_terminates_on_every_small_skeleton() {
    let target = Tt::from_u64(3, 0xe8);
    let spec = SynthSpec::new(vec![target.clone()]).unwrap();
    let mut solver = VarisatSolver::new();
    for size in 1..=4 {
        for dag in dag_gen::generate(size, FilterMode::NoReapply) {
            solver.restart();
            match cegar::refine(&spec, &dag, &mut solver) {
                RefineOutcome::Solved(chain) => {
                    assert_eq!(chain.simulate(), vec![target.clone()]);
                }
                RefineOutcome::Exhausted => {}
                RefineOutcome::TimedOut => panic!("unbudgeted solve timed out"),
            }
        }
    }
}
