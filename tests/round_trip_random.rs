// SPDX-License-Identifier: Apache-2.0

//! Randomized round-trip property: whatever the engine synthesizes must
//! simulate back to the target outside the don't-care mask.

use minsynth::spec::SynthSpec;
use minsynth::synth::{self, SynthMode, SynthOptions, SynthOutcome};
use minsynth::tt::Tt;
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;

#[test]
fn test_random_three_input_functions_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rng = Pcg64::seed_from_u64(0);
    let mut tried = 0;
    while tried < 8 {
        let value: u64 = rng.gen_range(1..=0xfe);
        let target = Tt::from_u64(3, value);
        let spec = SynthSpec::new(vec![target.clone()]).unwrap();
        tried += 1;
        match synth::synthesize(&spec, &SynthOptions::default()) {
            SynthOutcome::Solved(chain) => {
                assert_eq!(chain.simulate(), vec![target], "value {:#04x}", value);
            }
            other => panic!("no chain for {:#04x}: {:?}", value, other),
        }
    }
}

#[test]
fn test_random_dont_care_round_trip() {
    let mut rng = Pcg64::seed_from_u64(7);
    for _ in 0..4 {
        let value: u64 = rng.gen_range(1..=0xfe);
        let mask: u64 = rng.gen_range(0..=0x7f);
        let target = Tt::from_u64(3, value);
        let dc = Tt::from_u64(3, mask);
        let spec = SynthSpec::new(vec![target.clone()])
            .unwrap()
            .with_dont_cares(vec![dc.clone()])
            .unwrap();
        match synth::synthesize(&spec, &SynthOptions::default()) {
            SynthOutcome::Solved(chain) => {
                let got = &chain.simulate()[0];
                assert_eq!(
                    got.first_difference(&target, Some(&dc)),
                    None,
                    "value {:#04x} mask {:#04x}",
                    value,
                    mask
                );
            }
            other => panic!("no chain for {:#04x}/{:#04x}: {:?}", value, mask, other),
        }
    }
}

#[test]
fn test_cegar_random_round_trip() {
    let mut rng = Pcg64::seed_from_u64(42);
    let opts = SynthOptions {
        mode: SynthMode::Cegar,
        ..SynthOptions::default()
    };
    for _ in 0..5 {
        let value: u64 = rng.gen_range(1..=0xfe);
        let target = Tt::from_u64(3, value);
        let spec = SynthSpec::new(vec![target.clone()]).unwrap();
        match synth::synthesize(&spec, &opts) {
            SynthOutcome::Solved(chain) => {
                assert_eq!(chain.simulate(), vec![target], "value {:#04x}", value);
            }
            other => panic!("no chain for {:#04x}: {:?}", value, other),
        }
    }
}
