// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufReader, BufWriter};

use minsynth::chain::Chain;
use minsynth::dag_gen::{self, FilterMode};
use minsynth::iso;
use minsynth::partial_dag::PartialDag;
use minsynth::sat::VarisatSolver;
use minsynth::spec::SynthSpec;
use minsynth::synth::{self, SynthMode, SynthOptions, SynthOutcome};
use minsynth::tt::Tt;

/// Exact synthesis of minimum-size Boolean gate chains.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterArg {
    Tuples,
    Connected,
    Colex,
    Noreapply,
}

impl From<FilterArg> for FilterMode {
    fn from(arg: FilterArg) -> FilterMode {
        match arg {
            FilterArg::Tuples => FilterMode::Tuples,
            FilterArg::Connected => FilterMode::Connected,
            FilterArg::Colex => FilterMode::Colex,
            FilterArg::Noreapply => FilterMode::NoReapply,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize a minimum chain for the given truth tables.
    Synth {
        /// Target truth table, binary (e.g. 0110) or hex with 0x prefix;
        /// repeat for multiple outputs.
        #[arg(long = "tt", required = true)]
        tts: Vec<String>,

        /// Don't-care mask per output, same formats as --tt.
        #[arg(long = "dont-care")]
        dont_cares: Vec<String>,

        /// Use counterexample-guided refinement instead of the one-shot
        /// encoding.
        #[arg(long, default_value_t = false)]
        cegar: bool,

        /// Skeleton admissibility filter.
        #[arg(long, value_enum, default_value_t = FilterArg::Noreapply)]
        filter: FilterArg,

        /// Skip isomorphism-based skeleton deduplication.
        #[arg(long, default_value_t = false)]
        no_dedupe: bool,

        /// Largest chain size to try.
        #[arg(long, default_value_t = 12)]
        max_steps: usize,

        /// Worker threads; 0 = one per core, 1 = serial.
        #[arg(long, default_value_t = 1)]
        threads: usize,

        /// Solve skeletons from this pre-generated file instead of
        /// enumerating them.
        #[arg(long)]
        dags: Option<String>,

        /// Print the result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Pre-generate skeletons into a binary file.
    Gen {
        #[arg(long)]
        steps: usize,

        /// Input count assumed by the fanin encoding of the output file.
        #[arg(long)]
        inputs: usize,

        #[arg(long, value_enum, default_value_t = FilterArg::Noreapply)]
        filter: FilterArg,

        /// Deduplicate isomorphic skeletons before writing.
        #[arg(long, default_value_t = false)]
        dedupe: bool,

        #[arg(long)]
        out: String,
    },
    /// Count skeletons per filter mode.
    Count {
        #[arg(long)]
        steps: usize,
    },
}

fn parse_tt(s: &str) -> Result<Tt> {
    let tt = if let Some(hex) = s.strip_prefix("0x") {
        Tt::from_hex_str(hex)
    } else {
        Tt::from_binary_str(s)
    };
    tt.with_context(|| format!("parsing truth table {:?}", s))
}

fn run_synth(
    tts: Vec<String>,
    dont_cares: Vec<String>,
    cegar: bool,
    filter: FilterArg,
    no_dedupe: bool,
    max_steps: usize,
    threads: usize,
    dags: Option<String>,
    json: bool,
) -> Result<()> {
    let targets = tts.iter().map(|s| parse_tt(s)).collect::<Result<Vec<_>>>()?;
    let mut spec = SynthSpec::new(targets)?;
    if !dont_cares.is_empty() {
        if dont_cares.len() != tts.len() {
            bail!(
                "{} don't-care masks for {} outputs",
                dont_cares.len(),
                tts.len()
            );
        }
        let masks = dont_cares
            .iter()
            .map(|s| parse_tt(s))
            .collect::<Result<Vec<_>>>()?;
        spec = spec.with_dont_cares(masks)?;
    }

    let opts = SynthOptions {
        mode: if cegar { SynthMode::Cegar } else { SynthMode::Direct },
        filter: filter.into(),
        dedupe: !no_dedupe,
        max_steps,
        num_threads: (threads > 0).then_some(threads),
    };

    let outcome = if let Some(path) = dags {
        let file = File::open(&path).with_context(|| format!("opening {}", path))?;
        let dags = PartialDag::read_all(BufReader::new(file), spec.num_inputs())
            .with_context(|| format!("reading skeletons from {}", path))?;
        log::info!("loaded {} skeletons from {}", dags.len(), path);
        let mut solver = VarisatSolver::new();
        synth::synthesize_from_dags(&spec, &dags, &mut solver, opts.mode)
    } else if threads == 1 {
        synth::synthesize(&spec, &opts)
    } else {
        synth::synthesize_parallel(&spec, &opts)
    };

    match outcome {
        SynthOutcome::Solved(chain) => {
            report(&chain, json)?;
            Ok(())
        }
        SynthOutcome::Infeasible => bail!("no chain of at most {} steps exists", max_steps),
        SynthOutcome::TimedOut => bail!("solve budget exhausted before a verdict"),
    }
}

fn report(chain: &Chain, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(chain)?);
    } else {
        print!("{}", chain);
        println!("steps: {}", chain.num_steps());
    }
    Ok(())
}

fn main() -> Result<()> {
    let _ = env_logger::builder().try_init();
    let args = Args::parse();
    match args.command {
        Command::Synth {
            tts,
            dont_cares,
            cegar,
            filter,
            no_dedupe,
            max_steps,
            threads,
            dags,
            json,
        } => run_synth(
            tts, dont_cares, cegar, filter, no_dedupe, max_steps, threads, dags, json,
        ),
        Command::Gen {
            steps,
            inputs,
            filter,
            dedupe,
            out,
        } => {
            let mut dags: Vec<PartialDag> = dag_gen::generate(steps, filter.into()).collect();
            let generated = dags.len();
            if dedupe {
                dags = iso::dedupe(dags);
            }
            let file = File::create(&out).with_context(|| format!("creating {}", out))?;
            PartialDag::write_all(BufWriter::new(file), &dags, inputs)?;
            log::info!("wrote {} of {} generated skeletons", dags.len(), generated);
            println!("{}", dags.len());
            Ok(())
        }
        Command::Count { steps } => {
            for (name, mode) in [
                ("tuples", FilterMode::Tuples),
                ("connected", FilterMode::Connected),
                ("colex", FilterMode::Colex),
                ("noreapply", FilterMode::NoReapply),
            ] {
                println!("{}: {}", name, dag_gen::count(steps, mode));
            }
            Ok(())
        }
    }
}
