// SPDX-License-Identifier: Apache-2.0

//! Exact synthesis of minimum-size Boolean chains.
//!
//! Given one or more target truth tables, the engine searches for the
//! smallest chain of 2-input gates that realizes them, by enumerating
//! gate-connection skeletons and compiling each (skeleton, specification)
//! pair into a SAT instance.

pub mod cardinality;
pub mod cegar;
pub mod chain;
pub mod dag_gen;
pub mod encode;
pub mod extract;
pub mod iso;
pub mod partial_dag;
pub mod sat;
pub mod spec;
pub mod synth;
pub mod tt;
pub mod var_space;
