//! bffgen core library.
//!
//! Turns a project's declared targets and custom commands into a
//! deterministic, configuration-aware set of FASTBuild `.bff` files. The
//! pipeline sorts the nodes ([`graph`]), classifies each command's variance
//! across configurations ([`variance`]), deduplicates emitted definitions
//! ([`dedup`]) and serializes the result ([`bff`], [`bff_gen`]).

pub mod ast;
pub mod bff;
pub mod bff_gen;
pub mod cli;
pub mod dedup;
pub mod graph;
pub mod hasher;
pub mod manifest;
pub mod project;
pub mod runner;
pub mod variance;
