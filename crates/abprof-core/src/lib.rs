//! # abprof Core Library
//!
//! A library for computing structural developability descriptors of antibody
//! 3-D structures (hydrophobic/charged surface-patch areas and Fv charge
//! asymmetry) by orchestrating many independent runs of an external feature
//! pipeline in parallel.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless building blocks: input
//!   structure discovery (`StructureRef`), summary statistics, and the
//!   deterministic JSON report format.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer orchestrates the run.
//!   It includes the task generator, the bounded worker pool with drain and
//!   incremental completion modes, the incremental collector that folds
//!   completed outcomes into per-structure aggregates, and the adapter
//!   boundary to the external feature pipeline.
//!
//! - **[`workflows`]: The Public API.** This is the highest-level, user-facing layer.
//!   It ties the `engine` and `core` together to execute a complete profiling
//!   run, from task generation to a finalized [`engine::aggregate::RunResult`].

pub mod core;
pub mod engine;
pub mod workflows;
