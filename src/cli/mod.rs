//! Command Line Interface (CLI) layer for hlsmosaic.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) that turns flags and an optional
//! JSON configuration into a `PipelineConfig` and runs the selected passes.
//!
//! If you are embedding the pipeline into another application, prefer the
//! high-level `hlsmosaic::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
