//! Core pipeline orchestration and domain logic for apidiagram.
//!
//! This crate ties together discovery, format normalization, external
//! generation and rendering into the batch workflows behind the CLI
//! (`run_pipeline`, `generate_only`, `render_only`).

pub mod generate;
pub mod normalize;
pub mod pipeline;
pub mod process;
pub mod reconcile;
pub mod render;
pub mod serve;
