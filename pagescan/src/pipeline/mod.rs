//! The analysis pipeline.
//!
//! - [`AnalysisInput`]: the page and the terms, validated up front
//! - [`AnalysisConfig`]: timeout, persistence key and limits
//! - [`PipelineCoordinator`]: wires driver events to the phase handlers

mod config;
mod coordinator;
mod handlers;
mod input;

pub use config::AnalysisConfig;
pub use coordinator::PipelineCoordinator;
pub use input::AnalysisInput;
