//! # VFL engine
//!
//! Orchestration of one two-party training run:
//!
//! - [`StateMachine`]: the linear stage chain with an absorbing failure
//!   state and a timestamped transition log
//! - [`SecurePipeline`]: sequences the stages against a live cluster
//! - [`CleanupCoordinator`]: releases every handle the run still holds
//!   before the cluster is shut down
//!
//! ```no_run
//! use vfl_engine::SecurePipeline;
//! use vfl_types::PipelineConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load("pipeline.yaml")?;
//! let outcome = SecurePipeline::new(config)?.run().await?;
//! println!("auc = {}", outcome.evaluation.metrics.auc);
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod pipeline;
pub mod state_machine;

pub use cleanup::{CleanupCoordinator, CleanupReport, RunState};
pub use pipeline::{RunOutcome, SecurePipeline, StageRecord};
pub use state_machine::{StateMachine, Transition};
