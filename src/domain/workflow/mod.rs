//! Workflow domain module
//!
//! A workflow is an ordered list of API-call steps plus a final transform.
//! Steps run DIRECT (one call) or LOOP (one call per element of the loop
//! selector's result); each step's transformed output lands in the
//! accumulated context under the step id, where later mappings and the
//! final transform can reference it.

mod entity;
mod executor;
mod repository;
mod run;

pub use entity::{validate_workflow_id, ExecutionMode, Step, Workflow, MAX_ID_LENGTH};
pub use executor::{CacheMode, Credentials, RunOptions, WorkflowExecutor};
pub use repository::RunRepository;
pub use run::{RunResult, StepRunResult};
