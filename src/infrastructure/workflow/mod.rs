//! Workflow execution infrastructure

mod executor_impl;
pub(crate) mod step_runner;

pub use executor_impl::WorkflowExecutorImpl;
pub use step_runner::{StepRunner, StepRunnerConfig};
