//! Planning module for plan operations.
//!
//! This module holds the plan model and executes plans against a
//! hypervisor: deploying entries in order, and starting, stopping or
//! deleting the VMs tagged with a plan.

mod executor;
mod plan;

pub use executor::{PlanExecutor, PlanReport, VmOutcome};
pub use plan::{Plan, PlanAction, PlanEntry, DEFAULT_PLAN_FILE, DEFAULT_PLAN_NAME};
