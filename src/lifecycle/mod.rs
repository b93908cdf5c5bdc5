//! The worker execution contract.
//!
//! Every specialist runs the same loop around its own logic:
//!
//! 1. OBSERVE: snapshot the case and read (without consuming) the mailbox.
//! 2. REASON: analyze the task in context.
//! 3. PLAN: decide concrete actions.
//! 4. ACT: perform them against the blackboard and stage tree.
//! 5. REFLECT: self-assess via the oracle, falling back to a deterministic
//!    verdict; post any notifications.
//! 6. RECORD: write one worker-action audit event, unconditionally.
//!
//! Workers implement the middle ([`Worker`]); [`Lifecycle`] drives the rest
//! and contains any error a capability method returns.

mod driver;
mod phases;
mod worker;

pub use driver::Lifecycle;
pub use phases::{
    ActionPlan, Execution, ExecutionStatus, Observation, PlannedAction, Reasoning, Reflection,
    TaskSpec, WorkerReport,
};
pub use worker::Worker;
