//! Shared case state: data, mail and workflow progress.
//!
//! The blackboard is the central coordination point for a case. Workers
//! write versioned data entries, leave messages for each other, and advance
//! the workflow tracker; the supervisor reads the same state to plan.
//! Everything is checkpointed to one JSON file per case on every mutation,
//! so a crashed run resumes from its last write.
//!
//! # Single writer
//!
//! One process owns a case at a time. The store performs no locking or
//! merging; two concurrent writers would overwrite each other's snapshots,
//! last writer wins.

mod entry;
mod message;
mod store;
mod workflow;

pub use entry::{DataEntry, HistoryEvent};
pub use message::{AgentMessage, BROADCAST};
pub use store::{Blackboard, CaseSnapshot, ContextSnapshot, STATE_FILE};
pub use workflow::{WorkflowState, WorkflowSummary, WorkflowUpdate};
