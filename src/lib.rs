//! # Caseflow
//!
//! Coordination machinery for multi-worker document case processing.
//!
//! A case moves through the system on four rails: a versioned, persistent
//! [`blackboard`] that workers share state and messages through; a phased
//! [`lifecycle`] every worker runs inside (observe, reason, plan, act,
//! reflect, record); a [`supervisor`] that turns a request into a
//! dependency-gated plan and executes it in one forward pass; and a
//! [`stage`] tracker that keeps each document's file and metadata sidecar
//! together as they advance from intake to processed. External reasoning
//! sits behind the [`oracle`] boundary, and every failure it can produce
//! degrades softly into deterministic behavior.

pub mod blackboard;
pub mod lifecycle;
pub mod oracle;
pub mod settings;
pub mod stage;
pub mod supervisor;
pub mod utilities;
pub mod workers;

pub use blackboard::{AgentMessage, Blackboard, DataEntry, HistoryEvent, WorkflowUpdate, BROADCAST};
pub use lifecycle::{ExecutionStatus, Lifecycle, TaskSpec, Worker, WorkerReport};
pub use oracle::{Oracle, ScriptedOracle};
pub use settings::Settings;
pub use stage::{Stage, StageError, StageManager};
pub use supervisor::{ErrorPolicy, Plan, PlanStep, RunReport, Supervisor};
pub use workers::{ClassificationWorker, CompletionWorker, ExtractionWorker, IntakeWorker};
