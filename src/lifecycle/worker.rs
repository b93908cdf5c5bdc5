//! The worker capability contract.

use crate::blackboard::Blackboard;

use super::phases::{ActionPlan, Execution, Observation, Reasoning};

/// A case worker's three capabilities.
///
/// Implementations own their domain logic; the surrounding phases
/// (observation, reflection, recording) are driven by
/// [`Lifecycle`](super::Lifecycle), which also contains any error these
/// methods return. A failing capability never reaches the caller as an
/// error, only as a failed report.
pub trait Worker: Send + Sync {
    /// Registry and mailbox identity, e.g. `"intake"`.
    fn name(&self) -> &str;

    /// One-line description, used in planning prompts.
    fn role(&self) -> &str;

    /// Analyze the observed task and context.
    fn reason(
        &self,
        observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<Reasoning>;

    /// Turn the analysis into concrete actions.
    fn plan(
        &self,
        reasoning: &Reasoning,
        observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<ActionPlan>;

    /// Carry the actions out against the shared state.
    fn act(
        &self,
        plan: &ActionPlan,
        observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<Execution>;
}
