pub mod machine;
pub mod review;
pub mod states;
pub mod workflow;

pub use machine::{can_edit, transition, ApprovalTransitionError};
pub use review::ReviewQueue;
pub use states::{ApprovalEvent, TransitionOutcome, ViewMode, WorkflowState};
pub use workflow::{ApprovalError, ApprovalWorkflow, PhaseTarget};
