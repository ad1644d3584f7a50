//! CloudFormation stack convergence.
//!
//! # State machine
//!
//! ```text
//! DoesNotExist --create--> Creating --> CreateComplete
//!                              \------> Failed (rolled back, deleted)
//! CreateComplete / UpdateComplete --change set--> Updating --> UpdateComplete
//!                                                      \-----> Failed (rolled back)
//! any terminal --delete--> Deleting --> DeleteComplete / DoesNotExist
//! ```
//!
//! [`StackEngine`] exposes each transition as a separate step and
//! [`StackEngine::converge`] as one idempotent apply. Providers plug in
//! through [`StackApi`].

pub mod api;
pub mod converge;
pub mod engine;
pub mod types;

pub use api::{ChangeSetRequest, CreateStackRequest, ProviderResult, StackApi, CAPABILITY_IAM};
pub use converge::{
    ConvergeAction, ConvergeEvent, ConvergeObserver, ConvergeOutcome, EventTracker, NoopObserver,
};
pub use engine::{StackEngine, ON_FAILURE_DELETE};
pub use types::{
    change_set_name, ChangeSetCreation, ChangeSetDescription, ChangeSetExecution, ParameterValue,
    Parameters, StackDescription, StackEvent, StackEventPage, StackOperation, StackParameter,
    StackState, Template, WaitOutcome, NO_CHANGE_REASONS,
};
