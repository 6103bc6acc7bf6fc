//! Shipment wizard: step graphs, guards and the machine that drives them.

pub mod entry;
pub mod exit;
pub mod guards;
pub mod machine;
pub mod registry;
pub mod steps;

pub use entry::WizardEntry;
pub use exit::{ExitSignal, ExitTarget, Transition};
pub use machine::{PhonePhase, WizardDeps, WizardMachine, WizardStatus};
pub use registry::{spawn_expiry_task, SharedWizard, WizardRegistry};
pub use steps::{
    AssistantStep, Graph, InviteeStep, Next, Position, RecipientStep, SenderStep, StepId,
};
