//! Transition outcomes and the hand-off out of the wizard.

use serde::{Deserialize, Serialize};

use super::steps::StepId;
use crate::error::StepError;
use crate::session::{Offer, SessionState};

/// Screen the wizard hands control to when it is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitTarget {
    QuoteScreen,
    PaymentScreen,
}

impl std::fmt::Display for ExitTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuoteScreen => write!(f, "quoteScreen"),
            Self::PaymentScreen => write!(f, "paymentScreen"),
        }
    }
}

/// Everything the next screen needs; ownership of the draft passes with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitSignal {
    pub target: ExitTarget,
    /// Serialized draft for the query string of the next screen.
    pub payload: String,
    pub selected_offer: Option<Offer>,
    pub session: SessionState,
}

impl ExitSignal {
    pub(crate) fn new(target: ExitTarget, session: &SessionState) -> Self {
        Self {
            target,
            payload: session.serialize(),
            selected_offer: session.selected_offer().cloned(),
            session: session.clone(),
        }
    }
}

/// Outcome of a `continue`, code submission or resend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Transition {
    /// Moved to another step.
    Moved { step: StepId },
    /// Kept on the same step with a visible message.
    Stayed { step: StepId, error: StepError },
    /// Phone step switched to its code phase.
    #[serde(rename_all = "camelCase")]
    CodeSent {
        step: StepId,
        telegram_delivered: bool,
    },
    /// Left the wizard.
    Exit(ExitSignal),
}

impl Transition {
    /// Step shown after the transition; `None` once the wizard exited.
    pub fn step(&self) -> Option<StepId> {
        match self {
            Self::Moved { step } | Self::Stayed { step, .. } | Self::CodeSent { step, .. } => {
                Some(*step)
            }
            Self::Exit(_) => None,
        }
    }

    pub fn error(&self) -> Option<&StepError> {
        match self {
            Self::Stayed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn exit(&self) -> Option<&ExitSignal> {
        match self {
            Self::Exit(signal) => Some(signal),
            _ => None,
        }
    }

    pub fn into_exit(self) -> Option<ExitSignal> {
        match self {
            Self::Exit(signal) => Some(signal),
            _ => None,
        }
    }
}
