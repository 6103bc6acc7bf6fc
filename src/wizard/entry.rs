//! How a wizard is entered.
//!
//! One tagged value, consumed once at mount time, replaces loose flags
//! passed between screens.

use serde::{Deserialize, Serialize};

use super::steps::{AssistantStep, Graph, InviteeStep, Position, StepId};
use crate::error::CodecError;
use crate::session::{
    InviteCodec, InviteMode, Offer, PackageDetails, Role, Route, SessionState,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WizardEntry {
    /// Landing on the wizard from the route form.
    #[serde(rename_all = "camelCase")]
    FreshEntry {
        #[serde(default)]
        route: Route,
        /// Pre-selected by the caller; skips role selection.
        #[serde(default)]
        role: Option<Role>,
        #[serde(default)]
        package: Option<PackageDetails>,
        /// Sender preparing the shipment for the recipient to finish.
        #[serde(default)]
        assistant: bool,
    },
    /// Opened from a recipient invite link.
    InvitedRecipient { payload: String },
    /// Coming back with a serialized draft, e.g. from the quote screen.
    #[serde(rename_all = "camelCase")]
    Resumed {
        payload: String,
        #[serde(default)]
        step: Option<StepId>,
        #[serde(default)]
        return_to_payment: bool,
        #[serde(default)]
        selected_offer: Option<Offer>,
    },
}

/// Where a freshly mounted wizard starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Start {
    At(Position),
    /// Requested step if it exists in the session's graph, otherwise the
    /// first step whose guard does not hold yet.
    Resume(Option<StepId>),
}

impl WizardEntry {
    pub fn fresh(route: Route) -> Self {
        Self::FreshEntry {
            route,
            role: None,
            package: None,
            assistant: false,
        }
    }

    /// Build the initial session. Only an unusable invite link fails; a
    /// malformed resume payload falls back to a fresh session.
    pub(crate) fn into_session(self) -> Result<(SessionState, Start), CodecError> {
        match self {
            Self::FreshEntry {
                route,
                role,
                package,
                assistant,
            } => {
                let mut session = SessionState::new(route);
                if let Some(details) = package {
                    session.package.details = details;
                }
                if assistant {
                    session.set_role(Role::Sender);
                    session.set_invite_mode(InviteMode::Assistant);
                    return Ok((
                        session,
                        Start::At(Position::Assistant(AssistantStep::RecipientPhone)),
                    ));
                }
                let start = match role {
                    Some(Role::Sender) => Start::At(Position::start(Graph::Sender, &session)),
                    Some(Role::Recipient) => {
                        Start::At(Position::start(Graph::Recipient, &session))
                    }
                    Some(Role::Unset) | None => Start::At(Position::RoleSelect),
                };
                if let Some(role) = role {
                    session.set_role(role);
                }
                Ok((session, start))
            }
            Self::InvitedRecipient { payload } => {
                let invite = InviteCodec::decode_invite(&payload).ok_or(CodecError::InvalidInvite)?;
                Ok((
                    SessionState::from_invite(&invite),
                    Start::At(Position::Invitee(InviteeStep::UserPhone)),
                ))
            }
            Self::Resumed {
                payload,
                step,
                return_to_payment,
                selected_offer,
            } => {
                let Some(mut session) = SessionState::deserialize(&payload) else {
                    tracing::warn!("Resume payload is malformed; starting a fresh session");
                    return Ok((SessionState::default(), Start::At(Position::RoleSelect)));
                };
                if let Some(offer) = selected_offer {
                    session.set_selected_offer(offer);
                }
                session.set_return_to_payment(return_to_payment);
                Ok((session, Start::Resume(step)))
            }
        }
    }
}
