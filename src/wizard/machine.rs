//! WizardMachine: owns one session and drives it through its step graph.
//!
//! Every operation either moves to another step, stays with an error, or
//! exits with the serialized draft. Nothing here panics on user input.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::entry::{Start, WizardEntry};
use super::exit::{ExitSignal, ExitTarget, Transition};
use super::guards;
use super::steps::{Graph, Next, Position, StepId};
use crate::error::{CodecError, StepError, VerificationError};
use crate::session::{
    decode_payload, InviteCodec, InviteMode, InvitePayload, QuoteSharePayload, Role,
    SessionPatch, SessionState,
};
use crate::verification::{
    mask_phone, normalize_phone, AuthSink, CodeChannel, CodeGateway, VerificationSession,
};

/// Collaborators a machine needs. Cheap to clone; shared by every session.
#[derive(Clone)]
pub struct WizardDeps {
    pub gateway: Arc<dyn CodeGateway>,
    pub auth_sink: Option<Arc<dyn AuthSink>>,
    pub default_channel: CodeChannel,
}

impl WizardDeps {
    pub fn new(gateway: Arc<dyn CodeGateway>) -> Self {
        Self {
            gateway,
            auth_sink: None,
            default_channel: CodeChannel::Sms,
        }
    }

    pub fn with_auth_sink(mut self, sink: Arc<dyn AuthSink>) -> Self {
        self.auth_sink = Some(sink);
        self
    }

    pub fn with_default_channel(mut self, channel: CodeChannel) -> Self {
        self.default_channel = channel;
        self
    }

    /// Verification a draft starts with. Verified only when the auth sink
    /// already holds a session for the phone; a `verified` flag inside a
    /// client payload counts for nothing.
    fn verification_on_record(&self, phone: &str) -> VerificationSession {
        let known = self
            .auth_sink
            .as_ref()
            .is_some_and(|sink| sink.is_authenticated(&normalize_phone(phone)));
        VerificationSession::restored(phone, known)
    }
}

/// Sub-phase of a phone step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PhonePhase {
    EnterPhone,
    EnterCode,
    Verified,
}

/// Snapshot for rendering the current screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardStatus {
    pub id: Uuid,
    pub step: StepId,
    pub graph: Option<Graph>,
    pub progress: u8,
    /// 1-based `(index, total)` within the graph.
    pub step_label: (usize, usize),
    pub phone_phase: Option<PhonePhase>,
    pub can_continue: bool,
    pub finished: bool,
    pub exit_target: Option<ExitTarget>,
    pub created_at: DateTime<Utc>,
    pub session: SessionState,
    pub verification: VerificationSession,
}

pub struct WizardMachine {
    id: Uuid,
    position: Position,
    session: SessionState,
    verification: VerificationSession,
    code_input: String,
    deps: WizardDeps,
    finished: Option<ExitTarget>,
    created_at: DateTime<Utc>,
}

impl WizardMachine {
    /// Mount a wizard from its entry. Fails only for an unusable invite.
    pub fn mount(entry: WizardEntry, deps: WizardDeps) -> Result<Self, CodecError> {
        let (session, start) = entry.into_session()?;
        let mut machine = Self::new(session, deps);
        machine.position = match start {
            Start::At(position) => position,
            Start::Resume(requested) => machine.resume_position(requested),
        };
        tracing::info!(
            session_id = %machine.id,
            step = %machine.position.step_id(),
            graph = ?machine.position.graph(),
            "Wizard mounted"
        );
        Ok(machine)
    }

    fn new(mut session: SessionState, deps: WizardDeps) -> Self {
        let verification = deps.verification_on_record(&session.contact().phone);
        sync_contact_verified(&mut session, &verification);
        Self {
            id: Uuid::new_v4(),
            position: Position::RoleSelect,
            session,
            verification,
            code_input: String::new(),
            deps,
            finished: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn verification(&self) -> &VerificationSession {
        &self.verification
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn current_step(&self) -> StepId {
        self.position.step_id()
    }

    pub fn graph(&self) -> Option<Graph> {
        self.position.graph()
    }

    pub fn exit_target(&self) -> Option<ExitTarget> {
        self.finished
    }

    /// Exited, or parked on a terminal step.
    pub fn is_finished(&self) -> bool {
        self.finished.is_some() || self.position.is_terminal()
    }

    pub fn phone_phase(&self) -> Option<PhonePhase> {
        if !self.position.is_phone_step() {
            return None;
        }
        let phone = &self.session.contact().phone;
        Some(if self.verification.is_verified_for(phone) {
            PhonePhase::Verified
        } else if self.verification.code_pending_for(phone) {
            PhonePhase::EnterCode
        } else {
            PhonePhase::EnterPhone
        })
    }

    pub fn progress(&self) -> u8 {
        self.position.progress(
            self.verification.code_requested(),
            self.session.role().is_set(),
        )
    }

    /// `(index, total)` of the current step within the active graph,
    /// 1-based. Before a role is chosen only the role step is counted.
    pub fn step_label(&self) -> (usize, usize) {
        let Some(graph) = self.graph().or_else(|| Graph::for_session(&self.session)) else {
            return (1, 1);
        };
        let steps = graph.steps();
        let index = steps
            .iter()
            .position(|id| *id == self.current_step())
            .map_or(1, |i| i + 1);
        (index, steps.len())
    }

    /// Whether `continue` would pass the current step's checks as they
    /// stand. Collaborator calls may still fail.
    pub fn can_continue(&self) -> bool {
        if self.is_finished() {
            return false;
        }
        match self.phone_phase() {
            Some(PhonePhase::EnterCode) => is_code_shaped(&self.code_input),
            _ => guards::check(self.position, &self.session).is_ok(),
        }
    }

    pub fn status(&self) -> WizardStatus {
        WizardStatus {
            id: self.id,
            step: self.current_step(),
            graph: self.graph(),
            progress: self.progress(),
            step_label: self.step_label(),
            phone_phase: self.phone_phase(),
            can_continue: self.can_continue(),
            finished: self.is_finished(),
            exit_target: self.finished,
            created_at: self.created_at,
            session: self.session.clone(),
            verification: self.verification.clone(),
        }
    }

    // ── Edits ───────────────────────────────────────────────────────

    /// Merge a patch. A new operator phone discards any verification for
    /// the old one.
    pub fn update(&mut self, patch: SessionPatch) {
        if self.finished.is_some() {
            tracing::debug!(session_id = %self.id, "Ignoring edit of a finished wizard");
            return;
        }
        let phone_before = normalize_phone(&self.session.contact().phone);
        self.session.apply(patch);
        if normalize_phone(&self.session.contact().phone) != phone_before {
            self.verification.change_number();
            self.code_input.clear();
        }
    }

    /// Choose the role on the role-selection step.
    pub fn select_role(&mut self, role: Role) -> Result<(), StepError> {
        if self.position != Position::RoleSelect || !role.is_set() {
            return Err(StepError::RoleLocked);
        }
        self.session.set_role(role);
        Ok(())
    }

    /// Swap sender and recipient mid-flow. Allowed until an offer has been
    /// selected, and never for assisted or invited sessions. Restarts the
    /// new role's graph; a verified phone stays verified.
    pub fn switch_role(&mut self, role: Role) -> Result<StepId, StepError> {
        let switchable = self.finished.is_none()
            && self.session.invite_mode() == InviteMode::None
            && self.session.selected_offer().is_none()
            && role.is_set();
        if !switchable {
            return Err(StepError::RoleLocked);
        }
        if self.position == Position::RoleSelect {
            self.session.set_role(role);
            return Ok(self.current_step());
        }
        let graph = match role {
            Role::Sender => Graph::Sender,
            _ => Graph::Recipient,
        };
        self.session.set_role(role);
        if self.session.contact().verified {
            self.session.assign_operator_phone();
        }
        self.verification.reset_pending();
        self.code_input.clear();
        self.move_to(Position::start(graph, &self.session));
        Ok(self.current_step())
    }

    pub fn enter_code(&mut self, code: &str) {
        self.code_input = code.trim().to_string();
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Attempt to leave the current step forward.
    pub async fn continue_step(&mut self) -> Transition {
        if self.is_finished() {
            return self.stay(StepError::FlowFinished);
        }
        if self.position.is_phone_step() {
            return self.continue_phone().await;
        }
        if let Err(e) = guards::check(self.position, &self.session) {
            return self.stay(e.into());
        }
        self.advance()
    }

    /// Type a code and check it in one go.
    pub async fn submit_code(&mut self, code: &str) -> Transition {
        if self.is_finished() {
            return self.stay(StepError::FlowFinished);
        }
        self.enter_code(code);
        if self.phone_phase() != Some(PhonePhase::EnterCode) {
            return self.stay(VerificationError::NoCodeRequested.into());
        }
        self.verify_pending().await
    }

    /// Send the code again, optionally over another channel.
    pub async fn resend_code(&mut self, channel: Option<CodeChannel>) -> Transition {
        if self.is_finished() {
            return self.stay(StepError::FlowFinished);
        }
        if self.phone_phase() != Some(PhonePhase::EnterCode) {
            return self.stay(VerificationError::NoCodeRequested.into());
        }
        self.code_input.clear();
        self.send_code(channel.unwrap_or(self.deps.default_channel)).await
    }

    /// Step back. Inside the code phase this only returns to phone entry.
    /// Never clears a completed verification or the selected offer.
    pub fn back(&mut self) -> StepId {
        if self.is_finished() {
            return self.current_step();
        }
        if self.phone_phase() == Some(PhonePhase::EnterCode) {
            self.verification.reset_pending();
            self.code_input.clear();
            return self.current_step();
        }
        if let Some(previous) = self.position.previous(&self.session) {
            self.verification.reset_pending();
            self.code_input.clear();
            self.move_to(previous);
        }
        self.current_step()
    }

    /// Leave the code phase to type a different number.
    pub fn change_number(&mut self) -> StepId {
        if !self.position.is_phone_step() || self.is_finished() {
            return self.current_step();
        }
        self.code_input.clear();
        if self.session.recipient_phone_locked() {
            self.verification.reset_pending();
        } else {
            self.verification.change_number();
            self.session.contact.verified = false;
        }
        self.current_step()
    }

    // ── Sharing ─────────────────────────────────────────────────────

    /// Encoded payload for handing the draft to someone else: an invite in
    /// assistant mode, a quote share once an offer exists, otherwise the
    /// whole draft.
    pub fn serialize_for_share(&self) -> String {
        if self.session.invite_mode() == InviteMode::Assistant {
            InviteCodec::encode(&InvitePayload::from_session(&self.session))
        } else if let Some(quote) = QuoteSharePayload::from_session(&self.session) {
            InviteCodec::encode(&quote)
        } else {
            self.session.serialize()
        }
    }

    pub fn share_link(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if self.session.invite_mode() == InviteMode::Assistant {
            InviteCodec::invite_link(base, &InvitePayload::from_session(&self.session))
        } else if let Some(quote) = QuoteSharePayload::from_session(&self.session) {
            InviteCodec::quote_share_link(base, &quote)
        } else {
            format!("{base}/wizard?data={}", self.session.serialize())
        }
    }

    /// Replace the draft with a serialized one. A malformed payload resets
    /// the wizard to a fresh session and reports why.
    ///
    /// An invited session keeps its invite binding and locked phone. The
    /// phone counts as verified only if this wizard (or the auth sink)
    /// verified it.
    pub fn hydrate(&mut self, payload: &str) -> Result<(), CodecError> {
        self.code_input.clear();
        self.finished = None;
        match decode_payload::<SessionState>(payload) {
            Ok(mut session) => {
                session.keep_invite_binding(&self.session);
                let phone = session.contact().phone.clone();
                if !self.verification.is_verified_for(&phone) {
                    self.verification = self.deps.verification_on_record(&phone);
                }
                sync_contact_verified(&mut session, &self.verification);
                self.session = session;
                self.position = self.resume_position(None);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session_id = %self.id, "Hydration failed, resetting: {}", e);
                self.session = SessionState::default();
                self.verification = VerificationSession::new();
                self.position = Position::RoleSelect;
                Err(e)
            }
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn continue_phone(&mut self) -> Transition {
        match self.phone_phase() {
            Some(PhonePhase::Verified) => {
                self.session.mark_contact_verified();
                self.advance()
            }
            Some(PhonePhase::EnterCode) => self.verify_pending().await,
            _ => {
                if let Err(e) = guards::check(self.position, &self.session) {
                    return self.stay(e.into());
                }
                self.send_code(self.deps.default_channel).await
            }
        }
    }

    async fn send_code(&mut self, channel: CodeChannel) -> Transition {
        let phone = self.session.contact().phone.clone();
        let gateway = Arc::clone(&self.deps.gateway);
        match self
            .verification
            .send_code(gateway.as_ref(), &phone, channel)
            .await
        {
            Ok(dispatch) => Transition::CodeSent {
                step: self.current_step(),
                telegram_delivered: dispatch.telegram_delivered,
            },
            Err(e) => self.stay(e.into()),
        }
    }

    async fn verify_pending(&mut self) -> Transition {
        if !is_code_shaped(&self.code_input) {
            return self.stay(VerificationError::InvalidCodeFormat.into());
        }
        let code = self.code_input.clone();
        let gateway = Arc::clone(&self.deps.gateway);
        match self.verification.verify_code(gateway.as_ref(), &code).await {
            Ok(tokens) => {
                self.session.contact.phone = self.verification.phone().to_string();
                self.session.mark_contact_verified();
                self.code_input.clear();
                if let (Some(sink), Some(tokens)) = (&self.deps.auth_sink, tokens) {
                    sink.store_tokens(self.verification.phone(), tokens);
                }
                self.advance()
            }
            Err(e) => self.stay(e.into()),
        }
    }

    fn advance(&mut self) -> Transition {
        match self.position.next(&self.session) {
            Next::Step(to) => {
                self.move_to(to);
                Transition::Moved {
                    step: self.current_step(),
                }
            }
            Next::Exit(target) => self.exit(target),
        }
    }

    fn move_to(&mut self, to: Position) {
        tracing::info!(
            session_id = %self.id,
            from = %self.position.step_id(),
            to = %to.step_id(),
            "Wizard step changed"
        );
        self.position = to;
    }

    fn exit(&mut self, target: ExitTarget) -> Transition {
        self.finished = Some(target);
        tracing::info!(
            session_id = %self.id,
            from = %self.position.step_id(),
            %target,
            phone = %mask_phone(&self.session.contact().phone),
            "Wizard exited"
        );
        Transition::Exit(ExitSignal::new(target, &self.session))
    }

    fn stay(&self, error: StepError) -> Transition {
        tracing::debug!(
            session_id = %self.id,
            step = %self.position.step_id(),
            kind = error.kind(),
            "Step not left: {}",
            error
        );
        Transition::Stayed {
            step: self.current_step(),
            error,
        }
    }

    /// Requested step when it belongs to the session's graph and does not
    /// lie past an unverified phone step; otherwise the first step that
    /// still needs input.
    fn resume_position(&self, requested: Option<StepId>) -> Position {
        let Some(graph) = Graph::for_session(&self.session) else {
            return Position::RoleSelect;
        };
        let phone = &self.session.contact().phone;
        let verified = self.verification.is_verified_for(phone);
        if let Some(id) = requested
            && (verified || !past_phone_step(graph, id))
            && let Some(position) = Position::in_graph(graph, id)
        {
            return position;
        }
        let mut position = Position::start(graph, &self.session);
        for _ in 0..=graph.steps().len() {
            if position.is_terminal()
                || guards::check(position, &self.session).is_err()
                || (position.is_phone_step() && !verified)
            {
                break;
            }
            match position.next(&self.session) {
                Next::Step(next) if next != position => position = next,
                _ => break,
            }
        }
        position
    }
}

/// Mirror the machine's verification into the draft's contact.
fn sync_contact_verified(session: &mut SessionState, verification: &VerificationSession) {
    if verification.is_verified() {
        session.contact.phone = verification.phone().to_string();
        session.mark_contact_verified();
    } else {
        session.contact.verified = false;
    }
}

/// Whether `id` comes after the graph's phone step.
fn past_phone_step(graph: Graph, id: StepId) -> bool {
    let steps = graph.steps();
    let phone_at = steps.iter().position(|step| step.is_phone_step());
    let id_at = steps.iter().position(|step| *step == id);
    matches!((phone_at, id_at), (Some(phone), Some(at)) if at > phone)
}

fn is_code_shaped(code: &str) -> bool {
    code.len() == 4 && code.chars().all(|c| c.is_ascii_digit())
}
