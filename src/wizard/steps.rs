//! Step identities and the four step graphs.
//!
//! Every graph has its own closed step enum, so a position such as "email
//! step while the role is unset" cannot be expressed. [`StepId`] is the
//! flat name the screens render by.

use serde::{Deserialize, Serialize};

use super::exit::ExitTarget;
use super::guards;
use crate::session::{PaymentPayer, Role, SessionState};
use crate::verification::is_valid_phone;

/// Screen-level step name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepId {
    RoleSelect,
    Package,
    ContactPhone,
    PickupAddress,
    RecipientPhone,
    DeliveryMethod,
    #[serde(rename = "senderFIO")]
    SenderFio,
    SenderAddress,
    RecipientAddress,
    DeliveryAddress,
    UserPhone,
    Payment,
    Email,
    SelectPickupPoint,
    OrderComplete,
}

impl StepId {
    pub const ALL: [StepId; 15] = [
        StepId::RoleSelect,
        StepId::Package,
        StepId::ContactPhone,
        StepId::PickupAddress,
        StepId::RecipientPhone,
        StepId::DeliveryMethod,
        StepId::SenderFio,
        StepId::SenderAddress,
        StepId::RecipientAddress,
        StepId::DeliveryAddress,
        StepId::UserPhone,
        StepId::Payment,
        StepId::Email,
        StepId::SelectPickupPoint,
        StepId::OrderComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleSelect => "roleSelect",
            Self::Package => "package",
            Self::ContactPhone => "contactPhone",
            Self::PickupAddress => "pickupAddress",
            Self::RecipientPhone => "recipientPhone",
            Self::DeliveryMethod => "deliveryMethod",
            Self::SenderFio => "senderFIO",
            Self::SenderAddress => "senderAddress",
            Self::RecipientAddress => "recipientAddress",
            Self::DeliveryAddress => "deliveryAddress",
            Self::UserPhone => "userPhone",
            Self::Payment => "payment",
            Self::Email => "email",
            Self::SelectPickupPoint => "selectPickupPoint",
            Self::OrderComplete => "orderComplete",
        }
    }

    /// Two-phase steps: collect a phone, then collect and verify its code.
    pub fn is_phone_step(&self) -> bool {
        matches!(self, Self::ContactPhone | Self::UserPhone)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::OrderComplete)
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StepId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|id| id.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown step '{s}'"))
    }
}

/// Unassisted sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SenderStep {
    Package,
    ContactPhone,
    PickupAddress,
    RecipientPhone,
    Payment,
    RecipientAddress,
    SenderAddress,
    SenderFio,
    SelectPickupPoint,
    Email,
}

/// Sender preparing a shipment the recipient will finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssistantStep {
    RecipientPhone,
    PickupAddress,
    ContactPhone,
    OrderComplete,
}

/// Unassisted recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientStep {
    Package,
    DeliveryAddress,
    DeliveryMethod,
    UserPhone,
    Payment,
    SenderAddress,
    SenderFio,
    RecipientAddress,
    SelectPickupPoint,
    Email,
}

/// Recipient who opened an invite link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InviteeStep {
    UserPhone,
    RecipientAddress,
    SelectPickupPoint,
    Email,
}

impl SenderStep {
    pub fn id(&self) -> StepId {
        match self {
            Self::Package => StepId::Package,
            Self::ContactPhone => StepId::ContactPhone,
            Self::PickupAddress => StepId::PickupAddress,
            Self::RecipientPhone => StepId::RecipientPhone,
            Self::Payment => StepId::Payment,
            Self::RecipientAddress => StepId::RecipientAddress,
            Self::SenderAddress => StepId::SenderAddress,
            Self::SenderFio => StepId::SenderFio,
            Self::SelectPickupPoint => StepId::SelectPickupPoint,
            Self::Email => StepId::Email,
        }
    }

    fn from_id(id: StepId) -> Option<Self> {
        Some(match id {
            StepId::Package => Self::Package,
            StepId::ContactPhone => Self::ContactPhone,
            StepId::PickupAddress => Self::PickupAddress,
            StepId::RecipientPhone => Self::RecipientPhone,
            StepId::Payment => Self::Payment,
            StepId::RecipientAddress => Self::RecipientAddress,
            StepId::SenderAddress => Self::SenderAddress,
            StepId::SenderFio => Self::SenderFio,
            StepId::SelectPickupPoint => Self::SelectPickupPoint,
            StepId::Email => Self::Email,
            _ => return None,
        })
    }
}

impl AssistantStep {
    pub fn id(&self) -> StepId {
        match self {
            Self::RecipientPhone => StepId::RecipientPhone,
            Self::PickupAddress => StepId::PickupAddress,
            Self::ContactPhone => StepId::ContactPhone,
            Self::OrderComplete => StepId::OrderComplete,
        }
    }

    fn from_id(id: StepId) -> Option<Self> {
        Some(match id {
            StepId::RecipientPhone => Self::RecipientPhone,
            StepId::PickupAddress => Self::PickupAddress,
            StepId::ContactPhone => Self::ContactPhone,
            StepId::OrderComplete => Self::OrderComplete,
            _ => return None,
        })
    }
}

impl RecipientStep {
    pub fn id(&self) -> StepId {
        match self {
            Self::Package => StepId::Package,
            Self::DeliveryAddress => StepId::DeliveryAddress,
            Self::DeliveryMethod => StepId::DeliveryMethod,
            Self::UserPhone => StepId::UserPhone,
            Self::Payment => StepId::Payment,
            Self::SenderAddress => StepId::SenderAddress,
            Self::SenderFio => StepId::SenderFio,
            Self::RecipientAddress => StepId::RecipientAddress,
            Self::SelectPickupPoint => StepId::SelectPickupPoint,
            Self::Email => StepId::Email,
        }
    }

    fn from_id(id: StepId) -> Option<Self> {
        Some(match id {
            StepId::Package => Self::Package,
            StepId::DeliveryAddress => Self::DeliveryAddress,
            StepId::DeliveryMethod => Self::DeliveryMethod,
            StepId::UserPhone => Self::UserPhone,
            StepId::Payment => Self::Payment,
            StepId::SenderAddress => Self::SenderAddress,
            StepId::SenderFio => Self::SenderFio,
            StepId::RecipientAddress => Self::RecipientAddress,
            StepId::SelectPickupPoint => Self::SelectPickupPoint,
            StepId::Email => Self::Email,
            _ => return None,
        })
    }
}

impl InviteeStep {
    pub fn id(&self) -> StepId {
        match self {
            Self::UserPhone => StepId::UserPhone,
            Self::RecipientAddress => StepId::RecipientAddress,
            Self::SelectPickupPoint => StepId::SelectPickupPoint,
            Self::Email => StepId::Email,
        }
    }

    fn from_id(id: StepId) -> Option<Self> {
        Some(match id {
            StepId::UserPhone => Self::UserPhone,
            StepId::RecipientAddress => Self::RecipientAddress,
            StepId::SelectPickupPoint => Self::SelectPickupPoint,
            StepId::Email => Self::Email,
            _ => return None,
        })
    }
}

/// Which step graph a session runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Graph {
    Sender,
    Assistant,
    Recipient,
    Invitee,
}

impl Graph {
    /// Graph implied by the session's invite mode and role; `None` while
    /// the role is still to be chosen.
    pub fn for_session(session: &SessionState) -> Option<Graph> {
        use crate::session::InviteMode;
        match session.invite_mode() {
            InviteMode::Assistant => Some(Graph::Assistant),
            InviteMode::InvitedRecipient => Some(Graph::Invitee),
            InviteMode::None => match session.role() {
                Role::Sender => Some(Graph::Sender),
                Role::Recipient => Some(Graph::Recipient),
                Role::Unset => None,
            },
        }
    }

    /// Display order of the graph's steps.
    pub fn steps(&self) -> &'static [StepId] {
        use StepId::*;
        match self {
            Self::Sender => &[
                RoleSelect,
                Package,
                ContactPhone,
                PickupAddress,
                RecipientPhone,
                Payment,
                RecipientAddress,
                SenderAddress,
                SenderFio,
                SelectPickupPoint,
                Email,
            ],
            Self::Assistant => &[RecipientPhone, PickupAddress, ContactPhone, OrderComplete],
            Self::Recipient => &[
                RoleSelect,
                Package,
                DeliveryAddress,
                DeliveryMethod,
                UserPhone,
                Payment,
                SenderAddress,
                SenderFio,
                RecipientAddress,
                SelectPickupPoint,
                Email,
            ],
            Self::Invitee => &[UserPhone, RecipientAddress, SelectPickupPoint, Email],
        }
    }
}

impl std::fmt::Display for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sender => write!(f, "sender"),
            Self::Assistant => write!(f, "assistant"),
            Self::Recipient => write!(f, "recipient"),
            Self::Invitee => write!(f, "invitee"),
        }
    }
}

/// Where the wizard currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    RoleSelect,
    Sender(SenderStep),
    Assistant(AssistantStep),
    Recipient(RecipientStep),
    Invitee(InviteeStep),
}

/// Result of a forward move in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Step(Position),
    Exit(ExitTarget),
}

impl Position {
    pub fn step_id(&self) -> StepId {
        match self {
            Self::RoleSelect => StepId::RoleSelect,
            Self::Sender(s) => s.id(),
            Self::Assistant(s) => s.id(),
            Self::Recipient(s) => s.id(),
            Self::Invitee(s) => s.id(),
        }
    }

    pub fn graph(&self) -> Option<Graph> {
        match self {
            Self::RoleSelect => None,
            Self::Sender(_) => Some(Graph::Sender),
            Self::Assistant(_) => Some(Graph::Assistant),
            Self::Recipient(_) => Some(Graph::Recipient),
            Self::Invitee(_) => Some(Graph::Invitee),
        }
    }

    /// Role the operator plays at this position, if fixed by the graph.
    pub fn role(&self) -> Option<Role> {
        match self.graph()? {
            Graph::Sender | Graph::Assistant => Some(Role::Sender),
            Graph::Recipient | Graph::Invitee => Some(Role::Recipient),
        }
    }

    pub fn is_phone_step(&self) -> bool {
        self.step_id().is_phone_step()
    }

    pub fn is_terminal(&self) -> bool {
        self.step_id().is_terminal()
    }

    /// Resolve a step name within a graph.
    pub fn in_graph(graph: Graph, id: StepId) -> Option<Position> {
        if id == StepId::RoleSelect {
            return matches!(graph, Graph::Sender | Graph::Recipient).then_some(Self::RoleSelect);
        }
        match graph {
            Graph::Sender => SenderStep::from_id(id).map(Self::Sender),
            Graph::Assistant => AssistantStep::from_id(id).map(Self::Assistant),
            Graph::Recipient => RecipientStep::from_id(id).map(Self::Recipient),
            Graph::Invitee => InviteeStep::from_id(id).map(Self::Invitee),
        }
    }

    /// First step of a graph once the role is known.
    pub fn start(graph: Graph, session: &SessionState) -> Position {
        match graph {
            Graph::Sender => Self::Sender(SenderStep::Package),
            Graph::Recipient => Self::Recipient(RecipientStep::Package),
            Graph::Invitee => Self::Invitee(InviteeStep::UserPhone),
            Graph::Assistant => {
                let resumed_with_offer = session.selected_offer().is_some()
                    && is_valid_phone(&session.parties().recipient_phone);
                if resumed_with_offer {
                    Self::Assistant(AssistantStep::PickupAddress)
                } else {
                    Self::Assistant(AssistantStep::RecipientPhone)
                }
            }
        }
    }

    /// Forward move, assuming the current step's guard already passed.
    ///
    /// Detail steps after payment are skipped when their guard already
    /// holds. With a selected offer and `returnToPayment`, finishing any
    /// detail step exits straight to payment.
    pub fn next(&self, session: &SessionState) -> Next {
        match self {
            Self::RoleSelect => match session.role() {
                Role::Sender => Next::Step(Self::Sender(SenderStep::Package)),
                Role::Recipient => Next::Step(Self::Recipient(RecipientStep::Package)),
                Role::Unset => Next::Step(Self::RoleSelect),
            },
            Self::Sender(step) => sender_next(*step, session),
            Self::Assistant(step) => assistant_next(*step, session),
            Self::Recipient(step) => recipient_next(*step, session),
            Self::Invitee(step) => invitee_next(*step, session),
        }
    }

    /// Backward move. Each step returns to the step that most commonly
    /// leads into it; `None` at the first step of a graph.
    pub fn previous(&self, session: &SessionState) -> Option<Position> {
        let pickup = session.pickup_point_required();
        match self {
            Self::RoleSelect => None,
            Self::Sender(step) => {
                use SenderStep::*;
                let prev = match step {
                    Package => return Some(Self::RoleSelect),
                    ContactPhone => Package,
                    PickupAddress => ContactPhone,
                    RecipientPhone => PickupAddress,
                    Payment => RecipientPhone,
                    RecipientAddress => Payment,
                    SenderAddress | SenderFio | SelectPickupPoint => RecipientAddress,
                    Email if pickup => SelectPickupPoint,
                    Email => RecipientAddress,
                };
                Some(Self::Sender(prev))
            }
            Self::Assistant(step) => {
                use AssistantStep::*;
                match step {
                    RecipientPhone | OrderComplete => None,
                    PickupAddress => Some(Self::Assistant(RecipientPhone)),
                    ContactPhone => Some(Self::Assistant(PickupAddress)),
                }
            }
            Self::Recipient(step) => {
                use RecipientStep::*;
                let prev = match step {
                    Package => return Some(Self::RoleSelect),
                    DeliveryAddress => Package,
                    DeliveryMethod => DeliveryAddress,
                    UserPhone => DeliveryMethod,
                    Payment => UserPhone,
                    SenderAddress => Payment,
                    SenderFio => SenderAddress,
                    RecipientAddress | SelectPickupPoint => SenderFio,
                    Email if pickup => SelectPickupPoint,
                    Email => SenderFio,
                };
                Some(Self::Recipient(prev))
            }
            Self::Invitee(step) => {
                use InviteeStep::*;
                match step {
                    UserPhone => None,
                    RecipientAddress => Some(Self::Invitee(UserPhone)),
                    SelectPickupPoint => Some(Self::Invitee(RecipientAddress)),
                    Email if pickup => Some(Self::Invitee(SelectPickupPoint)),
                    Email => Some(Self::Invitee(RecipientAddress)),
                }
            }
        }
    }

    /// Completion percentage shown on the progress bar.
    pub fn progress(&self, code_sent: bool, role_chosen: bool) -> u8 {
        if let Self::Assistant(step) = self {
            return match step {
                AssistantStep::RecipientPhone => 30,
                AssistantStep::PickupAddress => 40,
                AssistantStep::ContactPhone if code_sent => 75,
                AssistantStep::ContactPhone => 50,
                AssistantStep::OrderComplete => 100,
            };
        }
        match self.step_id() {
            StepId::RoleSelect if role_chosen => 20,
            StepId::RoleSelect => 0,
            StepId::Package => 30,
            StepId::DeliveryAddress => 50,
            StepId::DeliveryMethod => 55,
            StepId::UserPhone if code_sent => 65,
            StepId::PickupAddress | StepId::UserPhone => 60,
            StepId::RecipientPhone | StepId::SenderAddress => 70,
            StepId::ContactPhone | StepId::SenderFio => 75,
            StepId::Payment => 80,
            StepId::RecipientAddress | StepId::SelectPickupPoint => 90,
            StepId::Email => 95,
            StepId::OrderComplete => 100,
        }
    }
}

// ── Per-graph forward rules ─────────────────────────────────────────

/// Shared ending: nothing left without an offer; with one, a pickup point
/// (when the tariff needs it) and then e-mail.
fn tail(session: &SessionState, select: Position, email: Position) -> Next {
    if session.selected_offer().is_none() {
        return Next::Exit(ExitTarget::QuoteScreen);
    }
    if session.pickup_point_required() && guards::check(select, session).is_err() {
        Next::Step(select)
    } else {
        Next::Step(email)
    }
}

fn first_missing<S: Copy>(
    candidates: &[S],
    wrap: fn(S) -> Position,
    session: &SessionState,
) -> Option<Position> {
    candidates
        .iter()
        .map(|step| wrap(*step))
        .find(|position| guards::check(*position, session).is_err())
}

/// After a detail (address / name) step has been completed.
fn after_detail<S: Copy>(
    rest: &[S],
    wrap: fn(S) -> Position,
    session: &SessionState,
    select: Position,
    email: Position,
) -> Next {
    if session.return_to_payment() && session.selected_offer().is_some() {
        return Next::Exit(ExitTarget::PaymentScreen);
    }
    match first_missing(rest, wrap, session) {
        Some(position) => Next::Step(position),
        None => tail(session, select, email),
    }
}

fn email_exit(session: &SessionState) -> Next {
    if session.selected_offer().is_some() {
        Next::Exit(ExitTarget::PaymentScreen)
    } else {
        Next::Exit(ExitTarget::QuoteScreen)
    }
}

fn sender_next(step: SenderStep, session: &SessionState) -> Next {
    use SenderStep::*;
    let wrap: fn(SenderStep) -> Position = Position::Sender;
    let select = Position::Sender(SelectPickupPoint);
    let email = Position::Sender(Email);
    match step {
        Package => Next::Step(wrap(ContactPhone)),
        ContactPhone => Next::Step(wrap(PickupAddress)),
        PickupAddress => Next::Step(wrap(RecipientPhone)),
        RecipientPhone => Next::Step(wrap(Payment)),
        Payment if session.payment_payer() == PaymentPayer::Counterpart => {
            Next::Exit(ExitTarget::QuoteScreen)
        }
        Payment => match first_missing(&[RecipientAddress, SenderAddress, SenderFio], wrap, session)
        {
            Some(position) => Next::Step(position),
            None => tail(session, select, email),
        },
        RecipientAddress => after_detail(&[SenderAddress, SenderFio], wrap, session, select, email),
        SenderAddress => after_detail(&[SenderFio], wrap, session, select, email),
        SenderFio => after_detail::<SenderStep>(&[], wrap, session, select, email),
        SelectPickupPoint => Next::Step(email),
        Email => email_exit(session),
    }
}

fn assistant_next(step: AssistantStep, session: &SessionState) -> Next {
    use AssistantStep::*;
    match step {
        RecipientPhone if session.selected_offer().is_some() => {
            Next::Step(Position::Assistant(PickupAddress))
        }
        RecipientPhone => Next::Exit(ExitTarget::QuoteScreen),
        PickupAddress => Next::Step(Position::Assistant(ContactPhone)),
        ContactPhone | OrderComplete => Next::Step(Position::Assistant(OrderComplete)),
    }
}

fn recipient_next(step: RecipientStep, session: &SessionState) -> Next {
    use RecipientStep::*;
    let wrap: fn(RecipientStep) -> Position = Position::Recipient;
    let select = Position::Recipient(SelectPickupPoint);
    let email = Position::Recipient(Email);
    match step {
        Package => Next::Step(wrap(DeliveryAddress)),
        DeliveryAddress => Next::Step(wrap(DeliveryMethod)),
        DeliveryMethod => Next::Step(wrap(UserPhone)),
        UserPhone => Next::Step(wrap(Payment)),
        Payment if session.payment_payer() == PaymentPayer::Counterpart => {
            Next::Exit(ExitTarget::QuoteScreen)
        }
        Payment => match first_missing(&[SenderAddress, SenderFio, RecipientAddress], wrap, session)
        {
            Some(position) => Next::Step(position),
            None => tail(session, select, email),
        },
        SenderAddress => after_detail(&[SenderFio, RecipientAddress], wrap, session, select, email),
        SenderFio => after_detail(&[RecipientAddress], wrap, session, select, email),
        RecipientAddress => after_detail::<RecipientStep>(&[], wrap, session, select, email),
        SelectPickupPoint => Next::Step(email),
        Email => email_exit(session),
    }
}

fn invitee_next(step: InviteeStep, session: &SessionState) -> Next {
    use InviteeStep::*;
    let wrap: fn(InviteeStep) -> Position = Position::Invitee;
    let select = Position::Invitee(SelectPickupPoint);
    let email = Position::Invitee(Email);
    match step {
        UserPhone => match first_missing(&[RecipientAddress], wrap, session) {
            Some(position) => Next::Step(position),
            None => tail(session, select, email),
        },
        RecipientAddress => after_detail::<InviteeStep>(&[], wrap, session, select, email),
        SelectPickupPoint => Next::Step(email),
        Email => email_exit(session),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::session::{Offer, SessionPatch};

    fn cdek_pickup_offer() -> Offer {
        Offer {
            carrier_id: 1,
            carrier_name: "CDEK".into(),
            carrier_code: "cdek".into(),
            tariff_code: Some(136),
            tariff_name: "Посылка склад-склад".into(),
            price: dec!(350),
            eta_days: Some(3),
        }
    }

    #[test]
    fn display_matches_serde() {
        for id in StepId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{id}\""));
            assert_eq!(id.to_string().parse::<StepId>(), Ok(id));
        }
        assert_eq!(StepId::SenderFio.to_string(), "senderFIO");
        assert!("nowhere".parse::<StepId>().is_err());
    }

    #[test]
    fn every_graph_step_resolves_back_to_itself() {
        for graph in [Graph::Sender, Graph::Assistant, Graph::Recipient, Graph::Invitee] {
            for id in graph.steps() {
                let position = Position::in_graph(graph, *id)
                    .unwrap_or_else(|| panic!("{id} missing from {graph}"));
                assert_eq!(position.step_id(), *id);
            }
        }
        assert!(Position::in_graph(Graph::Invitee, StepId::Package).is_none());
        assert!(Position::in_graph(Graph::Assistant, StepId::RoleSelect).is_none());
    }

    #[test]
    fn role_select_leads_into_role_graph() {
        let mut session = SessionState::default();
        assert_eq!(
            Position::RoleSelect.next(&session),
            Next::Step(Position::RoleSelect)
        );
        session.set_role(Role::Recipient);
        assert_eq!(
            Position::RoleSelect.next(&session),
            Next::Step(Position::Recipient(RecipientStep::Package))
        );
    }

    #[test]
    fn payment_branches_on_payer() {
        let mut session = SessionState::default();
        session.set_role(Role::Sender);
        session.apply(SessionPatch {
            payment_payer: Some(PaymentPayer::Counterpart),
            ..Default::default()
        });
        let payment = Position::Sender(SenderStep::Payment);
        assert_eq!(payment.next(&session), Next::Exit(ExitTarget::QuoteScreen));

        session.apply(SessionPatch {
            payment_payer: Some(PaymentPayer::Me),
            ..Default::default()
        });
        assert_eq!(
            payment.next(&session),
            Next::Step(Position::Sender(SenderStep::RecipientAddress))
        );

        session.apply(SessionPatch {
            recipient_address: Some("ул Мира 2".into()),
            recipient_name: Some("Анна Смирнова".into()),
            sender_address: Some("ул Ленина 15".into()),
            sender_name: Some("Иван".into()),
            sender_phone: Some("+79001234567".into()),
            ..Default::default()
        });
        assert_eq!(
            payment.next(&session),
            Next::Step(Position::Sender(SenderStep::SenderFio))
        );
    }

    #[test]
    fn tail_with_offer_goes_through_pickup_point_and_email() {
        let mut session = SessionState::default();
        session.set_role(Role::Sender);
        session.set_selected_offer(cdek_pickup_offer());
        let fio = Position::Sender(SenderStep::SenderFio);
        assert_eq!(
            fio.next(&session),
            Next::Step(Position::Sender(SenderStep::SelectPickupPoint))
        );

        session.apply(SessionPatch {
            recipient_pickup_point_code: Some("MSK123".into()),
            ..Default::default()
        });
        assert_eq!(
            fio.next(&session),
            Next::Step(Position::Sender(SenderStep::Email))
        );
        assert_eq!(
            Position::Sender(SenderStep::Email).next(&session),
            Next::Exit(ExitTarget::PaymentScreen)
        );
    }

    #[test]
    fn return_to_payment_short_circuits_detail_steps() {
        let mut session = SessionState::default();
        session.set_role(Role::Recipient);
        session.set_selected_offer(cdek_pickup_offer());
        session.set_return_to_payment(true);
        for step in [
            RecipientStep::SenderAddress,
            RecipientStep::SenderFio,
            RecipientStep::RecipientAddress,
        ] {
            assert_eq!(
                Position::Recipient(step).next(&session),
                Next::Exit(ExitTarget::PaymentScreen)
            );
        }
    }

    #[test]
    fn email_without_offer_exits_to_quotes() {
        let session = SessionState::default();
        assert_eq!(
            Position::Invitee(InviteeStep::Email).next(&session),
            Next::Exit(ExitTarget::QuoteScreen)
        );
    }

    #[test]
    fn assistant_graph() {
        let mut session = SessionState::default();
        let recipient_phone = Position::Assistant(AssistantStep::RecipientPhone);
        assert_eq!(
            recipient_phone.next(&session),
            Next::Exit(ExitTarget::QuoteScreen)
        );
        assert_eq!(Position::start(Graph::Assistant, &session), recipient_phone);

        session.set_selected_offer(cdek_pickup_offer());
        session.apply(SessionPatch {
            recipient_phone: Some("+79001234567".into()),
            ..Default::default()
        });
        assert_eq!(
            Position::start(Graph::Assistant, &session),
            Position::Assistant(AssistantStep::PickupAddress)
        );
        assert_eq!(
            Position::Assistant(AssistantStep::ContactPhone).next(&session),
            Next::Step(Position::Assistant(AssistantStep::OrderComplete))
        );
        assert!(Position::Assistant(AssistantStep::OrderComplete).is_terminal());
    }

    #[test]
    fn previous_steps() {
        let mut session = SessionState::default();
        assert_eq!(
            Position::Sender(SenderStep::Package).previous(&session),
            Some(Position::RoleSelect)
        );
        assert_eq!(
            Position::Sender(SenderStep::ContactPhone).previous(&session),
            Some(Position::Sender(SenderStep::Package))
        );
        assert_eq!(Position::Invitee(InviteeStep::UserPhone).previous(&session), None);
        assert_eq!(Position::RoleSelect.previous(&session), None);
        assert_eq!(
            Position::Recipient(RecipientStep::Email).previous(&session),
            Some(Position::Recipient(RecipientStep::SenderFio))
        );
        session.set_selected_offer(cdek_pickup_offer());
        assert_eq!(
            Position::Recipient(RecipientStep::Email).previous(&session),
            Some(Position::Recipient(RecipientStep::SelectPickupPoint))
        );
    }

    #[test]
    fn progress_values() {
        assert_eq!(Position::RoleSelect.progress(false, false), 0);
        assert_eq!(Position::RoleSelect.progress(false, true), 20);
        assert_eq!(Position::Sender(SenderStep::Package).progress(false, true), 30);
        assert_eq!(Position::Recipient(RecipientStep::UserPhone).progress(false, true), 60);
        assert_eq!(Position::Recipient(RecipientStep::UserPhone).progress(true, true), 65);
        assert_eq!(Position::Sender(SenderStep::Email).progress(false, true), 95);
        assert_eq!(
            Position::Assistant(AssistantStep::ContactPhone).progress(true, true),
            75
        );
        assert_eq!(
            Position::Assistant(AssistantStep::OrderComplete).progress(false, true),
            100
        );
    }
}
