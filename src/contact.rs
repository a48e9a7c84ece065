//! Bilateral contact relationship model.
//!
//! A [`Contact`] is a pair of independent [`ContactSide`] records, one per
//! participant. Each side only ever writes its own status, trust points and
//! custom name. The relationship label a profile sees is derived from both
//! sides' statuses by [`derive_status`].

use serde::{Deserialize, Serialize};

/// Status of one side of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideStatus {
    Pending,
    WantToConnect,
    DontWantToConnect,
    Deleted,
}

impl SideStatus {
    pub const ALL: [SideStatus; 4] = [
        SideStatus::Pending,
        SideStatus::WantToConnect,
        SideStatus::DontWantToConnect,
        SideStatus::Deleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SideStatus::Pending => "pending",
            SideStatus::WantToConnect => "want_to_connect",
            SideStatus::DontWantToConnect => "dont_want_to_connect",
            SideStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SideStatus::Pending),
            "want_to_connect" => Some(SideStatus::WantToConnect),
            "dont_want_to_connect" => Some(SideStatus::DontWantToConnect),
            "deleted" => Some(SideStatus::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for SideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Relationship label as seen from one side of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayStatus {
    IncomingRequest,
    CancelledIncomingRequest,
    OutgoingRequest,
    Connected,
    OutgoingRequestDeniedUnseenByMe,
    ContactDeletedUnseenByMe,
    IncomingRequestDeniedUnseenByThem,
    IncomingRequestDeniedSeenByThem,
    CancelledOutgoingRequest,
    ContactDeletedUnseenByThem,
    OutgoingRequestDeniedSeenByMe,
    ContactDeletedSeen,
}

impl DisplayStatus {
    /// Whether a contact in this state appears in the viewer's contact list.
    ///
    /// Everything else is either closed on the viewer's end or waiting for
    /// the other party to acknowledge it.
    pub fn is_listed(self) -> bool {
        matches!(
            self,
            DisplayStatus::IncomingRequest
                | DisplayStatus::OutgoingRequest
                | DisplayStatus::Connected
                | DisplayStatus::OutgoingRequestDeniedUnseenByMe
                | DisplayStatus::ContactDeletedUnseenByMe
        )
    }

    /// The label the other party sees for the same pair of sides.
    pub fn dual(self) -> Self {
        match self {
            DisplayStatus::IncomingRequest => DisplayStatus::OutgoingRequest,
            DisplayStatus::OutgoingRequest => DisplayStatus::IncomingRequest,
            DisplayStatus::CancelledIncomingRequest => DisplayStatus::CancelledOutgoingRequest,
            DisplayStatus::CancelledOutgoingRequest => DisplayStatus::CancelledIncomingRequest,
            DisplayStatus::Connected => DisplayStatus::Connected,
            DisplayStatus::OutgoingRequestDeniedUnseenByMe => {
                DisplayStatus::IncomingRequestDeniedUnseenByThem
            }
            DisplayStatus::IncomingRequestDeniedUnseenByThem => {
                DisplayStatus::OutgoingRequestDeniedUnseenByMe
            }
            DisplayStatus::IncomingRequestDeniedSeenByThem => {
                DisplayStatus::OutgoingRequestDeniedSeenByMe
            }
            DisplayStatus::OutgoingRequestDeniedSeenByMe => {
                DisplayStatus::IncomingRequestDeniedSeenByThem
            }
            DisplayStatus::ContactDeletedUnseenByMe => DisplayStatus::ContactDeletedUnseenByThem,
            DisplayStatus::ContactDeletedUnseenByThem => DisplayStatus::ContactDeletedUnseenByMe,
            DisplayStatus::ContactDeletedSeen => DisplayStatus::ContactDeletedSeen,
        }
    }
}

/// A pair of side statuses that the request/accept/reject/delete protocol
/// can never produce. Always a data-integrity bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidStateError {
    pub mine: SideStatus,
    pub theirs: SideStatus,
}

impl std::fmt::Display for InvalidStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid contact side combination: mine={}, theirs={}",
            self.mine, self.theirs
        )
    }
}

impl std::error::Error for InvalidStateError {}

/// Combine both sides' statuses into the label seen by the owner of `mine`.
pub fn derive_status(
    mine: SideStatus,
    theirs: SideStatus,
) -> Result<DisplayStatus, InvalidStateError> {
    use SideStatus::*;

    let status = match (mine, theirs) {
        (Pending, WantToConnect) => DisplayStatus::IncomingRequest,
        (Pending, Deleted) => DisplayStatus::CancelledIncomingRequest,

        (WantToConnect, Pending) => DisplayStatus::OutgoingRequest,
        (WantToConnect, WantToConnect) => DisplayStatus::Connected,
        (WantToConnect, DontWantToConnect) => DisplayStatus::OutgoingRequestDeniedUnseenByMe,
        (WantToConnect, Deleted) => DisplayStatus::ContactDeletedUnseenByMe,

        (DontWantToConnect, WantToConnect) => DisplayStatus::IncomingRequestDeniedUnseenByThem,
        (DontWantToConnect, Deleted) => DisplayStatus::IncomingRequestDeniedSeenByThem,

        (Deleted, Pending) => DisplayStatus::CancelledOutgoingRequest,
        (Deleted, WantToConnect) => DisplayStatus::ContactDeletedUnseenByThem,
        (Deleted, DontWantToConnect) => DisplayStatus::OutgoingRequestDeniedSeenByMe,
        (Deleted, Deleted) => DisplayStatus::ContactDeletedSeen,

        (Pending, Pending)
        | (Pending, DontWantToConnect)
        | (DontWantToConnect, Pending)
        | (DontWantToConnect, DontWantToConnect) => {
            return Err(InvalidStateError { mine, theirs })
        }
    };
    Ok(status)
}

/// One participant's record within a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSide {
    pub profile_id: i64,
    pub status: SideStatus,
    pub trust_points: u32,
    pub custom_name: Option<String>,
}

impl ContactSide {
    pub fn new(profile_id: i64, status: SideStatus) -> Self {
        Self {
            profile_id,
            status,
            trust_points: 0,
            custom_name: None,
        }
    }
}

/// A relationship between two distinct profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: i64,
    pub sides: [ContactSide; 2],
    pub created_at: u64,
    pub updated_at: u64,
}

/// Side mutations a participant can perform on an existing contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Accept,
    Reject,
    Remove,
    Acknowledge,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::Remove => "remove",
            Transition::Acknowledge => "acknowledge",
        }
    }

    /// Status written to the actor's side.
    pub fn target(self) -> SideStatus {
        match self {
            Transition::Accept => SideStatus::WantToConnect,
            Transition::Reject => SideStatus::DontWantToConnect,
            Transition::Remove | Transition::Acknowledge => SideStatus::Deleted,
        }
    }

    pub fn allowed_from(self, current: DisplayStatus) -> bool {
        match self {
            Transition::Accept | Transition::Reject => current == DisplayStatus::IncomingRequest,
            Transition::Remove => matches!(
                current,
                DisplayStatus::Connected | DisplayStatus::OutgoingRequest
            ),
            Transition::Acknowledge => matches!(
                current,
                DisplayStatus::OutgoingRequestDeniedUnseenByMe
                    | DisplayStatus::ContactDeletedUnseenByMe
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// The profile is not one of the two sides.
    NotParticipant(i64),
    NotAllowed {
        transition: Transition,
        current: DisplayStatus,
    },
    InvalidState(InvalidStateError),
}

impl std::fmt::Display for ContactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactError::NotParticipant(id) => {
                write!(f, "profile {id} is not a participant of this contact")
            }
            ContactError::NotAllowed {
                transition,
                current,
            } => write!(
                f,
                "cannot {} a contact in state {:?}",
                transition.as_str(),
                current
            ),
            ContactError::InvalidState(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ContactError {}

impl From<InvalidStateError> for ContactError {
    fn from(e: InvalidStateError) -> Self {
        ContactError::InvalidState(e)
    }
}

impl Contact {
    /// Sides for a fresh request: requester wants to connect, recipient is pending.
    pub fn request_sides(requester: i64, recipient: i64) -> [ContactSide; 2] {
        [
            ContactSide::new(requester, SideStatus::WantToConnect),
            ContactSide::new(recipient, SideStatus::Pending),
        ]
    }

    pub fn side_index(&self, profile_id: i64) -> Option<usize> {
        self.sides.iter().position(|s| s.profile_id == profile_id)
    }

    pub fn involves(&self, profile_id: i64) -> bool {
        self.side_index(profile_id).is_some()
    }

    fn index_for(&self, profile_id: i64) -> Result<usize, ContactError> {
        self.side_index(profile_id)
            .ok_or(ContactError::NotParticipant(profile_id))
    }

    /// `(mine, theirs)` relative to `viewer`.
    pub fn sides_for(&self, viewer: i64) -> Result<(&ContactSide, &ContactSide), ContactError> {
        let i = self.index_for(viewer)?;
        Ok((&self.sides[i], &self.sides[1 - i]))
    }

    pub fn side_mut(&mut self, profile_id: i64) -> Result<&mut ContactSide, ContactError> {
        let i = self.index_for(profile_id)?;
        Ok(&mut self.sides[i])
    }

    pub fn other_profile(&self, viewer: i64) -> Result<i64, ContactError> {
        self.sides_for(viewer).map(|(_, theirs)| theirs.profile_id)
    }

    pub fn display_status(&self, viewer: i64) -> Result<DisplayStatus, ContactError> {
        let (mine, theirs) = self.sides_for(viewer)?;
        Ok(derive_status(mine.status, theirs.status)?)
    }

    /// Apply `transition` on behalf of `actor`. Only the actor's side changes.
    pub fn apply(
        &mut self,
        actor: i64,
        transition: Transition,
    ) -> Result<DisplayStatus, ContactError> {
        let current = self.display_status(actor)?;
        if !transition.allowed_from(current) {
            return Err(ContactError::NotAllowed {
                transition,
                current,
            });
        }
        self.side_mut(actor)?.status = transition.target();
        self.display_status(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DisplayStatus as D;
    use SideStatus::*;

    fn contact(a: SideStatus, b: SideStatus) -> Contact {
        Contact {
            id: 1,
            sides: [ContactSide::new(10, a), ContactSide::new(20, b)],
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_derive_status_table() {
        let expected = [
            (Pending, Pending, None),
            (Pending, WantToConnect, Some(D::IncomingRequest)),
            (Pending, DontWantToConnect, None),
            (Pending, Deleted, Some(D::CancelledIncomingRequest)),
            (WantToConnect, Pending, Some(D::OutgoingRequest)),
            (WantToConnect, WantToConnect, Some(D::Connected)),
            (
                WantToConnect,
                DontWantToConnect,
                Some(D::OutgoingRequestDeniedUnseenByMe),
            ),
            (WantToConnect, Deleted, Some(D::ContactDeletedUnseenByMe)),
            (DontWantToConnect, Pending, None),
            (
                DontWantToConnect,
                WantToConnect,
                Some(D::IncomingRequestDeniedUnseenByThem),
            ),
            (DontWantToConnect, DontWantToConnect, None),
            (
                DontWantToConnect,
                Deleted,
                Some(D::IncomingRequestDeniedSeenByThem),
            ),
            (Deleted, Pending, Some(D::CancelledOutgoingRequest)),
            (Deleted, WantToConnect, Some(D::ContactDeletedUnseenByThem)),
            (Deleted, DontWantToConnect, Some(D::OutgoingRequestDeniedSeenByMe)),
            (Deleted, Deleted, Some(D::ContactDeletedSeen)),
        ];
        assert_eq!(expected.len(), 16);
        for (mine, theirs, want) in expected {
            match want {
                Some(status) => assert_eq!(derive_status(mine, theirs), Ok(status)),
                None => assert_eq!(
                    derive_status(mine, theirs),
                    Err(InvalidStateError { mine, theirs })
                ),
            }
        }
    }

    #[test]
    fn test_views_from_both_sides_are_duals() {
        for a in SideStatus::ALL {
            for b in SideStatus::ALL {
                match (derive_status(a, b), derive_status(b, a)) {
                    (Ok(x), Ok(y)) => assert_eq!(x.dual(), y, "{a:?}/{b:?}"),
                    (Err(_), Err(_)) => {}
                    other => panic!("asymmetric validity for {a:?}/{b:?}: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_invalid_state_error_names_statuses() {
        let err = derive_status(Pending, DontWantToConnect).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Pending"));
        assert!(msg.contains("DontWantToConnect"));
    }

    #[test]
    fn test_listing_visibility() {
        let listed: Vec<D> = [
            D::IncomingRequest,
            D::CancelledIncomingRequest,
            D::OutgoingRequest,
            D::Connected,
            D::OutgoingRequestDeniedUnseenByMe,
            D::ContactDeletedUnseenByMe,
            D::IncomingRequestDeniedUnseenByThem,
            D::IncomingRequestDeniedSeenByThem,
            D::CancelledOutgoingRequest,
            D::ContactDeletedUnseenByThem,
            D::OutgoingRequestDeniedSeenByMe,
            D::ContactDeletedSeen,
        ]
        .into_iter()
        .filter(|s| s.is_listed())
        .collect();
        assert_eq!(
            listed,
            vec![
                D::IncomingRequest,
                D::OutgoingRequest,
                D::Connected,
                D::OutgoingRequestDeniedUnseenByMe,
                D::ContactDeletedUnseenByMe,
            ]
        );
    }

    #[test]
    fn test_request_accept_flow() {
        let mut c = Contact {
            id: 1,
            sides: Contact::request_sides(10, 20),
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(c.display_status(10), Ok(D::OutgoingRequest));
        assert_eq!(c.display_status(20), Ok(D::IncomingRequest));

        assert_eq!(c.apply(20, Transition::Accept), Ok(D::Connected));
        assert_eq!(c.display_status(10), Ok(D::Connected));
        assert_eq!(c.sides[0].status, WantToConnect);
    }

    #[test]
    fn test_reject_then_acknowledge() {
        let mut c = contact(WantToConnect, Pending);
        assert_eq!(
            c.apply(20, Transition::Reject),
            Ok(D::IncomingRequestDeniedUnseenByThem)
        );
        assert_eq!(c.display_status(10), Ok(D::OutgoingRequestDeniedUnseenByMe));

        assert_eq!(
            c.apply(10, Transition::Acknowledge),
            Ok(D::OutgoingRequestDeniedSeenByMe)
        );
        assert_eq!(c.display_status(20), Ok(D::IncomingRequestDeniedSeenByThem));
        assert!(!c.display_status(10).unwrap().is_listed());
        assert!(!c.display_status(20).unwrap().is_listed());
    }

    #[test]
    fn test_remove_then_acknowledge() {
        let mut c = contact(WantToConnect, WantToConnect);
        assert_eq!(
            c.apply(10, Transition::Remove),
            Ok(D::ContactDeletedUnseenByThem)
        );
        assert_eq!(c.display_status(20), Ok(D::ContactDeletedUnseenByMe));
        assert_eq!(c.apply(20, Transition::Acknowledge), Ok(D::ContactDeletedSeen));
        assert_eq!(c.display_status(10), Ok(D::ContactDeletedSeen));
    }

    #[test]
    fn test_cancel_outgoing_request() {
        let mut c = contact(WantToConnect, Pending);
        assert_eq!(
            c.apply(10, Transition::Remove),
            Ok(D::CancelledOutgoingRequest)
        );
        assert_eq!(c.display_status(20), Ok(D::CancelledIncomingRequest));
    }

    #[test]
    fn test_transition_touches_only_actor_side() {
        let cases = [
            (WantToConnect, Pending, 20, Transition::Accept),
            (WantToConnect, Pending, 20, Transition::Reject),
            (WantToConnect, WantToConnect, 20, Transition::Remove),
            (WantToConnect, Pending, 10, Transition::Remove),
            (DontWantToConnect, WantToConnect, 20, Transition::Acknowledge),
            (Deleted, WantToConnect, 20, Transition::Acknowledge),
        ];
        for (a, b, actor, t) in cases {
            let mut c = contact(a, b);
            let before = c.clone();
            c.apply(actor, t).unwrap();
            let (i, other) = if actor == 10 { (0, 1) } else { (1, 0) };
            assert_eq!(c.sides[other], before.sides[other], "{t:?}");
            assert_eq!(c.sides[i].status, t.target());
        }
    }

    #[test]
    fn test_disallowed_transitions() {
        let mut c = contact(WantToConnect, Pending);
        assert_eq!(
            c.apply(10, Transition::Accept),
            Err(ContactError::NotAllowed {
                transition: Transition::Accept,
                current: D::OutgoingRequest,
            })
        );
        assert!(c.apply(20, Transition::Acknowledge).is_err());
        assert_eq!(
            c.apply(99, Transition::Accept),
            Err(ContactError::NotParticipant(99))
        );
    }

    #[test]
    fn test_invalid_pair_surfaces_on_apply() {
        let mut c = contact(Pending, Pending);
        assert!(matches!(
            c.apply(10, Transition::Accept),
            Err(ContactError::InvalidState(_))
        ));
    }

    #[test]
    fn test_side_status_string_roundtrip() {
        for s in SideStatus::ALL {
            assert_eq!(SideStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(SideStatus::parse("nope"), None);
    }
}
