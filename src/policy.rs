//! Ownership rules for every API operation.
//!
//! Handlers call [`authorize`] before touching the store, so a refused
//! request never reaches a mutating query.

use crate::error::AppError;

/// The username recovered from a verified session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    pub fn username(&self) -> &str {
        &self.0
    }

    fn is(&self, username: &str) -> bool {
        self.0 == username
    }
}

/// What the caller is trying to do, with the ownership facts it depends on.
#[derive(Debug, Clone, Copy)]
pub enum Access<'a> {
    ViewMessage { from: &'a str, to: &'a str },
    MarkRead { to: &'a str },
    /// Profile, inbox or outbox of `username`.
    OwnAccount { username: &'a str },
    ListUsers,
    /// `claimed_sender` is the sender named in the request, if any.
    SendMessage { claimed_sender: Option<&'a str> },
}

pub fn authorize(identity: &Identity, access: Access<'_>) -> Result<(), AppError> {
    let allowed = match access {
        Access::ViewMessage { from, to } => identity.is(from) || identity.is(to),
        Access::MarkRead { to } => identity.is(to),
        Access::OwnAccount { username } => identity.is(username),
        Access::ListUsers => true,
        Access::SendMessage { claimed_sender } => claimed_sender.map_or(true, |s| identity.is(s)),
    };

    if allowed {
        Ok(())
    } else {
        tracing::debug!("🚫 {} denied {:?}", identity.username(), access);
        Err(AppError::Forbidden(denial_message(access).to_string()))
    }
}

fn denial_message(access: Access<'_>) -> &'static str {
    match access {
        Access::ViewMessage { .. } => "Only the sender or recipient may view this message",
        Access::MarkRead { .. } => "Only the recipient may mark this message read",
        Access::OwnAccount { .. } => "You may only access your own account",
        Access::ListUsers => "Not allowed to list users",
        Access::SendMessage { .. } => "Messages can only be sent as yourself",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forbidden(result: Result<(), AppError>) -> bool {
        matches!(result, Err(AppError::Forbidden(_)))
    }

    #[test]
    fn test_view_message() {
        let access = Access::ViewMessage { from: "dave", to: "carol" };
        assert!(authorize(&Identity::new("dave"), access).is_ok());
        assert!(authorize(&Identity::new("carol"), access).is_ok());
        assert!(forbidden(authorize(&Identity::new("bob"), access)));
    }

    #[test]
    fn test_only_recipient_marks_read() {
        let access = Access::MarkRead { to: "carol" };
        assert!(authorize(&Identity::new("carol"), access).is_ok());
        assert!(forbidden(authorize(&Identity::new("dave"), access)));
    }

    #[test]
    fn test_sender_can_view_but_not_mark_read() {
        let dave = Identity::new("dave");
        assert!(authorize(&dave, Access::ViewMessage { from: "dave", to: "carol" }).is_ok());
        assert!(forbidden(authorize(&dave, Access::MarkRead { to: "carol" })));
    }

    #[test]
    fn test_own_account() {
        let alice = Identity::new("alice");
        assert!(authorize(&alice, Access::OwnAccount { username: "alice" }).is_ok());
        assert!(forbidden(authorize(&alice, Access::OwnAccount { username: "bob" })));
    }

    #[test]
    fn test_any_identity_lists_users() {
        assert!(authorize(&Identity::new("anyone"), Access::ListUsers).is_ok());
    }

    #[test]
    fn test_send_cannot_spoof_sender() {
        let alice = Identity::new("alice");
        assert!(authorize(&alice, Access::SendMessage { claimed_sender: None }).is_ok());
        assert!(authorize(&alice, Access::SendMessage { claimed_sender: Some("alice") }).is_ok());
        assert!(forbidden(authorize(
            &alice,
            Access::SendMessage { claimed_sender: Some("bob") }
        )));
    }

    #[test]
    fn test_usernames_compare_exactly() {
        let alice = Identity::new("alice");
        assert!(forbidden(authorize(&alice, Access::OwnAccount { username: "Alice" })));
        assert!(forbidden(authorize(&alice, Access::OwnAccount { username: "alice " })));
    }
}
