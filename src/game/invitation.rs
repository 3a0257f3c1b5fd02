//! Invitation tracker
//!
//! Each pending invitation is stored once, keyed by its recipient, with a
//! secondary index from the initiator. A session is therefore the recipient
//! of at most one invitation and the initiator of at most one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{GameError, GameResult};
use crate::game::session::SessionId;

/// A pending battle request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub initiator: SessionId,
    pub initiator_name: String,
    pub recipient: SessionId,
    pub recipient_name: String,
    pub sent_at: DateTime<Utc>,
}

impl Invitation {
    pub fn new(
        initiator: SessionId,
        initiator_name: &str,
        recipient: SessionId,
        recipient_name: &str,
    ) -> Self {
        Self {
            initiator,
            initiator_name: initiator_name.to_string(),
            recipient,
            recipient_name: recipient_name.to_string(),
            sent_at: Utc::now(),
        }
    }

    /// Whether `session` is either party
    pub fn involves(&self, session: SessionId) -> bool {
        self.initiator == session || self.recipient == session
    }

    /// The party that is not `session`
    pub fn counterpart(&self, session: SessionId) -> (SessionId, &str) {
        if self.initiator == session {
            (self.recipient, &self.recipient_name)
        } else {
            (self.initiator, &self.initiator_name)
        }
    }
}

/// Pending invitations
#[derive(Debug, Default)]
pub struct InvitationTracker {
    /// Recipient to the canonical record
    by_recipient: HashMap<SessionId, Invitation>,
    /// Initiator to recipient
    by_initiator: HashMap<SessionId, SessionId>,
}

impl InvitationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new invitation.
    ///
    /// Rejected when the recipient already has one waiting or has issued one
    /// of its own, and when the initiator is still waiting on an answer.
    pub fn invite(&mut self, invitation: Invitation) -> GameResult<()> {
        if invitation.initiator == invitation.recipient {
            return Err(GameError::SelfInvite);
        }
        if let Some(pending) = self.issued_by(invitation.initiator) {
            return Err(GameError::InvitePending(pending.recipient_name.clone()));
        }
        if self.by_recipient.contains_key(&invitation.recipient)
            || self.by_initiator.contains_key(&invitation.recipient)
        {
            return Err(GameError::TargetBusy(invitation.recipient_name));
        }

        debug!(
            from = %invitation.initiator_name,
            to = %invitation.recipient_name,
            "Invitation recorded"
        );

        self.by_initiator
            .insert(invitation.initiator, invitation.recipient);
        self.by_recipient.insert(invitation.recipient, invitation);
        Ok(())
    }

    /// Take the invitation addressed to `recipient`
    pub fn respond(&mut self, recipient: SessionId) -> GameResult<Invitation> {
        let invitation = self
            .by_recipient
            .remove(&recipient)
            .ok_or(GameError::NoPendingInvite)?;
        self.by_initiator.remove(&invitation.initiator);
        Ok(invitation)
    }

    /// Invitation waiting for `recipient`
    pub fn pending_for(&self, recipient: SessionId) -> Option<&Invitation> {
        self.by_recipient.get(&recipient)
    }

    /// Invitation issued by `initiator`
    pub fn issued_by(&self, initiator: SessionId) -> Option<&Invitation> {
        self.by_initiator
            .get(&initiator)
            .and_then(|recipient| self.by_recipient.get(recipient))
    }

    /// Drop every invitation involving `session`
    pub fn withdraw(&mut self, session: SessionId) -> Vec<Invitation> {
        let mut dropped = Vec::new();

        if let Some(invitation) = self.by_recipient.remove(&session) {
            self.by_initiator.remove(&invitation.initiator);
            dropped.push(invitation);
        }
        if let Some(recipient) = self.by_initiator.remove(&session) {
            if let Some(invitation) = self.by_recipient.remove(&recipient) {
                dropped.push(invitation);
            }
        }

        if !dropped.is_empty() {
            debug!(session_id = session, count = dropped.len(), "Invitations withdrawn");
        }
        dropped
    }

    /// Number of pending invitations
    pub fn len(&self) -> usize {
        self.by_recipient.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_recipient.is_empty()
    }
}
