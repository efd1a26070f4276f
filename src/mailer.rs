//! Outgoing email seam.
//!
//! Delivery belongs to a transactional email provider. The service only
//! describes what to send; [`LogMailer`] records it through tracing and is the
//! default until a provider-backed implementation is plugged in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Content of an invitation email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvitationEmail {
    /// Recipient address
    pub to: String,
    /// Organization the recipient is invited to
    pub organization_name: String,
    /// Name of the inviting user
    pub invited_by: String,
    /// Secret used to accept or reject
    pub token: String,
    /// Deadline for answering
    pub expires_at: DateTime<Utc>,
}

/// Sends notification emails.
pub trait Mailer: Send + Sync {
    /// Queues an invitation email. Delivery failures must not fail the action.
    fn send_invitation(&self, email: &InvitationEmail);
}

/// Writes emails to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_invitation(&self, email: &InvitationEmail) {
        info!(
            to = %email.to,
            organization = %email.organization_name,
            expires_at = %email.expires_at,
            "invitation email queued"
        );
    }
}

/// Keeps every email in memory; used by tests to assert on notifications.
#[derive(Debug, Default, Clone)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<InvitationEmail>>>,
}

impl RecordingMailer {
    /// Emails recorded so far.
    #[must_use]
    pub fn sent(&self) -> Vec<InvitationEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Mailer for RecordingMailer {
    fn send_invitation(&self, email: &InvitationEmail) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
    }
}
