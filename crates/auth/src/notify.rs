//! Outbound Notification Interfaces
//!
//! The core never talks to a mail server directly. It composes a draft
//! through a [`MailComposer`] collaborator and hands it to a [`Notifier`];
//! both are injected, so the transport (SMTP, queue, callback) and the
//! message catalog stay outside the core.

use thiserror::Error;

use crate::domain::entity::action_token::TokenKind;
use crate::domain::value_object::email::EmailAddress;

/// Delivery failure reported by a notifier
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DispatchError(pub String);

/// A fully rendered message, ready to send
#[derive(Debug, Clone)]
pub struct MailDraft {
    pub subject: String,
    pub body: String,
}

/// Renders the subject/body for an action-token message
///
/// Implementations own the message text (localization, templating, site
/// branding); the core only supplies the token kind and the token itself.
pub trait MailComposer: Send + Sync {
    fn compose(&self, kind: TokenKind, token: &str) -> MailDraft;
}

/// Outbound message transport
#[trait_variant::make(Notifier: Send)]
pub trait LocalNotifier {
    async fn send(&self, to: &EmailAddress, draft: &MailDraft) -> Result<(), DispatchError>;
}

/// Notifier that logs instead of sending
///
/// Useful in development and in deployments where delivery is handled by a
/// separate relay process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, to: &EmailAddress, draft: &MailDraft) -> Result<(), DispatchError> {
        tracing::info!(
            to = %to,
            subject = %draft.subject,
            "notification send stub"
        );
        Ok(())
    }
}
