//! The seam to whatever actually sends mail.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// One rendered email ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub campaign_id: Uuid,
    pub recipient_id: Uuid,
    /// Address of the connected sending account
    pub from_account: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// This address cannot be delivered to. The recipient fails for good.
    #[error("Recipient rejected: {0}")]
    Recipient(String),

    /// The sending account is unusable. The campaign is paused and the
    /// recipient stays pending.
    #[error("Sending account unavailable: {0}")]
    Account(String),
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError>;
}

/// Accepts every message and logs it. Used when no real transport is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        tracing::info!(
            campaign_id = %mail.campaign_id,
            recipient_id = %mail.recipient_id,
            from = %mail.from_account,
            to = %mail.to,
            subject = %mail.subject,
            "Mail handed to log transport"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_transport_accepts_everything() {
        let mail = OutgoingMail {
            campaign_id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            from_account: "sender@example.com".into(),
            to: "ann@example.com".into(),
            subject: "Hi".into(),
            html: "<p>Hi</p>".into(),
            text: "Hi".into(),
        };
        assert_eq!(LogTransport.send(&mail).await, Ok(()));
    }

    #[test]
    fn errors_describe_their_scope() {
        assert_eq!(
            TransportError::Recipient("mailbox full".into()).to_string(),
            "Recipient rejected: mailbox full"
        );
        assert_eq!(
            TransportError::Account("token revoked".into()).to_string(),
            "Sending account unavailable: token revoked"
        );
    }
}
