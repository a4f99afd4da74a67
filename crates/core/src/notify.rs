use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::domain::quote::{QuoteId, QuoteStatus};

/// Outbound customer/admin messages. Each variant carries exactly the fields
/// the rendered message needs; rendering lives with the mailer.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// Tells the sales inbox a new public request arrived.
    AdminQuoteAlert {
        quote_id: QuoteId,
        customer_name: String,
        customer_email: String,
        product_name: String,
        quantity: u32,
        total_cost: Decimal,
    },
    /// Receipt sent to the requester right after submission.
    QuoteConfirmation { email: String, quote_id: QuoteId },
    /// Sent whenever an admin moves a quote through the lifecycle.
    StatusChange { email: String, quote_id: QuoteId, status: QuoteStatus },
    /// First-login credentials for an account created during approval.
    WelcomeCredentials { email: String, full_name: String, temp_password: String },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Self::AdminQuoteAlert { customer_email, .. } => customer_email,
            Self::QuoteConfirmation { email, .. }
            | Self::StatusChange { email, .. }
            | Self::WelcomeCredentials { email, .. } => email,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MailerError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), MailerError>;
}

/// Fire-and-forget fan-out over a [`Mailer`]. Delivery never blocks or fails
/// the calling operation; failures are logged and dropped.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Spawns the delivery and returns the handle. Production callers drop
    /// the handle; tests await it to observe delivery.
    pub fn dispatch(&self, notification: Notification) -> JoinHandle<()> {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            if let Err(error) = mailer.deliver(&notification).await {
                tracing::warn!(%error, recipient = notification.recipient(), "notification dropped");
            }
        })
    }
}
