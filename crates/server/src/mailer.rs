use async_trait::async_trait;

use aquaflow_core::notify::{Mailer, MailerError, Notification};

/// Mailer that writes outbound messages to the structured log instead of an
/// SMTP relay. Used until a relay host is configured, and in every test
/// environment.
pub struct LogMailer {
    admin_email: String,
    sender_name: String,
}

impl LogMailer {
    pub fn new(admin_email: String, sender_name: String) -> Self {
        Self { admin_email, sender_name }
    }

    /// Log-safe summary of a notification. Credentials never appear here;
    /// the temporary password exists only in the real message body.
    fn describe(&self, notification: &Notification) -> (String, String) {
        match notification {
            Notification::AdminQuoteAlert {
                quote_id,
                customer_name,
                product_name,
                quantity,
                total_cost,
                ..
            } => (
                self.admin_email.clone(),
                format!(
                    "new quote #{quote_id}: {quantity} x {product_name} for {customer_name} \
                     ({total_cost} total)"
                ),
            ),
            Notification::QuoteConfirmation { email, quote_id } => {
                (email.clone(), format!("quote #{quote_id} received"))
            }
            Notification::StatusChange { email, quote_id, status } => {
                (email.clone(), format!("quote #{quote_id} is now {status}"))
            }
            Notification::WelcomeCredentials { email, full_name, .. } => {
                (email.clone(), format!("welcome {full_name}, your account is ready"))
            }
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, notification: &Notification) -> Result<(), MailerError> {
        let (recipient, summary) = self.describe(notification);
        tracing::info!(
            sender = %self.sender_name,
            recipient = %recipient,
            summary = %summary,
            "outbound mail"
        );
        Ok(())
    }
}
