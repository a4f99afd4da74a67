use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub i64);

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quote lifecycle status. The variant names are the wire/storage literals;
/// they must not be renamed without a data migration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Completed => "Completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(Self::Pending),
            "Approved" => Some(Self::Approved),
            "Rejected" => Some(Self::Rejected),
            "Completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact details captured when the quote is requested. Independent copies:
/// later edits to the user's profile never alter historical quotes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub user_id: Option<UserId>,
    pub product_id: ProductId,
    pub customer: CustomerContact,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_cost: Decimal,
    pub status: QuoteStatus,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub request_date: DateTime<Utc>,
    pub response_date: Option<DateTime<Utc>>,
    pub expiry_date: DateTime<Utc>,
    pub is_public: bool,
}

/// Insert payload; the store assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewQuote {
    pub user_id: Option<UserId>,
    pub product_id: ProductId,
    pub customer: CustomerContact,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_cost: Decimal,
    pub status: QuoteStatus,
    pub notes: Option<String>,
    pub request_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub is_public: bool,
}

impl Quote {
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        matches!(
            (self.status, next),
            (QuoteStatus::Pending, QuoteStatus::Approved)
                | (QuoteStatus::Pending, QuoteStatus::Rejected)
                | (QuoteStatus::Approved, QuoteStatus::Completed)
                | (QuoteStatus::Approved, QuoteStatus::Rejected)
        )
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_date
    }

    /// Applies a status change: validates the transition table, refuses
    /// approval past the expiry date, replaces the admin notes, and stamps
    /// the response date.
    pub fn apply_status(
        &mut self,
        next: QuoteStatus,
        admin_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidQuoteTransition { from: self.status, to: next });
        }
        if next == QuoteStatus::Approved && self.is_expired(now) {
            return Err(DomainError::QuoteExpired { id: self.id, expired_at: self.expiry_date });
        }

        self.status = next;
        self.admin_notes = admin_notes;
        self.response_date = Some(now);
        Ok(())
    }
}
