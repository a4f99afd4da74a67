pub mod config;
pub mod costing;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod provisioning;
pub mod service;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use costing::{round_money, CostBreakdown, CostingConfig, CostingEngine, DiscountTier};
pub use domain::product::{BomLine, Material, MaterialId, Product, ProductId};
pub use domain::quote::{CustomerContact, NewQuote, Quote, QuoteId, QuoteStatus};
pub use domain::user::{NewUser, User, UserId, UserRole};
pub use errors::{DomainError, ServiceError, StoreError};
pub use notify::{Mailer, MailerError, Notification, NotificationDispatcher};
pub use provisioning::{
    split_full_name, temp_password, PasswordHasher, Sha256PasswordHasher,
};
pub use service::{
    ApprovalOutcome, ProductCatalog, ProvisionAction, ProvisioningUnitOfWork, QuoteRequest,
    QuoteService, QuoteStatistics, QuoteStore, QuoteView, UserDirectory, QUOTE_VALIDITY_DAYS,
};
