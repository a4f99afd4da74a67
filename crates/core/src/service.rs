use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::costing::{round_money, CostingEngine};
use crate::domain::product::{Product, ProductId};
use crate::domain::quote::{CustomerContact, NewQuote, Quote, QuoteId, QuoteStatus};
use crate::domain::user::{NewUser, User, UserId, UserRole};
use crate::errors::{ServiceError, StoreError};
use crate::notify::{Notification, NotificationDispatcher};
use crate::provisioning::{split_full_name, temp_password, PasswordHasher};

/// Quotes are honored for this long after the request date.
pub const QUOTE_VALIDITY_DAYS: i64 = 30;

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Active products only; retired products are invisible to quoting.
    async fn find(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn insert(&self, quote: NewQuote) -> Result<Quote, StoreError>;
    async fn find(&self, id: QuoteId) -> Result<Option<Quote>, StoreError>;
    async fn list_all(&self) -> Result<Vec<Quote>, StoreError>;
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Quote>, StoreError>;
    async fn update(&self, quote: &Quote) -> Result<(), StoreError>;
    /// Returns false when no row matched.
    async fn delete(&self, id: QuoteId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;
    /// Case-insensitive email lookup restricted to active accounts.
    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

/// What approval should do about the customer's account.
#[derive(Clone, Debug)]
pub enum ProvisionAction {
    LinkExisting(UserId),
    CreateUser(NewUser),
}

/// Commits an approval atomically: persists the quote's new status and owner
/// together with any account creation, or neither.
#[async_trait]
pub trait ProvisioningUnitOfWork: Send + Sync {
    async fn commit_approval(
        &self,
        quote: &Quote,
        action: ProvisionAction,
    ) -> Result<UserId, StoreError>;
}

/// Incoming quote request, public or on behalf of a registered user.
#[derive(Clone, Debug)]
pub struct QuoteRequest {
    pub product_id: ProductId,
    pub contact: CustomerContact,
    pub quantity: u32,
    pub notes: Option<String>,
}

impl QuoteRequest {
    /// Checked after profile backfill, so registered users may leave contact
    /// fields blank in the submission itself.
    fn validate(&self) -> Result<(), ServiceError> {
        if self.quantity == 0 {
            return Err(ServiceError::InvalidRequest(
                "quantity must be at least 1".to_string(),
            ));
        }
        if self.contact.name.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("customer name is required".to_string()));
        }
        let email = self.contact.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::InvalidRequest(
                "a valid customer email is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Quote enriched with display names resolved from the catalog and
/// directory. Every read and create path hands this back instead of the
/// bare entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuoteView {
    #[serde(flatten)]
    pub quote: Quote,
    pub product_name: String,
    pub user_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ApprovalOutcome {
    pub quote: Quote,
    pub user_id: UserId,
    /// True when approval created the account rather than linking one.
    pub account_created: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QuoteStatistics {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub completed: u64,
    pub public_quotes: u64,
    pub registered_quotes: u64,
    pub last_30_days: u64,
    pub expired_pending: u64,
    /// Value aggregates cover non-rejected quotes only.
    pub total_value: Decimal,
    pub average_value: Decimal,
}

impl QuoteStatistics {
    pub fn compute(quotes: &[Quote], now: DateTime<Utc>) -> Self {
        let mut stats = Self::default();
        let window_start = now - Duration::days(30);
        let mut valued = 0u64;

        for quote in quotes {
            stats.total += 1;
            match quote.status {
                QuoteStatus::Pending => stats.pending += 1,
                QuoteStatus::Approved => stats.approved += 1,
                QuoteStatus::Rejected => stats.rejected += 1,
                QuoteStatus::Completed => stats.completed += 1,
            }
            if quote.is_public {
                stats.public_quotes += 1;
            } else {
                stats.registered_quotes += 1;
            }
            if quote.request_date >= window_start {
                stats.last_30_days += 1;
            }
            if quote.status == QuoteStatus::Pending && quote.is_expired(now) {
                stats.expired_pending += 1;
            }
            if quote.status != QuoteStatus::Rejected {
                valued += 1;
                stats.total_value += quote.total_cost;
            }
        }

        if valued > 0 {
            stats.average_value = round_money(stats.total_value / Decimal::from(valued));
        }
        stats
    }
}

/// Orchestrates the quote lifecycle over pluggable storage, directory,
/// hashing and mail collaborators.
pub struct QuoteService {
    catalog: Arc<dyn ProductCatalog>,
    store: Arc<dyn QuoteStore>,
    directory: Arc<dyn UserDirectory>,
    unit_of_work: Arc<dyn ProvisioningUnitOfWork>,
    hasher: Arc<dyn PasswordHasher>,
    dispatcher: NotificationDispatcher,
    engine: CostingEngine,
}

impl QuoteService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        store: Arc<dyn QuoteStore>,
        directory: Arc<dyn UserDirectory>,
        unit_of_work: Arc<dyn ProvisioningUnitOfWork>,
        hasher: Arc<dyn PasswordHasher>,
        dispatcher: NotificationDispatcher,
        engine: CostingEngine,
    ) -> Self {
        Self { catalog, store, directory, unit_of_work, hasher, dispatcher, engine }
    }

    /// Anonymous request from the public site. The quote is priced, stored
    /// as pending, and both the sales inbox and the requester are notified.
    pub async fn create_public_quote(
        &self,
        request: QuoteRequest,
    ) -> Result<QuoteView, ServiceError> {
        self.create(request, None).await
    }

    /// Request on behalf of a registered user. Blank contact fields are
    /// backfilled from the profile; the company always comes from the
    /// profile.
    pub async fn create_quote(
        &self,
        user_id: UserId,
        mut request: QuoteRequest,
    ) -> Result<QuoteView, ServiceError> {
        let user = self
            .directory
            .find_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        if request.contact.name.trim().is_empty() {
            request.contact.name = user.full_name();
        }
        if request.contact.email.trim().is_empty() {
            request.contact.email = user.email.clone();
        }
        if request.contact.phone.is_none() {
            request.contact.phone = user.phone.clone();
        }
        if request.contact.address.is_none() {
            request.contact.address = user.address.clone();
        }
        request.contact.company = user.company.clone();

        self.create(request, Some(&user)).await
    }

    async fn create(
        &self,
        request: QuoteRequest,
        user: Option<&User>,
    ) -> Result<QuoteView, ServiceError> {
        request.validate()?;

        let product = self
            .catalog
            .find(request.product_id)
            .await?
            .ok_or(ServiceError::ProductNotFound(request.product_id))?;

        let breakdown = self.engine.compute(&product, request.quantity);
        let now = Utc::now();
        let quote = self
            .store
            .insert(NewQuote {
                user_id: user.map(|user| user.id),
                product_id: product.id,
                customer: request.contact,
                quantity: request.quantity,
                unit_price: breakdown.unit_price,
                total_cost: breakdown.total_cost,
                status: QuoteStatus::Pending,
                notes: request.notes,
                request_date: now,
                expiry_date: now + Duration::days(QUOTE_VALIDITY_DAYS),
                is_public: user.is_none(),
            })
            .await?;

        tracing::info!(
            quote_id = %quote.id,
            product_id = %product.id,
            quantity = quote.quantity,
            total = %quote.total_cost,
            public = quote.is_public,
            "quote created"
        );

        self.dispatcher.dispatch(Notification::AdminQuoteAlert {
            quote_id: quote.id,
            customer_name: quote.customer.name.clone(),
            customer_email: quote.customer.email.clone(),
            product_name: product.name.clone(),
            quantity: quote.quantity,
            total_cost: quote.total_cost,
        });
        self.dispatcher.dispatch(Notification::QuoteConfirmation {
            email: quote.customer.email.clone(),
            quote_id: quote.id,
        });

        Ok(QuoteView {
            quote,
            product_name: product.name,
            user_name: user.map(User::full_name),
        })
    }

    pub async fn get_quote(&self, id: QuoteId) -> Result<QuoteView, ServiceError> {
        let quote = self
            .store
            .find(id)
            .await?
            .ok_or(ServiceError::QuoteNotFound(id))?;
        self.view(quote).await
    }

    pub async fn list_quotes(&self) -> Result<Vec<QuoteView>, ServiceError> {
        let quotes = self.store.list_all().await?;
        self.views(quotes).await
    }

    pub async fn list_quotes_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<QuoteView>, ServiceError> {
        self.directory
            .find_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        let quotes = self.store.list_by_user(user_id).await?;
        self.views(quotes).await
    }

    async fn view(&self, quote: Quote) -> Result<QuoteView, ServiceError> {
        let product_name = self.product_name(quote.product_id).await?;
        let user_name = match quote.user_id {
            Some(user_id) => self
                .directory
                .find_by_id(user_id)
                .await?
                .map(|user| user.full_name()),
            None => None,
        };
        Ok(QuoteView { quote, product_name, user_name })
    }

    /// Hydrates a page of quotes, looking each distinct product and user up
    /// once rather than per row.
    async fn views(&self, quotes: Vec<Quote>) -> Result<Vec<QuoteView>, ServiceError> {
        let mut product_names: HashMap<i64, String> = HashMap::new();
        let mut user_names: HashMap<i64, Option<String>> = HashMap::new();
        let mut views = Vec::with_capacity(quotes.len());

        for quote in quotes {
            let product_name = match product_names.get(&quote.product_id.0) {
                Some(name) => name.clone(),
                None => {
                    let name = self.product_name(quote.product_id).await?;
                    product_names.insert(quote.product_id.0, name.clone());
                    name
                }
            };
            let user_name = match quote.user_id {
                None => None,
                Some(user_id) => match user_names.get(&user_id.0) {
                    Some(name) => name.clone(),
                    None => {
                        let name = self
                            .directory
                            .find_by_id(user_id)
                            .await?
                            .map(|user| user.full_name());
                        user_names.insert(user_id.0, name.clone());
                        name
                    }
                },
            };
            views.push(QuoteView { quote, product_name, user_name });
        }
        Ok(views)
    }

    async fn product_name(&self, id: ProductId) -> Result<String, ServiceError> {
        Ok(self
            .catalog
            .find(id)
            .await?
            .map(|product| product.name)
            .unwrap_or_else(|| format!("product #{id}")))
    }

    /// Moves a quote through the lifecycle and notifies the customer.
    pub async fn update_status(
        &self,
        id: QuoteId,
        next: QuoteStatus,
        admin_notes: Option<String>,
    ) -> Result<Quote, ServiceError> {
        let mut quote = self
            .store
            .find(id)
            .await?
            .ok_or(ServiceError::QuoteNotFound(id))?;

        quote.apply_status(next, admin_notes, Utc::now())?;
        self.store.update(&quote).await?;

        tracing::info!(quote_id = %quote.id, status = %quote.status, "quote status updated");
        self.dispatcher.dispatch(Notification::StatusChange {
            email: quote.customer.email.clone(),
            quote_id: quote.id,
            status: quote.status,
        });

        Ok(quote)
    }

    /// Pending quotes can be withdrawn; approved and completed quotes are
    /// part of the order history and stay.
    pub async fn delete_quote(&self, id: QuoteId) -> Result<(), ServiceError> {
        let quote = self
            .store
            .find(id)
            .await?
            .ok_or(ServiceError::QuoteNotFound(id))?;

        if matches!(quote.status, QuoteStatus::Approved | QuoteStatus::Completed) {
            return Err(ServiceError::ProtectedQuote { id, status: quote.status });
        }
        if !self.store.delete(id).await? {
            return Err(ServiceError::QuoteNotFound(id));
        }
        tracing::info!(quote_id = %id, "quote deleted");
        Ok(())
    }

    /// Approves a pending public quote and makes sure the requester ends up
    /// with an account: an existing active account with the same email is
    /// linked, otherwise one is created with a temporary password. Quote
    /// update and account creation commit together.
    pub async fn approve_and_provision(
        &self,
        id: QuoteId,
        admin_notes: Option<String>,
    ) -> Result<ApprovalOutcome, ServiceError> {
        let mut quote = self
            .store
            .find(id)
            .await?
            .ok_or(ServiceError::QuoteNotFound(id))?;

        if quote.status != QuoteStatus::Pending {
            return Err(ServiceError::NotPending { id, status: quote.status });
        }
        if !quote.is_public {
            return Err(ServiceError::NotPublic { id });
        }

        quote.apply_status(QuoteStatus::Approved, admin_notes, Utc::now())?;

        let existing = self
            .directory
            .find_active_by_email(&quote.customer.email)
            .await?;

        let (action, credentials) = match existing {
            Some(user) => (ProvisionAction::LinkExisting(user.id), None),
            None => {
                let password = temp_password();
                let (first_name, last_name) = split_full_name(&quote.customer.name);
                let new_user = NewUser {
                    first_name,
                    last_name,
                    email: quote.customer.email.clone(),
                    password_hash: self.hasher.hash(&password),
                    phone: quote.customer.phone.clone(),
                    address: quote.customer.address.clone(),
                    company: quote.customer.company.clone(),
                    role: UserRole::Customer,
                    active: true,
                };
                (ProvisionAction::CreateUser(new_user), Some(password))
            }
        };
        let account_created = credentials.is_some();

        let user_id = self.unit_of_work.commit_approval(&quote, action).await?;
        quote.user_id = Some(user_id);

        tracing::info!(
            quote_id = %quote.id,
            user_id = %user_id,
            account_created,
            "quote approved and provisioned"
        );

        if let Some(password) = credentials {
            self.dispatcher.dispatch(Notification::WelcomeCredentials {
                email: quote.customer.email.clone(),
                full_name: quote.customer.name.clone(),
                temp_password: password,
            });
        }
        self.dispatcher.dispatch(Notification::StatusChange {
            email: quote.customer.email.clone(),
            quote_id: quote.id,
            status: quote.status,
        });

        Ok(ApprovalOutcome { quote, user_id, account_created })
    }

    pub async fn statistics(&self) -> Result<QuoteStatistics, ServiceError> {
        let quotes = self.store.list_all().await?;
        Ok(QuoteStatistics::compute(&quotes, Utc::now()))
    }
}
