use async_trait::async_trait;
use chrono::Utc;

use aquaflow_core::domain::quote::Quote;
use aquaflow_core::domain::user::{NewUser, UserId};
use aquaflow_core::errors::StoreError;
use aquaflow_core::service::{ProvisionAction, ProvisioningUnitOfWork};

use super::RepositoryError;
use crate::DbPool;

/// Runs the approval write-set in one transaction: the optional account
/// insert and the quote's lifecycle columns commit together or not at all.
pub struct SqlProvisioningUnitOfWork {
    pool: DbPool,
}

impl SqlProvisioningUnitOfWork {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn insert_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    new_user: &NewUser,
) -> Result<UserId, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO user_account (first_name, last_name, email, password_hash, phone,
                                   address, company, role, is_active, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(&new_user.email)
    .bind(&new_user.password_hash)
    .bind(&new_user.phone)
    .bind(&new_user.address)
    .bind(&new_user.company)
    .bind(new_user.role.as_str())
    .bind(new_user.active as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(UserId(result.last_insert_rowid()))
}

#[async_trait]
impl ProvisioningUnitOfWork for SqlProvisioningUnitOfWork {
    async fn commit_approval(
        &self,
        quote: &Quote,
        action: ProvisionAction,
    ) -> Result<UserId, StoreError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let user_id = match action {
            ProvisionAction::LinkExisting(user_id) => user_id,
            ProvisionAction::CreateUser(ref new_user) => insert_user(&mut tx, new_user).await?,
        };

        sqlx::query(
            "UPDATE quote SET user_id = ?, status = ?, admin_notes = ?, response_date = ?
             WHERE id = ?",
        )
        .bind(user_id.0)
        .bind(quote.status.as_str())
        .bind(&quote.admin_notes)
        .bind(quote.response_date.map(|dt| dt.to_rfc3339()))
        .bind(quote.id.0)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use sqlx::Row;

    use aquaflow_core::domain::product::ProductId;
    use aquaflow_core::domain::quote::{CustomerContact, NewQuote, Quote, QuoteStatus};
    use aquaflow_core::domain::user::{NewUser, UserId, UserRole};
    use aquaflow_core::service::{ProvisionAction, ProvisioningUnitOfWork, QuoteStore};

    use super::SqlProvisioningUnitOfWork;
    use crate::repositories::SqlQuoteStore;
    use crate::{connect_memory, migrations, DbPool};

    async fn pool_with_schema() -> DbPool {
        let pool = connect_memory().await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        sqlx::query("INSERT INTO product (name, base_price) VALUES ('Turbidity Sensor Array', '0')")
            .execute(&pool)
            .await
            .expect("seed product");
        pool
    }

    async fn pending_public_quote(pool: &DbPool) -> Quote {
        let now = Utc::now();
        SqlQuoteStore::new(pool.clone())
            .insert(NewQuote {
                user_id: None,
                product_id: ProductId(1),
                customer: CustomerContact {
                    name: "Ana Rivera".to_string(),
                    email: "ana@example.com".to_string(),
                    phone: None,
                    address: None,
                    company: None,
                },
                quantity: 1,
                unit_price: Decimal::new(87750, 2),
                total_cost: Decimal::new(87750, 2),
                status: QuoteStatus::Pending,
                notes: None,
                request_date: now,
                expiry_date: now + Duration::days(30),
                is_public: true,
            })
            .await
            .expect("insert quote")
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            first_name: "Ana".to_string(),
            last_name: "Rivera".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            phone: None,
            address: None,
            company: None,
            role: UserRole::Customer,
            active: true,
        }
    }

    #[tokio::test]
    async fn approval_with_account_creation_commits_both_writes() {
        let pool = pool_with_schema().await;
        let mut quote = pending_public_quote(&pool).await;
        quote
            .apply_status(QuoteStatus::Approved, Some("ok".to_string()), Utc::now())
            .expect("approve");

        let uow = SqlProvisioningUnitOfWork::new(pool.clone());
        let user_id = uow
            .commit_approval(&quote, ProvisionAction::CreateUser(new_user("ana@example.com")))
            .await
            .expect("commit");

        let stored = SqlQuoteStore::new(pool.clone())
            .find(quote.id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.status, QuoteStatus::Approved);
        assert_eq!(stored.user_id, Some(user_id));
        assert_eq!(stored.admin_notes.as_deref(), Some("ok"));

        let email: String = sqlx::query("SELECT email FROM user_account WHERE id = ?")
            .bind(user_id.0)
            .fetch_one(&pool)
            .await
            .expect("user row")
            .get("email");
        assert_eq!(email, "ana@example.com");
    }

    #[tokio::test]
    async fn duplicate_email_rolls_back_the_quote_update() {
        let pool = pool_with_schema().await;
        sqlx::query(
            "INSERT INTO user_account (first_name, email, password_hash, created_at)
             VALUES ('Ana', 'ANA@EXAMPLE.COM', 'h', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("seed conflicting user");

        let mut quote = pending_public_quote(&pool).await;
        quote.apply_status(QuoteStatus::Approved, None, Utc::now()).expect("approve");

        let uow = SqlProvisioningUnitOfWork::new(pool.clone());
        let error = uow
            .commit_approval(&quote, ProvisionAction::CreateUser(new_user("ana@example.com")))
            .await
            .expect_err("unique email violation");
        assert!(error.to_string().contains("database error"));

        // Nothing committed: the quote is still pending and unowned.
        let stored = SqlQuoteStore::new(pool)
            .find(quote.id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.status, QuoteStatus::Pending);
        assert_eq!(stored.user_id, None);
    }

    #[tokio::test]
    async fn linking_an_existing_account_updates_only_the_quote() {
        let pool = pool_with_schema().await;
        sqlx::query(
            "INSERT INTO user_account (first_name, email, password_hash, created_at)
             VALUES ('Ana', 'ana@example.com', 'h', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("seed user");

        let mut quote = pending_public_quote(&pool).await;
        quote.apply_status(QuoteStatus::Approved, None, Utc::now()).expect("approve");

        let uow = SqlProvisioningUnitOfWork::new(pool.clone());
        let user_id = uow
            .commit_approval(&quote, ProvisionAction::LinkExisting(UserId(1)))
            .await
            .expect("commit");
        assert_eq!(user_id, UserId(1));

        let user_count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM user_account")
            .fetch_one(&pool)
            .await
            .expect("count")
            .get("count");
        assert_eq!(user_count, 1);

        let stored = SqlQuoteStore::new(pool)
            .find(quote.id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.user_id, Some(UserId(1)));
        assert_eq!(stored.status, QuoteStatus::Approved);
    }
}
