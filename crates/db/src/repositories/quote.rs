use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use aquaflow_core::domain::product::ProductId;
use aquaflow_core::domain::quote::{CustomerContact, NewQuote, Quote, QuoteId, QuoteStatus};
use aquaflow_core::domain::user::UserId;
use aquaflow_core::errors::StoreError;
use aquaflow_core::service::QuoteStore;

use super::product::parse_decimal;
use super::RepositoryError;
use crate::DbPool;

pub struct SqlQuoteStore {
    pool: DbPool,
}

impl SqlQuoteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const QUOTE_COLUMNS: &str = "id, user_id, product_id, customer_name, customer_email, \
     customer_phone, customer_address, customer_company, quantity, unit_price, total_cost, \
     status, notes, admin_notes, request_date, response_date, expiry_date, is_public";

fn parse_datetime(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: `{value}`: {e}")))
}

fn row_to_quote(row: &sqlx::sqlite::SqliteRow) -> Result<Quote, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: Option<i64> =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_id: i64 =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_name: String =
        row.try_get("customer_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_email: String =
        row.try_get("customer_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_phone: Option<String> =
        row.try_get("customer_phone").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_address: Option<String> =
        row.try_get("customer_address").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_company: Option<String> =
        row.try_get("customer_company").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit_price_str: String =
        row.try_get("unit_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_cost_str: String =
        row.try_get("total_cost").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let notes: Option<String> =
        row.try_get("notes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let admin_notes: Option<String> =
        row.try_get("admin_notes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let request_date_str: String =
        row.try_get("request_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let response_date_str: Option<String> =
        row.try_get("response_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let expiry_date_str: String =
        row.try_get("expiry_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_public: i64 =
        row.try_get("is_public").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = QuoteStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status `{status_str}`")))?;
    let response_date = match response_date_str {
        Some(value) => Some(parse_datetime("response_date", &value)?),
        None => None,
    };

    Ok(Quote {
        id: QuoteId(id),
        user_id: user_id.map(UserId),
        product_id: ProductId(product_id),
        customer: CustomerContact {
            name: customer_name,
            email: customer_email,
            phone: customer_phone,
            address: customer_address,
            company: customer_company,
        },
        quantity: quantity as u32,
        unit_price: parse_decimal("unit_price", &unit_price_str)?,
        total_cost: parse_decimal("total_cost", &total_cost_str)?,
        status,
        notes,
        admin_notes,
        request_date: parse_datetime("request_date", &request_date_str)?,
        response_date,
        expiry_date: parse_datetime("expiry_date", &expiry_date_str)?,
        is_public: is_public != 0,
    })
}

#[async_trait]
impl QuoteStore for SqlQuoteStore {
    async fn insert(&self, new: NewQuote) -> Result<Quote, StoreError> {
        let result = sqlx::query(
            "INSERT INTO quote (user_id, product_id, customer_name, customer_email,
                                customer_phone, customer_address, customer_company, quantity,
                                unit_price, total_cost, status, notes, request_date,
                                expiry_date, is_public)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.user_id.map(|id| id.0))
        .bind(new.product_id.0)
        .bind(&new.customer.name)
        .bind(&new.customer.email)
        .bind(&new.customer.phone)
        .bind(&new.customer.address)
        .bind(&new.customer.company)
        .bind(new.quantity as i64)
        .bind(new.unit_price.to_string())
        .bind(new.total_cost.to_string())
        .bind(new.status.as_str())
        .bind(&new.notes)
        .bind(new.request_date.to_rfc3339())
        .bind(new.expiry_date.to_rfc3339())
        .bind(new.is_public as i64)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(Quote {
            id: QuoteId(result.last_insert_rowid()),
            user_id: new.user_id,
            product_id: new.product_id,
            customer: new.customer,
            quantity: new.quantity,
            unit_price: new.unit_price,
            total_cost: new.total_cost,
            status: new.status,
            notes: new.notes,
            admin_notes: None,
            request_date: new.request_date,
            response_date: None,
            expiry_date: new.expiry_date,
            is_public: new.is_public,
        })
    }

    async fn find(&self, id: QuoteId) -> Result<Option<Quote>, StoreError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quote WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(ref r) => Ok(Some(row_to_quote(r)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Quote>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quote ORDER BY request_date DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_quote).collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Quote>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quote WHERE user_id = ?
             ORDER BY request_date DESC, id DESC"
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_quote).collect::<Result<Vec<_>, _>>()?)
    }

    /// Only the mutable columns; pricing and contact snapshots are
    /// write-once at insert.
    async fn update(&self, quote: &Quote) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE quote SET user_id = ?, status = ?, admin_notes = ?, response_date = ?
             WHERE id = ?",
        )
        .bind(quote.user_id.map(|id| id.0))
        .bind(quote.status.as_str())
        .bind(&quote.admin_notes)
        .bind(quote.response_date.map(|dt| dt.to_rfc3339()))
        .bind(quote.id.0)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn delete(&self, id: QuoteId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM quote WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() > 0)
    }
}
