use async_trait::async_trait;
use sqlx::Row;

use aquaflow_core::domain::user::{User, UserId, UserRole};
use aquaflow_core::errors::StoreError;
use aquaflow_core::service::UserDirectory;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlUserDirectory {
    pool: DbPool,
}

impl SqlUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, phone, address, \
     company, role, is_active";

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let first_name: String =
        row.try_get("first_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_name: String =
        row.try_get("last_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String =
        row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let password_hash: String =
        row.try_get("password_hash").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let phone: Option<String> =
        row.try_get("phone").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let address: Option<String> =
        row.try_get("address").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let company: Option<String> =
        row.try_get("company").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role_str: String =
        row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_active: i64 =
        row.try_get("is_active").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let role = UserRole::parse(&role_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown user role `{role_str}`")))?;

    Ok(User {
        id: UserId(id),
        first_name,
        last_name,
        email,
        password_hash,
        phone,
        address,
        company,
        role,
        active: is_active != 0,
    })
}

#[async_trait]
impl UserDirectory for SqlUserDirectory {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM user_account WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }

    // The email column is COLLATE NOCASE, so equality here is already
    // case-insensitive.
    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM user_account WHERE email = ? AND is_active = 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }
}
