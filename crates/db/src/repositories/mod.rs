use thiserror::Error;

use aquaflow_core::errors::StoreError;

pub mod product;
pub mod provisioning;
pub mod quote;
pub mod user;

pub use product::SqlProductCatalog;
pub use provisioning::SqlProvisioningUnitOfWork;
pub use quote::SqlQuoteStore;
pub use user::SqlUserDirectory;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        StoreError::Backend(error.to_string())
    }
}
