use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Row;

use aquaflow_core::domain::product::{BomLine, MaterialId, Product, ProductId};
use aquaflow_core::errors::StoreError;
use aquaflow_core::service::ProductCatalog;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlProductCatalog {
    pool: DbPool,
}

impl SqlProductCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|e| RepositoryError::Decode(format!("{column}: `{value}`: {e}")))
}

fn row_to_bom_line(row: &sqlx::sqlite::SqliteRow) -> Result<BomLine, RepositoryError> {
    let material_id: i64 =
        row.try_get("material_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let material_name: String =
        row.try_get("material_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity_str: String =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit_cost_str: String =
        row.try_get("unit_cost").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(BomLine {
        material_id: MaterialId(material_id),
        material_name,
        quantity: parse_decimal("quantity", &quantity_str)?,
        unit_cost: parse_decimal("unit_cost", &unit_cost_str)?,
    })
}

#[async_trait]
impl ProductCatalog for SqlProductCatalog {
    async fn find(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, base_price FROM product WHERE id = ? AND is_active = 1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let product_id: i64 = row
            .try_get("id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let name: String = row
            .try_get("name")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let base_price_str: String = row
            .try_get("base_price")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let bom_rows = sqlx::query(
            "SELECT pm.material_id, m.name AS material_name, pm.quantity, m.unit_cost
             FROM product_material pm
             JOIN material m ON m.id = pm.material_id
             WHERE pm.product_id = ?
             ORDER BY pm.material_id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let bill_of_materials = bom_rows
            .iter()
            .map(row_to_bom_line)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Product {
            id: ProductId(product_id),
            name,
            base_price: parse_decimal("base_price", &base_price_str)?,
            active: true,
            bill_of_materials,
        }))
    }
}
