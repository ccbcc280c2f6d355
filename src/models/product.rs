use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};

pub const MAX_PRODUCT_CODE_LEN: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Public identifier clients send with every check.
    pub product_code: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductWithLicenseCount {
    #[serde(flatten)]
    pub product: Product,
    pub license_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub product_code: String,
}

impl CreateProduct {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
        }
        let code = self.product_code.trim();
        if code.is_empty() || code.chars().count() > MAX_PRODUCT_CODE_LEN {
            return Err(AppError::BadRequest(msg::PRODUCT_CODE_INVALID.into()));
        }
        Ok(())
    }
}
