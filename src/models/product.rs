// Allow dead code: response structs carry fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub price: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    // Delete responses echo the product back with these set
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub deleted_on: Option<String>,
}

impl Product {
    /// Effective price after the listed discount.
    pub fn discounted_price(&self) -> f64 {
        self.price * (1.0 - self.discount_percentage / 100.0)
    }
}

/// Paginated envelope from the products list/search endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// Body for POST /products/add. Only `title` is required; the backend
/// fills defaults for everything omitted.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// Body for PUT /products/{id}; only the set fields change.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}
