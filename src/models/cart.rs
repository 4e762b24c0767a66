// Allow dead code: response structs carry fields for completeness
#![allow(dead_code)]

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: i64,
    pub products: Vec<CartItem>,
    pub total: f64,
    #[serde(default)]
    pub discounted_total: f64,
    pub user_id: i64,
    #[serde(default)]
    pub total_products: i64,
    #[serde(default)]
    pub total_quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub quantity: i64,
    pub total: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub discounted_total: f64,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartsResponse {
    pub carts: Vec<Cart>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}
