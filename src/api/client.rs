//! HTTP client for the DummyJSON-style admin backend.
//!
//! One client instance covers both the auth endpoints (login/refresh) and
//! the admin resources (products, posts, carts, users). Authenticated
//! requests attach the session's bearer token.

// Allow dead code: full CRUD surface, the CLI only drives part of it
#![allow(dead_code)]

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::auth::{AuthApi, AuthError, AuthUser};
use crate::models::{
    Cart, CartsResponse, CommentsResponse, NewPost, NewProduct, Post, PostUpdate, PostsResponse,
    Product, ProductUpdate, ProductsResponse, User, UsersResponse,
};

use super::ApiError;

/// Base URL of the demo backend.
const DEFAULT_BASE_URL: &str = "https://dummyjson.com";

/// HTTP request timeout in seconds. The only timeout in the system; the
/// session monitor adds no timeout logic of its own.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// API client. Clone is cheap - reqwest::Client shares its connection pool
/// through an internal Arc.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Client against a non-default backend (tests, staging mirrors).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Attach a bearer token to all subsequent requests.
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// New client carrying the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    // ------------------------------------------------------------------
    // Auth endpoints
    // ------------------------------------------------------------------

    /// POST /auth/login. Any non-2xx response means bad credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthUser, AuthError> {
        let url = format!("{}/auth/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "login rejected");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(response.json().await?)
    }

    /// POST /auth/refresh, exchanging the current token for a fresh one.
    pub async fn refresh(&self, token: &str) -> Result<AuthUser, AuthError> {
        let url = format!("{}/auth/refresh", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "token": token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::RefreshFailed(format!(
                "refresh endpoint returned {}",
                status
            )));
        }
        Ok(response.json().await?)
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    pub async fn list_products(&self, limit: u32, skip: u32) -> Result<ProductsResponse, ApiError> {
        self.get_json("/products", &page_query(limit, skip)).await
    }

    pub async fn search_products(
        &self,
        query: &str,
        limit: u32,
        skip: u32,
    ) -> Result<ProductsResponse, ApiError> {
        let mut params = page_query(limit, skip);
        params.push(("q", query.to_string()));
        self.get_json("/products/search", &params).await
    }

    pub async fn get_product(&self, id: i64) -> Result<Product, ApiError> {
        self.get_json(&format!("/products/{}", id), &[]).await
    }

    pub async fn product_categories(&self) -> Result<Vec<String>, ApiError> {
        self.get_json("/products/category-list", &[]).await
    }

    pub async fn products_in_category(
        &self,
        category: &str,
        limit: u32,
        skip: u32,
    ) -> Result<ProductsResponse, ApiError> {
        self.get_json(&format!("/products/category/{}", category), &page_query(limit, skip))
            .await
    }

    pub async fn create_product(&self, draft: &NewProduct) -> Result<Product, ApiError> {
        self.send_json(Method::POST, "/products/add", draft).await
    }

    pub async fn update_product(&self, id: i64, update: &ProductUpdate) -> Result<Product, ApiError> {
        self.send_json(Method::PUT, &format!("/products/{}", id), update)
            .await
    }

    pub async fn delete_product(&self, id: i64) -> Result<Product, ApiError> {
        self.delete_json(&format!("/products/{}", id)).await
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    pub async fn list_posts(&self, limit: u32, skip: u32) -> Result<PostsResponse, ApiError> {
        self.get_json("/posts", &page_query(limit, skip)).await
    }

    pub async fn get_post(&self, id: i64) -> Result<Post, ApiError> {
        self.get_json(&format!("/posts/{}", id), &[]).await
    }

    pub async fn posts_by_user(&self, user_id: i64) -> Result<PostsResponse, ApiError> {
        self.get_json(&format!("/posts/user/{}", user_id), &[]).await
    }

    pub async fn post_comments(&self, post_id: i64) -> Result<CommentsResponse, ApiError> {
        self.get_json(&format!("/posts/{}/comments", post_id), &[])
            .await
    }

    pub async fn create_post(&self, draft: &NewPost) -> Result<Post, ApiError> {
        self.send_json(Method::POST, "/posts/add", draft).await
    }

    pub async fn update_post(&self, id: i64, update: &PostUpdate) -> Result<Post, ApiError> {
        self.send_json(Method::PUT, &format!("/posts/{}", id), update)
            .await
    }

    pub async fn delete_post(&self, id: i64) -> Result<Post, ApiError> {
        self.delete_json(&format!("/posts/{}", id)).await
    }

    // ------------------------------------------------------------------
    // Carts
    // ------------------------------------------------------------------

    pub async fn list_carts(&self, limit: u32, skip: u32) -> Result<CartsResponse, ApiError> {
        self.get_json("/carts", &page_query(limit, skip)).await
    }

    pub async fn carts_for_user(&self, user_id: i64) -> Result<CartsResponse, ApiError> {
        self.get_json(&format!("/carts/user/{}", user_id), &[]).await
    }

    pub async fn get_cart(&self, id: i64) -> Result<Cart, ApiError> {
        self.get_json(&format!("/carts/{}", id), &[]).await
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn list_users(&self, limit: u32, skip: u32) -> Result<UsersResponse, ApiError> {
        self.get_json("/users", &page_query(limit, skip)).await
    }

    pub async fn get_user(&self, id: i64) -> Result<User, ApiError> {
        self.get_json(&format!("/users/{}", id), &[]).await
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");
        let mut request = self.client.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = Self::check(request.send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, method = %method, "send");
        let mut request = self.client.request(method, &url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = Self::check(request.send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "DELETE");
        let mut request = self.client.delete(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = Self::check(request.send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}

fn page_query(limit: u32, skip: u32) -> Vec<(&'static str, String)> {
    vec![("limit", limit.to_string()), ("skip", skip.to_string())]
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, username: &str, password: &str) -> Result<AuthUser, AuthError> {
        ApiClient::login(self, username, password).await
    }

    async fn refresh(&self, token: &str) -> Result<AuthUser, AuthError> {
        ApiClient::refresh(self, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = ApiClient::with_base_url("https://example.com/").expect("client");
        assert_eq!(client.base_url, "https://example.com");
    }

    #[test]
    fn test_parse_auth_response() {
        // Responses carry more fields than we keep; extras must be ignored
        let json = r#"{
            "id": 1,
            "username": "emilys",
            "email": "emily.johnson@x.dummyjson.com",
            "firstName": "Emily",
            "lastName": "Johnson",
            "gender": "female",
            "image": "https://dummyjson.com/icon/emilys/128",
            "token": "eyJhbGciOiJIUzI1NiJ9.abc.def"
        }"#;
        let user: AuthUser = serde_json::from_str(json).expect("parse auth response");
        assert_eq!(user.id, 1);
        assert_eq!(user.username, "emilys");
        assert_eq!(user.token, "eyJhbGciOiJIUzI1NiJ9.abc.def");
    }

    #[test]
    fn test_parse_auth_response_without_image() {
        let json = r#"{"id": 2, "username": "bob", "email": "bob@x.com", "token": "t"}"#;
        let user: AuthUser = serde_json::from_str(json).expect("parse auth response");
        assert_eq!(user.image, "");
    }

    #[test]
    fn test_page_query() {
        let params = page_query(20, 40);
        assert_eq!(params[0], ("limit", "20".to_string()));
        assert_eq!(params[1], ("skip", "40".to_string()));
    }
}
