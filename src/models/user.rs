// Allow dead code: response structs carry fields for completeness
#![allow(dead_code)]

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}
