// Allow dead code: response structs carry fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub user_id: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub reactions: Reactions,
    #[serde(default)]
    pub views: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reactions {
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub dislikes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// Body for POST /posts/add.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub user_id: i64,
}

/// Body for PUT /posts/{id}; only the set fields change.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub post_id: i64,
    #[serde(default)]
    pub likes: i64,
    pub user: CommentUser,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentsResponse {
    pub comments: Vec<Comment>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}
