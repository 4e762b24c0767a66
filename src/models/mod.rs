//! Data models for the admin backend's resources.
//!
//! Response envelopes (`*Response`) carry the backend's pagination fields
//! (`total`, `skip`, `limit`) next to the item vector. Draft types
//! (`New*`, `*Update`) are the request bodies for create and update calls
//! and omit unset fields entirely.

pub mod cart;
pub mod post;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem, CartsResponse};
pub use post::{
    Comment, CommentUser, CommentsResponse, NewPost, Post, PostUpdate, PostsResponse, Reactions,
};
pub use product::{NewProduct, Product, ProductUpdate, ProductsResponse};
pub use user::{User, UsersResponse};
