pub mod auth;
pub mod bookmarks;
pub mod catalog;
pub mod categories;
pub mod comments;
pub mod content;
pub mod engagement;
pub mod pagination;
pub mod photos;
pub mod search;
pub mod users;
