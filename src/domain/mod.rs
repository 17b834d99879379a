pub mod article;
pub mod bookmark;
pub mod category;
pub mod comment;
pub mod engagement;
pub mod user;
