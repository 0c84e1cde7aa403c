//! Request handlers, grouped by route family.

pub mod auth;
pub mod conversations;
pub mod health;
pub mod query;
pub mod weather;
