pub mod auth;
pub mod posts;
pub mod uploads;
pub mod user;
