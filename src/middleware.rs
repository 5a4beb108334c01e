pub mod auth;
pub mod client;
pub mod extract;
pub mod i18n;
pub mod rate_limit;
