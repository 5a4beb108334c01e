// src/handlers.rs

pub mod admin;
pub mod auth;
pub mod certificates;
pub mod companies;
pub mod logs;
pub mod permissions;
pub mod settings;
pub mod users;
