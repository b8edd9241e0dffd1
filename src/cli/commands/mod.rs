pub mod auth;
pub mod config;
pub mod dashboard;
pub mod jwt;
pub mod products;
pub mod scroll;
