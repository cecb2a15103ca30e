pub mod config;
pub mod constants;
pub mod models;
pub mod repositories;
pub mod services;
