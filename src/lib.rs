pub mod access;
pub mod app;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod query;
pub mod utils;
pub mod validation;
