pub mod auth;
pub mod employee;
