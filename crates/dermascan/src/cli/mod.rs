//! Command handlers.

pub mod config;
pub mod diseases;
pub mod models;
pub mod serve;
