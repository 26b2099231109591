pub mod config;
pub mod consumer;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod store;
