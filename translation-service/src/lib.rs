pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod translator;
pub mod worker;
