pub mod types;
pub mod config;
pub mod error;
pub mod record;
pub mod stats;
