pub mod record_manager;
pub mod shared;
