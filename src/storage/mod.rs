pub mod frame;
pub mod primary_log;
pub mod primary_index;
pub mod layout;
pub mod file_lock;
