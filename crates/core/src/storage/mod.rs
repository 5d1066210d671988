pub mod cache;
pub mod format;
pub mod manager;
