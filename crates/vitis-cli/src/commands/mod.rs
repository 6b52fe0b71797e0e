pub mod cache;
pub mod data;
pub mod files;
