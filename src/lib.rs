pub mod app;
pub mod audio;
pub mod captions;
pub mod cli;
pub mod config;
pub mod global;
pub mod platform;
pub mod recognition;
pub mod report;
pub mod session;
pub mod summary;
