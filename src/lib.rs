pub mod analyzer;
pub mod config;
pub mod error;
pub mod handler;
pub mod history;
pub mod provider;
pub mod settings;
pub mod storage;
