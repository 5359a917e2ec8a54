pub mod cache;
pub mod config;
pub mod error;
pub mod market;
pub mod service;
pub mod source;
