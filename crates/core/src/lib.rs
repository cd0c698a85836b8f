//! Core types and shared functionality for overcast.
//!
//! This crate provides:
//! - Generational request/response cache with SQLite backend
//! - Unified error types
//! - Layered application configuration
//! - The resource-type vocabulary shared by routing and fallbacks

pub mod cache;
pub mod config;
pub mod error;
pub mod resource;

pub use cache::{CacheStore, CachedResponse, Generation, RequestKey};
pub use config::AppConfig;
pub use error::Error;
pub use resource::ResourceType;
