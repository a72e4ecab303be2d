/// State management module
///
/// This module handles all application state, including:
/// - Database connections and queries (library.rs)
/// - Shared data structures (data.rs)
/// - Optimistic query cache for images and tags (cache.rs)
/// - Gallery configuration (config.rs)

pub mod cache;
pub mod config;
pub mod data;
pub mod library;
