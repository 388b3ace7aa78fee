//! Searchable patient directory for the terminal.
//!
//! A search term typed by the user is debounced, turned into a cache key and
//! fetched from the patients API at most once per key at a time. Results are
//! cached with a freshness window and rendered as a table with a detail
//! overlay.

pub mod api;
pub mod app;
pub mod components;
pub mod config;
pub mod logging;
pub mod models;
pub mod query;
pub mod tui;
