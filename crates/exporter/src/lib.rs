//! Resource exporter service surface: HTTP endpoints and configuration

pub mod api;
pub mod config;
