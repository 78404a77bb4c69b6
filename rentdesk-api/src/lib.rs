//! # Rentdesk API Server Library
//!
//! HTTP surface of Rentdesk: team context and permissions for staff,
//! scheduled job endpoints, and the tenant portal.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and the active team extractor
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
