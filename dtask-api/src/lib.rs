//! # dTask API Server Library
//!
//! HTTP surface of the dTask marketplace: accounts, task postings and the
//! applicant review workflow.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: JSON body extractors with API-shaped rejections
//! - `middleware`: Response hardening
//! - `routes`: API route handlers
//! - `uploads`: Attachment storage

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod uploads;
