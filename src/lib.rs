//! # wzs_guard
//!
//! Stateless double-submit CSRF protection for cookie-authenticated
//! [Axum](https://crates.io/crates/axum) applications.
//!
//! This crate provides:
//! - Token pair generation and validation (`web::csrf`)
//! - The form-render hook and token endpoint (`web::protection`)
//! - Guard extractors for state-changing endpoints (`web::guard`)
//! - Response shape classification and rotated error responses
//!   (`web::classify`, `web::rejection`)
//! - Environment-driven configuration (`config`)
//!
//! ## Example usage (in another crate)
//!
//! ```rust,no_run
//! use wzs_guard::axum::{Extension, Router, routing::get};
//! use wzs_guard::config::app::AppConfig;
//! use wzs_guard::web::protection::{csrf_handler, CsrfProtection};
//!
//! let cfg = AppConfig::from_env();
//! let app: Router = Router::new()
//!     .route("/csrf", get(csrf_handler))
//!     .layer(Extension(CsrfProtection::new(cfg.csrf)));
//! ```
// ===============================
// Re-exports of external crates
// ===============================

pub use askama;
pub use axum;
pub use axum_extra;
pub use base64;
pub use chrono;
pub use cookie;
pub use dotenvy;
pub use hmac;
pub use rand;
pub use serde;
pub use sha2;
pub use subtle;

// ===============================
// Public modules
// ===============================
pub mod config;
pub mod error;
pub mod time;
pub mod web;
