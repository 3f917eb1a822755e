//! # Askama Template Rendering Helpers
//!
//! Provides utility functions for rendering [Askama](https://crates.io/crates/askama)
//! templates into [Axum](https://crates.io/crates/axum) HTML responses.
//!
//! These helpers simplify returning `text/html` responses from route handlers,
//! automatically setting the appropriate content type and handling render errors.
//!
//! # Examples
//! ```rust,no_run
//! use askama::Template;
//! use axum::{response::Response, http::StatusCode};
//! use wzs_guard::web::template::render_template_with_status;
//!
//! #[derive(Template)]
//! #[template(source = "<h1>Hello {{ name }}</h1>", ext = "html")]
//! struct HelloTemplate<'a> {
//!     name: &'a str,
//! }
//!
//! fn example() -> Response {
//!     let tmpl = HelloTemplate { name: "Alice" };
//!     render_template_with_status(tmpl, StatusCode::OK)
//! }
//! ```

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

/// Renders an [`askama::Template`] into an HTML [`Response`].
///
/// On success, returns a response with status `200 OK` and content type `text/html`.
/// On failure (template render error), returns `500 Internal Server Error`.
pub fn render_template<T: Template>(template: T) -> Response {
    render_template_with_status(template, StatusCode::OK)
}

/// Renders an [`askama::Template`] with a custom HTTP status code.
///
/// Render failures still produce `500 Internal Server Error`.
pub fn render_template_with_status<T: Template>(template: T, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to render template");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
