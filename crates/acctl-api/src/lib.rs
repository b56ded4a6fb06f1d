//! Read-only query surface over an [`acctl_core::AccountController`].
//!
//! [`ApiHandler`] is the seam; [`ControllerApiAdapter`] is the stock
//! implementation and [`HttpApi`] (feature `http`) mounts it on axum.

mod error;
pub use error::ApiError;

mod handler;
pub use handler::ApiHandler;

mod adapter;
pub use adapter::ControllerApiAdapter;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpApi;

#[cfg(feature = "http")]
pub use axum;
