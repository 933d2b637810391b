//! Request extractors.

use axum::extract::FromRequest;

use crate::api::error::ApiError;

/// `axum::Json` whose rejection is rendered as an [`ErrorResponse`](crate::api::ErrorResponse).
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
