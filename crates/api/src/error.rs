//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cart::CartError;
use checkout::CheckoutError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Caller identity missing or invalid.
    Unauthorized(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Cart operation error.
    Cart(CartError),
    /// Checkout or order operation error.
    Checkout(CheckoutError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Cart(err) => cart_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn cart_error_to_response(err: CartError) -> (StatusCode, String) {
    match &err {
        CartError::ProductNotFound(_) | CartError::LineNotFound { .. } => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        CartError::InvalidQuantity(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::EmptyCart(_) => (StatusCode::BAD_REQUEST, "cart is empty".to_string()),
        CheckoutError::InvalidOrder(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CheckoutError::Forbidden { .. } => (StatusCode::FORBIDDEN, "not authorized".to_string()),
        CheckoutError::Cart(inner) => cart_error_to_response(inner),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}
