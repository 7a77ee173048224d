//! Extractors that report malformed input as `AppError::Validation`
//!
//! The stock axum extractors answer bad bodies, paths, and query strings
//! with plain-text 400/415/422 responses. Wrapping them routes every such
//! rejection through `AppError`, so clients always get a 422 JSON error body.

use axum::extract::{FromRequest, FromRequestParts};
use phrasebank_common::AppError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Typed path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Typed query string
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
