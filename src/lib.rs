use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
mod admin;
mod app;
pub mod auth;
pub mod donations;
pub mod mail;
pub mod mapbox;
mod service;
pub mod setting;
pub mod users;

pub use {app::*, service::*};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    DbErr(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Notify(#[from] notify::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Auth(#[from] auth::AuthError),
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Str(&'static str),
    #[error("{0}")]
    InvalidParam(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    /// proof of an invalid or tampered transaction, the donation is marked failed
    #[error("{0}")]
    PaymentVerification(String),
    /// the gateway still reports the payment in flight, caller may retry
    #[error("Payment is not completed yet")]
    PaymentPending,
    #[error("Unauthorized")]
    Unauthorized,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidParam(_) | Error::PaymentVerification(_) | Error::PaymentPending => {
                StatusCode::BAD_REQUEST
            }
            Error::Auth(_) | Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Creates full response for error.
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": true,
            "status_code": self.status_code().as_u16(),
            "message": self.to_string()
        }))
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
