#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// the gateway rejected the request
    #[error("{message}")]
    Api { status: u16, message: String },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

pub mod gateway;
pub use gateway::{signature, verify_signature, Order, Payment, PaymentGateway, PaymentStatus};

pub mod rest;
pub use rest::Razorpay;
