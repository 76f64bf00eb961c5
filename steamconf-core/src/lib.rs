//! Steam Mobile Confirmations Core Library
//!
//! This library provides the signed request generation, the confirmation
//! document parser and the confirmation list that keeps item identity
//! stable across refreshes.

pub mod auth;
pub mod client;
pub mod config;
pub mod confirmation;
pub mod parser;
pub mod transport;

pub use auth::{generate_confirmation_key, generate_confirmation_key_raw};
pub use client::{ConfirmationClient, Operation};
pub use config::ClientConfig;
pub use confirmation::{Confirmation, ConfirmationList, ReconcileSummary};
pub use parser::{parse_confirmations, ConfirmationData};
pub use transport::{HttpTransport, Transport, TransportResponse, Url};

use thiserror::Error;

/// Result type for confirmation operations
pub type Result<T> = std::result::Result<T, ConfirmationError>;

/// General error type for confirmation operations
#[derive(Error, Debug)]
pub enum ConfirmationError {
    #[error("Bad data for auth generation: {0}")]
    AuthGeneration(String),

    #[error("Transport error for {url}: {message}")]
    Transport {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Empty response from {url}")]
    EmptyResponse { url: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Confirmation {0} is no longer pending")]
    Detached(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
