//! Patient creation and cleanup against a Tidepool clinic.
//!
//! `PatientStore` is the seam; `TidepoolClient` talks HTTP, the in-memory
//! store backs tests and dry runs.

pub mod client;
pub mod memory;
pub mod types;

pub use client::*;
pub use memory::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TidepoolError {
    #[error("Tidepool is not reachable at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Tidepool returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Login response carried no session token")]
    MissingSessionToken,

    #[error("Patient store lock poisoned")]
    LockPoisoned,
}
