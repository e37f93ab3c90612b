//! `tasklane-core`: failure taxonomy and response envelope.
//!
//! This crate is transport- and storage-agnostic: status codes are plain
//! integers and nothing here performs IO or logging.

pub mod envelope;
pub mod error;
pub mod id;

pub use envelope::ResponseEnvelope;
pub use error::{ErrorKind, Failure, FailureContext, HTTP_PASSTHROUGH_CODE};
pub use id::{TodoId, UserId};
