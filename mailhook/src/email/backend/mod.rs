//! Transport backend implementations
//!
//! - **SMTP**: deliver through an SMTP relay (production)
//! - **Capture**: append to a local JSON-lines log (development, tests, staging)

pub mod capture;
pub mod smtp;
